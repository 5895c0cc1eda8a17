use std::collections::HashMap;

use crate::coords::Vec2;
use crate::error::{OverlayError, Result};
use crate::field::FieldRegistry;

/// Where a pushed primitive's points live inside the batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub hop: usize,
    pub offset: usize,
    pub count: usize,
}

#[derive(Debug, Default)]
struct HopBuffer {
    from: String,
    input: Vec<Vec2>,
    output: Vec<Vec2>,
    failed: Option<OverlayError>,
}

/// Collects every vertex that needs the same frame conversion and converts
/// them with one registry call per source frame.
///
/// Usage per frame: [`clear`](Self::clear), [`push`](Self::push) each
/// primitive, [`project`](Self::project) once, then [`slice`](Self::slice) the
/// converted points back out. Buffers are reused across frames.
#[derive(Debug, Default)]
pub struct BatchProjector {
    hops: Vec<HopBuffer>,
    by_frame: HashMap<String, usize>,
    live: usize,
}

impl BatchProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all pushed points but keeps the allocations.
    pub fn clear(&mut self) {
        for hop in &mut self.hops[..self.live] {
            hop.input.clear();
            hop.output.clear();
            hop.failed = None;
        }
        self.by_frame.clear();
        self.live = 0;
    }

    pub fn push(&mut self, from: &str, points: &[Vec2]) -> Span {
        self.push_iter(from, points.iter().copied())
    }

    pub fn push_iter(&mut self, from: &str, points: impl IntoIterator<Item = Vec2>) -> Span {
        let hop = self.hop_index(from);
        let buf = &mut self.hops[hop].input;
        let offset = buf.len();
        buf.extend(points);
        Span { hop, offset, count: buf.len() - offset }
    }

    /// Converts every hop into `to`. Returns the number of conversions made,
    /// which is the number of distinct source frames.
    ///
    /// A hop whose source frame is unknown is remembered as failed; its spans
    /// slice to the error instead of points.
    pub fn project(&mut self, registry: &FieldRegistry, to: &str) -> usize {
        for hop in &mut self.hops[..self.live] {
            hop.output.clear();
            if let Err(e) = registry.convert_into(&hop.input, &hop.from, to, &mut hop.output) {
                hop.failed = Some(e);
            }
        }
        self.live
    }

    pub fn slice(&self, span: Span) -> Result<&[Vec2]> {
        let hop = self
            .hops
            .get(span.hop)
            .filter(|_| span.hop < self.live)
            .ok_or_else(|| OverlayError::skipped("span from a previous frame"))?;
        if let Some(e) = &hop.failed {
            return Err(e.clone());
        }
        hop.output
            .get(span.offset..span.offset + span.count)
            .ok_or_else(|| OverlayError::skipped("span was not projected"))
    }

    #[inline]
    pub fn hop_count(&self) -> usize {
        self.live
    }

    /// Total number of pushed points.
    pub fn len(&self) -> usize {
        self.hops[..self.live].iter().map(|h| h.input.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hop_index(&mut self, from: &str) -> usize {
        if let Some(&i) = self.by_frame.get(from) {
            return i;
        }
        let i = self.live;
        if i == self.hops.len() {
            self.hops.push(HopBuffer::default());
        }
        let hop = &mut self.hops[i];
        hop.from.clear();
        hop.from.push_str(from);
        self.by_frame.insert(from.to_string(), i);
        self.live += 1;
        i
    }
}
