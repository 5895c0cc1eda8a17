use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Z layer of a renderable. Higher values are drawn on top.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZIndex(pub i32);

impl ZIndex {
    #[inline]
    pub const fn new(v: i32) -> Self {
        Self(v)
    }
}

/// Paint order of scene renderables.
///
/// Ordering rules:
/// 1) `z`: ascending (back-to-front)
/// 2) `seq`: ascending (creation order within a layer)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SortKey {
    pub z: ZIndex,
    /// Scene-wide creation counter; entities and drawings share it.
    pub seq: u64,
}

impl SortKey {
    #[inline]
    pub const fn new(z: ZIndex, seq: u64) -> Self {
        Self { z, seq }
    }
}

impl Ord for SortKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        match self.z.cmp(&other.z) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            o => o,
        }
    }
}

impl PartialOrd for SortKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
