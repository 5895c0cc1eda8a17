//! CPU-side vertex stream for one frame.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::coords::{Rgba, Vec2};
use super::tessellate;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    /// Premultiplied.
    pub color: [f32; 4],
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x2, // uv
        2 => Float32x4  // color
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    fn solid(p: Vec2, color: [f32; 4]) -> Self {
        Self { pos: p.to_f32(), uv: [0.0; 2], color }
    }
}

/// Which pipeline a run of triangles goes through.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RunKind {
    Opaque,
    Blended,
    /// Textured quad; the id names a cached texture.
    Textured(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DrawRun {
    pub kind: RunKind,
    pub vertices: Range<u32>,
}

/// A slice of the frame's vertices that fits the GPU buffer at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chunk {
    pub vertices: Range<usize>,
    /// Runs with ranges relative to the chunk start.
    pub runs: Vec<DrawRun>,
}

/// Triangles in submission order, grouped into runs of the same pipeline.
#[derive(Debug, Default)]
pub(crate) struct VertexBatch {
    vertices: Vec<Vertex>,
    runs: Vec<DrawRun>,
}

impl VertexBatch {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.runs.clear();
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn runs(&self) -> &[DrawRun] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn extend_run(&mut self, kind: RunKind, added: u32) {
        let end = self.vertices.len() as u32;
        match self.runs.last_mut() {
            Some(run) if run.kind == kind && run.vertices.end == end - added => {
                run.vertices.end = end;
            }
            _ => self.runs.push(DrawRun { kind, vertices: end - added..end }),
        }
    }

    /// Convex pieces filled with one color. Opaque colors take the
    /// unblended pipeline.
    pub fn push_pieces(&mut self, pieces: &[Vec<Vec2>], color: Rgba) {
        if color.is_invisible() {
            return;
        }
        let premul = color.to_premul_f32();
        let before = self.vertices.len();
        for piece in pieces {
            for tri in tessellate::fan(piece) {
                self.vertices.extend(tri.iter().map(|p| Vertex::solid(*p, premul)));
            }
        }
        let added = (self.vertices.len() - before) as u32;
        if added > 0 {
            let kind = if color.is_opaque() { RunKind::Opaque } else { RunKind::Blended };
            self.extend_run(kind, added);
        }
    }

    /// Axis-aligned textured rectangle.
    pub fn push_textured(&mut self, texture: u32, top_left: Vec2, size: Vec2) {
        let (a, b) = (top_left, top_left + size);
        let white = [1.0; 4];
        let corner = |p: Vec2, uv: [f32; 2]| Vertex { pos: p.to_f32(), uv, color: white };
        let tl = corner(a, [0.0, 0.0]);
        let tr = corner(Vec2::new(b.x, a.y), [1.0, 0.0]);
        let br = corner(b, [1.0, 1.0]);
        let bl = corner(Vec2::new(a.x, b.y), [0.0, 1.0]);
        self.vertices.extend([tl, tr, br, tl, br, bl]);
        self.extend_run(RunKind::Textured(texture), 6);
    }

    /// Splits the frame into pieces of at most `capacity` vertices, never
    /// splitting a triangle.
    pub fn chunks(&self, capacity: usize) -> Vec<Chunk> {
        let capacity = (capacity / 3 * 3).max(3);
        let mut out = Vec::new();
        let mut start = 0usize;
        while start < self.vertices.len() {
            let end = (start + capacity).min(self.vertices.len());
            let runs = self
                .runs
                .iter()
                .filter_map(|run| {
                    let lo = (run.vertices.start as usize).max(start);
                    let hi = (run.vertices.end as usize).min(end);
                    (lo < hi).then(|| DrawRun {
                        kind: run.kind,
                        vertices: (lo - start) as u32..(hi - start) as u32,
                    })
                })
                .collect();
            out.push(Chunk { vertices: start..end, runs });
            start = end;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Vec<Vec2> {
        vec![Vec2::zero(), Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)]
    }

    fn quad() -> Vec<Vec2> {
        vec![Vec2::zero(), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)]
    }

    // ── runs ──────────────────────────────────────────────────────────────

    #[test]
    fn consecutive_draws_share_a_run() {
        let mut b = VertexBatch::default();
        b.push_pieces(&[tri()], Rgba::white());
        b.push_pieces(&[quad()], Rgba::rgb(255, 0, 0));
        assert_eq!(b.vertices().len(), 9);
        assert_eq!(b.runs(), &[DrawRun { kind: RunKind::Opaque, vertices: 0..9 }]);
    }

    #[test]
    fn alpha_switches_pipeline() {
        let mut b = VertexBatch::default();
        b.push_pieces(&[tri()], Rgba::white());
        b.push_pieces(&[tri()], Rgba::new(255, 255, 255, 100));
        b.push_textured(7, Vec2::zero(), Vec2::new(4.0, 2.0));
        let kinds: Vec<_> = b.runs().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, [RunKind::Opaque, RunKind::Blended, RunKind::Textured(7)]);
    }

    #[test]
    fn colors_are_premultiplied() {
        let mut b = VertexBatch::default();
        b.push_pieces(&[tri()], Rgba::new(255, 0, 0, 51));
        let c = b.vertices()[0].color;
        assert!((c[0] - 0.2).abs() < 1e-6);
        assert!((c[3] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn invisible_draws_add_nothing() {
        let mut b = VertexBatch::default();
        b.push_pieces(&[tri()], Rgba::transparent());
        assert!(b.is_empty());
        assert!(b.runs().is_empty());
    }

    // ── chunking ──────────────────────────────────────────────────────────

    #[test]
    fn single_chunk_when_it_fits() {
        let mut b = VertexBatch::default();
        b.push_pieces(&[quad(), quad()], Rgba::white());
        let chunks = b.chunks(1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].vertices, 0..12);
    }

    #[test]
    fn overflow_splits_runs_on_triangle_boundaries() {
        let mut b = VertexBatch::default();
        b.push_pieces(&[quad(), quad()], Rgba::white()); // 12 vertices
        b.push_pieces(&[tri()], Rgba::new(0, 0, 0, 10)); // 3 vertices
        let chunks = b.chunks(8); // rounded down to 6
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].runs, vec![DrawRun { kind: RunKind::Opaque, vertices: 0..6 }]);
        assert_eq!(chunks[1].runs, vec![DrawRun { kind: RunKind::Opaque, vertices: 0..6 }]);
        assert_eq!(chunks[2].runs, vec![DrawRun { kind: RunKind::Blended, vertices: 0..3 }]);
        let total: usize = chunks.iter().map(|c| c.vertices.len()).sum();
        assert_eq!(total, b.vertices().len());
    }

    #[test]
    fn empty_frame_has_no_chunks() {
        assert!(VertexBatch::default().chunks(30).is_empty());
    }
}
