use glam::Affine3A;
use std::ops::Range;

/// Span of a frame-arena allocation. Indices, not pointers: ranges stay
/// valid while groups and records are shuffled around them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArenaRange {
    start: u32,
    len: u32,
}

impl ArenaRange {
    pub(crate) const EMPTY: Self = Self { start: 0, len: 0 };

    pub(crate) fn start(self) -> usize {
        self.start as usize
    }

    pub(crate) fn len(self) -> usize {
        self.len as usize
    }

    pub(crate) fn is_empty(self) -> bool {
        self.len == 0
    }

    pub(crate) fn range(self) -> Range<usize> {
        self.start()..self.start() + self.len()
    }
}

/// Frame-scoped scratch storage for bone matrices and morph weights.
///
/// Grows as needed instead of assuming a worst-case instance count; every
/// access goes through a checked range. Reset in bulk once per frame,
/// keeping capacity.
pub(crate) struct FrameArena {
    pub(crate) matrices: Vec<Affine3A>,
    pub(crate) scalars: Vec<f32>,
    matrix_watermark: usize,
    scalar_watermark: usize,
}

impl FrameArena {
    pub(crate) fn new() -> Self {
        Self {
            matrices: Vec::new(),
            scalars: Vec::new(),
            matrix_watermark: 0,
            scalar_watermark: 0,
        }
    }

    /// Allocates `count` matrices initialized to identity, which doubles as
    /// the fallback pose when bone setup fails.
    pub(crate) fn alloc_matrices(&mut self, count: usize) -> ArenaRange {
        let start = self.matrices.len();
        debug_assert!(start + count <= u32::MAX as usize);
        self.matrices
            .extend(std::iter::repeat(Affine3A::IDENTITY).take(count));
        ArenaRange {
            start: start as u32,
            len: count as u32,
        }
    }

    pub(crate) fn alloc_scalars(&mut self, count: usize) -> ArenaRange {
        let start = self.scalars.len();
        debug_assert!(start + count <= u32::MAX as usize);
        self.scalars.extend(std::iter::repeat(0.0).take(count));
        ArenaRange {
            start: start as u32,
            len: count as u32,
        }
    }

    pub(crate) fn matrices(&self, range: ArenaRange) -> &[Affine3A] {
        &self.matrices[range.range()]
    }

    pub(crate) fn matrices_mut(&mut self, range: ArenaRange) -> &mut [Affine3A] {
        &mut self.matrices[range.range()]
    }

    /// `dst[i] = src[i] * basis[i]`. `dst` is always allocated after `src`,
    /// so a split keeps the borrows disjoint.
    pub(crate) fn concat_matrices(&mut self, src: ArenaRange, basis: &[Affine3A], dst: ArenaRange) {
        debug_assert!(dst.start() >= src.start() + src.len());
        let (head, tail) = self.matrices.split_at_mut(dst.start());
        let bones = &head[src.range()];
        let out = &mut tail[..dst.len()];
        for ((dst, bone), pose) in out.iter_mut().zip(bones).zip(basis) {
            *dst = *bone * *pose;
        }
    }

    pub(crate) fn reset(&mut self) {
        self.matrix_watermark = self.matrix_watermark.max(self.matrices.len());
        self.scalar_watermark = self.scalar_watermark.max(self.scalars.len());
        self.matrices.clear();
        self.scalars.clear();
    }

    pub(crate) fn watermarks(&self) -> (usize, usize) {
        (self.matrix_watermark, self.scalar_watermark)
    }
}
