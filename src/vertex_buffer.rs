//! CPU-side vertex storage for one in-flight buffer.
//!
//! Positions, texcoords and colors live in parallel streams with independent
//! fill cursors. Callers may set a color or texcoord once and then emit
//! several vertices; [`VertexBuffer::reconcile_counts`] back-fills the shorter
//! streams so every vertex ends up with a full set of attributes.

use glam::Vec3;

use crate::backend::VertexData;
use crate::fixed::FixedVec;
use crate::types::Color;

/// Texcoord used for vertices that never received one.
pub const DEFAULT_TEXCOORD: [f32; 2] = [0.0, 0.0];

/// Parallel vertex attribute streams plus the precomputed quad index list.
#[derive(Debug, Clone)]
pub struct VertexBuffer {
    positions: FixedVec<[f32; 3]>,
    texcoords: FixedVec<[f32; 2]>,
    colors: FixedVec<Color>,
    /// Two triangles per quad, written once and never touched again.
    indices: Box<[u32]>,
}

impl VertexBuffer {
    /// Allocate room for `max_elements` quads.
    ///
    /// Use [`BatchConfig::validated`](crate::BatchConfig::validated) to keep
    /// `max_elements` within what `u32` indices can address.
    pub fn new(max_elements: usize) -> Self {
        let capacity = max_elements.saturating_mul(4);
        Self {
            positions: FixedVec::with_capacity(capacity),
            texcoords: FixedVec::with_capacity(capacity),
            colors: FixedVec::with_capacity(capacity),
            indices: quad_indices(max_elements),
        }
    }

    /// Maximum number of vertices.
    pub fn capacity(&self) -> usize {
        self.positions.capacity()
    }

    /// Vertices written since the last flush, including padding.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Texcoords written since the last flush.
    pub fn texcoord_count(&self) -> usize {
        self.texcoords.len()
    }

    /// Colors written since the last flush.
    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// Whether `additional` more vertices would not fit.
    pub fn is_capacity_exceeded(&self, additional: usize) -> bool {
        self.vertex_count() + additional > self.capacity()
    }

    /// Append an already-transformed position. Returns `false` if the buffer
    /// is full and the vertex was dropped.
    pub fn put_vertex(&mut self, position: Vec3) -> bool {
        self.positions.try_push(position.to_array()).is_ok()
    }

    /// Append a texcoord. Texcoords beyond capacity are discarded.
    pub fn put_texcoord(&mut self, u: f32, v: f32) {
        let _ = self.texcoords.try_push([u, v]);
    }

    /// Append a color. Colors beyond capacity are discarded.
    pub fn put_color(&mut self, color: Color) {
        let _ = self.colors.try_push(color);
    }

    /// Bring the color and texcoord streams level with the position stream.
    ///
    /// Missing colors are filled with `color`, the last color the caller set.
    /// Missing texcoords become [`DEFAULT_TEXCOORD`]. Streams that ran ahead
    /// of the positions are cut back.
    pub fn reconcile_counts(&mut self, color: Color) {
        let target = self.vertex_count();

        while self.colors.len() < target {
            let _ = self.colors.try_push(color);
        }
        while self.texcoords.len() < target {
            let _ = self.texcoords.try_push(DEFAULT_TEXCOORD);
        }

        self.colors.truncate(target);
        self.texcoords.truncate(target);
    }

    /// Append `count` dead vertices to every stream. Returns how many fit.
    pub fn push_padding(&mut self, count: usize) -> usize {
        let fitted = self.positions.push_default(count);
        self.texcoords.push_default(fitted);
        self.colors.push_default(fitted);
        fitted
    }

    /// Remove the last `count` padding vertices from every stream.
    ///
    /// Colors or texcoords written past the padding are cut back too.
    pub fn rewind_padding(&mut self, count: usize) {
        let target = self.vertex_count().saturating_sub(count);
        self.positions.truncate(target);
        self.texcoords.truncate(target);
        self.colors.truncate(target);
    }

    /// The filled prefix of every stream.
    pub fn data(&self) -> VertexData<'_> {
        VertexData {
            positions: self.positions.as_slice(),
            texcoords: self.texcoords.as_slice(),
            colors: self.colors.as_slice(),
        }
    }

    /// The precomputed quad indices.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Rewind every cursor to zero.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.texcoords.clear();
        self.colors.clear();
    }
}

/// Indices for `quads` quads laid out as `[0, 1, 2, 0, 2, 3]` per quad.
/// Stops at the last quad `u32` can address.
fn quad_indices(quads: usize) -> Box<[u32]> {
    (0..=u32::MAX)
        .step_by(4)
        .take(quads)
        .flat_map(|k| [k, k + 1, k + 2, k, k + 2, k + 3])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_cover_two_triangles_per_quad() {
        let buffer = VertexBuffer::new(2);
        assert_eq!(buffer.indices(), &[0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn put_vertex_drops_when_full() {
        let mut buffer = VertexBuffer::new(1);
        for i in 0..4 {
            assert!(buffer.put_vertex(Vec3::splat(i as f32)));
        }
        assert!(!buffer.put_vertex(Vec3::ONE));
        assert_eq!(buffer.vertex_count(), 4);
    }

    #[test]
    fn reconcile_repeats_supplied_color() {
        let mut buffer = VertexBuffer::new(1);
        buffer.put_color(Color::RED);
        for _ in 0..3 {
            buffer.put_vertex(Vec3::ZERO);
        }
        buffer.reconcile_counts(Color::RED);

        assert_eq!(buffer.color_count(), 3);
        assert_eq!(buffer.texcoord_count(), 3);
        assert!(buffer.data().colors.iter().all(|c| *c == Color::RED));
        assert!(buffer.data().texcoords.iter().all(|t| *t == DEFAULT_TEXCOORD));
    }

    #[test]
    fn reconcile_fills_colors_from_nothing() {
        let mut buffer = VertexBuffer::new(1);
        buffer.put_vertex(Vec3::ZERO);
        buffer.put_vertex(Vec3::ZERO);
        buffer.reconcile_counts(Color::BLUE);
        assert_eq!(buffer.data().colors, &[Color::BLUE, Color::BLUE]);
    }

    #[test]
    fn reconcile_trims_streams_that_ran_ahead() {
        let mut buffer = VertexBuffer::new(1);
        buffer.put_texcoord(0.5, 0.5);
        buffer.put_texcoord(1.0, 1.0);
        buffer.put_color(Color::GREEN);
        buffer.put_color(Color::RED);
        buffer.put_vertex(Vec3::ZERO);
        buffer.reconcile_counts(Color::WHITE);

        assert_eq!(buffer.texcoord_count(), 1);
        assert_eq!(buffer.color_count(), 1);
        assert_eq!(buffer.data().colors, &[Color::GREEN]);
    }

    #[test]
    fn padding_advances_all_cursors() {
        let mut buffer = VertexBuffer::new(2);
        buffer.put_vertex(Vec3::X);
        buffer.reconcile_counts(Color::WHITE);
        assert_eq!(buffer.push_padding(3), 3);
        assert_eq!(buffer.vertex_count(), 4);
        assert_eq!(buffer.color_count(), 4);
        assert_eq!(buffer.texcoord_count(), 4);
    }

    #[test]
    fn rewind_padding_restores_all_cursors() {
        let mut buffer = VertexBuffer::new(2);
        buffer.put_vertex(Vec3::X);
        buffer.put_vertex(Vec3::Y);
        buffer.reconcile_counts(Color::RED);
        buffer.push_padding(2);
        buffer.rewind_padding(2);

        assert_eq!(buffer.vertex_count(), 2);
        assert_eq!(buffer.color_count(), 2);
        assert_eq!(buffer.texcoord_count(), 2);
        assert_eq!(buffer.data().colors, &[Color::RED, Color::RED]);
    }

    #[test]
    fn capacity_look_ahead() {
        let mut buffer = VertexBuffer::new(1);
        buffer.put_vertex(Vec3::ZERO);
        assert!(!buffer.is_capacity_exceeded(3));
        assert!(buffer.is_capacity_exceeded(4));
    }

    #[test]
    fn clear_rewinds_every_stream() {
        let mut buffer = VertexBuffer::new(1);
        buffer.put_vertex(Vec3::ZERO);
        buffer.put_color(Color::RED);
        buffer.put_texcoord(1.0, 0.0);
        buffer.clear();
        assert_eq!(buffer.vertex_count(), 0);
        assert_eq!(buffer.color_count(), 0);
        assert_eq!(buffer.texcoord_count(), 0);
        assert_eq!(buffer.indices().len(), 6);
    }
}
