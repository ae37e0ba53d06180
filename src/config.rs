//! Capacity limits for the render batch.
//!
//! These are fixed for the lifetime of a [`RenderBatch`](crate::RenderBatch):
//! every array is allocated once at construction and never grows.

/// Quads that fit in one vertex buffer. Each quad is four vertices.
pub const MAX_BATCH_ELEMENTS: usize = 8192;

/// Draw calls that can be queued between two flushes.
pub const MAX_DRAWCALL_REGISTERED: usize = 256;

/// Depth of the matrix stack.
pub const MAX_MATRIX_STACK_SIZE: usize = 32;

/// Vertex buffers rotated between flushes.
pub const DEFAULT_BUFFER_COUNT: usize = 1;

/// Depth assigned to the first 2D primitive after a flush.
pub const DEPTH_INITIAL: f32 = -1.0;

/// Amount the depth advances after every completed primitive.
pub const DEPTH_STEP: f32 = 1.0 / 20000.0;

/// Sizing for a [`RenderBatch`](crate::RenderBatch).
///
/// ```
/// use glbatch::BatchConfig;
///
/// let config = BatchConfig::default()
///     .with_max_batch_elements(1024)
///     .with_buffer_count(3);
/// assert_eq!(config.vertex_capacity(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Quads per vertex buffer. Vertex capacity is four times this.
    pub max_batch_elements: usize,
    /// Maximum queued draw calls before a forced flush.
    pub max_draw_calls: usize,
    /// Matrix stack depth.
    pub matrix_stack_depth: usize,
    /// Number of vertex buffers used for multi-buffering.
    pub buffer_count: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_elements: MAX_BATCH_ELEMENTS,
            max_draw_calls: MAX_DRAWCALL_REGISTERED,
            matrix_stack_depth: MAX_MATRIX_STACK_SIZE,
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }
}

impl BatchConfig {
    /// Set the number of quads per vertex buffer.
    #[must_use]
    pub fn with_max_batch_elements(mut self, elements: usize) -> Self {
        self.max_batch_elements = elements;
        self
    }

    /// Set the draw call list capacity.
    #[must_use]
    pub fn with_max_draw_calls(mut self, draw_calls: usize) -> Self {
        self.max_draw_calls = draw_calls;
        self
    }

    /// Set the matrix stack depth.
    #[must_use]
    pub fn with_matrix_stack_depth(mut self, depth: usize) -> Self {
        self.matrix_stack_depth = depth;
        self
    }

    /// Set how many vertex buffers rotate between flushes.
    #[must_use]
    pub fn with_buffer_count(mut self, count: usize) -> Self {
        self.buffer_count = count;
        self
    }

    /// Vertex capacity of a single buffer.
    pub fn vertex_capacity(&self) -> usize {
        self.max_batch_elements.saturating_mul(4)
    }

    /// Index count of the precomputed quad index buffer.
    pub fn index_count(&self) -> usize {
        self.max_batch_elements.saturating_mul(6)
    }

    /// Clamp every zero field up to one, and `max_batch_elements` down to
    /// what `u32` quad indices can address, logging each adjustment.
    #[must_use]
    pub fn validated(self) -> Self {
        fn at_least_one(name: &str, value: usize) -> usize {
            if value == 0 {
                log::warn!("batch config: {name} is 0, using 1");
                1
            } else {
                value
            }
        }

        let mut max_batch_elements = at_least_one("max_batch_elements", self.max_batch_elements);
        let limit = max_indexable_elements();
        if max_batch_elements > limit {
            log::warn!(
                "batch config: max_batch_elements {max_batch_elements} is past what u32 indices address, using {limit}"
            );
            max_batch_elements = limit;
        }

        Self {
            max_batch_elements,
            max_draw_calls: at_least_one("max_draw_calls", self.max_draw_calls),
            matrix_stack_depth: at_least_one("matrix_stack_depth", self.matrix_stack_depth),
            buffer_count: at_least_one("buffer_count", self.buffer_count),
        }
    }
}

/// Most quads whose vertices `u32` indices can address and whose vertex and
/// index counts fit in a `usize`.
fn max_indexable_elements() -> usize {
    let vertices = usize::try_from(u64::from(u32::MAX) + 1).unwrap_or(usize::MAX);
    (vertices / 4).min(usize::MAX / 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_constants() {
        let config = BatchConfig::default();
        assert_eq!(config.max_batch_elements, MAX_BATCH_ELEMENTS);
        assert_eq!(config.max_draw_calls, MAX_DRAWCALL_REGISTERED);
        assert_eq!(config.matrix_stack_depth, MAX_MATRIX_STACK_SIZE);
        assert_eq!(config.buffer_count, DEFAULT_BUFFER_COUNT);
        assert_eq!(config.vertex_capacity(), MAX_BATCH_ELEMENTS * 4);
        assert_eq!(config.index_count(), MAX_BATCH_ELEMENTS * 6);
    }

    #[test]
    fn validated_clamps_zeroes() {
        let config = BatchConfig::default()
            .with_max_batch_elements(0)
            .with_max_draw_calls(0)
            .with_matrix_stack_depth(0)
            .with_buffer_count(0)
            .validated();
        assert_eq!(config.max_batch_elements, 1);
        assert_eq!(config.max_draw_calls, 1);
        assert_eq!(config.matrix_stack_depth, 1);
        assert_eq!(config.buffer_count, 1);
    }

    #[test]
    fn validated_keeps_valid_values() {
        let config = BatchConfig::default().with_buffer_count(3);
        assert_eq!(config.validated(), config);
    }

    #[test]
    fn validated_clamps_to_indexable_quads() {
        let config = BatchConfig::default()
            .with_max_batch_elements(usize::MAX)
            .validated();
        assert_eq!(config.max_batch_elements, max_indexable_elements());
        assert!(config.max_batch_elements.checked_mul(6).is_some());
        assert!(u32::try_from(config.vertex_capacity() - 1).is_ok());
    }

    #[test]
    fn capacities_saturate_before_validation() {
        let config = BatchConfig::default().with_max_batch_elements(usize::MAX);
        assert_eq!(config.vertex_capacity(), usize::MAX);
        assert_eq!(config.index_count(), usize::MAX);
    }
}
