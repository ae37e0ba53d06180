//! The render batch: immediate-mode submission, draw-call coalescing, and
//! flushing.
//!
//! Vertices are accumulated between [`RenderBatch::begin`] and
//! [`RenderBatch::end`] into the current [`VertexBuffer`], and counted against
//! the open [`DrawCall`]. Consecutive primitives that share a mode and texture
//! extend the same draw call. Nothing reaches the GPU until
//! [`RenderBatch::flush`], which is called explicitly or triggered
//! automatically when a buffer or the draw-call list fills up, or when the
//! blend mode or shader changes.
//!
//! # Multi-buffering
//!
//! With a `buffer_count` above one, each flush moves on to the next vertex
//! buffer, so the GPU can still be reading buffer `k` while the CPU fills
//! buffer `k + 1`. No fencing is done here beyond the rotation itself.
//!
//! # Failure handling
//!
//! Nothing in this module returns an error. Overflowing a vertex buffer drops
//! the vertex and logs; overflowing the draw-call list flushes; overflowing
//! the matrix stack logs and ignores the push.

use glam::Vec3;

use crate::backend::RenderBackend;
use crate::config::{BatchConfig, DEPTH_INITIAL, DEPTH_STEP};
use crate::draw_call::{DrawCall, DrawCallList};
use crate::matrix::MatrixStack;
use crate::types::{BlendMode, Color, PrimitiveMode, ShaderId, TextureId};
use crate::vertex_buffer::VertexBuffer;

/// Whether a primitive is open.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BatchState {
    /// Between primitives.
    #[default]
    Idle,
    /// Between [`RenderBatch::begin`] and [`RenderBatch::end`].
    Accumulating,
}

/// Running counters, for diagnostics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BatchStats {
    /// Flushes that reached the GPU.
    pub flushes: u64,
    /// Draw commands issued across all flushes.
    pub draw_calls_issued: u64,
    /// Vertices uploaded across all flushes, padding included.
    pub vertices_flushed: u64,
    /// Vertices discarded because the buffer was full.
    pub dropped_vertices: u64,
}

/// Accumulates immediate-mode geometry and submits it through a
/// [`RenderBackend`] in as few draw calls as possible.
///
/// # Example
///
/// ```
/// use glbatch::{Color, PrimitiveMode, RenderBatch};
/// use glbatch::backend::recording::RecordingBackend;
///
/// let mut batch = RenderBatch::new(RecordingBackend::new());
///
/// batch.begin(PrimitiveMode::Quads);
/// batch.put_color(Color::RED);
/// batch.put_vertex(0.0, 0.0, 0.0);
/// batch.put_vertex(1.0, 0.0, 0.0);
/// batch.put_vertex(1.0, 1.0, 0.0);
/// batch.put_vertex(0.0, 1.0, 0.0);
/// batch.end();
///
/// batch.flush();
/// assert_eq!(batch.stats().draw_calls_issued, 1);
/// ```
pub struct RenderBatch<B: RenderBackend> {
    backend: B,
    config: BatchConfig,

    /// One buffer per in-flight frame.
    buffers: Vec<VertexBuffer>,
    /// Index into [`buffers`](Self::buffers) currently being filled.
    current_buffer: usize,
    draw_calls: DrawCallList,
    matrices: MatrixStack,

    /// Last color passed to [`put_color`](Self::put_color).
    current_color: Color,
    /// Z assigned by [`put_vertex2`](Self::put_vertex2).
    depth: f32,
    shader: ShaderId,
    blend_mode: BlendMode,
    state: BatchState,

    stats: BatchStats,
    /// Whether the current flush cycle already logged a dropped vertex.
    overflow_logged: bool,
}

impl<B: RenderBackend> RenderBatch<B> {
    /// Create a batch with the default capacities.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, BatchConfig::default())
    }

    /// Create a batch sized by `config`.
    ///
    /// GPU buffer creation failures are logged; the batch is still usable on
    /// the CPU side, it just has nothing to upload into.
    pub fn with_config(mut backend: B, config: BatchConfig) -> Self {
        let config = config.validated();
        let buffers: Vec<VertexBuffer> = (0..config.buffer_count)
            .map(|_| VertexBuffer::new(config.max_batch_elements))
            .collect();

        if let Err(err) = backend.init_buffers(
            config.buffer_count,
            config.vertex_capacity(),
            buffers[0].indices(),
        ) {
            log::error!("failed to create GPU vertex buffers: {err}");
        }

        let default_texture = backend.default_texture();
        let shader = backend.default_shader();
        backend.set_blend_mode(BlendMode::Alpha);

        log::debug!(
            "render batch ready: {} buffer(s) x {} vertices, {} draw calls",
            config.buffer_count,
            config.vertex_capacity(),
            config.max_draw_calls
        );

        Self {
            backend,
            config,
            buffers,
            current_buffer: 0,
            draw_calls: DrawCallList::new(config.max_draw_calls, default_texture),
            matrices: MatrixStack::new(config.matrix_stack_depth),
            current_color: Color::WHITE,
            depth: DEPTH_INITIAL,
            shader,
            blend_mode: BlendMode::Alpha,
            state: BatchState::Idle,
            stats: BatchStats::default(),
            overflow_logged: false,
        }
    }

    /// Open a primitive of the given mode.
    ///
    /// Extends the open draw call when its mode already matches; otherwise
    /// pads the open call to a quad boundary and starts a new one on the
    /// same texture.
    pub fn begin(&mut self, mode: PrimitiveMode) {
        if self.state == BatchState::Accumulating {
            log::warn!("begin({mode:?}) called while a primitive is still open");
        }
        let texture = self.draw_calls.open().texture;
        self.open_draw_call(mode, texture);
        self.state = BatchState::Accumulating;
    }

    /// Close the open primitive.
    ///
    /// Back-fills missing colors and texcoords, advances the 2D depth, and
    /// flushes once a non-empty buffer is within one quad of full. That flush
    /// unwinds the whole matrix stack first.
    pub fn end(&mut self) {
        if self.state == BatchState::Idle {
            log::warn!("end() called without a matching begin()");
        }
        self.state = BatchState::Idle;

        let color = self.current_color;
        self.buffers[self.current_buffer].reconcile_counts(color);

        // Later primitives land slightly in front of earlier ones.
        self.depth += DEPTH_STEP;

        let buffer = &self.buffers[self.current_buffer];
        let count = buffer.vertex_count();
        if count > 0 && count >= buffer.capacity().saturating_sub(4) {
            self.matrices.pop_all();
            self.flush();
        }
    }

    /// Submit a vertex, transformed by the matrix stack's accumulator.
    ///
    /// Dropped, and counted in [`BatchStats::dropped_vertices`], if the
    /// buffer is full.
    pub fn put_vertex(&mut self, x: f32, y: f32, z: f32) {
        let position = self.matrices.transform_point(Vec3::new(x, y, z));
        if self.buffers[self.current_buffer].put_vertex(position) {
            self.draw_calls.open_mut().vertex_count += 1;
        } else {
            self.stats.dropped_vertices += 1;
            if !self.overflow_logged {
                log::error!(
                    "vertex buffer overflow: dropping vertices until the next flush (capacity {})",
                    self.config.vertex_capacity()
                );
                self.overflow_logged = true;
            }
        }
    }

    /// Submit a 2D vertex at the current depth.
    pub fn put_vertex2(&mut self, x: f32, y: f32) {
        self.put_vertex(x, y, self.depth);
    }

    /// Submit a texture coordinate for the next vertex.
    pub fn put_texcoord(&mut self, u: f32, v: f32) {
        self.buffers[self.current_buffer].put_texcoord(u, v);
    }

    /// Submit a color for the next vertex. It also becomes the fill color
    /// for vertices submitted without one.
    pub fn put_color(&mut self, color: Color) {
        self.current_color = color;
        self.buffers[self.current_buffer].put_color(color);
    }

    /// [`put_color`](Self::put_color) from separate channels.
    pub fn put_color_rgba(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.put_color(Color::new(r, g, b, a));
    }

    /// Bind `texture` for subsequent primitives.
    ///
    /// A change closes the open draw call the same way a mode change does.
    pub fn set_texture(&mut self, texture: TextureId) {
        let mode = self.draw_calls.open().mode;
        let buffer = &self.buffers[self.current_buffer];
        if buffer.vertex_count() >= buffer.capacity() {
            self.flush();
        }
        self.open_draw_call(mode, texture);
    }

    /// Go back to the default texture.
    pub fn clear_texture(&mut self) {
        let texture = self.draw_calls.default_texture();
        self.set_texture(texture);
    }

    /// Flush if `additional` more vertices would not fit in the current
    /// buffer. Returns whether a flush happened.
    ///
    /// The open draw call's mode and texture survive the flush. Call this
    /// before [`begin`](Self::begin) for shapes whose vertex count is known,
    /// so a shape is never split across two buffers.
    pub fn ensure_capacity(&mut self, additional: usize) -> bool {
        let buffer = &self.buffers[self.current_buffer];
        if !buffer.is_capacity_exceeded(additional) {
            return false;
        }
        if additional > buffer.capacity() {
            log::warn!(
                "primitive of {additional} vertices exceeds buffer capacity {}",
                buffer.capacity()
            );
        }
        let flushed = buffer.vertex_count() > 0;

        let open = *self.draw_calls.open();
        self.flush();
        let reopened = self.draw_calls.open_mut();
        reopened.mode = open.mode;
        reopened.texture = open.texture;

        flushed
    }

    /// Whether `additional` more vertices would not fit in the current buffer.
    pub fn is_capacity_exceeded(&self, additional: usize) -> bool {
        self.buffers[self.current_buffer].is_capacity_exceeded(additional)
    }

    /// Switch blend mode, flushing what was drawn under the previous one.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        if mode == self.blend_mode {
            return;
        }
        self.flush();
        self.backend.set_blend_mode(mode);
        self.blend_mode = mode;
    }

    /// Switch shader program, flushing what was drawn under the previous one.
    pub fn set_shader(&mut self, shader: ShaderId) {
        if shader == self.shader {
            return;
        }
        self.flush();
        self.shader = shader;
    }

    /// Go back to the backend's default shader.
    pub fn reset_shader(&mut self) {
        let shader = self.backend.default_shader();
        self.set_shader(shader);
    }

    /// Upload the current buffer and issue every queued draw call.
    ///
    /// Does nothing if no vertex has been submitted since the last flush.
    /// Afterwards the draw-call list holds a single empty quad call on the
    /// default texture, the depth is reset, and the next buffer becomes
    /// current.
    pub fn flush(&mut self) {
        let index = self.current_buffer;
        let buffer = &self.buffers[index];
        let vertex_count = buffer.vertex_count();
        if vertex_count == 0 {
            return;
        }

        self.backend.upload_vertices(index, buffer.data());
        self.backend
            .begin_draw(index, self.shader, &self.matrices.mvp());

        let mut offset = 0;
        let mut issued = 0;
        for call in self.draw_calls.calls() {
            if call.vertex_count > 0 {
                self.backend.bind_texture(call.texture);
                match call.mode {
                    PrimitiveMode::Lines | PrimitiveMode::Triangles => {
                        self.backend.draw_arrays(call.mode, offset, call.vertex_count);
                    }
                    PrimitiveMode::Quads => {
                        self.backend
                            .draw_indexed(offset / 4 * 6, call.vertex_count / 4 * 6);
                    }
                }
                issued += 1;
            }
            offset += call.span();
        }

        self.backend.end_draw();

        log::debug!(
            "flushed buffer {index}: {vertex_count} vertices in {issued} draw call(s)"
        );
        self.stats.flushes += 1;
        self.stats.draw_calls_issued += issued;
        self.stats.vertices_flushed += vertex_count as u64;

        self.buffers[index].clear();
        self.draw_calls.reset();
        self.depth = DEPTH_INITIAL;
        self.overflow_logged = false;
        self.current_buffer = (index + 1) % self.buffers.len();
    }

    /// Release the GPU buffers and hand the backend back.
    pub fn destroy(mut self) -> B {
        self.backend.destroy();
        self.backend
    }

    /// Start a new draw call for `mode` and `texture` unless the open one
    /// already matches.
    fn open_draw_call(&mut self, mode: PrimitiveMode, texture: TextureId) {
        let open = *self.draw_calls.open();
        if open.matches(mode, texture) {
            return;
        }

        if open.vertex_count > 0 {
            let padding = open.mode.alignment_padding(open.vertex_count);
            let buffer = &mut self.buffers[self.current_buffer];
            if buffer.is_capacity_exceeded(padding) {
                self.flush();
            } else {
                buffer.push_padding(padding);
                self.draw_calls.open_mut().vertex_alignment_padding = padding;
                if self.draw_calls.append(DrawCall::new(mode, texture)) {
                    log::trace!(
                        "draw call {} opened: {mode:?} texture {}",
                        self.draw_calls.len(),
                        texture.0
                    );
                    return;
                }
                self.flush();
            }
        }

        // The open call is empty, either already or after a flush. If the call
        // before it already matches, drop it and extend that one instead.
        if self
            .draw_calls
            .previous()
            .is_some_and(|previous| previous.matches(mode, texture))
        {
            if let Some(previous) = self.draw_calls.reopen_previous() {
                let padding = std::mem::take(&mut previous.vertex_alignment_padding);
                self.buffers[self.current_buffer].rewind_padding(padding);
                log::trace!("draw call {} reopened", self.draw_calls.len());
            }
            return;
        }

        let open = self.draw_calls.open_mut();
        open.mode = mode;
        open.texture = texture;
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably, for creating textures and shaders.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The (validated) configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// The matrix stack.
    pub fn matrices(&self) -> &MatrixStack {
        &self.matrices
    }

    /// The matrix stack, mutably.
    ///
    /// Model-view and projection changes apply to everything still queued at
    /// the next flush; flush first to draw queued geometry under the old
    /// matrices.
    pub fn matrices_mut(&mut self) -> &mut MatrixStack {
        &mut self.matrices
    }

    /// The vertex buffer currently being filled.
    pub fn buffer(&self) -> &VertexBuffer {
        &self.buffers[self.current_buffer]
    }

    /// Every vertex buffer, in rotation order.
    pub fn buffers(&self) -> &[VertexBuffer] {
        &self.buffers
    }

    /// Index of the buffer currently being filled.
    pub fn current_buffer_index(&self) -> usize {
        self.current_buffer
    }

    /// Draw calls queued since the last flush.
    pub fn draw_calls(&self) -> &[DrawCall] {
        self.draw_calls.calls()
    }

    /// Texture of the open draw call.
    pub fn current_texture(&self) -> TextureId {
        self.draw_calls.open().texture
    }

    /// Mode of the open draw call.
    pub fn current_mode(&self) -> PrimitiveMode {
        self.draw_calls.open().mode
    }

    /// Depth the next 2D vertex will get.
    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Whether a primitive is open.
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Active shader.
    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    /// Active blend mode.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Running counters.
    pub fn stats(&self) -> BatchStats {
        self.stats
    }
}
