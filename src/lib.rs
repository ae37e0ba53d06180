//! Immediate-mode vertex batching and draw-call coalescing over OpenGL.
//!
//! This crate provides [`RenderBatch`], which accumulates `begin` / `put_*` /
//! `end` submissions into fixed-capacity CPU buffers and hands them to the
//! GPU in as few draw calls as possible. Consecutive primitives that share a
//! primitive mode and texture are merged into one draw call; a change of
//! mode, texture, blend mode or shader, or a full buffer, starts a new one or
//! triggers a flush.
//!
//! # Features
//!
//! - **Draw-call coalescing** with alignment padding, so lines and triangles
//!   can share a buffer with indexed quads.
//! - **Multi-buffering**: the batch rotates through N vertex buffers so the
//!   CPU can fill one while the GPU still reads another.
//! - **Transform accumulator**: `push` / `translate` / `rotate` / `pop` in
//!   model-view mode bakes the transform into submitted vertices without
//!   disturbing the model-view matrix used for geometry already queued.
//! - **Pluggable backends** through [`RenderBackend`]: an OpenGL backend
//!   (`glow` feature, core 3.3 or ES 2.0) and a [`RecordingBackend`] that
//!   records calls for tests and tooling.
//! - **Convenience drawing** in [`shapes`], including [lyon]-tessellated
//!   paths.
//!
//! # Errors
//!
//! Submitting never fails. Overflowing a buffer drops vertices and logs
//! through the [`log`] facade; failing to create a texture or shader falls
//! back to the backend's defaults. Only backend construction and explicit
//! resource creation return [`BackendError`].
//!
//! # Safety
//!
//! Creating a [`GlowBackend`](backend::gl::GlowBackend) requires a valid,
//! current OpenGL context, which must stay current for the backend's
//! lifetime.
//!
//! [lyon]: https://docs.rs/lyon
//! [`RecordingBackend`]: backend::recording::RecordingBackend

pub mod backend;
mod batch;
mod config;
mod draw_call;
mod fixed;
mod matrix;
pub mod shaders;
pub mod shapes;
mod texture;
mod types;
mod vertex_buffer;

pub use backend::{load_shader, BackendError, RenderBackend, VertexData};
pub use batch::{BatchState, BatchStats, RenderBatch};
pub use config::{
    BatchConfig, DEFAULT_BUFFER_COUNT, DEPTH_INITIAL, DEPTH_STEP, MAX_BATCH_ELEMENTS,
    MAX_DRAWCALL_REGISTERED, MAX_MATRIX_STACK_SIZE,
};
pub use draw_call::DrawCall;
pub use matrix::{MatrixMode, MatrixStack};
pub use texture::{load_texture, upload_image, ImageData};
pub use types::{BlendMode, Color, PrimitiveMode, Rectangle, ShaderId, TextureId};
pub use vertex_buffer::{VertexBuffer, DEFAULT_TEXCOORD};
