//! The GPU side of a flush.
//!
//! [`RenderBatch`](crate::RenderBatch) never talks to a graphics API
//! directly. Everything it needs from the GPU goes through
//! [`RenderBackend`], and it only calls the drawing half of the trait from
//! inside a flush, never per vertex.
//!
//! Two implementations ship with the crate:
//!
//! - [`GlowBackend`](gl::GlowBackend) drives OpenGL through [glow], in
//!   either the desktop core 3.3 or the ES 2.0 flavour.
//! - [`RecordingBackend`](recording::RecordingBackend) performs no GPU work
//!   and records every call, for tests and headless tooling.
//!
//! [glow]: https://docs.rs/glow

use glam::Mat4;

use crate::texture::ImageData;
use crate::types::{BlendMode, Color, PrimitiveMode, ShaderId, TextureId};

#[cfg(feature = "glow")]
pub mod gl;
pub mod recording;

/// Errors raised while creating GPU resources.
///
/// The batch itself never surfaces these; it logs them and falls back to a
/// default resource. They are returned from backend constructors and from
/// explicit resource creation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The driver refused to create an object.
    #[error("GL object creation failed: {0}")]
    Gl(String),
    /// A shader stage failed to compile.
    #[error("shader compile error: {0}")]
    ShaderCompile(String),
    /// A shader program failed to link.
    #[error("program link error: {0}")]
    ShaderLink(String),
    /// The vertex capacity cannot be addressed by the profile's index type.
    #[error("{vertices} vertices cannot be addressed with 16-bit indices")]
    IndexOverflow {
        /// Requested vertex capacity.
        vertices: usize,
    },
    /// Pixel data was missing, truncated, or had a zero dimension.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Borrowed view of the filled prefix of a vertex buffer.
#[derive(Debug, Copy, Clone)]
pub struct VertexData<'a> {
    /// One `[x, y, z]` per vertex.
    pub positions: &'a [[f32; 3]],
    /// One `[u, v]` per vertex.
    pub texcoords: &'a [[f32; 2]],
    /// One RGBA color per vertex.
    pub colors: &'a [Color],
}

impl VertexData<'_> {
    /// Number of vertices in the view.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the view holds no vertices.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Everything the batch needs from a graphics API.
///
/// A flush calls, in order: [`upload_vertices`](Self::upload_vertices),
/// [`begin_draw`](Self::begin_draw), then for every queued draw call
/// [`bind_texture`](Self::bind_texture) followed by
/// [`draw_arrays`](Self::draw_arrays) or [`draw_indexed`](Self::draw_indexed),
/// and finally [`end_draw`](Self::end_draw).
pub trait RenderBackend {
    /// Allocate GPU storage for `count` vertex buffers of `capacity` vertices
    /// each and upload the shared quad `indices`.
    ///
    /// # Errors
    ///
    /// Fails if buffer objects cannot be created or the index range is not
    /// addressable.
    fn init_buffers(
        &mut self,
        count: usize,
        capacity: usize,
        indices: &[u32],
    ) -> Result<(), BackendError>;

    /// Copy the filled prefix of buffer `buffer` to the GPU.
    fn upload_vertices(&mut self, buffer: usize, data: VertexData<'_>);

    /// Bind buffer `buffer`'s vertex state and `shader`, and upload `mvp`.
    fn begin_draw(&mut self, buffer: usize, shader: ShaderId, mvp: &Mat4);

    /// Bind `texture` for the following draws.
    fn bind_texture(&mut self, texture: TextureId);

    /// Draw `count` non-indexed vertices starting at vertex `first`.
    fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize);

    /// Draw `index_count` quad indices starting at index `first_index`.
    fn draw_indexed(&mut self, first_index: usize, index_count: usize);

    /// Unbind whatever [`begin_draw`](Self::begin_draw) bound.
    fn end_draw(&mut self);

    /// Apply a blend mode to subsequent draws.
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Upload an RGBA8 image as a new texture.
    ///
    /// # Errors
    ///
    /// Fails if the image is malformed or the texture cannot be created.
    fn create_texture(&mut self, image: &ImageData) -> Result<TextureId, BackendError>;

    /// Release a texture created by [`create_texture`](Self::create_texture).
    fn delete_texture(&mut self, texture: TextureId);

    /// Compile and link a shader program.
    ///
    /// The program must consume the batch's vertex layout: `vertexPosition`,
    /// `vertexTexCoord` and `vertexColor` attributes, an `mvp` matrix uniform
    /// and a `texture0` sampler.
    ///
    /// # Errors
    ///
    /// Fails on compile or link errors.
    fn create_shader(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ShaderId, BackendError>;

    /// The 1x1 white texture bound when nothing else is.
    fn default_texture(&self) -> TextureId;

    /// The shader used when none has been set.
    fn default_shader(&self) -> ShaderId;

    /// Release every GPU object owned by the backend.
    fn destroy(&mut self);
}

/// Compile a shader program, falling back to the default program on failure.
pub fn load_shader<B: RenderBackend + ?Sized>(
    backend: &mut B,
    vertex_src: &str,
    fragment_src: &str,
) -> ShaderId {
    match backend.create_shader(vertex_src, fragment_src) {
        Ok(id) => {
            log::debug!("shader {} loaded", id.0);
            id
        }
        Err(err) => {
            log::warn!("shader load failed, using default shader: {err}");
            backend.default_shader()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use recording::{BackendCall, RecordingBackend};

    #[test]
    fn load_shader_returns_new_program() {
        let mut backend = RecordingBackend::new();
        let id = load_shader(&mut backend, "void main() {}", "void main() {}");
        assert_ne!(id, backend.default_shader());
        assert_eq!(backend.calls(), &[BackendCall::CreateShader(id)]);
    }

    #[test]
    fn broken_shader_falls_back_to_default() {
        let mut backend = RecordingBackend::new().with_shader_failure("syntax error");
        let id = load_shader(&mut backend, "syntax error", "void main() {}");
        assert_eq!(id, backend.default_shader());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn vertex_data_reports_position_count() {
        let positions = [[0.0; 3]; 2];
        let data = VertexData {
            positions: &positions,
            texcoords: &[],
            colors: &[],
        };
        assert_eq!(data.len(), 2);
        assert!(!data.is_empty());
    }
}
