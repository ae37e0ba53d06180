//! A backend that performs no GPU work and records every call.
//!
//! Useful for tests and for tooling that wants to inspect what a frame would
//! have drawn without an OpenGL context.
//!
//! ```
//! use glbatch::{Color, PrimitiveMode, RenderBatch};
//! use glbatch::backend::recording::RecordingBackend;
//!
//! let mut batch = RenderBatch::new(RecordingBackend::new());
//! batch.begin(PrimitiveMode::Triangles);
//! batch.put_color(Color::RED);
//! batch.put_vertex(0.0, 0.0, 0.0);
//! batch.put_vertex(1.0, 0.0, 0.0);
//! batch.put_vertex(0.0, 1.0, 0.0);
//! batch.end();
//! batch.flush();
//!
//! let draws = batch.backend().draws();
//! assert_eq!(draws.len(), 1);
//! assert_eq!(draws[0].vertex_count, 3);
//! ```

use glam::Mat4;

use super::{BackendError, RenderBackend, VertexData};
use crate::texture::ImageData;
use crate::types::{BlendMode, Color, PrimitiveMode, ShaderId, TextureId};

const DEFAULT_TEXTURE: TextureId = TextureId(1);
const DEFAULT_SHADER: ShaderId = ShaderId(1);

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// [`RenderBackend::init_buffers`].
    InitBuffers {
        /// Number of vertex buffers.
        count: usize,
        /// Vertices per buffer.
        capacity: usize,
        /// Length of the quad index list.
        index_count: usize,
    },
    /// [`RenderBackend::upload_vertices`], with a copy of the uploaded data.
    UploadVertices {
        /// Target buffer.
        buffer: usize,
        /// Uploaded positions.
        positions: Vec<[f32; 3]>,
        /// Uploaded texcoords.
        texcoords: Vec<[f32; 2]>,
        /// Uploaded colors.
        colors: Vec<Color>,
    },
    /// [`RenderBackend::begin_draw`].
    BeginDraw {
        /// Buffer whose vertex state was bound.
        buffer: usize,
        /// Program bound.
        shader: ShaderId,
        /// Uploaded matrix.
        mvp: Mat4,
    },
    /// [`RenderBackend::bind_texture`].
    BindTexture(TextureId),
    /// [`RenderBackend::draw_arrays`].
    DrawArrays {
        /// Primitive mode.
        mode: PrimitiveMode,
        /// First vertex.
        first: usize,
        /// Vertex count.
        count: usize,
    },
    /// [`RenderBackend::draw_indexed`].
    DrawIndexed {
        /// First index.
        first_index: usize,
        /// Index count.
        index_count: usize,
    },
    /// [`RenderBackend::end_draw`].
    EndDraw,
    /// [`RenderBackend::set_blend_mode`].
    SetBlendMode(BlendMode),
    /// [`RenderBackend::create_texture`] that succeeded.
    CreateTexture {
        /// Assigned id.
        id: TextureId,
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },
    /// [`RenderBackend::delete_texture`].
    DeleteTexture(TextureId),
    /// [`RenderBackend::create_shader`] that succeeded.
    CreateShader(ShaderId),
    /// [`RenderBackend::destroy`].
    Destroy,
}

/// A draw reconstructed from the recorded calls, in vertex units.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecordedDraw {
    /// Mode as submitted to the batch. Indexed draws are reported as quads.
    pub mode: PrimitiveMode,
    /// Texture bound when the draw was issued.
    pub texture: TextureId,
    /// First vertex in the buffer.
    pub first_vertex: usize,
    /// Vertices drawn.
    pub vertex_count: usize,
}

/// Headless [`RenderBackend`] that logs every call into a list.
#[derive(Debug)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    next_texture: u32,
    next_shader: u32,
    /// Source pairs containing this marker fail to "compile".
    fail_marker: Option<String>,
}

impl RecordingBackend {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            next_texture: DEFAULT_TEXTURE.0 + 1,
            next_shader: DEFAULT_SHADER.0 + 1,
            fail_marker: None,
        }
    }

    /// Make [`create_shader`](RenderBackend::create_shader) fail for any
    /// source containing `marker`.
    #[must_use]
    pub fn with_shader_failure(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Forget every recorded call.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Draws issued so far, with the texture bound at the time.
    pub fn draws(&self) -> Vec<RecordedDraw> {
        let mut texture = DEFAULT_TEXTURE;
        let mut draws = Vec::new();
        for call in &self.calls {
            match *call {
                BackendCall::BindTexture(id) => texture = id,
                BackendCall::DrawArrays { mode, first, count } => draws.push(RecordedDraw {
                    mode,
                    texture,
                    first_vertex: first,
                    vertex_count: count,
                }),
                BackendCall::DrawIndexed {
                    first_index,
                    index_count,
                } => draws.push(RecordedDraw {
                    mode: PrimitiveMode::Quads,
                    texture,
                    first_vertex: first_index / 6 * 4,
                    vertex_count: index_count / 6 * 4,
                }),
                _ => {}
            }
        }
        draws
    }

    /// Vertex uploads so far, paired with the buffer index they targeted.
    pub fn uploads(&self) -> Vec<(usize, VertexData<'_>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::UploadVertices {
                    buffer,
                    positions,
                    texcoords,
                    colors,
                } => Some((
                    *buffer,
                    VertexData {
                        positions,
                        texcoords,
                        colors,
                    },
                )),
                _ => None,
            })
            .collect()
    }

    /// Number of [`BackendCall::BeginDraw`] calls, one per non-empty flush.
    pub fn flush_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::BeginDraw { .. }))
            .count()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for RecordingBackend {
    fn init_buffers(
        &mut self,
        count: usize,
        capacity: usize,
        indices: &[u32],
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::InitBuffers {
            count,
            capacity,
            index_count: indices.len(),
        });
        Ok(())
    }

    fn upload_vertices(&mut self, buffer: usize, data: VertexData<'_>) {
        self.calls.push(BackendCall::UploadVertices {
            buffer,
            positions: data.positions.to_vec(),
            texcoords: data.texcoords.to_vec(),
            colors: data.colors.to_vec(),
        });
    }

    fn begin_draw(&mut self, buffer: usize, shader: ShaderId, mvp: &Mat4) {
        self.calls.push(BackendCall::BeginDraw {
            buffer,
            shader,
            mvp: *mvp,
        });
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.calls.push(BackendCall::BindTexture(texture));
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize) {
        self.calls.push(BackendCall::DrawArrays { mode, first, count });
    }

    fn draw_indexed(&mut self, first_index: usize, index_count: usize) {
        self.calls.push(BackendCall::DrawIndexed {
            first_index,
            index_count,
        });
    }

    fn end_draw(&mut self) {
        self.calls.push(BackendCall::EndDraw);
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.calls.push(BackendCall::SetBlendMode(mode));
    }

    fn create_texture(&mut self, image: &ImageData) -> Result<TextureId, BackendError> {
        image.validate()?;
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.calls.push(BackendCall::CreateTexture {
            id,
            width: image.width,
            height: image.height,
        });
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.calls.push(BackendCall::DeleteTexture(texture));
    }

    fn create_shader(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ShaderId, BackendError> {
        if let Some(marker) = &self.fail_marker {
            if vertex_src.contains(marker.as_str()) || fragment_src.contains(marker.as_str()) {
                return Err(BackendError::ShaderCompile(format!(
                    "source contains `{marker}`"
                )));
            }
        }
        let id = ShaderId(self.next_shader);
        self.next_shader += 1;
        self.calls.push(BackendCall::CreateShader(id));
        Ok(id)
    }

    fn default_texture(&self) -> TextureId {
        DEFAULT_TEXTURE
    }

    fn default_shader(&self) -> ShaderId {
        DEFAULT_SHADER
    }

    fn destroy(&mut self) {
        self.calls.push(BackendCall::Destroy);
    }
}
