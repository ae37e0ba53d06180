//! OpenGL backend built on [glow].
//!
//! Two profiles cover the GL variants the batch runs on:
//!
//! - [`GlProfile::Core33`]: desktop OpenGL 3.3 core. Each vertex buffer gets
//!   its own vertex array object, so a flush binds one VAO. Quad indices are
//!   32-bit.
//! - [`GlProfile::Es2`]: OpenGL ES 2.0 / WebGL 1. There are no VAOs, so the
//!   attribute pointers are rebound at every flush. Quad indices are 16-bit,
//!   which caps a vertex buffer at 65536 vertices.
//!
//! Colors are uploaded as four normalized unsigned bytes per vertex;
//! positions and texcoords as floats. The three streams live in separate
//! buffer objects, matching the CPU-side layout, so an upload is three
//! `glBufferSubData` calls and no interleaving pass.
//!
//! [glow]: https://docs.rs/glow

use std::sync::Arc;

use glam::Mat4;
use glow::{HasContext, PixelUnpackData};

use super::{BackendError, RenderBackend, VertexData};
use crate::shaders;
use crate::texture::ImageData;
use crate::types::{BlendMode, Color, PrimitiveMode, ShaderId, TextureId};

/// Texture id of the 1x1 white texture. Always slot zero.
const DEFAULT_TEXTURE: TextureId = TextureId(0);

/// Shader id of the built-in program. Always slot zero.
const DEFAULT_SHADER: ShaderId = ShaderId(0);

/// Byte stride of one position.
const POSITION_STRIDE: usize = std::mem::size_of::<[f32; 3]>();
/// Byte stride of one texcoord.
const TEXCOORD_STRIDE: usize = std::mem::size_of::<[f32; 2]>();
/// Byte stride of one color.
const COLOR_STRIDE: usize = std::mem::size_of::<Color>();

/// Convert a size or offset to the `i32` GL expects.
///
/// # Panics
///
/// Panics if `value > i32::MAX`. Buffer capacities are bounded by
/// [`BatchConfig`](crate::BatchConfig) and far below this in practice.
fn gl_size(value: usize) -> i32 {
    i32::try_from(value).expect("size exceeds i32::MAX")
}

/// Which OpenGL variant the context provides.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GlProfile {
    /// Desktop OpenGL 3.3 core profile.
    Core33,
    /// OpenGL ES 2.0 (or WebGL 1).
    Es2,
}

impl GlProfile {
    fn default_sources(self) -> (&'static str, &'static str) {
        match self {
            Self::Core33 => (shaders::CORE_VERTEX_SRC, shaders::CORE_FRAGMENT_SRC),
            Self::Es2 => (shaders::ES2_VERTEX_SRC, shaders::ES2_FRAGMENT_SRC),
        }
    }

    fn max_indexed_vertices(self) -> usize {
        match self {
            Self::Core33 => usize::try_from(u32::MAX).unwrap_or(usize::MAX),
            Self::Es2 => usize::from(u16::MAX) + 1,
        }
    }

    /// Quad indices as uploaded for this profile: the raw bytes, the GL
    /// element type and the byte size of one index.
    fn encode_indices(
        self,
        indices: &[u32],
        capacity: usize,
    ) -> Result<(Vec<u8>, u32, usize), BackendError> {
        match self {
            Self::Core33 => Ok((
                bytemuck::cast_slice(indices).to_vec(),
                glow::UNSIGNED_INT,
                std::mem::size_of::<u32>(),
            )),
            Self::Es2 => {
                let short: Vec<u16> = indices
                    .iter()
                    .map(|&i| u16::try_from(i))
                    .collect::<Result<_, _>>()
                    .map_err(|_| BackendError::IndexOverflow { vertices: capacity })?;
                Ok((
                    bytemuck::cast_slice(&short).to_vec(),
                    glow::UNSIGNED_SHORT,
                    std::mem::size_of::<u16>(),
                ))
            }
        }
    }

    /// Internal format passed to `glTexImage2D`. ES 2.0 only accepts
    /// unsized formats.
    #[expect(clippy::cast_possible_wrap)]
    fn rgba_internal_format(self) -> i32 {
        match self {
            Self::Core33 => glow::RGBA8 as i32,
            Self::Es2 => glow::RGBA as i32,
        }
    }
}

/// GPU objects backing one CPU-side vertex buffer.
struct GpuBuffer {
    /// Only created for [`GlProfile::Core33`].
    vao: Option<glow::VertexArray>,
    positions: glow::Buffer,
    texcoords: glow::Buffer,
    colors: glow::Buffer,
}

/// The shared quad index buffer.
struct IndexBuffer {
    buffer: glow::Buffer,
    /// `UNSIGNED_INT` or `UNSIGNED_SHORT`.
    element_type: u32,
    element_size: usize,
}

/// A linked program and its batch uniforms.
struct GlProgram {
    program: glow::Program,
    /// `mvp`; absent if the program optimized it out.
    mvp: Option<glow::UniformLocation>,
    /// `texture0`; absent for programs that never sample.
    texture: Option<glow::UniformLocation>,
}

/// A [`RenderBackend`] drawing through an OpenGL context.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>) {
/// use glbatch::backend::gl::{GlProfile, GlowBackend};
/// use glbatch::{Color, PrimitiveMode, RenderBatch};
///
/// let backend = unsafe { GlowBackend::new(gl, GlProfile::Core33) }.unwrap();
/// let mut batch = RenderBatch::new(backend);
///
/// batch.begin(PrimitiveMode::Triangles);
/// batch.put_color(Color::RED);
/// batch.put_vertex(-0.5, -0.5, 0.0);
/// batch.put_vertex(0.5, -0.5, 0.0);
/// batch.put_vertex(0.0, 0.5, 0.0);
/// batch.end();
/// batch.flush();
/// # }
/// ```
pub struct GlowBackend {
    gl: Arc<glow::Context>,
    profile: GlProfile,
    buffers: Vec<GpuBuffer>,
    indices: Option<IndexBuffer>,
    /// Indexed by [`TextureId`]; `None` once deleted.
    textures: Vec<Option<glow::Texture>>,
    /// Indexed by [`ShaderId`].
    programs: Vec<GlProgram>,
    /// Buffer bound by the last [`begin_draw`](RenderBackend::begin_draw).
    bound_buffer: Option<usize>,
}

impl GlowBackend {
    /// Create the backend: compile the default program and upload the 1x1
    /// white default texture.
    ///
    /// Vertex storage is allocated later, by
    /// [`init_buffers`](RenderBackend::init_buffers), when the batch knows
    /// its capacity.
    ///
    /// # Safety
    ///
    /// The GL context must be current on the calling thread, and must stay
    /// current whenever any method of the returned backend is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the default program fails to compile or link, or
    /// if the driver refuses to create the default texture.
    pub unsafe fn new(gl: Arc<glow::Context>, profile: GlProfile) -> Result<Self, BackendError> {
        let (vertex_src, fragment_src) = profile.default_sources();
        let program = unsafe { Self::link(&gl, vertex_src, fragment_src) }?;

        let mut backend = Self {
            gl,
            profile,
            buffers: Vec::new(),
            indices: None,
            textures: Vec::new(),
            programs: vec![program],
            bound_buffer: None,
        };

        let white = ImageData::solid(1, 1, Color::WHITE);
        let default_texture = unsafe { backend.upload(&white) }?;
        backend.textures.push(Some(default_texture));

        unsafe {
            backend.gl.enable(glow::BLEND);
            backend.gl.disable(glow::CULL_FACE);
        }

        log::debug!("GL backend ready ({profile:?})");
        Ok(backend)
    }

    /// The profile this backend was created with.
    pub fn profile(&self) -> GlProfile {
        self.profile
    }

    /// The GL context.
    pub fn context(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    unsafe fn link(
        gl: &glow::Context,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<GlProgram, BackendError> {
        unsafe {
            let program = shaders::compile_program(gl, vertex_src, fragment_src)?;
            Ok(GlProgram {
                program,
                mvp: gl.get_uniform_location(program, shaders::UNIFORM_MVP),
                texture: gl.get_uniform_location(program, shaders::UNIFORM_TEXTURE),
            })
        }
    }

    unsafe fn upload(&self, image: &ImageData) -> Result<glow::Texture, BackendError> {
        image.validate()?;
        let gl = &self.gl;
        let texture = unsafe { gl.create_texture() }.map_err(BackendError::Gl)?;
        let width = i32::try_from(image.width)
            .map_err(|_| BackendError::InvalidImage(format!("width {} too large", image.width)))?;
        let height = i32::try_from(image.height).map_err(|_| {
            BackendError::InvalidImage(format!("height {} too large", image.height))
        })?;

        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                self.profile.rgba_internal_format(),
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(&image.pixels)),
            );
            Self::set_default_tex_params(gl);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(texture)
    }

    /// Set default texture filtering and wrapping parameters.
    unsafe fn set_default_tex_params(gl: &glow::Context) {
        // GL constant values are small enough that the cast is always safe.
        #[expect(clippy::cast_possible_wrap)]
        unsafe {
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
        }
    }

    /// Point attributes 0..=2 at `buffer`'s streams. Binds the array buffer
    /// as a side effect.
    unsafe fn bind_attributes(gl: &glow::Context, buffer: &GpuBuffer) {
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.positions));
            gl.enable_vertex_attrib_array(shaders::LOCATION_POSITION);
            gl.vertex_attrib_pointer_f32(
                shaders::LOCATION_POSITION,
                3,
                glow::FLOAT,
                false,
                gl_size(POSITION_STRIDE),
                0,
            );

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.texcoords));
            gl.enable_vertex_attrib_array(shaders::LOCATION_TEXCOORD);
            gl.vertex_attrib_pointer_f32(
                shaders::LOCATION_TEXCOORD,
                2,
                glow::FLOAT,
                false,
                gl_size(TEXCOORD_STRIDE),
                0,
            );

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.colors));
            gl.enable_vertex_attrib_array(shaders::LOCATION_COLOR);
            gl.vertex_attrib_pointer_f32(
                shaders::LOCATION_COLOR,
                4,
                glow::UNSIGNED_BYTE,
                true,
                gl_size(COLOR_STRIDE),
                0,
            );
        }
    }

    unsafe fn create_gpu_buffer(
        &self,
        capacity: usize,
        element_buffer: glow::Buffer,
    ) -> Result<GpuBuffer, BackendError> {
        let gl = &self.gl;
        unsafe {
            let make = |stride: usize| -> Result<glow::Buffer, BackendError> {
                let buffer = gl.create_buffer().map_err(BackendError::Gl)?;
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
                gl.buffer_data_size(
                    glow::ARRAY_BUFFER,
                    gl_size(capacity * stride),
                    glow::DYNAMIC_DRAW,
                );
                Ok(buffer)
            };
            let positions = make(POSITION_STRIDE)?;
            let texcoords = make(TEXCOORD_STRIDE)?;
            let colors = make(COLOR_STRIDE)?;

            let mut buffer = GpuBuffer {
                vao: None,
                positions,
                texcoords,
                colors,
            };

            if self.profile == GlProfile::Core33 {
                let vao = gl.create_vertex_array().map_err(BackendError::Gl)?;
                gl.bind_vertex_array(Some(vao));
                Self::bind_attributes(gl, &buffer);
                // Element array binding is part of VAO state.
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(element_buffer));
                gl.bind_vertex_array(None);
                buffer.vao = Some(vao);
            }

            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok(buffer)
        }
    }

    /// Upload the quad indices. Core profiles reject element array uploads
    /// with no vertex array bound, so the first VAO is bound around it.
    unsafe fn fill_index_buffer(&self, buffer: glow::Buffer, bytes: &[u8]) {
        let gl = &self.gl;
        let vao = self.buffers.first().and_then(|gpu| gpu.vao);
        if self.profile == GlProfile::Core33 && vao.is_none() {
            log::warn!("no vertex array to upload quad indices through");
            return;
        }
        unsafe {
            if vao.is_some() {
                gl.bind_vertex_array(vao);
            }
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, bytes, glow::STATIC_DRAW);
            // Unbinding the element buffer inside a VAO would detach it.
            if vao.is_some() {
                gl.bind_vertex_array(None);
            } else {
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
            }
        }
    }

    unsafe fn delete_gpu_buffers(&mut self) {
        let gl = &self.gl;
        for buffer in self.buffers.drain(..) {
            unsafe {
                if let Some(vao) = buffer.vao {
                    gl.delete_vertex_array(vao);
                }
                gl.delete_buffer(buffer.positions);
                gl.delete_buffer(buffer.texcoords);
                gl.delete_buffer(buffer.colors);
            }
        }
        if let Some(indices) = self.indices.take() {
            unsafe { gl.delete_buffer(indices.buffer) };
        }
    }

    fn texture(&self, id: TextureId) -> Option<glow::Texture> {
        self.textures.get(id.0 as usize).copied().flatten()
    }

    fn program(&self, id: ShaderId) -> Option<&GlProgram> {
        self.programs
            .get(id.0 as usize)
            .or_else(|| self.programs.get(DEFAULT_SHADER.0 as usize))
    }
}

impl RenderBackend for GlowBackend {
    fn init_buffers(
        &mut self,
        count: usize,
        capacity: usize,
        indices: &[u32],
    ) -> Result<(), BackendError> {
        if capacity > self.profile.max_indexed_vertices() {
            return Err(BackendError::IndexOverflow { vertices: capacity });
        }

        let (bytes, element_type, element_size) = self.profile.encode_indices(indices, capacity)?;

        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            self.delete_gpu_buffers();

            let buffer = self.gl.create_buffer().map_err(BackendError::Gl)?;
            self.indices = Some(IndexBuffer {
                buffer,
                element_type,
                element_size,
            });

            for _ in 0..count {
                let gpu = self.create_gpu_buffer(capacity, buffer)?;
                self.buffers.push(gpu);
            }
            self.fill_index_buffer(buffer, &bytes);
        }

        log::debug!(
            "allocated {count} GPU vertex buffer(s) of {capacity} vertices ({:?})",
            self.profile
        );
        Ok(())
    }

    fn upload_vertices(&mut self, buffer: usize, data: VertexData<'_>) {
        let Some(gpu) = self.buffers.get(buffer) else {
            log::error!("upload to unknown vertex buffer {buffer}");
            return;
        };
        let gl = &self.gl;
        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(gpu.positions));
            gl.buffer_sub_data_u8_slice(
                glow::ARRAY_BUFFER,
                0,
                bytemuck::cast_slice(data.positions),
            );
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(gpu.texcoords));
            gl.buffer_sub_data_u8_slice(
                glow::ARRAY_BUFFER,
                0,
                bytemuck::cast_slice(data.texcoords),
            );
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(gpu.colors));
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytemuck::cast_slice(data.colors));
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn begin_draw(&mut self, buffer: usize, shader: ShaderId, mvp: &Mat4) {
        let Some(gpu) = self.buffers.get(buffer) else {
            log::error!("draw from unknown vertex buffer {buffer}");
            self.bound_buffer = None;
            return;
        };
        let Some(program) = self.program(shader) else {
            log::error!("no shader program available after destroy");
            self.bound_buffer = None;
            return;
        };
        let gl = &self.gl;

        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            gl.use_program(Some(program.program));
            gl.uniform_matrix_4_f32_slice(program.mvp.as_ref(), false, &mvp.to_cols_array());
            gl.uniform_1_i32(program.texture.as_ref(), 0);
            gl.active_texture(glow::TEXTURE0);

            match gpu.vao {
                Some(vao) => gl.bind_vertex_array(Some(vao)),
                None => {
                    Self::bind_attributes(gl, gpu);
                    if let Some(indices) = &self.indices {
                        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(indices.buffer));
                    }
                }
            }
        }
        self.bound_buffer = Some(buffer);
    }

    fn bind_texture(&mut self, texture: TextureId) {
        let handle = self.texture(texture).or_else(|| self.texture(DEFAULT_TEXTURE));
        // SAFETY: the context is current per the contract of `new`.
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, handle) };
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize) {
        if self.bound_buffer.is_none() {
            return;
        }
        let gl_mode = match mode {
            PrimitiveMode::Lines => glow::LINES,
            PrimitiveMode::Triangles => glow::TRIANGLES,
            // Quads are never drawn as arrays; the batch indexes them.
            PrimitiveMode::Quads => {
                log::warn!("draw_arrays called with quads; use draw_indexed");
                return;
            }
        };
        // SAFETY: the context is current per the contract of `new`.
        unsafe { self.gl.draw_arrays(gl_mode, gl_size(first), gl_size(count)) };
    }

    fn draw_indexed(&mut self, first_index: usize, index_count: usize) {
        let (Some(_), Some(indices)) = (self.bound_buffer, &self.indices) else {
            return;
        };
        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            self.gl.draw_elements(
                glow::TRIANGLES,
                gl_size(index_count),
                indices.element_type,
                gl_size(first_index * indices.element_size),
            );
        }
    }

    fn end_draw(&mut self) {
        let gl = &self.gl;
        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            match self.profile {
                GlProfile::Core33 => gl.bind_vertex_array(None),
                GlProfile::Es2 => {
                    gl.bind_buffer(glow::ARRAY_BUFFER, None);
                    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
                }
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);
        }
        self.bound_buffer = None;
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        let (src, dst) = match mode {
            BlendMode::Alpha => (glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA),
            BlendMode::Additive => (glow::SRC_ALPHA, glow::ONE),
            BlendMode::Multiplied => (glow::DST_COLOR, glow::ONE_MINUS_SRC_ALPHA),
            BlendMode::Premultiplied => (glow::ONE, glow::ONE_MINUS_SRC_ALPHA),
        };
        // SAFETY: the context is current per the contract of `new`.
        unsafe { self.gl.blend_func(src, dst) };
    }

    fn create_texture(&mut self, image: &ImageData) -> Result<TextureId, BackendError> {
        // SAFETY: the context is current per the contract of `new`.
        let texture = unsafe { self.upload(image) }?;
        let id = u32::try_from(self.textures.len())
            .map_err(|_| BackendError::Gl("texture table full".to_owned()))?;
        self.textures.push(Some(texture));
        Ok(TextureId(id))
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if texture == DEFAULT_TEXTURE {
            log::warn!("refusing to delete the default texture");
            return;
        }
        if let Some(handle) = self
            .textures
            .get_mut(texture.0 as usize)
            .and_then(Option::take)
        {
            // SAFETY: the context is current per the contract of `new`.
            unsafe { self.gl.delete_texture(handle) };
        }
    }

    fn create_shader(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ShaderId, BackendError> {
        // SAFETY: the context is current per the contract of `new`.
        let program = unsafe { Self::link(&self.gl, vertex_src, fragment_src) }?;
        let id = u32::try_from(self.programs.len())
            .map_err(|_| BackendError::Gl("shader table full".to_owned()))?;
        self.programs.push(program);
        Ok(ShaderId(id))
    }

    fn default_texture(&self) -> TextureId {
        DEFAULT_TEXTURE
    }

    fn default_shader(&self) -> ShaderId {
        DEFAULT_SHADER
    }

    fn destroy(&mut self) {
        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            self.delete_gpu_buffers();
            for texture in self.textures.drain(..).flatten() {
                self.gl.delete_texture(texture);
            }
            for program in self.programs.drain(..) {
                self.gl.delete_program(program.program);
            }
        }
        log::debug!("GL backend destroyed");
    }
}
