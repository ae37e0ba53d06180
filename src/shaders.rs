//! GLSL sources for the default program, and program compilation.
//!
//! Every program the batch draws with consumes the same vertex layout:
//!
//! | Attribute        | Location | Type   | Source stream      |
//! |------------------|----------|--------|--------------------|
//! | `vertexPosition` | 0        | `vec3` | positions          |
//! | `vertexTexCoord` | 1        | `vec2` | texcoords          |
//! | `vertexColor`    | 2        | `vec4` | colors, normalized |
//!
//! plus an `mvp` matrix uniform and a `texture0` sampler bound to unit 0.
//! Locations are fixed with `glBindAttribLocation` before linking, so custom
//! programs don't need `layout` qualifiers.

#[cfg(feature = "glow")]
use glow::HasContext;

#[cfg(feature = "glow")]
use crate::backend::BackendError;

/// Name of the position attribute.
pub const ATTRIB_POSITION: &str = "vertexPosition";
/// Name of the texcoord attribute.
pub const ATTRIB_TEXCOORD: &str = "vertexTexCoord";
/// Name of the color attribute.
pub const ATTRIB_COLOR: &str = "vertexColor";
/// Name of the model-view-projection uniform.
pub const UNIFORM_MVP: &str = "mvp";
/// Name of the sampler uniform.
pub const UNIFORM_TEXTURE: &str = "texture0";

/// Attribute location of [`ATTRIB_POSITION`].
pub const LOCATION_POSITION: u32 = 0;
/// Attribute location of [`ATTRIB_TEXCOORD`].
pub const LOCATION_TEXCOORD: u32 = 1;
/// Attribute location of [`ATTRIB_COLOR`].
pub const LOCATION_COLOR: u32 = 2;

/// Default vertex shader, GLSL 3.30 core.
pub const CORE_VERTEX_SRC: &str = r"#version 330

in vec3 vertexPosition;
in vec2 vertexTexCoord;
in vec4 vertexColor;

uniform mat4 mvp;

out vec2 fragTexCoord;
out vec4 fragColor;

void main() {
    fragTexCoord = vertexTexCoord;
    fragColor = vertexColor;
    gl_Position = mvp * vec4(vertexPosition, 1.0);
}
";

/// Default fragment shader, GLSL 3.30 core.
///
/// Output is the sampled texel tinted by the vertex color. With the default
/// 1x1 white texture bound this is just the vertex color.
pub const CORE_FRAGMENT_SRC: &str = r"#version 330

in vec2 fragTexCoord;
in vec4 fragColor;

uniform sampler2D texture0;

out vec4 finalColor;

void main() {
    finalColor = texture(texture0, fragTexCoord) * fragColor;
}
";

/// Default vertex shader, GLSL ES 1.00.
pub const ES2_VERTEX_SRC: &str = r"#version 100

attribute vec3 vertexPosition;
attribute vec2 vertexTexCoord;
attribute vec4 vertexColor;

uniform mat4 mvp;

varying vec2 fragTexCoord;
varying vec4 fragColor;

void main() {
    fragTexCoord = vertexTexCoord;
    fragColor = vertexColor;
    gl_Position = mvp * vec4(vertexPosition, 1.0);
}
";

/// Default fragment shader, GLSL ES 1.00.
pub const ES2_FRAGMENT_SRC: &str = r"#version 100

precision mediump float;

varying vec2 fragTexCoord;
varying vec4 fragColor;

uniform sampler2D texture0;

void main() {
    gl_FragColor = texture2D(texture0, fragTexCoord) * fragColor;
}
";

/// Compile a shader program from vertex and fragment source strings.
///
/// The batch's attribute names are bound to their fixed locations before
/// linking. The compiled shader objects are detached and deleted after a
/// successful link, so only the program handle needs to be cleaned up by the
/// caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Returns [`BackendError::ShaderCompile`] or [`BackendError::ShaderLink`]
/// with the driver's info log.
#[cfg(feature = "glow")]
pub unsafe fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program, BackendError> {
    let program = unsafe { gl.create_program() }.map_err(BackendError::Gl)?;

    let vs = match unsafe { compile_shader(gl, glow::VERTEX_SHADER, vertex_src) } {
        Ok(vs) => vs,
        Err(err) => {
            unsafe { gl.delete_program(program) };
            return Err(err);
        }
    };
    let fs = match unsafe { compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) } {
        Ok(fs) => fs,
        Err(err) => {
            unsafe {
                gl.delete_shader(vs);
                gl.delete_program(program);
            }
            return Err(err);
        }
    };

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.bind_attrib_location(program, LOCATION_POSITION, ATTRIB_POSITION);
        gl.bind_attrib_location(program, LOCATION_TEXCOORD, ATTRIB_TEXCOORD);
        gl.bind_attrib_location(program, LOCATION_COLOR, ATTRIB_COLOR);
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(BackendError::ShaderLink(log));
        }

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
    }

    Ok(program)
}

/// Compile a single shader stage (vertex or fragment) from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
#[cfg(feature = "glow")]
unsafe fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    source: &str,
) -> Result<glow::Shader, BackendError> {
    unsafe {
        let shader = gl.create_shader(shader_type).map_err(BackendError::Gl)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(BackendError::ShaderCompile(log));
        }

        Ok(shader)
    }
}
