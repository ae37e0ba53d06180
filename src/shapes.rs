//! Convenience drawing on top of [`RenderBatch`].
//!
//! Every function here is plain `begin` / `put_*` / `end` traffic: nothing
//! touches the backend directly. Shapes whose vertex count is known up front
//! call [`RenderBatch::ensure_capacity`] first, so a shape that fits in a
//! buffer is never split across two flushes.
//!
//! Paths are tessellated with [lyon] and submitted as triangle lists.
//!
//! [lyon]: https://docs.rs/lyon

use glam::{Vec2, Vec3};
use lyon::path::Path;
use lyon::tessellation::*;

use crate::backend::RenderBackend;
use crate::batch::RenderBatch;
use crate::types::{Color, PrimitiveMode, Rectangle, TextureId};

/// Segments used to approximate a circle.
pub const CIRCLE_SEGMENTS: usize = 36;

/// Flattening tolerance for path tessellation, in world units.
const TOLERANCE: f32 = 0.01;

/// Draw a one-pixel line.
pub fn draw_line<B: RenderBackend>(batch: &mut RenderBatch<B>, start: Vec2, end: Vec2, color: Color) {
    batch.begin(PrimitiveMode::Lines);
    batch.put_color(color);
    batch.put_vertex2(start.x, start.y);
    batch.put_vertex2(end.x, end.y);
    batch.end();
}

/// Draw a filled triangle. Vertices should be counter-clockwise.
pub fn draw_triangle<B: RenderBackend>(
    batch: &mut RenderBatch<B>,
    v1: Vec2,
    v2: Vec2,
    v3: Vec2,
    color: Color,
) {
    batch.ensure_capacity(3);
    batch.begin(PrimitiveMode::Triangles);
    batch.put_color(color);
    batch.put_vertex2(v1.x, v1.y);
    batch.put_vertex2(v2.x, v2.y);
    batch.put_vertex2(v3.x, v3.y);
    batch.end();
}

/// Draw an axis-aligned filled rectangle.
pub fn draw_rectangle<B: RenderBackend>(batch: &mut RenderBatch<B>, rect: Rectangle, color: Color) {
    draw_rectangle_pro(batch, rect, Vec2::ZERO, 0.0, color);
}

/// Draw a filled rectangle rotated by `rotation_degrees` about `origin`,
/// which is relative to the rectangle's top-left corner.
///
/// The rotation goes through the transform accumulator, so the model-view
/// matrix is left alone.
pub fn draw_rectangle_pro<B: RenderBackend>(
    batch: &mut RenderBatch<B>,
    rect: Rectangle,
    origin: Vec2,
    rotation_degrees: f32,
    color: Color,
) {
    batch.ensure_capacity(4);

    let matrices = batch.matrices_mut();
    matrices.push();
    matrices.translate(rect.x, rect.y, 0.0);
    matrices.rotate(rotation_degrees, Vec3::Z);
    matrices.translate(-origin.x, -origin.y, 0.0);

    batch.begin(PrimitiveMode::Quads);
    batch.put_color(color);
    batch.put_vertex2(0.0, 0.0);
    batch.put_vertex2(0.0, rect.height);
    batch.put_vertex2(rect.width, rect.height);
    batch.put_vertex2(rect.width, 0.0);
    batch.end();

    pop_local(batch);
}

/// Draw a filled circle as a fan of [`CIRCLE_SEGMENTS`] triangles.
pub fn draw_circle<B: RenderBackend>(
    batch: &mut RenderBatch<B>,
    center: Vec2,
    radius: f32,
    color: Color,
) {
    batch.ensure_capacity(3 * CIRCLE_SEGMENTS);

    #[expect(clippy::cast_precision_loss)]
    let step = std::f32::consts::TAU / CIRCLE_SEGMENTS as f32;
    let point = |angle: f32| center + Vec2::from_angle(angle) * radius;

    batch.begin(PrimitiveMode::Triangles);
    batch.put_color(color);
    let mut angle = 0.0_f32;
    for _ in 0..CIRCLE_SEGMENTS {
        let a = point(angle);
        let b = point(angle + step);
        batch.put_vertex2(center.x, center.y);
        batch.put_vertex2(b.x, b.y);
        batch.put_vertex2(a.x, a.y);
        angle += step;
    }
    batch.end();
}

/// Draw the `source` region of a texture into an unscaled quad at `dest`.
///
/// `texture_size` is the full texture's size in pixels, used to normalize
/// `source` into texcoords. A negative `source.width` or `source.height`
/// flips the image on that axis. The default texture is rebound afterwards.
pub fn draw_texture_rec<B: RenderBackend>(
    batch: &mut RenderBatch<B>,
    texture: TextureId,
    texture_size: Vec2,
    source: Rectangle,
    dest: Vec2,
    tint: Color,
) {
    if texture_size.x <= 0.0 || texture_size.y <= 0.0 {
        log::warn!("draw_texture_rec with empty texture size {texture_size}");
        return;
    }

    let width = source.width.abs();
    let height = source.height.abs();

    let (mut u0, mut u1) = (source.x / texture_size.x, (source.x + width) / texture_size.x);
    let (mut v0, mut v1) = (source.y / texture_size.y, (source.y + height) / texture_size.y);
    if source.width < 0.0 {
        std::mem::swap(&mut u0, &mut u1);
    }
    if source.height < 0.0 {
        std::mem::swap(&mut v0, &mut v1);
    }

    batch.ensure_capacity(4);
    batch.set_texture(texture);

    batch.begin(PrimitiveMode::Quads);
    batch.put_color(tint);
    batch.put_texcoord(u0, v0);
    batch.put_vertex2(dest.x, dest.y);
    batch.put_texcoord(u0, v1);
    batch.put_vertex2(dest.x, dest.y + height);
    batch.put_texcoord(u1, v1);
    batch.put_vertex2(dest.x + width, dest.y + height);
    batch.put_texcoord(u1, v0);
    batch.put_vertex2(dest.x + width, dest.y);
    batch.end();

    batch.clear_texture();
}

/// Fill `path` using the non-zero rule.
///
/// Returns the number of vertices submitted, or zero if tessellation failed
/// (which is logged).
pub fn fill_path<B: RenderBackend>(batch: &mut RenderBatch<B>, path: &Path, color: Color) -> usize {
    let mut geometry: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();

    let result = tessellator.tessellate_path(
        path,
        &FillOptions::tolerance(TOLERANCE).with_fill_rule(FillRule::NonZero),
        &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| {
            vertex.position().to_array()
        }),
    );

    match result {
        Ok(()) => submit_triangles(batch, &geometry, color),
        Err(err) => {
            log::warn!("path fill tessellation failed: {err:?}");
            0
        }
    }
}

/// Stroke `path` with lines `width` units wide.
///
/// Returns the number of vertices submitted, or zero if tessellation failed
/// (which is logged).
pub fn stroke_path<B: RenderBackend>(
    batch: &mut RenderBatch<B>,
    path: &Path,
    width: f32,
    color: Color,
) -> usize {
    let mut geometry: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut tessellator = StrokeTessellator::new();

    let result = tessellator.tessellate_path(
        path,
        &StrokeOptions::tolerance(TOLERANCE).with_line_width(width),
        &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| {
            vertex.position().to_array()
        }),
    );

    match result {
        Ok(()) => submit_triangles(batch, &geometry, color),
        Err(err) => {
            log::warn!("path stroke tessellation failed: {err:?}");
            0
        }
    }
}

/// Expand an indexed mesh into a triangle list.
fn submit_triangles<B: RenderBackend>(
    batch: &mut RenderBatch<B>,
    geometry: &VertexBuffers<[f32; 2], u32>,
    color: Color,
) -> usize {
    let count = geometry.indices.len();
    if count == 0 {
        return 0;
    }

    batch.ensure_capacity(count);
    batch.begin(PrimitiveMode::Triangles);
    batch.put_color(color);
    for &index in &geometry.indices {
        let [x, y] = geometry.vertices[index as usize];
        batch.put_vertex2(x, y);
    }
    batch.end();
    count
}

/// Undo the push of a local transform.
///
/// `end()` unwinds the whole stack when it flushes near capacity; popping
/// again would only log an underflow.
fn pop_local<B: RenderBackend>(batch: &mut RenderBatch<B>) {
    let matrices = batch.matrices_mut();
    if matrices.depth() > 0 {
        matrices.pop();
    }
}
