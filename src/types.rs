//! Plain value types shared by the batch, the backends and the drawing helpers.

use bytemuck::{Pod, Zeroable};

/// An 8-bit RGBA color, uploaded to the GPU as normalized bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Opaque white. Also the color used before any color has been set.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque red.
    pub const RED: Self = Self::new(255, 0, 0, 255);
    /// Opaque green.
    pub const GREEN: Self = Self::new(0, 255, 0, 255);
    /// Opaque blue.
    pub const BLUE: Self = Self::new(0, 0, 255, 255);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Build a color from its four channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// The channels as an array, in RGBA order.
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[u8; 4]> for Color {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

/// How consecutive vertices are assembled into primitives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveMode {
    /// Every two vertices form a line segment.
    Lines,
    /// Every three vertices form a triangle.
    Triangles,
    /// Every four vertices form a quad, drawn through the shared index buffer.
    #[default]
    Quads,
}

impl PrimitiveMode {
    /// Dead vertices needed after `vertex_count` vertices of this mode so the
    /// next quad starts on a multiple of four.
    ///
    /// Lines and triangles do not consume the quad index buffer, so a quad
    /// appended after them would otherwise read indices from the middle of a
    /// quad.
    pub fn alignment_padding(self, vertex_count: usize) -> usize {
        match self {
            Self::Lines if vertex_count < 4 => vertex_count,
            Self::Lines => vertex_count % 4,
            Self::Triangles if vertex_count < 4 => 1,
            Self::Triangles => 4 - (vertex_count % 4),
            Self::Quads => 0,
        }
    }
}

/// Opaque handle to a texture owned by a [`RenderBackend`](crate::RenderBackend).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct TextureId(pub u32);

/// Opaque handle to a shader program owned by a [`RenderBackend`](crate::RenderBackend).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderId(pub u32);

/// Color blending applied to everything drawn until the mode changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// `src * src_alpha + dst * (1 - src_alpha)`.
    #[default]
    Alpha,
    /// `src * src_alpha + dst`.
    Additive,
    /// `src * dst + dst * (1 - src_alpha)`.
    Multiplied,
    /// `src + dst * (1 - src_alpha)`, for premultiplied-alpha content.
    Premultiplied,
}

/// An axis-aligned rectangle in the batch's coordinate space.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Rectangle {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Extent along X.
    pub width: f32,
    /// Extent along Y.
    pub height: f32,
}

impl Rectangle {
    /// Build a rectangle from its origin and size.
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_padding() {
        assert_eq!(PrimitiveMode::Lines.alignment_padding(2), 2);
        assert_eq!(PrimitiveMode::Lines.alignment_padding(3), 3);
        assert_eq!(PrimitiveMode::Lines.alignment_padding(4), 0);
        assert_eq!(PrimitiveMode::Lines.alignment_padding(6), 2);
    }

    #[test]
    fn triangle_padding() {
        assert_eq!(PrimitiveMode::Triangles.alignment_padding(3), 1);
        assert_eq!(PrimitiveMode::Triangles.alignment_padding(6), 2);
        assert_eq!(PrimitiveMode::Triangles.alignment_padding(9), 3);
        assert_eq!(PrimitiveMode::Triangles.alignment_padding(12), 4);
    }

    #[test]
    fn quads_never_pad() {
        for count in [0, 4, 7, 400] {
            assert_eq!(PrimitiveMode::Quads.alignment_padding(count), 0);
        }
    }

    #[test]
    fn color_is_four_bytes() {
        assert_eq!(std::mem::size_of::<Color>(), 4);
        let bytes: &[u8] = bytemuck::cast_slice(&[Color::RED, Color::BLUE]);
        assert_eq!(bytes, &[255, 0, 0, 255, 0, 0, 255, 255]);
    }
}
