//! Decoded images and the texture-loading boundary.
//!
//! The batch only ever sees a [`TextureId`]. Decoding happens here, on the
//! CPU, through the `image` crate; uploading is delegated to the backend.
//! Failures are logged and replaced by the backend's default white texture so
//! that a missing asset renders as a blank quad instead of aborting a frame.

use crate::backend::{BackendError, RenderBackend};
use crate::types::{Color, TextureId};

/// Tightly packed RGBA8 pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// `width * height * 4` bytes.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageData {
    /// Decode a PNG or JPEG file held in memory and convert it to RGBA8.
    ///
    /// # Errors
    ///
    /// Returns the decoder's error if the format is unknown or the data is
    /// corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            pixels: rgba.into_raw(),
            width,
            height,
        })
    }

    /// An image filled with a single color.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let count = width as usize * height as usize;
        Self {
            pixels: color.to_array().repeat(count),
            width,
            height,
        }
    }

    /// Check that the dimensions are non-zero and match the pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidImage`] describing the mismatch.
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.width == 0 || self.height == 0 {
            return Err(BackendError::InvalidImage(format!(
                "zero-sized image {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(BackendError::InvalidImage(format!(
                "expected {expected} bytes for {}x{}, got {}",
                self.width,
                self.height,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}

/// Upload `image`, falling back to the default texture on failure.
pub fn upload_image<B: RenderBackend + ?Sized>(backend: &mut B, image: &ImageData) -> TextureId {
    match backend.create_texture(image) {
        Ok(id) => {
            log::debug!(
                "texture {} uploaded ({}x{})",
                id.0,
                image.width,
                image.height
            );
            id
        }
        Err(err) => {
            log::warn!("texture upload failed, using default texture: {err}");
            backend.default_texture()
        }
    }
}

/// Decode and upload an encoded image, falling back to the default texture
/// if either step fails.
pub fn load_texture<B: RenderBackend + ?Sized>(backend: &mut B, bytes: &[u8]) -> TextureId {
    match ImageData::decode(bytes) {
        Ok(image) => upload_image(backend, &image),
        Err(err) => {
            log::warn!("image decode failed, using default texture: {err}");
            backend.default_texture()
        }
    }
}
