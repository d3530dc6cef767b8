//! CPU-side texture data for procedurally generated textures.

use corelib::{CoreError, CoreResult};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
}

impl TextureData {
    /// Wrap RGBA8 pixels; `data` must hold exactly `width * height * 4` bytes.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> CoreResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected || width == 0 || height == 0 {
            return Err(CoreError::configuration(format!(
                "RGBA8 texture {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        })
    }

    /// Square checkerboard alternating `light` and `dark` every `cell` pixels.
    pub fn checkerboard(size: u32, cell: u32, light: [u8; 4], dark: [u8; 4]) -> CoreResult<Self> {
        let cell = cell.max(1);
        let mut data = Vec::with_capacity(size as usize * size as usize * 4);

        for y in 0..size {
            for x in 0..size {
                let checker = ((x / cell) + (y / cell)) % 2;
                if checker == 0 {
                    data.extend_from_slice(&light);
                } else {
                    data.extend_from_slice(&dark);
                }
            }
        }

        Self::new_rgba8(size, size, data)
    }

    /// White/grey checkerboard with 8-pixel cells.
    pub fn create_test_texture(size: u32) -> CoreResult<Self> {
        Self::checkerboard(size, 8, [255, 255, 255, 255], [128, 128, 128, 255])
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            TextureFormat::Rgba8 => 4,
        }
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.bytes_per_pixel()
    }
}
