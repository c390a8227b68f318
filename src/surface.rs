// surface.rs - 输出画面缓冲

use std::path::Path;

use image::RgbaImage;

use crate::error::RenderResult;
use crate::raster::LineWalk;

/// Destination RGBA8 buffer sized to the viewport.
///
/// Created opaque black. Renderers overwrite the colour channels every
/// frame and leave alpha alone.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl OutputSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let mut surface = Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        };
        surface.clear([0, 0, 0]);
        surface
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reallocate for a new viewport. Contents are reset when the size
    /// actually changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width != self.width || height != self.height {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self, rgb: [u8; 3]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px[..3].copy_from_slice(&rgb);
            px[3] = 255;
        }
    }

    #[inline]
    pub fn pixel_index(&self, x: u32, y: u32) -> usize {
        4 * (y as usize * self.width as usize + x as usize)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let o = self.pixel_index(x, y);
        [
            self.pixels[o],
            self.pixels[o + 1],
            self.pixels[o + 2],
            self.pixels[o + 3],
        ]
    }

    /// Write colour channels only.
    #[inline]
    pub fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let o = self.pixel_index(x, y);
        self.pixels[o..o + 3].copy_from_slice(&rgb);
    }

    /// One destination row, four bytes per pixel.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &mut self.pixels[start..start + stride]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Plot a line, clipping anything outside the surface.
    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), rgb: [u8; 3]) {
        for (x, y) in LineWalk::new(from, to) {
            if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
                self.put_rgb(x as u32, y as u32, rgb);
            }
        }
    }

    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        self.to_image().save(path)?;
        Ok(())
    }
}
