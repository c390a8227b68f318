// texture.rs - 全景纹理缓冲 (正方形, 2 的幂)

use image::{imageops::FilterType, GenericImage, Rgba, RgbaImage};

use crate::error::{RenderError, RenderResult};

/// Geometry of a panorama texture, without the pixels.
///
/// This is all the projection needs, and all the GPU path keeps once the
/// texels are uploaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureLayout {
    /// Side length of the square buffer.
    pub resolution: u32,
    /// Rows actually covered by image data.
    pub panorama_height: f32,
}

impl TextureLayout {
    pub fn new(resolution: u32, panorama_height: f32) -> Self {
        Self {
            resolution,
            panorama_height,
        }
    }

    /// First image row. The image sits vertically centred in the square,
    /// pasted at a whole row, so an odd leftover puts the extra row below.
    pub fn vertical_offset(&self) -> f32 {
        ((self.resolution as f32 - self.panorama_height) * 0.5).floor()
    }
}

/// Decoded equirectangular image in a square RGBA8 buffer.
///
/// Horizontal reads wrap (longitude), vertical reads clamp to the buffer.
#[derive(Debug, Clone)]
pub struct PanoramaTexture {
    layout: TextureLayout,
    pixels: Vec<u8>,
}

impl PanoramaTexture {
    pub fn new(resolution: u32, pixels: Vec<u8>, panorama_height: f32) -> RenderResult<Self> {
        if !resolution.is_power_of_two() {
            return Err(RenderError::NotPowerOfTwo(resolution));
        }
        let expected = resolution as usize * resolution as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        if !(panorama_height > 0.0 && panorama_height <= resolution as f32) {
            return Err(RenderError::PanoramaHeight {
                height: panorama_height,
                resolution,
            });
        }

        Ok(Self {
            layout: TextureLayout::new(resolution, panorama_height),
            pixels,
        })
    }

    /// Resample a decoded image into a `resolution`² buffer.
    ///
    /// The image is stretched to the full width and keeps its aspect ratio
    /// vertically (capped at the buffer height), centred on an opaque black
    /// canvas.
    pub fn from_image(img: &RgbaImage, resolution: u32) -> RenderResult<Self> {
        if !resolution.is_power_of_two() {
            return Err(RenderError::NotPowerOfTwo(resolution));
        }
        let (src_w, src_h) = img.dimensions();
        if src_w == 0 || src_h == 0 {
            return Err(RenderError::PanoramaHeight {
                height: src_h as f32,
                resolution,
            });
        }

        let scale = resolution as f32 / src_w as f32;
        let scaled_h = ((src_h as f32 * scale).round() as u32).clamp(1, resolution);

        let scaled = image::imageops::resize(img, resolution, scaled_h, FilterType::Lanczos3);

        let mut canvas = RgbaImage::from_pixel(resolution, resolution, Rgba([0, 0, 0, 255]));
        let y_offset = (resolution - scaled_h) / 2;
        canvas.copy_from(&scaled, 0, y_offset)?;

        log::debug!(
            "panorama {}x{} -> {}² texture, visible rows {}..{}",
            src_w,
            src_h,
            resolution,
            y_offset,
            y_offset + scaled_h
        );

        Self::new(resolution, canvas.into_raw(), scaled_h as f32)
    }

    /// Same panorama at a smaller power-of-two resolution.
    pub fn downsampled(&self, resolution: u32) -> RenderResult<Self> {
        if !resolution.is_power_of_two() {
            return Err(RenderError::NotPowerOfTwo(resolution));
        }
        if resolution >= self.layout.resolution {
            return Ok(self.clone());
        }
        let r = self.layout.resolution;
        let square = RgbaImage::from_raw(r, r, self.pixels.clone()).ok_or(RenderError::BufferSize {
            expected: r as usize * r as usize * 4,
            actual: self.pixels.len(),
        })?;
        let scaled = image::imageops::resize(&square, resolution, resolution, FilterType::Lanczos3);
        let scale = resolution as f32 / r as f32;
        let panorama_height = (self.layout.panorama_height * scale).clamp(1.0, resolution as f32);

        Self::new(resolution, scaled.into_raw(), panorama_height)
    }

    pub fn layout(&self) -> TextureLayout {
        self.layout
    }

    pub fn resolution(&self) -> u32 {
        self.layout.resolution
    }

    pub fn panorama_height(&self) -> f32 {
        self.layout.panorama_height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Byte offset of a texel; `x` wraps, `y` clamps.
    #[inline]
    pub fn offset(&self, x: i32, y: i32) -> usize {
        let r = self.layout.resolution as i32;
        let x = x.rem_euclid(r);
        let y = y.clamp(0, r - 1);
        4 * (y as usize * r as usize + x as usize)
    }

    #[inline]
    pub fn rgb(&self, x: i32, y: i32) -> [u8; 3] {
        let o = self.offset(x, y);
        [self.pixels[o], self.pixels[o + 1], self.pixels[o + 2]]
    }

    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        let o = self.offset(x, y);
        [
            self.pixels[o],
            self.pixels[o + 1],
            self.pixels[o + 2],
            self.pixels[o + 3],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(resolution: u32) -> PanoramaTexture {
        let mut pixels = Vec::with_capacity((resolution * resolution * 4) as usize);
        for y in 0..resolution {
            for x in 0..resolution {
                pixels.extend_from_slice(&[x as u8, y as u8, 7, 255]);
            }
        }
        PanoramaTexture::new(resolution, pixels, resolution as f32).unwrap()
    }

    #[test]
    fn horizontal_reads_wrap() {
        let tex = ramp(16);
        assert_eq!(tex.pixel(-1, 3), tex.pixel(15, 3));
        assert_eq!(tex.pixel(16, 3), tex.pixel(0, 3));
        assert_eq!(tex.pixel(-33, 0), tex.pixel(15, 0));
    }

    #[test]
    fn vertical_reads_clamp() {
        let tex = ramp(16);
        assert_eq!(tex.rgb(4, -5), [4, 0, 7]);
        assert_eq!(tex.rgb(4, 99), [4, 15, 7]);
    }

    #[test]
    fn rejects_invalid_buffers() {
        assert!(matches!(
            PanoramaTexture::new(12, vec![0; 12 * 12 * 4], 12.0),
            Err(RenderError::NotPowerOfTwo(12))
        ));
        assert!(matches!(
            PanoramaTexture::new(8, vec![0; 10], 8.0),
            Err(RenderError::BufferSize { expected: 256, actual: 10 })
        ));
        assert!(matches!(
            PanoramaTexture::new(8, vec![0; 256], 9.0),
            Err(RenderError::PanoramaHeight { .. })
        ));
        assert!(matches!(
            PanoramaTexture::new(8, vec![0; 256], 0.0),
            Err(RenderError::PanoramaHeight { .. })
        ));
    }

    #[test]
    fn from_image_centres_a_two_to_one_panorama() {
        let img = RgbaImage::from_pixel(64, 32, Rgba([200, 100, 50, 255]));
        let tex = PanoramaTexture::from_image(&img, 32).unwrap();

        assert_eq!(tex.resolution(), 32);
        assert_eq!(tex.panorama_height(), 16.0);
        assert_eq!(tex.layout().vertical_offset(), 8.0);

        // resampling may round a uniform colour by one step
        let near = |a: [u8; 4], b: [u8; 4]| a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 1);
        assert_eq!(tex.pixel(5, 0), [0, 0, 0, 255]);
        assert_eq!(tex.pixel(5, 7), [0, 0, 0, 255]);
        assert!(near(tex.pixel(5, 8), [200, 100, 50, 255]));
        assert!(near(tex.pixel(5, 23), [200, 100, 50, 255]));
        assert_eq!(tex.pixel(5, 24), [0, 0, 0, 255]);
    }

    #[test]
    fn downsampled_keeps_proportions() {
        let img = RgbaImage::from_pixel(64, 32, Rgba([10, 20, 30, 255]));
        let tex = PanoramaTexture::from_image(&img, 64).unwrap();
        let small = tex.downsampled(16).unwrap();
        assert_eq!(small.resolution(), 16);
        assert_eq!(small.panorama_height(), 8.0);
        assert_eq!(small.as_bytes().len(), 16 * 16 * 4);
        assert!(tex.downsampled(12).is_err());
        assert_eq!(tex.downsampled(128).unwrap().resolution(), 64);
    }

    #[test]
    fn from_image_caps_tall_images() {
        let img = RgbaImage::from_pixel(8, 32, Rgba([1, 2, 3, 255]));
        let tex = PanoramaTexture::from_image(&img, 16).unwrap();
        assert_eq!(tex.panorama_height(), 16.0);
        assert_eq!(tex.layout().vertical_offset(), 0.0);
    }

    #[test]
    fn odd_padding_offset_matches_pasted_rows() {
        let img = RgbaImage::from_pixel(32, 10, Rgba([90, 180, 30, 255]));
        let tex = PanoramaTexture::from_image(&img, 16).unwrap();
        assert_eq!(tex.panorama_height(), 5.0);

        let offset = tex.layout().vertical_offset();
        assert_eq!(offset, 5.0);
        let first = offset as i32;
        assert_eq!(tex.pixel(3, first - 1), [0, 0, 0, 255]);
        assert_ne!(tex.pixel(3, first), [0, 0, 0, 255]);
        assert_ne!(tex.pixel(3, first + 4), [0, 0, 0, 255]);
        assert_eq!(tex.pixel(3, first + 5), [0, 0, 0, 255]);
    }
}
