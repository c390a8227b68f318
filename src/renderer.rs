// renderer.rs - 渲染接口 + CPU 参考实现 (网格采样 + 四边形光栅化)

use crate::camera::{CameraState, FrameParams};
use crate::error::RenderResult;
use crate::projection::TexCoord;
use crate::raster::{cell_edge, rasterize_quad, DestRect, Quad};
use crate::sampler::RaySampler;
use crate::surface::OutputSurface;
use crate::texture::PanoramaTexture;

pub const DEFAULT_GRID_RESOLUTION: u32 = 8;

/// Something that can draw a camera view of a loaded panorama.
pub trait PanoramaRenderer {
    /// Set the viewport size for subsequent frames.
    fn configure(&mut self, width: u32, height: u32) -> RenderResult<()>;

    /// Replace the panorama being viewed.
    fn load_texture(&mut self, texture: PanoramaTexture) -> RenderResult<()>;

    /// Draw one frame into `surface`, resizing it to the viewport first.
    fn render(&mut self, camera: &CameraState, surface: &mut OutputSurface) -> RenderResult<()>;
}

/// Render one frame on the CPU.
///
/// The viewport is the surface's size. The grid is streamed: only two
/// control rows are alive at a time, and each finished row pair is
/// rasterized into `res` quads straight away. Never fails; an empty
/// surface is left as is.
pub fn render_frame(
    camera: &CameraState,
    texture: &PanoramaTexture,
    surface: &mut OutputSurface,
    grid_resolution: u32,
) {
    if surface.is_empty() {
        return;
    }
    let (width, height) = (surface.width(), surface.height());
    let params = FrameParams::new(camera, width, height, texture.layout());
    let sampler = RaySampler::new(&params, grid_resolution);
    let res = sampler.resolution();

    let mut upper: Vec<TexCoord> = Vec::with_capacity(sampler.points_per_row());
    let mut lower: Vec<TexCoord> = Vec::with_capacity(sampler.points_per_row());

    for row in 0..=res {
        sampler.sample_row(row, &mut lower);

        if row > 0 {
            let y0 = cell_edge(row - 1, height, res);
            let y1 = cell_edge(row, height, res);
            for col in 0..res as usize {
                let x0 = cell_edge(col as u32, width, res);
                let x1 = cell_edge(col as u32 + 1, width, res);
                let quad = Quad {
                    left_top: upper[col],
                    left_bottom: lower[col],
                    right_top: upper[col + 1],
                    right_bottom: lower[col + 1],
                    dest: DestRect {
                        x: x0,
                        y: y0,
                        width: x1 - x0,
                        height: y1 - y0,
                    },
                };
                rasterize_quad(&quad, texture, surface);
            }
        }

        std::mem::swap(&mut upper, &mut lower);
    }
}

/// CPU reference renderer.
#[derive(Debug)]
pub struct SoftwareRenderer {
    grid_resolution: u32,
    viewport: (u32, u32),
    texture: Option<PanoramaTexture>,
}

impl SoftwareRenderer {
    pub fn new(grid_resolution: u32) -> Self {
        Self {
            grid_resolution: grid_resolution.max(1),
            viewport: (0, 0),
            texture: None,
        }
    }

    pub fn grid_resolution(&self) -> u32 {
        self.grid_resolution
    }

    pub fn texture(&self) -> Option<&PanoramaTexture> {
        self.texture.as_ref()
    }
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_RESOLUTION)
    }
}

impl PanoramaRenderer for SoftwareRenderer {
    fn configure(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.viewport = (width, height);
        Ok(())
    }

    fn load_texture(&mut self, texture: PanoramaTexture) -> RenderResult<()> {
        log::info!(
            "software renderer: texture {}², panorama height {}",
            texture.resolution(),
            texture.panorama_height()
        );
        self.texture = Some(texture);
        Ok(())
    }

    fn render(&mut self, camera: &CameraState, surface: &mut OutputSurface) -> RenderResult<()> {
        surface.resize(self.viewport.0, self.viewport.1);
        match &self.texture {
            Some(texture) => render_frame(camera, texture, surface, self.grid_resolution),
            None => {
                log::warn!("software renderer: no panorama loaded, clearing frame");
                surface.clear([0, 0, 0]);
            }
        }
        Ok(())
    }
}
