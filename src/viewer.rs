// viewer.rs - 视角状态 + 输入 -> 重绘请求

use image::RgbaImage;

use crate::camera::CameraState;
use crate::config::ViewerConfig;
use crate::error::RenderResult;
use crate::renderer::PanoramaRenderer;
use crate::surface::OutputSurface;
use crate::texture::PanoramaTexture;

// 宿主层的夹取, 比核心的安全范围更紧
pub const HOST_PITCH_MIN: f32 = 1.0;
pub const HOST_PITCH_MAX: f32 = 179.0;
pub const HOST_FOV_MIN: f32 = 5.0;
pub const HOST_FOV_MAX: f32 = 170.0;

/// One wheel "click".
pub const WHEEL_DELTA: f32 = 120.0;

/// Abstract input, already translated from whatever device produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer drag in pixels; right and down are positive.
    Drag { dx: f32, dy: f32 },
    /// Wheel delta in raw units, `WHEEL_DELTA` per click.
    Scroll { delta: f32 },
    /// Available window area changed.
    Resize { width: u32, height: u32 },
    /// Explicit redraw request.
    Redraw,
}

/// Largest `aspect`-ratio rectangle that fits in `width × height`.
pub fn fit_viewport(width: u32, height: u32, aspect: f32) -> (u32, u32) {
    if width == 0 || height == 0 || !(aspect > 0.0) {
        return (0, 0);
    }
    let available = width as f32 / height as f32;
    if available > aspect {
        (((height as f32 * aspect).round() as u32).min(width), height)
    } else {
        (width, ((width as f32 / aspect).round() as u32).min(height))
    }
}

/// Owns the camera and the last frame. Input handlers only mutate state
/// and flag a redraw; `redraw` renders synchronously.
pub struct Viewer {
    camera: CameraState,
    sensitivity: f32,
    pitch_sensitivity: f32,
    aspect_ratio: f32,
    texture_resolution: u32,
    viewport: (u32, u32),
    renderer: Box<dyn PanoramaRenderer>,
    surface: OutputSurface,
    needs_redraw: bool,
}

impl Viewer {
    pub fn new(config: &ViewerConfig, mut renderer: Box<dyn PanoramaRenderer>) -> RenderResult<Self> {
        let viewport = fit_viewport(config.width, config.height, config.aspect_ratio);
        renderer.configure(viewport.0, viewport.1)?;
        log::info!("viewer: viewport {}x{}", viewport.0, viewport.1);

        Ok(Self {
            camera: config.camera,
            sensitivity: config.sensitivity,
            pitch_sensitivity: config.pitch_sensitivity,
            aspect_ratio: config.aspect_ratio,
            texture_resolution: config.texture_resolution,
            viewport,
            renderer,
            surface: OutputSurface::new(viewport.0, viewport.1),
            needs_redraw: true,
        })
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: CameraState) {
        if camera != self.camera {
            self.camera = camera;
            self.needs_redraw = true;
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn surface(&self) -> &OutputSurface {
        &self.surface
    }

    /// Apply one input event. Returns whether a redraw is now pending.
    pub fn handle(&mut self, event: InputEvent) -> RenderResult<bool> {
        match event {
            InputEvent::Drag { dx, dy } => {
                let mut camera = self.camera;
                camera.heading = (camera.heading + dx * self.sensitivity).rem_euclid(360.0);
                camera.pitch =
                    (camera.pitch + dy * self.pitch_sensitivity).clamp(HOST_PITCH_MIN, HOST_PITCH_MAX);
                self.set_camera(camera);
            }
            InputEvent::Scroll { delta } => {
                let mut camera = self.camera;
                camera.fov = (camera.fov + delta / WHEEL_DELTA).clamp(HOST_FOV_MIN, HOST_FOV_MAX);
                self.set_camera(camera);
            }
            InputEvent::Resize { width, height } => {
                let viewport = fit_viewport(width, height, self.aspect_ratio);
                if viewport != self.viewport {
                    log::debug!("viewer: resize to {}x{}", viewport.0, viewport.1);
                    self.viewport = viewport;
                    self.renderer.configure(viewport.0, viewport.1)?;
                    self.needs_redraw = true;
                }
            }
            InputEvent::Redraw => self.needs_redraw = true,
        }
        Ok(self.needs_redraw)
    }

    pub fn load_panorama(&mut self, img: &RgbaImage) -> RenderResult<()> {
        let texture = PanoramaTexture::from_image(img, self.texture_resolution)?;
        self.load_texture(texture)
    }

    pub fn load_texture(&mut self, texture: PanoramaTexture) -> RenderResult<()> {
        self.renderer.load_texture(texture)?;
        self.needs_redraw = true;
        Ok(())
    }

    /// Render if a redraw is pending. Returns whether a frame was produced.
    pub fn redraw(&mut self) -> RenderResult<bool> {
        if !self.needs_redraw {
            return Ok(false);
        }
        self.renderer.render(&self.camera, &mut self.surface)?;
        self.needs_redraw = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::SoftwareRenderer;

    fn viewer() -> Viewer {
        let config = ViewerConfig {
            width: 64,
            height: 64,
            texture_resolution: 32,
            ..ViewerConfig::default()
        };
        Viewer::new(&config, Box::new(SoftwareRenderer::new(4))).unwrap()
    }

    #[test]
    fn fits_aspect_ratio() {
        assert_eq!(fit_viewport(1920, 1200, 16.0 / 9.0), (1920, 1080));
        assert_eq!(fit_viewport(1000, 300, 16.0 / 9.0), (533, 300));
        assert_eq!(fit_viewport(0, 300, 16.0 / 9.0), (0, 0));
        assert_eq!(fit_viewport(100, 100, 0.0), (0, 0));
    }

    #[test]
    fn drag_right_increases_heading_and_down_increases_pitch() {
        let mut v = viewer();
        v.redraw().unwrap();
        assert!(!v.needs_redraw());

        assert!(v.handle(InputEvent::Drag { dx: 10.0, dy: 5.0 }).unwrap());
        assert_eq!(v.camera().heading, 10.0);
        // pitch follows the drag at half rate by default
        assert_eq!(v.camera().pitch, 92.5);

        v.handle(InputEvent::Drag { dx: -20.0, dy: 0.0 }).unwrap();
        assert_eq!(v.camera().heading, 350.0);
    }

    #[test]
    fn pitch_sensitivity_is_separate_from_heading() {
        let config = ViewerConfig {
            width: 64,
            height: 64,
            texture_resolution: 32,
            sensitivity: 0.25,
            pitch_sensitivity: 2.0,
            ..ViewerConfig::default()
        };
        let mut v = Viewer::new(&config, Box::new(SoftwareRenderer::new(4))).unwrap();
        v.handle(InputEvent::Drag { dx: 8.0, dy: -10.0 }).unwrap();
        assert_eq!(v.camera().heading, 2.0);
        assert_eq!(v.camera().pitch, 70.0);
    }

    #[test]
    fn host_clamps_pitch_and_fov() {
        let mut v = viewer();
        v.handle(InputEvent::Drag { dx: 0.0, dy: 1000.0 }).unwrap();
        assert_eq!(v.camera().pitch, HOST_PITCH_MAX);
        v.handle(InputEvent::Drag { dx: 0.0, dy: -1000.0 }).unwrap();
        assert_eq!(v.camera().pitch, HOST_PITCH_MIN);

        v.handle(InputEvent::Scroll { delta: 240.0 }).unwrap();
        assert_eq!(v.camera().fov, 92.0);
        v.handle(InputEvent::Scroll { delta: 1.0e6 }).unwrap();
        assert_eq!(v.camera().fov, HOST_FOV_MAX);
    }

    #[test]
    fn redraw_only_when_requested() {
        let mut v = viewer();
        v.load_panorama(&RgbaImage::from_pixel(64, 32, image::Rgba([90, 90, 90, 255])))
            .unwrap();
        assert!(v.redraw().unwrap());
        assert!(!v.redraw().unwrap());

        // no-op drag leaves nothing to do
        assert!(!v.handle(InputEvent::Drag { dx: 0.0, dy: 0.0 }).unwrap());
        assert!(v.handle(InputEvent::Redraw).unwrap());
        assert!(v.redraw().unwrap());
    }

    #[test]
    fn resize_refits_and_reconfigures() {
        let mut v = viewer();
        v.redraw().unwrap();
        assert!(v.handle(InputEvent::Resize { width: 320, height: 320 }).unwrap());
        assert_eq!(v.viewport(), (320, 180));
        v.redraw().unwrap();
        assert_eq!((v.surface().width(), v.surface().height()), (320, 180));
    }
}
