// camera.rs - 视角参数与相机基向量

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::projection::{self, TexCoord};
use crate::texture::TextureLayout;

// 极点处 atan2(0, 0) 无定义, tan(90°) 落在奇点
pub const SAFE_PITCH_MIN: f32 = 0.1;
pub const SAFE_PITCH_MAX: f32 = 179.9;
pub const SAFE_FOV_MIN: f32 = 1.0;
pub const SAFE_FOV_MAX: f32 = 179.9;

/// Viewer orientation in degrees.
///
/// `pitch` is a polar angle: 0 looks straight up, 90 at the horizon and
/// 180 straight down. `fov` is the vertical field of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraState {
    pub heading: f32,
    pub pitch: f32,
    pub fov: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            heading: 0.0,
            pitch: 90.0,
            fov: 90.0,
        }
    }
}

impl CameraState {
    pub fn new(heading: f32, pitch: f32, fov: f32) -> Self {
        Self { heading, pitch, fov }
    }

    /// Copy of this state that is safe to project: heading wrapped into
    /// `[0, 360)`, pitch kept off the poles and fov below the tangent
    /// singularity. Non-finite values fall back to the defaults.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let finite_or = |v: f32, d: f32| if v.is_finite() { v } else { d };

        Self {
            heading: finite_or(self.heading, defaults.heading).rem_euclid(360.0),
            pitch: finite_or(self.pitch, defaults.pitch).clamp(SAFE_PITCH_MIN, SAFE_PITCH_MAX),
            fov: finite_or(self.fov, defaults.fov).clamp(SAFE_FOV_MIN, SAFE_FOV_MAX),
        }
    }

    pub fn basis(&self, width: u32, height: u32) -> CameraBasis {
        CameraBasis::new(self.heading, self.pitch, self.fov, aspect_ratio(width, height))
    }
}

/// Width over height, 1.0 for an empty viewport.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if width == 0 || height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// Image plane one unit in front of the eye.
///
/// `up` and `right` span the whole visible frustum: walking `(fx, fy)`
/// over the unit square (origin top-left) sweeps every viewport pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    pub dir: Vec3,
    pub up: Vec3,
    pub right: Vec3,
}

impl CameraBasis {
    pub fn new(heading_deg: f32, pitch_deg: f32, fov_deg: f32, aspect: f32) -> Self {
        // 2·tan(fov/2): top and bottom rays sit exactly fov/2 off the view direction
        let ratio_up = 2.0 * (fov_deg.to_radians() / 2.0).tan();
        let ratio_right = ratio_up * aspect;

        let h = heading_deg.to_radians();
        let p = pitch_deg.to_radians();
        let p_up = (pitch_deg - 90.0).to_radians();
        let h_right = (heading_deg - 90.0).to_radians();

        let dir = Vec3::new(p.sin() * h.sin(), p.cos(), p.sin() * h.cos());
        let up = ratio_up * Vec3::new(p_up.sin() * h.sin(), p_up.cos(), p_up.sin() * h.cos());
        let right = ratio_right * Vec3::new(h_right.sin(), 0.0, h_right.cos());

        Self { dir, up, right }
    }

    /// Ray through viewport corner `(0, 0)`.
    pub fn plane_origin(&self) -> Vec3 {
        self.dir + 0.5 * self.up - 0.5 * self.right
    }

    pub fn ray(&self, fx: f32, fy: f32) -> Vec3 {
        self.plane_origin() + fx * self.right - fy * self.up
    }
}

/// Everything one frame needs, computed once on the host.
///
/// The sampling basis is built at heading 0; heading only enters through
/// `horizontal_shift`, which is a pure translation along the wrapped
/// longitude axis. Both the software rasterizer and the GPU shader consume
/// exactly these values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub camera: CameraState,
    pub basis: CameraBasis,
    pub horizontal_shift: f32,
    pub viewport: (u32, u32),
    pub layout: TextureLayout,
}

impl FrameParams {
    pub fn new(camera: &CameraState, width: u32, height: u32, layout: TextureLayout) -> Self {
        let camera = camera.sanitized();
        let aspect = aspect_ratio(width, height);

        let full = CameraBasis::new(camera.heading, camera.pitch, camera.fov, aspect);
        let horizontal_shift = projection::horizontal_shift(full.ray(0.5, 0.5), layout.resolution);
        let basis = CameraBasis::new(0.0, camera.pitch, camera.fov, aspect);

        Self {
            camera,
            basis,
            horizontal_shift,
            viewport: (width, height),
            layout,
        }
    }

    /// Texture coordinate seen at normalized viewport position `(fx, fy)`.
    pub fn map(&self, fx: f32, fy: f32) -> TexCoord {
        projection::ray_to_texture(self.basis.ray(fx, fy), &self.layout, self.horizontal_shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angle_between(a: Vec3, b: Vec3) -> f32 {
        a.normalize().dot(b.normalize()).clamp(-1.0, 1.0).acos()
    }

    #[test]
    fn center_ray_is_view_direction() {
        let basis = CameraBasis::new(37.0, 64.0, 75.0, 16.0 / 9.0);
        let center = basis.ray(0.5, 0.5);
        assert!((center - basis.dir).length() < 1e-5);
        assert!((basis.dir.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn basis_has_no_roll() {
        let basis = CameraBasis::new(123.0, 40.0, 60.0, 1.5);
        assert_eq!(basis.right.y, 0.0);
        assert!(basis.right.dot(basis.dir).abs() < 1e-5);
        assert!(basis.up.dot(basis.dir).abs() < 1e-5);
        assert!(basis.up.dot(basis.right).abs() < 1e-4);
    }

    #[test]
    fn on_screen_fov_matches_advertised_fov() {
        for fov in [30.0f32, 60.0, 90.0, 120.0] {
            let basis = CameraBasis::new(0.0, 90.0, fov, 16.0 / 9.0);
            let top = basis.ray(0.5, 0.0);
            let bottom = basis.ray(0.5, 1.0);
            let measured = angle_between(top, bottom).to_degrees();
            assert!((measured - fov).abs() < 1e-2, "fov {fov}: measured {measured}");
        }
    }

    #[test]
    fn right_vector_scales_with_aspect() {
        let square = CameraBasis::new(0.0, 90.0, 90.0, 1.0);
        let wide = CameraBasis::new(0.0, 90.0, 90.0, 2.0);
        assert!((wide.right.length() - 2.0 * square.right.length()).abs() < 1e-5);
        assert!((square.up.length() - square.right.length()).abs() < 1e-5);
    }

    #[test]
    fn sanitized_guards_poles_and_tangent() {
        let state = CameraState::new(-30.0, 0.0, 180.0).sanitized();
        assert_eq!(state.heading, 330.0);
        assert_eq!(state.pitch, SAFE_PITCH_MIN);
        assert_eq!(state.fov, SAFE_FOV_MAX);

        let state = CameraState::new(725.0, 180.0, 0.0).sanitized();
        assert_eq!(state.heading, 5.0);
        assert_eq!(state.pitch, SAFE_PITCH_MAX);
        assert_eq!(state.fov, SAFE_FOV_MIN);

        let state = CameraState::new(f32::NAN, f32::INFINITY, f32::NAN).sanitized();
        assert_eq!(state, CameraState::default());
    }

    #[test]
    fn empty_viewport_has_unit_aspect() {
        assert_eq!(aspect_ratio(0, 0), 1.0);
        assert_eq!(aspect_ratio(640, 0), 1.0);
        assert_eq!(aspect_ratio(640, 320), 2.0);
    }

    #[test]
    fn frame_params_sample_with_heading_zero_basis() {
        let layout = TextureLayout::new(1024, 1024.0);
        let params = FrameParams::new(&CameraState::new(90.0, 90.0, 60.0), 160, 90, layout);
        assert_eq!(params.basis, CameraBasis::new(0.0, 90.0, 60.0, 160.0 / 90.0));
        assert_eq!(params.camera.heading, 90.0);
        assert_eq!(params.viewport, (160, 90));
    }
}
