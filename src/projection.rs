// projection.rs - 射线 -> 等距柱状坐标

use std::f32::consts::PI;

use glam::Vec3;

use crate::texture::TextureLayout;

/// Source-texture coordinate. `x` is not wrapped yet and may fall outside
/// `[0, resolution)`; wrapping happens when a texel is read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TexCoord {
    pub x: f32,
    pub y: f32,
}

impl TexCoord {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, other: TexCoord, t: f32) -> TexCoord {
        TexCoord {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Same texel column shifted by whole turns so that `x` lies within
    /// half a turn of `anchor`.
    pub fn nearest_turn(self, anchor: f32, period: f32) -> TexCoord {
        TexCoord {
            x: self.x - period * ((self.x - anchor) / period).round(),
            y: self.y,
        }
    }

    /// Texel containing this coordinate.
    pub fn texel(self) -> (i32, i32) {
        (self.x.floor() as i32, self.y.floor() as i32)
    }
}

/// Polar angle `theta` (0 at the north pole, +Y) and azimuth `phi` in
/// `(-π, π]` of a ray. A zero-length ray is treated as pointing at the
/// horizon along +X.
pub fn spherical(ray: Vec3) -> (f32, f32) {
    let len = ray.length();
    if !(len > 0.0) {
        return (PI / 2.0, 0.0);
    }
    let n = ray / len;
    let theta = n.y.clamp(-1.0, 1.0).acos();
    let phi = n.z.atan2(n.x);
    (theta, phi)
}

/// Texture columns per radian of azimuth.
pub fn phi_scale(texture_width: u32) -> f32 {
    texture_width as f32 / (2.0 * PI)
}

/// Column offset aligning the screen centre with the camera heading.
///
/// Derived once per frame from the full-basis centre ray; at heading 0 the
/// centre lands on the panorama's horizontal midline.
pub fn horizontal_shift(reference: Vec3, texture_width: u32) -> f32 {
    let (_, phi) = spherical(reference);
    phi * phi_scale(texture_width)
}

pub fn ray_to_texture(ray: Vec3, layout: &TextureLayout, horizontal_shift: f32) -> TexCoord {
    let (theta, phi) = spherical(ray);
    TexCoord {
        x: phi * phi_scale(layout.resolution) + horizontal_shift,
        y: theta * (layout.panorama_height / PI) + layout.vertical_offset(),
    }
}
