// debug.rs - 网格调试图: 在全景图上描出采样网格

use crate::projection::TexCoord;
use crate::sampler::SampleGrid;
use crate::surface::OutputSurface;
use crate::texture::PanoramaTexture;

/// Downscaled copy of the whole panorama with every grid cell edge traced
/// in source space. Shows where the current view samples from and how
/// much the cells bend.
pub fn render_grid_map(
    texture: &PanoramaTexture,
    grid: &SampleGrid,
    width: u32,
    height: u32,
    rgb: [u8; 3],
) -> OutputSurface {
    let mut map = OutputSurface::new(width, height);
    if map.is_empty() {
        return map;
    }

    let r = texture.resolution() as u64;
    for y in 0..height {
        let sy = (y as u64 * r / height as u64) as i32;
        for x in 0..width {
            let sx = (x as u64 * r / width as u64) as i32;
            map.put_rgb(x, y, texture.rgb(sx, sy));
        }
    }

    let res = grid.resolution();
    for row in 0..=res {
        for col in 0..=res {
            let here = grid.get(row, col);
            if col < res {
                trace(&mut map, texture.resolution(), here, grid.get(row, col + 1), rgb);
            }
            if row < res {
                trace(&mut map, texture.resolution(), here, grid.get(row + 1, col), rgb);
            }
        }
    }
    map
}

/// Draw one source-space segment, repeated across the longitude seam.
fn trace(map: &mut OutputSurface, resolution: u32, from: TexCoord, to: TexCoord, rgb: [u8; 3]) {
    let r = resolution as f32;
    let sx = map.width() as f32 / r;
    let sy = map.height() as f32 / r;

    let shift = (from.x / r).floor() * r;
    let x0 = (from.x - shift) * sx;
    let x1 = (to.x - shift) * sx;
    let (y0, y1) = (from.y * sy, to.y * sy);
    let w = map.width() as f32;

    for copy in [-w, 0.0, w] {
        map.draw_line(
            ((x0 + copy).floor() as i32, y0.floor() as i32),
            ((x1 + copy).floor() as i32, y1.floor() as i32),
            rgb,
        );
    }
}
