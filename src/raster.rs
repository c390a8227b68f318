// raster.rs - 四边形扫描线光栅化 (最近邻, 无逐像素三角函数)

use crate::projection::TexCoord;
use crate::surface::OutputSurface;
use crate::texture::PanoramaTexture;

/// Integer line walk (Bresenham, all octants), endpoints included.
///
/// Yields `steps() + 1` points: the major axis advances on every step.
#[derive(Debug, Clone)]
pub struct LineWalk {
    x: i32,
    y: i32,
    x1: i32,
    y1: i32,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    done: bool,
}

impl LineWalk {
    pub fn new(from: (i32, i32), to: (i32, i32)) -> Self {
        let dx = (to.0 - from.0).abs();
        let dy = -(to.1 - from.1).abs();
        Self {
            x: from.0,
            y: from.1,
            x1: to.0,
            y1: to.1,
            dx,
            dy,
            sx: if from.0 < to.0 { 1 } else { -1 },
            sy: if from.1 < to.1 { 1 } else { -1 },
            err: dx + dy,
            done: false,
        }
    }

    /// Length of the walk in source pixels, `max(|Δx|, |Δy|)`.
    pub fn steps(&self) -> u32 {
        self.dx.max(-self.dy) as u32
    }
}

impl Iterator for LineWalk {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.done {
            return None;
        }
        let point = (self.x, self.y);
        if self.x == self.x1 && self.y == self.y1 {
            self.done = true;
            return Some(point);
        }

        let e2 = 2 * self.err;
        if e2 >= self.dy {
            self.err += self.dy;
            self.x += self.sx;
        }
        if e2 <= self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(point)
    }
}

/// Axis-aligned destination rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One grid cell: four source-space corners and the destination rectangle
/// they are stretched over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub left_top: TexCoord,
    pub left_bottom: TexCoord,
    pub right_top: TexCoord,
    pub right_bottom: TexCoord,
    pub dest: DestRect,
}

impl Quad {
    /// Corners moved onto the same turn of the longitude axis as
    /// `left_top`, so interpolation never runs the long way round the seam.
    pub fn unwrapped(&self, resolution: u32) -> Quad {
        let period = resolution as f32;
        let anchor = self.left_top.x;
        Quad {
            left_top: self.left_top,
            left_bottom: self.left_bottom.nearest_turn(anchor, period),
            right_top: self.right_top.nearest_turn(anchor, period),
            right_bottom: self.right_bottom.nearest_turn(anchor, period),
            dest: self.dest,
        }
    }
}

/// Pixel edge `index` of a viewport axis split into `res` cells.
///
/// Consecutive edges bound half-open cells that tile `[0, extent)`
/// exactly; a cell is empty when `extent < res`.
#[inline]
pub fn cell_edge(index: u32, extent: u32, res: u32) -> u32 {
    (index as u64 * extent as u64 / res.max(1) as u64) as u32
}

/// Fill `quad.dest` from the source quadrilateral, one scanline at a time.
///
/// Each scanline interpolates its source endpoints between the quad's top
/// and bottom edges, then walks the source segment and the destination
/// span together. Corners are unwrapped across the longitude seam first.
/// Empty rectangles are a no-op; anything outside the surface is clipped.
pub fn rasterize_quad(quad: &Quad, texture: &PanoramaTexture, surface: &mut OutputSurface) {
    let quad = quad.unwrapped(texture.resolution());
    let DestRect { x, y, width, height } = quad.dest;
    let width = width.min(surface.width().saturating_sub(x));
    let height = height.min(surface.height().saturating_sub(y));
    if width == 0 || height == 0 {
        return;
    }

    let span = 4 * x as usize..4 * (x + width) as usize;
    for row in 0..height {
        let t = row as f32 / height as f32;
        let left = quad.left_top.lerp(quad.left_bottom, t);
        let right = quad.right_top.lerp(quad.right_bottom, t);

        let dst = &mut surface.row_mut(y + row)[span.clone()];
        scan_segment(texture, left.texel(), right.texel(), dst);
    }
}

/// Nearest-neighbour resample of the source segment `from..=to` onto a
/// destination span (RGBA8, alpha untouched).
///
/// Source points are handed to destination columns by an integer DDA: the
/// accumulator grows by the span width per source point and a column is
/// written while `written * steps < acc`. With `steps == width` every
/// column gets exactly one source point, in order.
pub fn scan_segment(texture: &PanoramaTexture, from: (i32, i32), to: (i32, i32), dst: &mut [u8]) {
    let columns = dst.len() / 4;
    if columns == 0 {
        return;
    }

    let walk = LineWalk::new(from, to);
    let steps = walk.steps() as u64;
    if steps == 0 {
        let rgb = texture.rgb(from.0, from.1);
        for px in dst.chunks_exact_mut(4) {
            px[..3].copy_from_slice(&rgb);
        }
        return;
    }

    let width = columns as u64;
    let mut acc = 0u64;
    let mut written = 0usize;
    let mut last = from;

    for (sx, sy) in walk {
        last = (sx, sy);
        acc += width;
        if written as u64 * steps >= acc {
            continue;
        }

        let rgb = texture.rgb(sx, sy);
        while written < columns && (written as u64) * steps < acc {
            dst[4 * written..4 * written + 3].copy_from_slice(&rgb);
            written += 1;
        }
        if written == columns {
            return;
        }
    }

    let rgb = texture.rgb(last.0, last.1);
    for px in dst[4 * written..].chunks_exact_mut(4) {
        px[..3].copy_from_slice(&rgb);
    }
}
