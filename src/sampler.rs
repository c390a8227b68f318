// sampler.rs - 控制网格采样 (只在 (res+1)² 个点上做三角函数)

use crate::camera::FrameParams;
use crate::projection::TexCoord;

/// Casts rays through a coarse `(res+1)²` control grid over the viewport.
///
/// `res` is independent of the pixel resolution; everything between
/// control points is filled in by the quad rasterizer.
#[derive(Debug, Clone, Copy)]
pub struct RaySampler<'a> {
    params: &'a FrameParams,
    res: u32,
}

impl<'a> RaySampler<'a> {
    /// `res` of 0 is raised to 1.
    pub fn new(params: &'a FrameParams, res: u32) -> Self {
        Self {
            params,
            res: res.max(1),
        }
    }

    pub fn resolution(&self) -> u32 {
        self.res
    }

    /// Control points per grid row.
    pub fn points_per_row(&self) -> usize {
        self.res as usize + 1
    }

    pub fn sample(&self, row: u32, col: u32) -> TexCoord {
        let fx = col as f32 / self.res as f32;
        let fy = row as f32 / self.res as f32;
        self.params.map(fx, fy)
    }

    /// Fill `out` with grid row `row`, reusing its allocation.
    pub fn sample_row(&self, row: u32, out: &mut Vec<TexCoord>) {
        out.clear();
        out.extend((0..=self.res).map(|col| self.sample(row, col)));
    }
}

/// Fully materialised control grid, row-major.
///
/// Frame assembly never builds one (it streams two rows at a time); this
/// is for inspection and the debug grid map.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    res: u32,
    x: Vec<f32>,
    y: Vec<f32>,
}

impl SampleGrid {
    pub fn build(params: &FrameParams, res: u32) -> Self {
        let sampler = RaySampler::new(params, res);
        let res = sampler.resolution();
        let count = sampler.points_per_row() * sampler.points_per_row();

        let mut x = Vec::with_capacity(count);
        let mut y = Vec::with_capacity(count);
        let mut row_buf = Vec::with_capacity(sampler.points_per_row());
        for row in 0..=res {
            sampler.sample_row(row, &mut row_buf);
            for tc in &row_buf {
                x.push(tc.x);
                y.push(tc.y);
            }
        }

        Self { res, x, y }
    }

    pub fn resolution(&self) -> u32 {
        self.res
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn get(&self, row: u32, col: u32) -> TexCoord {
        let i = row as usize * (self.res as usize + 1) + col as usize;
        TexCoord::new(self.x[i], self.y[i])
    }

    pub fn grid_x(&self) -> &[f32] {
        &self.x
    }

    pub fn grid_y(&self) -> &[f32] {
        &self.y
    }
}
