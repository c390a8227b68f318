// render.rs - 端到端: 全景图 -> 相机 -> 输出帧

use image::{Rgba, RgbaImage};

use panorama_camera::{
    render_frame, CameraState, FrameParams, InputEvent, OutputSurface, PanoramaTexture,
    SoftwareRenderer, Viewer, ViewerConfig,
};

const R: u32 = 256;

/// Red channel is the column, green a constant marker never used as a
/// background.
fn gradient() -> PanoramaTexture {
    let mut pixels = Vec::with_capacity((R * R * 4) as usize);
    for _y in 0..R {
        for x in 0..R {
            pixels.extend_from_slice(&[x as u8, 200, 255 - x as u8, 255]);
        }
    }
    PanoramaTexture::new(R, pixels, R as f32).unwrap()
}

fn red_at(surface: &OutputSurface, x: u32, y: u32) -> i32 {
    surface.pixel(x, y)[0] as i32
}

fn render(camera: CameraState, res: u32) -> OutputSurface {
    let mut surface = OutputSurface::new(160, 90);
    render_frame(&camera, &gradient(), &mut surface, res);
    surface
}

#[test]
fn heading_zero_looks_at_the_midline() {
    let frame = render(CameraState::new(0.0, 90.0, 90.0), 8);
    let centre = red_at(&frame, 80, 45);
    assert!((centre - 128).abs() <= 2, "centre column {centre}");

    // 水平方向单调递增
    let row: Vec<i32> = (0..160).map(|x| red_at(&frame, x, 45)).collect();
    assert!(row.windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn heading_shifts_the_centre_column() {
    let frame = render(CameraState::new(90.0, 90.0, 90.0), 8);
    let centre = red_at(&frame, 80, 45);
    let expected = 128 - (90 * R / 360) as i32;
    assert!((centre - expected).abs() <= 2, "centre column {centre}, expected {expected}");
}

#[test]
fn view_across_the_seam_wraps() {
    let frame = render(CameraState::new(180.0, 90.0, 90.0), 8);
    assert!(red_at(&frame, 40, 45) > 180);
    assert!(red_at(&frame, 120, 45) < 80);
    assert!(frame.as_bytes().chunks(4).all(|p| p[1] == 200));
}

#[test]
fn view_past_the_pole_follows_the_exact_mapping() {
    let camera = CameraState::new(0.0, 30.0, 90.0);
    let frame = render(camera, 8);
    let (w, h) = (frame.width(), frame.height());
    let params = FrameParams::new(&camera, w, h, gradient().layout());

    // 天顶所在像素; 跨越天顶的格子本身有歧义, 跳过其周围两格
    let (mut pole, mut best) = ((0, 0), f32::MIN);
    for y in 0..h {
        for x in 0..w {
            let up = params.basis.ray(x as f32 / w as f32, y as f32 / h as f32).normalize().y;
            if up > best {
                best = up;
                pole = (x as i32, y as i32);
            }
        }
    }
    let (cell_w, cell_h) = ((w / 8) as i32, (h / 8) as i32);

    let mut bad = 0;
    for y in 0..h {
        for x in 0..w {
            if (x as i32 - pole.0).abs() <= 2 * cell_w && (y as i32 - pole.1).abs() <= 2 * cell_h {
                continue;
            }
            let expected = params.map(x as f32 / w as f32, y as f32 / h as f32).x.floor() as i32;
            let d = (red_at(&frame, x, y) - expected).rem_euclid(R as i32);
            if d.min(R as i32 - d) > 16 {
                bad += 1;
            }
        }
    }
    assert_eq!(bad, 0, "pixels far off the exact mapping");
}

#[test]
fn single_cell_grid_covers_viewport() {
    for camera in [
        CameraState::default(),
        CameraState::new(300.0, 20.0, 120.0),
        CameraState::new(45.0, 170.0, 30.0),
    ] {
        let mut surface = OutputSurface::new(97, 41);
        surface.clear([1, 2, 3]);
        render_frame(&camera, &gradient(), &mut surface, 1);
        assert!(surface.as_bytes().chunks(4).all(|p| p[1] == 200 && p[3] == 255));
    }
}

#[test]
fn finer_grid_stays_close_to_coarse_grid_at_horizon() {
    let coarse = render(CameraState::default(), 4);
    let fine = render(CameraState::default(), 32);
    for x in (0..160).step_by(8) {
        let d = (red_at(&coarse, x, 45) - red_at(&fine, x, 45)).abs();
        assert!(d <= 4, "column {x}: {d}");
    }
}

#[test]
fn viewer_drag_moves_the_view() {
    let config = ViewerConfig {
        width: 160,
        height: 90,
        texture_resolution: R,
        ..ViewerConfig::default()
    };
    let mut viewer = Viewer::new(&config, Box::new(SoftwareRenderer::new(8))).unwrap();
    viewer.load_texture(gradient()).unwrap();
    assert!(viewer.redraw().unwrap());
    assert!((red_at(viewer.surface(), 80, 45) - 128).abs() <= 2);

    viewer.handle(InputEvent::Drag { dx: 90.0, dy: 0.0 }).unwrap();
    assert!(viewer.redraw().unwrap());
    assert!((red_at(viewer.surface(), 80, 45) - 64).abs() <= 2);
}

#[test]
fn looking_up_and_down_picks_the_matching_half() {
    // 2:1 全景图, 上半红下半蓝
    let img = RgbaImage::from_fn(512, 256, |_, y| {
        if y < 128 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    let config = ViewerConfig {
        width: 64,
        height: 36,
        texture_resolution: R,
        ..ViewerConfig::default()
    };
    let mut viewer = Viewer::new(&config, Box::new(SoftwareRenderer::new(4))).unwrap();
    viewer.load_panorama(&img).unwrap();

    viewer.set_camera(CameraState::new(0.0, 60.0, 40.0));
    viewer.redraw().unwrap();
    let up = viewer.surface().pixel(32, 18);
    assert!(up[0] > 200 && up[2] < 50, "up {up:?}");

    viewer.set_camera(CameraState::new(0.0, 120.0, 40.0));
    viewer.redraw().unwrap();
    let down = viewer.surface().pixel(32, 18);
    assert!(down[2] > 200 && down[0] < 50, "down {down:?}");
}
