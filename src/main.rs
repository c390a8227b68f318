// main.rs - 命令行: 加载全景图, 应用输入, 渲染一帧并输出 PNG

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use image::io::Reader as ImageReader;
use image::GenericImageView;

use panorama_camera::debug::render_grid_map;
use panorama_camera::{
    Backend, FrameParams, GpuRenderer, InputEvent, PanoramaRenderer, PanoramaTexture, SampleGrid,
    SoftwareRenderer, Viewer, ViewerConfig,
};

const USAGE: &str = "\
usage: panorama_camera <image> [options]

  -o, --output <png>            output frame (default: view.png)
      --config <json>           config file (env: PANORAMA_CONFIG)
      --backend software|gpu
      --gpu-filter nearest|linear
      --width <px> --height <px>  available area, fitted to the aspect ratio
      --grid <n>                control-grid subdivisions per axis
      --texture-resolution <n>  square texture side, power of two
      --heading <deg> --pitch <deg> --fov <deg>
      --sensitivity <deg/px>    heading per dragged pixel
      --pitch-sensitivity <deg/px>  pitch per dragged pixel
      --drag <dx,dy>            apply a pointer drag (repeatable)
      --scroll <delta>          apply a wheel delta, 120 per click (repeatable)
      --grid-map <png>          also write the sample grid traced over the panorama
";

struct Args {
    input: PathBuf,
    output: PathBuf,
    grid_map: Option<PathBuf>,
    events: Vec<InputEvent>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let raw: Vec<String> = std::env::args().collect();
    if raw.iter().any(|a| a == "-h" || a == "--help") {
        print!("{USAGE}");
        return Ok(());
    }

    let mut config = ViewerConfig::resolve(&raw).context("loading config")?;
    let args = parse_args(raw.get(1..).unwrap_or_default(), &mut config)?;
    config.validate()?;

    let img = load_image(&args.input)?;

    let mut viewer = build_viewer(&config)?;
    viewer.load_panorama(&img)?;
    for event in &args.events {
        viewer.handle(*event)?;
    }

    let start = Instant::now();
    viewer.redraw()?;
    let camera = *viewer.camera();
    let (width, height) = viewer.viewport();
    log::info!(
        "{:?} frame {}x{} in {:.2?} (heading {:.1}°, pitch {:.1}°, fov {:.1}°)",
        config.backend,
        width,
        height,
        start.elapsed(),
        camera.heading,
        camera.pitch,
        camera.fov
    );

    viewer
        .surface()
        .save_png(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    log::info!("wrote {}", args.output.display());

    if let Some(path) = &args.grid_map {
        let texture = PanoramaTexture::from_image(&img, config.texture_resolution)?;
        let params = FrameParams::new(&camera, width, height, texture.layout());
        let grid = SampleGrid::build(&params, config.grid_resolution);
        let side = texture.resolution().min(1024);
        render_grid_map(&texture, &grid, side, side, [255, 0, 0])
            .save_png(path)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("wrote grid map {}", path.display());
    }

    Ok(())
}

/// Viewer on the configured backend. A GPU that cannot be created, or that
/// rejects the viewport, falls back to the software renderer.
fn build_viewer(config: &ViewerConfig) -> Result<Viewer> {
    if config.backend == Backend::Gpu {
        let gpu = GpuRenderer::new(config.gpu_filter)
            .and_then(|gpu| Viewer::new(config, Box::new(gpu)));
        match gpu {
            Ok(viewer) => return Ok(viewer),
            Err(e) => log::warn!("GPU renderer unavailable ({e}), falling back to software"),
        }
    }
    let software: Box<dyn PanoramaRenderer> = Box::new(SoftwareRenderer::new(config.grid_resolution));
    Ok(Viewer::new(config, software)?)
}

fn parse_args(raw: &[String], config: &mut ViewerConfig) -> Result<Args> {
    fn value<'a>(it: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a str> {
        match it.next() {
            Some(v) => Ok(v.as_str()),
            None => bail!("{flag} needs a value"),
        }
    }
    fn number<T: std::str::FromStr>(s: &str, flag: &str) -> Result<T> {
        s.parse::<T>()
            .map_err(|_| anyhow::anyhow!("{flag}: '{s}' is not a valid number"))
    }

    let mut input = None;
    let mut output = PathBuf::from("view.png");
    let mut grid_map = None;
    let mut events = Vec::new();

    let mut it = raw.iter();
    while let Some(arg) = it.next() {
        let flag = arg.as_str();
        match flag {
            "-o" | "--output" => output = PathBuf::from(value(&mut it, flag)?),
            "--config" => {
                // already consumed by ViewerConfig::resolve
                value(&mut it, flag)?;
            }
            "--backend" => config.backend = value(&mut it, flag)?.parse()?,
            "--gpu-filter" => config.gpu_filter = value(&mut it, flag)?.parse()?,
            "--width" => config.width = number(value(&mut it, flag)?, flag)?,
            "--height" => config.height = number(value(&mut it, flag)?, flag)?,
            "--grid" => config.grid_resolution = number(value(&mut it, flag)?, flag)?,
            "--texture-resolution" => {
                config.texture_resolution = number(value(&mut it, flag)?, flag)?
            }
            "--heading" => config.camera.heading = number(value(&mut it, flag)?, flag)?,
            "--pitch" => config.camera.pitch = number(value(&mut it, flag)?, flag)?,
            "--fov" => config.camera.fov = number(value(&mut it, flag)?, flag)?,
            "--sensitivity" => config.sensitivity = number(value(&mut it, flag)?, flag)?,
            "--pitch-sensitivity" => {
                config.pitch_sensitivity = number(value(&mut it, flag)?, flag)?
            }
            "--drag" => {
                let v = value(&mut it, flag)?;
                let Some((dx, dy)) = v.split_once(',') else {
                    bail!("--drag expects dx,dy, got '{v}'");
                };
                events.push(InputEvent::Drag {
                    dx: number(dx.trim(), flag)?,
                    dy: number(dy.trim(), flag)?,
                });
            }
            "--scroll" => events.push(InputEvent::Scroll {
                delta: number(value(&mut it, flag)?, flag)?,
            }),
            "--grid-map" => grid_map = Some(PathBuf::from(value(&mut it, flag)?)),
            other if other.starts_with('-') => bail!("unknown option '{other}'\n\n{USAGE}"),
            other => {
                if input.replace(PathBuf::from(other)).is_some() {
                    bail!("only one input image is supported");
                }
            }
        }
    }

    let Some(input) = input else {
        bail!("missing input image\n\n{USAGE}");
    };

    Ok(Args {
        input,
        output,
        grid_map,
        events,
    })
}

fn load_image(path: &Path) -> Result<image::RgbaImage> {
    log::info!("loading {}", path.display());

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .with_context(|| format!("reading {}", path.display()))?;
    reader.no_limits();
    let img = reader
        .decode()
        .with_context(|| format!("decoding {}", path.display()))?;

    let (w, h) = img.dimensions();
    log::info!("image loaded: {}x{}", w, h);
    Ok(img.to_rgba8())
}
