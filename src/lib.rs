// lib.rs - 全景相机: 投影 + 光栅化核心, CPU / wgpu 两种渲染器

pub mod camera;
pub mod config;
pub mod debug;
pub mod error;
pub mod gpu;
pub mod projection;
pub mod raster;
pub mod renderer;
pub mod sampler;
pub mod surface;
pub mod texture;
pub mod viewer;

pub use camera::{CameraBasis, CameraState, FrameParams};
pub use config::{Backend, GpuFilter, ViewerConfig};
pub use error::{RenderError, RenderResult};
pub use gpu::{GpuFrameParams, GpuRenderer};
pub use projection::TexCoord;
pub use renderer::{render_frame, PanoramaRenderer, SoftwareRenderer};
pub use sampler::{RaySampler, SampleGrid};
pub use surface::OutputSurface;
pub use texture::{PanoramaTexture, TextureLayout};
pub use viewer::{fit_viewport, InputEvent, Viewer};
