// error.rs - 渲染/加载错误

use thiserror::Error;

/// Result type for renderer, texture and config operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors surfaced by the panorama renderers and their inputs.
///
/// Rendering a valid camera state never produces one of these; they come
/// from texture validation, configuration, or the GPU device.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Texture resolution {0} is not a power of two")]
    NotPowerOfTwo(u32),

    #[error("Texture buffer has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Panorama height {height} out of range for resolution {resolution}")]
    PanoramaHeight { height: f32, resolution: u32 },

    #[error("No compatible GPU adapter found")]
    NoAdapter,

    #[error("GPU device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("GPU buffer map failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Viewport {width}x{height} exceeds the device limit of {max} pixels per side")]
    ViewportTooLarge { width: u32, height: u32, max: u32 },

    #[error("GPU readback channel closed")]
    ReadbackChannel,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
