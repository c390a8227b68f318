// gpu.rs - wgpu 渲染器 (全屏三角形 + 逐像素射线投射, 离屏读回)

use std::sync::mpsc::channel;

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use crate::camera::{CameraState, FrameParams};
use crate::config::GpuFilter;
use crate::error::{RenderError, RenderResult};
use crate::renderer::PanoramaRenderer;
use crate::surface::OutputSurface;
use crate::texture::{PanoramaTexture, TextureLayout};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Per-frame uniform block, laid out to match `FrameUniform` in the shader.
///
/// Built from the same `FrameParams` the CPU path samples with, so both
/// paths agree on the camera basis bit for bit.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuFrameParams {
    pub viewport_size: [f32; 2],
    pub texture_size: [f32; 2],
    pub panorama_height: f32,
    pub horizontal_shift: f32,
    pub vertical_offset: f32,
    pad0: f32,
    pub cam_up: [f32; 4],
    pub cam_right: [f32; 4],
    pub cam_plane: [f32; 4],
}

impl From<&FrameParams> for GpuFrameParams {
    fn from(params: &FrameParams) -> Self {
        let resolution = params.layout.resolution as f32;
        Self {
            viewport_size: [params.viewport.0 as f32, params.viewport.1 as f32],
            texture_size: [resolution, resolution],
            panorama_height: params.layout.panorama_height,
            horizontal_shift: params.horizontal_shift,
            vertical_offset: params.layout.vertical_offset(),
            pad0: 0.0,
            cam_up: params.basis.up.extend(0.0).to_array(),
            cam_right: params.basis.right.extend(0.0).to_array(),
            cam_plane: params.basis.plane_origin().extend(0.0).to_array(),
        }
    }
}

/// Offscreen targets cannot exceed the device's 2D texture size.
fn check_viewport(width: u32, height: u32, max: u32) -> RenderResult<()> {
    if width > max || height > max {
        return Err(RenderError::ViewportTooLarge { width, height, max });
    }
    Ok(())
}

struct RenderTarget {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

/// Hardware renderer. Draws offscreen and reads the frame back into the
/// caller's `OutputSurface`, so it is interchangeable with the software
/// renderer.
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    render_pipeline: wgpu::RenderPipeline,

    // 纹理资源
    texture_bind_group_layout: wgpu::BindGroupLayout,
    diffuse_bind_group: wgpu::BindGroup,
    texture: wgpu::Texture,
    sampler: wgpu::Sampler,
    layout: Option<TextureLayout>,

    // Uniform 资源
    frame_buffer: wgpu::Buffer,

    target: Option<RenderTarget>,
    viewport: (u32, u32),
}

impl GpuRenderer {
    pub fn new(filter: GpuFilter) -> RenderResult<Self> {
        pollster::block_on(Self::new_async(filter))
    }

    pub async fn new_async(filter: GpuFilter) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        log::info!("gpu renderer: adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await?;

        // 未加载全景图前的占位纹理
        let placeholder = Self::upload_texture(
            &device,
            &queue,
            2,
            &[255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 0, 255],
        );
        let texture_view = placeholder.create_view(&wgpu::TextureViewDescriptor::default());

        let filter_mode = match filter {
            GpuFilter::Nearest => wgpu::FilterMode::Nearest,
            GpuFilter::Linear => wgpu::FilterMode::Linear,
        };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat, // 全景图水平循环
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode,
            min_filter: filter_mode,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Params Buffer"),
            contents: bytemuck::cast_slice(&[GpuFrameParams::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
                label: Some("texture_bind_group_layout"),
            });

        let diffuse_bind_group = Self::create_bind_group(
            &device,
            &texture_bind_group_layout,
            &frame_buffer,
            &texture_view,
            &sampler,
        );

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader_panorama.wgsl"));
        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&texture_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[], // 无顶点缓冲，Shader 自生成
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        Ok(Self {
            device,
            queue,
            render_pipeline,
            texture_bind_group_layout,
            diffuse_bind_group,
            texture: placeholder,
            sampler,
            layout: None,
            frame_buffer,
            target: None,
            viewport: (0, 0),
        })
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn upload_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resolution: u32,
        bytes: &[u8],
    ) -> wgpu::Texture {
        let size = wgpu::Extent3d {
            width: resolution,
            height: resolution,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label: Some("panorama_texture"),
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * resolution),
                rows_per_image: Some(resolution),
            },
            size,
        );
        texture
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        frame_buffer: &wgpu::Buffer,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some("diffuse_bind_group"),
        })
    }

    fn ensure_target(&mut self, width: u32, height: u32) {
        let stale = !matches!(&self.target, Some(t) if t.width == width && t.height == height);
        if stale {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                label: Some("frame_target"),
                view_formats: &[],
            });
            self.target = Some(RenderTarget {
                texture,
                width,
                height,
            });
        }
    }

    /// Copy the finished frame into `surface`, dropping the 256-byte row
    /// padding the copy requires.
    fn read_back(&self, surface: &mut OutputSurface) -> RenderResult<()> {
        let Some(target) = &self.target else {
            return Ok(());
        };
        let (width, height) = (target.width, target.height);

        let tight_bpr = 4 * width as usize;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
        let padded_bpr = (tight_bpr + align - 1) / align * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_readback"),
            size: (padded_bpr * height as usize) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv().map_err(|_| RenderError::ReadbackChannel)??;

        {
            let data = slice.get_mapped_range();
            let out = surface.as_bytes_mut();
            for row in 0..height as usize {
                let src = row * padded_bpr;
                let dst = row * tight_bpr;
                out[dst..dst + tight_bpr].copy_from_slice(&data[src..src + tight_bpr]);
            }
        }
        staging.unmap();
        Ok(())
    }
}

impl PanoramaRenderer for GpuRenderer {
    fn configure(&mut self, width: u32, height: u32) -> RenderResult<()> {
        check_viewport(width, height, self.max_texture_dimension())?;
        self.viewport = (width, height);
        Ok(())
    }

    fn load_texture(&mut self, texture: PanoramaTexture) -> RenderResult<()> {
        // 超过 GPU 纹理尺寸限制时缩小
        let max = self.max_texture_dimension();
        let texture = if texture.resolution() > max {
            let limit = if max.is_power_of_two() { max } else { max.next_power_of_two() / 2 };
            log::warn!(
                "gpu renderer: texture {}² exceeds device limit {}, downsampling to {}²",
                texture.resolution(),
                max,
                limit
            );
            texture.downsampled(limit)?
        } else {
            texture
        };

        self.texture =
            Self::upload_texture(&self.device, &self.queue, texture.resolution(), texture.as_bytes());
        let view = self.texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Recreate bind group with new texture view
        self.diffuse_bind_group = Self::create_bind_group(
            &self.device,
            &self.texture_bind_group_layout,
            &self.frame_buffer,
            &view,
            &self.sampler,
        );
        self.layout = Some(texture.layout());

        log::info!(
            "gpu renderer: texture {}², panorama height {}",
            texture.resolution(),
            texture.panorama_height()
        );
        Ok(())
    }

    fn render(&mut self, camera: &CameraState, surface: &mut OutputSurface) -> RenderResult<()> {
        let (width, height) = self.viewport;
        surface.resize(width, height);
        if surface.is_empty() {
            return Ok(());
        }
        let Some(layout) = self.layout else {
            log::warn!("gpu renderer: no panorama loaded, clearing frame");
            surface.clear([0, 0, 0]);
            return Ok(());
        };

        let params = FrameParams::new(camera, width, height, layout);
        let uniform = GpuFrameParams::from(&params);
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[uniform]));

        self.ensure_target(width, height);
        let Some(target) = &self.target else {
            return Ok(());
        };
        let view = target.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.diffuse_bind_group, &[]);
            render_pass.draw(0..3, 0..1); // 3 个顶点覆盖全屏
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.read_back(surface)
    }
}
