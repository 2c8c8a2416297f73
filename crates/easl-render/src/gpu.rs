use std::sync::Arc;

use easl_core::{EaslError, EaslResult, RunSettings};
use parking_lot::Mutex;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::config::RunConfig;
use crate::runner::{FrameUniforms, GraphicsDevice};

/// Uniform buffers are allocated at this size; both uniforms fit.
const UNIFORM_BUFFER_SIZE: u64 = 16;

/// wgpu device, window surface and the uniform bindings every shader uses.
pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: Mutex<wgpu::SurfaceConfiguration>,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    resolution_buffer: wgpu::Buffer,
    time_buffer: wgpu::Buffer,
    clear_color: wgpu::Color,
}

impl WgpuDevice {
    /// Initializes wgpu against a window surface.
    pub fn new(window: Arc<Window>, settings: &RunSettings) -> EaslResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EaslError::runner(format!("failed to create surface: {}", e)))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| EaslError::runner("failed to find a suitable wgpu adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("easl device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| EaslError::runner(format!("failed to create device: {}", e)))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| EaslError::runner("surface reports no supported formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .ok_or_else(|| EaslError::runner("surface reports no alpha modes"))?;
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("easl uniforms layout"),
            entries: &[uniform_entry(0), uniform_entry(1)],
        });

        let resolution_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("easl resolution"),
            contents: &[0u8; UNIFORM_BUFFER_SIZE as usize],
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let time_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("easl time"),
            contents: &[0u8; UNIFORM_BUFFER_SIZE as usize],
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("easl uniforms"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: resolution_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: time_buffer.as_entire_binding(),
                },
            ],
        });

        let [r, g, b, a] = settings.clear_color;
        Ok(Self {
            surface,
            device,
            queue,
            config: Mutex::new(config),
            bind_group_layout,
            bind_group,
            resolution_buffer,
            time_buffer,
            clear_color: wgpu::Color { r, g, b, a },
        })
    }

    fn reconfigure(&self) {
        let config = self.config.lock();
        self.surface.configure(&self.device, &config);
    }
}

impl GraphicsDevice for WgpuDevice {
    type Pipeline = wgpu::RenderPipeline;

    fn create_pipeline(&self, wgsl: &str, config: &RunConfig) -> EaslResult<wgpu::RenderPipeline> {
        // Validation errors are returned instead of reaching the uncaptured handler.
        // Error scopes are device-wide; the runner keeps draws out of this window.
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("easl shader"),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("easl pipeline layout"),
            bind_group_layouts: &[&self.bind_group_layout],
            push_constant_ranges: &[],
        });
        let format = self.config.lock().format;
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("easl pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: &config.wgsl_entries.vertex,
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: &config.wgsl_entries.fragment,
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(EaslError::runner(format!("pipeline creation failed: {}", err))),
            None => Ok(pipeline),
        }
    }

    fn draw(
        &self,
        pipeline: Option<&wgpu::RenderPipeline>,
        vertex_count: u32,
        uniforms: &FrameUniforms,
    ) -> EaslResult<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface timeout; skipping frame");
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(EaslError::runner("GPU out of memory"));
            }
        };

        self.queue
            .write_buffer(&self.resolution_buffer, 0, bytemuck::cast_slice(&uniforms.resolution));
        self.queue
            .write_buffer(&self.time_buffer, 0, bytemuck::bytes_of(&uniforms.time));

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("easl frame"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("easl pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(pipeline) = pipeline {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.bind_group, &[]);
                pass.draw(0..vertex_count, 0..1);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        {
            let mut config = self.config.lock();
            config.width = width;
            config.height = height;
        }
        self.reconfigure();
    }
}
