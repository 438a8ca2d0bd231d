use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use framegraph_ecs::{TextureFormat, Topology};
use framegraph_render::{
    BackendError, BackendResult, BindingSetDescriptor, BindingSetHandle, BufferDescriptor,
    BufferHandle, GraphicsBackend, PipelineDescriptor, PipelineHandle, ResourceHandle,
    SamplerDescriptor, SamplerHandle, TextureDescriptor, TextureHandle,
};
use glam::UVec3;

use crate::shaders::{ShaderEntry, ShaderLibrary, layout_entries};

/// Colour format of the offscreen frame target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug, thiserror::Error)]
pub enum WgpuInitError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to open device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

#[derive(Debug, Clone)]
pub struct WgpuConfig {
    pub width: u32,
    pub height: u32,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for WgpuConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

struct TextureEntry {
    // Kept alive for the view.
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

enum PipelineEntry {
    Compute {
        pipeline: wgpu::ComputePipeline,
        layout: wgpu::BindGroupLayout,
    },
    Render {
        pipeline: wgpu::RenderPipeline,
        layout: wgpu::BindGroupLayout,
    },
}

impl PipelineEntry {
    fn layout(&self) -> &wgpu::BindGroupLayout {
        match self {
            Self::Compute { layout, .. } | Self::Render { layout, .. } => layout,
        }
    }
}

/// Headless wgpu device that runs compute passes and draws render passes
/// into an offscreen colour target.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    shaders: ShaderLibrary,
    target: TextureEntry,
    target_size: (u32, u32),
    lost: Arc<AtomicBool>,
    next_handle: u64,
    textures: HashMap<TextureHandle, TextureEntry>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    samplers: HashMap<SamplerHandle, wgpu::Sampler>,
    pipelines: HashMap<PipelineHandle, PipelineEntry>,
    bindings: HashMap<BindingSetHandle, wgpu::BindGroup>,
}

impl WgpuBackend {
    /// Open a device on the first adapter that fits `config`.
    pub fn new(config: &WgpuConfig) -> Result<Self, WgpuInitError> {
        Self::with_shaders(config, ShaderLibrary::builtin())
    }

    pub fn with_shaders(config: &WgpuConfig, shaders: ShaderLibrary) -> Result<Self, WgpuInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(WgpuInitError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("framegraph_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            tracing::error!(?reason, %message, "wgpu device lost");
            flag.store(true, Ordering::SeqCst);
        });

        let adapter_name = adapter.get_info().name;
        tracing::info!(adapter = %adapter_name, "wgpu backend ready");

        let target = create_target(&device, config.width, config.height);
        Ok(Self {
            device,
            queue,
            adapter_name,
            shaders,
            target,
            target_size: (config.width.max(1), config.height.max(1)),
            lost,
            next_handle: 0,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            samplers: HashMap::new(),
            pipelines: HashMap::new(),
            bindings: HashMap::new(),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    fn next_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_device(&self) -> BackendResult<()> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(BackendError::DeviceLost);
        }
        Ok(())
    }

    /// Run `f` inside validation and out-of-memory error scopes.
    fn scoped<T>(
        &self,
        wrap: fn(String) -> BackendError,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> BackendResult<T> {
        self.check_device()?;
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        if oom.is_some() {
            return Err(BackendError::OutOfMemory);
        }
        if let Some(err) = validation {
            return Err(wrap(err.to_string()));
        }
        self.check_device()?;
        Ok(value)
    }

    fn shader(&self, name: &str) -> BackendResult<&ShaderEntry> {
        self.shaders
            .get(name)
            .ok_or_else(|| BackendError::UnknownShader(name.to_string()))
    }

    fn bind_group(&self, binding: Option<BindingSetHandle>) -> BackendResult<Option<&wgpu::BindGroup>> {
        binding
            .map(|handle| {
                self.bindings
                    .get(&handle)
                    .ok_or_else(|| BackendError::InvalidHandle(format!("binding set {}", handle.raw())))
            })
            .transpose()
    }
}

fn create_target(device: &wgpu::Device, width: u32, height: u32) -> TextureEntry {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("frame_target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&Default::default());
    TextureEntry {
        _texture: texture,
        view,
    }
}

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
    }
}

fn wgpu_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let entry = self.scoped(BackendError::TextureCreation, |device| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label.as_str()),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu_format(desc.format),
                usage: wgpu::TextureUsages::from_bits_truncate(desc.usage),
                view_formats: &[],
            });
            let view = texture.create_view(&Default::default());
            TextureEntry {
                _texture: texture,
                view,
            }
        })?;
        let handle = TextureHandle(self.next_id());
        self.textures.insert(handle, entry);
        Ok(handle)
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self.scoped(BackendError::BufferCreation, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label.as_str()),
                size: desc.size,
                usage: wgpu::BufferUsages::from_bits_truncate(desc.usage),
                mapped_at_creation: false,
            })
        })?;
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> BackendResult<()> {
        let target = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| BackendError::InvalidHandle(format!("buffer {}", buffer.raw())))?;
        self.scoped(BackendError::Submission, |_| {
            self.queue.write_buffer(target, 0, data);
        })
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let sampler = self.scoped(BackendError::SamplerCreation, |device| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(desc.label.as_str()),
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            })
        })?;
        let handle = SamplerHandle(self.next_id());
        self.samplers.insert(handle, sampler);
        Ok(handle)
    }

    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle> {
        let entry = match desc {
            PipelineDescriptor::Compute {
                label,
                shader,
                entry_point,
            } => {
                let shader = self.shader(shader)?;
                self.scoped(BackendError::PipelineCreation, |device| {
                    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(label.as_str()),
                        entries: &layout_entries(&[shader]),
                    });
                    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(label.as_str()),
                        bind_group_layouts: &[&layout],
                        push_constant_ranges: &[],
                    });
                    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(label.as_str()),
                        source: wgpu::ShaderSource::Wgsl(shader.source.as_str().into()),
                    });
                    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: Some(label.as_str()),
                        layout: Some(&pipeline_layout),
                        module: &module,
                        entry_point: Some(entry_point.as_str()),
                        compilation_options: Default::default(),
                        cache: None,
                    });
                    PipelineEntry::Compute { pipeline, layout }
                })?
            }
            PipelineDescriptor::Render {
                label,
                vertex_shader,
                fragment_shader,
                topology,
            } => {
                let vertex = self.shader(vertex_shader)?;
                let fragment = self.shader(fragment_shader)?;
                self.scoped(BackendError::PipelineCreation, |device| {
                    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(label.as_str()),
                        entries: &layout_entries(&[vertex, fragment]),
                    });
                    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(label.as_str()),
                        bind_group_layouts: &[&layout],
                        push_constant_ranges: &[],
                    });
                    let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(label.as_str()),
                        source: wgpu::ShaderSource::Wgsl(vertex.source.as_str().into()),
                    });
                    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(label.as_str()),
                        source: wgpu::ShaderSource::Wgsl(fragment.source.as_str().into()),
                    });
                    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some(label.as_str()),
                        layout: Some(&pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &vertex_module,
                            entry_point: Some(vertex.entry_point.as_str()),
                            compilation_options: Default::default(),
                            buffers: &[],
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &fragment_module,
                            entry_point: Some(fragment.entry_point.as_str()),
                            compilation_options: Default::default(),
                            targets: &[Some(wgpu::ColorTargetState {
                                format: TARGET_FORMAT,
                                blend: Some(wgpu::BlendState::REPLACE),
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology: wgpu_topology(*topology),
                            ..Default::default()
                        },
                        depth_stencil: None,
                        multisample: Default::default(),
                        multiview: None,
                        cache: None,
                    });
                    PipelineEntry::Render { pipeline, layout }
                })?
            }
        };

        let handle = PipelineHandle(self.next_id());
        tracing::debug!(label = desc.label(), handle = handle.raw(), "wgpu pipeline created");
        self.pipelines.insert(handle, entry);
        Ok(handle)
    }

    fn create_binding_set(
        &mut self,
        pipeline: PipelineHandle,
        desc: &BindingSetDescriptor,
    ) -> BackendResult<BindingSetHandle> {
        if desc.group != 0 {
            return Err(BackendError::BindingCreation(format!(
                "{}: only bind group 0 is supported, got {}",
                desc.label, desc.group
            )));
        }
        let entry = self
            .pipelines
            .get(&pipeline)
            .ok_or_else(|| BackendError::InvalidHandle(format!("pipeline {}", pipeline.raw())))?;

        let mut resources = Vec::with_capacity(desc.resources.len());
        for handle in &desc.resources {
            let resource = match handle {
                ResourceHandle::Texture(t) => self
                    .textures
                    .get(t)
                    .map(|e| wgpu::BindingResource::TextureView(&e.view)),
                ResourceHandle::Buffer(b) => self.buffers.get(b).map(|b| b.as_entire_binding()),
                ResourceHandle::Sampler(s) => self.samplers.get(s).map(wgpu::BindingResource::Sampler),
            };
            let resource = resource
                .ok_or_else(|| BackendError::InvalidHandle(format!("{handle:?}")))?;
            resources.push(resource);
        }

        let group = self.scoped(BackendError::BindingCreation, |device| {
            let entries: Vec<wgpu::BindGroupEntry> = resources
                .into_iter()
                .enumerate()
                .map(|(binding, resource)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource,
                })
                .collect();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(desc.label.as_str()),
                layout: entry.layout(),
                entries: &entries,
            })
        })?;

        let handle = BindingSetHandle(self.next_id());
        self.bindings.insert(handle, group);
        Ok(handle)
    }

    fn submit_compute(
        &mut self,
        pipeline: PipelineHandle,
        binding: Option<BindingSetHandle>,
        workgroups: UVec3,
    ) -> BackendResult<()> {
        let Some(PipelineEntry::Compute { pipeline, .. }) = self.pipelines.get(&pipeline) else {
            return Err(BackendError::InvalidHandle(format!("compute pipeline {}", pipeline.raw())));
        };
        let bind_group = self.bind_group(binding)?;

        self.scoped(BackendError::Submission, |device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute_encoder"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("compute_pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(pipeline);
                if let Some(group) = bind_group {
                    pass.set_bind_group(0, group, &[]);
                }
                pass.dispatch_workgroups(workgroups.x, workgroups.y, workgroups.z);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        })
    }

    fn submit_draw(
        &mut self,
        pipeline: PipelineHandle,
        binding: Option<BindingSetHandle>,
        vertex_count: u32,
    ) -> BackendResult<()> {
        let Some(PipelineEntry::Render { pipeline, .. }) = self.pipelines.get(&pipeline) else {
            return Err(BackendError::InvalidHandle(format!("render pipeline {}", pipeline.raw())));
        };
        let bind_group = self.bind_group(binding)?;

        self.scoped(BackendError::Submission, |device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render_encoder"),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("frame_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &self.target.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    ..Default::default()
                });
                pass.set_pipeline(pipeline);
                if let Some(group) = bind_group {
                    pass.set_bind_group(0, group, &[]);
                }
                pass.draw(0..vertex_count, 0..1);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        })
    }

    /// Recreate the frame target and release every object handed out so far.
    fn resize(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.check_device()?;
        self.target = create_target(&self.device, width, height);
        self.target_size = (width.max(1), height.max(1));
        self.bindings.clear();
        self.pipelines.clear();
        self.textures.clear();
        self.buffers.clear();
        self.samplers.clear();
        tracing::debug!(width, height, "wgpu frame target resized");
        Ok(())
    }
}
