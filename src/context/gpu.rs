use std::{
    collections::{HashMap, HashSet},
    iter,
};

use instant::Instant;
use wgpu::util::DeviceExt;

use crate::{
    config::ContextConfig,
    context::{
        Attribute, BufferHandle, ContextError, ContextResult, ProgramDescriptor, ProgramHandle,
        RenderContext, SamplerState, TexParameter, TextureHandle, Uniform, UniformValue,
    },
    data_structures::texture::{self, Texture},
    pipelines::mesh::{self, MeshUniformsRaw},
};

struct Program {
    pipeline: wgpu::RenderPipeline,
    uniforms: MeshUniformsRaw,
    sampler_unit: u32,
}

struct GpuBuffer {
    label: String,
    buffer: Option<wgpu::Buffer>,
    len: usize,
}

struct GpuTexture {
    label: String,
    /// Base level first; a single entry until mipmaps are generated.
    levels: Vec<image::RgbaImage>,
    sampler_state: SamplerState,
    texture: Texture,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
}

#[derive(Default)]
struct BoundState {
    program: Option<ProgramHandle>,
    texture_units: HashMap<u32, TextureHandle>,
    attributes: HashMap<Attribute, BufferHandle>,
    enabled: HashSet<Attribute>,
}

/// Everything needed to replay one `draw_arrays` inside a render pass.
///
/// Resources are captured by value so later uploads don't affect draws that
/// were already issued this frame.
struct DrawCommand {
    pipeline: wgpu::RenderPipeline,
    vertex_buffers: Vec<wgpu::Buffer>,
    texture_bind_group: wgpu::BindGroup,
    uniforms: MeshUniformsRaw,
    first: u32,
    count: u32,
}

/// A [`RenderContext`] backed by a WGPU device.
///
/// Draw calls are recorded while the scene is traversed and encoded into a
/// single render pass by [`render_to_view`](Self::render_to_view) or
/// [`render_offscreen`](Self::render_offscreen). Recorded draws are only
/// released by rendering a frame or by
/// [`discard_pending_draws`](Self::discard_pending_draws); once
/// `ContextConfig::max_pending_draws` are queued, `draw_arrays` fails with
/// [`ContextError::TooManyPendingDraws`].
///
/// On native targets shader validation errors are returned by
/// `create_program`. On wasm32 they cannot be awaited synchronously and are
/// reported through the device's uncaptured error handler instead.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: ContextConfig,
    target: Texture,
    depth_texture: Texture,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    placeholder_bind_group: wgpu::BindGroup,
    programs: Vec<Program>,
    buffers: Vec<GpuBuffer>,
    textures: Vec<GpuTexture>,
    bound: BoundState,
    commands: Vec<DrawCommand>,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("config", &self.config)
            .field("programs", &self.programs.len())
            .field("buffers", &self.buffers.len())
            .field("textures", &self.textures.len())
            .field("pending_draws", &self.commands.len())
            .finish()
    }
}

impl GpuContext {
    /// Creates a context on a device without any surface.
    pub async fn new_headless(config: ContextConfig) -> ContextResult<Self> {
        log::debug!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: config.backends,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| ContextError::NoAdapter(e.to_string()))?;
        log::debug!("device and queue on {:?}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("flow-scene device"),
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .map_err(|e| ContextError::RequestDevice(e.to_string()))?;

        Ok(Self::new(device, queue, config))
    }

    /// Wraps an existing device, e.g. one that also drives a window surface.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, config: ContextConfig) -> Self {
        let uniform_layout = mesh::uniform_layout(&device);
        let texture_layout = mesh::texture_layout(&device);
        let target = Texture::create_color_target(
            &device,
            [config.width, config.height],
            config.color_format,
            "offscreen_target",
        );
        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let placeholder = Texture::create_placeholder(&device, &queue);
        let placeholder_sampler =
            device.create_sampler(&texture::sampler_descriptor(&SamplerState::default()));
        let placeholder_bind_group =
            mk_texture_bind_group(&device, &texture_layout, &placeholder, &placeholder_sampler);

        Self {
            device,
            queue,
            config,
            target,
            depth_texture,
            uniform_layout,
            texture_layout,
            placeholder_bind_group,
            programs: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            bound: BoundState::default(),
            commands: Vec::new(),
        }
    }

    /// Recreates the offscreen target and depth buffer for a new frame size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ignoring resize to {}x{}", width, height);
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.target = Texture::create_color_target(
            &self.device,
            [width, height],
            self.config.color_format,
            "offscreen_target",
        );
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
    }

    /// Number of draws recorded since the last rendered frame.
    pub fn pending_draws(&self) -> usize {
        self.commands.len()
    }

    /// Drops all draws recorded since the last rendered frame.
    pub fn discard_pending_draws(&mut self) {
        if !self.commands.is_empty() {
            log::debug!("discarding {} pending draws", self.commands.len());
        }
        self.commands.clear();
    }

    /// Encodes and submits all recorded draws into `view`.
    ///
    /// `view` has to match the configured size and colour format.
    pub fn render_to_view(&mut self, view: &wgpu::TextureView) {
        let encoder = self.encode_frame(view);
        self.queue.submit(iter::once(encoder.finish()));
    }

    /// Renders all recorded draws into the offscreen target and reads the
    /// result back.
    pub async fn render_offscreen(&mut self) -> ContextResult<image::RgbaImage> {
        let started = Instant::now();
        let view = self.target.view.clone();
        let mut encoder = self.encode_frame(&view);

        let (width, height) = (self.config.width, self.config.height);
        let u32_size = std::mem::size_of::<u32>() as u32;
        let unpadded_bytes_per_row = u32_size * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Readback Buffer"),
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        // NOTE: We have to create the mapping THEN device.poll() before await
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            // the receiver outlives the poll below
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(self.config.readback_timeout),
            })
            .map_err(|e| ContextError::Readback(e.to_string()))?;
        match rx.receive().await {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(ContextError::Readback(e.to_string())),
            None => return Err(ContextError::Readback("mapping was cancelled".to_string())),
        }

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in data.chunks(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(data);
        output_buffer.unmap();

        log::debug!("offscreen frame read back in {:?}", started.elapsed());
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| ContextError::Readback("frame size does not match".to_string()))
    }

    fn encode_frame(&mut self, view: &wgpu::TextureView) -> wgpu::CommandEncoder {
        let commands = std::mem::take(&mut self.commands);
        let uniform_bind_groups = commands
            .iter()
            .map(|command| {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Mesh Uniform Buffer"),
                        contents: bytemuck::cast_slice(&[command.uniforms]),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &self.uniform_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                    label: Some("mesh_uniform_bind_group"),
                })
            })
            .collect::<Vec<_>>();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.config.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            for (command, uniforms) in commands.iter().zip(&uniform_bind_groups) {
                render_pass.set_pipeline(&command.pipeline);
                render_pass.set_bind_group(0, uniforms, &[]);
                render_pass.set_bind_group(1, &command.texture_bind_group, &[]);
                for (slot, buffer) in command.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.draw(command.first..command.first + command.count, 0..1);
            }
        }
        log::trace!("encoded {} draws", commands.len());
        encoder
    }

    fn program(&self, program: ProgramHandle) -> ContextResult<&Program> {
        self.programs
            .get(program.0 as usize)
            .ok_or(ContextError::UnknownProgram(program))
    }

    fn buffer(&self, buffer: BufferHandle) -> ContextResult<&GpuBuffer> {
        self.buffers
            .get(buffer.0 as usize)
            .ok_or(ContextError::UnknownBuffer(buffer))
    }

    fn texture_mut(&mut self, texture: TextureHandle) -> ContextResult<&mut GpuTexture> {
        self.textures
            .get_mut(texture.0 as usize)
            .ok_or(ContextError::UnknownTexture(texture))
    }

    /// Re-uploads all levels of `texture` and rebuilds its bind group.
    fn upload_texture(&mut self, handle: TextureHandle) -> ContextResult<()> {
        let device = self.device.clone();
        let queue = self.queue.clone();
        let layout = self.texture_layout.clone();
        let gpu_texture = self.texture_mut(handle)?;
        gpu_texture.texture = Texture::from_levels(
            &device,
            &queue,
            &gpu_texture.levels,
            Some(&gpu_texture.label),
        );
        gpu_texture.bind_group =
            mk_texture_bind_group(&device, &layout, &gpu_texture.texture, &gpu_texture.sampler);
        log::debug!(
            "uploaded texture {:?} with {} mip levels",
            handle,
            gpu_texture.levels.len()
        );
        Ok(())
    }
}

fn mk_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &Texture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("mesh_texture_bind_group"),
    })
}

impl RenderContext for GpuContext {
    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> ContextResult<ProgramHandle> {
        // on wasm32 validation errors reach the uncaptured error handler
        #[cfg(not(target_arch = "wasm32"))]
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = mesh::mk_mesh_pipeline(
            &self.device,
            self.config.color_format,
            &self.uniform_layout,
            &self.texture_layout,
            desc,
        );
        #[cfg(not(target_arch = "wasm32"))]
        if let Some(error) = futures::executor::block_on(scope.pop()) {
            return Err(ContextError::ShaderCompilation {
                label: desc.label.to_string(),
                reason: error.to_string(),
            });
        }

        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(Program {
            pipeline,
            uniforms: MeshUniformsRaw::default(),
            sampler_unit: 0,
        });
        log::debug!("compiled program {:?} ({})", handle, desc.label);
        Ok(handle)
    }

    fn create_buffer(&mut self, label: &str) -> ContextResult<BufferHandle> {
        let handle = BufferHandle(self.buffers.len() as u32);
        self.buffers.push(GpuBuffer {
            label: label.to_string(),
            buffer: None,
            len: 0,
        });
        Ok(handle)
    }

    fn buffer_data(&mut self, handle: BufferHandle, data: &[f32]) -> ContextResult<()> {
        let device = self.device.clone();
        let buffer = self
            .buffers
            .get_mut(handle.0 as usize)
            .ok_or(ContextError::UnknownBuffer(handle))?;
        // Empty buffers cannot be bound; a draw over them has zero vertices anyway.
        buffer.buffer = (!data.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&buffer.label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        buffer.len = data.len();
        Ok(())
    }

    fn create_texture(&mut self, label: &str) -> ContextResult<TextureHandle> {
        let handle = TextureHandle(self.textures.len() as u32);
        let white = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        let sampler_state = SamplerState::default();
        let texture = Texture::from_levels(
            &self.device,
            &self.queue,
            std::slice::from_ref(&white),
            Some(label),
        );
        let sampler = self
            .device
            .create_sampler(&texture::sampler_descriptor(&sampler_state));
        let bind_group =
            mk_texture_bind_group(&self.device, &self.texture_layout, &texture, &sampler);
        self.textures.push(GpuTexture {
            label: label.to_string(),
            levels: vec![white],
            sampler_state,
            texture,
            sampler,
            bind_group,
        });
        Ok(handle)
    }

    fn tex_image_2d(
        &mut self,
        handle: TextureHandle,
        image: &image::RgbaImage,
    ) -> ContextResult<()> {
        self.texture_mut(handle)?.levels = vec![image.clone()];
        self.upload_texture(handle)
    }

    fn tex_parameter(
        &mut self,
        handle: TextureHandle,
        parameter: TexParameter,
    ) -> ContextResult<()> {
        let device = self.device.clone();
        let layout = self.texture_layout.clone();
        let gpu_texture = self.texture_mut(handle)?;
        gpu_texture.sampler_state.apply(parameter);
        gpu_texture.sampler =
            device.create_sampler(&texture::sampler_descriptor(&gpu_texture.sampler_state));
        gpu_texture.bind_group =
            mk_texture_bind_group(&device, &layout, &gpu_texture.texture, &gpu_texture.sampler);
        Ok(())
    }

    fn generate_mipmap(&mut self, handle: TextureHandle) -> ContextResult<()> {
        let gpu_texture = self.texture_mut(handle)?;
        gpu_texture.levels = texture::mip_chain(&gpu_texture.levels[0]);
        self.upload_texture(handle)
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> ContextResult<()> {
        if texture.0 as usize >= self.textures.len() {
            return Err(ContextError::UnknownTexture(texture));
        }
        self.bound.texture_units.insert(unit, texture);
        Ok(())
    }

    fn use_program(&mut self, program: ProgramHandle) -> ContextResult<()> {
        self.program(program)?;
        self.bound.program = Some(program);
        Ok(())
    }

    fn uniform(&mut self, uniform: Uniform, value: UniformValue) -> ContextResult<()> {
        let handle = self.bound.program.ok_or(ContextError::NoProgramInUse)?;
        let program = self
            .programs
            .get_mut(handle.0 as usize)
            .ok_or(ContextError::UnknownProgram(handle))?;
        let uniforms = &mut program.uniforms;
        match (uniform, value) {
            (Uniform::Mvp, UniformValue::Mat4(m)) => uniforms.mvp = m.into(),
            (Uniform::ModelView, UniformValue::Mat4(m)) => uniforms.model_view = m.into(),
            (Uniform::Normal, UniformValue::Mat4(m)) => uniforms.normal = m.into(),
            (Uniform::Model, UniformValue::Mat4(m)) => uniforms.model = m.into(),
            (Uniform::IsLightSource, UniformValue::Bool(flag)) => {
                uniforms.is_light_source = u32::from(flag)
            }
            (Uniform::Sampler, UniformValue::TextureUnit(unit)) => program.sampler_unit = unit,
            (uniform, value) => {
                log::warn!("ignoring {:?} for uniform {:?}", value, uniform);
            }
        }
        Ok(())
    }

    fn vertex_attrib_pointer(
        &mut self,
        attribute: Attribute,
        buffer: BufferHandle,
    ) -> ContextResult<()> {
        self.buffer(buffer)?;
        self.bound.attributes.insert(attribute, buffer);
        Ok(())
    }

    fn enable_vertex_attrib_array(&mut self, attribute: Attribute) -> ContextResult<()> {
        self.bound.enabled.insert(attribute);
        Ok(())
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> ContextResult<()> {
        let handle = self.bound.program.ok_or(ContextError::NoProgramInUse)?;
        if count == 0 {
            log::trace!("skipping draw of zero vertices");
            return Ok(());
        }
        if self.commands.len() >= self.config.max_pending_draws {
            return Err(ContextError::TooManyPendingDraws(self.commands.len()));
        }
        let (pipeline, uniforms, sampler_unit) = {
            let program = self.program(handle)?;
            (program.pipeline.clone(), program.uniforms, program.sampler_unit)
        };

        let mut vertex_buffers = Vec::with_capacity(Attribute::ALL.len());
        for attribute in Attribute::ALL {
            let bound = self
                .bound
                .attributes
                .get(&attribute)
                .filter(|_| self.bound.enabled.contains(&attribute))
                .ok_or(ContextError::UnboundAttribute(attribute))?;
            let buffer = self.buffer(*bound)?;
            let available = buffer.len / attribute.components() as usize;
            let required = first as usize + count as usize;
            match &buffer.buffer {
                Some(gpu_buffer) if available >= required => vertex_buffers.push(gpu_buffer.clone()),
                _ => {
                    return Err(ContextError::BufferTooSmall {
                        buffer: *bound,
                        required,
                        available,
                    });
                }
            }
        }

        let texture_bind_group = self
            .bound
            .texture_units
            .get(&sampler_unit)
            .and_then(|texture| self.textures.get(texture.0 as usize))
            .map_or_else(
                || self.placeholder_bind_group.clone(),
                |texture| texture.bind_group.clone(),
            );

        self.commands.push(DrawCommand {
            pipeline,
            vertex_buffers,
            texture_bind_group,
            uniforms,
            first,
            count,
        });
        Ok(())
    }
}
