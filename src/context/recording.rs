//! A [`RenderContext`] that never touches a GPU.
//!
//! Every call is appended to a log which tests inspect afterwards. Handles,
//! buffer sizes, attribute bindings and the bound program are tracked like
//! [`GpuContext`](crate::context::gpu::GpuContext) tracks them, so invalid
//! handles, draws without a program, draws over unbound or disabled
//! attributes and draws past the end of a buffer fail with the same errors.

use std::collections::{HashMap, HashSet};

use cgmath::{Matrix4, SquareMatrix};

use crate::context::{
    Attribute, BufferHandle, ContextError, ContextResult, ProgramDescriptor, ProgramHandle,
    RenderContext, SamplerState, TexParameter, TextureHandle, Uniform, UniformValue,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateProgram { label: String },
    CreateBuffer { label: String },
    BufferData { buffer: BufferHandle, len: usize },
    CreateTexture { label: String },
    TexImage2d { texture: TextureHandle, width: u32, height: u32 },
    TexParameter { texture: TextureHandle, parameter: TexParameter },
    GenerateMipmap { texture: TextureHandle },
    BindTexture { unit: u32, texture: TextureHandle },
    UseProgram { program: ProgramHandle },
    Uniform { uniform: Uniform, value: UniformValue },
    VertexAttribPointer { attribute: Attribute, buffer: BufferHandle },
    EnableVertexAttribArray { attribute: Attribute },
    DrawArrays(DrawCall),
}

/// State of the context at the moment `draw_arrays` was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub first: u32,
    pub count: u32,
    pub model: Matrix4<f32>,
    pub mvp: Matrix4<f32>,
    pub is_light_source: bool,
}

#[derive(Debug, Default)]
struct RecordedTexture {
    size: Option<(u32, u32)>,
    mip_levels: u32,
    sampler_state: SamplerState,
}

#[derive(Debug)]
struct ProgramState {
    model: Matrix4<f32>,
    mvp: Matrix4<f32>,
    is_light_source: bool,
}

impl Default for ProgramState {
    fn default() -> Self {
        Self {
            model: Matrix4::identity(),
            mvp: Matrix4::identity(),
            is_light_source: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingContext {
    calls: Vec<Call>,
    programs: Vec<ProgramState>,
    buffers: Vec<usize>,
    textures: Vec<RecordedTexture>,
    program: Option<ProgramHandle>,
    texture_units: HashMap<u32, TextureHandle>,
    attributes: HashMap<Attribute, BufferHandle>,
    enabled: HashSet<Attribute>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Forgets the recorded calls but keeps all resources.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter().filter_map(|call| match call {
            Call::DrawArrays(draw) => Some(draw),
            _ => None,
        })
    }

    /// Number of floats last uploaded to `buffer`.
    pub fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers.get(buffer.0 as usize).copied()
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(texture.0 as usize)?.size
    }

    /// Mip levels of `texture`, base level included.
    pub fn mip_levels(&self, texture: TextureHandle) -> Option<u32> {
        self.textures.get(texture.0 as usize).map(|t| t.mip_levels)
    }

    pub fn sampler_state(&self, texture: TextureHandle) -> Option<SamplerState> {
        self.textures.get(texture.0 as usize).map(|t| t.sampler_state)
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.texture_units.get(&unit).copied()
    }

    fn texture_mut(&mut self, texture: TextureHandle) -> ContextResult<&mut RecordedTexture> {
        self.textures
            .get_mut(texture.0 as usize)
            .ok_or(ContextError::UnknownTexture(texture))
    }

    fn check_attributes(&self, first: u32, count: u32) -> ContextResult<()> {
        for attribute in Attribute::ALL {
            let buffer = self
                .attributes
                .get(&attribute)
                .filter(|_| self.enabled.contains(&attribute))
                .copied()
                .ok_or(ContextError::UnboundAttribute(attribute))?;
            let len = self
                .buffers
                .get(buffer.0 as usize)
                .ok_or(ContextError::UnknownBuffer(buffer))?;
            let available = len / attribute.components() as usize;
            let required = first as usize + count as usize;
            if available < required {
                return Err(ContextError::BufferTooSmall {
                    buffer,
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    fn current_program(&mut self) -> ContextResult<(ProgramHandle, &mut ProgramState)> {
        let handle = self.program.ok_or(ContextError::NoProgramInUse)?;
        let state = self
            .programs
            .get_mut(handle.0 as usize)
            .ok_or(ContextError::UnknownProgram(handle))?;
        Ok((handle, state))
    }
}

impl RenderContext for RecordingContext {
    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> ContextResult<ProgramHandle> {
        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(ProgramState::default());
        self.calls.push(Call::CreateProgram {
            label: desc.label.to_string(),
        });
        Ok(handle)
    }

    fn create_buffer(&mut self, label: &str) -> ContextResult<BufferHandle> {
        let handle = BufferHandle(self.buffers.len() as u32);
        self.buffers.push(0);
        self.calls.push(Call::CreateBuffer {
            label: label.to_string(),
        });
        Ok(handle)
    }

    fn buffer_data(&mut self, buffer: BufferHandle, data: &[f32]) -> ContextResult<()> {
        let len = self
            .buffers
            .get_mut(buffer.0 as usize)
            .ok_or(ContextError::UnknownBuffer(buffer))?;
        *len = data.len();
        self.calls.push(Call::BufferData {
            buffer,
            len: data.len(),
        });
        Ok(())
    }

    fn create_texture(&mut self, label: &str) -> ContextResult<TextureHandle> {
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(RecordedTexture::default());
        self.calls.push(Call::CreateTexture {
            label: label.to_string(),
        });
        Ok(handle)
    }

    fn tex_image_2d(
        &mut self,
        texture: TextureHandle,
        image: &image::RgbaImage,
    ) -> ContextResult<()> {
        let (width, height) = image.dimensions();
        let recorded = self.texture_mut(texture)?;
        recorded.size = Some((width, height));
        recorded.mip_levels = 1;
        self.calls.push(Call::TexImage2d {
            texture,
            width,
            height,
        });
        Ok(())
    }

    fn tex_parameter(
        &mut self,
        texture: TextureHandle,
        parameter: TexParameter,
    ) -> ContextResult<()> {
        self.texture_mut(texture)?.sampler_state.apply(parameter);
        self.calls.push(Call::TexParameter { texture, parameter });
        Ok(())
    }

    fn generate_mipmap(&mut self, texture: TextureHandle) -> ContextResult<()> {
        let recorded = self.texture_mut(texture)?;
        if let Some((width, height)) = recorded.size {
            recorded.mip_levels = 32 - width.max(height).leading_zeros();
        }
        self.calls.push(Call::GenerateMipmap { texture });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> ContextResult<()> {
        self.texture_mut(texture)?;
        self.texture_units.insert(unit, texture);
        self.calls.push(Call::BindTexture { unit, texture });
        Ok(())
    }

    fn use_program(&mut self, program: ProgramHandle) -> ContextResult<()> {
        if program.0 as usize >= self.programs.len() {
            return Err(ContextError::UnknownProgram(program));
        }
        self.program = Some(program);
        self.calls.push(Call::UseProgram { program });
        Ok(())
    }

    fn uniform(&mut self, uniform: Uniform, value: UniformValue) -> ContextResult<()> {
        let (_, state) = self.current_program()?;
        match (uniform, value) {
            (Uniform::Model, UniformValue::Mat4(m)) => state.model = m,
            (Uniform::Mvp, UniformValue::Mat4(m)) => state.mvp = m,
            (Uniform::IsLightSource, UniformValue::Bool(flag)) => state.is_light_source = flag,
            _ => {}
        }
        self.calls.push(Call::Uniform { uniform, value });
        Ok(())
    }

    fn vertex_attrib_pointer(
        &mut self,
        attribute: Attribute,
        buffer: BufferHandle,
    ) -> ContextResult<()> {
        if buffer.0 as usize >= self.buffers.len() {
            return Err(ContextError::UnknownBuffer(buffer));
        }
        self.attributes.insert(attribute, buffer);
        self.calls
            .push(Call::VertexAttribPointer { attribute, buffer });
        Ok(())
    }

    fn enable_vertex_attrib_array(&mut self, attribute: Attribute) -> ContextResult<()> {
        self.enabled.insert(attribute);
        self.calls.push(Call::EnableVertexAttribArray { attribute });
        Ok(())
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> ContextResult<()> {
        self.program.ok_or(ContextError::NoProgramInUse)?;
        // zero vertex draws are recorded but never read any attribute
        if count > 0 {
            self.check_attributes(first, count)?;
        }
        let (program, state) = self.current_program()?;
        let draw = DrawCall {
            program,
            first,
            count,
            model: state.model,
            mvp: state.mvp,
            is_light_source: state.is_light_source,
        };
        self.calls.push(Call::DrawArrays(draw));
        Ok(())
    }
}

