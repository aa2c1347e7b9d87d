//! The rendering context capability set.
//!
//! Every GPU-facing operation in this crate goes through a [`RenderContext`]
//! that is passed in explicitly. Resources are referred to by small opaque
//! handles, so a mesh never holds on to backend objects directly and the whole
//! context can be swapped for a [`recording::RecordingContext`] in tests.
//!
//! - `gpu` contains the wgpu backed implementation used for real rendering
//! - `recording` contains an implementation that records every call

pub mod gpu;
pub mod recording;

use thiserror::Error;

/// Errors reported by a [`RenderContext`].
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Failed to compile shader program {label}: {reason}")]
    ShaderCompilation { label: String, reason: String },
    #[error("Unknown program {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("Unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("Unknown texture {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("No program is in use")]
    NoProgramInUse,
    #[error("Attribute {0:?} is not bound to an enabled buffer")]
    UnboundAttribute(Attribute),
    #[error("Buffer {buffer:?} holds {available} vertices, draw needs {required}")]
    BufferTooSmall {
        buffer: BufferHandle,
        required: usize,
        available: usize,
    },
    #[error("{0} draws are pending, render or discard them first")]
    TooManyPendingDraws(usize),
    #[error("No suitable GPU adapter found: {0}")]
    NoAdapter(String),
    #[error("Failed to request device: {0}")]
    RequestDevice(String),
    #[error("Failed to read back the rendered frame: {0}")]
    Readback(String),
}

pub type ContextResult<T> = Result<T, ContextError>;

/// Handle to a compiled shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u32);

/// Handle to a vertex attribute buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u32);

/// Handle to a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u32);

/// Vertex attributes consumed by the mesh program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    Normal,
    TexCoord,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Position, Attribute::Normal, Attribute::TexCoord];

    /// Shader location of the attribute.
    pub fn location(self) -> u32 {
        match self {
            Attribute::Position => 0,
            Attribute::Normal => 1,
            Attribute::TexCoord => 2,
        }
    }

    /// Number of `f32` components per vertex.
    pub fn components(self) -> u32 {
        match self {
            Attribute::Position | Attribute::Normal => 3,
            Attribute::TexCoord => 2,
        }
    }
}

/// Uniforms declared by the mesh program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    Mvp,
    ModelView,
    Normal,
    Model,
    IsLightSource,
    Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(cgmath::Matrix4<f32>),
    Bool(bool),
    TextureUnit(u32),
}

/// Minification filter of a texture.
///
/// The `*Mipmap*` variants sample between mip levels and require a mip chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// A single texture parameter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexParameter {
    MinFilter(MinFilter),
    WrapS(WrapMode),
    WrapT(WrapMode),
}

/// Sampling state of a texture, starting from the usual GL defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub min_filter: MinFilter,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            min_filter: MinFilter::NearestMipmapLinear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
        }
    }
}

impl SamplerState {
    pub fn apply(&mut self, parameter: TexParameter) {
        match parameter {
            TexParameter::MinFilter(filter) => self.min_filter = filter,
            TexParameter::WrapS(wrap) => self.wrap_s = wrap,
            TexParameter::WrapT(wrap) => self.wrap_t = wrap,
        }
    }
}

/// Description of the program to compile.
#[derive(Debug, Clone)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub source: &'a str,
}

/// The capability set a mesh needs from the rendering context.
///
/// Operations act on explicit handles. The only implicit state is the program
/// selected with [`use_program`](Self::use_program), the texture units and the
/// attribute bindings, which together form the input of the next
/// [`draw_arrays`](Self::draw_arrays).
pub trait RenderContext {
    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> ContextResult<ProgramHandle>;

    fn create_buffer(&mut self, label: &str) -> ContextResult<BufferHandle>;

    /// Replaces the whole content of `buffer`.
    fn buffer_data(&mut self, buffer: BufferHandle, data: &[f32]) -> ContextResult<()>;

    fn create_texture(&mut self, label: &str) -> ContextResult<TextureHandle>;

    /// Replaces the base level of `texture` with `image`, dropping any mip chain.
    fn tex_image_2d(
        &mut self,
        texture: TextureHandle,
        image: &image::RgbaImage,
    ) -> ContextResult<()>;

    fn tex_parameter(
        &mut self,
        texture: TextureHandle,
        parameter: TexParameter,
    ) -> ContextResult<()>;

    fn generate_mipmap(&mut self, texture: TextureHandle) -> ContextResult<()>;

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> ContextResult<()>;

    fn use_program(&mut self, program: ProgramHandle) -> ContextResult<()>;

    /// Sets a uniform of the program in use.
    fn uniform(&mut self, uniform: Uniform, value: UniformValue) -> ContextResult<()>;

    fn vertex_attrib_pointer(
        &mut self,
        attribute: Attribute,
        buffer: BufferHandle,
    ) -> ContextResult<()>;

    fn enable_vertex_attrib_array(&mut self, attribute: Attribute) -> ContextResult<()>;

    /// Draws `count` vertices as a triangle list starting at `first`.
    fn draw_arrays(&mut self, first: u32, count: u32) -> ContextResult<()>;
}
