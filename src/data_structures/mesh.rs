//! Textured triangle meshes resident in a rendering context.

use crate::{
    context::{
        Attribute, BufferHandle, MinFilter, ProgramHandle, RenderContext, TexParameter,
        TextureHandle, Uniform, UniformValue, WrapMode,
    },
    data_structures::{scene_graph::Drawable, texture, transform::NodeMatrices},
    error::{RenderError, RenderResult},
    pipelines,
    resources::mesh::MeshData,
};

/// Texture unit the mesh program samples from.
const TEXTURE_UNIT: u32 = 0;

/// A triangle list with one texture, drawn with the fixed mesh program.
///
/// All resources live in the [`RenderContext`] the drawer was created with and
/// are addressed through handles. The same context has to be passed to every
/// later call.
#[derive(Debug)]
pub struct MeshDrawer {
    program: ProgramHandle,
    position_buffer: BufferHandle,
    normal_buffer: BufferHandle,
    tex_coord_buffer: BufferHandle,
    texture: TextureHandle,
    vertex_count: u32,
    is_light_source: bool,
}

impl MeshDrawer {
    /// Compiles the mesh program and allocates the buffers and the texture.
    ///
    /// Light sources skip the lighting computation and show their texture as is.
    /// On wasm32 a program that fails validation is not reported here; wgpu
    /// hands the error to the device's uncaptured error handler instead.
    pub fn new(ctx: &mut dyn RenderContext, is_light_source: bool) -> RenderResult<Self> {
        let program = ctx.create_program(&pipelines::mesh::program_descriptor())?;
        let position_buffer = ctx.create_buffer("Mesh Position Buffer")?;
        let normal_buffer = ctx.create_buffer("Mesh Normal Buffer")?;
        let tex_coord_buffer = ctx.create_buffer("Mesh TexCoord Buffer")?;
        let texture = ctx.create_texture("Mesh Texture")?;
        log::debug!(
            "created mesh drawer (program {:?}, light source: {})",
            program,
            is_light_source
        );

        Ok(Self {
            program,
            position_buffer,
            normal_buffer,
            tex_coord_buffer,
            texture,
            vertex_count: 0,
            is_light_source,
        })
    }

    /// Replaces all vertex attributes.
    ///
    /// The arrays are flattened per vertex: three floats per position and
    /// normal, two per texture coordinate. All three must describe the same
    /// number of vertices, otherwise nothing is uploaded.
    pub fn set_mesh(
        &mut self,
        ctx: &mut dyn RenderContext,
        positions: &[f32],
        tex_coords: &[f32],
        normals: &[f32],
    ) -> RenderResult<()> {
        if positions.len() % 3 != 0 {
            return Err(RenderError::PreconditionViolation(format!(
                "{} position components are not a whole number of vertices",
                positions.len()
            )));
        }
        let vertex_count = positions.len() / 3;
        if normals.len() != positions.len() {
            return Err(RenderError::PreconditionViolation(format!(
                "expected {} normal components for {} vertices, got {}",
                positions.len(),
                vertex_count,
                normals.len()
            )));
        }
        if tex_coords.len() != vertex_count * 2 {
            return Err(RenderError::PreconditionViolation(format!(
                "expected {} texture coordinate components for {} vertices, got {}",
                vertex_count * 2,
                vertex_count,
                tex_coords.len()
            )));
        }
        let vertex_count = u32::try_from(vertex_count).map_err(|_| {
            RenderError::PreconditionViolation(format!(
                "{vertex_count} vertices do not fit a draw call"
            ))
        })?;

        ctx.buffer_data(self.position_buffer, positions)?;
        ctx.buffer_data(self.normal_buffer, normals)?;
        ctx.buffer_data(self.tex_coord_buffer, tex_coords)?;
        self.vertex_count = vertex_count;
        Ok(())
    }

    pub fn set_mesh_data(
        &mut self,
        ctx: &mut dyn RenderContext,
        mesh: &MeshData,
    ) -> RenderResult<()> {
        self.set_mesh(ctx, &mesh.positions, &mesh.tex_coords, &mesh.normals)
    }

    /// Uploads `image` as the mesh texture.
    ///
    /// Power-of-two images get a full mip chain. Any other size can neither be
    /// mipmapped nor repeated, so it is sampled linearly and clamped to the edge.
    pub fn set_texture(
        &mut self,
        ctx: &mut dyn RenderContext,
        image: &image::RgbaImage,
    ) -> RenderResult<()> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::PreconditionViolation(format!(
                "cannot use a {width}x{height} image as texture"
            )));
        }
        ctx.tex_image_2d(self.texture, image)?;

        if texture::is_power_of_two(width) && texture::is_power_of_two(height) {
            ctx.generate_mipmap(self.texture)?;
        } else {
            log::debug!("{width}x{height} texture is not a power of two, disabling mipmaps");
            ctx.tex_parameter(self.texture, TexParameter::MinFilter(MinFilter::Linear))?;
            ctx.tex_parameter(self.texture, TexParameter::WrapS(WrapMode::ClampToEdge))?;
            ctx.tex_parameter(self.texture, TexParameter::WrapT(WrapMode::ClampToEdge))?;
        }

        ctx.use_program(self.program)?;
        ctx.bind_texture(TEXTURE_UNIT, self.texture)?;
        ctx.uniform(Uniform::Sampler, UniformValue::TextureUnit(TEXTURE_UNIT))?;
        Ok(())
    }

    /// Submits the mesh with the given, fully resolved matrices.
    ///
    /// A mesh that never received vertices draws zero of them.
    pub fn draw(&self, ctx: &mut dyn RenderContext, matrices: &NodeMatrices) -> RenderResult<()> {
        ctx.use_program(self.program)?;
        ctx.bind_texture(TEXTURE_UNIT, self.texture)?;

        ctx.uniform(Uniform::Mvp, UniformValue::Mat4(matrices.mvp))?;
        ctx.uniform(Uniform::ModelView, UniformValue::Mat4(matrices.model_view))?;
        ctx.uniform(Uniform::Normal, UniformValue::Mat4(matrices.normal))?;
        ctx.uniform(Uniform::Model, UniformValue::Mat4(matrices.model))?;
        ctx.uniform(Uniform::IsLightSource, UniformValue::Bool(self.is_light_source))?;

        for (attribute, buffer) in [
            (Attribute::Position, self.position_buffer),
            (Attribute::Normal, self.normal_buffer),
            (Attribute::TexCoord, self.tex_coord_buffer),
        ] {
            ctx.vertex_attrib_pointer(attribute, buffer)?;
            ctx.enable_vertex_attrib_array(attribute)?;
        }

        ctx.draw_arrays(0, self.vertex_count)?;
        Ok(())
    }

    /// Number of vertices uploaded by the last [`set_mesh`](Self::set_mesh).
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn triangle_count(&self) -> u32 {
        self.vertex_count / 3
    }

    pub fn is_light_source(&self) -> bool {
        self.is_light_source
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }
}

impl Drawable for MeshDrawer {
    fn draw(&self, ctx: &mut dyn RenderContext, matrices: &NodeMatrices) -> RenderResult<()> {
        MeshDrawer::draw(self, ctx, matrices)
    }
}
