//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU GPU texture resources,
//! and the helpers the GPU context uses to turn decoded images into sampled
//! textures: mip chain generation and the mapping of [`SamplerState`] onto a
//! WGPU sampler descriptor.

use image::imageops::{self, FilterType};

use crate::context::{MinFilter, SamplerState, WrapMode};

/// Whether `value` is a positive power of two.
pub fn is_power_of_two(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

/// Builds the full mip chain of `base`, base level included.
///
/// Each level halves both dimensions (never below one pixel) until a 1x1
/// level is reached.
pub fn mip_chain(base: &image::RgbaImage) -> Vec<image::RgbaImage> {
    let mut levels = vec![base.clone()];
    loop {
        let previous = &levels[levels.len() - 1];
        let (width, height) = previous.dimensions();
        if width <= 1 && height <= 1 {
            break;
        }
        let next = imageops::resize(
            previous,
            (width / 2).max(1),
            (height / 2).max(1),
            FilterType::Triangle,
        );
        levels.push(next);
    }
    levels
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

/// Translates GL style sampling state into a WGPU sampler descriptor.
pub fn sampler_descriptor(state: &SamplerState) -> wgpu::SamplerDescriptor<'static> {
    let (min_filter, mipmap_filter) = match state.min_filter {
        MinFilter::Nearest => (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Nearest),
        MinFilter::Linear => (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Nearest),
        MinFilter::NearestMipmapLinear => {
            (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Linear)
        }
        MinFilter::LinearMipmapLinear => (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Linear),
    };
    wgpu::SamplerDescriptor {
        label: Some("Mesh Texture Sampler"),
        address_mode_u: address_mode(state.wrap_s),
        address_mode_v: address_mode(state.wrap_t),
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter,
        mipmap_filter,
        ..Default::default()
    }
}

/// A GPU texture with its default view.
///
/// Samplers are kept next to the texture by its owner as they change
/// independently of the texel data. Colour textures are created via
/// [`from_levels`](Self::from_levels), render targets via
/// [`create_depth_texture`](Self::create_depth_texture) and
/// [`create_color_target`](Self::create_color_target).
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Format of sampled colour textures.
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }

    /// Create an offscreen colour target that can be copied back to the CPU.
    pub fn create_color_target(
        device: &wgpu::Device,
        size: [u32; 2],
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }

    /// Upload `levels` (base level first) as one sampled texture.
    ///
    /// The dimensions of every level have to follow the usual halving rule of
    /// a mip chain, see [`mip_chain`].
    pub fn from_levels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        levels: &[image::RgbaImage],
        label: Option<&str>,
    ) -> Self {
        let (width, height) = levels.first().map_or((1, 1), |base| base.dimensions());
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: levels.len().max(1) as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (mip_level, level) in levels.iter().enumerate() {
            let (level_width, level_height) = level.dimensions();
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                },
                level.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * level_width),
                    rows_per_image: Some(level_height),
                },
                wgpu::Extent3d {
                    width: level_width,
                    height: level_height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }

    /// A single white texel, bound until a mesh receives its own texture.
    pub fn create_placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let white = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        Self::from_levels(device, queue, &[white], Some("placeholder texture"))
    }
}
