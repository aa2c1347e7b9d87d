//! Runtime configuration of the GPU context.

use instant::Duration;

/// Settings consumed by [`GpuContext`](crate::context::gpu::GpuContext).
///
/// `width`/`height` size the offscreen colour target and the depth buffer.
/// When rendering into a caller supplied view, the view must have the same
/// size and `color_format`.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub width: u32,
    pub height: u32,
    pub clear_colour: wgpu::Color,
    pub color_format: wgpu::TextureFormat,
    pub backends: wgpu::Backends,
    /// How long to wait for the GPU when reading a frame back.
    pub readback_timeout: Duration,
    /// Upper bound of draws recorded between two rendered frames.
    pub max_pending_draws: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            clear_colour: wgpu::Color::BLACK,
            color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            readback_timeout: Duration::from_secs(3),
            max_pending_draws: 65_536,
        }
    }
}

impl ContextConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_clear_colour(mut self, clear_colour: wgpu::Color) -> Self {
        self.clear_colour = clear_colour;
        self
    }

    pub fn with_max_pending_draws(mut self, max_pending_draws: usize) -> Self {
        self.max_pending_draws = max_pending_draws;
        self
    }

    /// Width over height, as used by the projection.
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}
