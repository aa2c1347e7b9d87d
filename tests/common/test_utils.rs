use std::{cell::RefCell, rc::Rc};

use cgmath::Matrix4;
use flow_scene::{
    context::RenderContext,
    data_structures::{scene_graph::Drawable, transform::NodeMatrices},
    error::RenderResult,
};

const EPSILON: f32 = 1e-5;

pub(crate) fn assert_matrix_eq(actual: Matrix4<f32>, expected: Matrix4<f32>) {
    let a: [[f32; 4]; 4] = actual.into();
    let e: [[f32; 4]; 4] = expected.into();
    for column in 0..4 {
        for row in 0..4 {
            assert!(
                (a[column][row] - e[column][row]).abs() <= EPSILON,
                "matrices differ at column {} row {}:\n{:?}\n{:?}",
                column,
                row,
                actual,
                expected
            );
        }
    }
}

pub(crate) fn matrix_approx_eq(a: Matrix4<f32>, b: Matrix4<f32>) -> bool {
    let a: [[f32; 4]; 4] = a.into();
    let b: [[f32; 4]; 4] = b.into();
    a.iter()
        .flatten()
        .zip(b.iter().flatten())
        .all(|(x, y)| (x - y).abs() <= EPSILON)
}

/// One entry per `draw` of a [`Marker`]: its name and the matrices it got.
pub(crate) type DrawLog = Rc<RefCell<Vec<(String, NodeMatrices)>>>;

/// A drawable that only writes down that it was drawn.
pub(crate) struct Marker {
    name: String,
    log: DrawLog,
}

impl Marker {
    pub fn new(name: impl Into<String>, log: &DrawLog) -> Self {
        Self {
            name: name.into(),
            log: Rc::clone(log),
        }
    }
}

impl Drawable for Marker {
    fn draw(&self, _: &mut dyn RenderContext, matrices: &NodeMatrices) -> RenderResult<()> {
        self.log.borrow_mut().push((self.name.clone(), *matrices));
        Ok(())
    }
}

pub(crate) fn new_log() -> DrawLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub(crate) fn drawn_names(log: &DrawLog) -> Vec<String> {
    log.borrow().iter().map(|(name, _)| name.clone()).collect()
}

pub(crate) fn solid_image(width: u32, height: u32, colour: [u8; 4]) -> image::RgbaImage {
    image::RgbaImage::from_pixel(width, height, image::Rgba(colour))
}

/// Per-channel distance allowed between an expected colour and a read back
/// pixel, as sRGB encoding may round differently between drivers.
#[cfg(feature = "integration-tests")]
pub(crate) const CHANNEL_TOLERANCE: u8 = 1;

#[cfg(feature = "integration-tests")]
pub(crate) fn assert_all_pixels(actual: &image::RgbaImage, expected: image::Rgba<u8>) {
    for (x, y, pixel) in actual.enumerate_pixels() {
        let close = pixel
            .0
            .iter()
            .zip(expected.0.iter())
            .all(|(a, e)| a.abs_diff(*e) <= CHANNEL_TOLERANCE);
        assert!(
            close,
            "pixel mismatch at ({}, {}): {:?} != {:?}",
            x, y, pixel, expected
        );
    }
}

#[cfg(feature = "integration-tests")]
pub(crate) fn colour_to_rgba(colour: wgpu::Color) -> image::Rgba<u8> {
    let f_to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    image::Rgba([
        f_to_u8(colour.r),
        f_to_u8(colour.g),
        f_to_u8(colour.b),
        f_to_u8(colour.a),
    ])
}

/// Renders one offscreen frame on a headless GPU context.
///
/// `$setup` fills the context with draws and `$validate` inspects the read
/// back image; both return `anyhow::Result<()>`.
#[cfg(feature = "integration-tests")]
#[macro_export]
macro_rules! golden_image_test {
    ($config:expr, $setup:expr, $validate:expr) => {{
        use flow_scene::context::gpu::GpuContext;
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        let result: anyhow::Result<()> = runtime.block_on(async move {
            flow_scene::logging::init_logging(Default::default());
            let mut ctx = GpuContext::new_headless($config).await?;
            ($setup)(&mut ctx)?;
            let frame = ctx.render_offscreen().await?;
            ($validate)(&frame)
        });
        result.expect("golden image test failed");
    }};
}

/// Decodes an 8 bit sRGB channel to linear intensity.
#[cfg(feature = "integration-tests")]
pub(crate) fn srgb_to_linear(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(feature = "integration-tests")]
pub(crate) fn linear_to_srgb(value: f32) -> u8 {
    let c = value.clamp(0.0, 1.0);
    let encoded = if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}

/// Colour a lit texel should show on an sRGB target, with the lighting
/// factor applied in linear space and alpha kept as is.
#[cfg(feature = "integration-tests")]
pub(crate) fn lit_texel(texel: [u8; 4], lighting: f32) -> image::Rgba<u8> {
    let [r, g, b, a] = texel;
    image::Rgba([
        linear_to_srgb(srgb_to_linear(r) * lighting),
        linear_to_srgb(srgb_to_linear(g) * lighting),
        linear_to_srgb(srgb_to_linear(b) * lighting),
        a,
    ])
}

#[cfg(feature = "integration-tests")]
pub(crate) fn assert_pixel_near(
    actual: &image::RgbaImage,
    (x, y): (u32, u32),
    expected: image::Rgba<u8>,
    tolerance: u8,
) {
    let pixel = actual.get_pixel(x, y);
    let close = pixel
        .0
        .iter()
        .zip(expected.0.iter())
        .all(|(a, e)| a.abs_diff(*e) <= tolerance);
    assert!(
        close,
        "pixel mismatch at ({}, {}): {:?} != {:?}",
        x, y, pixel, expected
    );
}
