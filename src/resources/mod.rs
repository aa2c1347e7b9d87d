//! Loading of external assets and procedural geometry.
//!
//! Native builds read from the `assets` directory next to the working
//! directory, web builds fetch relative to the page origin.

pub mod mesh;

use anyhow::Context as _;
use image::ImageFormat;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no window available")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("no page origin: {:?}", e))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?
    };

    Ok(data)
}

/// Decodes `bytes` into 8 bit RGBA.
///
/// `format` is a file extension such as "png"; without it the format is
/// guessed from the data.
pub fn decode_image(bytes: &[u8], format: Option<&str>) -> anyhow::Result<image::RgbaImage> {
    let img = match format {
        None => image::load_from_memory(bytes)?,
        Some(ext) => {
            let format = ImageFormat::from_extension(ext)
                .with_context(|| format!("unknown image format {ext}"))?;
            image::load_from_memory_with_format(bytes, format)?
        }
    };
    Ok(img.to_rgba8())
}

/// Loads and decodes an image from the assets, using the file extension as
/// format hint.
pub async fn load_image(file_name: &str) -> anyhow::Result<image::RgbaImage> {
    let data = load_binary(file_name).await?;
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str());
    let img = decode_image(&data, extension).with_context(|| format!("decoding {file_name}"))?;
    log::debug!(
        "loaded {} ({}x{})",
        file_name,
        img.width(),
        img.height()
    );
    Ok(img)
}
