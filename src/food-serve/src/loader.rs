use std::io::Cursor;
use std::path::PathBuf;

use image::io::Reader as ImageReader;
use image::DynamicImage;
use log::debug;

use crate::{Error, Result, Timer};

/// Where an image comes from.
#[derive(Debug, Clone)]
pub enum ImageReference {
    /// A file on the local filesystem
    Path(PathBuf),

    /// An `http://` or `https://` location
    Url(String),

    /// Pixels that are already in memory
    Pixels(DynamicImage),
}

impl ImageReference {
    /// Interpret a user-supplied string.
    ///
    /// An empty string means "no image" and yields `None`. Strings longer than
    /// the bare scheme that start with `http://` or `https://` are URLs;
    /// anything else is a filesystem path.
    pub fn parse(reference: &str) -> Option<Self> {
        if reference.is_empty() {
            return None;
        }

        if reference.len() > 7
            && (reference.starts_with("http://") || reference.starts_with("https://"))
        {
            Some(ImageReference::Url(reference.to_owned()))
        } else {
            Some(ImageReference::Path(PathBuf::from(reference)))
        }
    }

    /// Resolve the reference into an RGB bitmap.
    pub async fn load(&self, client: &reqwest::Client) -> Result<DynamicImage> {
        match self {
            ImageReference::Pixels(image) => Ok(DynamicImage::ImageRgb8(image.to_rgb8())),
            ImageReference::Url(url) => {
                let bytes = fetch(client, url).await?;
                decode_bytes(&bytes)
            }
            ImageReference::Path(path) => {
                debug!("reading image from {}", path.display());
                let bytes = std::fs::read(path)?;
                decode_bytes(&bytes)
            }
        }
    }
}

impl From<DynamicImage> for ImageReference {
    fn from(image: DynamicImage) -> Self {
        ImageReference::Pixels(image)
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let mut t = Timer::new_start(&format!("Fetching image from {}", url));

    let resp = client
        .get(url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| Error::Connectivity(format!("could not fetch {}: {}", url, e)))?;

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Error::Connectivity(format!("could not read image from {}: {}", url, e)))?;

    t.stop();

    Ok(bytes.to_vec())
}

/// Decode an encoded raster image (JPEG, PNG, ...) held in memory. The format
/// is sniffed from the content, and the result is always 8-bit RGB.
pub fn decode_bytes(data: &[u8]) -> Result<DynamicImage> {
    let mut t = Timer::new_start("Load image from memory");

    let image = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;

    t.stop();

    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}
