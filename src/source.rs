//! Image sources: picking, validating, encoding and previewing.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use log::debug;

use crate::client::Transport;
use crate::error::{Result, VisionError};

/// Endpoint for images sent inline as data URLs.
pub const VISION_ENDPOINT: &str = "vision";
/// Endpoint for images the server fetches itself.
pub const EXTERNAL_VISION_ENDPOINT: &str = "externalVision";

#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    /// A file picked by the user.
    File(PathBuf),
    /// A typed URL, sent verbatim for the server to fetch.
    Url(String),
    /// The bundled default image.
    Default(PathBuf),
}

impl ImageSource {
    /// Builds a URL source after checking it names a png or jpg image.
    pub fn url(input: &str) -> Result<Self> {
        validate_url(input)?;
        Ok(Self::Url(input.to_owned()))
    }

    /// Builds a file source; `None` means nothing was selected.
    pub fn file(selection: Option<PathBuf>) -> Result<Self> {
        selection
            .map(Self::File)
            .ok_or_else(|| VisionError::invalid_input("No Selected File"))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(p) | Self::Default(p) => p.display().to_string(),
            Self::Url(u) => u.clone(),
        }
    }
}

/// Accepts `<anything>.png` or `<anything>.jpg` with a non-empty stem.
pub fn validate_url(url: &str) -> Result<()> {
    let ok = [".png", ".jpg"].iter().any(|ext| {
        url.strip_suffix(ext)
            .is_some_and(|stem| !stem.is_empty() && !stem.contains('\n'))
    });
    if ok {
        Ok(())
    } else {
        Err(VisionError::invalid_input(format!("Invalid URL {url}")))
    }
}

/// What ends up in the payload's `image` field. Files stay unread until [`WireImage::encode`].
#[derive(Clone, Debug, PartialEq)]
pub enum WireImage {
    /// Read and sent inline as a data URL.
    File(PathBuf),
    /// Sent verbatim.
    Url(String),
}

impl WireImage {
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::File(path) => encode_file_as_data_url(path),
            Self::Url(url) => Ok(url.clone()),
        }
    }
}

/// A validated source and the endpoint it is posted to.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedImage {
    pub endpoint: &'static str,
    pub image: WireImage,
}

/// Validates the source without touching the filesystem.
pub fn resolve(source: &ImageSource) -> Result<ResolvedImage> {
    match source {
        ImageSource::File(path) | ImageSource::Default(path) => Ok(ResolvedImage {
            endpoint: VISION_ENDPOINT,
            image: WireImage::File(path.clone()),
        }),
        ImageSource::Url(url) => {
            validate_url(url)?;
            Ok(ResolvedImage {
                endpoint: EXTERNAL_VISION_ENDPOINT,
                image: WireImage::Url(url.clone()),
            })
        }
    }
}

pub fn encode_file_as_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    debug!("Encoding {} ({} bytes)", path.display(), bytes.len());
    Ok(encode_bytes_as_data_url(&bytes))
}

pub fn encode_bytes_as_data_url(bytes: &[u8]) -> String {
    let mime = image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
}

/// Decodes the image for display. Remote URLs are fetched through the transport.
pub fn load_preview(source: &ImageSource, transport: &dyn Transport) -> Result<DynamicImage> {
    match source {
        ImageSource::File(path) | ImageSource::Default(path) => Ok(image::open(path)?),
        ImageSource::Url(url) => {
            let local = Path::new(url);
            if !url.contains("://") && local.exists() {
                return Ok(image::open(local)?);
            }
            let bytes = transport.get_bytes(url)?;
            Ok(image::load_from_memory(&bytes)?)
        }
    }
}
