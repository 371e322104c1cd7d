//! Still-image content source.
//!
//! Loads an image from a local path or an `http(s)://` URL and reads its
//! intrinsic size from the header. Pixels are never decoded here.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::geometry::ContentSize;

/// Largest image accepted from a remote URL.
#[cfg(feature = "http")]
const MAX_REMOTE_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

/// Where an image comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRequest {
    LocalFile(PathBuf),
    RemoteUrl(String),
}

impl ImageRequest {
    /// Classify a user-supplied location. Unknown URL schemes are rejected.
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(anyhow!("image location is empty"));
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            let parsed = url::Url::parse(location)
                .with_context(|| format!("invalid image url {location}"))?;
            return Ok(ImageRequest::RemoteUrl(parsed.to_string()));
        }
        if location.contains("://") {
            return Err(anyhow!(
                "unsupported image location {location}; use a local path or http(s) url"
            ));
        }
        Ok(ImageRequest::LocalFile(PathBuf::from(location)))
    }

    pub fn describe(&self) -> String {
        match self {
            ImageRequest::LocalFile(path) => path.display().to_string(),
            ImageRequest::RemoteUrl(url) => url.clone(),
        }
    }
}

/// Image content loader.
pub struct ContentSource {
    backend: ContentBackend,
}

enum ContentBackend {
    File(PathBuf),
    #[cfg(feature = "http")]
    Http { agent: ureq::Agent, url: String },
}

impl ContentSource {
    pub fn new(request: &ImageRequest, timeout: Duration) -> Result<Self> {
        let backend = match request {
            ImageRequest::LocalFile(path) => ContentBackend::File(path.clone()),
            #[cfg(feature = "http")]
            ImageRequest::RemoteUrl(url) => ContentBackend::Http {
                agent: ureq::AgentBuilder::new().timeout(timeout).build(),
                url: url.clone(),
            },
            #[cfg(not(feature = "http"))]
            ImageRequest::RemoteUrl(url) => {
                let _ = timeout;
                return Err(anyhow!("loading {url} requires the http feature"));
            }
        };
        Ok(Self { backend })
    }

    /// Read the encoded image bytes.
    pub fn fetch(&self) -> Result<Vec<u8>> {
        match &self.backend {
            ContentBackend::File(path) => read_file(path),
            #[cfg(feature = "http")]
            ContentBackend::Http { agent, url } => fetch_remote(agent, url),
        }
    }

    /// Fetch the image and return its intrinsic size.
    pub fn load_size(&self) -> Result<ContentSize> {
        let bytes = self.fetch()?;
        probe_size(&bytes)
    }
}

/// Read the pixel size from an encoded image header.
///
/// A zero-sized image is an error: nothing could be drawn from it.
pub fn probe_size(bytes: &[u8]) -> Result<ContentSize> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("read image header")?
        .into_dimensions()
        .context("decode image dimensions")?;
    let size = ContentSize::new(width, height);
    if size.is_empty() {
        return Err(anyhow!("image has zero size ({width}x{height})"));
    }
    Ok(size)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read image {}", path.display()))
}

#[cfg(feature = "http")]
fn fetch_remote(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    use std::io::Read;

    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            return Err(anyhow!(
                "fetch {} returned HTTP {} {}",
                url,
                code,
                response.status_text()
            ));
        }
        Err(err) => return Err(anyhow::Error::new(err).context(format!("fetch {url}"))),
    };
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_REMOTE_IMAGE_BYTES + 1)
        .read_to_end(&mut bytes)
        .with_context(|| format!("read body of {url}"))?;
    if bytes.len() as u64 > MAX_REMOTE_IMAGE_BYTES {
        return Err(anyhow!(
            "image at {} exceeds {} bytes",
            url,
            MAX_REMOTE_IMAGE_BYTES
        ));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn probes_header_size() {
        assert_eq!(probe_size(&png_bytes(64, 48)).unwrap(), ContentSize::new(64, 48));
    }

    #[test]
    fn garbage_is_a_load_failure() {
        assert!(probe_size(b"definitely not an image").is_err());
        assert!(probe_size(&[]).is_err());
    }

    #[test]
    fn classifies_locations() {
        assert_eq!(
            ImageRequest::parse("/tmp/cat.jpg").unwrap(),
            ImageRequest::LocalFile(PathBuf::from("/tmp/cat.jpg"))
        );
        assert_eq!(
            ImageRequest::parse(" https://example.com/cat.jpg ").unwrap(),
            ImageRequest::RemoteUrl("https://example.com/cat.jpg".into())
        );
        assert!(ImageRequest::parse("ftp://example.com/cat.jpg").is_err());
        assert!(ImageRequest::parse("  ").is_err());
    }

    #[test]
    fn missing_file_fails_with_path_in_message() {
        let source = ContentSource::new(
            &ImageRequest::LocalFile(PathBuf::from("/nonexistent/cat.png")),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = source.load_size().unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/cat.png"));
    }
}
