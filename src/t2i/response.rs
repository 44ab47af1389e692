use crate::exceptions::ParleyError;
use std::path::{Path, PathBuf};

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_STEM: &str = "generated_image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
    Webp,
    Url,
    Unknown,
}

impl ImageType {
    /// File extension for saved images; unknown data is saved as `jpg`.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Webp => "webp",
            ImageType::Url | ImageType::Unknown => "jpg",
        }
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Webp => "webp",
            ImageType::Url => "url",
            ImageType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Sniffs the image format from its magic bytes.
pub fn detect_image_type(data: &[u8]) -> ImageType {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ImageType::Jpeg
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        ImageType::Png
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        ImageType::Gif
    } else if data.starts_with(b"RIFF") && data.len() >= 12 && &data[8..12] == b"WEBP" {
        ImageType::Webp
    } else {
        ImageType::Unknown
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    Bytes(Vec<u8>),
    Url(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageResponse {
    pub image: ImageData,
    pub image_type: ImageType,
    pub revised_prompt: Option<String>,
}

impl ImageResponse {
    pub fn from_bytes(bytes: Vec<u8>, revised_prompt: Option<String>) -> Self {
        Self {
            image_type: detect_image_type(&bytes),
            image: ImageData::Bytes(bytes),
            revised_prompt,
        }
    }

    pub fn from_url(url: impl Into<String>, revised_prompt: Option<String>) -> Self {
        Self {
            image: ImageData::Url(url.into()),
            image_type: ImageType::Url,
            revised_prompt,
        }
    }

    /// Writes the image, downloading it first when it is a URL. Returns the
    /// path actually written.
    pub async fn save(&self, path: Option<&Path>) -> Result<PathBuf, ParleyError> {
        let (data, image_type) = match &self.image {
            ImageData::Bytes(bytes) => (bytes.clone(), self.image_type),
            ImageData::Url(url) => {
                let bytes = download(url).await?;
                let detected = detect_image_type(&bytes);
                (bytes, detected)
            }
        };

        let target = target_path(path, image_type);
        crate::fs::atomic_write_bytes(&target, &data)?;
        tracing::info!("Image saved to {}", target.display());
        Ok(target)
    }
}

/// `generated_image.<ext>` by default; a path without a known image
/// extension gets one appended.
pub fn target_path(path: Option<&Path>, image_type: ImageType) -> PathBuf {
    let ext = image_type.extension();
    match path {
        None => PathBuf::from(format!("{}.{}", DEFAULT_STEM, ext)),
        Some(p) => {
            let has_known_ext = p
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| KNOWN_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if has_known_ext {
                p.to_path_buf()
            } else {
                let mut name = p.as_os_str().to_os_string();
                if !name.to_string_lossy().ends_with('.') {
                    name.push(".");
                }
                name.push(ext);
                PathBuf::from(name)
            }
        }
    }
}

async fn download(url: &str) -> Result<Vec<u8>, ParleyError> {
    let client = crate::utils::setup_http_client();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ParleyError::Provider(format!("Image download failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(ParleyError::Provider(format!(
            "Image download failed (Status: {}) for {}",
            response.status(),
            url
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ParleyError::Provider(format!("Image download failed: {}", e)))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_image_type_magic_bytes() {
        assert_eq!(detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), ImageType::Jpeg);
        assert_eq!(detect_image_type(b"\x89PNG\r\n\x1a\nrest"), ImageType::Png);
        assert_eq!(detect_image_type(b"GIF89a..."), ImageType::Gif);
        assert_eq!(detect_image_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), ImageType::Webp);
        assert_eq!(detect_image_type(b"RIFF\x00\x00\x00\x00WAVE"), ImageType::Unknown);
        assert_eq!(detect_image_type(b""), ImageType::Unknown);
    }

    #[test]
    fn test_target_path_defaults_and_extensions() {
        assert_eq!(target_path(None, ImageType::Png), PathBuf::from("generated_image.png"));
        assert_eq!(target_path(None, ImageType::Unknown), PathBuf::from("generated_image.jpg"));
        assert_eq!(
            target_path(Some(Path::new("out/cat")), ImageType::Gif),
            PathBuf::from("out/cat.gif")
        );
        assert_eq!(
            target_path(Some(Path::new("cat.PNG")), ImageType::Jpeg),
            PathBuf::from("cat.PNG")
        );
        assert_eq!(
            target_path(Some(Path::new("cat.")), ImageType::Webp),
            PathBuf::from("cat.webp")
        );
    }

    #[tokio::test]
    async fn test_save_bytes_to_given_path() {
        let temp = tempfile::tempdir().unwrap();
        let png = b"\x89PNG\r\n\x1a\nfake".to_vec();
        let resp = ImageResponse::from_bytes(png.clone(), None);
        assert_eq!(resp.image_type, ImageType::Png);

        let written = resp.save(Some(&temp.path().join("pic"))).await.unwrap();
        assert_eq!(written, temp.path().join("pic.png"));
        assert_eq!(std::fs::read(written).unwrap(), png);
    }
}
