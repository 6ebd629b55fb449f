use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::error::{messages, StudioError};

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

pub const ACCEPTED_IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

/// Transport-safe image: base64 text plus its media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPayload {
    pub data: String,
    pub mime_type: String,
}

impl EncodedPayload {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Splits a `data:<mime>;base64,<payload>` URL and decodes the payload.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let Some(rest) = url.strip_prefix("data:") else {
        bail!("not a data URL");
    };
    let Some((header, payload)) = rest.split_once(',') else {
        bail!("data URL has no payload separator");
    };
    let Some(mime_type) = header.strip_suffix(";base64") else {
        bail!("data URL is not base64 encoded");
    };
    let bytes = BASE64
        .decode(payload.as_bytes())
        .context("data URL payload base64 decode failed")?;
    Ok((mime_type.to_string(), bytes))
}

#[derive(Debug, Clone)]
enum FileSource {
    Memory(Arc<[u8]>),
    Path { path: PathBuf, len: u64 },
}

/// A user-supplied image: name, declared media type, and a byte source that
/// is only read when needed.
#[derive(Debug, Clone)]
pub struct ImageFile {
    name: String,
    mime_type: String,
    source: FileSource,
}

impl ImageFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: FileSource::Memory(Arc::from(bytes)),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata =
            std::fs::metadata(path).with_context(|| format!("failed reading {}", path.display()))?;
        if !metadata.is_file() {
            bail!("{} is not a file", path.display());
        }
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self {
            name,
            mime_type: mime_for_path(path).unwrap_or("application/octet-stream").to_string(),
            source: FileSource::Path {
                path: path.to_path_buf(),
                len: metadata.len(),
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> u64 {
        match &self.source {
            FileSource::Memory(bytes) => bytes.len() as u64,
            FileSource::Path { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
            FileSource::Path { path, .. } => {
                std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))
            }
        }
    }

    pub fn open(&self) -> Result<Box<dyn Read + '_>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(Box::new(Cursor::new(&bytes[..]))),
            FileSource::Path { path, .. } => {
                let file = File::open(path)
                    .with_context(|| format!("failed opening {}", path.display()))?;
                Ok(Box::new(file))
            }
        }
    }
}

/// Decoded bitmap of the current image at its natural size.
#[derive(Debug, Clone)]
pub struct Preview {
    image: Arc<DynamicImage>,
}

impl Preview {
    pub fn from_file(file: &ImageFile) -> Result<Self> {
        let bytes = file.read_bytes()?;
        let image = image::load_from_memory(&bytes)
            .with_context(|| format!("failed to decode preview for {}", file.name()))?;
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Size and format gate shared by file selection and clipboard paste. Paste
/// reports its rejections as extraction failures.
pub fn validate_image_file(file: &ImageFile, max_bytes: u64) -> Result<(), StudioError> {
    if file.len() > max_bytes {
        return Err(StudioError::Validation(messages::IMAGE_TOO_LARGE.to_string()));
    }
    let mime = file.mime_type().trim().to_ascii_lowercase();
    if !ACCEPTED_IMAGE_MIME_TYPES.contains(&mime.as_str()) {
        return Err(StudioError::Validation(
            messages::UNSUPPORTED_FORMAT.to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([40, 120, 200, 255]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use base64::Engine as _;

    use super::test_support::png_bytes;
    use super::*;

    #[test]
    fn from_path_guesses_mime_and_length() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("bottle.PNG");
        std::fs::write(&path, png_bytes(4, 3))?;

        let file = ImageFile::from_path(&path)?;
        assert_eq!(file.name(), "bottle.PNG");
        assert_eq!(file.mime_type(), "image/png");
        assert_eq!(file.len(), std::fs::metadata(&path)?.len());

        let mut streamed = Vec::new();
        file.open()?.read_to_end(&mut streamed)?;
        assert_eq!(streamed, file.read_bytes()?);
        Ok(())
    }

    #[test]
    fn preview_keeps_natural_dimensions() -> anyhow::Result<()> {
        let file = ImageFile::from_bytes("p.png", "image/png", png_bytes(7, 5));
        let preview = Preview::from_file(&file)?;
        assert_eq!(preview.dimensions(), (7, 5));
        Ok(())
    }

    #[test]
    fn data_url_round_trip_keeps_mime() -> anyhow::Result<()> {
        let payload = EncodedPayload {
            data: BASE64.encode(b"hello"),
            mime_type: "image/webp".to_string(),
        };
        let (mime, bytes) = decode_data_url(&payload.to_data_url())?;
        assert_eq!(mime, "image/webp");
        assert_eq!(bytes, b"hello");
        assert!(decode_data_url("https://example.com/a.png").is_err());
        Ok(())
    }

    #[test]
    fn validation_enforces_size_then_format() {
        let big = ImageFile::from_bytes("big.png", "image/png", vec![0u8; 11]);
        assert_eq!(
            validate_image_file(&big, 10),
            Err(StudioError::Validation(messages::IMAGE_TOO_LARGE.to_string()))
        );

        let bmp = ImageFile::from_bytes("a.bmp", "image/bmp", vec![0u8; 4]);
        assert_eq!(
            validate_image_file(&bmp, MAX_IMAGE_BYTES),
            Err(StudioError::Validation(messages::UNSUPPORTED_FORMAT.to_string()))
        );

        for mime in ACCEPTED_IMAGE_MIME_TYPES {
            let ok = ImageFile::from_bytes("a", *mime, vec![0u8; 4]);
            assert_eq!(validate_image_file(&ok, MAX_IMAGE_BYTES), Ok(()));
        }
    }
}
