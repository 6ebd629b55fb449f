use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

use super::{Candidate, CandidatePart, GenerativeService, ServiceRequest, ServiceResponse};
use crate::media::EncodedPayload;

const DRYRUN_SIZE: u32 = 256;

/// Offline stand-in for the remote service: images are solid squares whose
/// color is derived from the prompt, text replies are canned.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunProvider;

impl GenerativeService for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &ServiceRequest<'_>) -> Result<ServiceResponse> {
        let mut parts = Vec::new();
        if request.wants_image() {
            parts.push(CandidatePart {
                inline_image: Some(EncodedPayload {
                    data: BASE64.encode(dryrun_png(request.prompt_text)?),
                    mime_type: "image/png".to_string(),
                }),
                text: None,
            });
        } else {
            parts.push(CandidatePart {
                inline_image: None,
                text: Some(
                    "A cheerful, outdoorsy brand ambassador in their late twenties.".to_string(),
                ),
            });
        }
        Ok(ServiceResponse {
            candidates: vec![Candidate { parts }],
        })
    }
}

fn dryrun_png(prompt: &str) -> Result<Vec<u8>> {
    let (r, g, b) = color_from_prompt(prompt);
    let image = RgbaImage::from_pixel(DRYRUN_SIZE, DRYRUN_SIZE, Rgba([r, g, b, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut out, ImageFormat::Png)
        .context("dryrun PNG encode failed")?;
    Ok(out.into_inner())
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Modality;

    fn source() -> EncodedPayload {
        EncodedPayload {
            data: "QUJD".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn image_requests_return_a_decodable_png() -> anyhow::Result<()> {
        let image = source();
        let response = DryrunProvider.generate(&ServiceRequest {
            image: &image,
            prompt_text: "Website Banner",
            response_modalities: &[Modality::Image, Modality::Text],
        })?;
        let payload = response.first_image().expect("dryrun image");
        let decoded = image::load_from_memory(&BASE64.decode(&payload.data)?)?;
        assert_eq!((decoded.width(), decoded.height()), (DRYRUN_SIZE, DRYRUN_SIZE));
        Ok(())
    }

    #[test]
    fn text_requests_return_a_persona() -> anyhow::Result<()> {
        let image = source();
        let response = DryrunProvider.generate(&ServiceRequest {
            image: &image,
            prompt_text: "describe a persona",
            response_modalities: &[Modality::Text],
        })?;
        assert!(response.first_image().is_none());
        assert!(!response.text().is_empty());
        Ok(())
    }

    #[test]
    fn colors_are_stable_per_prompt() {
        assert_eq!(color_from_prompt("a"), color_from_prompt("a"));
        assert_ne!(color_from_prompt("a"), color_from_prompt("b"));
    }
}
