mod dryrun;
mod gemini;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderKind, StudioConfig};
use crate::media::EncodedPayload;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Image,
    Text,
}

impl Modality {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceRequest<'a> {
    pub image: &'a EncodedPayload,
    pub prompt_text: &'a str,
    pub response_modalities: &'a [Modality],
}

impl ServiceRequest<'_> {
    pub fn wants_image(&self) -> bool {
        self.response_modalities.contains(&Modality::Image)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePart {
    pub inline_image: Option<EncodedPayload>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceResponse {
    pub candidates: Vec<Candidate>,
}

impl ServiceResponse {
    pub fn parts(&self) -> impl Iterator<Item = &CandidatePart> {
        self.candidates
            .iter()
            .flat_map(|candidate| candidate.parts.iter())
    }

    /// First inline image with a non-empty payload, in candidate order.
    pub fn first_image(&self) -> Option<&EncodedPayload> {
        self.parts()
            .filter_map(|part| part.inline_image.as_ref())
            .find(|image| !image.data.is_empty())
    }

    pub fn text(&self) -> String {
        self.parts()
            .filter_map(|part| part.text.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<&str>>()
            .join("\n")
    }
}

/// The remote generative service. Failures carry a human-readable message
/// and nothing more.
pub trait GenerativeService: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &ServiceRequest<'_>) -> Result<ServiceResponse>;
}

pub fn build_service(config: &StudioConfig) -> Result<Arc<dyn GenerativeService>> {
    Ok(match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
        ProviderKind::Dryrun => Arc::new(DryrunProvider),
    })
}
