use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::media::MAX_IMAGE_BYTES;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Gemini,
    Dryrun,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "dryrun" | "dry-run" => Ok(Self::Dryrun),
            other => bail!("unknown provider '{other}' (expected gemini or dryrun)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub api_base: String,
    pub image_model: String,
    pub text_model: String,
    /// `None` waits on the remote service indefinitely.
    pub request_timeout: Option<Duration>,
    pub encode_budget: Option<Duration>,
    pub avatar_step: bool,
    pub max_image_bytes: u64,
    /// Where per-run `summary.json` files land; unset skips them.
    pub out_dir: Option<PathBuf>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            request_timeout: None,
            encode_budget: None,
            avatar_step: true,
            max_image_bytes: MAX_IMAGE_BYTES,
            out_dir: None,
        }
    }
}

impl StudioConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(non_empty_env)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(provider) = lookup("BRANDKIT_PROVIDER") {
            config.provider = provider.parse()?;
        }
        config.api_key = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY"));
        if let Some(base) = lookup("GEMINI_API_BASE") {
            config.api_base = base;
        }
        if let Some(model) = lookup("BRANDKIT_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(model) = lookup("BRANDKIT_TEXT_MODEL") {
            config.text_model = model;
        }
        config.request_timeout = seconds_var(&lookup, "BRANDKIT_REQUEST_TIMEOUT_S")?;
        config.encode_budget = seconds_var(&lookup, "BRANDKIT_ENCODE_BUDGET_S")?;
        if let Some(flag) = lookup("BRANDKIT_AVATAR_STEP") {
            config.avatar_step = !matches!(
                flag.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        Ok(config)
    }
}

fn seconds_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let seconds: f64 = raw
        .parse()
        .with_context(|| format!("{key} must be a number of seconds, got '{raw}'"))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Ok(None);
    }
    let duration = Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("{key} is out of range, got '{raw}'"))?;
    Ok(Some(duration))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
