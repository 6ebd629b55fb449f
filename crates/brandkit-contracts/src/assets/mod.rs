mod store;

use serde::{Deserialize, Serialize};

pub use store::ResultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Pending,
    Success,
    Error,
}

impl AssetStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Per-job state surfaced to the presentation layer.
///
/// `url` is only set for `Success`, `error_message` only for `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResult {
    pub title: String,
    pub url: Option<String>,
    pub status: AssetStatus,
    pub error_message: Option<String>,
}

impl AssetResult {
    pub fn pending(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            status: AssetStatus::Pending,
            error_message: None,
        }
    }

    pub fn succeeded(&self, url: impl Into<String>) -> Self {
        Self {
            title: self.title.clone(),
            url: Some(url.into()),
            status: AssetStatus::Success,
            error_message: None,
        }
    }

    pub fn failed(&self, message: impl Into<String>) -> Self {
        Self {
            title: self.title.clone(),
            url: None,
            status: AssetStatus::Error,
            error_message: Some(message.into()),
        }
    }
}
