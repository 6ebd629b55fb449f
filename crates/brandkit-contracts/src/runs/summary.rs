use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assets::AssetResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub total_jobs: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub pending: u64,
    pub cancelled: bool,
    pub avatar_description: Option<String>,
}

/// Writes the summary as pretty JSON together with the per-asset outcome
/// (title, status, error message). Image payloads are left out.
pub fn write_summary(
    path: &Path,
    summary: &RunSummary,
    assets: &[AssetResult],
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert(
        "assets".to_string(),
        Value::Array(
            assets
                .iter()
                .map(|asset| {
                    serde_json::json!({
                        "title": asset.title,
                        "status": asset.status,
                        "error_message": asset.error_message,
                    })
                })
                .collect(),
        ),
    );
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
