use anyhow::{Context, Result};
use brandkit_contracts::archive::{asset_file_name, ArchiveEntries};
use brandkit_contracts::assets::{AssetResult, AssetStatus};

use crate::media::decode_data_url;

/// Decodes every successful asset into archive entries, in result order.
pub fn collect_archive_entries(results: &[AssetResult]) -> Result<ArchiveEntries> {
    let mut entries = ArchiveEntries::new();
    for result in results {
        if result.status != AssetStatus::Success {
            continue;
        }
        let Some(url) = result.url.as_deref() else {
            continue;
        };
        let (_, bytes) = decode_data_url(url)
            .with_context(|| format!("failed to decode asset '{}'", result.title))?;
        entries.insert(asset_file_name(&result.title), bytes);
    }
    Ok(entries)
}
