use anyhow::bail;
use indexmap::IndexMap;

use super::{AssetResult, AssetStatus};

/// Ordered asset results for the current run, keyed by job title.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    entries: IndexMap<String, AssetResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole result set. Titles must be unique.
    pub fn replace_all(&mut self, results: Vec<AssetResult>) -> anyhow::Result<()> {
        let mut entries = IndexMap::with_capacity(results.len());
        for result in results {
            if entries.contains_key(&result.title) {
                bail!("duplicate asset title '{}' in run", result.title);
            }
            entries.insert(result.title.clone(), result);
        }
        self.entries = entries;
        Ok(())
    }

    /// Applies `apply` to the latest value stored under `title`.
    pub fn update<F>(&mut self, title: &str, apply: F) -> Option<&AssetResult>
    where
        F: FnOnce(&AssetResult) -> AssetResult,
    {
        let slot = self.entries.get_mut(title)?;
        let mut next = apply(slot);
        next.title = slot.title.clone();
        *slot = next;
        Some(&*slot)
    }

    /// Moves a pending entry to its final state. Settled entries never move
    /// again, so a second completion for the same title returns `None`.
    pub fn settle(&mut self, title: &str, outcome: Result<String, String>) -> Option<AssetResult> {
        if self.entries.get(title)?.status.is_settled() {
            return None;
        }
        self.update(title, |current| match outcome {
            Ok(url) => current.succeeded(url),
            Err(message) => current.failed(message),
        })
        .cloned()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, title: &str) -> Option<&AssetResult> {
        self.entries.get(title)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetResult> {
        self.entries.values()
    }

    pub fn snapshot(&self) -> Vec<AssetResult> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: AssetStatus) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status == status)
            .count()
    }

    pub fn download_ready(&self) -> bool {
        self.count(AssetStatus::Success) > 0
    }
}
