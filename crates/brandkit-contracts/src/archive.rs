use std::path::PathBuf;

use anyhow::Context;
use indexmap::IndexMap;

pub type ArchiveEntries = IndexMap<String, Vec<u8>>;

/// Download name for an asset: lower-cased title, every non-alphanumeric
/// character replaced by `-`, suffixed `-asset.png`.
pub fn asset_file_name(title: &str) -> String {
    let stem: String = title
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect();
    format!("{stem}-asset.png")
}

/// Packages a set of downloaded assets into something the user can take away.
pub trait ArchiveSink {
    fn package(&mut self, entries: &ArchiveEntries) -> anyhow::Result<PathBuf>;
}

/// Writes each entry as a loose file inside one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArchiveSink for DirectorySink {
    fn package(&mut self, entries: &ArchiveEntries) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        for (name, bytes) in entries {
            let path = self.dir.join(name);
            std::fs::write(&path, bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        Ok(self.dir.clone())
    }
}
