//! JSON snapshot staging
//!
//! One pretty-printed document per run under the staging directory:
//! `scraped_<label>_<YYYYmmdd_HHMMSS_micros>.json`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::domain::product::Product;
use crate::domain::repositories::{SnapshotHandle, StagingStore};

const FILE_PREFIX: &str = "scraped";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub timestamp: DateTime<Local>,
    pub label: String,
    pub products: Vec<Product>,
}

pub struct JsonStagingStore {
    directory: PathBuf,
}

impl JsonStagingStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Snapshot files currently staged, oldest first
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotHandle>> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read staging directory"),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_snapshot = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(FILE_PREFIX));
            if is_snapshot {
                paths.push(path);
            }
        }
        // names embed the timestamp
        paths.sort();
        Ok(paths.into_iter().map(|path| SnapshotHandle { path }).collect())
    }
}

/// Lower-case ASCII slug usable in a file name (`Motos y quads` → `motos-y-quads`)
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() { "unnamed".to_string() } else { slug }
}

#[async_trait]
impl StagingStore for JsonStagingStore {
    async fn write_snapshot(&self, label: &str, products: &[Product]) -> Result<SnapshotHandle> {
        fs::create_dir_all(&self.directory)
            .await
            .with_context(|| format!("Failed to create staging directory {}", self.directory.display()))?;

        let timestamp = Local::now();
        let document = SnapshotDocument {
            timestamp,
            label: label.to_string(),
            products: products.to_vec(),
        };
        let content = serde_json::to_vec_pretty(&document).context("Failed to serialize snapshot")?;

        let stem = format!("{FILE_PREFIX}_{}_{}", slugify(label), timestamp.format("%Y%m%d_%H%M%S_%6f"));
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.directory.join(name);

            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(&content)
                        .await
                        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
                    file.sync_all().await?;
                    info!("💾 Staged {} products to {}", products.len(), path.display());
                    return Ok(SnapshotHandle { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create snapshot {}", path.display()));
                }
            }
        }
    }

    async fn read_snapshot(&self, handle: &SnapshotHandle) -> Result<Vec<Product>> {
        let content = fs::read(&handle.path)
            .await
            .with_context(|| format!("Snapshot not readable: {}", handle.path.display()))?;
        let document: SnapshotDocument = serde_json::from_slice(&content)
            .with_context(|| format!("Snapshot is not valid JSON: {}", handle.path.display()))?;
        debug!(
            "Read snapshot '{}' from {} with {} products",
            document.label,
            document.timestamp,
            document.products.len()
        );
        Ok(document.products)
    }

    async fn delete_snapshot(&self, handle: &SnapshotHandle) -> Result<()> {
        fs::remove_file(&handle.path)
            .await
            .with_context(|| format!("Failed to delete snapshot {}", handle.path.display()))?;
        debug!("🗑️ Deleted snapshot {}", handle.path.display());
        Ok(())
    }
}
