// src/store/file.rs
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::SeenBackend;
use crate::error::PersistenceError;

/// Seen keys as a JSON array of strings, the same layout as the legacy
/// `seen_urls.json`. Writes go to a sibling `*.tmp` file which is then
/// renamed over the target, so readers never observe a partial file.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "seen_urls.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

async fn write_then_rename(tmp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = fs::File::create(tmp).await?;
    f.write_all(bytes).await?;
    f.sync_all().await?;
    drop(f);
    fs::rename(tmp, target).await
}

#[async_trait::async_trait]
impl SeenBackend for JsonFileBackend {
    async fn load_keys(&self) -> Result<Option<HashSet<String>>, PersistenceError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        if content.trim().is_empty() {
            return Ok(Some(HashSet::new()));
        }
        let keys: Vec<String> = serde_json::from_str(&content).map_err(|e| {
            PersistenceError::Corrupt(format!("{}: {e}", self.path.display()))
        })?;
        Ok(Some(keys.into_iter().collect()))
    }

    async fn store_keys(&self, keys: &HashSet<String>) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(|e| self.io_err(e))?;
        }

        // Sorted output keeps the file diff-friendly and deterministic.
        let sorted: BTreeSet<&String> = keys.iter().collect();
        let json = serde_json::to_vec_pretty(&sorted)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

        let tmp = self.tmp_path();
        if let Err(e) = write_then_rename(&tmp, &self.path, &json).await {
            // Best effort; the next commit recreates it anyway.
            let _ = fs::remove_file(&tmp).await;
            return Err(self.io_err(e));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
