//! Durable storage of server settings.
//!
//! The controller only ever writes through [`ConfigPersistence::save`];
//! reading settings back is a bootstrap concern ([`JsonFileStore::load_all`]).

use crate::config::ServerProperties;
use crate::error::{Error, Result};
use crate::server::ServerId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Destination for changed server settings.
#[async_trait]
pub trait ConfigPersistence: Send + Sync {
    /// Durably store `properties` for the server `id`.
    ///
    /// Fails with `Error::PersistFailed` on I/O errors.
    async fn save(&self, id: ServerId, properties: &ServerProperties) -> Result<()>;
}

/// Stores each server's settings as `<dir>/<server_id>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: ServerId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Read every stored settings file.
    ///
    /// A missing directory yields an empty list. Files that do not parse are
    /// reported as `ConfigParse` errors.
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn load_all(&self) -> Result<Vec<ServerProperties>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::ConfigParse(format!("Failed to read settings: {}", e))),
        };

        let mut servers = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::ConfigParse(format!("Failed to read settings: {}", e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?;
            let props: ServerProperties = serde_json::from_str(&content)
                .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?;
            servers.push(props);
        }

        tracing::debug!(count = servers.len(), "Loaded stored settings");
        Ok(servers)
    }
}

#[async_trait]
impl ConfigPersistence for JsonFileStore {
    #[tracing::instrument(skip(self, properties), fields(server_id = %id))]
    async fn save(&self, id: ServerId, properties: &ServerProperties) -> Result<()> {
        let fail = |e: std::io::Error| Error::PersistFailed(format!("{}: {}", id, e));

        let json = serde_json::to_vec_pretty(properties)
            .map_err(|e| Error::PersistFailed(format!("serialization failed: {}", e)))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(fail)?;

        // Atomic write: write to .tmp then rename
        let path = self.path_for(id);
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(fail)?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(fail)?;

        tracing::debug!(path = %path.display(), "Settings saved");
        Ok(())
    }
}
