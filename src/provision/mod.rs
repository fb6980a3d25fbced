//! Artifact provisioning for Fleet Runner.
//!
//! The [`AssetProvisioner`] makes sure the artifact for a `(kind, version)`
//! pair is present in a fleet-wide cache and installs cached artifacts into
//! server root directories.
//!
//! # Examples
//!
//! ```no_run
//! use fleet_runner::config::ServerType;
//! use fleet_runner::provision::{AssetProvisioner, LocalMirrorCatalog};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> fleet_runner::Result<()> {
//! let catalog = Arc::new(LocalMirrorCatalog::new("/srv/mirror"));
//! let provisioner = AssetProvisioner::new(catalog, "/srv/jars");
//!
//! let cached = provisioner.ensure(ServerType::Minecraft, "1.20.1").await?;
//! provisioner
//!     .install(&cached, Path::new("/srv/servers/alpha"), "server.jar")
//!     .await?;
//! # Ok(())
//! # }
//! ```
mod catalog;
mod install;

pub use catalog::{ArtifactCatalog, CatalogEntry, LocalMirrorCatalog};
pub(crate) use install::is_regular_file;

use crate::config::ServerType;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type CacheKey = (ServerType, String);

/// Cache-first artifact provisioning shared by the whole fleet.
pub struct AssetProvisioner {
    catalog: Arc<dyn ArtifactCatalog>,
    cache_dir: PathBuf,
    /// One lock per cache key; holders download, waiters then hit the cache
    in_flight: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl AssetProvisioner {
    pub fn new(catalog: Arc<dyn ArtifactCatalog>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            cache_dir: cache_dir.into(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the underlying catalog can serve requests.
    pub fn is_ready(&self) -> bool {
        self.catalog.is_ready()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the cached artifact for `(kind, version)`.
    pub fn cache_path(&self, kind: ServerType, version: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}.jar", kind.artifact_prefix(), version))
    }

    fn key_lock(&self, kind: ServerType, version: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| Error::Other("Failed to lock in-flight downloads".to_string()))?;
        Ok(Arc::clone(
            in_flight
                .entry((kind, version.to_string()))
                .or_default(),
        ))
    }

    /// Make sure the artifact for `(kind, version)` is cached and return its path.
    ///
    /// Concurrent calls for the same key share one download: the first caller
    /// fetches while the others wait and then find the cached file.
    ///
    /// # Errors
    ///
    /// * `UnsupportedKind` if artifacts of `kind` cannot be provisioned
    /// * `InvalidVersion` if the catalog does not know `version`
    /// * `DownloadFailed` if fetching or verification fails; nothing is cached then
    #[tracing::instrument(skip(self))]
    pub async fn ensure(&self, kind: ServerType, version: &str) -> Result<PathBuf> {
        if !kind.supports_update() {
            tracing::warn!("Artifact kind cannot be provisioned");
            return Err(Error::UnsupportedKind(kind.to_string()));
        }

        // Versions become part of a file name
        if version.is_empty() || version.contains(['/', '\\']) || version.contains("..") {
            return Err(Error::InvalidVersion(version.to_string()));
        }

        let entry = self.catalog.resolve(kind, version).await?.ok_or_else(|| {
            tracing::warn!("Version not found in catalog");
            Error::InvalidVersion(version.to_string())
        })?;

        let key_lock = self.key_lock(kind, version)?;
        let result = {
            let _guard = key_lock.lock().await;
            self.fetch_into_cache(kind, version, &entry).await
        };
        self.release_key(kind, version, key_lock);
        result
    }

    /// Drop the lock for a key once nobody else holds or awaits it.
    fn release_key(&self, kind: ServerType, version: &str, key_lock: Arc<tokio::sync::Mutex<()>>) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        let key = (kind, version.to_string());
        // the map and `key_lock` itself
        if Arc::strong_count(&key_lock) == 2 {
            in_flight.remove(&key);
        }
    }

    /// Number of keys that currently have a download lock.
    pub fn in_flight_keys(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }

    async fn fetch_into_cache(
        &self,
        kind: ServerType,
        version: &str,
        entry: &CatalogEntry,
    ) -> Result<PathBuf> {
        let target = self.cache_path(kind, version);
        if install::is_regular_file(&target).await {
            tracing::debug!(path = %target.display(), "Artifact cache hit");
            return Ok(target);
        }

        tracing::info!(location = %entry.location, "Downloading artifact");
        self.download(entry, &target).await.map_err(|e| {
            tracing::error!(error = %e, "Artifact download failed");
            e
        })?;

        tracing::info!(path = %target.display(), "Artifact cached");
        Ok(target)
    }

    async fn download(&self, entry: &CatalogEntry, target: &Path) -> Result<()> {
        let fail = |e: std::io::Error| Error::DownloadFailed(e.to_string());

        tokio::fs::create_dir_all(&self.cache_dir).await.map_err(fail)?;

        // Removed on drop unless persisted
        let staging = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(&self.cache_dir)
            .map_err(fail)?
            .into_temp_path();

        self.catalog.download(entry, &staging).await.map_err(|e| match e {
            Error::DownloadFailed(_) => e,
            other => Error::DownloadFailed(other.to_string()),
        })?;

        let staged_path = staging.to_path_buf();
        let expected = entry.sha256.clone();
        tokio::task::spawn_blocking(move || {
            install::verify_artifact(&staged_path, expected.as_deref())
        })
        .await
        .map_err(|e| Error::Other(format!("Verification task failed: {}", e)))??;

        staging
            .persist(target)
            .map_err(|e| Error::DownloadFailed(e.to_string()))
    }

    /// Place a cached artifact into `root_directory` as `file_name`.
    ///
    /// An existing file is replaced only after the new copy is fully written.
    #[tracing::instrument(skip(self))]
    pub async fn install(
        &self,
        artifact: &Path,
        root_directory: &Path,
        file_name: &str,
    ) -> Result<PathBuf> {
        let artifact = artifact.to_path_buf();
        let root = root_directory.to_path_buf();
        let file_name = file_name.to_string();

        let target = tokio::task::spawn_blocking(move || {
            install::install_artifact(&artifact, &root, &file_name)
        })
        .await
        .map_err(|e| Error::InstallFailed(format!("Install task failed: {}", e)))?
        .map_err(|e| {
            tracing::error!(error = %e, "Artifact install failed");
            e
        })?;

        tracing::info!(target = %target.display(), "Artifact installed");
        Ok(target)
    }
}
