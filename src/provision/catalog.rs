use crate::config::ServerType;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// A resolved artifact release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub kind: ServerType,
    /// Logical version the entry was resolved from
    pub version: String,
    /// Where the catalog fetches the artifact from (URL, path, ...)
    pub location: String,
    /// Expected SHA-256 of the artifact as lowercase hex, if published
    pub sha256: Option<String>,
}

/// Source of server artifacts.
///
/// The transport behind a catalog is up to the implementation; the
/// provisioner only needs readiness, version resolution and a download that
/// writes to a path it chooses.
#[async_trait]
pub trait ArtifactCatalog: Send + Sync {
    /// Whether the catalog is set up and can serve requests.
    fn is_ready(&self) -> bool;

    /// Look up a logical version. `Ok(None)` means the version does not exist.
    async fn resolve(&self, kind: ServerType, version: &str) -> Result<Option<CatalogEntry>>;

    /// Write the artifact for `entry` to `destination`.
    ///
    /// Fails with `Error::DownloadFailed` on any transport error.
    async fn download(&self, entry: &CatalogEntry, destination: &Path) -> Result<()>;
}

/// Catalog backed by a directory of pre-fetched artifacts.
///
/// An artifact for version `v` of kind `k` is stored as
/// `<root>/<prefix(k)>.<v>.jar`, optionally next to a `.sha256` file holding
/// its digest.
pub struct LocalMirrorCatalog {
    root: PathBuf,
    ready: AtomicBool,
}

impl LocalMirrorCatalog {
    /// Create a mirror catalog. It is ready if `root` is an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let ready = root.is_dir();
        Self {
            root,
            ready: AtomicBool::new(ready),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn artifact_path(&self, kind: ServerType, version: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}.jar", kind.artifact_prefix(), version))
    }
}

#[async_trait]
impl ArtifactCatalog for LocalMirrorCatalog {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn resolve(&self, kind: ServerType, version: &str) -> Result<Option<CatalogEntry>> {
        let path = self.artifact_path(kind, version);
        if !super::is_regular_file(&path).await {
            return Ok(None);
        }

        let digest_path = path.with_extension("jar.sha256");
        let sha256 = match tokio::fs::read_to_string(&digest_path).await {
            Ok(text) => text.split_whitespace().next().map(str::to_ascii_lowercase),
            Err(_) => None,
        };

        Ok(Some(CatalogEntry {
            kind,
            version: version.to_string(),
            location: path.to_string_lossy().into_owned(),
            sha256,
        }))
    }

    async fn download(&self, entry: &CatalogEntry, destination: &Path) -> Result<()> {
        tokio::fs::copy(&entry.location, destination)
            .await
            .map(|_| ())
            .map_err(|e| Error::DownloadFailed(format!("{}: {}", entry.location, e)))
    }
}
