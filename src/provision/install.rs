use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Whether `path` exists and is a regular file (following symlinks).
pub(crate) async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Check a downloaded artifact before it enters the cache.
///
/// The file must be non-empty and, when a digest is given, match it.
pub(crate) fn verify_artifact(path: &Path, expected_sha256: Option<&str>) -> Result<()> {
    let fail = |msg: String| Error::DownloadFailed(format!("{}: {}", path.display(), msg));

    let mut file = File::open(path).map_err(|e| fail(e.to_string()))?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher).map_err(|e| fail(e.to_string()))?;
    if size == 0 {
        return Err(fail("artifact is empty".to_string()));
    }

    if let Some(expected) = expected_sha256 {
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(fail(format!("checksum mismatch, expected {} got {}", expected, actual)));
        }
    }

    Ok(())
}

/// Copy `artifact` into `root/file_name`.
///
/// The copy is staged under a temporary name inside `root` and renamed over
/// the target, so the target is never absent or half written. The staged
/// file is removed if any step fails.
pub(crate) fn install_artifact(artifact: &Path, root: &Path, file_name: &str) -> Result<PathBuf> {
    let fail = |e: io::Error| Error::InstallFailed(format!("{}: {}", root.display(), e));

    std::fs::create_dir_all(root).map_err(fail)?;
    let target = root.join(file_name);

    let mut source = File::open(artifact).map_err(fail)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".install-")
        .suffix(".part")
        .tempfile_in(root)
        .map_err(fail)?;

    io::copy(&mut source, staged.as_file_mut()).map_err(fail)?;
    let permissions = source.metadata().map_err(fail)?.permissions();
    staged.as_file().set_permissions(permissions).map_err(fail)?;
    staged.as_file().sync_all().map_err(fail)?;

    staged.persist(&target).map_err(|e| fail(e.error))?;
    Ok(target)
}
