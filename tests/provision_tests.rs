use async_trait::async_trait;
use fleet_runner::config::ServerType;
use fleet_runner::error::{Error, Result};
use fleet_runner::provision::{ArtifactCatalog, AssetProvisioner, CatalogEntry};
use mockall::mock;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Catalog {}

    #[async_trait]
    impl ArtifactCatalog for Catalog {
        fn is_ready(&self) -> bool;
        async fn resolve(&self, kind: ServerType, version: &str) -> Result<Option<CatalogEntry>>;
        async fn download(&self, entry: &CatalogEntry, destination: &Path) -> Result<()>;
    }
}

fn resolving_catalog() -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog.expect_is_ready().return_const(true);
    catalog.expect_resolve().returning(|kind, version| {
        Ok(Some(CatalogEntry {
            kind,
            version: version.to_string(),
            location: format!("mock://{}", version),
            sha256: None,
        }))
    });
    catalog
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ensure_downloads_once() -> Result<()> {
    let cache = tempfile::tempdir().unwrap();

    let mut catalog = resolving_catalog();
    catalog.expect_download().times(1).returning(|entry, destination| {
        // slow transfer so the other callers pile up behind it
        std::thread::sleep(Duration::from_millis(100));
        std::fs::write(destination, entry.version.as_bytes())
            .map_err(|e| Error::DownloadFailed(e.to_string()))
    });

    let provisioner = Arc::new(AssetProvisioner::new(Arc::new(catalog), cache.path()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let provisioner = Arc::clone(&provisioner);
            tokio::spawn(async move { provisioner.ensure(ServerType::Minecraft, "1.20.1").await })
        })
        .collect();

    let mut paths = Vec::new();
    for handle in handles {
        paths.push(handle.await.expect("ensure task panicked")?);
    }

    let expected = cache.path().join("minecraft_server.1.20.1.jar");
    assert!(paths.iter().all(|p| *p == expected));
    assert_eq!(std::fs::read(&expected).unwrap(), b"1.20.1");
    // per-version locks are dropped once nobody waits on them
    assert_eq!(provisioner.in_flight_keys(), 0);
    Ok(())
}

#[tokio::test]
async fn test_distinct_versions_download_separately() -> Result<()> {
    let cache = tempfile::tempdir().unwrap();

    let mut catalog = resolving_catalog();
    catalog.expect_download().times(2).returning(|entry, destination| {
        std::fs::write(destination, entry.version.as_bytes())
            .map_err(|e| Error::DownloadFailed(e.to_string()))
    });
    let provisioner = AssetProvisioner::new(Arc::new(catalog), cache.path());

    let (a, b) = tokio::join!(
        provisioner.ensure(ServerType::Minecraft, "1.20.1"),
        provisioner.ensure(ServerType::Minecraft, "1.19.4"),
    );
    assert_ne!(a?, b?);
    Ok(())
}

#[tokio::test]
async fn test_failed_download_is_retried_next_time() -> Result<()> {
    let cache = tempfile::tempdir().unwrap();

    let mut catalog = resolving_catalog();
    let mut seq = mockall::Sequence::new();
    catalog
        .expect_download()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, destination| {
            // partial write before the connection drops
            std::fs::write(destination, b"trunc").unwrap();
            Err(Error::DownloadFailed("connection reset".to_string()))
        });
    catalog
        .expect_download()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, destination| {
            std::fs::write(destination, b"complete").map_err(|e| Error::DownloadFailed(e.to_string()))
        });
    let provisioner = AssetProvisioner::new(Arc::new(catalog), cache.path());

    let first = provisioner.ensure(ServerType::Minecraft, "1.20.1").await;
    assert_eq!(first, Err(Error::DownloadFailed("connection reset".to_string())));
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
    assert_eq!(provisioner.in_flight_keys(), 0);

    let path = provisioner.ensure(ServerType::Minecraft, "1.20.1").await?;
    assert_eq!(std::fs::read(path).unwrap(), b"complete");
    Ok(())
}

#[tokio::test]
async fn test_install_into_fresh_root() -> Result<()> {
    let cache = tempfile::tempdir().unwrap();
    let servers = tempfile::tempdir().unwrap();

    let mut catalog = resolving_catalog();
    catalog
        .expect_download()
        .returning(|_, destination| std::fs::write(destination, b"jar").map_err(|e| Error::DownloadFailed(e.to_string())));
    let provisioner = AssetProvisioner::new(Arc::new(catalog), cache.path());

    let cached = provisioner.ensure(ServerType::Minecraft, "1.20.1").await?;
    let root = servers.path().join("alpha");
    let installed = provisioner.install(&cached, &root, "server.jar").await?;

    assert_eq!(installed, root.join("server.jar"));
    assert_eq!(std::fs::read(&installed).unwrap(), b"jar");
    // the cached copy stays for other servers
    assert!(cached.exists());
    Ok(())
}
