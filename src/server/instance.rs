use crate::config::{LaunchSpec, ServerProperties};
use crate::server::{ProcessSupervisor, ServerId};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

/// One managed server: identity, root directory, settings and process.
///
/// Settings and process live behind a single async mutex. Every operation
/// holds the guard from its state check until its action completes, so two
/// operations on the same server never interleave.
pub struct ServerInstance {
    id: ServerId,
    display_name: String,
    root_directory: PathBuf,
    state: Mutex<InstanceState>,
}

/// Mutable part of a [`ServerInstance`], reachable through [`ServerInstance::lock`].
pub struct InstanceState {
    pub properties: ServerProperties,
    pub supervisor: ProcessSupervisor,
}

impl ServerInstance {
    /// Create an instance rooted at `<server_directory>/<server_id>`.
    pub fn new(properties: ServerProperties, server_directory: &Path) -> Self {
        let root = server_directory.join(properties.server_id.to_string());
        Self::with_root(properties, root)
    }

    /// Create an instance with an explicit root directory.
    pub fn with_root(properties: ServerProperties, root_directory: impl Into<PathBuf>) -> Self {
        let supervisor = ProcessSupervisor::new(properties.display_name.clone());
        Self {
            id: properties.server_id,
            display_name: properties.display_name.clone(),
            root_directory: root_directory.into(),
            state: Mutex::new(InstanceState {
                properties,
                supervisor,
            }),
        }
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Directory owned exclusively by this instance.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Acquire exclusive access to settings and process.
    pub async fn lock(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().await
    }
}

impl InstanceState {
    /// Location of the configured artifact inside `root`.
    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        root.join(&self.properties.jar_file)
    }

    pub fn launch_spec(&self, root: &Path) -> LaunchSpec {
        self.properties.launch_spec(root)
    }
}

impl std::fmt::Debug for ServerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerInstance")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("root_directory", &self.root_directory)
            .finish_non_exhaustive()
    }
}
