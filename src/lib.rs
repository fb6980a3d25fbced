/*!
 # Fleet Runner

 A Rust library for supervising a fleet of named, long-running game/application
 server processes.

 ## Overview

 Fleet Runner provides functionality to:
 - Start, stop and restart server processes by display name
 - Change individual server settings by name while protecting identity fields
 - Keep a fleet-wide cache of server artifacts and install them into server directories
 - Persist changed settings and keep a history of lifecycle events

 ## Basic Usage

 ```no_run
 use fleet_runner::{FleetController, Result};
 use fleet_runner::config::FleetConfig;
 use fleet_runner::provision::{ArtifactCatalog, LocalMirrorCatalog};
 use std::sync::Arc;

 #[tokio::main]
 async fn main() -> Result<()> {
     let config = FleetConfig::from_file("fleet.json")?;
     let catalog: Arc<dyn ArtifactCatalog> = Arc::new(LocalMirrorCatalog::new("/srv/mirror"));
     let fleet = FleetController::from_config(config, Some(catalog)).await?;

     // Fetch the configured artifact version, then start the server
     fleet.update("Alpha").await?;
     fleet.start("Alpha").await?;

     // Change a setting; it is persisted immediately
     fleet.set_property("Alpha", "maxMemory", "4096").await?;
     fleet.restart("Alpha").await?;

     println!("{}", fleet.info("alpha").await?);

     fleet.stop_all().await
 }
 ```

 ## Features

 - **Lifecycle**: Validated start/stop/restart transitions per server
 - **Settings**: Schema-driven, all-or-nothing patches of typed settings
 - **Provisioning**: Single-flight, verified artifact downloads and atomic installs
 - **Persistence**: Settings stored as JSON, written atomically
 - **Async Support**: Full async/await support on tokio
*/

pub mod command;
pub mod config;
pub mod error;
pub mod provision;
pub mod registry;
pub mod server;
pub mod store;

pub use command::{Action, Outcome, ServerCommand};
pub use config::{FleetConfig, ServerProperties, ServerType};
pub use error::{Error, Result};
pub use registry::ServerRegistry;
pub use server::{RunState, ServerId, ServerInstance};

use provision::{ArtifactCatalog, AssetProvisioner};
use serde::Serialize;
use server::{ServerEvent, ServerLifecycleEvent, ServerLifecycleManager};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use store::{ConfigPersistence, JsonFileStore};

/// Process-wide collaborators of a [`FleetController`].
///
/// Built once at startup and handed to the controller, which only reads it
/// afterwards.
pub struct FleetContext {
    /// Every known server
    pub registry: ServerRegistry,
    /// Where changed settings are written
    pub store: Arc<dyn ConfigPersistence>,
    /// Artifact provisioning; `None` when no catalog is set up
    pub provisioner: Option<Arc<AssetProvisioner>>,
}

/// Read-only snapshot of one server
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub id: ServerId,
    pub display_name: String,
    pub root_directory: PathBuf,
    pub run_state: RunState,
    pub pid: Option<u32>,
    /// Serialized settings
    pub settings: serde_json::Value,
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---Server Information [{}]---", self.display_name)?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Root Directory: {}", self.root_directory.display())?;
        writeln!(f, "Running: {}", self.run_state.is_running())?;
        write!(f, "Settings: {}", self.settings)
    }
}

/// Resolves servers by name and runs lifecycle, settings and update
/// operations on them.
///
/// Operations on one server are serialized by that server's lock; operations
/// on different servers run independently. All public methods are
/// instrumented with `tracing` spans.
pub struct FleetController {
    context: FleetContext,
    lifecycle: ServerLifecycleManager,
}

impl FleetController {
    /// Create a controller over an already assembled context
    pub fn new(context: FleetContext) -> Self {
        tracing::info!(num_servers = context.registry.len(), "Creating FleetController");
        Self {
            context,
            lifecycle: ServerLifecycleManager::new(),
        }
    }

    /// Build the fleet described by `config`.
    ///
    /// Settings previously saved in the settings directory take precedence
    /// over the same server's entry in `config`; saved servers missing from
    /// `config` are added. Root directories are created as needed.
    #[tracing::instrument(skip(config, catalog), fields(num_servers = config.servers.len()))]
    pub async fn from_config(
        config: FleetConfig,
        catalog: Option<Arc<dyn ArtifactCatalog>>,
    ) -> Result<Self> {
        config::validate_config(&config)?;

        let store = JsonFileStore::new(config.settings_directory());
        let mut stored: HashMap<ServerId, ServerProperties> = store
            .load_all()
            .await?
            .into_iter()
            .map(|props| (props.server_id, props))
            .collect();

        let mut servers = Vec::new();
        for props in config.servers {
            servers.push(stored.remove(&props.server_id).unwrap_or(props));
        }
        let mut extra: Vec<_> = stored.into_values().collect();
        extra.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        servers.extend(extra);
        config::validator::validate_servers(&servers)?;

        let mut registry = ServerRegistry::new();
        for props in servers {
            let instance = ServerInstance::new(props, &config.server_directory);
            tokio::fs::create_dir_all(instance.root_directory())
                .await
                .map_err(|e| {
                    Error::Other(format!(
                        "Failed to create {}: {}",
                        instance.root_directory().display(),
                        e
                    ))
                })?;
            registry.register(instance)?;
        }

        let provisioner = catalog.map(|catalog| {
            Arc::new(AssetProvisioner::new(catalog, config.artifact_cache.clone()))
        });

        Ok(Self::new(FleetContext {
            registry,
            store: Arc::new(store),
            provisioner,
        }))
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.context.registry
    }

    fn resolve(&self, name: &str) -> Result<Arc<ServerInstance>> {
        self.context.registry.find_by_name(name).ok_or_else(|| {
            tracing::warn!("Server not found");
            Error::NotFound(name.to_string())
        })
    }

    fn record(&self, instance: &ServerInstance, event: ServerLifecycleEvent, details: Option<String>) {
        if let Err(e) = self
            .lifecycle
            .record_event(instance.id(), instance.display_name(), event, details)
        {
            tracing::warn!(error = %e, "Failed to record lifecycle event");
        }
    }

    /// Start a stopped server.
    ///
    /// # Errors
    ///
    /// * `NotFound` if no server has this name
    /// * `AlreadyRunning` / `Busy` if the server is not stopped
    /// * `MissingArtifact` if the configured artifact is not in the root directory
    /// * `StartFailed` if the process could not be launched
    #[tracing::instrument(skip(self), fields(server_name = %name))]
    pub async fn start(&self, name: &str) -> Result<Outcome> {
        let instance = self.resolve(name)?;
        let display = instance.display_name();
        let root = instance.root_directory();
        let mut state = instance.lock().await;

        match state.supervisor.refresh() {
            RunState::Stopped => {}
            RunState::Running => {
                tracing::warn!("Server is already running");
                return Err(Error::AlreadyRunning(display.to_string()));
            }
            RunState::Starting | RunState::Stopping => {
                return Err(Error::Busy(display.to_string()));
            }
        }

        let artifact = state.artifact_path(root);
        if !provision::is_regular_file(&artifact).await {
            tracing::warn!(artifact = %artifact.display(), "Artifact missing, update required");
            return Err(Error::MissingArtifact {
                server: display.to_string(),
                file: state.properties.jar_file.clone(),
            });
        }

        let spec = state.launch_spec(root);
        if let Err(e) = state.supervisor.start(&spec).await {
            tracing::error!(error = %e, "Failed to start server");
            self.record(&instance, ServerLifecycleEvent::Failed, Some(e.to_string()));
            return Err(e);
        }

        self.record(&instance, ServerLifecycleEvent::Started, None);
        tracing::info!("Server started");
        Ok(Outcome::new(display, format!("'{}' has been started", display)))
    }

    /// Stop a running server and wait for its process to exit.
    ///
    /// Stopping a stopped server changes nothing and reports `NotRunning`.
    #[tracing::instrument(skip(self), fields(server_name = %name))]
    pub async fn stop(&self, name: &str) -> Result<Outcome> {
        let instance = self.resolve(name)?;
        let display = instance.display_name();
        let mut state = instance.lock().await;

        match state.supervisor.refresh() {
            RunState::Running => {}
            RunState::Stopped => {
                tracing::warn!("Server is not running");
                return Err(Error::NotRunning(display.to_string()));
            }
            RunState::Starting | RunState::Stopping => {
                return Err(Error::Busy(display.to_string()));
            }
        }

        state.supervisor.stop().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to stop server");
            e
        })?;

        self.record(&instance, ServerLifecycleEvent::Stopped, None);
        tracing::info!("Server stopped");
        Ok(Outcome::new(display, format!("{} has been stopped", display)))
    }

    /// Stop and start a running server as one operation.
    ///
    /// The artifact is checked before the process is stopped, so a server
    /// whose artifact disappeared keeps running and `MissingArtifact` is
    /// reported instead.
    #[tracing::instrument(skip(self), fields(server_name = %name))]
    pub async fn restart(&self, name: &str) -> Result<Outcome> {
        let instance = self.resolve(name)?;
        let display = instance.display_name();
        let root = instance.root_directory();
        let mut state = instance.lock().await;

        match state.supervisor.refresh() {
            RunState::Running => {}
            RunState::Stopped => {
                tracing::warn!("Server is not running");
                return Err(Error::NotRunning(display.to_string()));
            }
            RunState::Starting | RunState::Stopping => {
                return Err(Error::Busy(display.to_string()));
            }
        }

        let artifact = state.artifact_path(root);
        if !provision::is_regular_file(&artifact).await {
            return Err(Error::MissingArtifact {
                server: display.to_string(),
                file: state.properties.jar_file.clone(),
            });
        }

        let spec = state.launch_spec(root);
        if let Err(e) = state.supervisor.restart(&spec).await {
            tracing::error!(error = %e, "Failed to restart server");
            self.record(&instance, ServerLifecycleEvent::Failed, Some(e.to_string()));
            return Err(e);
        }

        self.record(&instance, ServerLifecycleEvent::Restarted, None);
        tracing::info!("Server restarted");
        Ok(Outcome::new(display, format!("{} was restarted", display)))
    }

    /// Fetch the configured artifact version and install it into the
    /// server's root directory.
    ///
    /// The previous artifact stays in place until the new one is fully
    /// written. A running server keeps running; restart it to pick up the
    /// new artifact.
    ///
    /// # Errors
    ///
    /// * `ProvisionerUnavailable` if no ready catalog is configured
    /// * `MissingArtifactReference` if `jarEntryName` is not set
    /// * `UnsupportedOperation` if the server kind cannot be updated
    /// * `UpdateFailed` wrapping the failed provisioning or install step
    #[tracing::instrument(skip(self), fields(server_name = %name))]
    pub async fn update(&self, name: &str) -> Result<Outcome> {
        let instance = self.resolve(name)?;
        let display = instance.display_name();

        let provisioner = self
            .context
            .provisioner
            .as_ref()
            .filter(|p| p.is_ready())
            .ok_or_else(|| {
                tracing::warn!("Artifact provisioning unavailable");
                Error::ProvisionerUnavailable
            })?;

        let mut state = instance.lock().await;
        let props = &state.properties;

        let version = props
            .jar_entry_name
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::MissingArtifactReference(display.to_string()))?;

        if !props.server_type.supports_update() {
            tracing::warn!(kind = %props.server_type, "Server kind does not support updating");
            return Err(Error::UnsupportedOperation(format!(
                "{} ({}) does not support updating",
                display, props.server_type
            )));
        }

        let kind = props.server_type;
        let file_name = props.jar_file.clone();
        let wrap = |cause: Error| Error::UpdateFailed {
            server: display.to_string(),
            cause: Box::new(cause),
        };

        tracing::info!(%kind, %version, "Updating artifact");
        let result = async {
            let cached = provisioner.ensure(kind, &version).await?;
            provisioner
                .install(&cached, instance.root_directory(), &file_name)
                .await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(error = %e, "Update failed");
            self.record(&instance, ServerLifecycleEvent::Failed, Some(e.to_string()));
            return Err(wrap(e));
        }

        if state.supervisor.refresh().is_running() {
            tracing::warn!("Artifact replaced while running, restart to apply");
        }
        self.record(&instance, ServerLifecycleEvent::Updated, Some(version.clone()));
        Ok(Outcome::new(display, format!("{} updated to {}", display, version)))
    }

    /// Change one setting of a server and persist the result.
    ///
    /// If persisting fails the change is kept in memory and `PersistFailed`
    /// is returned.
    ///
    /// # Errors
    ///
    /// * `UnknownSetting` / `ProtectedSetting` for names that cannot be set
    /// * `TypeMismatch` / `ConfigInvalid` for values that do not fit; nothing changes
    /// * `PersistFailed` if the new settings could not be stored
    #[tracing::instrument(skip(self, value), fields(server_name = %name, setting = %key))]
    pub async fn set_property(&self, name: &str, key: &str, value: &str) -> Result<Outcome> {
        let instance = self.resolve(name)?;
        let display = instance.display_name();
        let mut state = instance.lock().await;

        let setting = state.properties.apply_patch(key, value).map_err(|e| {
            tracing::warn!(error = %e, "Setting rejected");
            e
        })?;
        let snapshot = state.properties.clone();
        self.record(
            &instance,
            ServerLifecycleEvent::Reconfigured,
            Some(format!("{}={}", setting, setting.value_of(&snapshot))),
        );

        self.context
            .store
            .save(instance.id(), &snapshot)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to persist settings");
                match e {
                    Error::PersistFailed(_) => e,
                    other => Error::PersistFailed(other.to_string()),
                }
            })?;

        tracing::info!("Setting changed");
        Ok(Outcome::new(display, format!("{} changed", setting)))
    }

    /// Snapshot of a server's identity, state and settings
    #[tracing::instrument(skip(self), fields(server_name = %name))]
    pub async fn info(&self, name: &str) -> Result<ServerInfo> {
        let instance = self.resolve(name)?;
        Self::snapshot(&instance).await
    }

    async fn snapshot(instance: &ServerInstance) -> Result<ServerInfo> {
        let mut state = instance.lock().await;
        let run_state = state.supervisor.refresh();
        let settings = serde_json::to_value(&state.properties)
            .map_err(|e| Error::Other(format!("Failed to serialize settings: {}", e)))?;

        Ok(ServerInfo {
            id: instance.id(),
            display_name: instance.display_name().to_string(),
            root_directory: instance.root_directory().to_path_buf(),
            run_state,
            pid: state.supervisor.pid(),
            settings,
        })
    }

    /// Snapshots of every server, in registration order
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<ServerInfo>> {
        let mut infos = Vec::with_capacity(self.context.registry.len());
        for instance in self.context.registry.all() {
            infos.push(Self::snapshot(&instance).await?);
        }
        Ok(infos)
    }

    /// Recent lifecycle events of a server, newest first
    pub fn events(&self, name: &str, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        let instance = self.resolve(name)?;
        self.lifecycle.get_server_events(instance.id(), limit)
    }

    /// Parse and run one console command line
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, line: &str) -> Result<Outcome> {
        let command = ServerCommand::parse(line)?;
        let name = command.server.as_str();
        match command.action {
            Action::Start => self.start(name).await,
            Action::Stop => self.stop(name).await,
            Action::Restart => self.restart(name).await,
            Action::Update => self.update(name).await,
            Action::Set { key, value } => self.set_property(name, &key, &value).await,
            Action::Info => {
                let info = self.info(name).await?;
                Ok(Outcome::new(&info.display_name, info.to_string()))
            }
        }
    }

    /// Start every server with `autoStart` set.
    ///
    /// Returns one result per auto-start server; failures do not stop the
    /// remaining servers from starting.
    #[tracing::instrument(skip(self))]
    pub async fn start_auto(&self) -> Vec<(String, Result<Outcome>)> {
        let mut results = Vec::new();
        for instance in self.context.registry.all() {
            let auto_start = instance.lock().await.properties.auto_start;
            if auto_start {
                let name = instance.display_name().to_string();
                let result = self.start(&name).await;
                if let Err(e) = &result {
                    tracing::error!(server_name = %name, error = %e, "Auto-start failed");
                }
                results.push((name, result));
            }
        }
        results
    }

    /// Stop every running server.
    ///
    /// Servers are stopped concurrently. All errors are collected; a single
    /// failure is returned as-is, several are combined into `Error::Other`.
    #[tracing::instrument(skip(self))]
    pub async fn stop_all(&self) -> Result<()> {
        tracing::info!("Stopping all servers");
        let instances = self.context.registry.all();
        let results = futures::future::join_all(
            instances.iter().map(|instance| self.stop(instance.display_name())),
        )
        .await;

        let mut errors: Vec<Error> = results
            .into_iter()
            .filter_map(|r| r.err())
            .filter(|e| !matches!(e, Error::NotRunning(_)))
            .collect();

        if errors.is_empty() {
            tracing::info!("All servers stopped");
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            tracing::warn!(error_count = errors.len(), "Some servers failed to stop");
            let error_msg = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            Err(Error::Other(format!(
                "Multiple servers failed to stop: {}",
                error_msg
            )))
        }
    }
}
