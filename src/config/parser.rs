use crate::error::{Error, Result};
use crate::server::ServerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Family of server software an instance runs.
///
/// The kind decides how the process is launched and whether the artifact
/// can be fetched from the catalog at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Vanilla Minecraft server jar
    #[default]
    Minecraft,
    /// Bukkit/Spigot style server jar, installed by hand
    Bukkit,
    /// Any other executable
    Custom,
}

impl ServerType {
    /// Whether the artifact for this kind can be updated from the catalog.
    pub fn supports_update(self) -> bool {
        matches!(self, ServerType::Minecraft)
    }

    /// Whether the artifact is a jar started through a JVM.
    pub fn is_jvm(self) -> bool {
        matches!(self, ServerType::Minecraft | ServerType::Bukkit)
    }

    /// File name prefix used for cached artifacts of this kind.
    pub fn artifact_prefix(self) -> &'static str {
        match self {
            ServerType::Minecraft => "minecraft_server",
            ServerType::Bukkit => "bukkit_server",
            ServerType::Custom => "custom_server",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerType::Minecraft => "minecraft",
            ServerType::Bukkit => "bukkit",
            ServerType::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for ServerType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minecraft" => Ok(ServerType::Minecraft),
            "bukkit" => Ok(ServerType::Bukkit),
            "custom" => Ok(ServerType::Custom),
            _ => Err(()),
        }
    }
}

fn default_executable() -> String {
    "java".to_string()
}

fn default_min_memory() -> u32 {
    512
}

fn default_max_memory() -> u32 {
    1024
}

fn default_stop_timeout() -> u64 {
    30
}

/// Settings record for one server instance.
///
/// `server_id` and `display_name` identify the instance and are never changed
/// by [`ServerProperties::apply_patch`]. Every other field is a named setting
/// (see [`crate::config::Setting`]).
///
/// # Examples
///
/// ```
/// use fleet_runner::config::{ServerProperties, ServerType};
///
/// let mut props = ServerProperties::new("Alpha", "server.jar");
/// props.jar_entry_name = Some("1.20.1".to_string());
/// assert_eq!(props.server_type, ServerType::Minecraft);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProperties {
    /// Immutable identifier, also names the server's root directory.
    pub server_id: ServerId,

    /// Human readable name, unique across the fleet ignoring case.
    pub display_name: String,

    /// File name of the artifact inside the root directory.
    pub jar_file: String,

    /// Logical catalog version the artifact is updated from.
    #[serde(default)]
    pub jar_entry_name: Option<String>,

    #[serde(rename = "type", default)]
    pub server_type: ServerType,

    /// Program used to launch the server. For jar servers this is the JVM.
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Initial heap in MiB.
    #[serde(default = "default_min_memory")]
    pub min_memory: u32,

    /// Maximum heap in MiB.
    #[serde(default = "default_max_memory")]
    pub max_memory: u32,

    #[serde(default)]
    pub port: Option<u16>,

    /// Start this server when the fleet boots.
    #[serde(default)]
    pub auto_start: bool,

    /// Seconds a console `stop` may take before the process is killed.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: u64,

    /// Extra arguments appended to the launch command.
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl ServerProperties {
    /// Create properties for a new server with a fresh identifier and defaults.
    pub fn new(display_name: impl Into<String>, jar_file: impl Into<String>) -> Self {
        Self {
            server_id: ServerId::new(),
            display_name: display_name.into(),
            jar_file: jar_file.into(),
            jar_entry_name: None,
            server_type: ServerType::default(),
            executable: default_executable(),
            min_memory: default_min_memory(),
            max_memory: default_max_memory(),
            port: None,
            auto_start: false,
            stop_timeout: default_stop_timeout(),
            arguments: Vec::new(),
        }
    }

    /// Build the command that launches this server inside `root`.
    pub fn launch_spec(&self, root: &Path) -> LaunchSpec {
        let mut args = Vec::new();
        if self.server_type.is_jvm() {
            args.push(format!("-Xms{}M", self.min_memory));
            args.push(format!("-Xmx{}M", self.max_memory));
            args.push("-jar".to_string());
            args.push(self.jar_file.clone());
            args.push("nogui".to_string());
            if let Some(port) = self.port {
                args.push("--port".to_string());
                args.push(port.to_string());
            }
        } else {
            args.push(self.jar_file.clone());
        }
        args.extend(self.arguments.iter().cloned());

        // jar servers read console commands from stdin
        let stop_command = self.server_type.is_jvm().then(|| "stop".to_string());

        LaunchSpec {
            command: self.executable.clone(),
            args,
            env: HashMap::new(),
            working_dir: root.to_path_buf(),
            stop_command,
            stop_timeout: Duration::from_secs(self.stop_timeout),
        }
    }
}

/// How to spawn a server process.
///
/// # Examples
///
/// ```
/// use fleet_runner::config::LaunchSpec;
/// use std::collections::HashMap;
/// use std::time::Duration;
///
/// let spec = LaunchSpec {
///     command: "java".to_string(),
///     args: vec!["-jar".to_string(), "server.jar".to_string()],
///     env: HashMap::new(),
///     working_dir: "/srv/alpha".into(),
///     stop_command: Some("stop".to_string()),
///     stop_timeout: Duration::from_secs(30),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Program to execute. Relative paths resolve against `PATH`.
    pub command: String,

    /// Command-line arguments.
    pub args: Vec<String>,

    /// Environment variables added to the inherited environment.
    pub env: HashMap<String, String>,

    /// Directory the process runs in.
    pub working_dir: PathBuf,

    /// Line written to stdin to ask the process to shut down.
    ///
    /// `None` means the process is killed straight away on stop.
    pub stop_command: Option<String>,

    /// How long to wait for a requested shutdown before killing.
    pub stop_timeout: Duration,
}

/// Top level configuration for a fleet.
///
/// # JSON Schema
///
/// ```json
/// {
///   "serverDirectory": "/srv/servers",
///   "artifactCache": "/srv/jars",
///   "settingsDirectory": "/srv/settings",
///   "servers": [
///     {
///       "serverId": "5f0c7c4e-8d0b-4a53-9a4e-2f7c1d1f0b6a",
///       "displayName": "Alpha",
///       "jarFile": "server.jar",
///       "jarEntryName": "1.20.1",
///       "type": "minecraft"
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetConfig {
    /// Parent of every server root directory (`<serverDirectory>/<serverId>`).
    pub server_directory: PathBuf,

    /// Shared cache of downloaded artifacts.
    pub artifact_cache: PathBuf,

    /// Where per-server settings are persisted. Defaults to `<serverDirectory>/settings`.
    #[serde(default)]
    pub settings_directory: Option<PathBuf>,

    #[serde(default)]
    pub servers: Vec<ServerProperties>,
}

impl FleetConfig {
    /// Loads a configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigParse` if the file cannot be read or is not a
    /// valid fleet configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        Self::parse_from_str(&content)
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Directory holding persisted server settings.
    pub fn settings_directory(&self) -> PathBuf {
        self.settings_directory
            .clone()
            .unwrap_or_else(|| self.server_directory.join("settings"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fleet_config() {
        let config_str = r#"{
            "serverDirectory": "/srv/servers",
            "artifactCache": "/srv/jars",
            "servers": [
                {
                    "serverId": "5f0c7c4e-8d0b-4a53-9a4e-2f7c1d1f0b6a",
                    "displayName": "Alpha",
                    "jarFile": "server.jar",
                    "jarEntryName": "1.20.1"
                }
            ]
        }"#;

        let config = FleetConfig::parse_from_str(config_str).unwrap();

        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.settings_directory(), PathBuf::from("/srv/servers/settings"));

        let alpha = &config.servers[0];
        assert_eq!(alpha.display_name, "Alpha");
        assert_eq!(alpha.server_type, ServerType::Minecraft);
        assert_eq!(alpha.executable, "java");
        assert_eq!(alpha.jar_entry_name.as_deref(), Some("1.20.1"));
    }

    #[test]
    fn test_launch_spec_for_jar_server() {
        let mut props = ServerProperties::new("Alpha", "server.jar");
        props.port = Some(25570);
        let spec = props.launch_spec(Path::new("/srv/alpha"));

        assert_eq!(spec.command, "java");
        assert_eq!(
            spec.args,
            vec!["-Xms512M", "-Xmx1024M", "-jar", "server.jar", "nogui", "--port", "25570"]
        );
        assert_eq!(spec.working_dir, PathBuf::from("/srv/alpha"));
        assert_eq!(spec.stop_command.as_deref(), Some("stop"));
        assert_eq!(spec.stop_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_launch_spec_for_custom_server() {
        let mut props = ServerProperties::new("Beta", "run.sh");
        props.server_type = ServerType::Custom;
        props.executable = "sh".to_string();
        props.arguments = vec!["--verbose".to_string()];

        let spec = props.launch_spec(Path::new("/srv/beta"));
        assert_eq!(spec.command, "sh");
        assert_eq!(spec.args, vec!["run.sh", "--verbose"]);
        assert_eq!(spec.stop_command, None);
    }

    #[test]
    fn test_server_type_from_str() {
        assert_eq!("Minecraft".parse::<ServerType>(), Ok(ServerType::Minecraft));
        assert_eq!("CUSTOM".parse::<ServerType>(), Ok(ServerType::Custom));
        assert!("forge".parse::<ServerType>().is_err());
        assert!(ServerType::Minecraft.supports_update());
        assert!(!ServerType::Bukkit.supports_update());
    }
}
