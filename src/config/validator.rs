use crate::config::{FleetConfig, ServerProperties};
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Returns `true` if `name` refers to a file directly inside a server root.
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Validates the settings of a single server
pub fn validate_server_properties(props: &ServerProperties) -> Result<()> {
    let name = &props.display_name;
    if name.trim().is_empty() {
        return Err(Error::ConfigInvalid(format!(
            "Server '{}' has an empty display name",
            props.server_id
        )));
    }

    if !is_plain_file_name(&props.jar_file) {
        return Err(Error::ConfigInvalid(format!(
            "Server '{}' artifact must be a plain file name, got '{}'",
            name, props.jar_file
        )));
    }

    if props.executable.is_empty() {
        return Err(Error::ConfigInvalid(format!("Server '{}' has empty executable", name)));
    }

    if props.min_memory > props.max_memory {
        return Err(Error::ConfigInvalid(format!(
            "Server '{}' minMemory ({}) exceeds maxMemory ({})",
            name, props.min_memory, props.max_memory
        )));
    }

    Ok(())
}

/// Validates a list of servers, including fleet-wide uniqueness
pub fn validate_servers(servers: &[ServerProperties]) -> Result<()> {
    let mut names = HashSet::new();
    let mut ids = HashSet::new();

    for props in servers {
        validate_server_properties(props)?;

        // Lookups are case-insensitive, so names must be unique ignoring case
        if !names.insert(props.display_name.to_lowercase()) {
            return Err(Error::ConfigInvalid(format!(
                "Duplicate server name '{}'",
                props.display_name
            )));
        }
        if !ids.insert(props.server_id) {
            return Err(Error::ConfigInvalid(format!(
                "Duplicate server id '{}'",
                props.server_id
            )));
        }
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &FleetConfig) -> Result<()> {
    if config.server_directory.as_os_str().is_empty() {
        return Err(Error::ConfigInvalid("serverDirectory is empty".to_string()));
    }
    if config.artifact_cache.as_os_str().is_empty() {
        return Err(Error::ConfigInvalid("artifactCache is empty".to_string()));
    }

    validate_servers(&config.servers)
}
