//! Name-indexed updates of [`ServerProperties`].
//!
//! Settings are addressed by their JSON name (`jarFile`, `maxMemory`, ...) and
//! supplied as text. Each patch produces a whole new record which replaces the
//! old one only if conversion and validation both succeed.

use crate::config::parser::{ServerProperties, ServerType};
use crate::config::validator::{is_plain_file_name, validate_server_properties};
use crate::error::{Error, Result};
use std::fmt;

/// Setting names that identify a server and are never patchable.
pub const PROTECTED_SETTINGS: [&str; 3] = ["id", "serverId", "displayName"];

/// A mutable field of [`ServerProperties`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    JarFile,
    JarEntryName,
    ServerType,
    Executable,
    MinMemory,
    MaxMemory,
    Port,
    AutoStart,
    StopTimeout,
}

impl Setting {
    /// Every patchable setting.
    pub const ALL: [Setting; 9] = [
        Setting::JarFile,
        Setting::JarEntryName,
        Setting::ServerType,
        Setting::Executable,
        Setting::MinMemory,
        Setting::MaxMemory,
        Setting::Port,
        Setting::AutoStart,
        Setting::StopTimeout,
    ];

    /// Name of the setting as it appears in serialized properties.
    pub fn name(self) -> &'static str {
        match self {
            Setting::JarFile => "jarFile",
            Setting::JarEntryName => "jarEntryName",
            Setting::ServerType => "type",
            Setting::Executable => "executable",
            Setting::MinMemory => "minMemory",
            Setting::MaxMemory => "maxMemory",
            Setting::Port => "port",
            Setting::AutoStart => "autoStart",
            Setting::StopTimeout => "stopTimeout",
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Setting::JarFile => "a plain file name",
            Setting::JarEntryName | Setting::Executable => "text",
            Setting::ServerType => "one of minecraft, bukkit, custom",
            Setting::MinMemory | Setting::MaxMemory => "a size in MiB",
            Setting::Port => "a port number or empty",
            Setting::AutoStart => "true or false",
            Setting::StopTimeout => "a number of seconds",
        }
    }

    /// Resolve a setting by name.
    ///
    /// Identity fields are reported as `ProtectedSetting`, anything else that
    /// is not a known setting as `UnknownSetting`.
    pub fn lookup(key: &str) -> Result<Setting> {
        if let Some(setting) = Self::ALL.iter().find(|s| s.name() == key) {
            return Ok(*setting);
        }
        if PROTECTED_SETTINGS.contains(&key) {
            return Err(Error::ProtectedSetting(key.to_string()));
        }
        Err(Error::UnknownSetting(key.to_string()))
    }

    fn mismatch(self, raw: &str) -> Error {
        Error::TypeMismatch {
            key: self.name().to_string(),
            value: raw.to_string(),
            expected: self.expected().to_string(),
        }
    }

    /// Convert `raw` and write it into `props`.
    ///
    /// `props` is only written once the conversion has succeeded.
    fn apply(self, props: &mut ServerProperties, raw: &str) -> Result<()> {
        let trimmed = raw.trim();
        match self {
            Setting::JarFile => {
                if !is_plain_file_name(trimmed) {
                    return Err(self.mismatch(raw));
                }
                props.jar_file = trimmed.to_string();
            }
            Setting::JarEntryName => {
                props.jar_entry_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            Setting::ServerType => {
                props.server_type = trimmed
                    .parse::<ServerType>()
                    .map_err(|_| self.mismatch(raw))?;
            }
            Setting::Executable => {
                if trimmed.is_empty() {
                    return Err(self.mismatch(raw));
                }
                props.executable = trimmed.to_string();
            }
            Setting::MinMemory => {
                props.min_memory = trimmed.parse().map_err(|_| self.mismatch(raw))?;
            }
            Setting::MaxMemory => {
                props.max_memory = trimmed.parse().map_err(|_| self.mismatch(raw))?;
            }
            Setting::Port => {
                props.port = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.parse().map_err(|_| self.mismatch(raw))?)
                };
            }
            Setting::AutoStart => {
                props.auto_start = trimmed
                    .to_ascii_lowercase()
                    .parse()
                    .map_err(|_| self.mismatch(raw))?;
            }
            Setting::StopTimeout => {
                props.stop_timeout = trimmed.parse().map_err(|_| self.mismatch(raw))?;
            }
        }
        Ok(())
    }

    /// Current value of this setting rendered as text.
    pub fn value_of(self, props: &ServerProperties) -> String {
        match self {
            Setting::JarFile => props.jar_file.clone(),
            Setting::JarEntryName => props.jar_entry_name.clone().unwrap_or_default(),
            Setting::ServerType => props.server_type.to_string(),
            Setting::Executable => props.executable.clone(),
            Setting::MinMemory => props.min_memory.to_string(),
            Setting::MaxMemory => props.max_memory.to_string(),
            Setting::Port => props.port.map(|p| p.to_string()).unwrap_or_default(),
            Setting::AutoStart => props.auto_start.to_string(),
            Setting::StopTimeout => props.stop_timeout.to_string(),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ServerProperties {
    /// Return a copy of these properties with one setting changed.
    ///
    /// The identity fields of the result are always those of `self`.
    pub fn patched(&self, key: &str, raw: &str) -> Result<ServerProperties> {
        let setting = Setting::lookup(key)?;
        let mut next = self.clone();
        setting.apply(&mut next, raw)?;

        next.server_id = self.server_id;
        next.display_name.clone_from(&self.display_name);

        validate_server_properties(&next)?;
        Ok(next)
    }

    /// Change one setting in place. On error `self` is left untouched.
    pub fn apply_patch(&mut self, key: &str, raw: &str) -> Result<Setting> {
        let setting = Setting::lookup(key)?;
        *self = self.patched(key, raw)?;
        Ok(setting)
    }
}
