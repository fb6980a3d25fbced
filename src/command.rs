//! Console command surface.
//!
//! Parses lines of the form `<name> <start|stop|restart|update|set <key> <value>|info>`
//! and describes the result of running them.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Help text for the `server` console command
pub const USAGE: &str = "[name] <start|stop|restart|update|set [property] [value]|info>";

/// Operation requested on a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
    Update,
    /// Change one setting. `value` may be empty to clear optional settings.
    Set { key: String, value: String },
    Info,
}

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    /// Display name of the target server, matched ignoring case
    pub server: String,
    pub action: Action,
}

impl ServerCommand {
    /// Parse a console line.
    ///
    /// Switches are matched ignoring case. For `set`, everything after the
    /// property name is the value.
    ///
    /// # Examples
    ///
    /// ```
    /// use fleet_runner::command::{Action, ServerCommand};
    ///
    /// let cmd = ServerCommand::parse("Alpha set jarEntryName 1.20.1").unwrap();
    /// assert_eq!(cmd.server, "Alpha");
    /// assert_eq!(
    ///     cmd.action,
    ///     Action::Set { key: "jarEntryName".into(), value: "1.20.1".into() }
    /// );
    /// ```
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let (Some(server), Some(switch)) = (parts.next(), parts.next()) else {
            return Err(Error::Usage(USAGE.to_string()));
        };

        let action = match switch.to_lowercase().as_str() {
            "start" => Action::Start,
            "stop" => Action::Stop,
            "restart" => Action::Restart,
            "update" => Action::Update,
            "info" => Action::Info,
            "set" => {
                let key = parts.next().ok_or_else(|| Error::Usage(USAGE.to_string()))?;
                Action::Set {
                    key: key.to_string(),
                    value: parts.collect::<Vec<_>>().join(" "),
                }
            }
            other => return Err(Error::Usage(format!("Unknown switch '{}'", other))),
        };

        Ok(Self {
            server: server.to_string(),
            action,
        })
    }
}

/// Successful result of a controller operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Display name of the server the operation ran on
    pub server: String,
    /// Human readable description of what happened
    pub message: String,
}

impl Outcome {
    pub(crate) fn new(server: &str, message: impl Into<String>) -> Self {
        Self {
            server: server.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switches() {
        assert_eq!(ServerCommand::parse("alpha START").unwrap().action, Action::Start);
        assert_eq!(ServerCommand::parse("alpha stop").unwrap().action, Action::Stop);
        assert_eq!(ServerCommand::parse("alpha restart").unwrap().action, Action::Restart);
        assert_eq!(ServerCommand::parse("alpha update").unwrap().action, Action::Update);
        assert_eq!(ServerCommand::parse("  alpha   info ").unwrap().action, Action::Info);
    }

    #[test]
    fn test_parse_set_keeps_rest_of_line() {
        let cmd = ServerCommand::parse("Alpha set executable /opt/java 17/bin/java").unwrap();
        assert_eq!(
            cmd.action,
            Action::Set {
                key: "executable".to_string(),
                value: "/opt/java 17/bin/java".to_string()
            }
        );

        let cleared = ServerCommand::parse("Alpha set port").unwrap();
        assert_eq!(
            cleared.action,
            Action::Set {
                key: "port".to_string(),
                value: String::new()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(ServerCommand::parse(""), Err(Error::Usage(_))));
        assert!(matches!(ServerCommand::parse("alpha"), Err(Error::Usage(_))));
        assert!(matches!(ServerCommand::parse("alpha set"), Err(Error::Usage(_))));
        assert_eq!(
            ServerCommand::parse("alpha launch"),
            Err(Error::Usage("Unknown switch 'launch'".to_string()))
        );
    }
}
