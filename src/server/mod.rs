/// Server management module for Fleet Runner.
///
/// This module handles the identity, lifecycle and process management of the
/// servers in a fleet. All public components are instrumented with `tracing` spans.
///
/// # Components
///
/// * `instance` - A named server with its settings, root directory and process
/// * `lifecycle` - Bounded history of lifecycle events
/// * `process` - State machine around one OS process
///
/// # Examples
///
/// Supervising a process directly:
///
/// ```no_run
/// use fleet_runner::config::ServerProperties;
/// use fleet_runner::server::{ProcessSupervisor, RunState};
/// use std::path::Path;
///
/// # async fn run() -> fleet_runner::Result<()> {
/// let props = ServerProperties::new("Alpha", "server.jar");
/// let mut supervisor = ProcessSupervisor::new("Alpha");
///
/// supervisor.start(&props.launch_spec(Path::new("/srv/alpha"))).await?;
/// assert_eq!(supervisor.state(), RunState::Running);
/// supervisor.stop().await?;
/// # Ok(())
/// # }
/// ```
mod instance;
pub mod lifecycle;
mod process;

pub use instance::{InstanceState, ServerInstance};
pub use lifecycle::{ServerEvent, ServerLifecycleEvent, ServerLifecycleManager};
pub use process::{ProcessSupervisor, RunState, ServerId};
