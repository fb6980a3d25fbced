// src/server/process.rs
use crate::config::LaunchSpec;
use crate::error::{Error, Result};
use async_process::{Child, Command, Stdio};
use futures_lite::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use futures_lite::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::ExitStatus;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Unique identifier for a managed server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(Uuid);

impl ServerId {
    // Fresh ids are only minted for new servers within the crate
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID, e.g. one read back from storage
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::ConfigParse(format!("Invalid server id '{}': {}", s, e)))
    }
}

/// Run state of a server process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// No process is running
    Stopped,
    /// A process is being launched
    Starting,
    /// The process is running
    Running,
    /// The process is being terminated
    Stopping,
}

impl RunState {
    pub fn is_running(self) -> bool {
        self == RunState::Running
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Owns the OS process of one server and enforces its state transitions.
///
/// ```text
/// Stopped --start--> Starting --spawned--> Running
/// Running --stop--> Stopping --exited--> Stopped
/// ```
///
/// A process that exits on its own is noticed by [`ProcessSupervisor::refresh`],
/// which every operation calls before checking the current state.
pub struct ProcessSupervisor {
    /// Server name, used for diagnostics
    name: String,
    /// Child process
    child: Option<Child>,
    /// Current state
    state: RunState,
    /// Tasks forwarding stdout/stderr to tracing
    output_tasks: Vec<JoinHandle<()>>,
    /// Console shutdown request of the running process and its grace period
    stop_request: Option<(String, Duration)>,
}

impl ProcessSupervisor {
    /// Create a supervisor with no process
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            child: None,
            state: RunState::Stopped,
            output_tasks: Vec::new(),
            stop_request: None,
        }
    }

    /// Get the last observed state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// OS process id, if a process is running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(|c| c.id())
    }

    /// Poll the child and return the up-to-date state.
    pub fn refresh(&mut self) -> RunState {
        if let Some(child) = &mut self.child {
            match child.try_status() {
                Ok(Some(status)) => {
                    tracing::warn!(server_name = %self.name, %status, "Server process exited on its own");
                    self.child = None;
                    self.stop_request = None;
                    self.state = RunState::Stopped;
                    self.output_tasks.clear();
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(server_name = %self.name, error = %e, "Failed to poll server process");
                }
            }
        }
        self.state
    }

    fn check_transition(&mut self, want_running: bool) -> Result<()> {
        match (self.refresh(), want_running) {
            (RunState::Starting | RunState::Stopping, _) => Err(Error::Busy(self.name.clone())),
            (RunState::Running, false) => Err(Error::AlreadyRunning(self.name.clone())),
            (RunState::Stopped, true) => Err(Error::NotRunning(self.name.clone())),
            _ => Ok(()),
        }
    }

    /// Launch the server process
    #[tracing::instrument(skip(self, spec), fields(server_name = %self.name, command = %spec.command))]
    pub async fn start(&mut self, spec: &LaunchSpec) -> Result<()> {
        self.check_transition(false)?;
        self.launch(spec)
    }

    fn launch(&mut self, spec: &LaunchSpec) -> Result<()> {
        self.state = RunState::Starting;

        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .current_dir(&spec.working_dir)
            .stdin(if spec.stop_command.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.state = RunState::Stopped;
                tracing::error!(error = %e, "Failed to spawn server process");
                return Err(Error::StartFailed(format!("{}: {}", spec.command, e)));
            }
        };

        // A launcher that rejects its arguments usually dies immediately
        if let Ok(Some(status)) = child.try_status() {
            if !status.success() {
                self.state = RunState::Stopped;
                tracing::error!(%status, "Server process exited during launch");
                return Err(Error::StartFailed(format!(
                    "{} exited during launch with {}",
                    spec.command, status
                )));
            }
        }

        if let Some(stdout) = child.stdout.take() {
            self.output_tasks.push(forward_output(self.name.clone(), "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            self.output_tasks.push(forward_output(self.name.clone(), "stderr", stderr));
        }

        tracing::info!(pid = child.id(), "Server process launched");
        self.stop_request = spec
            .stop_command
            .clone()
            .map(|command| (command, spec.stop_timeout));
        self.child = Some(child);
        self.state = RunState::Running;
        Ok(())
    }

    /// Stop the server process and wait for it to exit
    #[tracing::instrument(skip(self), fields(server_name = %self.name))]
    pub async fn stop(&mut self) -> Result<()> {
        self.check_transition(true)?;
        self.terminate().await
    }

    /// Stop and start again as one operation.
    ///
    /// The caller holds `&mut self` throughout, so nothing can observe the
    /// stopped state in between.
    #[tracing::instrument(skip(self, spec), fields(server_name = %self.name))]
    pub async fn restart(&mut self, spec: &LaunchSpec) -> Result<()> {
        self.check_transition(true)?;
        self.terminate().await?;
        self.launch(spec)
    }

    async fn terminate(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            self.state = RunState::Stopped;
            return Err(Error::NotRunning(self.name.clone()));
        };
        self.state = RunState::Stopping;

        if let Some((command, grace)) = self.stop_request.take() {
            match request_shutdown(&mut child, &command, grace).await {
                Some(status) => {
                    self.state = RunState::Stopped;
                    self.output_tasks.clear();
                    tracing::info!(%status, "Server process shut down");
                    return Ok(());
                }
                None => tracing::warn!(?grace, "Server ignored shutdown request, killing"),
            }
        }

        if let Err(e) = child.kill() {
            // kill fails if the process is already gone
            if !matches!(child.try_status(), Ok(Some(_))) {
                self.child = Some(child);
                self.state = RunState::Running;
                return Err(Error::Process(format!("Failed to kill process: {}", e)));
            }
        }

        let status = child.status().await;
        self.state = RunState::Stopped;
        // Readers end on their own once the pipes close
        self.output_tasks.clear();

        match status {
            Ok(status) => {
                tracing::info!(%status, "Server process terminated");
                Ok(())
            }
            Err(e) => Err(Error::Process(format!("Failed to wait for process: {}", e))),
        }
    }
}

/// Write `command` to the child's console and wait up to `grace` for it to exit.
///
/// Returns `None` if the process is still running afterwards.
async fn request_shutdown(
    child: &mut Child,
    command: &str,
    grace: Duration,
) -> Option<ExitStatus> {
    let mut stdin = child.stdin.take()?;
    if let Err(e) = stdin.write_all(format!("{}\n", command).as_bytes()).await {
        tracing::debug!(error = %e, "Failed to write shutdown command");
    }
    let _ = stdin.flush().await;
    drop(stdin);

    match tokio::time::timeout(grace, child.status()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Failed to wait for shutdown");
            None
        }
        Err(_) => None,
    }
}

fn forward_output<R>(name: String, stream: &'static str, reader: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => tracing::debug!(server_name = %name, stream, "{}", line),
                Err(e) => {
                    tracing::trace!(server_name = %name, stream, error = %e, "Output stream closed");
                    break;
                }
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec(command: &str, args: &[&str]) -> LaunchSpec {
        LaunchSpec {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: HashMap::new(),
            working_dir: std::env::temp_dir(),
            stop_command: None,
            stop_timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_start_stop_transitions() -> Result<()> {
        let mut supervisor = ProcessSupervisor::new("sleeper");
        assert_eq!(supervisor.state(), RunState::Stopped);

        supervisor.start(&spec("sleep", &["30"])).await?;
        assert_eq!(supervisor.state(), RunState::Running);
        assert!(supervisor.pid().is_some());

        let again = supervisor.start(&spec("sleep", &["30"])).await;
        assert_eq!(again, Err(Error::AlreadyRunning("sleeper".to_string())));

        supervisor.stop().await?;
        assert_eq!(supervisor.state(), RunState::Stopped);
        assert_eq!(supervisor.pid(), None);

        assert_eq!(
            supervisor.stop().await,
            Err(Error::NotRunning("sleeper".to_string()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_restart_replaces_process() -> Result<()> {
        let mut supervisor = ProcessSupervisor::new("sleeper");
        assert!(matches!(
            supervisor.restart(&spec("sleep", &["30"])).await,
            Err(Error::NotRunning(_))
        ));

        supervisor.start(&spec("sleep", &["30"])).await?;
        let first = supervisor.pid();
        supervisor.restart(&spec("sleep", &["30"])).await?;
        assert_eq!(supervisor.state(), RunState::Running);
        assert_ne!(supervisor.pid(), first);

        supervisor.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_spawn_failure_returns_to_stopped() {
        let mut supervisor = ProcessSupervisor::new("ghost");
        let result = supervisor
            .start(&spec("/nonexistent/fleet-runner-binary", &[]))
            .await;
        assert!(matches!(result, Err(Error::StartFailed(_))));
        assert_eq!(supervisor.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn test_refresh_notices_exit() -> Result<()> {
        let mut supervisor = ProcessSupervisor::new("short");
        supervisor.start(&spec("sleep", &["0.2"])).await?;
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(supervisor.refresh(), RunState::Stopped);
        assert!(supervisor.output_tasks.is_empty());

        // crash and relaunch repeatedly without piling up reader tasks
        for _ in 0..3 {
            supervisor.start(&spec("sleep", &["0.1"])).await?;
            tokio::time::sleep(Duration::from_millis(400)).await;
            assert_eq!(supervisor.refresh(), RunState::Stopped);
        }
        assert!(supervisor.output_tasks.is_empty());
        Ok(())
    }

    fn console(script: &str, grace: Duration) -> LaunchSpec {
        let mut spec = spec("sh", &["-c", script]);
        spec.stop_command = Some("stop".to_string());
        spec.stop_timeout = grace;
        spec
    }

    #[tokio::test]
    async fn test_stop_asks_console_first() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("saved");
        let script = format!(
            "while read -r line; do [ \"$line\" = stop ] && touch '{}' && exit 0; done",
            marker.display()
        );

        let mut supervisor = ProcessSupervisor::new("console");
        supervisor.start(&console(&script, Duration::from_secs(10))).await?;
        supervisor.stop().await?;

        assert_eq!(supervisor.state(), RunState::Stopped);
        assert!(marker.exists(), "process was killed before handling stop");
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_kills_after_grace_period() -> Result<()> {
        let mut supervisor = ProcessSupervisor::new("stubborn");
        // never reads its console
        supervisor
            .start(&console("exec sleep 30", Duration::from_millis(200)))
            .await?;

        let started = std::time::Instant::now();
        supervisor.stop().await?;
        assert_eq!(supervisor.state(), RunState::Stopped);
        assert!(started.elapsed() < Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn test_server_id_parse() {
        let id = ServerId::new();
        let parsed: ServerId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ServerId>().is_err());
    }
}
