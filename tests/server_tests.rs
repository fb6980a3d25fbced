#![cfg(unix)]

use fleet_runner::config::ServerProperties;
use fleet_runner::error::{Error, Result};
use fleet_runner::server::{ProcessSupervisor, RunState, ServerInstance};
use fleet_runner::store::JsonFileStore;
use fleet_runner::{FleetContext, FleetController, ServerRegistry};
use std::sync::Arc;

fn sleeper(dir: &std::path::Path, name: &str) -> ServerProperties {
    let mut props = ServerProperties::new(name, "sleep.sh");
    props.server_type = fleet_runner::ServerType::Custom;
    props.executable = "sh".to_string();
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("sleep.sh"), "exec sleep 30\n").unwrap();
    props
}

fn controller(dir: &std::path::Path, names: &[&str]) -> FleetController {
    let mut registry = ServerRegistry::new();
    for name in names {
        let root = dir.join(name);
        registry
            .register(ServerInstance::with_root(sleeper(&root, name), root))
            .unwrap();
    }
    FleetController::new(FleetContext {
        registry,
        store: Arc::new(JsonFileStore::new(dir.join("settings"))),
        provisioner: None,
    })
}

#[tokio::test]
async fn test_custom_server_launch() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let props = sleeper(dir.path(), "Worker");
    let mut supervisor = ProcessSupervisor::new("Worker");

    supervisor.start(&props.launch_spec(dir.path())).await?;
    assert_eq!(supervisor.refresh(), RunState::Running);
    supervisor.stop().await?;
    assert_eq!(supervisor.state(), RunState::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_racing_starts_on_one_server() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let ctl = controller(dir.path(), &["Alpha"]);

    let (a, b) = tokio::join!(ctl.start("Alpha"), ctl.start("alpha"));
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| *r == Err(Error::AlreadyRunning("Alpha".to_string()))));

    let (stop, start) = tokio::join!(ctl.stop("Alpha"), ctl.start("Alpha"));
    // whichever ran second saw a consistent state
    match ctl.info("Alpha").await?.run_state {
        RunState::Stopped => {
            assert!(stop.is_ok());
            assert_eq!(start, Err(Error::AlreadyRunning("Alpha".to_string())));
        }
        RunState::Running => {
            assert!(stop.is_ok());
            assert!(start.is_ok());
        }
        other => panic!("transient state leaked: {:?}", other),
    }

    ctl.stop_all().await
}

#[tokio::test]
async fn test_servers_are_independent() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let ctl = controller(dir.path(), &["Alpha", "Beta"]);

    let (a, b) = tokio::join!(ctl.start("Alpha"), ctl.start("Beta"));
    a?;
    b?;

    ctl.stop("Beta").await?;
    let states: Vec<_> = ctl.list().await?.into_iter().map(|i| i.run_state).collect();
    assert_eq!(states, vec![RunState::Running, RunState::Stopped]);

    ctl.stop_all().await?;
    // nothing left to stop
    ctl.stop_all().await
}
