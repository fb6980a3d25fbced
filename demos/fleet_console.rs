use fleet_runner::config::FleetConfig;
use fleet_runner::error::Result;
use fleet_runner::provision::{ArtifactCatalog, LocalMirrorCatalog};
use fleet_runner::{command, FleetController};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=fleet_runner=debug
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "demos/fleet.json".to_string());
    let config = FleetConfig::from_file(&config_path)?;

    // Optional directory of pre-fetched artifacts
    let catalog = args
        .next()
        .map(|mirror| Arc::new(LocalMirrorCatalog::new(mirror)) as Arc<dyn ArtifactCatalog>);

    let fleet = FleetController::from_config(config, catalog).await?;
    for (name, result) in fleet.start_auto().await {
        match result {
            Ok(outcome) => println!("{}", outcome),
            Err(e) => println!("{}: {}", name, e),
        }
    }

    println!("server {}", command::USAGE);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "list" {
                    for info in fleet.list().await? {
                        println!("{} [{}] {}", info.display_name, info.id, info.run_state);
                    }
                    continue;
                }
                match fleet.execute(line).await {
                    Ok(outcome) => println!("{}", outcome),
                    Err(e) => println!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    fleet.stop_all().await
}
