//! archipelago-server binary
//!
//! Generates a world and serves it over websockets until Ctrl-C.
//!
//! ## Configuration
//!
//! Settings load from an optional TOML file and `ARCHIPELAGO__*` variables
//! (see `archipelago::config`); the flags below override both.
//!
//! | Flag / env                 | Default    | Description                    |
//! |----------------------------|------------|--------------------------------|
//! | `--config` `ARCHIPELAGO_CONFIG` | none  | TOML settings file             |
//! | `--bind` `ARCHIPELAGO_BIND`     | `0.0.0.0` | Listen address             |
//! | `--port` `ARCHIPELAGO_PORT`     | `5000`    | Listen port                |
//! | `--seed` `ARCHIPELAGO_SEED`     | random    | World generation seed      |

use std::path::PathBuf;

use anyhow::{Context, Result};
use archipelago::{ServerSettings, SyncServer, WorldServer};
use clap::Parser;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "archipelago-server", about = "Archipelago world server", version)]
struct Args {
    /// TOML settings file
    #[arg(long, env = "ARCHIPELAGO_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = "ARCHIPELAGO_BIND")]
    bind: Option<String>,

    /// Listen port
    #[arg(long, env = "ARCHIPELAGO_PORT")]
    port: Option<u16>,

    /// World generation seed
    #[arg(long, env = "ARCHIPELAGO_SEED")]
    seed: Option<u64>,
}

impl Args {
    fn apply(self, settings: &mut ServerSettings) {
        if let Some(bind) = self.bind {
            settings.bind = bind;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.seed.is_some() {
            settings.world.seed = self.seed;
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("archipelago=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut settings =
        ServerSettings::load(args.config.as_deref()).context("Failed to load settings")?;
    args.apply(&mut settings);

    log::info!(
        "Starting archipelago-server (addr={}, seed={:?}, heartbeat={}s)",
        settings.addr(),
        settings.world.seed,
        settings.heartbeat_secs,
    );

    let server = SyncServer::new(settings).context("World generation failed")?;
    log::info!("World digest {}", server.grid().digest());

    let handle = WorldServer::new(server).start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    log::info!("Shutting down (SIGINT)");
    handle.stop().await;
    Ok(())
}
