//! Reference API server command: `gearguard serve`.

use std::path::PathBuf;

use anyhow::Result;
use gearguard::config::GearGuardConfig;
use gearguard::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    config: &GearGuardConfig,
    port: Option<u16>,
    bind: Option<String>,
    data: Option<PathBuf>,
    no_seed: bool,
    dev: bool,
) -> Result<()> {
    config.toml.ensure_valid()?;
    let section = &config.toml.server;
    let server = ServerConfig {
        bind: bind.unwrap_or_else(|| section.bind.clone()),
        port: port.unwrap_or(section.port),
        data_path: data.or_else(|| section.data_path.clone()),
        seed: section.seed && !no_seed,
        dev_mode: dev || section.dev_mode,
        jwt_secret: section.jwt_secret.clone(),
        ..ServerConfig::default()
    };
    println!(
        "GearGuard API starting on http://{}/api/v1",
        server.addr()
    );
    start_server(server).await
}
