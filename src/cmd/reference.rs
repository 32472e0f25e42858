//! Reference data commands: `gearguard equipment`, `gearguard teams`.

use anyhow::Result;
use gearguard::config::GearGuardConfig;
use gearguard::ui::render;

use super::workspace::Workspace;

pub async fn cmd_equipment(config: &GearGuardConfig, search: Option<&str>) -> Result<()> {
    let workspace = Workspace::connect(config)?;
    let catalog = workspace.catalog().await?;
    print!("{}", render::equipment_table(&catalog, search.unwrap_or("")));
    Ok(())
}

pub async fn cmd_teams(config: &GearGuardConfig) -> Result<()> {
    let workspace = Workspace::connect(config)?;
    let catalog = workspace.catalog().await?;
    print!("{}", render::teams_table(&catalog));
    Ok(())
}
