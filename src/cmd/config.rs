//! `gearguard config [show|validate|init]`.

use anyhow::{Context, Result, bail};
use console::style;
use gearguard::config::{GearGuardConfig, GearGuardToml, LOCAL_CONFIG_FILE};
use gearguard::ui::icons::{CHECK, CROSS, WARN};

use crate::ConfigCommands;

pub fn cmd_config(config: &GearGuardConfig, command: Option<ConfigCommands>) -> Result<()> {
    match command.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => show(config),
        ConfigCommands::Validate => validate(config),
        ConfigCommands::Init => init(),
    }
}

fn show(config: &GearGuardConfig) -> Result<()> {
    match &config.source {
        Some(path) => println!("{} {}", style("Source:").bold(), path.display()),
        None => println!("{} built-in defaults", style("Source:").bold()),
    }
    println!();
    let rendered =
        toml::to_string_pretty(&config.toml.redacted()).context("Failed to render configuration")?;
    print!("{}", rendered);
    if config.token.is_some() {
        println!();
        println!("{}Session token supplied via GEARGUARD_TOKEN", WARN);
    }
    Ok(())
}

fn validate(config: &GearGuardConfig) -> Result<()> {
    let problems = config.toml.validate();
    if problems.is_empty() {
        println!("{}Configuration is valid", CHECK);
        return Ok(());
    }
    for problem in &problems {
        eprintln!("{}{}", CROSS, problem);
    }
    bail!("Configuration has {} problem(s)", problems.len());
}

fn init() -> Result<()> {
    let path = std::env::current_dir()
        .context("Failed to read current directory")?
        .join(LOCAL_CONFIG_FILE);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    GearGuardToml::default().save(&path)?;
    println!("{}Wrote {}", CHECK, path.display());
    Ok(())
}
