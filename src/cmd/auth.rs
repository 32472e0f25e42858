//! Session commands: `gearguard login`, `signup`, `logout`.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Password};
use gearguard::client::AuthApi;
use gearguard::config::{self, GearGuardConfig};
use gearguard::models::AuthSession;
use gearguard::ui::icons::CHECK;

use super::workspace::{Workspace, session_file};

fn prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Input::<String>::new()
            .with_prompt(label)
            .interact_text()
            .with_context(|| format!("Failed to read {}", label.to_lowercase())),
    }
}

fn prompt_password(value: Option<String>, confirm: bool) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    let mut password = Password::new().with_prompt("Password");
    if confirm {
        password = password.with_confirmation("Confirm password", "Passwords do not match");
    }
    password.interact().context("Failed to read password")
}

fn remember(session: &AuthSession) -> Result<()> {
    let path = session_file()?;
    config::save_session(&path, &session.token)?;
    tracing::debug!(path = %path.display(), "saved session");
    Ok(())
}

pub async fn cmd_login(
    config: &GearGuardConfig,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let email = prompt(email, "Email")?;
    let password = prompt_password(password, false)?;

    let workspace = Workspace::connect(config)?;
    let session = workspace
        .client
        .login(&email, &password)
        .await
        .context("Login failed")?;
    remember(&session)?;

    println!(
        "{}Logged in as {} <{}>",
        CHECK,
        style(&session.user.name).bold(),
        session.user.email
    );
    Ok(())
}

pub async fn cmd_signup(
    config: &GearGuardConfig,
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let name = prompt(name, "Name")?;
    let email = prompt(email, "Email")?;
    let password = prompt_password(password, true)?;

    let workspace = Workspace::connect(config)?;
    let session = workspace
        .client
        .register(&name, &email, &password)
        .await
        .context("Signup failed")?;
    remember(&session)?;

    println!(
        "{}Account created. Logged in as {}",
        CHECK,
        style(&session.user.name).bold()
    );
    Ok(())
}

pub async fn cmd_logout(config: &GearGuardConfig) -> Result<()> {
    let workspace = Workspace::connect(config)?;
    if let Err(e) = workspace.client.logout().await {
        // The local session is cleared either way.
        tracing::warn!(error = %e, "server logout failed");
    }
    config::clear_session(&session_file()?)?;
    println!("{}Logged out", CHECK);
    Ok(())
}
