//! Request commands: list, board, show, create, move, edit and delete.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use console::style;
use dialoguer::Confirm;
use gearguard::board::{BoardLayout, DragController};
use gearguard::client::ReferenceCatalog;
use gearguard::config::GearGuardConfig;
use gearguard::errors::BoardError;
use gearguard::executor::StatusChange;
use gearguard::models::{MaintenanceRequest, NewRequest, RequestStatus};
use gearguard::projection::{LiveProjection, ViewQuery, ViewStats, parse_filter, project};
use gearguard::ui::Spinner;
use gearguard::ui::icons::{CHECK, CROSS, UNDO};
use gearguard::ui::render::{self, short_id};

use super::workspace::{Workspace, explain};
use crate::{EditArgs, FilterArgs};

fn view_query(filters: &FilterArgs) -> Result<ViewQuery> {
    Ok(ViewQuery {
        search: filters.search.trim().to_string(),
        status: parse_filter(&filters.status).map_err(|e| anyhow!(e))?,
        priority: parse_filter(&filters.priority).map_err(|e| anyhow!(e))?,
        kind: parse_filter(&filters.kind).map_err(|e| anyhow!(e))?,
        team: filters.team.clone().filter(|t| !t.trim().is_empty()),
        sort: filters.sort,
    })
}

async fn loaded(config: &GearGuardConfig) -> Result<(Workspace, Arc<ReferenceCatalog>)> {
    let workspace = Workspace::connect(config)?;
    let spinner = Spinner::start("Loading requests...");
    let catalog = workspace.load().await;
    spinner.finish();
    Ok((workspace, catalog?))
}

pub async fn cmd_list(config: &GearGuardConfig, filters: &FilterArgs) -> Result<()> {
    let query = view_query(filters)?;
    let (workspace, catalog) = loaded(config).await?;

    let (records, _) = workspace.executor.store().snapshot();
    let view = project(&records, &catalog, &query);
    print!("{}", render::stats(&ViewStats::of(&view)));
    println!();
    print!(
        "{}",
        render::request_table(&view, &catalog, |id| workspace.executor.is_updating(id))
    );
    Ok(())
}

pub async fn cmd_board(config: &GearGuardConfig, filters: &FilterArgs) -> Result<()> {
    let query = view_query(filters)?;
    let (workspace, catalog) = loaded(config).await?;

    let mut projection = LiveProjection::new(workspace.executor.store().clone(), query);
    let view = projection.view(&catalog);
    print!("{}", render::stats(&ViewStats::of(view)));
    println!();
    print!("{}", render::board(&BoardLayout::from_view(view), &catalog));
    Ok(())
}

pub async fn cmd_show(config: &GearGuardConfig, id: &str) -> Result<()> {
    let (workspace, catalog) = loaded(config).await?;
    let id = workspace.resolve(id)?;
    let record = workspace
        .executor
        .store()
        .get_by_id(&id)
        .ok_or_else(|| anyhow!("No request with id '{}'", id))?;
    print!("{}", render::detail(&record, &catalog));
    Ok(())
}

pub async fn cmd_create(config: &GearGuardConfig, draft: NewRequest) -> Result<()> {
    let workspace = Workspace::connect(config)?;
    let catalog = workspace.catalog().await?;

    let spinner = Spinner::start("Creating request...");
    let result = workspace.executor.create(draft, &catalog).await;
    spinner.finish();
    let created = result.map_err(explain)?;

    println!(
        "{}Created {} {}",
        CHECK,
        style(short_id(&created.id)).bold(),
        created.subject
    );
    print!("{}", render::detail(&created, &catalog));
    Ok(())
}

pub async fn cmd_move(config: &GearGuardConfig, id: &str, status: RequestStatus) -> Result<()> {
    let (workspace, _) = loaded(config).await?;
    let id = workspace.resolve(id)?;

    let mut board = DragController::new(workspace.executor.clone());
    let spinner = Spinner::start(format!("Moving {} to {}...", short_id(&id), status));
    let result = board.move_card(&id, status).await;
    spinner.finish();

    match result {
        Ok(StatusChange::Applied { id, from, to }) => {
            println!(
                "{}{} moved from {} to {}",
                CHECK,
                style(short_id(&id)).bold(),
                render::status_style(from).apply_to(from.as_str()),
                render::status_style(to).apply_to(to.as_str())
            );
            Ok(())
        }
        Ok(StatusChange::Unchanged { id, status }) => {
            println!(
                "{} is already {}",
                style(short_id(&id)).bold(),
                render::status_style(status).apply_to(status.as_str())
            );
            Ok(())
        }
        Err(BoardError::Mutation(err)) => {
            eprintln!("{}Could not move {}: {}", CROSS, short_id(&id), err);
            if let Some(restored) = workspace.executor.store().get_by_id(&id) {
                eprintln!("{}Card restored to {}", UNDO, restored.status);
            }
            Err(explain(err))
        }
        Err(other) => Err(other.into()),
    }
}

/// `none` clears an optional field.
fn clearable<T>(value: &str, parse: impl FnOnce(&str) -> Result<T>) -> Result<Option<T>> {
    if value.trim().eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        parse(value.trim()).map(Some)
    }
}

fn apply_edits(mut record: MaintenanceRequest, changes: &EditArgs) -> Result<MaintenanceRequest> {
    let before = record.clone();

    if let Some(subject) = &changes.subject {
        record.subject = subject.trim().to_string();
    }
    if let Some(description) = &changes.description {
        record.description = description.clone();
    }
    if let Some(kind) = changes.kind {
        record.kind = kind;
    }
    if let Some(priority) = changes.priority {
        record.priority = priority;
    }
    if let Some(status) = changes.status {
        record.status = status;
    }
    if let Some(equipment) = &changes.equipment {
        record.equipment_id = equipment.as_str().into();
    }
    if let Some(team) = &changes.team {
        record.team_id = team.as_str().into();
    }
    if let Some(technician) = &changes.technician {
        record.technician_id = clearable(technician, |v| Ok(v.into()))?;
    }
    if let Some(scheduled) = &changes.scheduled {
        record.scheduled_date = clearable(scheduled, |v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", v))
        })?;
    }
    if let Some(duration) = &changes.duration {
        record.duration_hours = clearable(duration, |v| {
            let hours: f64 = v
                .parse()
                .with_context(|| format!("Invalid duration '{}'", v))?;
            if hours < 0.0 {
                bail!("Duration cannot be negative");
            }
            Ok(hours)
        })?;
    }

    if record == before {
        bail!("Nothing to change. Pass at least one field flag, e.g. --priority High");
    }
    Ok(record)
}

pub async fn cmd_edit(config: &GearGuardConfig, id: &str, changes: &EditArgs) -> Result<()> {
    let (workspace, catalog) = loaded(config).await?;
    let id = workspace.resolve(id)?;
    let current = workspace
        .executor
        .store()
        .get_by_id(&id)
        .ok_or_else(|| anyhow!("No request with id '{}'", id))?;
    let edited = apply_edits(current, changes)?;

    let spinner = Spinner::start("Saving...");
    let result = workspace.executor.save_edit(edited).await;
    spinner.finish();
    let saved = result.map_err(explain)?;

    println!("{}Saved {}", CHECK, style(short_id(&saved.id)).bold());
    print!("{}", render::detail(&saved, &catalog));
    Ok(())
}

pub async fn cmd_delete(config: &GearGuardConfig, id: &str, yes: bool) -> Result<()> {
    let (workspace, _) = loaded(config).await?;
    let id = workspace.resolve(id)?;
    let subject = workspace
        .executor
        .store()
        .get_by_id(&id)
        .map(|r| r.subject)
        .unwrap_or_default();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {} \"{}\"?", short_id(&id), subject))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    workspace.executor.delete(&id).await.map_err(explain)?;
    println!("{}Deleted {}", CHECK, style(short_id(&id)).bold());
    Ok(())
}
