//! Plain-text rendering of requests, the board and reference data.
//!
//! Every function returns a `String`; commands decide where it is printed.

use std::fmt::Write;

use console::{Alignment, Style, pad_str, style};

use crate::board::BoardLayout;
use crate::client::ReferenceCatalog;
use crate::models::{MaintenanceRequest, Priority, RequestId, RequestStatus};
use crate::projection::ViewStats;
use crate::ui::icons::{CALENDAR, CARD, SYNC, USER, WRENCH};

const SUBJECT_WIDTH: usize = 32;
const EQUIPMENT_WIDTH: usize = 26;
const TEAM_WIDTH: usize = 12;

pub fn short_id(id: &RequestId) -> &str {
    id.as_str().get(..8).unwrap_or(id.as_str())
}

pub fn status_style(status: RequestStatus) -> Style {
    match status {
        RequestStatus::New => Style::new().cyan(),
        RequestStatus::InProgress => Style::new().yellow(),
        RequestStatus::Completed => Style::new().green(),
        RequestStatus::OnHold => Style::new().magenta(),
        RequestStatus::Scrap => Style::new().red().dim(),
    }
}

pub fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::new().red().bold(),
        Priority::Medium => Style::new().yellow(),
        Priority::Low => Style::new().green(),
    }
}

fn cell(text: &str, width: usize) -> String {
    pad_str(text, width, Alignment::Left, Some("…")).into_owned()
}

fn equipment_name<'a>(record: &MaintenanceRequest, catalog: &'a ReferenceCatalog) -> &'a str {
    catalog
        .equipment_by_id(&record.equipment_id)
        .map(|e| e.name.as_str())
        .unwrap_or("(unknown equipment)")
}

/// One row per request, in view order.
pub fn request_table(
    view: &[MaintenanceRequest],
    catalog: &ReferenceCatalog,
    is_updating: impl Fn(&RequestId) -> bool,
) -> String {
    if view.is_empty() {
        return format!("{}\n", style("No requests match.").dim());
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        style(format!(
            "{} {} {} {} {:<8} {:<12} {}",
            cell("ID", 8),
            cell("SUBJECT", SUBJECT_WIDTH),
            cell("EQUIPMENT", EQUIPMENT_WIDTH),
            cell("TEAM", TEAM_WIDTH),
            "PRIORITY",
            "STATUS",
            "CREATED"
        ))
        .bold()
    );
    for record in view {
        let team = catalog.team_name(&record.team_id).unwrap_or("-");
        let marker = if is_updating(&record.id) {
            SYNC.to_string()
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "{} {} {} {} {} {} {}{}",
            style(cell(short_id(&record.id), 8)).dim(),
            cell(&record.subject, SUBJECT_WIDTH),
            cell(equipment_name(record, catalog), EQUIPMENT_WIDTH),
            cell(team, TEAM_WIDTH),
            priority_style(record.priority).apply_to(cell(record.priority.as_str(), 8)),
            status_style(record.status).apply_to(cell(record.status.as_str(), 12)),
            record.created_at.format("%Y-%m-%d"),
            marker
        );
    }
    out
}

/// Lanes stacked vertically, each card on one line.
pub fn board(layout: &BoardLayout, catalog: &ReferenceCatalog) -> String {
    let mut out = String::new();
    for lane in layout.lanes() {
        let _ = writeln!(
            out,
            "{} {}",
            status_style(lane.status).bold().apply_to(lane.status.as_str()),
            style(format!("({})", lane.len())).dim()
        );
        if lane.is_empty() {
            let _ = writeln!(out, "  {}", style("empty").dim());
        }
        for card in &lane.cards {
            let _ = writeln!(
                out,
                "  {}{} {} {} {}",
                CARD,
                style(short_id(&card.id)).dim(),
                cell(&card.subject, SUBJECT_WIDTH),
                priority_style(card.priority).apply_to(card.priority.as_str()),
                style(equipment_name(card, catalog)).dim()
            );
        }
        out.push('\n');
    }
    out
}

pub fn stats(stats: &ViewStats) -> String {
    format!(
        "{} total  {} new  {} in progress  {} completed  {} high priority\n",
        style(stats.total).bold(),
        style(stats.new).cyan(),
        style(stats.in_progress).yellow(),
        style(stats.completed).green(),
        style(stats.high_priority).red().bold()
    )
}

/// Full detail view of one request.
pub fn detail(record: &MaintenanceRequest, catalog: &ReferenceCatalog) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style(&record.subject).bold());
    let _ = writeln!(out, "{}", style(record.id.as_str()).dim());
    let _ = writeln!(
        out,
        "{} · {} · {}",
        status_style(record.status).apply_to(record.status.as_str()),
        priority_style(record.priority).apply_to(record.priority.as_str()),
        record.kind
    );
    out.push('\n');

    if !record.description.is_empty() {
        let _ = writeln!(out, "{}\n", record.description);
    }

    match catalog.equipment_by_id(&record.equipment_id) {
        Some(equipment) => {
            let _ = writeln!(
                out,
                "{}{} ({}) at {}",
                WRENCH, equipment.name, equipment.serial_number, equipment.location
            );
        }
        None => {
            let _ = writeln!(out, "{}{}", WRENCH, record.equipment_id);
        }
    }
    let _ = writeln!(
        out,
        "Team:       {}",
        catalog.team_name(&record.team_id).unwrap_or(record.team_id.as_str())
    );
    let technician = record
        .technician_id
        .as_ref()
        .map(|id| {
            catalog
                .technician_by_id(id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| id.to_string())
        })
        .unwrap_or_else(|| "unassigned".to_string());
    let _ = writeln!(out, "{}Technician: {}", USER, technician);
    if let Some(date) = record.scheduled_date {
        let _ = writeln!(out, "{}Scheduled:  {}", CALENDAR, date);
    }
    if let Some(hours) = record.duration_hours {
        let _ = writeln!(out, "Duration:   {:.1} h", hours);
    }
    let _ = writeln!(
        out,
        "Created:    {}",
        record.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    out
}

pub fn equipment_table(catalog: &ReferenceCatalog, term: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        style(format!(
            "{} {} {} {} {}",
            cell("ID", 6),
            cell("NAME", EQUIPMENT_WIDTH),
            cell("SERIAL", 12),
            cell("LOCATION", 24),
            "TEAM"
        ))
        .bold()
    );
    for equipment in catalog.search_equipment(term) {
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            cell(equipment.id.as_str(), 6),
            cell(&equipment.name, EQUIPMENT_WIDTH),
            cell(&equipment.serial_number, 12),
            cell(&equipment.location, 24),
            catalog
                .team_name(&equipment.maintenance_team_id)
                .unwrap_or("-")
        );
    }
    out
}

pub fn teams_table(catalog: &ReferenceCatalog) -> String {
    let mut out = String::new();
    for team in catalog.teams() {
        let members = catalog
            .equipment()
            .iter()
            .filter(|e| e.maintenance_team_id == team.id)
            .count();
        let _ = writeln!(
            out,
            "{} {} {}",
            cell(team.id.as_str(), 8),
            cell(&team.name, 16),
            style(format!("{} equipment", members)).dim()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::reference::fixtures::catalog;
    use crate::models::fixtures::request;
    use console::strip_ansi_codes;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id(&RequestId::new("0123456789abcdef")), "01234567");
        assert_eq!(short_id(&RequestId::new("r1")), "r1");
    }

    #[test]
    fn test_table_lists_resolved_names() {
        let mut record = request("r1", RequestStatus::InProgress, 0);
        record.subject = "Toner streaks".into();
        let out = request_table(&[record], &catalog(), |_| false);
        let out = strip_ansi_codes(&out);
        assert!(out.contains("Toner streaks"));
        assert!(out.contains("HP LaserJet Pro M404n"));
        assert!(out.contains("IT Support"));
        assert!(out.contains("In Progress"));
    }

    #[test]
    fn test_empty_table() {
        let out = request_table(&[], &catalog(), |_| false);
        assert!(strip_ansi_codes(&out).contains("No requests match"));
    }

    #[test]
    fn test_board_shows_every_lane() {
        let layout = BoardLayout::from_view(&[request("r1", RequestStatus::Scrap, 0)]);
        let out = board(&layout, &catalog());
        let out = strip_ansi_codes(&out);
        for status in RequestStatus::ALL {
            assert!(out.contains(status.as_str()), "missing lane {}", status);
        }
        assert!(out.contains("Scrap (1)"));
        assert!(out.contains("New (0)"));
    }

    #[test]
    fn test_detail_resolves_technician_and_schedule() {
        let mut record = request("r1", RequestStatus::New, 0);
        record.technician_id = Some(crate::models::UserId::new("u-1"));
        record.scheduled_date = chrono::NaiveDate::from_ymd_opt(2025, 4, 2);
        let out = detail(&record, &catalog());
        let out = strip_ansi_codes(&out);
        assert!(out.contains("Maria Lopez"));
        assert!(out.contains("2025-04-02"));
        assert!(out.contains("SN-2024-001"));
    }

    #[test]
    fn test_teams_table_counts_equipment() {
        let out = teams_table(&catalog());
        let out = strip_ansi_codes(&out);
        assert!(out.contains("IT Support"));
        assert!(out.contains("1 equipment"));
    }
}
