//! Human-readable snapshot output.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use colored::Colorize;
use kontrol_application::TickReport;
use kontrol_core::snapshot::{Domain, LinkState, Snapshot};

fn link_label(link: LinkState) -> String {
    match link {
        LinkState::Connected => "connected".green().to_string(),
        LinkState::Disconnected => "disconnected".red().to_string(),
        LinkState::Unconfigured => "not configured".yellow().to_string(),
        LinkState::Uninitialized => "waiting".dimmed().to_string(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

/// One line per publish: time, link state, counts and the domains that changed.
pub fn summary_line(snapshot: &Snapshot, changed: &[Domain]) -> String {
    let time = snapshot
        .last_updated
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let mut line = format!(
        "[{}] {} | {} sessions | {} jobs",
        time,
        link_label(snapshot.link),
        snapshot.sessions.len(),
        snapshot.jobs.len()
    );
    if !changed.is_empty() {
        let names: Vec<String> = changed.iter().map(Domain::to_string).collect();
        let _ = write!(line, " | changed: {}", names.join(", "));
    }
    line
}

pub fn status_report(
    snapshot: &Snapshot,
    report: &TickReport,
    runtime: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Gateway:".bold(), link_label(snapshot.link));
    for (domain, kind) in &report.failed {
        let _ = writeln!(out, "  {} {} ({})", "✗".red(), domain, kind);
    }
    for (key, value) in runtime {
        let _ = writeln!(out, "  {}: {}", key, value);
    }
    if runtime.is_empty()
        && let Some(status) = snapshot.status.as_deref()
    {
        let _ = writeln!(out, "  {}", first_line(status));
    }

    let _ = writeln!(out, "\n{} ({})", "Sessions".bold(), snapshot.sessions.len());
    for session in snapshot.sessions.iter() {
        let tokens = session
            .total_tokens
            .map(|t| format!("{} tokens", t))
            .unwrap_or_default();
        let updated = session
            .updated_at_utc()
            .filter(|_| session.updated_at > 0)
            .map(|t| t.with_timezone(&chrono::Local).format("%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<32} {:<16} {:<11} {}",
            session.title(),
            session.model,
            updated,
            tokens
        );
    }

    let _ = writeln!(out, "\n{} ({})", "Jobs".bold(), snapshot.jobs.len());
    for job in snapshot.jobs.iter() {
        let marker = if job.enabled { "●".green() } else { "○".dimmed() };
        let name = if job.name.is_empty() { &job.id } else { &job.name };
        let _ = writeln!(out, "  {} {:<32} {}", marker, name, job.schedule_display());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kontrol_core::session::GatewaySession;
    use std::sync::Arc;

    #[test]
    fn test_summary_line_lists_changed_domains() {
        colored::control::set_override(false);
        let snapshot = Snapshot {
            sessions: Arc::new(vec![GatewaySession::new("main", 1)]),
            link: LinkState::Connected,
            ..Snapshot::default()
        };
        let line = summary_line(&snapshot, &[Domain::Sessions, Domain::Status]);
        assert_eq!(
            line,
            "[--:--:--] connected | 1 sessions | 0 jobs | changed: sessions, status"
        );
    }

    #[test]
    fn test_status_report_falls_back_to_status_text() {
        colored::control::set_override(false);
        let snapshot = Snapshot {
            status: Some(Arc::from("\nGateway healthy\nmore")),
            link: LinkState::Disconnected,
            ..Snapshot::default()
        };
        let out = status_report(&snapshot, &TickReport::default(), &BTreeMap::new());
        assert!(out.starts_with("Gateway: disconnected\n  Gateway healthy\n"));
        assert!(out.contains("Sessions (0)"));
    }

    #[test]
    fn test_status_report_marks_unknown_update_time() {
        colored::control::set_override(false);
        let snapshot = Snapshot {
            sessions: Arc::new(vec![GatewaySession::new("main", 0)]),
            ..Snapshot::default()
        };
        let out = status_report(&snapshot, &TickReport::default(), &BTreeMap::new());
        let row = out
            .lines()
            .find(|l| l.trim_start().starts_with("main"))
            .unwrap();
        assert!(row.contains(" - "));
    }
}
