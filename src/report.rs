use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config;
use crate::ledger::ScanEntry;
use crate::session::SessionTracker;
use crate::timer::format_hms;

const PERSIST_INTERVAL: Duration = Duration::from_secs(10);

/// Point-in-time summary of the active session, persisted to the
/// floortrack home as JSON and Markdown while a session runs and once more
/// on exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub generated_at: DateTime<Utc>,
    pub user_name: String,
    pub activity_type: String,
    pub started_at: DateTime<Utc>,
    pub target_day: f64,
    pub target_cycle_time: Option<f64>,
    pub current_cycle_time: Option<f64>,
    pub scan_count: u32,
    pub elapsed_seconds: i64,
    pub recent_scans: Vec<String>,
}

/// Builds a report from the tracker, or `None` when no session is active.
pub fn build_report(tracker: &SessionTracker, now: DateTime<Utc>) -> Option<SessionReport> {
    let session = tracker.session()?;
    Some(SessionReport {
        generated_at: now,
        user_name: tracker.context().user_name.clone(),
        activity_type: session.activity_type.clone(),
        started_at: session.started_at,
        target_day: session.target_day,
        target_cycle_time: tracker.target_cycle_time().seconds(),
        current_cycle_time: tracker.current_cycle_time(now).seconds(),
        scan_count: tracker.scan_count(),
        elapsed_seconds: tracker.elapsed_seconds(now),
        recent_scans: tracker
            .recent_scans()
            .into_iter()
            .map(|entry: ScanEntry| entry.code)
            .collect(),
    })
}

pub struct ReportWriter {
    last_persist_at: Option<Instant>,
}

impl ReportWriter {
    pub fn new() -> Self {
        Self {
            last_persist_at: None,
        }
    }

    pub fn persist_if_due(&mut self, report: &SessionReport) {
        if let Some(last) = self.last_persist_at
            && last.elapsed() < PERSIST_INTERVAL
        {
            return;
        }
        self.last_persist_at = Some(Instant::now());
        persist_json(report);
        persist_markdown(report);
    }

    pub fn persist_now(&mut self, report: &SessionReport) {
        self.last_persist_at = Some(Instant::now());
        persist_json(report);
        persist_markdown(report);
    }
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn persist_json(report: &SessionReport) {
    let path = config::floortrack_home().join("session-report.json");
    let tmp = config::floortrack_home().join("session-report.json.tmp");
    match serde_json::to_string_pretty(report) {
        Ok(data) => {
            if let Err(err) = std::fs::write(&tmp, data) {
                warn!(error = %err, "failed to write session report JSON tmp");
                return;
            }
            if let Err(err) = std::fs::rename(&tmp, &path) {
                warn!(error = %err, "failed to move session report JSON into place");
            }
        }
        Err(err) => warn!(error = %err, "failed to serialize session report JSON"),
    }
}

fn persist_markdown(report: &SessionReport) {
    let path = config::floortrack_home().join("session-report.md");
    let tmp = config::floortrack_home().join("session-report.md.tmp");
    let markdown = generate_markdown(report);
    if let Err(err) = std::fs::write(&tmp, markdown) {
        warn!(error = %err, "failed to write session report markdown tmp");
        return;
    }
    if let Err(err) = std::fs::rename(&tmp, &path) {
        warn!(error = %err, "failed to move session report markdown into place");
    }
}

fn generate_markdown(report: &SessionReport) -> String {
    let now_local = Local::now().format("%b %d, %Y %I:%M %p");
    let cycle = |value: Option<f64>| match value {
        Some(seconds) => format!("{seconds:.2}s"),
        None => "N/A".to_string(),
    };
    let target = if report.target_day.is_finite() && report.target_day > 0.0 {
        report.target_day.to_string()
    } else {
        "N/A".to_string()
    };

    let mut markdown = String::new();
    markdown.push_str("# Floortrack Session Report\n\n");
    markdown.push_str(&format!("*Generated: {now_local}*\n\n"));

    markdown.push_str("## Session\n\n");
    markdown.push_str("| Field | Value |\n");
    markdown.push_str("|-------|-------|\n");
    markdown.push_str(&format!("| Operator | {} |\n", report.user_name));
    markdown.push_str(&format!("| Activity | {} |\n", report.activity_type));
    markdown.push_str(&format!(
        "| Started | {} |\n",
        report.started_at.with_timezone(&Local).format("%H:%M:%S")
    ));
    markdown.push_str(&format!(
        "| Duration | {} |\n",
        format_hms(report.elapsed_seconds)
    ));
    markdown.push_str(&format!("| Target/day | {target} |\n"));
    markdown.push_str(&format!(
        "| Target cycle time | {} |\n",
        cycle(report.target_cycle_time)
    ));
    markdown.push_str(&format!(
        "| Current cycle time | {} |\n",
        cycle(report.current_cycle_time)
    ));
    markdown.push_str(&format!("| Output | {} |\n", report.scan_count));
    markdown.push('\n');

    if !report.recent_scans.is_empty() {
        markdown.push_str("## Recent Scans\n\n");
        for code in &report.recent_scans {
            markdown.push_str(&format!("- {code}\n"));
        }
        markdown.push('\n');
    }

    markdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionContext, SessionTracker};

    fn tracker() -> SessionTracker {
        let catalog = serde_json::from_str(
            r#"[{"id": 1, "activity_type": "welding", "target_day": 100}]"#,
        )
        .expect("catalog");
        SessionTracker::new(
            SessionContext {
                user_id: "7".to_string(),
                user_name: "Jordan Mills".to_string(),
            },
            catalog,
            28_880,
        )
    }

    #[test]
    fn no_report_without_an_active_session() {
        let tracker = tracker();
        assert!(build_report(&tracker, Utc::now()).is_none());
    }

    #[test]
    fn report_carries_session_and_cycle_state() {
        let mut tracker = tracker();
        tracker.select_activity("welding");
        let started = tracker.session().expect("session").started_at;
        let now = started + chrono::Duration::seconds(90);

        let report = build_report(&tracker, now).expect("report");
        assert_eq!(report.activity_type, "welding");
        assert_eq!(report.user_name, "Jordan Mills");
        assert_eq!(report.elapsed_seconds, 90);
        assert_eq!(report.target_cycle_time, Some(288.80));
        // No scans yet.
        assert_eq!(report.current_cycle_time, None);
        assert_eq!(report.scan_count, 0);
    }

    #[test]
    fn markdown_contains_expected_sections() {
        let report = SessionReport {
            generated_at: Utc::now(),
            user_name: "Jordan Mills".to_string(),
            activity_type: "welding".to_string(),
            started_at: Utc::now(),
            target_day: 100.0,
            target_cycle_time: Some(288.8),
            current_cycle_time: Some(30.0),
            scan_count: 3,
            elapsed_seconds: 90,
            recent_scans: vec!["A2".to_string(), "A1".to_string()],
        };

        let markdown = generate_markdown(&report);
        assert!(markdown.contains("# Floortrack Session Report"));
        assert!(markdown.contains("## Session"));
        assert!(markdown.contains("| Target cycle time | 288.80s |"));
        assert!(markdown.contains("| Duration | 00:01:30 |"));
        assert!(markdown.contains("## Recent Scans"));
        assert!(markdown.contains("- A2"));
    }

    #[test]
    fn markdown_degrades_missing_values_to_na() {
        let report = SessionReport {
            generated_at: Utc::now(),
            user_name: "Jordan Mills".to_string(),
            activity_type: "packing".to_string(),
            started_at: Utc::now(),
            target_day: f64::NAN,
            target_cycle_time: None,
            current_cycle_time: None,
            scan_count: 0,
            elapsed_seconds: 0,
            recent_scans: Vec::new(),
        };

        let markdown = generate_markdown(&report);
        assert!(markdown.contains("| Target/day | N/A |"));
        assert!(markdown.contains("| Target cycle time | N/A |"));
        assert!(!markdown.contains("## Recent Scans"));
    }
}
