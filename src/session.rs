use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::backend::{AssignedActivity, BackendClient, ScanUpload};
use crate::cycle::{self, CycleTime};
use crate::ledger::{ScanEntry, ScanLedger};
use crate::timer::SessionTimer;

/// Operator identity resolved once at startup and treated as read-only
/// input for the life of the console.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Terminal state after `exit_session`; the console returns to the
    /// shell.
    Idle,
    /// Catalog is the only surface; no session is running.
    Selecting,
    /// A timed session is running and accepting scans.
    Active,
}

/// One timed work interval against a single activity. Immutable once
/// started; destroyed on exit.
#[derive(Debug, Clone)]
pub struct WorkSession {
    pub activity_type: String,
    pub target_day: f64,
    pub started_at: DateTime<Utc>,
}

impl WorkSession {
    pub fn timer(&self) -> SessionTimer {
        SessionTimer::new(self.started_at)
    }
}

/// Orchestrates activity selection, the running session, scan ingestion,
/// and session exit. Local state is applied optimistically; backend calls
/// are fire-and-forget, with a failure surfaced once as a notice and never
/// rolled back or retried.
pub struct SessionTracker {
    context: SessionContext,
    catalog: Vec<AssignedActivity>,
    workday_seconds: u32,
    phase: TrackerPhase,
    catalog_open: bool,
    session: Option<WorkSession>,
    ledger: ScanLedger,
    notice: Option<String>,
}

impl SessionTracker {
    pub fn new(
        context: SessionContext,
        catalog: Vec<AssignedActivity>,
        workday_seconds: u32,
    ) -> Self {
        Self {
            context,
            catalog,
            workday_seconds,
            phase: TrackerPhase::Selecting,
            catalog_open: true,
            session: None,
            ledger: ScanLedger::new(),
            notice: None,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn catalog(&self) -> &[AssignedActivity] {
        &self.catalog
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn catalog_open(&self) -> bool {
        self.catalog_open
    }

    pub fn session(&self) -> Option<&WorkSession> {
        self.session.as_ref()
    }

    pub fn scan_count(&self) -> u32 {
        self.ledger.scan_count()
    }

    pub fn recent_scans(&self) -> Vec<ScanEntry> {
        self.ledger.entries()
    }

    /// Starts a session for the named activity. Lookup is exact string
    /// equality on the activity type; an unknown type is silently ignored
    /// and no transition happens. Selecting resets the scan count and the
    /// ledger and leaves the catalog surface open.
    pub fn select_activity(&mut self, activity_type: &str) -> bool {
        let Some(activity) = self
            .catalog
            .iter()
            .find(|activity| activity.activity_type == activity_type)
        else {
            debug!(activity_type, "selected activity not in catalog; ignoring");
            return false;
        };

        self.session = Some(WorkSession {
            activity_type: activity.activity_type.clone(),
            target_day: activity.target_day,
            started_at: Utc::now(),
        });
        self.ledger.clear();
        self.phase = TrackerPhase::Active;
        true
    }

    /// The no-op submit of the selection surface: closes the catalog
    /// without touching any session state.
    pub fn close_catalog(&mut self) {
        self.catalog_open = false;
    }

    pub fn open_catalog(&mut self) {
        self.catalog_open = true;
    }

    /// Records a scan against the active session and posts it to the
    /// backend. The ledger is updated first; a persistence failure is
    /// surfaced as a notice without undoing the local increment.
    pub fn record_scan(&mut self, code: &str, backend: &BackendClient) -> bool {
        if self.phase != TrackerPhase::Active {
            return false;
        }
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if !self.ledger.record(code) {
            return false;
        }

        let upload = ScanUpload {
            username: &self.context.user_name,
            login_time: session.started_at.to_rfc3339(),
            target_day: session.target_day,
            barcode: code,
        };
        if let Err(err) = backend.save_scan(&upload) {
            warn!(error = %err, barcode = code, "failed to persist scan");
            self.notice = Some(format!("Scan not saved to backend: {err}"));
        }
        true
    }

    /// Retracts the recent-list entry at `index` (0 = most recent) and
    /// issues the remote deletion keyed by the scan code. Interactive
    /// confirmation is the caller's job; a declined prompt must simply not
    /// call this. Deletion failure keeps the local retraction.
    pub fn retract_scan(&mut self, index: usize, backend: &BackendClient) -> Option<String> {
        if self.phase != TrackerPhase::Active {
            return None;
        }
        let code = self.ledger.retract(index)?;

        if let Err(err) = backend.delete_scan(&code) {
            warn!(error = %err, barcode = %code, "failed to delete scan on backend");
            self.notice = Some(format!("Scan not deleted on backend: {err}"));
        }
        Some(code)
    }

    /// Terminal action: discards the session and ledger. Not reversible,
    /// and deliberately unconfirmed (unlike retraction).
    pub fn exit_session(&mut self) {
        self.session = None;
        self.ledger.clear();
        self.phase = TrackerPhase::Idle;
    }

    /// Takes the pending failure notice, if any. Each notice is surfaced
    /// exactly once.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn target_cycle_time(&self) -> CycleTime {
        match self.session.as_ref() {
            Some(session) => cycle::target_cycle_time(self.workday_seconds, session.target_day),
            None => CycleTime::NotApplicable,
        }
    }

    pub fn current_cycle_time(&self, now: DateTime<Utc>) -> CycleTime {
        cycle::current_cycle_time(self.elapsed_seconds(now), self.ledger.scan_count())
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.session
            .as_ref()
            .map(|session| session.timer().elapsed_seconds(now))
            .unwrap_or(0)
    }

    pub fn elapsed_hms(&self, now: DateTime<Utc>) -> String {
        match self.session.as_ref() {
            Some(session) => session.timer().elapsed_hms(now),
            None => "00:00:00".to_string(),
        }
    }
}
