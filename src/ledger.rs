use std::collections::HashMap;

/// How many scans the recent list retains for display. Older entries fall
/// off and are never backfilled by a retraction.
pub const RECENT_WINDOW: usize = 5;

/// One row of the recent-scan display. `duplicate` is derived from the
/// occurrence count at read time, not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub code: String,
    pub occurrences: u32,
    pub duplicate: bool,
}

/// In-memory ledger of recent scan codes with per-code occurrence counts.
/// The recent list is bounded to [`RECENT_WINDOW`] entries in
/// reverse-chronological order; the count map is unbounded for the life of
/// the session.
#[derive(Debug, Default)]
pub struct ScanLedger {
    recent: Vec<String>,
    counts: HashMap<String, u32>,
    scan_count: u32,
}

impl ScanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one scan: bumps the code's occurrence count, prepends it to
    /// the recent list (trimming to the window), and bumps the total scan
    /// count. Empty input is rejected as a no-op.
    pub fn record(&mut self, code: &str) -> bool {
        if code.trim().is_empty() {
            return false;
        }

        *self.counts.entry(code.to_string()).or_insert(0) += 1;
        self.recent.insert(0, code.to_string());
        self.recent.truncate(RECENT_WINDOW);
        self.scan_count += 1;
        true
    }

    /// Removes the recent entry at `index` (0 = most recent), decrementing
    /// the code's occurrence count and the total scan count, both floored
    /// at zero. Returns the retracted code, or `None` when `index` is out
    /// of range.
    pub fn retract(&mut self, index: usize) -> Option<String> {
        if index >= self.recent.len() {
            return None;
        }

        let code = self.recent.remove(index);
        if let Some(count) = self.counts.get_mut(&code) {
            *count = count.saturating_sub(1);
        }
        self.scan_count = self.scan_count.saturating_sub(1);
        Some(code)
    }

    pub fn clear(&mut self) {
        self.recent.clear();
        self.counts.clear();
        self.scan_count = 0;
    }

    pub fn scan_count(&self) -> u32 {
        self.scan_count
    }

    pub fn occurrences(&self, code: &str) -> u32 {
        self.counts.get(code).copied().unwrap_or(0)
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    /// Recent scans, most recent first, with the duplicate flag derived
    /// from the current occurrence counts.
    pub fn entries(&self) -> Vec<ScanEntry> {
        self.recent
            .iter()
            .map(|code| {
                let occurrences = self.occurrences(code);
                ScanEntry {
                    code: code.clone(),
                    occurrences,
                    duplicate: occurrences > 1,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_scan_counts_once_and_leads_the_list() {
        let mut ledger = ScanLedger::new();
        assert!(ledger.record("A1"));
        assert_eq!(ledger.scan_count(), 1);
        assert_eq!(ledger.occurrences("A1"), 1);

        let entries = ledger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, "A1");
        assert!(!entries[0].duplicate);
    }

    #[test]
    fn repeat_scans_keep_separate_list_entries_and_flag_duplicates() {
        let mut ledger = ScanLedger::new();
        ledger.record("A1");
        ledger.record("A1");
        ledger.record("A2");

        assert_eq!(ledger.scan_count(), 3);
        let entries = ledger.entries();
        let codes: Vec<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["A2", "A1", "A1"]);
        assert!(!entries[0].duplicate);
        assert!(entries[1].duplicate);
        assert!(entries[2].duplicate);
    }

    #[test]
    fn recent_list_is_capped_but_total_count_is_not() {
        let mut ledger = ScanLedger::new();
        for idx in 0..8 {
            ledger.record(&format!("C{idx}"));
        }

        assert_eq!(ledger.scan_count(), 8);
        assert_eq!(ledger.recent_len(), RECENT_WINDOW);
        let codes: Vec<String> = ledger.entries().into_iter().map(|e| e.code).collect();
        assert_eq!(codes, ["C7", "C6", "C5", "C4", "C3"]);
    }

    #[test]
    fn retraction_removes_one_entry_and_unflags_by_count() {
        let mut ledger = ScanLedger::new();
        ledger.record("A1");
        ledger.record("A1");
        ledger.record("A2");

        let retracted = ledger.retract(1);
        assert_eq!(retracted.as_deref(), Some("A1"));
        assert_eq!(ledger.scan_count(), 2);
        assert_eq!(ledger.occurrences("A1"), 1);

        let entries = ledger.entries();
        let codes: Vec<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["A2", "A1"]);
        assert!(!entries[1].duplicate);
    }

    #[test]
    fn retraction_floors_counts_at_zero() {
        let mut ledger = ScanLedger::new();
        ledger.record("A1");
        assert_eq!(ledger.retract(0).as_deref(), Some("A1"));
        assert_eq!(ledger.scan_count(), 0);
        assert_eq!(ledger.occurrences("A1"), 0);
        assert_eq!(ledger.retract(0), None);
        assert_eq!(ledger.scan_count(), 0);
    }

    #[test]
    fn window_is_never_backfilled_after_retraction() {
        let mut ledger = ScanLedger::new();
        for idx in 0..7 {
            ledger.record(&format!("C{idx}"));
        }
        ledger.retract(4);
        assert_eq!(ledger.recent_len(), RECENT_WINDOW - 1);
    }

    #[test]
    fn empty_code_is_rejected() {
        let mut ledger = ScanLedger::new();
        assert!(!ledger.record(""));
        assert!(!ledger.record("   "));
        assert_eq!(ledger.scan_count(), 0);
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn clear_resets_everything() {
        let mut ledger = ScanLedger::new();
        ledger.record("A1");
        ledger.record("A2");
        ledger.clear();
        assert_eq!(ledger.scan_count(), 0);
        assert_eq!(ledger.occurrences("A1"), 0);
        assert!(ledger.entries().is_empty());
    }
}
