use std::fmt;

/// Seconds-per-unit cycle time, or N/A when the inputs cannot support a
/// meaningful value. Values are rounded to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleTime {
    Seconds(f64),
    NotApplicable,
}

impl CycleTime {
    pub fn seconds(self) -> Option<f64> {
        match self {
            Self::Seconds(value) => Some(value),
            Self::NotApplicable => None,
        }
    }
}

impl fmt::Display for CycleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(value) => write!(f, "{value:.2}"),
            Self::NotApplicable => write!(f, "N/A"),
        }
    }
}

/// Planned seconds per unit: shift length divided by the daily target.
pub fn target_cycle_time(workday_seconds: u32, target_per_day: f64) -> CycleTime {
    if !target_per_day.is_finite() || target_per_day <= 0.0 {
        return CycleTime::NotApplicable;
    }
    CycleTime::Seconds(round2(f64::from(workday_seconds) / target_per_day))
}

/// Actual seconds per unit so far: elapsed whole seconds divided by scans.
pub fn current_cycle_time(elapsed_seconds: i64, scan_count: u32) -> CycleTime {
    if scan_count == 0 || elapsed_seconds <= 0 {
        return CycleTime::NotApplicable;
    }
    CycleTime::Seconds(round2(elapsed_seconds as f64 / f64::from(scan_count)))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_cycle_time_divides_shift_by_daily_target() {
        assert_eq!(
            target_cycle_time(28_880, 100.0),
            CycleTime::Seconds(288.80)
        );
        assert_eq!(target_cycle_time(28_880, 100.0).to_string(), "288.80");
        assert_eq!(target_cycle_time(28_880, 7.0), CycleTime::Seconds(4125.71));
    }

    #[test]
    fn target_cycle_time_degrades_on_bad_input() {
        assert_eq!(target_cycle_time(28_880, 0.0), CycleTime::NotApplicable);
        assert_eq!(target_cycle_time(28_880, -4.0), CycleTime::NotApplicable);
        assert_eq!(
            target_cycle_time(28_880, f64::NAN),
            CycleTime::NotApplicable
        );
        assert_eq!(
            target_cycle_time(28_880, f64::INFINITY),
            CycleTime::NotApplicable
        );
        assert_eq!(target_cycle_time(28_880, 0.0).to_string(), "N/A");
    }

    #[test]
    fn current_cycle_time_averages_elapsed_over_scans() {
        assert_eq!(current_cycle_time(90, 3), CycleTime::Seconds(30.00));
        assert_eq!(current_cycle_time(100, 3), CycleTime::Seconds(33.33));
        assert_eq!(current_cycle_time(1, 2), CycleTime::Seconds(0.5));
    }

    #[test]
    fn current_cycle_time_is_na_without_scans_or_elapsed_time() {
        assert_eq!(current_cycle_time(90, 0), CycleTime::NotApplicable);
        assert_eq!(current_cycle_time(0, 3), CycleTime::NotApplicable);
        assert_eq!(current_cycle_time(-5, 3), CycleTime::NotApplicable);
    }

    #[test]
    fn calculators_are_pure() {
        let first = current_cycle_time(90, 3);
        let second = current_cycle_time(90, 3);
        assert_eq!(first, second);
        assert_eq!(target_cycle_time(28_880, 100.0), target_cycle_time(28_880, 100.0));
    }
}
