use chrono::{DateTime, Utc};

/// Wall-clock elapsed-time tracker for one session. The tick cadence lives
/// in the app event loop; this type only derives elapsed time from
/// `started_at`, floored to whole seconds and clamped non-negative.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimer {
    started_at: DateTime<Utc>,
}

impl SessionTimer {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self { started_at }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.started_at)
            .num_seconds()
            .max(0)
    }

    pub fn elapsed_hms(&self, now: DateTime<Utc>) -> String {
        format_hms(self.elapsed_seconds(now))
    }
}

pub fn format_hms(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn elapsed_is_floored_to_whole_seconds() {
        let start = Utc::now();
        let timer = SessionTimer::new(start);
        let now = start + Duration::milliseconds(90_900);
        assert_eq!(timer.elapsed_seconds(now), 90);
        assert_eq!(timer.elapsed_hms(now), "00:01:30");
    }

    #[test]
    fn elapsed_clamps_to_zero_when_clock_runs_backwards() {
        let start = Utc::now();
        let timer = SessionTimer::new(start);
        let now = start - Duration::seconds(30);
        assert_eq!(timer.elapsed_seconds(now), 0);
        assert_eq!(timer.elapsed_hms(now), "00:00:00");
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(3_661), "01:01:01");
        assert_eq!(format_hms(100 * 3_600), "100:00:00");
        assert_eq!(format_hms(-5), "00:00:00");
    }
}
