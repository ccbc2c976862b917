use std::fmt::Write as _;
use std::io::{Write, stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::execute;
use crossterm::style::{Color, Stylize};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};

use crate::backend::AssignedActivity;
use crate::cycle::CycleTime;
use crate::ledger::ScanEntry;
use crate::session::{TrackerPhase, WorkSession};
use crate::util::{human_duration, now_local, percent_of_target, progress_bar, truncate};

const FOOTER_ROWS: u16 = 2;

const FLOORTRACK_ASCII: [&str; 6] = [
    " ______ __    ____  ____  ____  ______ ____  ___    ______ __ __ ",
    "/ ____// /   / __ \\/ __ \\/ __ \\/_  __// __ \\/   |  / ____// //_/ ",
    "/ /_   / /   / / / / / / / /_/ / / /  / /_/ / /| | / /    / ,<    ",
    "/ __/  / /___/ /_/ / /_/ / _, _/ / /  / _, _/ ___ |/ /___ / /| |  ",
    "/_/    /_____/\\____/\\____/_/ |_| /_/  /_/ |_/_/  |_|\\____//_/ |_| ",
    "              Factory-floor scan session console                  ",
];

const COMPACT_BANNER: [&str; 2] = ["FLOORTRACK", "Factory-floor scan session console"];

const MINIMAL_BANNER: &str = "FLOORTRACK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiLayoutMode {
    Full,
    Compact,
    Minimal,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    pub width: u16,
    pub height: u16,
    pub footer_rows: u16,
}

impl FrameBudget {
    fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            footer_rows: FOOTER_ROWS.min(height),
        }
    }

    fn body_bottom(self) -> u16 {
        self.height.saturating_sub(self.footer_rows)
    }
}

pub struct RenderData<'a> {
    pub running_for: Duration,
    pub backend_url: &'a str,
    pub operator: &'a str,
    pub tick_millis: u64,
    pub phase: TrackerPhase,
    pub catalog_open: bool,
    pub catalog: &'a [AssignedActivity],
    pub selected_index: usize,
    pub session: Option<&'a WorkSession>,
    pub target_cycle_time: CycleTime,
    pub current_cycle_time: CycleTime,
    pub scan_count: u32,
    pub elapsed: &'a str,
    pub input: &'a str,
    pub recent: &'a [ScanEntry],
    pub retract_cursor: Option<usize>,
    pub pending_retract: Option<&'a str>,
    pub notice: Option<&'a str>,
}

pub fn enter_terminal() -> Result<()> {
    let mut out = stdout();
    terminal::enable_raw_mode()?;
    execute!(out, EnterAlternateScreen, Hide)?;
    Ok(())
}

pub fn leave_terminal() -> Result<()> {
    let mut out = stdout();
    execute!(out, Show, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    Ok(())
}

pub fn draw(data: &RenderData<'_>) -> Result<()> {
    let mut out = stdout();
    let (width, height) = terminal::size()?;
    if width == 0 || height == 0 {
        return Ok(());
    }

    let budget = FrameBudget::new(width, height);
    let max_body_row = budget.body_bottom();
    let layout = select_layout_mode(width, height);
    let w = width as usize;

    execute!(out, MoveTo(0, 0), Clear(ClearType::All))?;

    let mut row = 0u16;
    draw_banner(&mut out, &mut row, max_body_row, w, layout)?;
    let _ = write_line(&mut out, &mut row, max_body_row, w, "");

    render_runtime_section(&mut out, &mut row, max_body_row, w, layout, data)?;
    let _ = write_line(&mut out, &mut row, max_body_row, w, "");

    if data.catalog_open {
        render_catalog_section(&mut out, &mut row, max_body_row, w, data)?;
        let _ = write_line(&mut out, &mut row, max_body_row, w, "");
    }

    if data.session.is_some() {
        render_session_section(&mut out, &mut row, max_body_row, w, layout, data)?;
        let _ = write_line(&mut out, &mut row, max_body_row, w, "");
        render_scan_section(&mut out, &mut row, max_body_row, w, data)?;
    }

    render_footer(&mut out, w, height, data)?;

    out.flush()?;
    Ok(())
}

pub fn frame_signature(data: &RenderData<'_>) -> String {
    let mut signature = String::with_capacity(512);
    let _ = write!(
        signature,
        "{:?}|{}|{}|{}|{}|{}|{}|{}|",
        data.phase,
        data.catalog_open,
        data.selected_index,
        data.scan_count,
        data.elapsed,
        data.input,
        data.notice.unwrap_or(""),
        data.pending_retract.unwrap_or(""),
    );

    if let Some(session) = data.session {
        let _ = write!(
            signature,
            "session:{}|{}|",
            session.activity_type,
            session.started_at.timestamp()
        );
    } else {
        signature.push_str("session:none|");
    }

    if let Some(cursor) = data.retract_cursor {
        let _ = write!(signature, "cursor:{cursor}|");
    }

    for entry in data.recent {
        let _ = write!(signature, "{}:{}|", entry.code, entry.occurrences);
    }

    signature
}

fn render_runtime_section(
    out: &mut impl Write,
    row: &mut u16,
    max_body_row: u16,
    width: usize,
    layout: UiLayoutMode,
    data: &RenderData<'_>,
) -> Result<()> {
    if !write_line(out, row, max_body_row, width, &hr("Console", width))? {
        return Ok(());
    }

    let mut lines = vec![
        kv_line("Operator", data.operator),
        kv_line("Now", &now_local()),
        kv_line("Uptime", &human_duration(data.running_for)),
    ];

    if !matches!(layout, UiLayoutMode::Minimal) {
        lines.push(kv_line(
            "Backend",
            &truncate(data.backend_url, width.saturating_sub(13)),
        ));
        lines.push(kv_line("Tick", &format!("{}ms", data.tick_millis)));
    }

    for line in lines {
        if !write_line(out, row, max_body_row, width, &line)? {
            break;
        }
    }

    Ok(())
}

fn render_catalog_section(
    out: &mut impl Write,
    row: &mut u16,
    max_body_row: u16,
    width: usize,
    data: &RenderData<'_>,
) -> Result<()> {
    if !write_line(
        out,
        row,
        max_body_row,
        width,
        &hr("Assigned Activities", width),
    )? {
        return Ok(());
    }

    if data.catalog.is_empty() {
        let _ = write_line(
            out,
            row,
            max_body_row,
            width,
            "No activities assigned to this operator.",
        );
        return Ok(());
    }

    for (idx, activity) in data.catalog.iter().enumerate() {
        let marker = if idx == data.selected_index { ">" } else { " " };
        let line = format!(
            "{marker} {} (target/day {})",
            truncate(&activity.activity_type.to_uppercase(), 32),
            format_target(activity.target_day),
        );
        if !write_line(out, row, max_body_row, width, &line)? {
            break;
        }
    }

    Ok(())
}

fn render_session_section(
    out: &mut impl Write,
    row: &mut u16,
    max_body_row: u16,
    width: usize,
    layout: UiLayoutMode,
    data: &RenderData<'_>,
) -> Result<()> {
    if !write_line(out, row, max_body_row, width, &hr("Session", width))? {
        return Ok(());
    }

    let Some(session) = data.session else {
        return Ok(());
    };

    let mut lines = vec![
        kv_line(
            "Activity",
            &truncate(
                &session.activity_type.to_uppercase(),
                width.saturating_sub(13),
            ),
        ),
        kv_line(
            "Started",
            &session
                .started_at
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string(),
        ),
        kv_line("Target/day", &format_target(session.target_day)),
        kv_line("Target CT", &data.target_cycle_time.to_string()),
        kv_line("Output", &data.scan_count.to_string()),
        kv_line("Current CT", &data.current_cycle_time.to_string()),
        kv_line("Duration", data.elapsed),
    ];

    if matches!(layout, UiLayoutMode::Minimal) {
        // Keep only the live numbers on tiny terminals.
        lines = vec![
            kv_line("Output", &data.scan_count.to_string()),
            kv_line("Current CT", &data.current_cycle_time.to_string()),
            kv_line("Duration", data.elapsed),
        ];
    }

    for line in lines {
        if !write_line(out, row, max_body_row, width, &line)? {
            return Ok(());
        }
    }

    if !matches!(layout, UiLayoutMode::Minimal) {
        let line = render_progress_row(data.scan_count, session.target_day, width);
        let _ = write_line_unchecked(out, row, max_body_row, &line)?;
    }

    Ok(())
}

fn render_scan_section(
    out: &mut impl Write,
    row: &mut u16,
    max_body_row: u16,
    width: usize,
    data: &RenderData<'_>,
) -> Result<()> {
    if !write_line(out, row, max_body_row, width, &hr("Scans", width))? {
        return Ok(());
    }

    let input_line = format!("Scan> {}_", data.input);
    if !write_line(out, row, max_body_row, width, &input_line)? {
        return Ok(());
    }

    for (idx, entry) in data.recent.iter().enumerate() {
        let marker = if data.retract_cursor == Some(idx) {
            ">"
        } else {
            " "
        };
        let code = truncate(&entry.code, width.saturating_sub(16));
        let line = if entry.duplicate {
            let flagged = format!("{code}  x{}", entry.occurrences).with(Color::Red);
            format!("{marker} {}. {flagged}", idx + 1)
        } else {
            format!("{marker} {}. {code}", idx + 1)
        };
        if !write_line_unchecked(out, row, max_body_row, &line)? {
            return Ok(());
        }
    }

    if let Some(code) = data.pending_retract {
        let prompt = format!("Delete barcode {code}? [y/N]").with(Color::Yellow).bold();
        let _ = write_line_unchecked(out, row, max_body_row, &prompt.to_string())?;
    }

    if let Some(notice) = data.notice {
        let line = format!("! {}", truncate(notice, width.saturating_sub(2))).with(Color::Yellow);
        let _ = write_line_unchecked(out, row, max_body_row, &line.to_string())?;
    }

    Ok(())
}

fn draw_banner(
    out: &mut impl Write,
    row: &mut u16,
    max_body_row: u16,
    width: usize,
    layout: UiLayoutMode,
) -> Result<()> {
    if *row >= max_body_row {
        return Ok(());
    }

    match layout {
        UiLayoutMode::Full if width >= 70 => {
            for text in FLOORTRACK_ASCII {
                let centered = center_line(text, width);
                if !write_line(out, row, max_body_row, width, &centered)? {
                    break;
                }
            }
        }
        UiLayoutMode::Compact => {
            for text in COMPACT_BANNER {
                let centered = center_line(text, width);
                if !write_line(out, row, max_body_row, width, &centered)? {
                    break;
                }
            }
        }
        _ => {
            let centered = center_line(MINIMAL_BANNER, width);
            let _ = write_line(out, row, max_body_row, width, &centered)?;
        }
    }

    Ok(())
}

fn render_footer(out: &mut impl Write, width: usize, height: u16, data: &RenderData<'_>) -> Result<()> {
    if height == 0 {
        return Ok(());
    }

    let help = footer_help(data);
    if height >= 2 {
        execute!(out, MoveTo(0, height - 2), Clear(ClearType::CurrentLine))?;
        let hint = center_line(&truncate(&help, width), width).dark_grey();
        write!(out, "{hint}")?;

        execute!(out, MoveTo(0, height - 1), Clear(ClearType::CurrentLine))?;
        write!(out, "{}", truncate("Ctrl+C quits.", width))?;
        return Ok(());
    }

    execute!(out, MoveTo(0, 0), Clear(ClearType::CurrentLine))?;
    write!(out, "{}", truncate(&help, width))?;
    Ok(())
}

fn footer_help(data: &RenderData<'_>) -> String {
    if data.pending_retract.is_some() {
        return "y confirms deletion, any other key cancels.".to_string();
    }
    match data.phase {
        TrackerPhase::Selecting => {
            "Up/Down picks an activity, Enter starts the session, Esc leaves.".to_string()
        }
        TrackerPhase::Active if data.catalog_open => {
            "Enter restarts on the highlighted activity, Tab closes the list.".to_string()
        }
        TrackerPhase::Active => {
            "Type + Enter records a scan, Up/Down + Del retracts, Esc exits.".to_string()
        }
        TrackerPhase::Idle => String::new(),
    }
}

fn write_line(
    out: &mut impl Write,
    row: &mut u16,
    max_body_row: u16,
    width: usize,
    text: &str,
) -> Result<bool> {
    if *row >= max_body_row {
        return Ok(false);
    }

    execute!(out, MoveTo(0, *row), Clear(ClearType::CurrentLine))?;
    write!(out, "{}", truncate(text, width))?;
    *row += 1;
    Ok(true)
}

fn write_line_unchecked(
    out: &mut impl Write,
    row: &mut u16,
    max_body_row: u16,
    text: &str,
) -> Result<bool> {
    if *row >= max_body_row {
        return Ok(false);
    }

    execute!(out, MoveTo(0, *row), Clear(ClearType::CurrentLine))?;
    write!(out, "{text}")?;
    *row += 1;
    Ok(true)
}

fn kv_line(label: &str, value: &str) -> String {
    format!("{label:<11}: {value}")
}

fn render_progress_row(scan_count: u32, target_day: f64, width: usize) -> String {
    let percent = percent_of_target(scan_count, target_day);
    let color = progress_color(percent);
    let pct_plain = format!("{percent:>3.0}%");
    let pct = pct_plain.with(color).bold();
    let bar = progress_bar(percent, progress_bar_width(width)).with(color);

    if width < 48 {
        return format!("Target {pct}");
    }
    format!("Target progress [{pct}] {bar}")
}

fn progress_bar_width(width: usize) -> usize {
    if width >= 140 {
        30
    } else if width >= 112 {
        24
    } else if width >= 92 {
        18
    } else if width >= 72 {
        14
    } else {
        10
    }
}

fn progress_color(percent: f64) -> Color {
    if percent >= 90.0 {
        Color::Green
    } else if percent >= 40.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn format_target(target_day: f64) -> String {
    if !target_day.is_finite() || target_day <= 0.0 {
        return "N/A".to_string();
    }
    if target_day.fract() == 0.0 {
        format!("{target_day:.0}")
    } else {
        format!("{target_day}")
    }
}

fn hr(title: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }

    let core = format!(" {title} ");
    if core.len() >= width {
        return truncate(title, width);
    }

    let side = (width - core.len()) / 2;
    let right = width - core.len() - side;
    format!("{}{}{}", "-".repeat(side), core, "-".repeat(right))
}

fn select_layout_mode(width: u16, height: u16) -> UiLayoutMode {
    if width >= 100 && height >= 30 {
        UiLayoutMode::Full
    } else if width >= 72 && height >= 20 {
        UiLayoutMode::Compact
    } else {
        UiLayoutMode::Minimal
    }
}

fn center_line(text: &str, width: usize) -> String {
    let clipped = truncate(text, width);
    let left_pad = width.saturating_sub(clipped.len()) / 2;
    format!("{}{}", " ".repeat(left_pad), clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TrackerPhase;
    use chrono::Utc;

    fn sample_data<'a>(
        session: Option<&'a WorkSession>,
        recent: &'a [ScanEntry],
    ) -> RenderData<'a> {
        RenderData {
            running_for: Duration::from_secs(60),
            backend_url: "http://localhost:5000",
            operator: "Jordan Mills",
            tick_millis: 1000,
            phase: if session.is_some() {
                TrackerPhase::Active
            } else {
                TrackerPhase::Selecting
            },
            catalog_open: session.is_none(),
            catalog: &[],
            selected_index: 0,
            session,
            target_cycle_time: CycleTime::Seconds(288.80),
            current_cycle_time: CycleTime::NotApplicable,
            scan_count: 0,
            elapsed: "00:00:10",
            input: "",
            recent,
            retract_cursor: None,
            pending_retract: None,
            notice: None,
        }
    }

    #[test]
    fn header_rule_respects_requested_width() {
        let line = hr("Test", 24);
        assert_eq!(line.len(), 24);
    }

    #[test]
    fn layout_mode_switches_by_terminal_size() {
        assert_eq!(select_layout_mode(120, 34), UiLayoutMode::Full);
        assert_eq!(select_layout_mode(90, 22), UiLayoutMode::Compact);
        assert_eq!(select_layout_mode(60, 16), UiLayoutMode::Minimal);
    }

    #[test]
    fn frame_budget_reserves_footer() {
        let budget = FrameBudget::new(120, 30);
        assert_eq!(budget.body_bottom(), 28);
    }

    #[test]
    fn progress_color_thresholds() {
        assert_eq!(progress_color(95.0), Color::Green);
        assert_eq!(progress_color(55.0), Color::Yellow);
        assert_eq!(progress_color(10.0), Color::Red);
    }

    #[test]
    fn target_formatting_degrades_to_na() {
        assert_eq!(format_target(100.0), "100");
        assert_eq!(format_target(12.5), "12.5");
        assert_eq!(format_target(0.0), "N/A");
        assert_eq!(format_target(f64::NAN), "N/A");
    }

    #[test]
    fn signature_changes_when_a_scan_lands() {
        let session = WorkSession {
            activity_type: "welding".to_string(),
            target_day: 100.0,
            started_at: Utc::now(),
        };
        let before = sample_data(Some(&session), &[]);
        let mut after = sample_data(Some(&session), &[]);
        after.scan_count = 1;
        let entries = [ScanEntry {
            code: "A1".to_string(),
            occurrences: 1,
            duplicate: false,
        }];
        after.recent = &entries;

        assert_ne!(frame_signature(&before), frame_signature(&after));
    }

    #[test]
    fn signature_is_stable_for_unchanged_state() {
        let data = sample_data(None, &[]);
        assert_eq!(frame_signature(&data), frame_signature(&data));
    }

    #[test]
    fn footer_help_tracks_phase() {
        let mut data = sample_data(None, &[]);
        assert!(footer_help(&data).contains("starts the session"));
        data.pending_retract = Some("A1");
        assert!(footer_help(&data).contains("confirms deletion"));
    }
}
