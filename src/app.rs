use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use tracing::warn;

use crate::backend::BackendClient;
use crate::config::{self, ConsoleConfig, RuntimeSettings};
use crate::process_guard::{self, RunningState};
use crate::report::{self, ReportWriter};
use crate::session::{SessionContext, SessionTracker, TrackerPhase};
use crate::ui::{self, RenderData};

const BARCODE_INPUT_MAX: usize = 64;

/// Pending retraction: list index plus the code shown in the prompt.
struct PendingRetract {
    index: usize,
    code: String,
}

pub fn run(config: ConsoleConfig, user_override: Option<&str>, runtime: RuntimeSettings) -> Result<()> {
    let stop = install_stop_signal()?;
    if !io::stdout().is_terminal() {
        bail!("floortrack needs an interactive terminal");
    }

    let Some(user_id) = config.effective_user_id(user_override) else {
        bail!("no operator id configured; pass --user, set FLOORTRACK_USER_ID, or edit the config");
    };

    let backend = BackendClient::new(&config.effective_backend_url(), runtime.request_timeout);
    let mut startup_notice: Option<String> = None;

    // Startup fetch failures degrade rather than abort: the operator can
    // still see the console and read the notice.
    let user_name = match backend.fetch_user_name(&user_id) {
        Ok(name) => name,
        Err(err) => {
            warn!(error = %err, user_id, "failed to resolve operator name");
            startup_notice = Some(format!("Operator lookup failed: {err}"));
            user_id.clone()
        }
    };
    let catalog = match backend.fetch_assigned_activities(&user_name) {
        Ok(catalog) => catalog,
        Err(err) => {
            warn!(error = %err, user_name, "failed to fetch assigned activities");
            startup_notice = Some(format!("Activity list unavailable: {err}"));
            Vec::new()
        }
    };

    let mut tracker = SessionTracker::new(
        SessionContext {
            user_id,
            user_name,
        },
        catalog,
        config.workday_seconds,
    );

    ui::enter_terminal()?;
    let result = event_loop(&mut tracker, &backend, &config, &runtime, &stop, startup_notice);
    let _ = ui::leave_terminal();
    result
}

fn event_loop(
    tracker: &mut SessionTracker,
    backend: &BackendClient,
    config: &ConsoleConfig,
    runtime: &RuntimeSettings,
    stop: &Arc<AtomicBool>,
    startup_notice: Option<String>,
) -> Result<()> {
    let started = Instant::now();
    let backend_url = config.effective_backend_url();
    let operator = tracker.context().user_name.clone();
    let mut report_writer = ReportWriter::new();

    let mut selected_index = 0usize;
    let mut input = String::new();
    let mut retract_cursor: Option<usize> = None;
    let mut pending_retract: Option<PendingRetract> = None;
    let mut notice = startup_notice;

    let mut last_render_signature = String::new();
    let mut last_render_at = Instant::now() - Duration::from_secs(31);
    let mut last_tick = Instant::now() - runtime.tick_interval;
    let mut force_redraw = true;

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if tracker.phase() == TrackerPhase::Idle {
            break;
        }

        if last_tick.elapsed() >= runtime.tick_interval {
            let now = Utc::now();
            if tracker.phase() == TrackerPhase::Active
                && let Some(report) = report::build_report(tracker, now)
            {
                report_writer.persist_if_due(&report);
            }

            let elapsed = tracker.elapsed_hms(now);
            let recent = tracker.recent_scans();
            let render = RenderData {
                running_for: started.elapsed(),
                backend_url: &backend_url,
                operator: &operator,
                tick_millis: runtime.tick_interval.as_millis() as u64,
                phase: tracker.phase(),
                catalog_open: tracker.catalog_open(),
                catalog: tracker.catalog(),
                selected_index,
                session: tracker.session(),
                target_cycle_time: tracker.target_cycle_time(),
                current_cycle_time: tracker.current_cycle_time(now),
                scan_count: tracker.scan_count(),
                elapsed: &elapsed,
                input: &input,
                recent: &recent,
                retract_cursor,
                pending_retract: pending_retract.as_ref().map(|p| p.code.as_str()),
                notice: notice.as_deref(),
            };
            let signature = ui::frame_signature(&render);
            let should_draw = force_redraw
                || signature != last_render_signature
                || last_render_at.elapsed() >= Duration::from_secs(30);
            if should_draw {
                ui::draw(&render)?;
                last_render_signature = signature;
                last_render_at = Instant::now();
                force_redraw = false;
            }
            last_tick = Instant::now();
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        break;
                    }

                    // A confirmation prompt captures the keyboard until it
                    // is answered.
                    if let Some(pending) = pending_retract.take() {
                        if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                            tracker.retract_scan(pending.index, backend);
                            retract_cursor = None;
                        }
                        force_redraw = true;
                    } else if notice.is_some() {
                        // A failure notice is dismissed by any key.
                        notice = None;
                        force_redraw = true;
                    } else if tracker.catalog_open() {
                        handle_catalog_key(
                            key.code,
                            tracker,
                            &mut selected_index,
                            &mut input,
                            &mut retract_cursor,
                        );
                        force_redraw = true;
                    } else {
                        handle_session_key(
                            key.code,
                            tracker,
                            backend,
                            &mut input,
                            &mut retract_cursor,
                            &mut pending_retract,
                            &mut report_writer,
                        );
                        force_redraw = true;
                    }
                }
                Event::Resize(_, _) => {
                    force_redraw = true;
                }
                _ => {}
            }
        }

        if let Some(message) = tracker.take_notice() {
            notice = Some(message);
            force_redraw = true;
        }
    }

    // One final snapshot so the on-disk report reflects the full session.
    if let Some(report) = report::build_report(tracker, Utc::now()) {
        report_writer.persist_now(&report);
    }
    Ok(())
}

fn handle_catalog_key(
    code: KeyCode,
    tracker: &mut SessionTracker,
    selected_index: &mut usize,
    input: &mut String,
    retract_cursor: &mut Option<usize>,
) {
    match code {
        KeyCode::Up => {
            *selected_index = selected_index.saturating_sub(1);
        }
        KeyCode::Down => {
            let last = tracker.catalog().len().saturating_sub(1);
            *selected_index = (*selected_index + 1).min(last);
        }
        KeyCode::Enter => {
            let Some(activity) = tracker.catalog().get(*selected_index) else {
                return;
            };
            let activity_type = activity.activity_type.clone();
            if tracker.select_activity(&activity_type) {
                input.clear();
                *retract_cursor = None;
                tracker.close_catalog();
            }
        }
        KeyCode::Tab if tracker.phase() == TrackerPhase::Active => {
            tracker.close_catalog();
        }
        KeyCode::Esc => {
            tracker.exit_session();
        }
        _ => {}
    }
}

fn handle_session_key(
    code: KeyCode,
    tracker: &mut SessionTracker,
    backend: &BackendClient,
    input: &mut String,
    retract_cursor: &mut Option<usize>,
    pending_retract: &mut Option<PendingRetract>,
    report_writer: &mut ReportWriter,
) {
    match code {
        KeyCode::Char(ch) if !ch.is_control() => {
            if input.len() < BARCODE_INPUT_MAX {
                input.push(ch);
            }
        }
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Enter => {
            let code = input.trim().to_string();
            input.clear();
            if tracker.record_scan(&code, backend) {
                *retract_cursor = None;
            }
        }
        KeyCode::Up => {
            let len = tracker.recent_scans().len();
            if len > 0 {
                *retract_cursor = Some(match retract_cursor {
                    Some(cursor) => cursor.saturating_sub(1),
                    None => 0,
                });
            }
        }
        KeyCode::Down => {
            let len = tracker.recent_scans().len();
            if len > 0 {
                let last = len - 1;
                *retract_cursor = Some(match retract_cursor {
                    Some(cursor) => (*cursor + 1).min(last),
                    None => 0,
                });
            }
        }
        KeyCode::Delete => {
            if let Some(index) = *retract_cursor
                && let Some(entry) = tracker.recent_scans().get(index)
            {
                *pending_retract = Some(PendingRetract {
                    index,
                    code: entry.code.clone(),
                });
            }
        }
        KeyCode::Tab => {
            tracker.open_catalog();
        }
        KeyCode::Esc => {
            if let Some(report) = report::build_report(tracker, Utc::now()) {
                report_writer.persist_now(&report);
            }
            tracker.exit_session();
        }
        _ => {}
    }
}

pub fn print_status(config: &ConsoleConfig, user_override: Option<&str>) -> Result<()> {
    let running = process_guard::inspect_running_instance()?;
    let (is_running, running_pid) = match running {
        RunningState::NotRunning => (false, None),
        RunningState::Running { pid } => (true, pid),
    };

    println!("floortrack status");
    println!("running: {is_running}");
    if let Some(pid) = running_pid {
        println!("pid: {pid}");
    }
    println!("config: {}", config::config_path().display());
    println!("backend_url: {}", config.effective_backend_url());
    println!(
        "user_id: {}",
        config
            .effective_user_id(user_override)
            .as_deref()
            .unwrap_or("not configured")
    );
    println!("workday_seconds: {}", config.workday_seconds);
    println!(
        "session_report: {}",
        config::floortrack_home().join("session-report.json").display()
    );
    Ok(())
}

pub fn doctor(config: &ConsoleConfig, user_override: Option<&str>) -> Result<u8> {
    let mut issues = 0u8;
    let runtime = config::runtime_settings();
    let backend_url = config.effective_backend_url();

    println!("floortrack doctor");
    println!("config_path: {}", config::config_path().display());
    println!("backend_url: {backend_url}");

    let home = config::floortrack_home();
    match std::fs::create_dir_all(&home) {
        Ok(()) => println!("[OK] Home directory {} is writable.", home.display()),
        Err(err) => {
            issues += 1;
            println!("[WARN] Cannot create home directory {}: {err}", home.display());
        }
    }

    let user_id = config.effective_user_id(user_override);
    match &user_id {
        Some(id) => println!("[OK] Operator id configured ({id})."),
        None => {
            issues += 1;
            println!("[WARN] No operator id configured (--user, FLOORTRACK_USER_ID, or config).");
        }
    }

    let backend = BackendClient::new(&backend_url, runtime.request_timeout);
    match backend.probe() {
        Ok(()) => println!("[OK] Backend reachable."),
        Err(err) => {
            issues += 1;
            println!("[WARN] Backend not reachable: {err}");
        }
    }

    if let Some(id) = &user_id {
        match backend.fetch_user_name(id) {
            Ok(name) => println!("[OK] Operator {id} resolves to {name}."),
            Err(err) => {
                issues += 1;
                println!("[WARN] Operator lookup failed: {err}");
            }
        }
    }

    if config.workday_seconds == 0 {
        issues += 1;
        println!("[WARN] workday_seconds is zero; target cycle times will be N/A.");
    }

    if issues == 0 {
        println!("Doctor: healthy");
        Ok(0)
    } else {
        println!("Doctor: {issues} issue(s) found");
        Ok(1)
    }
}

fn install_stop_signal() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .context("failed to install Ctrl+C handler")?;
    Ok(stop)
}
