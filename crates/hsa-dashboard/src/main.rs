mod state;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use hsa_client::{ClientConfig, SearchController, DEFAULT_API_URL, DEFAULT_POLL_INTERVAL};
use hsa_core::HistoryEntry;
use ratatui::{backend::CrosstermBackend, Terminal};
use state::{App, Command};
use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "hsa-dashboard", about = "Terminal dashboard for housing searches")]
struct Args {
    /// Backend base url. Falls back to HSA_API_URL, then NEXT_PUBLIC_API_URL.
    #[arg(long, default_value = "")]
    api_url: String,
    /// Directory for the log file. Falls back to HSA_LOG_DIR.
    #[arg(long, default_value = "")]
    log_dir: String,
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    poll_interval_secs: u64,
    /// Open an existing search instead of the new-search form.
    #[arg(long)]
    search_id: Option<String>,
}

#[derive(Debug, Clone)]
struct Config {
    api_url: Url,
    log_dir: Option<PathBuf>,
    poll_interval: Duration,
    search_id: Option<String>,
}

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(Args::parse())?;
    init_logging(&config);
    info!(event = "dashboard_start", api_url = %config.api_url);

    let client_config = ClientConfig {
        api_url: config.api_url.clone(),
        poll_interval: config.poll_interval,
    };
    let (mut controller, controller_rx) = SearchController::new(client_config);
    let mut app = App::new();
    if let Some(search_id) = config.search_id.clone() {
        controller.open_search(search_id.clone()).await;
        app.show_search(&search_id);
    }

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, &mut controller, controller_rx).await;
    restore_terminal(&mut terminal)?;
    controller.dispose().await;

    if let Err(err) = &result {
        warn!(event = "dashboard_error", error = %err);
    }
    info!(event = "dashboard_stop");
    result
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Tui,
    app: &mut App,
    controller: &mut SearchController,
    mut controller_rx: mpsc::Receiver<hsa_client::ControllerEvent>,
) -> Result<()> {
    let (history_tx, mut history_rx) = mpsc::channel(4);
    let mut events = EventStream::new();

    loop {
        terminal.draw(|frame| ui::render(frame, app, controller))?;
        tokio::select! {
            Some(event) = controller_rx.recv() => {
                let before = controller.search_id().map(str::to_string);
                controller.handle_event(event).await;
                if let Some(search_id) = controller.search_id() {
                    if before.as_deref() != Some(search_id) {
                        let search_id = search_id.to_string();
                        app.show_search(&search_id);
                    }
                }
            }
            Some(history) = history_rx.recv() => {
                app.set_history(history);
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        let command = app.handle_key(key, controller.store());
                        if let Some(command) = command {
                            if run_command(command, app, controller, &history_tx).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err).context("terminal input"),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

/// Returns `true` when the dashboard should exit.
async fn run_command(
    command: Command,
    app: &mut App,
    controller: &mut SearchController,
    history_tx: &mpsc::Sender<Result<Vec<HistoryEntry>, String>>,
) -> bool {
    match command {
        Command::Quit => return true,
        Command::SubmitSearch(request) => controller.submit_search(request),
        Command::OpenSearch(search_id) => {
            controller.open_search(search_id.clone()).await;
            app.show_search(&search_id);
        }
        Command::LoadHistory => {
            let api = controller.api().clone();
            let tx = history_tx.clone();
            tokio::spawn(async move {
                let result = api
                    .get_search_history()
                    .await
                    .map_err(|err| err.to_string());
                if let Err(message) = &result {
                    warn!(event = "history_error", error = %message);
                }
                let _ = tx.send(result).await;
            });
        }
        Command::BeginEdit => {
            if !controller.begin_edit() {
                app.status_note = Some("criteria not available yet".to_string());
            }
        }
        Command::CancelEdit => controller.cancel_edit(),
        Command::FocusField(delta) => {
            if let Some(store) = controller.store_mut() {
                let editor = store.criteria_edit_mut();
                if delta > 0 {
                    editor.focus_next();
                } else {
                    editor.focus_prev();
                }
            }
        }
        Command::AdjustField(steps) => {
            if let Some(store) = controller.store_mut() {
                store.criteria_edit_mut().adjust(steps);
            }
        }
        Command::SaveCriteria => {
            controller.save_criteria();
        }
    }
    false
}

fn load_config(args: Args) -> Result<Config> {
    let raw_url = resolve_api_url(&args.api_url);
    let api_url = Url::parse(&raw_url).with_context(|| format!("invalid api url: {raw_url}"))?;
    Ok(Config {
        api_url,
        log_dir: resolve_log_dir(&args.log_dir),
        poll_interval: Duration::from_secs(args.poll_interval_secs.max(1)),
        search_id: args
            .search_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_api_url(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.trim().to_string();
    }
    non_empty_env("HSA_API_URL")
        .or_else(|| non_empty_env("NEXT_PUBLIC_API_URL"))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

fn resolve_log_dir(flag: &str) -> Option<PathBuf> {
    if !flag.trim().is_empty() {
        return Some(PathBuf::from(flag.trim()));
    }
    non_empty_env("HSA_LOG_DIR").map(PathBuf::from)
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn init_logging(config: &Config) {
    let level = non_empty_env("HSA_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stdout_enabled = std::env::var("HSA_LOG_STDOUT")
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false);

    let writer = if let Some(file) = config.log_dir.as_deref().and_then(open_log_file) {
        BoxMakeWriter::new(Mutex::new(file))
    } else if stdout_enabled {
        BoxMakeWriter::new(io::stdout)
    } else {
        BoxMakeWriter::new(io::sink)
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
}

fn open_log_file(dir: &Path) -> Option<std::fs::File> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("log_dir_error: {err}");
        return None;
    }
    let path = dir.join(format!("hsa-dashboard-{}.log", std::process::id()));
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("log_file_error: {err}");
            None
        }
    }
}
