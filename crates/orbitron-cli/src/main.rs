//! Orbitron CLI - Terminal client for the Orbitron computer-use agent.
//!
//! This is the entry point for the `orbitron` binary.

mod app;
mod client;
mod config;
mod health;
mod highlight;
mod stream;
mod theme;
mod ui;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use app::App;
use client::{ChatTransport, HttpTransport};
use config::ClientConfig;
use health::HealthMonitor;
use stream::StreamEvent;

const DEFAULT_LOG_FILTER: &str = "orbitron_core=debug,orbitron_cli=debug,warn";

/// Orbitron CLI - Terminal client for the Orbitron computer-use agent.
#[derive(Parser, Debug)]
#[command(name = "orbitron")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "ORBITRON_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// Path of the chat endpoint.
    #[arg(long, env = "ORBITRON_CHAT_PATH", default_value = "/api/chat")]
    chat_path: String,

    /// Seconds between backend status probes.
    #[arg(long, env = "ORBITRON_HEALTH_INTERVAL", default_value_t = 5)]
    health_interval_secs: u64,

    /// Connect timeout in seconds.
    #[arg(long, env = "ORBITRON_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Seconds a backend status probe may take.
    #[arg(long, env = "ORBITRON_PROBE_TIMEOUT", default_value_t = 5)]
    probe_timeout_secs: u64,

    /// Enable debug logging to the log file.
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Log destination (with --debug).
    #[arg(long, env = "ORBITRON_LOG_FILE", default_value = "orbitron.log")]
    log_file: PathBuf,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_url: self.server.clone(),
            chat_path: self.chat_path.clone(),
            health_interval_seconds: self.health_interval_secs,
            connect_timeout_seconds: self.connect_timeout_secs,
            probe_timeout_seconds: self.probe_timeout_secs,
        }
    }
}

/// Log to a file so the TUI is left intact.
fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        init_logging(&args.log_file)?;
    }

    let config = args.client_config();

    // Create transport and start the status monitor
    let http = HttpTransport::new(&config).context("Failed to build HTTP client")?;
    tracing::info!(server = %config.base_url(), chat_url = %http.chat_url(), "Starting Orbitron CLI");

    let transport: Arc<dyn ChatTransport> = Arc::new(http);
    let monitor = health::spawn_monitor(Arc::clone(&transport), config.health_interval());

    // Setup terminal with mouse capture enabled
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app
    let mut app = App::new(transport, config.base_url());
    app.set_connected(monitor.is_connected());

    // Run the event loop
    let result = run_event_loop(&mut terminal, &mut app, &monitor).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

/// Main event loop.
///
/// Redraws immediately on every reply event and on backend status changes.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    monitor: &HealthMonitor,
) -> anyhow::Result<()> {
    // Channel for reply stream events
    let (stream_tx, mut stream_rx) = mpsc::channel::<StreamEvent>(128);
    let mut status = monitor.subscribe();

    loop {
        app.tick_animation();
        terminal.draw(|f| ui::render(f, app))?;

        // Use a shorter tick rate during streaming for responsiveness
        let tick_rate = if app.needs_immediate_redraw() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            // Terminal events - poll with short timeout
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt, &stream_tx, monitor);
                    }
                }
            }

            // Reply events - applied one at a time, in order
            Some(event) = stream_rx.recv() => {
                if app.handle_stream_event(event) {
                    terminal.draw(|f| ui::render(f, app))?;
                }
            }

            // Backend status changes
            Ok(()) = status.changed() => {
                let connected = *status.borrow_and_update();
                if app.set_connected(connected) {
                    tracing::debug!(connected, "Backend status shown");
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.cancel_streaming();

    Ok(())
}

/// Handle input events.
fn handle_input(
    app: &mut App,
    event: Event,
    stream_tx: &mpsc::Sender<StreamEvent>,
    monitor: &HealthMonitor,
) {
    match event {
        Event::Key(key) => {
            // Only handle key press events
            if key.kind == KeyEventKind::Press {
                handle_key(app, key, stream_tx, monitor);
            }
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_chat_up(3),
            MouseEventKind::ScrollDown => app.scroll_chat_down(3),
            _ => {}
        },
        _ => {}
    }
}

/// Handle a key press.
fn handle_key(
    app: &mut App,
    key: KeyEvent,
    stream_tx: &mpsc::Sender<StreamEvent>,
    monitor: &HealthMonitor,
) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
        }
        KeyCode::Esc => {
            if !app.cancel_streaming() {
                app.clear_error();
            }
        }
        KeyCode::Enter => {
            if app.is_streaming() {
                app.set_error("Wait for the current reply to finish (Esc to cancel)");
            } else {
                app.submit(stream_tx);
            }
        }

        // Scrolling
        KeyCode::PageUp => app.scroll_chat_up(10),
        KeyCode::PageDown => app.scroll_chat_down(10),
        KeyCode::Up if ctrl => app.scroll_desktop_up(5),
        KeyCode::Down if ctrl => app.scroll_desktop_down(5),

        // Commands
        KeyCode::Char('t') if ctrl => app.toggle_theme(),
        KeyCode::Char('r') if ctrl => {
            monitor.reprobe();
            app.set_status("Reconnecting...");
        }

        // Line editing
        KeyCode::Char('a') if ctrl => app.move_cursor_start(),
        KeyCode::Char('e') if ctrl => app.move_cursor_end(),
        KeyCode::Char('u') if ctrl => app.clear_input(),
        KeyCode::Char('w') if ctrl => app.delete_word(),
        KeyCode::Char(_) if ctrl => {}
        KeyCode::Char(c) => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        _ => {}
    }
}
