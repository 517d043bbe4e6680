//! zktop: a top-like terminal dashboard for a ZooKeeper ensemble.
//!
//! Each configured server is polled over its plaintext admin port by its own
//! background task; results funnel through one channel into the render loop,
//! which owns all view state. Keyboard, resize, and timer events share a
//! single polled read, so the loop never blocks for more than one tick.
//!
//! ## Usage
//!
//! ```bash
//! # Watch a three-node ensemble
//! zktop --servers zk1:2181,zk2:2181,zk3:2181
//!
//! # Pull the server list from a ZooKeeper config file
//! zktop --config /etc/zookeeper/zoo.cfg
//! ```

mod app;
mod client;
mod config;
mod poller;
mod stat;
mod ui;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use app::{App, Command};
use client::ClientOptions;
use stat::ServerRecord;

/// Render tick; also bounds the per-tick input read.
const TICK: Duration = Duration::from_millis(250);

/// Terminal dashboard for monitoring a ZooKeeper ensemble
#[derive(Parser, Debug)]
#[command(name = "zktop")]
#[command(about, long_about = None)]
struct Args {
    /// Comma separated list of host:port (port defaults to 2181)
    #[arg(long, default_value = "localhost:2181")]
    servers: String,

    /// ZooKeeper configuration file to look up servers from
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resolve session client names from addresses
    #[arg(short = 'n', long)]
    names: bool,

    /// Show the server version column
    #[arg(short = 'V', long)]
    versions: bool,

    /// Skip the write-side shutdown after sending a command
    /// (workaround for a bug in ZooKeeper 3.3.0)
    #[arg(long = "fix-330")]
    fix_330: bool,

    /// Connection timeout in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// File to write logs to, or none for no logging
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// Log verbosity (trace, debug, info, warn, error)
    #[arg(short = 'v', long, default_value = "debug")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout is the rendering surface, so logs only ever go to a file.
    if let Some(path) = &args.logfile {
        let file = File::create(path)
            .with_context(|| format!("unable to open logfile `{}`", path.display()))?;
        let filter = EnvFilter::try_new(args.verbosity.to_lowercase())
            .with_context(|| format!("invalid verbosity `{}`", args.verbosity))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    }

    let endpoints = match &args.config {
        Some(path) => config::endpoints_from_config(path)?,
        None => config::parse_server_list(&args.servers)?,
    };

    let client_opts = ClientOptions {
        timeout: args.timeout.map(Duration::from_secs_f64),
        half_close: !args.fix_330,
    };

    // Pollers publish into an unbounded channel so they can never be stalled
    // by the consumer; the wake broadcast cuts their inter-poll wait short.
    let (records_tx, records_rx) = mpsc::unbounded_channel();
    let (wake_tx, _) = broadcast::channel(16);
    poller::spawn_pollers(&endpoints, &client_opts, &records_tx, &wake_tx);

    let mut app = App::new(endpoints, args.versions, args.names);

    // Setup terminal with panic hook for cleanup
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    tracing::info!("starting render loop");
    let result = run_app(&mut terminal, &mut app, records_rx, &wake_tx, &client_opts).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// The render loop: drain poll results, repaint, handle at most one input
/// event per tick. Pollers have no shutdown protocol; returning from here
/// ends the process and takes them with it.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut records_rx: mpsc::UnboundedReceiver<ServerRecord>,
    wake_tx: &broadcast::Sender<()>,
    client_opts: &ClientOptions,
) -> Result<()> {
    loop {
        // Apply everything the pollers produced since the last tick.
        while let Ok(record) = records_rx.try_recv() {
            app.apply(record);
        }

        terminal.draw(|frame| ui::draw(frame, app))?;

        // One input event per tick; the poll timeout is the tick timer.
        if event::poll(TICK)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match app.on_key(key.code) {
                        Command::Quit => return Ok(()),
                        Command::ResetStats => {
                            poller::spawn_reset(
                                app.endpoints.clone(),
                                client_opts.clone(),
                                wake_tx.clone(),
                            );
                            let count = app.endpoints.len();
                            app.show_flash(format!("Server stats reset ({count} servers)"));
                        }
                        Command::Refresh => {
                            let _ = wake_tx.send(());
                        }
                        Command::None => {}
                    }
                }
                Event::Resize(cols, rows) => {
                    // Layout is recomputed on the next draw; the pollers
                    // just need a nudge so the new frame is fresh.
                    tracing::debug!(cols, rows, "terminal resized");
                    let _ = wake_tx.send(());
                }
                _ => {}
            }
        }

        app.tick_flash();

        if app.should_quit {
            return Ok(());
        }
    }
}
