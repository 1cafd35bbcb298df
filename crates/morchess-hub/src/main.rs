mod app;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

use morchess_core::db;
use morchess_core::editor::{
    Editor, EditorConfig, EditorContext, clipboard::ArboardClipboard, store::SqliteProgramStore,
};

use app::{App, HubHost};

#[derive(Parser, Debug)]
#[command(name = "morchess")]
#[command(about = "Modal editor for morchess rule programs", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the program database (default: shared data directory)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Path to log file for editor diagnostics (default: system temp dir)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Name the program is stored under
    #[arg(long, value_name = "NAME")]
    storage_key: Option<String>,
}

/// Stdout belongs to the terminal UI, so diagnostics go to a file.
/// `RUST_LOG` overrides the default `info` filter.
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("morchess.log"));
    init_logging(&log_file)?;

    let conn = match &args.db {
        Some(path) => db::open_db_at(path)?,
        None => db::open_db()?,
    };
    let store = SqliteProgramStore::new(conn)?;

    let mut config = EditorConfig::default();
    if let Some(key) = args.storage_key {
        config.storage_key = key;
    }
    let mut editor = Editor::new(
        config,
        EditorContext {
            host: HubHost::default(),
            store: Box::new(store),
            clipboard: Box::new(ArboardClipboard),
        },
    );
    editor.load()?;
    info!(log = %log_file.display(), "morchess started");

    let mut app = App::new(editor);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main event loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        tracing::error!("event loop failed: {err:#}");
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    const TICK_RATE: Duration = Duration::from_millis(50);

    loop {
        terminal.draw(|frame| {
            app.render(frame);
        })?;

        if app.should_quit() {
            return Ok(());
        }

        // Poll with timeout so pending clipboard reads get applied
        if event::poll(TICK_RATE)? {
            let ev = event::read()?;
            app.handle_event(ev);
        }

        app.tick();
    }
}
