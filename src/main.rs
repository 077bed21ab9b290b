mod app;
mod cache;
mod config;
mod error;
mod github;
mod logging;
mod orchestrator;
mod repo;
mod ui;

use anyhow::Result;
use app::{Action, App};
use cache::Cache;
use clap::Parser;
use config::Config;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use github::{GhCli, Provider};
use orchestrator::{OpResult, Orchestrator};
use ratatui::prelude::*;
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(Parser, Debug)]
#[command(name = "gh-repo-review")]
#[command(about = "Review, archive and delete your GitHub repositories", long_about = None)]
struct Args {
    /// Always fetch from GitHub, ignoring the local cache
    #[arg(long)]
    no_cache: bool,

    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    logging::init_tracing(&config.log_level, &Config::log_path());
    let cache = Cache::new(config.cache_dir());
    tracing::info!(
        config = %config_path.display(),
        cache = %cache.dir().display(),
        use_cache = !args.no_cache,
        "starting"
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config.filter_options());
    app.set_viewport_height(terminal.size()?.height);

    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(GhCli::new(), cache, tx, !args.no_cache);
    orchestrator.dispatch(Action::StartupLoad);

    let res = run_app(&mut terminal, &mut app, &orchestrator, rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("{err:?}");
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

async fn run_app<B: Backend, P: Provider>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    orchestrator: &Orchestrator<P>,
    mut rx: UnboundedReceiver<OpResult>,
) -> Result<()> {
    let mut events = EventStream::new();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            Some(result) = rx.recv() => {
                tracing::debug!(kind = result.kind(), "operation finished");
                for action in app.fold(result) {
                    orchestrator.dispatch(action);
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        for action in app.handle_key(key) {
                            orchestrator.dispatch(action);
                        }
                    }
                    Some(Ok(Event::Resize(_, height))) => app.set_viewport_height(height),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
