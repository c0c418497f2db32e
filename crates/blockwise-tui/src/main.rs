use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use blockwise_client::ApiClient;
use blockwise_core::{
    resolve_shared_paths, ChannelNotifier, CompileController, ConfigStore, Notification,
    SessionContext, SessionStore,
};
use blockwise_observability::{emit_event, init_process_logging, ObservabilityEvent, ProcessKind};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

mod app;
mod ui;

use app::{Action, App};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = resolve_shared_paths()?;
    let config_store = ConfigStore::new(&paths.project_config_path, None).await?;
    let config = config_store.get().await;

    // The terminal owns stdout; logs only go to the JSONL files.
    let (_log_guard, log_info) =
        init_process_logging(ProcessKind::Tui, &paths.logs_dir, config.log_retention_days)?;
    emit_event(
        tracing::Level::INFO,
        ProcessKind::Tui,
        ObservabilityEvent {
            event: "tui.start",
            component: "tui.main",
            detail: Some(log_info.logs_dir.as_str()),
            ..Default::default()
        },
    );

    let session = SessionContext::new();
    let session_store = SessionStore::new(&paths.session_path);
    match session_store.load().await {
        Ok(Some(stored)) => session.sign_in(stored),
        Ok(None) => {}
        Err(err) => tracing::warn!("could not read stored session: {err:#}"),
    }

    let client = ApiClient::new(&config, session)?;
    let (notifier, notifications) = ChannelNotifier::new();
    let controller = CompileController::new(Arc::new(client.clone()), Arc::new(notifier))
        .with_process(ProcessKind::Tui);
    let (action_tx, actions) = mpsc::unbounded_channel();

    let mut app = App::new(client, controller, session_store, action_tx);
    app.start();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, actions, notifications).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("tui exited with error: {err:#}");
        eprintln!("{err:?}");
    }

    Ok(())
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut actions: UnboundedReceiver<Action>,
    mut notifications: UnboundedReceiver<Notification>,
) -> anyhow::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Short poll so background results show up promptly.
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0))
            .min(Duration::from_millis(50));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = app.handle_key_event(key) {
                        if action == Action::Quit {
                            return Ok(());
                        }
                        app.update(action).await?;
                    }
                }
            }
        }

        while let Ok(action) = actions.try_recv() {
            app.update(action).await?;
        }
        while let Ok(notification) = notifications.try_recv() {
            app.update(Action::Notified(notification)).await?;
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
