// lcu-dash entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open the preferences database
// 4. Create mpsc channels
// 5. Spawn push-channel task
// 6. Build AppState and mount it (preferences, champions, status poll)
// 7. Spawn app logic task
// 8. Console loop (stdin commands, stdout updates)
// 9. Cleanup on exit

use std::sync::Arc;

use lcu_dash_app::api::HttpBackend;
use lcu_dash_app::app;
use lcu_dash_app::config;
use lcu_dash_app::console;
use lcu_dash_app::push;
use lcu_dash_core::persistence::SqliteStore;
use lcu_dash_core::protocol::UserCommand;
use lcu_dash_core::store::ViewStateStore;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("lcu-dash starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: backend={}, push={}, poll every {}s",
        config.backend.base_url, config.push.url, config.poll.interval_secs
    );

    // 3. Open the preferences database
    let db_path = config.resolved_db_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db_path_str = db_path.to_string_lossy().into_owned();
    let storage = SqliteStore::open(&db_path_str).context("failed to open preferences database")?;
    info!("Preferences database opened at {db_path_str}");

    let store = ViewStateStore::new(Box::new(storage), config.session.assume_connected);
    let backend = HttpBackend::new(&config.backend.base_url, config.request_timeout())
        .context("failed to build HTTP client")?;

    // 4. Create mpsc channels
    let (push_tx, push_rx) = mpsc::channel(256);
    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let (fetch_tx, fetch_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, mut ui_rx) = mpsc::channel(256);

    // 5. Spawn push-channel task
    let push_handle = tokio::spawn(push::run(
        config.push.url.clone(),
        config.reconnect_delay(),
        push_tx,
        outbound_rx,
    ));

    // 6. Build AppState and mount it
    let mut app_state = app::AppState::new(config, store, Arc::new(backend), fetch_tx, outbound_tx);
    app_state.attach_push_task(push_handle);
    app_state.mount();

    // 7. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(push_rx, fetch_rx, cmd_rx, ui_tx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    // 8. Console loop
    let printer = tokio::spawn(async move {
        while let Some(update) = ui_rx.recv().await {
            println!("{}", console::describe(&update));
        }
    });

    println!("{}", console::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin error: {}", e);
                break;
            }
        };
        if line.trim().eq_ignore_ascii_case("help") {
            println!("{}", console::HELP);
            continue;
        }
        match console::parse_command(&line) {
            Ok(cmd) => {
                let quit = cmd == UserCommand::Quit;
                if cmd_tx.send(cmd).await.is_err() || quit {
                    break;
                }
            }
            Err(message) => println!("{message}"),
        }
    }
    drop(cmd_tx);

    // 9. Cleanup: wait for app task to finish (with timeout)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;
    printer.abort();

    info!("lcu-dash shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (stdout belongs to the console).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("lcu-dash.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("lcu_dash=info,lcu_dash_app=info,lcu_dash_core=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
