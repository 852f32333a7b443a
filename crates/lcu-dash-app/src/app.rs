// Application state and orchestration logic.
//
// One task owns the `ViewStateStore` and folds four inputs into it: push
// events, poll/fetch completions, user commands, and nothing else. Network
// calls run in spawned tasks and report back through `fetch_tx` with the
// generation they were started under.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lcu_dash_core::dispatcher;
use lcu_dash_core::normalize;
use lcu_dash_core::protocol::{
    ClientEvent, PlayerRef, RosterSide, ServerEvent, UiUpdate, UserCommand,
};
use lcu_dash_core::reconciler::Applied;
use lcu_dash_core::stats::{MatchSummary, RankEntry};
use lcu_dash_core::store::{RosterBatch, SearchOutcome, SearchTicket, ViewStateStore};

use crate::api::{Backend, HistoryQuery};
use crate::config::Config;
use crate::poller::Poller;
use crate::push::PushEvent;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Completion of a spawned network call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    Champions(Result<Vec<(u32, String)>, String>),
    /// `Err` leaves the connection flag alone.
    Poll(Result<bool, String>),
    Search {
        generation: u64,
        outcome: SearchOutcome,
        /// Shown to the user when the profile could not be loaded.
        error: Option<String>,
    },
    PlayerStats {
        side: RosterSide,
        generation: u64,
        index: usize,
        ranks: Option<Vec<RankEntry>>,
        matches: Option<Vec<MatchSummary>>,
    },
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub config: Config,
    pub store: ViewStateStore,
    backend: Arc<dyn Backend>,
    /// Cloned into every spawned fetch.
    fetch_tx: mpsc::Sender<FetchEvent>,
    outbound_tx: mpsc::Sender<ClientEvent>,
    poller: Poller,
    push_task: Option<JoinHandle<anyhow::Result<()>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: ViewStateStore,
        backend: Arc<dyn Backend>,
        fetch_tx: mpsc::Sender<FetchEvent>,
        outbound_tx: mpsc::Sender<ClientEvent>,
    ) -> Self {
        Self {
            config,
            store,
            backend,
            fetch_tx,
            outbound_tx,
            poller: Poller::new(),
            push_task: None,
        }
    }

    /// Hand over the push transport task so teardown can abort it.
    pub fn attach_push_task(&mut self, task: JoinHandle<anyhow::Result<()>>) {
        if let Some(old) = self.push_task.replace(task) {
            old.abort();
        }
    }

    /// Session start: restore preferences, load the champion catalogue and
    /// start the status poll (first tick fires immediately).
    pub fn mount(&mut self) {
        self.store.load_preferences();
        self.spawn_champions();
        self.start_polling();
    }

    /// Stop the timer and the push transport.
    pub fn teardown(&mut self) {
        self.poller.stop();
        if let Some(task) = self.push_task.take() {
            task.abort();
            info!("Push transport stopped");
        }
    }

    pub fn start_polling(&mut self) -> bool {
        let backend = Arc::clone(&self.backend);
        let tx = self.fetch_tx.clone();
        self.poller.start(self.config.poll_interval(), move || {
            let backend = Arc::clone(&backend);
            let tx = tx.clone();
            async move {
                let result = backend.lcu_status().await.map_err(|e| e.to_string());
                tx.send(FetchEvent::Poll(result)).await.is_ok()
            }
        })
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    fn spawn_champions(&self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = match backend.champions().await {
                Ok(value) => normalize::champion_map(&value)
                    .ok_or_else(|| "champion list is not an object".to_string()),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(FetchEvent::Champions(result)).await;
        });
    }

    fn spawn_search(&self, ticket: SearchTicket) {
        let backend = Arc::clone(&self.backend);
        let tx = self.fetch_tx.clone();
        let count = self.config.stats.history_count;
        let template = self.config.stats.icon_url_template.clone();

        tokio::spawn(async move {
            let riot_id = ticket.request.riot_id();
            let history_query = HistoryQuery::Name(riot_id.clone());
            let (rank, history) = tokio::join!(
                backend.summoner_rank(&riot_id),
                backend.history(&history_query, count, 1),
            );

            let (profile, error) = match rank {
                Ok(value) => match normalize::profile(&riot_id, &value, &template) {
                    Some(profile) => (Some(profile), None),
                    None => (None, Some(format!("Could not load {riot_id}: {}", rejection_reason(&value)))),
                },
                Err(e) => {
                    warn!("Rank lookup for {riot_id} failed: {e}");
                    (None, Some(format!("Could not load {riot_id}: {e}")))
                }
            };
            let matches = match history {
                Ok(value) => normalize::match_list(&value),
                Err(e) => {
                    warn!("History lookup for {riot_id} failed: {e}");
                    None
                }
            };

            let _ = tx
                .send(FetchEvent::Search {
                    generation: ticket.generation,
                    outcome: SearchOutcome { profile, matches },
                    error,
                })
                .await;
        });
    }

    /// One task per player; each reports into its own card index.
    fn spawn_roster(&self, batch: RosterBatch) {
        for (index, player) in batch.targets {
            let backend = Arc::clone(&self.backend);
            let tx = self.fetch_tx.clone();
            let count = self.config.stats.history_count;
            let side = batch.side;
            let generation = batch.generation;

            tokio::spawn(async move {
                let (ranks, matches) = fetch_player_stats(backend.as_ref(), &player, count).await;
                let _ = tx
                    .send(FetchEvent::PlayerStats {
                        side,
                        generation,
                        index,
                        ranks,
                        matches,
                    })
                    .await;
            });
        }
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Rank queues from `summoner_stats` and games from `get_history`, fetched
/// concurrently. Either side is `None` when it failed.
async fn fetch_player_stats(
    backend: &dyn Backend,
    player: &PlayerRef,
    count: u32,
) -> (Option<Vec<RankEntry>>, Option<Vec<MatchSummary>>) {
    let query = match &player.puuid {
        Some(puuid) => HistoryQuery::Puuid(puuid.clone()),
        None => HistoryQuery::Name(player.riot_id()),
    };
    let (stats, history) = tokio::join!(
        backend.summoner_stats(&player.game_name, &player.tag_line, player.puuid.as_deref()),
        backend.history(&query, count, 1),
    );

    let ranks = match stats {
        Ok(value) => normalize::rank_entries(&value),
        Err(e) => {
            debug!("summoner_stats for {} failed: {e}", player.riot_id());
            None
        }
    };
    let matches = match history {
        Ok(value) => normalize::match_list(&value),
        Err(e) => {
            debug!("get_history for {} failed: {e}", player.riot_id());
            None
        }
    };
    (ranks, matches)
}

/// Best-effort reason from a `{success: false, ...}` body.
fn rejection_reason(value: &Value) -> String {
    ["message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or("summoner not found")
        .to_string()
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the application event loop.
///
/// Listens on three channels using `tokio::select!`:
/// 1. Push-channel events
/// 2. Fetch completions (poll, search, per-player stats)
/// 3. User commands from the console
///
/// Pushes UI updates through `ui_tx`. Ends on `Quit` or when the command
/// channel closes; tears down the poll timer and push task on exit.
pub async fn run(
    mut push_rx: mpsc::Receiver<PushEvent>,
    mut fetch_rx: mpsc::Receiver<FetchEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    // A closed receiver is replaced by a disabled branch so select! never
    // spins on it.
    let mut push_open = true;
    let mut fetch_open = true;

    loop {
        tokio::select! {
            // --- Push channel ---
            event = push_rx.recv(), if push_open => {
                match event {
                    Some(event) => handle_push_event(&mut state, event, &ui_tx).await,
                    None => {
                        info!("Push channel closed");
                        push_open = false;
                    }
                }
            }

            // --- Fetch completions ---
            event = fetch_rx.recv(), if fetch_open => {
                match event {
                    Some(event) => handle_fetch_event(&mut state, event, &ui_tx).await,
                    None => {
                        info!("Fetch channel closed");
                        fetch_open = false;
                    }
                }
            }

            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => handle_user_command(&mut state, cmd, &ui_tx).await,
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    state.teardown();
    info!("Application event loop exiting");
    Ok(())
}

async fn send_snapshot(state: &AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let _ = ui_tx
        .send(UiUpdate::Snapshot(Box::new(state.store.snapshot())))
        .await;
}

/// Publish a connection flip (if any) followed by the new status line.
async fn publish_applied(state: &AppState, applied: Applied, ui_tx: &mpsc::Sender<UiUpdate>) {
    if applied.changed {
        let _ = ui_tx.send(UiUpdate::ConnectionChanged(applied.connected)).await;
    }
    publish_status(state, ui_tx).await;
}

async fn publish_status(state: &AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let _ = ui_tx
        .send(UiUpdate::StatusLine(state.store.status_line().to_string()))
        .await;
}

async fn handle_push_event(state: &mut AppState, event: PushEvent, ui_tx: &mpsc::Sender<UiUpdate>) {
    match event {
        PushEvent::Connected => {
            state.store.set_status_line("Connected to server");
            publish_status(state, ui_tx).await;
        }
        PushEvent::ConnectError(e) => {
            state.store.set_status_line(format!("Connection failed: {e}"));
            publish_status(state, ui_tx).await;
        }
        PushEvent::Disconnected(reason) => {
            state.store.set_status_line(format!("Connection lost: {reason}"));
            publish_status(state, ui_tx).await;
        }
        PushEvent::Server(ServerEvent::StatusUpdate(update)) => {
            let applied = state.store.apply_push_status(&update);
            publish_applied(state, applied, ui_tx).await;
        }
        PushEvent::Server(ServerEvent::LcuStatus(status)) => {
            let applied = state.store.apply_push_lcu_status(status.connected, status.port);
            publish_applied(state, applied, ui_tx).await;
        }
        PushEvent::Server(ServerEvent::TeammatesFound { teammates }) => {
            handle_roster(state, RosterSide::Teammates, &teammates, ui_tx).await;
        }
        PushEvent::Server(ServerEvent::EnemiesFound { enemies }) => {
            handle_roster(state, RosterSide::Enemies, &enemies, ui_tx).await;
        }
        PushEvent::Server(ServerEvent::ServerShutdown { reason }) => {
            let reason = reason.unwrap_or_else(|| "no reason given".to_string());
            warn!("Backend shutting down: {reason}");
            let _ = ui_tx
                .send(UiUpdate::warning(format!("Server is shutting down: {reason}")))
                .await;
        }
    }
}

async fn handle_roster(
    state: &mut AppState,
    side: RosterSide,
    players: &[PlayerRef],
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    let noun = match side {
        RosterSide::Teammates => "teammates",
        RosterSide::Enemies => "enemies",
    };
    info!("Found {} {noun}", players.len());

    let batch = state.store.begin_roster(side, players);
    state.store.set_status_line(format!("Found {} {noun}!", players.len()));
    state.spawn_roster(batch);

    publish_status(state, ui_tx).await;
    send_snapshot(state, ui_tx).await;
}

async fn handle_fetch_event(state: &mut AppState, event: FetchEvent, ui_tx: &mpsc::Sender<UiUpdate>) {
    match event {
        FetchEvent::Champions(Ok(champions)) => {
            state.store.set_champions(champions);
        }
        FetchEvent::Champions(Err(e)) => {
            warn!("Failed to load champions: {e}");
            let _ = ui_tx
                .send(UiUpdate::warning(format!("Champion list unavailable: {e}")))
                .await;
        }
        FetchEvent::Poll(Ok(connected)) => {
            let applied = state.store.apply_poll(connected);
            publish_applied(state, applied, ui_tx).await;
        }
        FetchEvent::Poll(Err(e)) => {
            warn!("Status poll failed: {e}");
        }
        FetchEvent::Search {
            generation,
            outcome,
            error,
        } => {
            if !state.store.apply_search_result(generation, outcome) {
                return;
            }
            if let Some(message) = error {
                let _ = ui_tx.send(UiUpdate::error(message)).await;
            }
            send_snapshot(state, ui_tx).await;
        }
        FetchEvent::PlayerStats {
            side,
            generation,
            index,
            ranks,
            matches,
        } => {
            if state
                .store
                .apply_player_stats(side, generation, index, ranks, matches)
            {
                send_snapshot(state, ui_tx).await;
            }
        }
    }
}

/// Handle a user command from the console.
async fn handle_user_command(state: &mut AppState, cmd: UserCommand, ui_tx: &mpsc::Sender<UiUpdate>) {
    match cmd {
        UserCommand::Toggle(automation) => match dispatcher::toggle(&mut state.store, automation) {
            Ok(event) => {
                // Never wait on the transport: it only drains this queue while
                // a socket is up.
                let notice = match state.outbound_tx.try_send(event) {
                    Ok(()) => {
                        let on = state.store.toggles().get(automation);
                        UiUpdate::info(dispatcher::toggle_notice(automation, on))
                    }
                    Err(e) => {
                        let reason = match e {
                            TrySendError::Full(_) => "push channel is backed up",
                            TrySendError::Closed(_) => "push channel is closed",
                        };
                        warn!("{} not sent: {reason}", automation.label());
                        state.store.flip_toggle(automation);
                        UiUpdate::warning(format!("{} not sent: {reason}", automation.label()))
                    }
                };
                let _ = ui_tx.send(notice).await;
                send_snapshot(state, ui_tx).await;
            }
            Err(e) => {
                let _ = ui_tx.send(UiUpdate::error(e.to_string())).await;
            }
        },
        UserCommand::Search(query) => match dispatcher::search(&mut state.store, &query) {
            Ok(ticket) => {
                let _ = ui_tx
                    .send(UiUpdate::info(format!("Searching {}...", ticket.request.riot_id())))
                    .await;
                state.spawn_search(ticket);
            }
            Err(e) => {
                let _ = ui_tx.send(UiUpdate::warning(e.to_string())).await;
            }
        },
        UserCommand::SetSlot {
            kind,
            index,
            champion,
        } => {
            let result = dispatcher::resolve_champion(&state.store, &champion)
                .map_err(|e| e.to_string())
                .and_then(|id| {
                    state
                        .store
                        .set_slot(kind, index, id)
                        .map_err(|e| e.to_string())
                });
            match result {
                Ok(()) => send_snapshot(state, ui_tx).await,
                Err(message) => {
                    let _ = ui_tx.send(UiUpdate::warning(message)).await;
                }
            }
        }
        UserCommand::AddSlot(kind) => {
            state.store.add_slot(kind);
            send_snapshot(state, ui_tx).await;
        }
        UserCommand::RemoveSlot { kind, index } => match state.store.remove_slot(kind, index) {
            Ok(()) => send_snapshot(state, ui_tx).await,
            Err(e) => {
                let _ = ui_tx.send(UiUpdate::warning(e.to_string())).await;
            }
        },
        UserCommand::ShowStatus => {
            send_snapshot(state, ui_tx).await;
        }
        UserCommand::Quit => {
            // Handled in the main loop
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
