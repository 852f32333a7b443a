// View state: the single owner of everything the dashboard shows.
//
// All mutation goes through `ViewStateStore`. Network results arrive later
// than the request that caused them, so every async batch is tagged with a
// generation number and results from a superseded batch are dropped.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::persistence::{PersistenceError, PersistencePort};
use crate::protocol::{Automation, AutomationToggles, DashboardSnapshot, PlayerRef, RosterSide, StatusUpdate};
use crate::reconciler::{Applied, ConnectionStatusReconciler};
use crate::slots::{ChampionSlots, SlotError, SlotKind};
use crate::stats::{self, AggregatedStats, MatchSummary, RankEntry};

// ---------------------------------------------------------------------------
// View types
// ---------------------------------------------------------------------------

/// Profile of the last searched summoner. Replaced wholesale per search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummonerProfile {
    pub display_name: String,
    pub level: u32,
    pub icon_url: String,
    pub ranks: Vec<RankEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardStats {
    Loading,
    Ready(AggregatedStats),
    Unavailable,
}

impl CardStats {
    pub fn summary(&self) -> &str {
        match self {
            CardStats::Loading => "Loading...",
            CardStats::Ready(aggregated) => &aggregated.summary_line,
            CardStats::Unavailable => stats::UNAVAILABLE_SUMMARY,
        }
    }
}

/// One teammate or enemy row during champion select.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerCard {
    pub game_name: String,
    pub tag_line: String,
    pub puuid: Option<String>,
    pub champion: Option<String>,
    pub stats: CardStats,
}

impl PlayerCard {
    fn loading(player: &PlayerRef) -> Self {
        Self {
            game_name: player.game_name.clone(),
            tag_line: player.tag_line.clone(),
            puuid: player.puuid.clone(),
            champion: player.champion.clone(),
            stats: CardStats::Loading,
        }
    }
}

// ---------------------------------------------------------------------------
// Async batch types
// ---------------------------------------------------------------------------

/// A validated summoner search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub game_name: String,
    pub tag_line: Option<String>,
}

impl SearchRequest {
    /// `Name#TAG`, or just the name when no tag was given.
    pub fn riot_id(&self) -> String {
        match &self.tag_line {
            Some(tag) => format!("{}#{}", self.game_name, tag),
            None => self.game_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub generation: u64,
    pub request: SearchRequest,
}

/// Normalized results of a search. `None` marks a source that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub profile: Option<SummonerProfile>,
    pub matches: Option<Vec<MatchSummary>>,
}

/// Per-player fetches to run for one roster announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterBatch {
    pub side: RosterSide,
    pub generation: u64,
    /// Card index paired with the player to fetch.
    pub targets: Vec<(usize, PlayerRef)>,
}

// ---------------------------------------------------------------------------
// ViewStateStore
// ---------------------------------------------------------------------------

pub struct ViewStateStore {
    reconciler: ConnectionStatusReconciler,
    profile: Option<SummonerProfile>,
    profile_stats: Option<AggregatedStats>,
    recent_matches: Vec<MatchSummary>,
    toggles: AutomationToggles,
    ban_slots: ChampionSlots,
    pick_slots: ChampionSlots,
    champions: BTreeMap<u32, String>,
    teammates: Vec<PlayerCard>,
    enemies: Vec<PlayerCard>,
    search_generation: u64,
    teammate_generation: u64,
    enemy_generation: u64,
    storage: Box<dyn PersistencePort>,
}

impl ViewStateStore {
    /// `bootstrap` is the connection flag assumed until the first poll.
    pub fn new(storage: Box<dyn PersistencePort>, bootstrap: bool) -> Self {
        Self {
            reconciler: ConnectionStatusReconciler::new(bootstrap),
            profile: None,
            profile_stats: None,
            recent_matches: Vec::new(),
            toggles: AutomationToggles::default(),
            ban_slots: ChampionSlots::new(),
            pick_slots: ChampionSlots::new(),
            champions: BTreeMap::new(),
            teammates: Vec::new(),
            enemies: Vec::new(),
            search_generation: 0,
            teammate_generation: 0,
            enemy_generation: 0,
            storage,
        }
    }

    // --- Connection ---

    pub fn connected(&self) -> bool {
        self.reconciler.connected()
    }

    pub fn status_line(&self) -> &str {
        self.reconciler.status_line()
    }

    pub fn set_status_line(&mut self, text: impl Into<String>) {
        self.reconciler.set_status_line(text);
    }

    pub fn apply_poll(&mut self, connected: bool) -> Applied {
        log_change(self.reconciler.apply_poll(connected), "poll")
    }

    pub fn apply_push_status(&mut self, update: &StatusUpdate) -> Applied {
        log_change(self.reconciler.apply_push_status(update), "status_update")
    }

    pub fn apply_push_lcu_status(&mut self, connected: bool, port: Option<u16>) -> Applied {
        log_change(
            self.reconciler.apply_push_lcu_status(connected, port),
            "lcu_status",
        )
    }

    // --- Automation ---

    pub fn toggles(&self) -> AutomationToggles {
        self.toggles
    }

    pub fn active_module_count(&self) -> usize {
        self.toggles.active_count()
    }

    /// Flip one automation and return its new state. Champion preferences
    /// are saved on every flip.
    pub fn flip_toggle(&mut self, automation: Automation) -> bool {
        let on = self.toggles.flip(automation);
        self.persist_quietly();
        on
    }

    // --- Champion catalogue ---

    pub fn set_champions(&mut self, champions: impl IntoIterator<Item = (u32, String)>) {
        self.champions = champions.into_iter().collect();
        info!("Loaded {} champions", self.champions.len());
    }

    pub fn champion_count(&self) -> usize {
        self.champions.len()
    }

    pub fn champion_name(&self, id: u32) -> Option<&str> {
        self.champions.get(&id).map(String::as_str)
    }

    /// Case-insensitive lookup: an exact name wins, otherwise the lowest id
    /// whose name contains the input.
    pub fn find_champion(&self, input: &str) -> Option<u32> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.champions
            .iter()
            .find(|(_, name)| name.to_lowercase() == needle)
            .or_else(|| {
                self.champions
                    .iter()
                    .find(|(_, name)| name.to_lowercase().contains(&needle))
            })
            .map(|(id, _)| *id)
    }

    // --- Ban/pick slots ---

    pub fn slots(&self, kind: SlotKind) -> &ChampionSlots {
        match kind {
            SlotKind::Ban => &self.ban_slots,
            SlotKind::Pick => &self.pick_slots,
        }
    }

    fn slots_mut(&mut self, kind: SlotKind) -> &mut ChampionSlots {
        match kind {
            SlotKind::Ban => &mut self.ban_slots,
            SlotKind::Pick => &mut self.pick_slots,
        }
    }

    /// Appends one empty slot. Empty slots are never persisted, so this does
    /// not touch storage.
    pub fn add_slot(&mut self, kind: SlotKind) {
        self.slots_mut(kind).add_slot();
    }

    pub fn set_slot(
        &mut self,
        kind: SlotKind,
        index: usize,
        champion: Option<u32>,
    ) -> Result<(), SlotError> {
        self.slots_mut(kind).set(index, champion)?;
        self.persist_quietly();
        Ok(())
    }

    pub fn remove_slot(&mut self, kind: SlotKind, index: usize) -> Result<(), SlotError> {
        self.slots_mut(kind).remove(index)?;
        self.persist_quietly();
        Ok(())
    }

    /// Restore both slot lists. A missing key keeps the default; a blob that
    /// does not parse is logged and ignored.
    pub fn load_preferences(&mut self) {
        for kind in [SlotKind::Ban, SlotKind::Pick] {
            let key = kind.storage_key();
            let raw = match self.storage.get(key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to read {key}: {e}");
                    continue;
                }
            };
            match serde_json::from_str::<Vec<Option<u32>>>(&raw) {
                Ok(ids) => {
                    let ids: Vec<u32> = ids.into_iter().flatten().collect();
                    if !ids.is_empty() {
                        debug!("Restored {} {kind:?} slots", ids.len());
                        *self.slots_mut(kind) = ChampionSlots::restore(&ids);
                    }
                }
                Err(e) => warn!("Ignoring malformed {key}: {e}"),
            }
        }
    }

    /// Write both lists as JSON arrays of their non-empty ids.
    pub fn save_preferences(&self) -> Result<(), PersistenceError> {
        for kind in [SlotKind::Ban, SlotKind::Pick] {
            let ids = self.slots(kind).candidates();
            let blob = serde_json::Value::from(ids).to_string();
            self.storage.set(kind.storage_key(), &blob)?;
        }
        Ok(())
    }

    fn persist_quietly(&self) {
        if let Err(e) = self.save_preferences() {
            warn!("Failed to save champion preferences: {e}");
        }
    }

    // --- Summoner search ---

    /// Start a search. Any result still in flight for an earlier ticket will
    /// be discarded.
    pub fn begin_search(&mut self, request: SearchRequest) -> SearchTicket {
        self.search_generation += 1;
        info!(
            "Searching {} (generation {})",
            request.riot_id(),
            self.search_generation
        );
        SearchTicket {
            generation: self.search_generation,
            request,
        }
    }

    /// Fold a finished search into the view. Returns `false` when the ticket
    /// is stale and nothing changed.
    pub fn apply_search_result(&mut self, generation: u64, outcome: SearchOutcome) -> bool {
        if generation != self.search_generation {
            debug!(
                "Discarding stale search result (gen {generation}, current {})",
                self.search_generation
            );
            return false;
        }

        let ranks = outcome.profile.as_ref().map(|p| p.ranks.as_slice());
        self.profile_stats = Some(stats::aggregate_or_fallback(
            ranks,
            outcome.matches.as_deref(),
        ));
        self.recent_matches = outcome
            .matches
            .as_deref()
            .map(stats::newest_first)
            .unwrap_or_default();
        self.profile = outcome.profile;
        true
    }

    pub fn profile(&self) -> Option<&SummonerProfile> {
        self.profile.as_ref()
    }

    pub fn profile_stats(&self) -> Option<&AggregatedStats> {
        self.profile_stats.as_ref()
    }

    // --- Teammates / enemies ---

    /// Replace one roster with loading cards and hand back the fetches to run.
    pub fn begin_roster(&mut self, side: RosterSide, players: &[PlayerRef]) -> RosterBatch {
        let cards = players.iter().map(PlayerCard::loading).collect();
        let generation = match side {
            RosterSide::Teammates => {
                self.teammates = cards;
                self.teammate_generation += 1;
                self.teammate_generation
            }
            RosterSide::Enemies => {
                self.enemies = cards;
                self.enemy_generation += 1;
                self.enemy_generation
            }
        };
        RosterBatch {
            side,
            generation,
            targets: players.iter().cloned().enumerate().collect(),
        }
    }

    /// Write one player's stats into the card it was fetched for. Returns
    /// `false` when the batch was superseded or the index no longer exists.
    pub fn apply_player_stats(
        &mut self,
        side: RosterSide,
        generation: u64,
        index: usize,
        ranks: Option<Vec<RankEntry>>,
        matches: Option<Vec<MatchSummary>>,
    ) -> bool {
        let (current, cards) = match side {
            RosterSide::Teammates => (self.teammate_generation, &mut self.teammates),
            RosterSide::Enemies => (self.enemy_generation, &mut self.enemies),
        };
        if generation != current {
            debug!("Discarding stale {side:?} stats (gen {generation}, current {current})");
            return false;
        }
        let Some(card) = cards.get_mut(index) else {
            warn!("{side:?} stats for missing card {index}");
            return false;
        };
        card.stats = match stats::aggregate(ranks.as_deref(), matches.as_deref()) {
            Ok(aggregated) => CardStats::Ready(aggregated),
            Err(e) => {
                debug!("{}#{}: {e}", card.game_name, card.tag_line);
                CardStats::Unavailable
            }
        };
        true
    }

    pub fn roster(&self, side: RosterSide) -> &[PlayerCard] {
        match side {
            RosterSide::Teammates => &self.teammates,
            RosterSide::Enemies => &self.enemies,
        }
    }

    // --- Snapshot ---

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            connected: self.connected(),
            status_line: self.status_line().to_string(),
            profile: self.profile.clone(),
            profile_stats: self.profile_stats.clone(),
            recent_matches: self.recent_matches.clone(),
            toggles: self.toggles,
            ban_slots: self.ban_slots.as_slice().to_vec(),
            pick_slots: self.pick_slots.as_slice().to_vec(),
            teammates: self.teammates.clone(),
            enemies: self.enemies.clone(),
        }
    }
}

fn log_change(applied: Applied, source: &str) -> Applied {
    if applied.changed {
        info!(
            "LCU connection is now {} (source: {source})",
            if applied.connected { "up" } else { "down" }
        );
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::stats::MatchResult;
    use chrono::{DateTime, Utc};

    fn store() -> ViewStateStore {
        ViewStateStore::new(Box::new(MemoryStore::new()), false)
    }

    fn player(name: &str) -> PlayerRef {
        PlayerRef {
            game_name: name.into(),
            tag_line: "EUW".into(),
            puuid: None,
            champion: None,
        }
    }

    fn game(result: MatchResult, t: i64) -> MatchSummary {
        MatchSummary {
            result,
            queue_name: "Ranked Solo/Duo".into(),
            kills: 2,
            deaths: 1,
            assists: 3,
            created_at: DateTime::<Utc>::from_timestamp_millis(t).unwrap(),
        }
    }

    #[test]
    fn add_slot_grows_by_one_and_is_not_persisted() {
        let mut s = store();
        s.add_slot(SlotKind::Ban);
        s.add_slot(SlotKind::Ban);
        assert_eq!(s.slots(SlotKind::Ban).len(), 3);
        assert_eq!(s.slots(SlotKind::Pick).len(), 1);
        assert_eq!(s.storage.get("lcu_ui_ban_champions").unwrap(), None);
    }

    #[test]
    fn set_slot_persists_non_empty_ids() {
        let mut s = store();
        s.add_slot(SlotKind::Pick);
        s.set_slot(SlotKind::Pick, 1, Some(64)).unwrap();
        assert_eq!(
            s.storage.get("lcu_ui_pick_champions").unwrap().as_deref(),
            Some("[64]")
        );
        assert_eq!(
            s.storage.get("lcu_ui_ban_champions").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn flip_toggle_returns_new_state_and_saves_preferences() {
        let mut s = store();
        assert!(s.flip_toggle(Automation::Analyze));
        assert!(s.toggles().analyze);
        assert_eq!(s.active_module_count(), 1);
        assert_eq!(
            s.storage.get("lcu_ui_ban_champions").unwrap().as_deref(),
            Some("[]")
        );

        assert!(!s.flip_toggle(Automation::Analyze));
        assert_eq!(s.snapshot().toggles, AutomationToggles::default());
    }

    #[test]
    fn set_slot_out_of_range_leaves_storage_alone() {
        let mut s = store();
        assert!(s.set_slot(SlotKind::Ban, 4, Some(1)).is_err());
        assert_eq!(s.storage.get("lcu_ui_ban_champions").unwrap(), None);
    }

    #[test]
    fn preferences_round_trip_with_trailing_empty() {
        let storage = MemoryStore::new();
        storage.set("lcu_ui_ban_champions", "[157, 238]").unwrap();
        storage.set("lcu_ui_pick_champions", "[]").unwrap();
        let mut s = ViewStateStore::new(Box::new(storage), false);
        s.load_preferences();
        assert_eq!(
            s.slots(SlotKind::Ban).as_slice(),
            &[Some(157), Some(238), None]
        );
        assert_eq!(s.slots(SlotKind::Pick).as_slice(), &[None]);

        s.save_preferences().unwrap();
        s.load_preferences();
        assert_eq!(s.slots(SlotKind::Ban).candidates(), vec![157, 238]);
        assert_eq!(s.slots(SlotKind::Ban).len(), 3);
    }

    #[test]
    fn malformed_preferences_keep_defaults() {
        let storage = MemoryStore::new();
        storage.set("lcu_ui_ban_champions", "{not json").unwrap();
        storage.set("lcu_ui_pick_champions", "[11, null, 64]").unwrap();
        let mut s = ViewStateStore::new(Box::new(storage), false);
        s.load_preferences();
        assert_eq!(s.slots(SlotKind::Ban).as_slice(), &[None]);
        assert_eq!(s.slots(SlotKind::Pick).as_slice(), &[Some(11), Some(64), None]);
    }

    #[test]
    fn find_champion_prefers_exact_then_substring() {
        let mut s = store();
        s.set_champions([
            (1, "Annie".to_string()),
            (22, "Ashe".to_string()),
            (103, "Ahri".to_string()),
            (11, "Master Yi".to_string()),
        ]);
        assert_eq!(s.find_champion("ashe"), Some(22));
        assert_eq!(s.find_champion("  AHRI "), Some(103));
        assert_eq!(s.find_champion("yi"), Some(11));
        assert_eq!(s.find_champion("zzz"), None);
        assert_eq!(s.find_champion(""), None);
        assert_eq!(s.champion_name(11), Some("Master Yi"));
    }

    #[test]
    fn stale_search_result_is_discarded() {
        let mut s = store();
        let first = s.begin_search(SearchRequest {
            game_name: "Old".into(),
            tag_line: None,
        });
        let second = s.begin_search(SearchRequest {
            game_name: "New".into(),
            tag_line: Some("EUW".into()),
        });
        assert_eq!(second.request.riot_id(), "New#EUW");

        let outcome = SearchOutcome {
            profile: None,
            matches: Some(vec![game(MatchResult::Win, 1)]),
        };
        assert!(!s.apply_search_result(first.generation, outcome.clone()));
        assert!(s.profile_stats().is_none());

        assert!(s.apply_search_result(second.generation, outcome));
        assert_eq!(s.profile_stats().unwrap().wins, 1);
    }

    #[test]
    fn failed_search_shows_unavailable_stats() {
        let mut s = store();
        let ticket = s.begin_search(SearchRequest {
            game_name: "Nobody".into(),
            tag_line: None,
        });
        s.apply_search_result(
            ticket.generation,
            SearchOutcome {
                profile: None,
                matches: None,
            },
        );
        let stats = s.profile_stats().unwrap();
        assert_eq!(stats.summary_line, "Stats unavailable");
        assert!(stats.kda.is_none());
        assert!(s.snapshot().recent_matches.is_empty());
    }

    #[test]
    fn search_result_orders_recent_matches_newest_first() {
        let mut s = store();
        let ticket = s.begin_search(SearchRequest {
            game_name: "A".into(),
            tag_line: None,
        });
        s.apply_search_result(
            ticket.generation,
            SearchOutcome {
                profile: None,
                matches: Some(vec![game(MatchResult::Loss, 100), game(MatchResult::Win, 300)]),
            },
        );
        let snap = s.snapshot();
        assert_eq!(snap.recent_matches[0].result, MatchResult::Win);
        assert_eq!(snap.recent_matches[1].result, MatchResult::Loss);
    }

    #[test]
    fn roster_results_land_in_their_own_card() {
        let mut s = store();
        let batch = s.begin_roster(RosterSide::Enemies, &[player("A"), player("B")]);
        assert_eq!(batch.targets.len(), 2);
        assert_eq!(batch.targets[1].0, 1);
        assert!(s
            .roster(RosterSide::Enemies)
            .iter()
            .all(|c| c.stats == CardStats::Loading));

        // Second card finishes first.
        assert!(s.apply_player_stats(
            RosterSide::Enemies,
            batch.generation,
            1,
            Some(vec![]),
            Some(vec![game(MatchResult::Win, 1)]),
        ));
        assert!(s.apply_player_stats(RosterSide::Enemies, batch.generation, 0, None, None));

        let cards = s.roster(RosterSide::Enemies);
        assert_eq!(cards[0].stats, CardStats::Unavailable);
        assert_eq!(cards[0].stats.summary(), "Stats unavailable");
        assert!(matches!(&cards[1].stats, CardStats::Ready(a) if a.wins == 1));
    }

    #[test]
    fn superseded_roster_ignores_late_results() {
        let mut s = store();
        let old = s.begin_roster(RosterSide::Teammates, &[player("A"), player("B"), player("C")]);
        let new = s.begin_roster(RosterSide::Teammates, &[player("D")]);

        assert!(!s.apply_player_stats(RosterSide::Teammates, old.generation, 2, Some(vec![]), None));
        assert!(!s.apply_player_stats(RosterSide::Teammates, old.generation, 0, Some(vec![]), None));
        assert_eq!(s.roster(RosterSide::Teammates)[0].stats, CardStats::Loading);

        // The other side keeps its own generation.
        let enemies = s.begin_roster(RosterSide::Enemies, &[player("E")]);
        assert!(s.apply_player_stats(RosterSide::Teammates, new.generation, 0, Some(vec![]), None));
        assert!(!s.apply_player_stats(RosterSide::Enemies, enemies.generation, 3, Some(vec![]), None));
    }

    #[test]
    fn snapshot_reflects_connection_and_slots() {
        let mut s = store();
        s.apply_poll(true);
        s.add_slot(SlotKind::Ban);
        let snap = s.snapshot();
        assert!(snap.connected);
        assert_eq!(snap.status_line, "LCU connected");
        assert_eq!(snap.ban_slots, vec![None, None]);
        assert_eq!(snap.toggles, AutomationToggles::default());
        assert_eq!(s.active_module_count(), 0);
    }
}
