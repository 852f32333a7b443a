// User intent -> outbound events.
//
// Every automation toggle is gated on the LCU connection. A refused toggle
// leaves the store untouched and produces no event.

use thiserror::Error;
use tracing::info;

use crate::protocol::{Automation, BanPickConfig, ChampionRef, ClientEvent};
use crate::slots::SlotKind;
use crate::store::{SearchRequest, SearchTicket, ViewStateStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Connect to the LCU first")]
    PreconditionFailed,

    #[error("Enter a summoner name")]
    EmptyQuery,

    #[error("No champion matches \"{0}\"")]
    UnknownChampion(String),
}

/// Flip one automation and build the event announcing it.
///
/// Two calls in a row always produce opposite events; there is no debounce.
/// Champion preferences are saved on every accepted toggle.
pub fn toggle(store: &mut ViewStateStore, automation: Automation) -> Result<ClientEvent, DispatchError> {
    if !store.connected() {
        return Err(DispatchError::PreconditionFailed);
    }

    let on = store.flip_toggle(automation);
    let event = match (automation, on) {
        (Automation::Accept, true) => ClientEvent::StartAutoAccept,
        (Automation::Accept, false) => ClientEvent::StopAutoAccept,
        (Automation::Analyze, true) => ClientEvent::StartAutoAnalyze,
        (Automation::Analyze, false) => ClientEvent::StopAutoAnalyze,
        (Automation::BanPick, true) => {
            let bans = store.slots(SlotKind::Ban);
            let picks = store.slots(SlotKind::Pick);
            ClientEvent::StartAutoBanpick(BanPickConfig {
                ban_champion_id: bans.first(),
                pick_champion_id: picks.first(),
                ban_candidates: bans.candidates(),
                pick_candidates: picks.candidates(),
            })
        }
        (Automation::BanPick, false) => ClientEvent::StopAutoBanpick,
    };

    info!("{}", toggle_notice(automation, on));
    Ok(event)
}

/// User-facing confirmation for an accepted toggle.
pub fn toggle_notice(automation: Automation, on: bool) -> String {
    format!("{} {}", automation.label(), if on { "started" } else { "stopped" })
}

/// Split `Name#TAG` into its parts. Surrounding whitespace is ignored and
/// an empty tag counts as no tag.
pub fn parse_query(query: &str) -> Result<SearchRequest, DispatchError> {
    let query = query.trim();
    let (name, tag) = match query.split_once('#') {
        Some((name, tag)) => (name.trim(), Some(tag.trim()).filter(|t| !t.is_empty())),
        None => (query, None),
    };
    if name.is_empty() {
        return Err(DispatchError::EmptyQuery);
    }
    Ok(SearchRequest {
        game_name: name.to_string(),
        tag_line: tag.map(str::to_string),
    })
}

/// Validate a query and open a new search generation.
pub fn search(store: &mut ViewStateStore, query: &str) -> Result<SearchTicket, DispatchError> {
    let request = parse_query(query)?;
    Ok(store.begin_search(request))
}

/// Resolve a slot value: `Clear` empties the slot, ids are taken as given
/// and names go through the champion catalogue.
pub fn resolve_champion(store: &ViewStateStore, champion: &ChampionRef) -> Result<Option<u32>, DispatchError> {
    match champion {
        ChampionRef::Clear => Ok(None),
        ChampionRef::Id(id) => Ok(Some(*id)),
        ChampionRef::Name(name) => store
            .find_champion(name)
            .map(Some)
            .ok_or_else(|| DispatchError::UnknownChampion(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, PersistencePort};
    use std::sync::Arc;

    // Shares one MemoryStore between the store under test and the assertions.
    struct Shared(Arc<MemoryStore>);

    impl PersistencePort for Shared {
        fn get(&self, key: &str) -> Result<Option<String>, crate::persistence::PersistenceError> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), crate::persistence::PersistenceError> {
            self.0.set(key, value)
        }
    }

    fn store(connected: bool) -> (ViewStateStore, Arc<MemoryStore>) {
        let backing = Arc::new(MemoryStore::new());
        let mut store = ViewStateStore::new(Box::new(Shared(Arc::clone(&backing))), false);
        store.apply_poll(connected);
        (store, backing)
    }

    #[test]
    fn toggle_refused_when_disconnected() {
        let (mut s, backing) = store(false);
        for automation in [Automation::Accept, Automation::Analyze, Automation::BanPick] {
            assert_eq!(toggle(&mut s, automation), Err(DispatchError::PreconditionFailed));
        }
        assert_eq!(s.toggles().active_count(), 0);
        assert_eq!(backing.get("lcu_ui_ban_champions").unwrap(), None);
    }

    #[test]
    fn double_toggle_alternates() {
        let (mut s, _) = store(true);
        assert_eq!(toggle(&mut s, Automation::Accept), Ok(ClientEvent::StartAutoAccept));
        assert!(s.toggles().accept);
        assert_eq!(toggle(&mut s, Automation::Accept), Ok(ClientEvent::StopAutoAccept));
        assert!(!s.toggles().accept);
        assert_eq!(toggle(&mut s, Automation::Analyze), Ok(ClientEvent::StartAutoAnalyze));
        assert_eq!(s.active_module_count(), 1);
    }

    #[test]
    fn banpick_carries_first_slot_and_candidates() {
        let (mut s, backing) = store(true);
        s.add_slot(SlotKind::Ban);
        s.set_slot(SlotKind::Ban, 1, Some(157)).unwrap();
        s.set_slot(SlotKind::Pick, 0, Some(64)).unwrap();
        s.add_slot(SlotKind::Pick);
        s.set_slot(SlotKind::Pick, 1, Some(11)).unwrap();

        let event = toggle(&mut s, Automation::BanPick).unwrap();
        assert_eq!(
            event,
            ClientEvent::StartAutoBanpick(BanPickConfig {
                ban_champion_id: None,
                pick_champion_id: Some(64),
                ban_candidates: vec![157],
                pick_candidates: vec![64, 11],
            })
        );
        assert_eq!(toggle(&mut s, Automation::BanPick), Ok(ClientEvent::StopAutoBanpick));
        assert_eq!(
            backing.get("lcu_ui_pick_champions").unwrap().as_deref(),
            Some("[64,11]")
        );
    }

    #[test]
    fn toggle_works_again_after_reconnect() {
        let (mut s, _) = store(true);
        toggle(&mut s, Automation::Accept).unwrap();
        s.apply_push_lcu_status(false, None);
        assert!(toggle(&mut s, Automation::Accept).is_err());
        assert!(s.toggles().accept);
        s.apply_poll(true);
        assert_eq!(toggle(&mut s, Automation::Accept), Ok(ClientEvent::StopAutoAccept));
    }

    #[test]
    fn query_parsing() {
        assert_eq!(parse_query("   "), Err(DispatchError::EmptyQuery));
        assert_eq!(parse_query("#EUW"), Err(DispatchError::EmptyQuery));
        assert_eq!(
            parse_query(" Faker # KR1 ").unwrap(),
            SearchRequest {
                game_name: "Faker".into(),
                tag_line: Some("KR1".into())
            }
        );
        assert_eq!(parse_query("Solo#").unwrap().tag_line, None);
        assert_eq!(parse_query("Plain Name").unwrap().riot_id(), "Plain Name");
    }

    #[test]
    fn search_opens_new_generation() {
        let (mut s, _) = store(false);
        let a = search(&mut s, "A#1").unwrap();
        let b = search(&mut s, "B#2").unwrap();
        assert!(b.generation > a.generation);
        assert!(search(&mut s, "").is_err());
    }

    #[test]
    fn champion_refs_resolve_through_catalogue() {
        let (mut s, _) = store(true);
        s.set_champions([(157, "Yasuo".to_string())]);
        assert_eq!(resolve_champion(&s, &ChampionRef::Name("yas".into())), Ok(Some(157)));
        assert_eq!(resolve_champion(&s, &ChampionRef::Id(7)), Ok(Some(7)));
        assert_eq!(resolve_champion(&s, &ChampionRef::Clear), Ok(None));
        assert_eq!(
            resolve_champion(&s, &ChampionRef::Name("Teemo".into())),
            Err(DispatchError::UnknownChampion("Teemo".into()))
        );
    }

    #[test]
    fn notice_text() {
        assert_eq!(toggle_notice(Automation::BanPick, true), "Auto ban/pick started");
        assert_eq!(toggle_notice(Automation::Accept, false), "Auto-accept stopped");
    }
}
