// Message types: push-channel envelopes in both directions, plus the
// commands and updates exchanged between the console and the event loop.
//
// Push frames are JSON envelopes `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::slots::SlotKind;
use crate::stats::{AggregatedStats, MatchSummary};
use crate::store::{PlayerCard, SummonerProfile};

// ---------------------------------------------------------------------------
// Inbound (server -> client)
// ---------------------------------------------------------------------------

/// Payload of a `status_update` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub message: Option<String>,
    /// Older backends put the text under `data`.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub connected: Option<bool>,
}

impl StatusUpdate {
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.data.as_deref())
            .unwrap_or_default()
    }

    pub fn is_lcu(&self) -> bool {
        self.kind.as_deref() == Some("lcu")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcuStatus {
    pub connected: bool,
    #[serde(default)]
    pub port: Option<u16>,
}

/// A teammate or enemy announced during champion select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRef {
    pub game_name: String,
    #[serde(default)]
    pub tag_line: String,
    #[serde(default)]
    pub puuid: Option<String>,
    /// Champion name once the player has hovered or locked one.
    #[serde(default, alias = "championName")]
    pub champion: Option<String>,
}

impl PlayerRef {
    pub fn riot_id(&self) -> String {
        if self.tag_line.is_empty() {
            self.game_name.clone()
        } else {
            format!("{}#{}", self.game_name, self.tag_line)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    StatusUpdate(StatusUpdate),
    LcuStatus(LcuStatus),
    EnemiesFound {
        enemies: Vec<PlayerRef>,
    },
    TeammatesFound {
        teammates: Vec<PlayerRef>,
    },
    ServerShutdown {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ServerEvent {
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

// ---------------------------------------------------------------------------
// Outbound (client -> server)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanPickConfig {
    /// First ban slot, `null` when that slot is empty.
    pub ban_champion_id: Option<u32>,
    pub pick_champion_id: Option<u32>,
    /// All non-empty ban slots in order.
    pub ban_candidates: Vec<u32>,
    pub pick_candidates: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    StartAutoAccept,
    StopAutoAccept,
    StartAutoAnalyze,
    StopAutoAnalyze,
    StartAutoBanpick(BanPickConfig),
    StopAutoBanpick,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::StartAutoAccept => "start_auto_accept",
            ClientEvent::StopAutoAccept => "stop_auto_accept",
            ClientEvent::StartAutoAnalyze => "start_auto_analyze",
            ClientEvent::StopAutoAnalyze => "stop_auto_analyze",
            ClientEvent::StartAutoBanpick(_) => "start_auto_banpick",
            ClientEvent::StopAutoBanpick => "stop_auto_banpick",
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Console <-> event loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Automation {
    Accept,
    Analyze,
    BanPick,
}

impl Automation {
    pub fn label(self) -> &'static str {
        match self {
            Automation::Accept => "Auto-accept",
            Automation::Analyze => "Team analysis",
            Automation::BanPick => "Auto ban/pick",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RosterSide {
    Teammates,
    Enemies,
}

/// How the user named a champion for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChampionRef {
    Id(u32),
    Name(String),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Toggle(Automation),
    Search(String),
    SetSlot {
        kind: SlotKind,
        index: usize,
        champion: ChampionRef,
    },
    AddSlot(SlotKind),
    RemoveSlot {
        kind: SlotKind,
        index: usize,
    },
    ShowStatus,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    ConnectionChanged(bool),
    StatusLine(String),
    Notice { level: NoticeLevel, text: String },
    Snapshot(Box<DashboardSnapshot>),
}

impl UiUpdate {
    pub fn info(text: impl Into<String>) -> Self {
        UiUpdate::Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        UiUpdate::Notice {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        UiUpdate::Notice {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomationToggles {
    pub accept: bool,
    pub analyze: bool,
    pub banpick: bool,
}

impl AutomationToggles {
    pub fn get(&self, automation: Automation) -> bool {
        match automation {
            Automation::Accept => self.accept,
            Automation::Analyze => self.analyze,
            Automation::BanPick => self.banpick,
        }
    }

    pub(crate) fn flip(&mut self, automation: Automation) -> bool {
        let flag = match automation {
            Automation::Accept => &mut self.accept,
            Automation::Analyze => &mut self.analyze,
            Automation::BanPick => &mut self.banpick,
        };
        *flag = !*flag;
        *flag
    }

    pub fn active_count(&self) -> usize {
        [self.accept, self.analyze, self.banpick]
            .iter()
            .filter(|on| **on)
            .count()
    }
}

/// Everything the console needs to render one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub connected: bool,
    pub status_line: String,
    pub profile: Option<SummonerProfile>,
    pub profile_stats: Option<AggregatedStats>,
    pub recent_matches: Vec<MatchSummary>,
    pub toggles: AutomationToggles,
    pub ban_slots: Vec<Option<u32>>,
    pub pick_slots: Vec<Option<u32>>,
    pub teammates: Vec<PlayerCard>,
    pub enemies: Vec<PlayerCard>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_update_with_type_and_flag() {
        let ev = ServerEvent::parse(
            r#"{"event":"status_update","data":{"type":"lcu","message":"ok","connected":true}}"#,
        )
        .unwrap();
        match ev {
            ServerEvent::StatusUpdate(s) => {
                assert!(s.is_lcu());
                assert_eq!(s.text(), "ok");
                assert_eq!(s.connected, Some(true));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_update_text_falls_back_to_data_field() {
        let ev = ServerEvent::parse(r#"{"event":"status_update","data":{"data":"legacy"}}"#)
            .unwrap();
        let ServerEvent::StatusUpdate(s) = ev else {
            panic!("expected status update");
        };
        assert_eq!(s.text(), "legacy");
        assert!(!s.is_lcu());
    }

    #[test]
    fn parses_lcu_status() {
        let ev = ServerEvent::parse(r#"{"event":"lcu_status","data":{"connected":false,"port":null}}"#)
            .unwrap();
        assert_eq!(
            ev,
            ServerEvent::LcuStatus(LcuStatus {
                connected: false,
                port: None
            })
        );
    }

    #[test]
    fn parses_enemies_found_with_camel_case_players() {
        let ev = ServerEvent::parse(
            r#"{"event":"enemies_found","data":{"enemies":[
                {"gameName":"Faker","tagLine":"KR1","puuid":"abc","champion":"Ahri"},
                {"gameName":"Anon"}
            ]}}"#,
        )
        .unwrap();
        let ServerEvent::EnemiesFound { enemies } = ev else {
            panic!("expected enemies");
        };
        assert_eq!(enemies.len(), 2);
        assert_eq!(enemies[0].riot_id(), "Faker#KR1");
        assert_eq!(enemies[0].champion.as_deref(), Some("Ahri"));
        assert!(enemies[1].champion.is_none());
        assert_eq!(enemies[1].riot_id(), "Anon");
        assert!(enemies[1].puuid.is_none());
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(ServerEvent::parse(r#"{"event":"mystery","data":{}}"#).is_err());
        assert!(ServerEvent::parse("not json").is_err());
    }

    #[test]
    fn unit_client_events_serialize_as_bare_event_name() {
        let v = serde_json::to_value(ClientEvent::StopAutoAccept).unwrap();
        assert_eq!(v["event"], "stop_auto_accept");
        assert_eq!(ClientEvent::StopAutoAccept.name(), "stop_auto_accept");
    }

    #[test]
    fn banpick_event_carries_config() {
        let ev = ClientEvent::StartAutoBanpick(BanPickConfig {
            ban_champion_id: None,
            pick_champion_id: Some(64),
            ban_candidates: vec![],
            pick_candidates: vec![64, 11],
        });
        let v: serde_json::Value = serde_json::from_str(&ev.to_frame().unwrap()).unwrap();
        assert_eq!(v["event"], "start_auto_banpick");
        assert!(v["data"]["ban_champion_id"].is_null());
        assert_eq!(v["data"]["pick_champion_id"], 64);
        assert_eq!(v["data"]["pick_candidates"], serde_json::json!([64, 11]));
    }

    #[test]
    fn toggles_flip_and_count() {
        let mut t = AutomationToggles::default();
        assert!(t.flip(Automation::Accept));
        assert!(t.flip(Automation::BanPick));
        assert_eq!(t.active_count(), 2);
        assert!(!t.flip(Automation::Accept));
        assert_eq!(t.active_count(), 1);
        assert!(t.get(Automation::BanPick));
    }
}
