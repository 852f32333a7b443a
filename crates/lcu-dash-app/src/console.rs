// Line-oriented console front end.
//
// Translates typed lines into `UserCommand`s for the app loop and renders
// `UiUpdate`s as plain text. Holds no state of its own.

use std::fmt::Write as _;

use chrono::Local;

use lcu_dash_core::protocol::{
    Automation, ChampionRef, DashboardSnapshot, NoticeLevel, UiUpdate, UserCommand,
};
use lcu_dash_core::slots::SlotKind;
use lcu_dash_core::stats::MatchSummary;
use lcu_dash_core::store::PlayerCard;

pub const HELP: &str = "\
commands:
  accept | analyze | banpick     toggle an automation
  search <name#tag>              look up a summoner
  ban <slot> <champion|id|->     set a ban slot (- clears it)
  pick <slot> <champion|id|->    set a pick slot
  addban | addpick               append an empty slot
  rmban <slot> | rmpick <slot>   remove a slot
  status                         redraw the dashboard
  quit";

/// Parse one input line. Slot numbers are 1-based on the console and
/// 0-based in the command.
pub fn parse_command(line: &str) -> Result<UserCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "accept" => Ok(UserCommand::Toggle(Automation::Accept)),
        "analyze" => Ok(UserCommand::Toggle(Automation::Analyze)),
        "banpick" => Ok(UserCommand::Toggle(Automation::BanPick)),
        // An empty query is passed through so the dispatcher can reject it.
        "search" | "s" => Ok(UserCommand::Search(rest.to_string())),
        "ban" => parse_set_slot(SlotKind::Ban, rest),
        "pick" => parse_set_slot(SlotKind::Pick, rest),
        "addban" => Ok(UserCommand::AddSlot(SlotKind::Ban)),
        "addpick" => Ok(UserCommand::AddSlot(SlotKind::Pick)),
        "rmban" => Ok(UserCommand::RemoveSlot {
            kind: SlotKind::Ban,
            index: parse_slot(rest)?,
        }),
        "rmpick" => Ok(UserCommand::RemoveSlot {
            kind: SlotKind::Pick,
            index: parse_slot(rest)?,
        }),
        "status" | "" => Ok(UserCommand::ShowStatus),
        "quit" | "exit" | "q" => Ok(UserCommand::Quit),
        other => Err(format!("unknown command `{other}` (try `help`)")),
    }
}

fn parse_set_slot(kind: SlotKind, rest: &str) -> Result<UserCommand, String> {
    let (slot, value) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| "usage: ban|pick <slot> <champion|id|->".to_string())?;
    let value = value.trim();
    let champion = if value == "-" {
        ChampionRef::Clear
    } else if let Ok(id) = value.parse::<u32>() {
        ChampionRef::Id(id)
    } else {
        ChampionRef::Name(value.to_string())
    };
    Ok(UserCommand::SetSlot {
        kind,
        index: parse_slot(slot)?,
        champion,
    })
}

fn parse_slot(text: &str) -> Result<usize, String> {
    match text.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("slot must be a number from 1, got `{}`", text.trim())),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn describe(update: &UiUpdate) -> String {
    match update {
        UiUpdate::ConnectionChanged(true) => "[lcu] connected".to_string(),
        UiUpdate::ConnectionChanged(false) => "[lcu] disconnected".to_string(),
        UiUpdate::StatusLine(text) => format!("[status] {text}"),
        UiUpdate::Notice { level, text } => {
            let tag = match level {
                NoticeLevel::Info => "info",
                NoticeLevel::Warning => "warn",
                NoticeLevel::Error => "error",
            };
            format!("[{tag}] {text}")
        }
        UiUpdate::Snapshot(snapshot) => render_snapshot(snapshot),
    }
}

fn render_snapshot(s: &DashboardSnapshot) -> String {
    let mut out = String::new();
    let lcu = if s.connected { "connected" } else { "not connected" };
    let _ = writeln!(out, "== LCU {lcu} | {}", s.status_line);
    let _ = writeln!(
        out,
        "   accept={} analyze={} banpick={} ({} active)",
        on_off(s.toggles.accept),
        on_off(s.toggles.analyze),
        on_off(s.toggles.banpick),
        s.toggles.active_count()
    );
    let _ = writeln!(out, "   bans:  {}", render_slots(&s.ban_slots));
    let _ = writeln!(out, "   picks: {}", render_slots(&s.pick_slots));

    if let Some(profile) = &s.profile {
        let _ = writeln!(out, "-- {} (level {})", profile.display_name, profile.level);
    }
    if let Some(stats) = &s.profile_stats {
        let _ = write!(out, "   {}", stats.summary_line);
        if let Some(kda) = stats.kda {
            let _ = write!(out, " | KDA {kda}");
        }
        if let Some(streak) = stats.streak {
            let _ = write!(out, " | streak {streak}");
        }
        out.push('\n');
    }
    for m in s.recent_matches.iter().take(5) {
        let _ = writeln!(out, "   {}", render_match(m));
    }

    for (title, cards) in [("teammates", &s.teammates), ("enemies", &s.enemies)] {
        if cards.is_empty() {
            continue;
        }
        let _ = writeln!(out, "-- {title}");
        for card in cards {
            let _ = writeln!(out, "   {}", render_card(card));
        }
    }
    out.trim_end().to_string()
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn render_slots(slots: &[Option<u32>]) -> String {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| match slot {
            Some(id) => format!("{}:{id}", i + 1),
            None => format!("{}:-", i + 1),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_match(m: &MatchSummary) -> String {
    let when = m.created_at.with_timezone(&Local).format("%m-%d %H:%M");
    let queue = if m.queue_name.is_empty() { "?" } else { m.queue_name.as_str() };
    format!(
        "{} {when} {queue} {}/{}/{}",
        m.result.letter(),
        m.kills,
        m.deaths,
        m.assists
    )
}

fn render_card(card: &PlayerCard) -> String {
    let champion = card
        .champion
        .as_deref()
        .map(|name| format!(" [{name}]"))
        .unwrap_or_default();
    format!(
        "{}#{}{champion}: {}",
        card.game_name,
        card.tag_line,
        card.stats.summary()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcu_dash_core::protocol::AutomationToggles;
    use lcu_dash_core::stats::{Kda, MatchResult};
    use lcu_dash_core::store::CardStats;

    #[test]
    fn parses_toggles_and_quit() {
        assert_eq!(parse_command("accept"), Ok(UserCommand::Toggle(Automation::Accept)));
        assert_eq!(parse_command("  BanPick "), Ok(UserCommand::Toggle(Automation::BanPick)));
        assert_eq!(parse_command("q"), Ok(UserCommand::Quit));
        assert_eq!(parse_command(""), Ok(UserCommand::ShowStatus));
    }

    #[test]
    fn search_keeps_spaces_in_name() {
        assert_eq!(
            parse_command("search Hide on bush#KR1"),
            Ok(UserCommand::Search("Hide on bush#KR1".into()))
        );
        assert_eq!(parse_command("search"), Ok(UserCommand::Search(String::new())));
    }

    #[test]
    fn slot_commands_are_one_based() {
        assert_eq!(
            parse_command("ban 2 Lee Sin"),
            Ok(UserCommand::SetSlot {
                kind: SlotKind::Ban,
                index: 1,
                champion: ChampionRef::Name("Lee Sin".into())
            })
        );
        assert_eq!(
            parse_command("pick 1 157"),
            Ok(UserCommand::SetSlot {
                kind: SlotKind::Pick,
                index: 0,
                champion: ChampionRef::Id(157)
            })
        );
        assert_eq!(
            parse_command("ban 1 -"),
            Ok(UserCommand::SetSlot {
                kind: SlotKind::Ban,
                index: 0,
                champion: ChampionRef::Clear
            })
        );
        assert_eq!(
            parse_command("rmpick 3"),
            Ok(UserCommand::RemoveSlot {
                kind: SlotKind::Pick,
                index: 2
            })
        );
        assert_eq!(parse_command("addban"), Ok(UserCommand::AddSlot(SlotKind::Ban)));
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(parse_command("ban 0 Yasuo").is_err());
        assert!(parse_command("ban Yasuo").is_err());
        assert!(parse_command("rmban x").is_err());
        assert!(parse_command("dance").unwrap_err().contains("dance"));
    }

    #[test]
    fn describes_simple_updates() {
        assert_eq!(describe(&UiUpdate::ConnectionChanged(true)), "[lcu] connected");
        assert_eq!(describe(&UiUpdate::StatusLine("hi".into())), "[status] hi");
        assert_eq!(describe(&UiUpdate::warning("careful")), "[warn] careful");
    }

    #[test]
    fn renders_snapshot_sections() {
        let snapshot = DashboardSnapshot {
            connected: true,
            status_line: "LCU connected".into(),
            profile: None,
            profile_stats: Some(lcu_dash_core::stats::AggregatedStats {
                wins: 2,
                losses: 1,
                win_rate: 66.7,
                summary_line: "Unranked · 2W 1L (66.7% WR)".into(),
                kda: Some(Kda::Ratio(1.25)),
                streak: None,
            }),
            recent_matches: vec![MatchSummary {
                result: MatchResult::Win,
                queue_name: "Ranked Solo".into(),
                kills: 3,
                deaths: 1,
                assists: 2,
                created_at: Default::default(),
            }],
            toggles: AutomationToggles {
                accept: true,
                analyze: false,
                banpick: false,
            },
            ban_slots: vec![Some(157), None],
            pick_slots: vec![None],
            teammates: vec![],
            enemies: vec![PlayerCard {
                game_name: "Foe".into(),
                tag_line: "EUW".into(),
                puuid: None,
                champion: Some("Lee Sin".into()),
                stats: CardStats::Loading,
            }],
        };

        let text = describe(&UiUpdate::Snapshot(Box::new(snapshot)));
        assert!(text.starts_with("== LCU connected | LCU connected"));
        assert!(text.contains("accept=on analyze=off banpick=off (1 active)"));
        assert!(text.contains("bans:  1:157 2:-"));
        assert!(text.contains("Unranked · 2W 1L (66.7% WR) | KDA 1.25"));
        assert!(text.contains("Ranked Solo 3/1/2"));
        assert!(!text.contains("-- teammates"));
        assert!(text.contains("Foe#EUW [Lee Sin]: Loading..."));
    }
}
