// Rolling stats: rank + match history reduced to a one-line summary.
//
// Pure computation. Callers own all I/O and pass `None` for a source that
// failed to fetch or parse.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Streaks shorter than this are noise and are not reported.
pub const STREAK_THRESHOLD: u32 = 3;

/// Summary line shown when neither source produced data.
pub const UNAVAILABLE_SUMMARY: &str = "Stats unavailable";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("stats unavailable: neither rank nor match history could be read")]
    StatsUnavailable,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One ranked queue as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub queue_label: String,
    pub tier: Option<String>,
    pub division: Option<String>,
    pub league_points: Option<i64>,
    pub wins: Option<u32>,
    pub losses: Option<u32>,
}

impl RankEntry {
    /// Display label such as `"Gold II 45 LP"`, or `"Unranked"` when the
    /// queue has no tier.
    pub fn label(&self) -> String {
        let tier = match self.tier.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() && !t.eq_ignore_ascii_case("none") => t,
            _ => return "Unranked".to_string(),
        };

        let mut label = title_case(tier);
        if let Some(division) = self.division.as_deref().map(str::trim) {
            // Apex tiers report "NA" as their division.
            if !division.is_empty() && !division.eq_ignore_ascii_case("na") {
                label.push(' ');
                label.push_str(division);
            }
        }
        if let Some(lp) = self.league_points {
            label.push_str(&format!(" {lp} LP"));
        }
        label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchResult {
    Win,
    Loss,
}

impl MatchResult {
    pub fn letter(self) -> char {
        match self {
            MatchResult::Win => 'W',
            MatchResult::Loss => 'L',
        }
    }
}

/// Canonical shape of one played game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub result: MatchResult,
    pub queue_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kda {
    /// (kills + assists) / deaths, rounded to two decimals.
    Ratio(f64),
    /// No deaths, at least one kill or assist.
    Perfect,
    /// No deaths and nothing else either.
    Zero,
}

impl fmt::Display for Kda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kda::Ratio(r) => write!(f, "{r:.2}"),
            Kda::Perfect => f.write_str("Perfect"),
            Kda::Zero => f.write_str("0"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    pub kind: MatchResult,
    pub count: u32,
}

impl fmt::Display for Streak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.letter(), self.count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedStats {
    pub wins: u32,
    pub losses: u32,
    /// Percentage in [0, 100], rounded to one decimal.
    pub win_rate: f64,
    pub summary_line: String,
    pub kda: Option<Kda>,
    pub streak: Option<Streak>,
}

impl AggregatedStats {
    /// Display fallback used when `aggregate` fails.
    pub fn unavailable() -> Self {
        Self {
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            summary_line: UNAVAILABLE_SUMMARY.to_string(),
            kda: None,
            streak: None,
        }
    }

    pub fn win_rate_label(&self) -> String {
        format!("{:.1}", self.win_rate)
    }

    pub fn is_available(&self) -> bool {
        self.kda.is_some()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Reduce rank queues and match history to an `AggregatedStats`.
///
/// A `None` source is treated as empty; both `None` fails with
/// [`StatsError::StatsUnavailable`]. The result does not depend on the
/// input order of `matches`.
pub fn aggregate(
    ranks: Option<&[RankEntry]>,
    matches: Option<&[MatchSummary]>,
) -> Result<AggregatedStats, StatsError> {
    if ranks.is_none() && matches.is_none() {
        return Err(StatsError::StatsUnavailable);
    }
    let ranks = ranks.unwrap_or(&[]);
    let sorted = newest_first(matches.unwrap_or(&[]));

    let mut wins = 0u32;
    let mut losses = 0u32;
    let (mut kills, mut deaths, mut assists) = (0u64, 0u64, 0u64);
    for m in &sorted {
        match m.result {
            MatchResult::Win => wins += 1,
            MatchResult::Loss => losses += 1,
        }
        kills += u64::from(m.kills);
        deaths += u64::from(m.deaths);
        assists += u64::from(m.assists);
    }

    let games = wins + losses;
    let win_rate = if games == 0 {
        0.0
    } else {
        round_to(100.0 * f64::from(wins) / f64::from(games), 1)
    };

    let kda = kda(kills, deaths, assists);
    let streak = current_streak(&sorted);

    let rank_label = primary_rank(ranks)
        .map(RankEntry::label)
        .unwrap_or_else(|| "Unranked".to_string());
    let summary_line = format!("{rank_label} · {wins}W {losses}L ({win_rate:.1}% WR)");

    Ok(AggregatedStats {
        wins,
        losses,
        win_rate,
        summary_line,
        kda: Some(kda),
        streak,
    })
}

/// `aggregate`, with `StatsUnavailable` converted to the display fallback.
pub fn aggregate_or_fallback(
    ranks: Option<&[RankEntry]>,
    matches: Option<&[MatchSummary]>,
) -> AggregatedStats {
    aggregate(ranks, matches).unwrap_or_else(|_| AggregatedStats::unavailable())
}

/// First queue whose label mentions "solo", else the first queue.
pub fn primary_rank(ranks: &[RankEntry]) -> Option<&RankEntry> {
    ranks
        .iter()
        .find(|r| r.queue_label.to_lowercase().contains("solo"))
        .or_else(|| ranks.first())
}

/// Defensive copy sorted by `created_at` descending. Ties fall back to the
/// remaining fields so the order never depends on the input order.
pub fn newest_first(matches: &[MatchSummary]) -> Vec<MatchSummary> {
    let mut sorted = matches.to_vec();
    sorted.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.result.cmp(&b.result))
            .then_with(|| tie_break(a, b))
    });
    sorted
}

fn tie_break(a: &MatchSummary, b: &MatchSummary) -> Ordering {
    (a.kills, a.deaths, a.assists, &a.queue_name).cmp(&(b.kills, b.deaths, b.assists, &b.queue_name))
}

/// Run of identical outcomes starting at the newest game, reported only
/// when it reaches [`STREAK_THRESHOLD`].
fn current_streak(newest_first: &[MatchSummary]) -> Option<Streak> {
    let first = newest_first.first()?.result;
    let count = newest_first
        .iter()
        .take_while(|m| m.result == first)
        .count() as u32;
    (count >= STREAK_THRESHOLD).then_some(Streak { kind: first, count })
}

fn kda(kills: u64, deaths: u64, assists: u64) -> Kda {
    let takedowns = kills + assists;
    match (deaths, takedowns) {
        (0, 0) => Kda::Zero,
        (0, _) => Kda::Perfect,
        (d, t) => Kda::Ratio(round_to(t as f64 / d as f64, 2)),
    }
}

/// Round half away from zero to `places` decimals.
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn title_case(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
