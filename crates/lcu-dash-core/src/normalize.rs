// Backend response normalization.
//
// The backend's JSON shapes vary between versions and endpoints. Every
// field lookup that tolerates more than one spelling lives here, so the rest
// of the crate only sees `MatchSummary`, `RankEntry` and `SummonerProfile`.
//
// Precedence (first present, non-null wins):
//   result:      /win, /result, /win_status, /stats/win
//   kills etc.:  /kills, /stats/kills
//   created_at:  /gameCreation, /game_creation, /createdAt, /created_at, /timestamp
//   queue name:  /queueName, /queue_name, /mode, /gameMode
//   rank queue:  /queueType, /queue_type, /queue, /queueLabel
//   division:    /division, /rank
//   LP:          /leaguePoints, /lp

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::stats::{MatchResult, MatchSummary, RankEntry};
use crate::store::SummonerProfile;

/// Default profile icon template (`{id}` is replaced).
pub const DEFAULT_ICON_URL_TEMPLATE: &str =
    "https://ddragon.leagueoflegends.com/cdn/14.1.1/img/profileicon/{id}.png";

/// Icon id the backend reports when the summoner has none.
const FALLBACK_ICON_ID: u64 = 29;

const RESULT_PATHS: &[&str] = &["/win", "/result", "/win_status", "/stats/win"];
const CREATED_AT_PATHS: &[&str] = &[
    "/gameCreation",
    "/game_creation",
    "/createdAt",
    "/created_at",
    "/timestamp",
];
const QUEUE_NAME_PATHS: &[&str] = &["/queueName", "/queue_name", "/mode", "/gameMode"];
const RANK_QUEUE_PATHS: &[&str] = &["/queueType", "/queue_type", "/queue", "/queueLabel"];

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

/// Normalize one game. Returns `None` when no outcome can be determined
/// (remakes, malformed entries) or the game has no readable creation time,
/// since recency ordering is undefined without one.
pub fn match_summary(game: &Value) -> Option<MatchSummary> {
    let result = first_present(game, RESULT_PATHS).and_then(parse_result)?;
    let created_at = first_present(game, CREATED_AT_PATHS).and_then(parse_timestamp)?;

    Some(MatchSummary {
        result,
        queue_name: first_present(game, QUEUE_NAME_PATHS)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        kills: count(game, "kills"),
        deaths: count(game, "deaths"),
        assists: count(game, "assists"),
        created_at,
    })
}

/// Normalize a `get_history` response. Accepts `{games: [...]}`,
/// `{games: {games: [...]}}` or a bare array. `success: false` or a shape
/// without a game list is a parse failure (`None`). Games whose outcome or
/// creation time is unreadable are skipped.
pub fn match_list(response: &Value) -> Option<Vec<MatchSummary>> {
    if response.get("success").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let games = response
        .as_array()
        .or_else(|| response.pointer("/games").and_then(Value::as_array))
        .or_else(|| response.pointer("/games/games").and_then(Value::as_array))?;

    let matches: Vec<MatchSummary> = games.iter().filter_map(match_summary).collect();
    if matches.len() < games.len() {
        debug!(
            "skipped {} games without a readable outcome or timestamp",
            games.len() - matches.len()
        );
    }
    Some(matches)
}

fn parse_result(value: &Value) -> Option<MatchResult> {
    match value {
        Value::Bool(true) => Some(MatchResult::Win),
        Value::Bool(false) => Some(MatchResult::Loss),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "win" | "victory" | "true" | "w" => Some(MatchResult::Win),
            "loss" | "lose" | "defeat" | "false" | "fail" | "l" => Some(MatchResult::Loss),
            _ => None,
        },
        _ => None,
    }
}

/// Epoch milliseconds or an RFC 3339 string.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

fn count(game: &Value, field: &str) -> u32 {
    let top = format!("/{field}");
    let nested = format!("/stats/{field}");
    first_present(game, &[top.as_str(), nested.as_str()])
        .and_then(as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Ranks
// ---------------------------------------------------------------------------

/// Normalize one ranked queue. Entries without a queue label are dropped.
pub fn rank_entry(queue: &Value) -> Option<RankEntry> {
    let queue_label = first_present(queue, RANK_QUEUE_PATHS)
        .and_then(Value::as_str)?
        .to_string();

    Some(RankEntry {
        queue_label,
        tier: non_empty_str(queue, &["/tier"]),
        division: non_empty_str(queue, &["/division", "/rank"]),
        league_points: first_present(queue, &["/leaguePoints", "/lp"]).and_then(Value::as_i64),
        wins: first_present(queue, &["/wins"])
            .and_then(as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        losses: first_present(queue, &["/losses"])
            .and_then(as_u64)
            .and_then(|n| u32::try_from(n).ok()),
    })
}

/// Normalize the queue list of a rank-bearing response: `{queues: [...]}`,
/// `{ranked: {queues: [...]}}` or a bare array. `None` when no list exists
/// or the response reports an error.
pub fn rank_entries(response: &Value) -> Option<Vec<RankEntry>> {
    if response.get("success").and_then(Value::as_bool) == Some(false)
        || response.get("error").is_some_and(|e| !e.is_null())
    {
        return None;
    }
    let queues = response
        .as_array()
        .or_else(|| response.pointer("/queues").and_then(Value::as_array))
        .or_else(|| response.pointer("/ranked/queues").and_then(Value::as_array))?;
    Some(queues.iter().filter_map(rank_entry).collect())
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Build a profile from a `get_summoner_rank` response. A missing `ranked`
/// block gives an empty rank list; `success: false` gives `None`.
pub fn profile(display_name: &str, response: &Value, icon_url_template: &str) -> Option<SummonerProfile> {
    if response.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let level = response
        .get("summoner_level")
        .and_then(as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0);
    let icon_id = response
        .get("profile_icon_id")
        .and_then(as_u64)
        .unwrap_or(FALLBACK_ICON_ID);

    Some(SummonerProfile {
        display_name: display_name.to_string(),
        level,
        icon_url: icon_url_template.replace("{id}", &icon_id.to_string()),
        ranks: rank_entries(response).unwrap_or_default(),
    })
}

/// `id -> name` map from `GET /api/champions`. Keys that are not numeric
/// are skipped.
pub fn champion_map(response: &Value) -> Option<Vec<(u32, String)>> {
    let object = response.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(id, name)| Some((id.parse().ok()?, name.as_str()?.to_string())))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn first_present<'a>(value: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p))
        .find(|v| !v.is_null())
}

fn non_empty_str(value: &Value, pointers: &[&str]) -> Option<String> {
    first_present(value, pointers)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
