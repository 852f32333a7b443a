// HTTP client for the companion backend.
//
// Responses come back as raw JSON; shape-tolerant parsing lives in
// `lcu_dash_core::normalize`. The only endpoint interpreted here is the
// connection poll, whose answer is a single boolean.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response from {endpoint}: {message}")]
    Parse { endpoint: String, message: String },

    #[error("{endpoint} answered HTTP {status}")]
    Rejected { endpoint: String, status: u16 },

    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

/// Who to fetch match history for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryQuery {
    /// Riot id, `Name#TAG`.
    Name(String),
    Puuid(String),
}

/// The five endpoints the client consumes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /api/champions`: `{id: name}`.
    async fn champions(&self) -> Result<Value, ApiError>;

    /// `GET /api/lcu_status`: whether the backend is attached to the client.
    async fn lcu_status(&self) -> Result<bool, ApiError>;

    /// `GET /api/get_summoner_rank?name=`.
    async fn summoner_rank(&self, riot_id: &str) -> Result<Value, ApiError>;

    /// `GET /api/get_history?name=|puuid=&count=&page=`.
    async fn history(&self, query: &HistoryQuery, count: u32, page: u32) -> Result<Value, ApiError>;

    /// `GET /api/summoner_stats/{name}/{tag}?puuid=`.
    async fn summoner_stats(
        &self,
        game_name: &str,
        tag_line: &str,
        puuid: Option<&str>,
    ) -> Result<Value, ApiError>;
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

pub struct HttpBackend {
    http: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    /// `<base>/api/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let endpoint = url.path().to_string();
        debug!("GET {endpoint} {query:?}");

        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<Value>(&body) {
            // Error statuses often still carry `{success: false, ...}`.
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(ApiError::Rejected {
                endpoint,
                status: status.as_u16(),
            }),
            Err(e) => Err(ApiError::Parse {
                endpoint,
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn champions(&self) -> Result<Value, ApiError> {
        let url = self.endpoint(&["champions"])?;
        self.get_json(url, &[]).await
    }

    async fn lcu_status(&self) -> Result<bool, ApiError> {
        let url = self.endpoint(&["lcu_status"])?;
        let value = self.get_json(url, &[]).await?;
        parse_lcu_status(&value)
    }

    async fn summoner_rank(&self, riot_id: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(&["get_summoner_rank"])?;
        self.get_json(url, &[("name", riot_id.to_string())]).await
    }

    async fn history(&self, query: &HistoryQuery, count: u32, page: u32) -> Result<Value, ApiError> {
        let url = self.endpoint(&["get_history"])?;
        let who = match query {
            HistoryQuery::Name(name) => ("name", name.clone()),
            HistoryQuery::Puuid(puuid) => ("puuid", puuid.clone()),
        };
        self.get_json(url, &[who, ("count", count.to_string()), ("page", page.to_string())])
            .await
    }

    async fn summoner_stats(
        &self,
        game_name: &str,
        tag_line: &str,
        puuid: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(&["summoner_stats", game_name, tag_line])?;
        let query: Vec<(&str, String)> = puuid.map(|p| ("puuid", p.to_string())).into_iter().collect();
        self.get_json(url, &query).await
    }
}

/// `{connected: bool}`; anything else is a parse failure.
pub fn parse_lcu_status(value: &Value) -> Result<bool, ApiError> {
    value
        .get("connected")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::Parse {
            endpoint: "/api/lcu_status".into(),
            message: format!("missing boolean `connected` in {value}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn endpoint_appends_api_prefix() {
        let b = backend("http://127.0.0.1:5000");
        assert_eq!(
            b.endpoint(&["lcu_status"]).unwrap().as_str(),
            "http://127.0.0.1:5000/api/lcu_status"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_segments() {
        let b = backend("http://host:8080/companion/");
        let url = b.endpoint(&["summoner_stats", "Hide on bush", "KR#1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://host:8080/companion/api/summoner_stats/Hide%20on%20bush/KR%231"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            HttpBackend::new("not a url", Duration::from_secs(1)),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpBackend::new("mailto:someone@example.com", Duration::from_secs(1)),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn lcu_status_parsing() {
        assert!(parse_lcu_status(&json!({"connected": true})).unwrap());
        assert!(!parse_lcu_status(&json!({"connected": false, "port": null})).unwrap());
        assert!(matches!(
            parse_lcu_status(&json!({"status": "ok"})),
            Err(ApiError::Parse { .. })
        ));
        assert!(parse_lcu_status(&json!({"connected": "yes"})).is_err());
    }
}
