// Connection status reconciliation.
//
// Three independent sources report whether the backend is attached to the
// game client: the periodic poll, `lcu_status` push events and free-text
// `status_update` push events. Last writer wins across sources.

use tracing::debug;

use crate::protocol::StatusUpdate;

// Disconnect phrases are checked first: "disconnected" and "not connected"
// both contain "connected".
const EN_DISCONNECT: &[&str] = &[
    "disconnected",
    "not connected",
    "failed",
    "lost connection",
    "offline",
];
const EN_CONNECT: &[&str] = &["connected", "success", "online"];

// Matched as exact substrings.
const LOCALIZED_DISCONNECT: &[&str] = &["失败", "断开", "未连接"];
const LOCALIZED_CONNECT: &[&str] = &["成功", "已连接到 LCU", "已连接到LCU"];

/// Outcome of applying one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub connected: bool,
    /// Whether the connection flag flipped.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct ConnectionStatusReconciler {
    connected: bool,
    status_line: String,
}

impl ConnectionStatusReconciler {
    /// Start from a bootstrap value; the first poll replaces it.
    pub fn new(bootstrap: bool) -> Self {
        Self {
            connected: bootstrap,
            status_line: "Waiting for commands...".to_string(),
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// Transport-level messages (push socket up/down) only touch the text.
    pub fn set_status_line(&mut self, text: impl Into<String>) {
        self.status_line = text.into();
    }

    /// Poll responses are authoritative.
    pub fn apply_poll(&mut self, connected: bool) -> Applied {
        self.status_line = if connected {
            "LCU connected".to_string()
        } else {
            "LCU not connected".to_string()
        };
        self.set(connected)
    }

    /// `lcu_status` push events are authoritative.
    pub fn apply_push_lcu_status(&mut self, connected: bool, port: Option<u16>) -> Applied {
        self.status_line = match (connected, port) {
            (true, Some(port)) => format!("LCU connected (port {port})"),
            (true, None) => "LCU connected".to_string(),
            (false, _) => "LCU not connected".to_string(),
        };
        self.set(connected)
    }

    /// `status_update` push events: an explicit `connected` field wins;
    /// otherwise only `type == "lcu"` messages are inspected for keywords.
    /// Other message types never move the flag.
    pub fn apply_push_status(&mut self, update: &StatusUpdate) -> Applied {
        let text = update.text();
        self.status_line = text.to_string();

        if let Some(connected) = update.connected {
            return self.set(connected);
        }
        if !update.is_lcu() {
            return self.unchanged();
        }
        match infer_from_text(text) {
            Some(connected) => self.set(connected),
            None => {
                debug!("status text carries no connection keyword: {text}");
                self.unchanged()
            }
        }
    }

    fn set(&mut self, connected: bool) -> Applied {
        let changed = self.connected != connected;
        self.connected = connected;
        Applied { connected, changed }
    }

    fn unchanged(&self) -> Applied {
        Applied {
            connected: self.connected,
            changed: false,
        }
    }
}

/// `Some(false)` for a disconnect phrase, `Some(true)` for a connect phrase,
/// `None` when the text says neither.
pub fn infer_from_text(text: &str) -> Option<bool> {
    let lower = text.to_lowercase();
    if LOCALIZED_DISCONNECT.iter().any(|k| text.contains(k))
        || EN_DISCONNECT.iter().any(|k| lower.contains(k))
    {
        return Some(false);
    }
    if LOCALIZED_CONNECT.iter().any(|k| text.contains(k))
        || EN_CONNECT.iter().any(|k| lower.contains(k))
    {
        return Some(true);
    }
    None
}
