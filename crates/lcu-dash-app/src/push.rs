// Push-channel client.
//
// Holds one websocket to the backend, reconnecting after a fixed delay.
// Inbound text frames are parsed into `ServerEvent`s; outbound `ClientEvent`s
// are written as JSON envelopes. Socket lifecycle is reported as
// `Connected` / `ConnectError` / `Disconnected`.

use std::fmt::Display;
use std::time::Duration;

use futures_util::stream::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use lcu_dash_core::protocol::{ClientEvent, ServerEvent};

/// Events delivered to the app loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Connected,
    ConnectError(String),
    Disconnected(String),
    Server(ServerEvent),
}

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Socket closed or failed; reconnect.
    Remote(String),
    /// The app dropped its event receiver.
    EventsClosed,
    /// The app dropped its outbound sender.
    OutboundClosed,
}

/// Connect, run the session, wait `reconnect`, repeat. Returns when the app
/// side of either channel goes away.
pub async fn run(
    url: String,
    reconnect: Duration,
    tx: mpsc::Sender<PushEvent>,
    mut outbound: mpsc::Receiver<ClientEvent>,
) -> anyhow::Result<()> {
    loop {
        let lifecycle = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _response)) => {
                info!("Push channel connected to {url}");
                if tx.send(PushEvent::Connected).await.is_err() {
                    return Ok(());
                }

                let (mut write, read) = ws.split();
                match drive_session(read, &mut write, &tx, &mut outbound).await {
                    SessionEnd::Remote(reason) => {
                        info!("Push channel disconnected: {reason}");
                        PushEvent::Disconnected(reason)
                    }
                    SessionEnd::EventsClosed | SessionEnd::OutboundClosed => return Ok(()),
                }
            }
            Err(e) => {
                warn!("Push channel connect to {url} failed: {e}");
                PushEvent::ConnectError(e.to_string())
            }
        };

        if tx.send(lifecycle).await.is_err() {
            return Ok(());
        }
        tokio::time::sleep(reconnect).await;
    }
}

/// Pump one established session until either side ends it.
///
/// Generic over the socket halves so it can be tested with in-memory
/// streams and sinks.
pub async fn drive_session<R, W>(
    mut read: R,
    write: &mut W,
    tx: &mpsc::Sender<PushEvent>,
    outbound: &mut mpsc::Receiver<ClientEvent>,
) -> SessionEnd
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match ServerEvent::parse(text.as_str()) {
                        Ok(event) => {
                            if tx.send(PushEvent::Server(event)).await.is_err() {
                                return SessionEnd::EventsClosed;
                            }
                        }
                        Err(e) => warn!("Skipping malformed push frame: {e}"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return SessionEnd::Remote(reason);
                    }
                    Some(Ok(_)) => {
                        // Binary, Ping, Pong and raw frames carry no events.
                    }
                    Some(Err(e)) => return SessionEnd::Remote(e.to_string()),
                    None => return SessionEnd::Remote("stream ended".to_string()),
                }
            }

            event = outbound.recv() => {
                let Some(event) = event else {
                    let _ = write.close().await;
                    return SessionEnd::OutboundClosed;
                };
                match event.to_frame() {
                    Ok(frame) => {
                        debug!("Emitting {}", event.name());
                        if let Err(e) = write.send(Message::Text(frame.into())).await {
                            return SessionEnd::Remote(format!("send failed: {e}"));
                        }
                    }
                    Err(e) => warn!("Failed to encode {}: {e}", event.name()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use lcu_dash_core::protocol::{BanPickConfig, LcuStatus};

    /// A read half that yields `messages` and then stays open.
    fn open_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages).chain(stream::pending())
    }

    fn closed_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    #[tokio::test]
    async fn text_frames_become_server_events() {
        let (tx, mut rx) = mpsc::channel(16);
        let (_out_tx, mut out_rx) = mpsc::channel(16);
        let mut sink: Vec<Message> = Vec::new();
        let frames = vec![
            Ok(Message::Text(r#"{"event":"lcu_status","data":{"connected":true,"port":5555}}"#.into())),
            Ok(Message::Text(r#"{"event":"server_shutdown","data":{"reason":"bye"}}"#.into())),
        ];

        let end = drive_session(closed_stream(frames), &mut sink, &tx, &mut out_rx).await;
        assert_eq!(end, SessionEnd::Remote("stream ended".into()));

        assert_eq!(
            rx.recv().await.unwrap(),
            PushEvent::Server(ServerEvent::LcuStatus(LcuStatus {
                connected: true,
                port: Some(5555)
            }))
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            PushEvent::Server(ServerEvent::ServerShutdown {
                reason: Some("bye".into())
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_and_non_text_frames_are_skipped() {
        let (tx, mut rx) = mpsc::channel(16);
        let (_out_tx, mut out_rx) = mpsc::channel(16);
        let mut sink: Vec<Message> = Vec::new();
        let frames = vec![
            Ok(Message::Text("not json".into())),
            Ok(Message::Text(r#"{"event":"unknown_event","data":{}}"#.into())),
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Text(r#"{"event":"status_update","data":{"message":"hi"}}"#.into())),
        ];

        drive_session(closed_stream(frames), &mut sink, &tx, &mut out_rx).await;

        match rx.recv().await.unwrap() {
            PushEvent::Server(ServerEvent::StatusUpdate(update)) => assert_eq!(update.text(), "hi"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_frame_ends_session_with_reason() {
        let (tx, mut rx) = mpsc::channel(16);
        let (_out_tx, mut out_rx) = mpsc::channel(16);
        let mut sink: Vec<Message> = Vec::new();
        let frames = vec![
            Ok(Message::Close(None)),
            Ok(Message::Text(r#"{"event":"lcu_status","data":{"connected":true}}"#.into())),
        ];

        let end = drive_session(open_stream(frames), &mut sink, &tx, &mut out_rx).await;
        assert_eq!(end, SessionEnd::Remote("closed by server".into()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn socket_error_ends_session() {
        let (tx, _rx) = mpsc::channel(16);
        let (_out_tx, mut out_rx) = mpsc::channel(16);
        let mut sink: Vec<Message> = Vec::new();
        let frames = vec![Err(WsError::ConnectionClosed)];

        let end = drive_session(open_stream(frames), &mut sink, &tx, &mut out_rx).await;
        assert!(matches!(end, SessionEnd::Remote(_)));
    }

    #[tokio::test]
    async fn outbound_events_are_written_as_envelopes() {
        let (tx, _rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let mut sink: Vec<Message> = Vec::new();

        out_tx.send(ClientEvent::StartAutoAccept).await.unwrap();
        out_tx
            .send(ClientEvent::StartAutoBanpick(BanPickConfig {
                ban_champion_id: Some(157),
                pick_champion_id: None,
                ban_candidates: vec![157],
                pick_candidates: vec![],
            }))
            .await
            .unwrap();
        drop(out_tx);

        let end = drive_session(open_stream(vec![]), &mut sink, &tx, &mut out_rx).await;
        assert_eq!(end, SessionEnd::OutboundClosed);

        let texts: Vec<String> = sink
            .iter()
            .filter_map(|m| match m {
                Message::Text(t) => Some(t.as_str().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], r#"{"event":"start_auto_accept"}"#);
        let banpick: serde_json::Value = serde_json::from_str(&texts[1]).unwrap();
        assert_eq!(banpick["event"], "start_auto_banpick");
        assert_eq!(banpick["data"]["ban_champion_id"], 157);
        assert!(banpick["data"]["pick_champion_id"].is_null());
    }

    #[tokio::test]
    async fn dropped_event_receiver_ends_session() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let (_out_tx, mut out_rx) = mpsc::channel(16);
        let mut sink: Vec<Message> = Vec::new();
        let frames = vec![Ok(Message::Text(r#"{"event":"lcu_status","data":{"connected":false}}"#.into()))];

        let end = drive_session(open_stream(frames), &mut sink, &tx, &mut out_rx).await;
        assert_eq!(end, SessionEnd::EventsClosed);
    }

    #[tokio::test]
    async fn run_reports_connect_errors_and_retries() {
        let (tx, mut rx) = mpsc::channel(16);
        let (_out_tx, out_rx) = mpsc::channel(16);
        // Nothing listens on port 9 of the loopback interface.
        let task = tokio::spawn(run(
            "ws://127.0.0.1:9/ws".into(),
            Duration::from_millis(10),
            tx,
            out_rx,
        ));

        for _ in 0..2 {
            assert!(matches!(rx.recv().await, Some(PushEvent::ConnectError(_))));
        }
        drop(rx);
        task.abort();
    }
}
