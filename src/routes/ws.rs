// WebSocket panel stream: one sample per tick out, kill commands in

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::Sample;
use crate::scheduler::MonitorHandle;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Client → server frame.
#[derive(Debug, Deserialize)]
struct PanelCommand {
    kill: usize,
}

pub(super) async fn ws_panel(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let monitor = state.monitor.clone();
    ws.on_upgrade(move |socket| async move {
        let rx = monitor.subscribe();
        if let Err(e) = stream_panel(socket, rx, monitor).await {
            tracing::info!("Panel stream error: {}", e);
        }
    })
}

async fn stream_panel(
    socket: WebSocket,
    mut rx: broadcast::Receiver<Arc<Sample>>,
    monitor: MonitorHandle,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to panel stream");
    let (mut sender, mut receiver) = socket.split();

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(sample) => {
                        let json = serde_json::to_string(sample.as_ref())?;
                        let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(json.into())))
                            .await;
                        if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/panel client lagged, skipped {} samples", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                };
                let command: PanelCommand = match serde_json::from_str(text.as_str()) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::debug!(error = %e, "ignoring malformed panel command");
                        continue;
                    }
                };
                let report = monitor.kill_process_group(command.kill).await?;
                let reply = serde_json::json!({
                    "type": "kill",
                    "index": command.kill,
                    "report": report,
                });
                let r = timeout(
                    WS_SEND_TIMEOUT,
                    sender.send(Message::Text(reply.to_string().into())),
                )
                .await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
