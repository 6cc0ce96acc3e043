use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AppError;
use crate::middleware::auth::bearer_token;
use crate::ports::{ChangeEvent, ChangeFeed, FeedMessage};
use crate::AppState;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Frame pushed to feed subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedFrame {
    Change(ChangeEvent),
    /// Events were dropped; the subscriber should re-read the list.
    Resync,
}

impl From<FeedMessage> for FeedFrame {
    fn from(message: FeedMessage) -> Self {
        match message {
            FeedMessage::Event(event) => FeedFrame::Change(event),
            FeedMessage::Gap => FeedFrame::Resync,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// `GET /transactions/feed`. Browsers cannot set headers on a WebSocket
/// handshake, so the token may also come as `?token=`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let token = params.token.as_deref().or_else(|| bearer_token(&headers));
    let caller = match state.authenticator.authenticate(token).await {
        Ok(caller) => caller,
        Err(e) => {
            tracing::warn!("Rejected WebSocket subscription: {}", e);
            return AppError::from(e).into_response();
        }
    };

    // subscribe before the upgrade completes so nothing committed after this point is missed
    let feed = state.store.subscribe();
    tracing::info!(caller = %caller, "Change feed subscriber connected");

    ws.on_upgrade(move |socket| handle_socket(socket, feed))
}

async fn handle_socket(socket: WebSocket, mut feed: ChangeFeed) {
    let (mut sender, mut receiver) = socket.split();

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    tracing::debug!("Ignoring client message on change feed: {}", text);
                }
                Message::Close(_) => {
                    tracing::info!("Client closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat_interval = tokio::time::interval(HEARTBEAT_INTERVAL);

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        tracing::info!("Client disconnected during heartbeat");
                        break;
                    }
                }
                message = feed.recv() => {
                    let Some(message) = message else {
                        tracing::info!("Change feed closed");
                        break;
                    };

                    let json = match serde_json::to_string(&FeedFrame::from(message)) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::error!("Failed to serialize feed frame: {}", e);
                            continue;
                        }
                    };

                    if sender.send(Message::Text(json)).await.is_err() {
                        tracing::info!("Client disconnected");
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    tracing::info!("WebSocket connection closed");
}
