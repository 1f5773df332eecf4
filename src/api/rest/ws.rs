use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::state::AppState;
use crate::store::StoreEvent;

/// Sent in place of events a slow client missed. Clients should refetch
/// whatever they display when they see it.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "resync")]
struct Resync {
    skipped: u64,
}

/// Streams every committed store change as JSON.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let events = BroadcastStream::new(state.events.subscribe());

    info!("event stream client connected");

    let send_task = tokio::spawn(forward_events(events, sender));

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("event stream client disconnected");
}

/// Writes events to `sender` until either side closes.
async fn forward_events<E, S>(mut events: E, mut sender: S)
where
    E: Stream<Item = Result<StoreEvent, BroadcastStreamRecvError>> + Unpin,
    S: Sink<Message> + Unpin,
{
    while let Some(next) = events.next().await {
        let json = match next {
            Ok(event) => serde_json::to_string(&event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "event stream lagged");
                serde_json::to_string(&Resync { skipped })
            }
        };

        let json = match json {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialize store event for ws");
                continue;
            }
        };

        if sender.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
}
