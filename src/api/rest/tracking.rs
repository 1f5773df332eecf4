use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::error::AppError;
use crate::lifecycle::progress;
use crate::models::delivery_person::DeliveryPerson;
use crate::models::order::{Order, OrderStatus};
use crate::models::GeoPoint;
use crate::state::AppState;
use crate::store::StoreEvent;
use crate::tracking::CourierSimulation;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracking/:order_id", get(tracking_view))
        .route("/tracking/:order_id/ws", get(tracking_ws))
}

#[derive(Serialize)]
pub struct TrackingView {
    pub order: Order,
    pub delivery_person: Option<DeliveryPerson>,
    pub progress: u8,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TrackingMessage<'a> {
    Snapshot {
        order: &'a Order,
        progress: u8,
    },
    Position {
        order_id: &'a str,
        lat: f64,
        lng: f64,
    },
    Status {
        order_id: &'a str,
        status: OrderStatus,
        progress: u8,
    },
}

async fn load_view(state: &AppState, order_id: &str) -> Result<TrackingView, AppError> {
    let order = state.store.order(order_id).await?;
    let delivery_person = match order.delivery_person_id.as_deref() {
        Some(id) => state
            .store
            .delivery_persons()
            .await?
            .into_iter()
            .find(|p| p.id == id),
        None => None,
    };

    Ok(TrackingView {
        progress: progress(order.status),
        order,
        delivery_person,
    })
}

async fn tracking_view(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<TrackingView>, AppError> {
    Ok(Json(load_view(&state, &order_id).await?))
}

/// Resolves the order before upgrading so unknown ids get a plain 404.
///
/// The event subscription is taken before the order is read, so any status
/// change committed after the snapshot reaches the session.
async fn tracking_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let events = state.events.subscribe();
    let view = load_view(&state, &order_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, view, events)))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    view: TrackingView,
    events: broadcast::Receiver<StoreEvent>,
) {
    let (sender, receiver) = socket.split();
    run_session(sender, receiver, &state, view, events).await;
}

async fn send_json<S>(sender: &mut S, message: &TrackingMessage<'_>) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize tracking message");
            true
        }
    }
}

/// Sends the snapshot and, for an order out for delivery, streams simulated
/// courier positions until the order leaves `delivering` or the client goes
/// away.
async fn run_session<S, R>(
    mut sender: S,
    mut receiver: R,
    state: &AppState,
    view: TrackingView,
    mut events: broadcast::Receiver<StoreEvent>,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let order = view.order;

    let snapshot = TrackingMessage::Snapshot {
        order: &order,
        progress: view.progress,
    };
    if !send_json(&mut sender, &snapshot).await {
        return;
    }

    // Only orders out for delivery have a courier worth animating.
    if order.status != OrderStatus::Delivering {
        return;
    }

    let start = view
        .delivery_person
        .map(|p| p.current_location)
        .unwrap_or(order.delivery_address.coordinates);
    let simulation = CourierSimulation::start(
        start,
        order.delivery_address.coordinates,
        state.courier_tick,
        state.metrics.clone(),
    );
    let mut positions = simulation.subscribe();

    info!(
        order_id = %order.id,
        session_id = %simulation.session_id(),
        "tracking session opened"
    );

    loop {
        tokio::select! {
            changed = positions.changed() => {
                if changed.is_err() {
                    break;
                }
                let GeoPoint { lat, lng } = *positions.borrow_and_update();
                let message = TrackingMessage::Position { order_id: &order.id, lat, lng };
                if !send_json(&mut sender, &message).await {
                    break;
                }
            }
            event = events.recv() => {
                match event {
                    Ok(StoreEvent::OrderStatusChanged { order: updated, to, .. })
                        if updated.id == order.id =>
                    {
                        let message = TrackingMessage::Status {
                            order_id: &order.id,
                            status: to,
                            progress: progress(to),
                        };
                        let delivered = send_json(&mut sender, &message).await;
                        if !delivered || to != OrderStatus::Delivering {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "tracking session lagged behind store events");
                        // The missed events may include this order's status change.
                        let status = match state.store.order(&order.id).await {
                            Ok(current) => current.status,
                            Err(_) => break,
                        };
                        if status != OrderStatus::Delivering {
                            let message = TrackingMessage::Status {
                                order_id: &order.id,
                                status,
                                progress: progress(status),
                            };
                            send_json(&mut sender, &message).await;
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!(
        order_id = %order.id,
        session_id = %simulation.session_id(),
        "tracking session closed"
    );
    simulation.stop();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::channel::mpsc;
    use serde_json::Value;

    use super::*;
    use crate::config::Config;
    use crate::models::order::{DeliveryAddress, OrderDraft, OrderItem};
    use crate::storage::MemoryBlobStore;
    use crate::store::Actor;

    const WAIT: Duration = Duration::from_secs(5);

    type Outgoing = mpsc::UnboundedReceiver<Message>;
    type Incoming = mpsc::UnboundedSender<Result<Message, axum::Error>>;

    fn fast_state() -> Arc<AppState> {
        let config = Config {
            courier_tick: Duration::from_millis(50),
            ..Config::default()
        };
        let (state, worker) = AppState::new(Arc::new(MemoryBlobStore::new()), &config).unwrap();
        tokio::spawn(worker.run());
        Arc::new(state)
    }

    async fn order_at(state: &AppState, delivering: bool) -> String {
        let order = state
            .store
            .add_order(OrderDraft {
                client_id: "c1".to_string(),
                client_name: "Ana".to_string(),
                business_id: "1".to_string(),
                items: vec![OrderItem {
                    product_id: "1".to_string(),
                    name: "Pizza Margherita".to_string(),
                    price: 12.99,
                    quantity: 1,
                }],
                delivery_address: DeliveryAddress {
                    street: "1 Elm St".to_string(),
                    city: "New York".to_string(),
                    coordinates: GeoPoint::new(40.73, -73.99),
                },
                estimated_time: None,
            })
            .await
            .unwrap();
        if delivering {
            for target in [OrderStatus::Accepted, OrderStatus::Preparing, OrderStatus::Ready] {
                state
                    .store
                    .transition_order(&order.id, Actor::business("1"), target)
                    .await
                    .unwrap();
            }
            state
                .store
                .transition_order(&order.id, Actor::delivery("2"), OrderStatus::Delivering)
                .await
                .unwrap();
        }
        order.id
    }

    async fn complete(state: &AppState, order_id: &str) {
        state
            .store
            .transition_order(order_id, Actor::delivery("2"), OrderStatus::Delivered)
            .await
            .unwrap();
    }

    fn parse(message: Message) -> Value {
        match message {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    async fn next_json(outgoing: &mut Outgoing) -> Value {
        parse(
            tokio::time::timeout(WAIT, outgoing.next())
                .await
                .unwrap()
                .unwrap(),
        )
    }

    /// Subscribes, reads the view, then runs the session on its own task.
    async fn open(
        state: &Arc<AppState>,
        order_id: &str,
    ) -> (tokio::task::JoinHandle<()>, Outgoing, Incoming) {
        let events = state.events.subscribe();
        let view = load_view(state, order_id).await.unwrap();
        let (out_tx, out_rx) = mpsc::unbounded();
        let (in_tx, in_rx) = mpsc::unbounded();
        let state = state.clone();
        let session = tokio::spawn(async move {
            run_session(out_tx, in_rx, &state, view, events).await;
        });
        (session, out_rx, in_tx)
    }

    #[tokio::test]
    async fn positions_stream_until_the_order_is_delivered() {
        let state = fast_state();
        let order_id = order_at(&state, true).await;
        let (session, mut outgoing, _client) = open(&state, &order_id).await;

        let snapshot = next_json(&mut outgoing).await;
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["progress"], 90);
        let position = next_json(&mut outgoing).await;
        assert_eq!(position["type"], "position");
        assert_eq!(position["order_id"], order_id.as_str());
        assert_eq!(state.metrics.active_tracking_sessions.get(), 1);

        complete(&state, &order_id).await;
        loop {
            let message = next_json(&mut outgoing).await;
            if message["type"] == "status" {
                assert_eq!(message["status"], "delivered");
                assert_eq!(message["progress"], 100);
                break;
            }
        }

        tokio::time::timeout(WAIT, session).await.unwrap().unwrap();
        assert_eq!(state.metrics.active_tracking_sessions.get(), 0);
    }

    #[tokio::test]
    async fn completion_between_snapshot_and_session_start_ends_it() {
        let state = fast_state();
        let order_id = order_at(&state, true).await;

        let events = state.events.subscribe();
        let view = load_view(&state, &order_id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Delivering);
        complete(&state, &order_id).await;

        let (out_tx, mut outgoing) = mpsc::unbounded::<Message>();
        let (_client, incoming) = mpsc::unbounded::<Result<Message, axum::Error>>();
        tokio::time::timeout(WAIT, run_session(out_tx, incoming, &state, view, events))
            .await
            .unwrap();
        assert_eq!(state.metrics.active_tracking_sessions.get(), 0);

        let mut last = None;
        while let Some(message) = outgoing.next().await {
            last = Some(parse(message));
        }
        let last = last.unwrap();
        assert_eq!(last["type"], "status");
        assert_eq!(last["status"], "delivered");
    }

    #[tokio::test]
    async fn client_hang_up_stops_the_simulation() {
        let state = fast_state();
        let order_id = order_at(&state, true).await;
        let (session, mut outgoing, client) = open(&state, &order_id).await;

        assert_eq!(next_json(&mut outgoing).await["type"], "snapshot");
        drop(client);

        tokio::time::timeout(WAIT, session).await.unwrap().unwrap();
        assert_eq!(state.metrics.active_tracking_sessions.get(), 0);
    }

    #[tokio::test]
    async fn order_not_out_for_delivery_gets_only_a_snapshot() {
        let state = fast_state();
        let order_id = order_at(&state, false).await;
        let (session, mut outgoing, _client) = open(&state, &order_id).await;

        let snapshot = next_json(&mut outgoing).await;
        assert_eq!(snapshot["order"]["status"], "pending");
        tokio::time::timeout(WAIT, session).await.unwrap().unwrap();
        assert!(outgoing.next().await.is_none());
        assert_eq!(state.metrics.active_tracking_sessions.get(), 0);
    }
}
