use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::business::Business;
use crate::models::client::Client;
use crate::models::delivery_person::{DeliveryPerson, NewDeliveryPerson};
use crate::models::order::{Order, OrderPatch, OrderStatus};
use crate::state::AppState;
use crate::stats::{global_stats, GlobalStats};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/:id", get(get_order).patch(update_order))
        .route("/admin/active-deliveries", get(active_deliveries))
        .route("/admin/businesses", get(list_businesses))
        .route(
            "/admin/delivery-persons",
            get(list_delivery_persons).post(create_delivery_person),
        )
        .route("/admin/clients", get(list_clients))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<GlobalStats>, AppError> {
    let orders = state.store.orders().await?;
    let clients = state.store.clients().await?.len();
    let businesses = state.store.businesses().await?.len();
    let delivery_persons = state.store.delivery_persons().await?.len();
    Ok(Json(global_stats(
        &orders,
        clients,
        businesses,
        delivery_persons,
    )))
}

async fn list_orders(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, AppError> {
    let mut orders = state.store.orders().await?;
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.store.order(&id).await?))
}

/// The store ignores patches for unknown ids; the lookup afterwards turns
/// that into a 404 for HTTP callers.
async fn update_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<OrderPatch>,
) -> Result<Json<Order>, AppError> {
    state.store.update_order(&id, payload).await?;
    Ok(Json(state.store.order(&id).await?))
}

async fn active_deliveries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Order>>, AppError> {
    let active = state
        .store
        .orders()
        .await?
        .into_iter()
        .filter(|o| o.status == OrderStatus::Delivering)
        .collect();
    Ok(Json(active))
}

async fn list_businesses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Business>>, AppError> {
    Ok(Json(state.store.businesses().await?))
}

async fn list_delivery_persons(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeliveryPerson>>, AppError> {
    Ok(Json(state.store.delivery_persons().await?))
}

async fn create_delivery_person(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewDeliveryPerson>,
) -> Result<Json<DeliveryPerson>, AppError> {
    Ok(Json(state.store.add_delivery_person(payload).await?))
}

async fn list_clients(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Client>>, AppError> {
    Ok(Json(state.store.clients().await?))
}
