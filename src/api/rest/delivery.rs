use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::lifecycle::commission;
use crate::models::delivery_person::{DeliveryPerson, DeliveryPersonPatch};
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;
use crate::stats::{courier_overview, is_available, CourierOverview};
use crate::store::{Actor, TransitionOutcome};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery/:id", get(get_profile).patch(update_profile))
        .route("/delivery/:id/online", patch(set_online))
        .route("/delivery/:id/available-orders", get(available_orders))
        .route("/delivery/:id/active", get(active_deliveries))
        .route("/delivery/:id/history", get(history))
        .route("/delivery/:id/overview", get(overview))
        .route("/delivery/:id/orders/:order_id/accept", post(accept_order))
        .route("/delivery/:id/orders/:order_id/complete", post(complete_order))
}

#[derive(Deserialize)]
pub struct OnlineRequest {
    pub is_online: bool,
}

#[derive(Serialize)]
pub struct AvailableOrder {
    #[serde(flatten)]
    pub order: Order,
    /// Courier to business distance; `None` when the business is gone.
    pub pickup_distance_km: Option<f64>,
    pub commission: f64,
}

#[derive(Serialize)]
pub struct CompletedDelivery {
    #[serde(flatten)]
    pub order: Order,
    pub commission: f64,
}

async fn find_person(state: &AppState, id: &str) -> Result<DeliveryPerson, AppError> {
    state
        .store
        .delivery_persons()
        .await?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| AppError::NotFound(format!("delivery person {id} not found")))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryPerson>, AppError> {
    Ok(Json(find_person(&state, &id).await?))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<DeliveryPersonPatch>,
) -> Result<Json<DeliveryPerson>, AppError> {
    state
        .store
        .update_delivery_person(&id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("delivery person {id} not found")))
}

async fn set_online(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<OnlineRequest>,
) -> Result<Json<DeliveryPerson>, AppError> {
    state
        .store
        .update_delivery_person(&id, DeliveryPersonPatch::online(payload.is_online))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("delivery person {id} not found")))
}

async fn available_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AvailableOrder>>, AppError> {
    let person = find_person(&state, &id).await?;
    let businesses = state.store.businesses().await?;

    let available = state
        .store
        .orders()
        .await?
        .into_iter()
        .filter(is_available)
        .map(|order| {
            let pickup_distance_km = businesses
                .iter()
                .find(|b| b.id == order.business_id)
                .map(|b| haversine_km(&person.current_location, &b.location));
            AvailableOrder {
                commission: commission(order.total),
                pickup_distance_km,
                order,
            }
        })
        .collect();

    Ok(Json(available))
}

async fn active_deliveries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Order>>, AppError> {
    find_person(&state, &id).await?;
    let active = state
        .store
        .orders()
        .await?
        .into_iter()
        .filter(|o| {
            o.status == OrderStatus::Delivering && o.delivery_person_id.as_deref() == Some(&id)
        })
        .collect();
    Ok(Json(active))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CompletedDelivery>>, AppError> {
    find_person(&state, &id).await?;
    let mut completed: Vec<CompletedDelivery> = state
        .store
        .orders()
        .await?
        .into_iter()
        .filter(|o| {
            o.status == OrderStatus::Delivered && o.delivery_person_id.as_deref() == Some(&id)
        })
        .map(|order| CompletedDelivery {
            commission: commission(order.total),
            order,
        })
        .collect();
    completed.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
    Ok(Json(completed))
}

async fn overview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CourierOverview>, AppError> {
    let person = find_person(&state, &id).await?;
    let orders = state.store.orders().await?;
    Ok(Json(courier_overview(
        &person,
        &orders,
        Utc::now().date_naive(),
    )))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path((id, order_id)): Path<(String, String)>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = state
        .store
        .transition_order(&order_id, Actor::delivery(id), OrderStatus::Delivering)
        .await?;
    Ok(Json(outcome))
}

async fn complete_order(
    State(state): State<Arc<AppState>>,
    Path((id, order_id)): Path<(String, String)>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = state
        .store
        .transition_order(&order_id, Actor::delivery(id), OrderStatus::Delivered)
        .await?;
    Ok(Json(outcome))
}
