use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::business::{Business, BusinessPatch, NewBusiness};
use crate::models::order::{Order, OrderStatus};
use crate::models::product::{NewProduct, Product, ProductPatch};
use crate::state::AppState;
use crate::stats::{business_stats, BusinessStats};
use crate::store::{Actor, TransitionOutcome};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/business", post(create_business))
        .route("/business/:id", get(get_business).patch(update_business))
        .route("/business/:id/orders", get(list_orders))
        .route("/business/:id/orders/:order_id/status", post(change_status))
        .route("/business/:id/products", get(list_products).post(create_product))
        .route(
            "/business/:id/products/:product_id",
            patch(update_product).delete(delete_product),
        )
        .route("/business/:id/stats", get(stats))
}

#[derive(Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize)]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
}

async fn find_business(state: &AppState, id: &str) -> Result<Business, AppError> {
    state
        .store
        .businesses()
        .await?
        .into_iter()
        .find(|b| b.id == id)
        .ok_or_else(|| AppError::NotFound(format!("business {id} not found")))
}

/// Resolves a product and checks that `business_id` owns it.
async fn find_owned_product(
    state: &AppState,
    business_id: &str,
    product_id: &str,
) -> Result<Product, AppError> {
    let product = state
        .store
        .products()
        .await?
        .into_iter()
        .find(|p| p.id == product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))?;

    if product.business_id != business_id {
        return Err(AppError::Forbidden(format!(
            "product {product_id} belongs to another business"
        )));
    }
    Ok(product)
}

async fn create_business(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewBusiness>,
) -> Result<Json<Business>, AppError> {
    Ok(Json(state.store.add_business(payload).await?))
}

async fn get_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Business>, AppError> {
    Ok(Json(find_business(&state, &id).await?))
}

async fn update_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<BusinessPatch>,
) -> Result<Json<Business>, AppError> {
    state
        .store
        .update_business(&id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("business {id} not found")))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, AppError> {
    let mut orders: Vec<Order> = state
        .store
        .orders()
        .await?
        .into_iter()
        .filter(|o| o.business_id == id)
        .filter(|o| filter.status.is_none_or(|status| o.status == status))
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(orders))
}

async fn change_status(
    State(state): State<Arc<AppState>>,
    Path((id, order_id)): Path<(String, String)>,
    Json(payload): Json<StatusChangeRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = state
        .store
        .transition_order(&order_id, Actor::business(id), payload.status)
        .await?;
    Ok(Json(outcome))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = state
        .store
        .products()
        .await?
        .into_iter()
        .filter(|p| p.business_id == id)
        .collect();
    Ok(Json(products))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<NewProduct>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.store.add_product(&id, payload).await?))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    Path((id, product_id)): Path<(String, String)>,
    Json(payload): Json<ProductPatch>,
) -> Result<Json<Product>, AppError> {
    find_owned_product(&state, &id, &product_id).await?;
    state
        .store
        .update_product(&product_id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path((id, product_id)): Path<(String, String)>,
) -> Result<Json<Product>, AppError> {
    find_owned_product(&state, &id, &product_id).await?;
    state
        .store
        .delete_product(&product_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BusinessStats>, AppError> {
    find_business(&state, &id).await?;
    let orders = state.store.orders().await?;
    Ok(Json(business_stats(&id, &orders, Utc::now().date_naive())))
}
