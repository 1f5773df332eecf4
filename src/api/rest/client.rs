use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::cart::{CartView, CheckoutRequest};
use crate::error::AppError;
use crate::models::business::Business;
use crate::models::client::{Client, NewClient};
use crate::models::order::Order;
use crate::models::product::Product;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/client/businesses", get(list_businesses))
        .route("/client/businesses/:id", get(business_detail))
        .route("/client/signup", post(signup))
        .route("/client/:client_id/orders", get(order_history))
        .route("/client/cart", get(view_cart).delete(clear_cart))
        .route("/client/cart/items", post(add_to_cart))
        .route(
            "/client/cart/items/:product_id",
            patch(change_quantity).delete(remove_from_cart),
        )
        .route("/client/cart/checkout", post(checkout))
}

#[derive(Debug, Default, Deserialize)]
pub struct BusinessFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

impl BusinessFilter {
    /// Case-insensitive text match on name or category, plus an exact
    /// category match. `all` disables the category filter.
    pub fn matches(&self, business: &Business) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                business.name.to_lowercase().contains(&term)
                    || business.category.to_lowercase().contains(&term)
            }
            _ => true,
        };
        let matches_category = match self.category.as_deref() {
            None | Some("all") | Some("") => true,
            Some(category) => business.category == category,
        };
        matches_search && matches_category
    }
}

#[derive(Serialize)]
pub struct BusinessDetail {
    #[serde(flatten)]
    pub business: Business,
    pub products: Vec<Product>,
}

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
}

#[derive(Deserialize)]
pub struct ChangeQuantityRequest {
    pub delta: i64,
}

async fn list_businesses(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BusinessFilter>,
) -> Result<Json<Vec<Business>>, AppError> {
    let businesses = state
        .store
        .businesses()
        .await?
        .into_iter()
        .filter(|b| filter.matches(b))
        .collect();
    Ok(Json(businesses))
}

async fn business_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BusinessDetail>, AppError> {
    let business = state
        .store
        .businesses()
        .await?
        .into_iter()
        .find(|b| b.id == id)
        .ok_or_else(|| AppError::NotFound(format!("business {id} not found")))?;
    let products = state
        .store
        .products()
        .await?
        .into_iter()
        .filter(|p| p.business_id == id)
        .collect();

    Ok(Json(BusinessDetail { business, products }))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewClient>,
) -> Result<Json<Client>, AppError> {
    Ok(Json(state.store.add_client(payload).await?))
}

async fn order_history(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<Json<Vec<Order>>, AppError> {
    let mut orders: Vec<Order> = state
        .store
        .orders()
        .await?
        .into_iter()
        .filter(|o| o.client_id == client_id)
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(orders))
}

async fn view_cart(State(state): State<Arc<AppState>>) -> Result<Json<CartView>, AppError> {
    Ok(Json(state.cart.view()?))
}

async fn clear_cart(State(state): State<Arc<AppState>>) -> Result<Json<CartView>, AppError> {
    Ok(Json(state.cart.clear()?))
}

async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddToCartRequest>,
) -> Result<Json<CartView>, AppError> {
    let product = state
        .store
        .products()
        .await?
        .into_iter()
        .find(|p| p.id == payload.product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {} not found", payload.product_id)))?;
    let business = state
        .store
        .businesses()
        .await?
        .into_iter()
        .find(|b| b.id == product.business_id)
        .ok_or_else(|| AppError::NotFound(format!("business {} not found", product.business_id)))?;

    Ok(Json(state.cart.add(&product, &business)?))
}

async fn change_quantity(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Json(payload): Json<ChangeQuantityRequest>,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(state.cart.change_quantity(&product_id, payload.delta)?))
}

async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(state.cart.remove(&product_id)?))
}

async fn checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.cart.checkout(&state.store, payload).await?))
}
