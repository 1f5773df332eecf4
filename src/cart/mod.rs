//! The client's shopping cart.
//!
//! Kept under its own blob key and written directly, outside the store. A
//! cart only ever holds products from a single business, because checkout
//! turns it into one order for that business.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::models::business::Business;
use crate::models::order::{DeliveryAddress, Order, OrderDraft, OrderItem};
use crate::models::product::Product;
use crate::storage::{Blobs, Collection};
use crate::store::StoreHandle;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
    pub business_name: String,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.product.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub item_count: u32,
    pub subtotal: f64,
}

impl CartView {
    fn of(items: Vec<CartItem>) -> Self {
        Self {
            item_count: items.iter().map(|item| item.quantity).sum(),
            subtotal: items.iter().map(CartItem::line_total).sum(),
            items,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub client_id: String,
    pub client_name: String,
    pub delivery_address: DeliveryAddress,
}

pub struct Cart {
    blobs: Blobs,
    items: Mutex<Vec<CartItem>>,
}

impl Cart {
    pub fn open(blobs: Blobs) -> Result<Self, AppError> {
        let items = blobs.load(Collection::Cart)?.unwrap_or_default();
        Ok(Self {
            blobs,
            items: Mutex::new(items),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<CartItem>>, AppError> {
        self.items
            .lock()
            .map_err(|_| AppError::Internal("cart lock poisoned".to_string()))
    }

    fn save(&self, items: &mut Vec<CartItem>, next: Vec<CartItem>) -> Result<CartView, AppError> {
        self.blobs.save(Collection::Cart, &next)?;
        *items = next;
        Ok(CartView::of(items.clone()))
    }

    pub fn view(&self) -> Result<CartView, AppError> {
        Ok(CartView::of(self.lock()?.clone()))
    }

    /// Adds one unit of `product`, merging with an existing line.
    pub fn add(&self, product: &Product, business: &Business) -> Result<CartView, AppError> {
        let mut items = self.lock()?;
        if let Some(first) = items.first() {
            if first.product.business_id != product.business_id {
                return Err(AppError::Conflict(format!(
                    "cart already holds items from {}",
                    first.business_name
                )));
            }
        }

        let mut next = items.clone();
        match next.iter_mut().find(|item| item.product.id == product.id) {
            Some(item) => item.quantity += 1,
            None => next.push(CartItem {
                product: product.clone(),
                quantity: 1,
                business_name: business.name.clone(),
            }),
        }
        self.save(&mut items, next)
    }

    /// Changes a line's quantity by `delta`, dropping it when it reaches zero.
    pub fn change_quantity(&self, product_id: &str, delta: i64) -> Result<CartView, AppError> {
        let mut items = self.lock()?;
        let mut next = items.clone();
        let position = next
            .iter()
            .position(|item| item.product.id == product_id)
            .ok_or_else(|| AppError::NotFound(format!("product {product_id} not in cart")))?;

        let quantity = next[position].quantity as i64 + delta;
        if quantity > 0 {
            next[position].quantity = u32::try_from(quantity)
                .map_err(|_| AppError::BadRequest("quantity too large".to_string()))?;
        } else {
            next.remove(position);
        }
        self.save(&mut items, next)
    }

    pub fn remove(&self, product_id: &str) -> Result<CartView, AppError> {
        let mut items = self.lock()?;
        let next: Vec<CartItem> = items
            .iter()
            .filter(|item| item.product.id != product_id)
            .cloned()
            .collect();
        self.save(&mut items, next)
    }

    pub fn clear(&self) -> Result<CartView, AppError> {
        let mut items = self.lock()?;
        self.blobs.clear(Collection::Cart)?;
        items.clear();
        Ok(CartView::of(Vec::new()))
    }

    /// Places the cart as a pending order and empties it.
    pub async fn checkout(
        &self,
        store: &StoreHandle,
        request: CheckoutRequest,
    ) -> Result<Order, AppError> {
        if request.delivery_address.street.trim().is_empty() {
            return Err(AppError::missing_field("delivery street"));
        }
        if request.delivery_address.city.trim().is_empty() {
            return Err(AppError::missing_field("delivery city"));
        }

        let items = self.lock()?.clone();
        let Some(first) = items.first() else {
            return Err(AppError::BadRequest("cart is empty".to_string()));
        };

        let draft = OrderDraft {
            client_id: request.client_id,
            client_name: request.client_name,
            business_id: first.product.business_id.clone(),
            items: items
                .iter()
                .map(|item| OrderItem {
                    product_id: item.product.id.clone(),
                    name: item.product.name.clone(),
                    price: item.product.price,
                    quantity: item.quantity,
                })
                .collect(),
            delivery_address: request.delivery_address,
            estimated_time: None,
        };

        let order = store.add_order(draft).await?;
        self.clear()?;
        info!(order_id = %order.id, client_id = %order.client_id, "cart checked out");
        Ok(order)
    }
}
