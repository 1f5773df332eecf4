//! The in-memory entity tables and every operation that mutates them.
//!
//! [`Store`] is plain synchronous state. It is owned by a single writer task
//! (see [`handle`]) and reached through a cloneable [`StoreHandle`], so there
//! is exactly one writer at a time. Each mutation writes the full affected
//! collection to the blob store first and only then swaps it into memory.

pub mod events;
pub mod handle;
pub mod ids;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub use events::StoreEvent;
pub use handle::{StoreHandle, StoreWorker};

use crate::error::AppError;
use crate::lifecycle::{self, ActorRole};
use crate::models::business::{Business, BusinessPatch, NewBusiness};
use crate::models::client::{Client, NewClient};
use crate::models::delivery_person::{DeliveryPerson, DeliveryPersonPatch, NewDeliveryPerson};
use crate::models::order::{Order, OrderDraft, OrderItem, OrderPatch, OrderStatus};
use crate::models::product::{NewProduct, Product, ProductPatch};
use crate::observability::metrics::Metrics;
use crate::seed;
use crate::storage::{Blobs, Collection};
use ids::IdGenerator;

/// Who is asking for a status change: a business acting on its own orders or
/// a delivery person acting on orders they pick up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub role: ActorRole,
    pub id: String,
}

impl Actor {
    pub fn business(id: impl Into<String>) -> Self {
        Self {
            role: ActorRole::Business,
            id: id.into(),
        }
    }

    pub fn delivery(id: impl Into<String>) -> Self {
        Self {
            role: ActorRole::Delivery,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_person: Option<DeliveryPerson>,
}

#[derive(Debug, Default)]
struct Tables {
    businesses: Vec<Business>,
    products: Vec<Product>,
    orders: Vec<Order>,
    delivery_persons: Vec<DeliveryPerson>,
    clients: Vec<Client>,
}

pub struct Store {
    tables: Tables,
    blobs: Blobs,
    ids: IdGenerator,
    metrics: Metrics,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    /// Loads every collection from `blobs`. Absent businesses, products and
    /// delivery persons are replaced by the demo seed (and written back) when
    /// `seed_demo_data` is set; absent orders and clients start empty.
    pub fn load(
        blobs: Blobs,
        seed_demo_data: bool,
        metrics: Metrics,
        events: broadcast::Sender<StoreEvent>,
    ) -> Result<Self, AppError> {
        let mut store = Self {
            tables: Tables::default(),
            blobs,
            ids: IdGenerator::new(),
            metrics,
            events,
        };

        store.tables.businesses =
            store.load_or_seed(Collection::Businesses, seed_demo_data, seed::businesses)?;
        store.tables.products =
            store.load_or_seed(Collection::Products, seed_demo_data, seed::products)?;
        store.tables.delivery_persons = store.load_or_seed(
            Collection::DeliveryPersons,
            seed_demo_data,
            seed::delivery_persons,
        )?;
        store.tables.orders = store.blobs.load(Collection::Orders)?.unwrap_or_default();
        store.tables.clients = store.blobs.load(Collection::Clients)?.unwrap_or_default();

        info!(
            businesses = store.tables.businesses.len(),
            products = store.tables.products.len(),
            orders = store.tables.orders.len(),
            delivery_persons = store.tables.delivery_persons.len(),
            clients = store.tables.clients.len(),
            "store loaded"
        );

        Ok(store)
    }

    fn load_or_seed<T, F>(
        &self,
        collection: Collection,
        seed_demo_data: bool,
        seed: F,
    ) -> Result<Vec<T>, AppError>
    where
        T: Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Vec<T>,
    {
        if let Some(items) = self.blobs.load(collection)? {
            return Ok(items);
        }
        if !seed_demo_data {
            return Ok(Vec::new());
        }

        let items = seed();
        persist(&self.blobs, &self.metrics, collection, &items)?;
        debug!(collection = collection.name(), count = items.len(), "seeded collection");
        Ok(items)
    }

    /// Writes `items` back after a later write in the same change failed.
    fn restore<T: Serialize>(&self, collection: Collection, items: &[T]) {
        if persist(&self.blobs, &self.metrics, collection, items).is_err() {
            error!(
                collection = collection.name(),
                "stored collection no longer matches memory"
            );
        }
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is the normal case when nobody is watching.
        let _ = self.events.send(event);
    }

    pub fn businesses(&self) -> Vec<Business> {
        self.tables.businesses.clone()
    }

    pub fn products(&self) -> Vec<Product> {
        self.tables.products.clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.tables.orders.clone()
    }

    pub fn delivery_persons(&self) -> Vec<DeliveryPerson> {
        self.tables.delivery_persons.clone()
    }

    pub fn clients(&self) -> Vec<Client> {
        self.tables.clients.clone()
    }

    pub fn add_order(&mut self, draft: OrderDraft) -> Result<Order, AppError> {
        if draft.items.is_empty() {
            return Err(AppError::BadRequest("order has no items".to_string()));
        }
        if draft.delivery_address.street.trim().is_empty() {
            return Err(AppError::missing_field("delivery street"));
        }
        if draft.delivery_address.city.trim().is_empty() {
            return Err(AppError::missing_field("delivery city"));
        }

        let business = self
            .tables
            .businesses
            .iter()
            .find(|b| b.id == draft.business_id)
            .ok_or_else(|| AppError::NotFound(format!("business {} not found", draft.business_id)))?;

        let mut items = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            if item.quantity == 0 {
                return Err(AppError::BadRequest(format!(
                    "item {} has zero quantity",
                    item.product_id
                )));
            }
            let product = self
                .tables
                .products
                .iter()
                .find(|p| p.id == item.product_id && p.business_id == business.id)
                .ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "product {} is not sold by business {}",
                        item.product_id, business.id
                    ))
                })?;
            // Name and price always come from the catalogue.
            items.push(OrderItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                price: product.price,
                quantity: item.quantity,
            });
        }

        let subtotal: f64 = items.iter().map(OrderItem::line_total).sum();
        let delivery_fee = business.delivery_fee;
        let order = Order {
            id: self.ids.next_id(),
            client_id: draft.client_id,
            client_name: draft.client_name,
            business_id: business.id.clone(),
            business_name: business.name.clone(),
            items,
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
            delivery_address: draft.delivery_address,
            status: OrderStatus::Pending,
            delivery_person_id: None,
            delivery_person_name: None,
            estimated_time: draft
                .estimated_time
                .unwrap_or_else(|| business.delivery_time.clone()),
            created_at: chrono::Utc::now(),
        };

        let mut next = self.tables.orders.clone();
        next.push(order.clone());
        persist(&self.blobs, &self.metrics, Collection::Orders, &next)?;
        self.tables.orders = next;

        self.metrics.orders_created_total.inc();
        info!(
            order_id = %order.id,
            business_id = %order.business_id,
            total = order.total,
            "order created"
        );
        self.publish(StoreEvent::OrderCreated {
            order: order.clone(),
        });

        Ok(order)
    }

    /// Merges `patch` into the order. Unknown ids are ignored.
    pub fn update_order(&mut self, id: &str, patch: OrderPatch) -> Result<(), AppError> {
        let mut next = self.tables.orders.clone();
        let Some(order) = next.iter_mut().find(|o| o.id == id) else {
            debug!(order_id = %id, "update for unknown order ignored");
            return Ok(());
        };
        patch.apply(order);
        let updated = order.clone();

        persist(&self.blobs, &self.metrics, Collection::Orders, &next)?;
        self.tables.orders = next;
        self.publish(StoreEvent::OrderUpdated { order: updated });
        Ok(())
    }

    pub fn add_business(&mut self, new: NewBusiness) -> Result<Business, AppError> {
        if new.name.trim().is_empty() {
            return Err(AppError::missing_field("name"));
        }

        let business = new.into_business(self.ids.next_id());
        let mut next = self.tables.businesses.clone();
        next.push(business.clone());
        persist(&self.blobs, &self.metrics, Collection::Businesses, &next)?;
        self.tables.businesses = next;

        info!(business_id = %business.id, name = %business.name, "business added");
        self.publish(StoreEvent::BusinessChanged {
            business: business.clone(),
        });
        Ok(business)
    }

    /// Returns `None` without writing when the id is unknown.
    pub fn update_business(
        &mut self,
        id: &str,
        patch: BusinessPatch,
    ) -> Result<Option<Business>, AppError> {
        let mut next = self.tables.businesses.clone();
        let Some(business) = next.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        patch.apply(business);
        let updated = business.clone();

        persist(&self.blobs, &self.metrics, Collection::Businesses, &next)?;
        self.tables.businesses = next;
        self.publish(StoreEvent::BusinessChanged {
            business: updated.clone(),
        });
        Ok(Some(updated))
    }

    pub fn add_product(&mut self, business_id: &str, new: NewProduct) -> Result<Product, AppError> {
        if new.name.trim().is_empty() {
            return Err(AppError::missing_field("name"));
        }
        if new.category.trim().is_empty() {
            return Err(AppError::missing_field("category"));
        }
        if new.price.is_nan() || new.price <= 0.0 {
            return Err(AppError::missing_field("price"));
        }
        if !self.tables.businesses.iter().any(|b| b.id == business_id) {
            return Err(AppError::NotFound(format!("business {business_id} not found")));
        }

        let product = new.into_product(self.ids.next_id(), business_id.to_string());
        let mut next = self.tables.products.clone();
        next.push(product.clone());
        persist(&self.blobs, &self.metrics, Collection::Products, &next)?;
        self.tables.products = next;

        info!(product_id = %product.id, business_id = %business_id, "product added");
        self.publish(StoreEvent::ProductChanged {
            product: product.clone(),
        });
        Ok(product)
    }

    pub fn update_product(
        &mut self,
        id: &str,
        patch: ProductPatch,
    ) -> Result<Option<Product>, AppError> {
        if matches!(patch.price, Some(price) if price.is_nan() || price <= 0.0) {
            return Err(AppError::missing_field("price"));
        }

        let mut next = self.tables.products.clone();
        let Some(product) = next.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        patch.apply(product);
        let updated = product.clone();

        persist(&self.blobs, &self.metrics, Collection::Products, &next)?;
        self.tables.products = next;
        self.publish(StoreEvent::ProductChanged {
            product: updated.clone(),
        });
        Ok(Some(updated))
    }

    /// Returns the removed product, or `None` when nothing matched.
    pub fn delete_product(&mut self, id: &str) -> Result<Option<Product>, AppError> {
        let Some(position) = self.tables.products.iter().position(|p| p.id == id) else {
            return Ok(None);
        };

        let mut next = self.tables.products.clone();
        let removed = next.remove(position);
        persist(&self.blobs, &self.metrics, Collection::Products, &next)?;
        self.tables.products = next;

        info!(product_id = %removed.id, business_id = %removed.business_id, "product deleted");
        self.publish(StoreEvent::ProductDeleted {
            product_id: removed.id.clone(),
            business_id: removed.business_id.clone(),
        });
        Ok(Some(removed))
    }

    pub fn add_delivery_person(
        &mut self,
        new: NewDeliveryPerson,
    ) -> Result<DeliveryPerson, AppError> {
        if new.name.trim().is_empty() {
            return Err(AppError::missing_field("name"));
        }

        let person = new.into_delivery_person(self.ids.next_id());
        let mut next = self.tables.delivery_persons.clone();
        next.push(person.clone());
        persist(&self.blobs, &self.metrics, Collection::DeliveryPersons, &next)?;
        self.tables.delivery_persons = next;

        info!(delivery_person_id = %person.id, "delivery person added");
        self.publish(StoreEvent::DeliveryPersonChanged {
            delivery_person: person.clone(),
        });
        Ok(person)
    }

    pub fn update_delivery_person(
        &mut self,
        id: &str,
        patch: DeliveryPersonPatch,
    ) -> Result<Option<DeliveryPerson>, AppError> {
        let mut next = self.tables.delivery_persons.clone();
        let Some(person) = next.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        let was_online = person.is_online;
        patch.apply(person);
        let updated = person.clone();

        persist(&self.blobs, &self.metrics, Collection::DeliveryPersons, &next)?;
        self.tables.delivery_persons = next;

        if was_online != updated.is_online {
            info!(
                delivery_person_id = %updated.id,
                online = updated.is_online,
                "delivery person connectivity changed"
            );
        }
        self.publish(StoreEvent::DeliveryPersonChanged {
            delivery_person: updated.clone(),
        });
        Ok(Some(updated))
    }

    pub fn add_client(&mut self, new: NewClient) -> Result<Client, AppError> {
        if new.name.trim().is_empty() {
            return Err(AppError::missing_field("name"));
        }

        let client = new.into_client(self.ids.next_id());
        let mut next = self.tables.clients.clone();
        next.push(client.clone());
        persist(&self.blobs, &self.metrics, Collection::Clients, &next)?;
        self.tables.clients = next;

        info!(client_id = %client.id, "client signed up");
        self.publish(StoreEvent::ClientAdded {
            client: client.clone(),
        });
        Ok(client)
    }

    /// Applies one lifecycle step on behalf of `actor`.
    ///
    /// Moving to `delivering` assigns the acting courier and requires the
    /// order to be unassigned and the courier to be online. Moving to
    /// `delivered` credits the commission to the assigned courier.
    pub fn transition_order(
        &mut self,
        order_id: &str,
        actor: &Actor,
        target: OrderStatus,
    ) -> Result<TransitionOutcome, AppError> {
        let result = self.apply_transition(order_id, actor, target);
        if let Err(err) = &result {
            self.metrics
                .rejected_transitions_total
                .with_label_values(&[err.reason()])
                .inc();
            warn!(
                order_id = %order_id,
                actor_id = %actor.id,
                role = ?actor.role,
                target = %target,
                error = %err,
                "order transition rejected"
            );
        }
        result
    }

    fn apply_transition(
        &mut self,
        order_id: &str,
        actor: &Actor,
        target: OrderStatus,
    ) -> Result<TransitionOutcome, AppError> {
        let position = self
            .tables
            .orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let current = &self.tables.orders[position];

        if target == OrderStatus::Delivering {
            if let Some(assignee) = &current.delivery_person_id {
                return Err(AppError::Conflict(format!(
                    "order {order_id} is already assigned to {assignee}"
                )));
            }
        }
        lifecycle::check_transition(current.status, target, actor.role)?;

        let mut order = current.clone();
        let from = order.status;
        let mut credited = None;

        match actor.role {
            ActorRole::Business => {
                if order.business_id != actor.id {
                    return Err(AppError::Forbidden(format!(
                        "order {order_id} belongs to another business"
                    )));
                }
            }
            ActorRole::Delivery => {
                let person = self
                    .tables
                    .delivery_persons
                    .iter()
                    .find(|p| p.id == actor.id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("delivery person {} not found", actor.id))
                    })?;

                match target {
                    OrderStatus::Delivering => {
                        if !person.is_online {
                            return Err(AppError::Forbidden(format!(
                                "delivery person {} is offline",
                                person.id
                            )));
                        }
                        order.delivery_person_id = Some(person.id.clone());
                        order.delivery_person_name = Some(person.name.clone());
                    }
                    OrderStatus::Delivered => {
                        if order.delivery_person_id.as_deref() != Some(person.id.as_str()) {
                            return Err(AppError::Forbidden(format!(
                                "order {order_id} is not assigned to {}",
                                person.id
                            )));
                        }
                        let mut credited_person = person.clone();
                        credited_person.credit_delivery(lifecycle::commission(order.total));
                        credited = Some(credited_person);
                    }
                    _ => {}
                }
            }
            ActorRole::Client | ActorRole::Admin => {}
        }

        order.status = target;

        let mut next_orders = self.tables.orders.clone();
        next_orders[position] = order.clone();
        let next_persons = credited.as_ref().map(|person| {
            let mut next = self.tables.delivery_persons.clone();
            if let Some(slot) = next.iter_mut().find(|p| p.id == person.id) {
                *slot = person.clone();
            }
            next
        });

        // Both collections reach storage before either table is swapped.
        persist(&self.blobs, &self.metrics, Collection::Orders, &next_orders)?;
        if let Some(next_persons) = &next_persons {
            if let Err(err) = persist(
                &self.blobs,
                &self.metrics,
                Collection::DeliveryPersons,
                next_persons,
            ) {
                self.restore(Collection::Orders, &self.tables.orders);
                return Err(err);
            }
        }
        self.tables.orders = next_orders;
        if let Some(next_persons) = next_persons {
            self.tables.delivery_persons = next_persons;
        }

        self.metrics
            .order_transitions_total
            .with_label_values(&[target.as_str()])
            .inc();
        info!(
            order_id = %order.id,
            from = %from,
            to = %target,
            actor_id = %actor.id,
            "order transitioned"
        );

        self.publish(StoreEvent::OrderStatusChanged {
            order: order.clone(),
            from,
            to: target,
        });
        if let Some(person) = &credited {
            self.publish(StoreEvent::DeliveryPersonChanged {
                delivery_person: person.clone(),
            });
        }

        Ok(TransitionOutcome {
            order,
            delivery_person: credited,
        })
    }
}

fn persist<T: Serialize>(
    blobs: &Blobs,
    metrics: &Metrics,
    collection: Collection,
    items: &[T],
) -> Result<(), AppError> {
    match blobs.save(collection, items) {
        Ok(()) => {
            metrics.record_write(collection, true);
            Ok(())
        }
        Err(err) => {
            metrics.record_write(collection, false);
            error!(collection = collection.name(), error = %err, "failed to persist collection");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::models::order::{DeliveryAddress, OrderItem};
    use crate::models::GeoPoint;
    use crate::storage::{BlobStore, MemoryBlobStore};

    fn store_on(blob_store: Arc<MemoryBlobStore>) -> Store {
        let (events, _) = broadcast::channel(64);
        Store::load(Blobs::new(blob_store, "t_"), true, Metrics::new(), events).unwrap()
    }

    fn seeded() -> Store {
        store_on(Arc::new(MemoryBlobStore::new()))
    }

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            street: "1 Elm St".to_string(),
            city: "New York".to_string(),
            coordinates: GeoPoint::new(40.73, -73.99),
        }
    }

    /// Eight colas at the catalogue price of 2.50 come to 20.00.
    fn twenty_dollar_draft() -> OrderDraft {
        OrderDraft {
            client_id: "c1".to_string(),
            client_name: "Client".to_string(),
            business_id: "1".to_string(),
            items: vec![OrderItem {
                product_id: "3".to_string(),
                name: "Cola".to_string(),
                price: 2.5,
                quantity: 8,
            }],
            delivery_address: address(),
            estimated_time: None,
        }
    }

    fn ready_order(store: &mut Store) -> Order {
        let order = store.add_order(twenty_dollar_draft()).unwrap();
        let business = Actor::business("1");
        for target in [OrderStatus::Accepted, OrderStatus::Preparing, OrderStatus::Ready] {
            store.transition_order(&order.id, &business, target).unwrap();
        }
        store
            .orders()
            .into_iter()
            .find(|o| o.id == order.id)
            .unwrap()
    }

    #[test]
    fn first_load_seeds_and_persists_demo_catalogue() {
        let blob_store = Arc::new(MemoryBlobStore::new());
        let store = store_on(blob_store.clone());

        assert_eq!(store.businesses().len(), 3);
        assert_eq!(store.products().len(), 9);
        assert_eq!(store.delivery_persons().len(), 2);
        assert!(store.orders().is_empty());
        assert!(store.clients().is_empty());
        assert!(blob_store.get("t_businesses").unwrap().is_some());
        assert!(blob_store.get("t_orders").unwrap().is_none());
    }

    #[test]
    fn load_without_seed_starts_empty() {
        let (events, _) = broadcast::channel(4);
        let store = Store::load(
            Blobs::new(Arc::new(MemoryBlobStore::new()), "t_"),
            false,
            Metrics::new(),
            events,
        )
        .unwrap();
        assert!(store.businesses().is_empty());
    }

    #[test]
    fn new_order_is_pending_and_totals_include_fee() {
        let mut store = seeded();
        let order = store.add_order(twenty_dollar_draft()).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!((order.subtotal - 20.0).abs() < 1e-9);
        assert!((order.delivery_fee - 2.5).abs() < 1e-9);
        assert!((order.total - 22.5).abs() < 1e-9);
        assert_eq!(order.total, order.subtotal + order.delivery_fee);
        assert_eq!(order.business_name, "Pizza Express");
        assert_eq!(order.estimated_time, "25-35 min");
        assert!(order.delivery_person_id.is_none());
    }

    #[test]
    fn later_fee_change_does_not_touch_existing_total() {
        let mut store = seeded();
        let order = store.add_order(twenty_dollar_draft()).unwrap();

        store
            .update_business(
                "1",
                BusinessPatch {
                    delivery_fee: Some(9.0),
                    ..BusinessPatch::default()
                },
            )
            .unwrap();

        let stored = store.orders().into_iter().find(|o| o.id == order.id).unwrap();
        assert!((stored.total - 22.5).abs() < 1e-9);
    }

    #[test]
    fn order_ids_are_unique() {
        let mut store = seeded();
        let a = store.add_order(twenty_dollar_draft()).unwrap();
        let b = store.add_order(twenty_dollar_draft()).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn order_for_unknown_business_is_rejected() {
        let mut store = seeded();
        let mut draft = twenty_dollar_draft();
        draft.business_id = "404".to_string();
        assert!(matches!(store.add_order(draft), Err(AppError::NotFound(_))));
    }

    #[test]
    fn order_with_foreign_product_is_rejected() {
        let mut store = seeded();
        let mut draft = twenty_dollar_draft();
        draft.items[0].product_id = "7".to_string();
        assert!(matches!(store.add_order(draft), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn update_order_ignores_unknown_ids() {
        let mut store = seeded();
        store
            .update_order(
                "missing",
                OrderPatch {
                    estimated_time: Some("soon".to_string()),
                    ..OrderPatch::default()
                },
            )
            .unwrap();
        assert!(store.orders().is_empty());
    }

    #[test]
    fn update_order_merges_fields() {
        let mut store = seeded();
        let order = store.add_order(twenty_dollar_draft()).unwrap();
        store
            .update_order(
                &order.id,
                OrderPatch {
                    estimated_time: Some("10 min".to_string()),
                    ..OrderPatch::default()
                },
            )
            .unwrap();

        let stored = store.orders().into_iter().find(|o| o.id == order.id).unwrap();
        assert_eq!(stored.estimated_time, "10 min");
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[test]
    fn products_require_name_price_and_category() {
        let mut store = seeded();
        let new = |name: &str, price: f64, category: &str| NewProduct {
            name: name.to_string(),
            price,
            description: String::new(),
            category: category.to_string(),
            image: None,
        };

        assert!(store.add_product("1", new("", 3.0, "Drinks")).is_err());
        assert!(store.add_product("1", new("Water", 0.0, "Drinks")).is_err());
        assert!(store.add_product("1", new("Water", 1.0, " ")).is_err());
        let water = store.add_product("1", new("Water", 1.0, "Drinks")).unwrap();
        assert_eq!(water.business_id, "1");
    }

    #[test]
    fn product_update_keeps_owner_and_delete_removes() {
        let mut store = seeded();
        let updated = store
            .update_product(
                "1",
                ProductPatch {
                    price: Some(13.5),
                    ..ProductPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.price, 13.5);
        assert_eq!(updated.business_id, "1");

        assert!(store.delete_product("1").unwrap().is_some());
        assert!(store.delete_product("1").unwrap().is_none());
        assert_eq!(store.products().len(), 8);
    }

    #[test]
    fn mutations_survive_a_reload() {
        let blob_store = Arc::new(MemoryBlobStore::new());
        let (order, client) = {
            let mut store = store_on(blob_store.clone());
            let client = store
                .add_client(NewClient {
                    name: "Lucia".to_string(),
                    email: "lucia@example.com".to_string(),
                    phone: String::new(),
                    address: String::new(),
                })
                .unwrap();
            (store.add_order(twenty_dollar_draft()).unwrap(), client)
        };

        let reloaded = store_on(blob_store);
        assert_eq!(reloaded.orders(), vec![order]);
        assert_eq!(reloaded.clients(), vec![client]);
    }

    #[test]
    fn business_walks_order_to_ready() {
        let mut store = seeded();
        let order = ready_order(&mut store);
        assert_eq!(order.status, OrderStatus::Ready);
    }

    #[test]
    fn business_cannot_touch_another_business_order() {
        let mut store = seeded();
        let order = store.add_order(twenty_dollar_draft()).unwrap();
        let err = store
            .transition_order(&order.id, &Actor::business("2"), OrderStatus::Accepted)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn skipping_a_state_is_rejected_and_leaves_order_untouched() {
        let mut store = seeded();
        let order = store.add_order(twenty_dollar_draft()).unwrap();
        let err = store
            .transition_order(&order.id, &Actor::business("1"), OrderStatus::Ready)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(store.orders()[0].status, OrderStatus::Pending);
    }

    #[test]
    fn offline_courier_cannot_accept() {
        let mut store = seeded();
        let order = ready_order(&mut store);
        let err = store
            .transition_order(&order.id, &Actor::delivery("1"), OrderStatus::Delivering)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn assignment_happens_at_most_once() {
        let mut store = seeded();
        let order = ready_order(&mut store);
        store
            .update_delivery_person("1", DeliveryPersonPatch::online(true))
            .unwrap();

        let outcome = store
            .transition_order(&order.id, &Actor::delivery("2"), OrderStatus::Delivering)
            .unwrap();
        assert_eq!(outcome.order.delivery_person_id.as_deref(), Some("2"));

        let err = store
            .transition_order(&order.id, &Actor::delivery("1"), OrderStatus::Delivering)
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.orders()[0].delivery_person_id.as_deref(), Some("2"));
    }

    #[test]
    fn only_the_assignee_can_complete() {
        let mut store = seeded();
        let order = ready_order(&mut store);
        store
            .update_delivery_person("1", DeliveryPersonPatch::online(true))
            .unwrap();
        store
            .transition_order(&order.id, &Actor::delivery("2"), OrderStatus::Delivering)
            .unwrap();

        let err = store
            .transition_order(&order.id, &Actor::delivery("1"), OrderStatus::Delivered)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn completing_credits_commission_once() {
        let mut store = seeded();
        let order = ready_order(&mut store);
        let before = store
            .delivery_persons()
            .into_iter()
            .find(|p| p.id == "2")
            .unwrap();

        let courier = Actor::delivery("2");
        store
            .transition_order(&order.id, &courier, OrderStatus::Delivering)
            .unwrap();
        let outcome = store
            .transition_order(&order.id, &courier, OrderStatus::Delivered)
            .unwrap();

        let after = outcome.delivery_person.unwrap();
        assert_eq!(outcome.order.status, OrderStatus::Delivered);
        assert_eq!(after.total_deliveries, before.total_deliveries + 1);
        assert!((after.earnings - before.earnings - 3.375).abs() < 1e-9);

        let again = store.transition_order(&order.id, &courier, OrderStatus::Delivered);
        assert!(matches!(again, Err(AppError::InvalidTransition { .. })));
        let stored = store
            .delivery_persons()
            .into_iter()
            .find(|p| p.id == "2")
            .unwrap();
        assert_eq!(stored.total_deliveries, after.total_deliveries);
    }

    #[test]
    fn status_changes_are_published() {
        let (events, mut rx) = broadcast::channel(64);
        let mut store = Store::load(
            Blobs::new(Arc::new(MemoryBlobStore::new()), "t_"),
            true,
            Metrics::new(),
            events,
        )
        .unwrap();

        let order = store.add_order(twenty_dollar_draft()).unwrap();
        store
            .transition_order(&order.id, &Actor::business("1"), OrderStatus::Cancelled)
            .unwrap();

        assert!(matches!(rx.try_recv(), Ok(StoreEvent::OrderCreated { .. })));
        match rx.try_recv() {
            Ok(StoreEvent::OrderStatusChanged { from, to, .. }) => {
                assert_eq!(from, OrderStatus::Pending);
                assert_eq!(to, OrderStatus::Cancelled);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn new_business_and_client_get_fresh_ids() {
        let mut store = seeded();

        let business = store
            .add_business(NewBusiness {
                name: "Taco Stand".to_string(),
                category: "Mexican".to_string(),
                rating: 4.2,
                delivery_time: "15-25 min".to_string(),
                delivery_fee: 1.5,
                is_open: true,
                location: GeoPoint::new(40.7, -74.0),
                phone: String::new(),
                address: String::new(),
                image: None,
            })
            .unwrap();
        assert_eq!(store.businesses().len(), 4);
        assert!(seed::businesses().iter().all(|b| b.id != business.id));

        let client = store
            .add_client(NewClient {
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                phone: String::new(),
                address: String::new(),
            })
            .unwrap();
        assert_eq!(store.clients(), vec![client]);
    }

    #[test]
    fn nameless_client_is_rejected() {
        let mut store = seeded();
        let err = store
            .add_client(NewClient {
                name: " ".to_string(),
                email: String::new(),
                phone: String::new(),
                address: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(store.clients().is_empty());
    }

    #[test]
    fn order_lines_use_catalogue_name_and_price() {
        let mut store = seeded();
        let mut draft = twenty_dollar_draft();
        draft.items[0].name = "Free Cola".to_string();
        draft.items[0].price = 0.01;

        let order = store.add_order(draft).unwrap();
        assert_eq!(order.items[0].name, "Cola");
        assert!((order.items[0].price - 2.5).abs() < 1e-9);
        assert!((order.total - 22.5).abs() < 1e-9);
    }

    /// Memory store whose writes to the courier collection can be made to fail.
    #[derive(Default)]
    struct FlakyCourierStore {
        inner: MemoryBlobStore,
        fail_couriers: AtomicBool,
    }

    impl BlobStore for FlakyCourierStore {
        fn get(&self, key: &str) -> Result<Option<String>, AppError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
            if self.fail_couriers.load(Ordering::SeqCst) && key.ends_with("deliveryPersons") {
                return Err(AppError::Storage("disk full".to_string()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), AppError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn failed_courier_write_leaves_delivery_undone() {
        let blob_store = Arc::new(FlakyCourierStore::default());
        let (events, _) = broadcast::channel(64);
        let mut store = Store::load(
            Blobs::new(blob_store.clone(), "t_"),
            true,
            Metrics::new(),
            events,
        )
        .unwrap();
        let order = ready_order(&mut store);
        let courier = Actor::delivery("2");
        store
            .transition_order(&order.id, &courier, OrderStatus::Delivering)
            .unwrap();

        blob_store.fail_couriers.store(true, Ordering::SeqCst);
        let err = store
            .transition_order(&order.id, &courier, OrderStatus::Delivered)
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let in_memory = store.orders().into_iter().find(|o| o.id == order.id).unwrap();
        assert_eq!(in_memory.status, OrderStatus::Delivering);
        let on_disk: Vec<Order> = Blobs::new(blob_store.clone(), "t_")
            .load(Collection::Orders)
            .unwrap()
            .unwrap();
        let stored = on_disk.into_iter().find(|o| o.id == order.id).unwrap();
        assert_eq!(stored.status, OrderStatus::Delivering);

        // Once storage recovers the same completion goes through and pays out.
        blob_store.fail_couriers.store(false, Ordering::SeqCst);
        let outcome = store
            .transition_order(&order.id, &courier, OrderStatus::Delivered)
            .unwrap();
        let paid = outcome.delivery_person.unwrap();
        assert_eq!(paid.total_deliveries, 190);
        assert!((paid.earnings - (980.25 + 3.375)).abs() < 1e-9);
    }
}
