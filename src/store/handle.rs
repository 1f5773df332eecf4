use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::business::{Business, BusinessPatch, NewBusiness};
use crate::models::client::{Client, NewClient};
use crate::models::delivery_person::{DeliveryPerson, DeliveryPersonPatch, NewDeliveryPerson};
use crate::models::order::{Order, OrderDraft, OrderPatch, OrderStatus};
use crate::models::product::{NewProduct, Product, ProductPatch};
use crate::store::{Actor, Store, TransitionOutcome};

type Reply<T> = oneshot::Sender<Result<T, AppError>>;

enum StoreCommand {
    Businesses(Reply<Vec<Business>>),
    Products(Reply<Vec<Product>>),
    Orders(Reply<Vec<Order>>),
    DeliveryPersons(Reply<Vec<DeliveryPerson>>),
    Clients(Reply<Vec<Client>>),
    AddOrder(OrderDraft, Reply<Order>),
    UpdateOrder(String, OrderPatch, Reply<()>),
    AddBusiness(NewBusiness, Reply<Business>),
    UpdateBusiness(String, BusinessPatch, Reply<Option<Business>>),
    AddProduct(String, NewProduct, Reply<Product>),
    UpdateProduct(String, ProductPatch, Reply<Option<Product>>),
    DeleteProduct(String, Reply<Option<Product>>),
    AddDeliveryPerson(NewDeliveryPerson, Reply<DeliveryPerson>),
    UpdateDeliveryPerson(String, DeliveryPersonPatch, Reply<Option<DeliveryPerson>>),
    AddClient(NewClient, Reply<Client>),
    Transition(String, Actor, OrderStatus, Reply<TransitionOutcome>),
}

/// Cloneable entry point to the store. Every call is a message to the single
/// writer task, so mutations are applied one at a time in arrival order.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

/// Owns the [`Store`] and drains the command queue until every handle is
/// dropped.
pub struct StoreWorker {
    store: Store,
    rx: mpsc::Receiver<StoreCommand>,
}

pub fn channel(store: Store, queue_size: usize) -> (StoreHandle, StoreWorker) {
    let (tx, rx) = mpsc::channel(queue_size);
    (StoreHandle { tx }, StoreWorker { store, rx })
}

impl StoreWorker {
    pub async fn run(mut self) {
        info!("store worker started");

        while let Some(command) = self.rx.recv().await {
            self.dispatch(command);
        }

        warn!("store worker stopped: all handles dropped");
    }

    fn dispatch(&mut self, command: StoreCommand) {
        let store = &mut self.store;
        match command {
            StoreCommand::Businesses(reply) => respond(reply, Ok(store.businesses())),
            StoreCommand::Products(reply) => respond(reply, Ok(store.products())),
            StoreCommand::Orders(reply) => respond(reply, Ok(store.orders())),
            StoreCommand::DeliveryPersons(reply) => respond(reply, Ok(store.delivery_persons())),
            StoreCommand::Clients(reply) => respond(reply, Ok(store.clients())),
            StoreCommand::AddOrder(draft, reply) => respond(reply, store.add_order(draft)),
            StoreCommand::UpdateOrder(id, patch, reply) => {
                respond(reply, store.update_order(&id, patch))
            }
            StoreCommand::AddBusiness(new, reply) => respond(reply, store.add_business(new)),
            StoreCommand::UpdateBusiness(id, patch, reply) => {
                respond(reply, store.update_business(&id, patch))
            }
            StoreCommand::AddProduct(business_id, new, reply) => {
                respond(reply, store.add_product(&business_id, new))
            }
            StoreCommand::UpdateProduct(id, patch, reply) => {
                respond(reply, store.update_product(&id, patch))
            }
            StoreCommand::DeleteProduct(id, reply) => respond(reply, store.delete_product(&id)),
            StoreCommand::AddDeliveryPerson(new, reply) => {
                respond(reply, store.add_delivery_person(new))
            }
            StoreCommand::UpdateDeliveryPerson(id, patch, reply) => {
                respond(reply, store.update_delivery_person(&id, patch))
            }
            StoreCommand::AddClient(new, reply) => respond(reply, store.add_client(new)),
            StoreCommand::Transition(order_id, actor, target, reply) => {
                respond(reply, store.transition_order(&order_id, &actor, target))
            }
        }
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T, AppError>) {
    // The caller may have given up waiting; the mutation still stands.
    let _ = reply.send(result);
}

impl StoreHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> StoreCommand,
    ) -> Result<T, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| AppError::Internal("store worker is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| AppError::Internal("store worker dropped the reply".to_string()))?
    }

    pub async fn businesses(&self) -> Result<Vec<Business>, AppError> {
        self.call(StoreCommand::Businesses).await
    }

    pub async fn products(&self) -> Result<Vec<Product>, AppError> {
        self.call(StoreCommand::Products).await
    }

    pub async fn orders(&self) -> Result<Vec<Order>, AppError> {
        self.call(StoreCommand::Orders).await
    }

    pub async fn delivery_persons(&self) -> Result<Vec<DeliveryPerson>, AppError> {
        self.call(StoreCommand::DeliveryPersons).await
    }

    pub async fn clients(&self) -> Result<Vec<Client>, AppError> {
        self.call(StoreCommand::Clients).await
    }

    pub async fn add_order(&self, draft: OrderDraft) -> Result<Order, AppError> {
        self.call(|reply| StoreCommand::AddOrder(draft, reply)).await
    }

    pub async fn update_order(&self, id: &str, patch: OrderPatch) -> Result<(), AppError> {
        let id = id.to_string();
        self.call(|reply| StoreCommand::UpdateOrder(id, patch, reply))
            .await
    }

    pub async fn add_business(&self, new: NewBusiness) -> Result<Business, AppError> {
        self.call(|reply| StoreCommand::AddBusiness(new, reply)).await
    }

    pub async fn update_business(
        &self,
        id: &str,
        patch: BusinessPatch,
    ) -> Result<Option<Business>, AppError> {
        let id = id.to_string();
        self.call(|reply| StoreCommand::UpdateBusiness(id, patch, reply))
            .await
    }

    pub async fn add_product(
        &self,
        business_id: &str,
        new: NewProduct,
    ) -> Result<Product, AppError> {
        let business_id = business_id.to_string();
        self.call(|reply| StoreCommand::AddProduct(business_id, new, reply))
            .await
    }

    pub async fn update_product(
        &self,
        id: &str,
        patch: ProductPatch,
    ) -> Result<Option<Product>, AppError> {
        let id = id.to_string();
        self.call(|reply| StoreCommand::UpdateProduct(id, patch, reply))
            .await
    }

    pub async fn delete_product(&self, id: &str) -> Result<Option<Product>, AppError> {
        let id = id.to_string();
        self.call(|reply| StoreCommand::DeleteProduct(id, reply)).await
    }

    pub async fn add_delivery_person(
        &self,
        new: NewDeliveryPerson,
    ) -> Result<DeliveryPerson, AppError> {
        self.call(|reply| StoreCommand::AddDeliveryPerson(new, reply))
            .await
    }

    pub async fn update_delivery_person(
        &self,
        id: &str,
        patch: DeliveryPersonPatch,
    ) -> Result<Option<DeliveryPerson>, AppError> {
        let id = id.to_string();
        self.call(|reply| StoreCommand::UpdateDeliveryPerson(id, patch, reply))
            .await
    }

    pub async fn add_client(&self, new: NewClient) -> Result<Client, AppError> {
        self.call(|reply| StoreCommand::AddClient(new, reply)).await
    }

    pub async fn transition_order(
        &self,
        order_id: &str,
        actor: Actor,
        target: OrderStatus,
    ) -> Result<TransitionOutcome, AppError> {
        let order_id = order_id.to_string();
        self.call(|reply| StoreCommand::Transition(order_id, actor, target, reply))
            .await
    }

    /// Convenience lookup over the full order collection.
    pub async fn order(&self, id: &str) -> Result<Order, AppError> {
        self.orders()
            .await?
            .into_iter()
            .find(|o| o.id == id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }
}
