use serde::Serialize;

use crate::models::business::Business;
use crate::models::client::Client;
use crate::models::delivery_person::DeliveryPerson;
use crate::models::order::{Order, OrderStatus};
use crate::models::product::Product;

/// Published after every committed mutation so live views can refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    OrderCreated {
        order: Order,
    },
    OrderUpdated {
        order: Order,
    },
    OrderStatusChanged {
        order: Order,
        from: OrderStatus,
        to: OrderStatus,
    },
    BusinessChanged {
        business: Business,
    },
    ProductChanged {
        product: Product,
    },
    ProductDeleted {
        product_id: String,
        business_id: String,
    },
    DeliveryPersonChanged {
        delivery_person: DeliveryPerson,
    },
    ClientAdded {
        client: Client,
    },
}
