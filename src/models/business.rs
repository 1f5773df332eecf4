use serde::{Deserialize, Serialize};

use crate::models::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub category: String,
    pub rating: f64,
    /// Free-form estimate shown to clients, e.g. "25-35 min".
    pub delivery_time: String,
    pub delivery_fee: f64,
    pub is_open: bool,
    pub location: GeoPoint,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBusiness {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub delivery_time: String,
    #[serde(default)]
    pub delivery_fee: f64,
    #[serde(default)]
    pub is_open: bool,
    pub location: GeoPoint,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewBusiness {
    pub fn into_business(self, id: String) -> Business {
        Business {
            id,
            name: self.name,
            category: self.category,
            rating: self.rating,
            delivery_time: self.delivery_time,
            delivery_fee: self.delivery_fee,
            is_open: self.is_open,
            location: self.location,
            phone: self.phone,
            address: self.address,
            image: self.image,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub delivery_time: Option<String>,
    pub delivery_fee: Option<f64>,
    pub is_open: Option<bool>,
    pub location: Option<GeoPoint>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
}

impl BusinessPatch {
    pub fn apply(self, business: &mut Business) {
        if let Some(name) = self.name {
            business.name = name;
        }
        if let Some(category) = self.category {
            business.category = category;
        }
        if let Some(rating) = self.rating {
            business.rating = rating;
        }
        if let Some(delivery_time) = self.delivery_time {
            business.delivery_time = delivery_time;
        }
        if let Some(delivery_fee) = self.delivery_fee {
            business.delivery_fee = delivery_fee;
        }
        if let Some(is_open) = self.is_open {
            business.is_open = is_open;
        }
        if let Some(location) = self.location {
            business.location = location;
        }
        if let Some(phone) = self.phone {
            business.phone = phone;
        }
        if let Some(address) = self.address {
            business.address = address;
        }
        if let Some(image) = self.image {
            business.image = Some(image);
        }
    }
}
