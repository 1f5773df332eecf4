use serde::{Deserialize, Serialize};

use crate::models::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryPerson {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub vehicle: String,
    pub rating: f64,
    pub is_online: bool,
    pub current_location: GeoPoint,
    pub total_deliveries: u32,
    pub earnings: f64,
}

impl DeliveryPerson {
    /// Credits one completed delivery. Counters only ever grow.
    pub fn credit_delivery(&mut self, commission: f64) {
        self.total_deliveries = self.total_deliveries.saturating_add(1);
        self.earnings += commission.max(0.0);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDeliveryPerson {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub vehicle: String,
    #[serde(default)]
    pub rating: f64,
    pub current_location: GeoPoint,
}

impl NewDeliveryPerson {
    pub fn into_delivery_person(self, id: String) -> DeliveryPerson {
        DeliveryPerson {
            id,
            name: self.name,
            phone: self.phone,
            vehicle: self.vehicle,
            rating: self.rating.clamp(0.0, 5.0),
            is_online: false,
            current_location: self.current_location,
            total_deliveries: 0,
            earnings: 0.0,
        }
    }
}

/// Partial update for profile and connectivity fields. Delivery count and
/// earnings move only through delivery completion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryPersonPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub vehicle: Option<String>,
    pub rating: Option<f64>,
    pub is_online: Option<bool>,
    pub current_location: Option<GeoPoint>,
}

impl DeliveryPersonPatch {
    pub fn online(is_online: bool) -> Self {
        Self {
            is_online: Some(is_online),
            ..Self::default()
        }
    }

    pub fn apply(self, person: &mut DeliveryPerson) {
        if let Some(name) = self.name {
            person.name = name;
        }
        if let Some(phone) = self.phone {
            person.phone = phone;
        }
        if let Some(vehicle) = self.vehicle {
            person.vehicle = vehicle;
        }
        if let Some(rating) = self.rating {
            person.rating = rating.clamp(0.0, 5.0);
        }
        if let Some(is_online) = self.is_online {
            person.is_online = is_online;
        }
        if let Some(location) = self.current_location {
            person.current_location = location;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> DeliveryPerson {
        NewDeliveryPerson {
            name: "Ana".to_string(),
            phone: String::new(),
            vehicle: "Bike".to_string(),
            rating: 7.0,
            current_location: GeoPoint::new(0.0, 0.0),
        }
        .into_delivery_person("dp-1".to_string())
    }

    #[test]
    fn new_delivery_person_starts_offline_with_clamped_rating() {
        let p = person();
        assert!(!p.is_online);
        assert_eq!(p.rating, 5.0);
        assert_eq!(p.total_deliveries, 0);
    }

    #[test]
    fn negative_commission_never_reduces_earnings() {
        let mut p = person();
        p.credit_delivery(3.0);
        p.credit_delivery(-10.0);
        assert_eq!(p.earnings, 3.0);
        assert_eq!(p.total_deliveries, 2);
    }
}
