//! Demo catalogue written on first start when a collection key is absent.

use crate::models::business::Business;
use crate::models::delivery_person::DeliveryPerson;
use crate::models::product::Product;
use crate::models::GeoPoint;

#[allow(clippy::too_many_arguments)]
fn business(
    id: &str,
    name: &str,
    category: &str,
    rating: f64,
    delivery_time: &str,
    delivery_fee: f64,
    location: GeoPoint,
    phone: &str,
    address: &str,
) -> Business {
    Business {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        rating,
        delivery_time: delivery_time.to_string(),
        delivery_fee,
        is_open: true,
        location,
        phone: phone.to_string(),
        address: address.to_string(),
        image: None,
    }
}

pub fn businesses() -> Vec<Business> {
    vec![
        business(
            "1",
            "Pizza Express",
            "Fast Food",
            4.5,
            "25-35 min",
            2.50,
            GeoPoint::new(40.7128, -74.0060),
            "+1234567890",
            "123 Main St, New York, NY",
        ),
        business(
            "2",
            "Burger Palace",
            "Burgers",
            4.2,
            "20-30 min",
            3.00,
            GeoPoint::new(40.7589, -73.9851),
            "+1234567891",
            "456 Broadway, New York, NY",
        ),
        business(
            "3",
            "Sushi Zen",
            "Japanese",
            4.8,
            "30-45 min",
            4.00,
            GeoPoint::new(40.7505, -73.9934),
            "+1234567892",
            "789 5th Ave, New York, NY",
        ),
    ]
}

pub fn products() -> Vec<Product> {
    let rows: [(&str, &str, &str, f64, &str, &str); 9] = [
        ("1", "1", "Pizza Margherita", 12.99, "Tomato, mozzarella and fresh basil", "Pizzas"),
        ("2", "1", "Pizza Pepperoni", 14.99, "Pepperoni and mozzarella", "Pizzas"),
        ("3", "1", "Cola", 2.50, "Soft drink 500ml", "Drinks"),
        ("4", "2", "Classic Burger", 9.99, "Beef, lettuce, tomato, onion", "Burgers"),
        ("5", "2", "BBQ Burger", 11.99, "Beef, BBQ sauce, caramelised onion", "Burgers"),
        ("6", "2", "Fries", 4.99, "Crispy salted fries", "Sides"),
        ("7", "3", "Salmon Sushi", 8.99, "8 pieces of salmon sushi", "Sushi"),
        ("8", "3", "California Roll", 12.99, "Crab, avocado, cucumber", "Rolls"),
        ("9", "3", "Green Tea", 3.50, "Traditional Japanese green tea", "Drinks"),
    ];

    rows.iter()
        .map(|(id, business_id, name, price, description, category)| Product {
            id: id.to_string(),
            business_id: business_id.to_string(),
            name: name.to_string(),
            price: *price,
            description: description.to_string(),
            category: category.to_string(),
            image: None,
        })
        .collect()
}

pub fn delivery_persons() -> Vec<DeliveryPerson> {
    vec![
        DeliveryPerson {
            id: "1".to_string(),
            name: "Carlos Rodriguez".to_string(),
            phone: "+1234567893".to_string(),
            vehicle: "Motorcycle".to_string(),
            rating: 4.8,
            is_online: false,
            current_location: GeoPoint::new(40.7128, -74.0060),
            total_deliveries: 245,
            earnings: 1250.50,
        },
        DeliveryPerson {
            id: "2".to_string(),
            name: "Maria Gonzalez".to_string(),
            phone: "+1234567894".to_string(),
            vehicle: "Bicycle".to_string(),
            rating: 4.9,
            is_online: true,
            current_location: GeoPoint::new(40.7589, -73.9851),
            total_deliveries: 189,
            earnings: 980.25,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_seeded_product_belongs_to_a_seeded_business() {
        let businesses = businesses();
        for product in products() {
            assert!(businesses.iter().any(|b| b.id == product.business_id));
        }
    }
}
