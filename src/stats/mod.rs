//! Dashboard aggregates computed over full collections.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::lifecycle::commission;
use crate::models::delivery_person::DeliveryPerson;
use crate::models::order::{Order, OrderStatus};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderSummary {
    pub total_orders: usize,
    pub completed_orders: usize,
    /// Sum of totals over delivered orders.
    pub total_revenue: f64,
    pub average_order_value: f64,
    /// Percentage of orders that reached `delivered`.
    pub completion_rate: f64,
    pub by_status: BTreeMap<&'static str, usize>,
}

pub fn summarize<'a>(orders: impl IntoIterator<Item = &'a Order>) -> OrderSummary {
    let mut by_status: BTreeMap<&'static str, usize> =
        OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut total_orders = 0;
    let mut completed_orders = 0;
    let mut total_revenue = 0.0;

    for order in orders {
        total_orders += 1;
        *by_status.entry(order.status.as_str()).or_default() += 1;
        if order.status == OrderStatus::Delivered {
            completed_orders += 1;
            total_revenue += order.total;
        }
    }

    let average_order_value = if completed_orders > 0 {
        total_revenue / completed_orders as f64
    } else {
        0.0
    };
    let completion_rate = if total_orders > 0 {
        completed_orders as f64 / total_orders as f64 * 100.0
    } else {
        0.0
    };

    OrderSummary {
        total_orders,
        completed_orders,
        total_revenue,
        average_order_value,
        completion_rate,
        by_status,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub orders: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusinessStats {
    pub business_id: String,
    #[serde(flatten)]
    pub summary: OrderSummary,
    /// Oldest day first, ending with `today`.
    pub last_7_days: Vec<DailyStat>,
}

pub fn business_stats(business_id: &str, orders: &[Order], today: NaiveDate) -> BusinessStats {
    let own: Vec<&Order> = orders
        .iter()
        .filter(|o| o.business_id == business_id)
        .collect();

    let last_7_days = (0..7u64)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| {
            let day: Vec<&&Order> = own
                .iter()
                .filter(|o| o.created_at.date_naive() == date)
                .collect();
            DailyStat {
                date,
                orders: day.len(),
                revenue: day
                    .iter()
                    .filter(|o| o.status == OrderStatus::Delivered)
                    .map(|o| o.total)
                    .sum(),
            }
        })
        .collect();

    BusinessStats {
        business_id: business_id.to_string(),
        summary: summarize(own.iter().copied()),
        last_7_days,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub total_clients: usize,
    pub total_businesses: usize,
    pub total_delivery_persons: usize,
    pub active_deliveries: usize,
}

pub fn global_stats(
    orders: &[Order],
    total_clients: usize,
    total_businesses: usize,
    total_delivery_persons: usize,
) -> GlobalStats {
    GlobalStats {
        summary: summarize(orders),
        total_clients,
        total_businesses,
        total_delivery_persons,
        active_deliveries: orders
            .iter()
            .filter(|o| o.status == OrderStatus::Delivering)
            .count(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourierOverview {
    pub delivery_person_id: String,
    pub is_online: bool,
    pub today_deliveries: usize,
    pub today_earnings: f64,
    pub completed_deliveries: usize,
    pub active_deliveries: usize,
    pub available_orders: usize,
    /// Commission summed over this courier's delivered orders on record.
    pub recorded_commission: f64,
    pub total_deliveries: u32,
    pub earnings: f64,
}

pub fn courier_overview(
    person: &DeliveryPerson,
    orders: &[Order],
    today: NaiveDate,
) -> CourierOverview {
    let mine: Vec<&Order> = orders
        .iter()
        .filter(|o| o.delivery_person_id.as_deref() == Some(person.id.as_str()))
        .collect();
    let today_orders: Vec<&&Order> = mine
        .iter()
        .filter(|o| o.created_at.date_naive() == today)
        .collect();

    CourierOverview {
        delivery_person_id: person.id.clone(),
        is_online: person.is_online,
        today_deliveries: today_orders.len(),
        today_earnings: today_orders
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered)
            .map(|o| commission(o.total))
            .sum(),
        completed_deliveries: mine
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered)
            .count(),
        active_deliveries: mine
            .iter()
            .filter(|o| o.status == OrderStatus::Delivering)
            .count(),
        available_orders: orders.iter().filter(|o| is_available(o)).count(),
        recorded_commission: mine
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered)
            .map(|o| commission(o.total))
            .sum(),
        total_deliveries: person.total_deliveries,
        earnings: person.earnings,
    }
}

/// Ready for pickup and not yet claimed by any courier.
pub fn is_available(order: &Order) -> bool {
    order.status == OrderStatus::Ready && order.delivery_person_id.is_none()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::order::DeliveryAddress;
    use crate::models::GeoPoint;

    fn order(id: &str, business: &str, status: OrderStatus, total: f64, day: u32) -> Order {
        Order {
            id: id.to_string(),
            client_id: "c".to_string(),
            client_name: "C".to_string(),
            business_id: business.to_string(),
            business_name: "B".to_string(),
            items: Vec::new(),
            subtotal: total,
            delivery_fee: 0.0,
            total,
            delivery_address: DeliveryAddress {
                street: "s".to_string(),
                city: "c".to_string(),
                coordinates: GeoPoint::new(0.0, 0.0),
            },
            status,
            delivery_person_id: None,
            delivery_person_name: None,
            estimated_time: "30-45 min".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn empty_summary_has_zero_rates() {
        let summary = summarize(std::iter::empty());
        assert_eq!(summary.total_orders, 0);
        assert_eq!(summary.average_order_value, 0.0);
        assert_eq!(summary.completion_rate, 0.0);
        assert_eq!(summary.by_status.len(), OrderStatus::ALL.len());
    }

    #[test]
    fn revenue_counts_only_delivered_orders() {
        let orders = vec![
            order("1", "b", OrderStatus::Delivered, 20.0, 10),
            order("2", "b", OrderStatus::Delivered, 10.0, 10),
            order("3", "b", OrderStatus::Pending, 99.0, 10),
            order("4", "b", OrderStatus::Cancelled, 5.0, 10),
        ];
        let summary = summarize(&orders);

        assert_eq!(summary.completed_orders, 2);
        assert_eq!(summary.total_revenue, 30.0);
        assert_eq!(summary.average_order_value, 15.0);
        assert_eq!(summary.completion_rate, 50.0);
        assert_eq!(summary.by_status["cancelled"], 1);
    }

    #[test]
    fn business_stats_filter_by_owner_and_bucket_by_day() {
        let orders = vec![
            order("1", "b1", OrderStatus::Delivered, 20.0, 10),
            order("2", "b1", OrderStatus::Pending, 8.0, 9),
            order("3", "b2", OrderStatus::Delivered, 50.0, 10),
            order("4", "b1", OrderStatus::Delivered, 7.0, 1),
        ];
        let stats = business_stats("b1", &orders, day(10));

        assert_eq!(stats.summary.total_orders, 3);
        assert_eq!(stats.last_7_days.len(), 7);
        assert_eq!(stats.last_7_days[0].date, day(4));
        let today = stats.last_7_days.last().unwrap();
        assert_eq!(today.date, day(10));
        assert_eq!(today.orders, 1);
        assert_eq!(today.revenue, 20.0);
        assert_eq!(stats.last_7_days[5].orders, 1);
        assert_eq!(stats.last_7_days[5].revenue, 0.0);
    }

    #[test]
    fn courier_overview_uses_fifteen_percent_commission() {
        let mut delivered = order("1", "b", OrderStatus::Delivered, 22.5, 10);
        delivered.delivery_person_id = Some("dp".to_string());
        let mut active = order("2", "b", OrderStatus::Delivering, 10.0, 10);
        active.delivery_person_id = Some("dp".to_string());
        let open = order("3", "b", OrderStatus::Ready, 10.0, 10);

        let person = DeliveryPerson {
            id: "dp".to_string(),
            name: "D".to_string(),
            phone: String::new(),
            vehicle: String::new(),
            rating: 5.0,
            is_online: true,
            current_location: GeoPoint::new(0.0, 0.0),
            total_deliveries: 1,
            earnings: 3.375,
        };

        let overview = courier_overview(&person, &[delivered, active, open], day(10));
        assert_eq!(overview.completed_deliveries, 1);
        assert_eq!(overview.active_deliveries, 1);
        assert_eq!(overview.available_orders, 1);
        assert_eq!(overview.today_deliveries, 2);
        assert!((overview.today_earnings - 3.375).abs() < 1e-9);
        assert!((overview.recorded_commission - 3.375).abs() < 1e-9);
    }
}
