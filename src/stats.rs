//! In-memory aggregation behind the admin dashboard. Inputs are full scans
//! of the orders table; nothing here is cached or incremental.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{models::OrderEntity, status::OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderStats {
    pub total_orders: u64,
    pub by_status: Vec<StatusCount>,
    /// Sum of every order total, cancelled ones included.
    pub total_revenue: i64,
    pub revenue_excluding_cancelled: i64,
    /// Integer average over non-cancelled orders, 0 when there are none.
    pub average_order_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DailySales {
    pub date: NaiveDate,
    pub orders: u64,
    pub revenue: i64,
}

pub fn summarize(orders: &[OrderEntity]) -> OrderStats {
    let by_status = OrderStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: orders.iter().filter(|o| o.status == status).count() as u64,
        })
        .collect();

    let total_revenue = orders.iter().map(|o| o.total_amount).sum();
    let (kept_count, revenue_excluding_cancelled) = orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .fold((0i64, 0i64), |(count, sum), o| (count + 1, sum + o.total_amount));

    let average_order_value = if kept_count == 0 {
        0
    } else {
        revenue_excluding_cancelled / kept_count
    };

    OrderStats {
        total_orders: orders.len() as u64,
        by_status,
        total_revenue,
        revenue_excluding_cancelled,
        average_order_value,
    }
}

/// One bucket per calendar day (UTC) for the `days` days ending on `today`,
/// oldest first, zero-filled. Orders outside the window are ignored.
pub fn daily_sales(orders: &[OrderEntity], today: NaiveDate, days: u64) -> Vec<DailySales> {
    if days == 0 {
        return Vec::new();
    }
    let Some(first_day) = today.checked_sub_days(Days::new(days - 1)) else {
        return Vec::new();
    };

    let mut buckets: Vec<DailySales> = first_day
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|date| DailySales {
            date,
            orders: 0,
            revenue: 0,
        })
        .collect();

    for order in orders {
        let day = order.created_at.date_naive();
        if let Some(bucket) = buckets.iter_mut().find(|b| b.date == day) {
            bucket.orders += 1;
            bucket.revenue += order.total_amount;
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn order(status: OrderStatus, total_amount: i64, day: u32) -> OrderEntity {
        let created_at = Utc.with_ymd_and_hms(2025, 9, day, 10, 30, 0).unwrap();
        OrderEntity {
            id: Uuid::new_v4(),
            order_number: format!("ORD-{day}"),
            user_id: Uuid::new_v4(),
            status,
            subtotal: total_amount - 12_000,
            shipping_fee: 12_000,
            discount: 0,
            total_amount,
            shipping_name: "Budi".into(),
            shipping_phone: "0813".into(),
            shipping_address: "Jl. Kopi 2".into(),
            shipping_city: "Medan".into(),
            shipping_postal_code: "20111".into(),
            payment_method: "COD".into(),
            estimated_delivery: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn summarize_counts_every_status() {
        let orders = vec![
            order(OrderStatus::Pending, 100_000, 18),
            order(OrderStatus::Delivered, 200_000, 19),
            order(OrderStatus::Cancelled, 50_000, 20),
            order(OrderStatus::Delivered, 60_000, 20),
        ];

        let stats = summarize(&orders);

        assert_eq!(stats.total_orders, 4);
        assert_eq!(stats.by_status.len(), OrderStatus::ALL.len());
        let delivered = stats
            .by_status
            .iter()
            .find(|c| c.status == OrderStatus::Delivered)
            .unwrap();
        assert_eq!(delivered.count, 2);
        assert_eq!(stats.total_revenue, 410_000);
        assert_eq!(stats.revenue_excluding_cancelled, 360_000);
        assert_eq!(stats.average_order_value, 120_000);
    }

    #[test]
    fn summarize_handles_no_orders() {
        let stats = summarize(&[]);

        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.total_revenue, 0);
        assert_eq!(stats.average_order_value, 0);
        assert!(stats.by_status.iter().all(|c| c.count == 0));
    }

    #[test]
    fn daily_sales_zero_fills_a_seven_day_window() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 20).unwrap();
        let orders = vec![
            order(OrderStatus::Pending, 100_000, 20),
            order(OrderStatus::Shipped, 40_000, 20),
            order(OrderStatus::Delivered, 70_000, 15),
            order(OrderStatus::Delivered, 999_000, 10),
        ];

        let buckets = daily_sales(&orders, today, 7);

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].date, NaiveDate::from_ymd_opt(2025, 9, 14).unwrap());
        assert_eq!(buckets[6].date, today);
        assert_eq!(buckets[6].orders, 2);
        assert_eq!(buckets[6].revenue, 140_000);
        assert_eq!(buckets[1].revenue, 70_000);
        assert_eq!(buckets.iter().map(|b| b.orders).sum::<u64>(), 3);
    }

    #[test]
    fn zero_day_window_is_empty() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 20).unwrap();

        assert!(daily_sales(&[], today, 0).is_empty());
    }
}
