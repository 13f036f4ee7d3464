use serde::Serialize;
use utoipa::ToSchema;

use crate::status::OrderStatus;

/// Stages shown on the tracking page, in display order.
pub const STAGES: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TrackingStage {
    pub status: OrderStatus,
    pub label: &'static str,
    pub completed: bool,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Tracking {
    pub stages: Vec<TrackingStage>,
    /// Set when the status sits outside the stage list; no stage is then
    /// marked completed or current.
    pub cancelled: bool,
}

fn label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Order placed",
        OrderStatus::Confirmed => "Payment confirmed",
        OrderStatus::Processing => "Roasting & packing",
        OrderStatus::Shipped => "On the way",
        OrderStatus::Delivered => "Delivered",
        OrderStatus::Cancelled => "Cancelled",
    }
}

pub fn track(status: OrderStatus) -> Tracking {
    let position = STAGES.iter().position(|stage| *stage == status);

    let stages = STAGES
        .iter()
        .enumerate()
        .map(|(index, stage)| TrackingStage {
            status: *stage,
            label: label(*stage),
            completed: position.is_some_and(|p| index <= p),
            current: position == Some(index),
        })
        .collect();

    Tracking {
        stages,
        cancelled: position.is_none(),
    }
}
