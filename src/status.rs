//! Order lifecycle labels and the rules for moving between them.

use std::{fmt, io::Write, str::FromStr};

use diesel::{
    AsExpression, FromSqlRow,
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    serialize::{self, IsNull, Output, ToSql},
    sql_types::Text,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses an order may move to from `self` under the strict table.
    /// Staying put is always allowed and is not listed here.
    pub fn successors(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[
                OrderStatus::Confirmed,
                OrderStatus::Processing,
                OrderStatus::Cancelled,
            ],
            OrderStatus::Confirmed => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown order status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl ToSql<Text, Pg> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for OrderStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(raw.parse()?)
    }
}

/// How strictly status changes are checked.
///
/// `Strict` enforces [`OrderStatus::successors`]. `Permissive` accepts any
/// label to any label, which is how the storefront behaved before the table
/// existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    #[default]
    Strict,
    Permissive,
}

impl TransitionPolicy {
    pub fn allows(self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => from == to || from.successors().contains(&to),
        }
    }

    /// Every status from which `target` is reachable in one step.
    pub fn allowed_predecessors(self, target: OrderStatus) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .into_iter()
            .filter(|from| self.allows(*from, target))
            .collect()
    }
}

impl FromStr for TransitionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(TransitionPolicy::Strict),
            "permissive" => Ok(TransitionPolicy::Permissive),
            other => Err(anyhow::anyhow!(
                "{other} is not a valid transition policy (expected strict or permissive)"
            )),
        }
    }
}
