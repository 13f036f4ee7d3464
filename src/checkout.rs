//! Turning a submitted cart into the rows of a new order.
//!
//! Prices come from the client's cart snapshot and are trusted as-is; stock is
//! neither checked nor decremented here.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    app_error::AppError, config::CheckoutConfig, models::CreateOrderEntity, status::OrderStatus,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Quantity for product {0} must be positive")]
    NonPositiveQuantity(Uuid),

    #[error("Price for product {0} must not be negative")]
    NegativePrice(Uuid),

    #[error("Discount must not be negative")]
    NegativeDiscount,

    #[error("Order total is too large")]
    Overflow,

    #[error("Shipping {0} is required")]
    MissingShippingField(&'static str),

    #[error("Payment method is required")]
    MissingPaymentMethod,

    #[error("Payment method label must not contain card numbers")]
    CardNumberInLabel,

    #[error("Card number is not valid")]
    InvalidCardNumber,

    #[error("Estimated delivery date is out of range")]
    DeliveryDateOutOfRange,
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// One line of the client-side cart: the price is the snapshot shown to the
/// customer when they added the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

/// Item row to insert once the order id is known.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
}

/// A validated cart with one line per distinct product.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Lines naming the same product are merged: quantities add up and the
    /// first price snapshot is kept.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, CheckoutError> {
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity <= 0 {
                return Err(CheckoutError::NonPositiveQuantity(line.product_id));
            }
            if line.unit_price < 0 {
                return Err(CheckoutError::NegativePrice(line.product_id));
            }

            match merged.iter_mut().find(|m| m.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or(CheckoutError::Overflow)?;
                }
                None => merged.push(line),
            }
        }

        Ok(Self { lines: merged })
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn items(&self) -> Result<Vec<NewOrderItem>, CheckoutError> {
        self.lines
            .iter()
            .map(|line| {
                let subtotal = line
                    .unit_price
                    .checked_mul(i64::from(line.quantity))
                    .ok_or(CheckoutError::Overflow)?;
                Ok(NewOrderItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    subtotal,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Totals {
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount: i64,
    pub total: i64,
}

impl Totals {
    /// `total = subtotal + shipping_fee - discount`, with the discount capped
    /// at the subtotal so shipping is always paid.
    pub fn compute(
        items: &[NewOrderItem],
        shipping_fee: i64,
        discount: i64,
    ) -> Result<Self, CheckoutError> {
        if discount < 0 {
            return Err(CheckoutError::NegativeDiscount);
        }

        let subtotal = items.iter().try_fold(0i64, |acc, item| {
            acc.checked_add(item.subtotal).ok_or(CheckoutError::Overflow)
        })?;
        let discount = discount.min(subtotal);
        let total = subtotal
            .checked_add(shipping_fee)
            .and_then(|sum| sum.checked_sub(discount))
            .ok_or(CheckoutError::Overflow)?;

        Ok(Self {
            subtotal,
            shipping_fee,
            discount,
            total,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShippingDetails {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

impl ShippingDetails {
    fn trimmed(self) -> Result<Self, CheckoutError> {
        let field = |value: String, name: &'static str| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(CheckoutError::MissingShippingField(name))
            } else {
                Ok(value)
            }
        };

        Ok(Self {
            name: field(self.name, "name")?,
            phone: field(self.phone, "phone")?,
            address: field(self.address, "address")?,
            city: field(self.city, "city")?,
            postal_code: field(self.postal_code, "postal code")?,
        })
    }
}

/// What the customer typed on the payment step. Card fields are only used to
/// derive a masked label and are dropped afterwards; there is no gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetails {
    pub method: String,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub card_expiry: Option<String>,
    #[serde(default)]
    pub card_cvc: Option<String>,
}

impl PaymentDetails {
    pub fn masked_label(&self) -> Result<String, CheckoutError> {
        let method = self.method.trim();
        if method.is_empty() {
            return Err(CheckoutError::MissingPaymentMethod);
        }
        if longest_digit_run(method) >= 8 {
            return Err(CheckoutError::CardNumberInLabel);
        }

        let Some(card_number) = &self.card_number else {
            return Ok(method.to_string());
        };

        let digits: String = card_number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if !(12..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CheckoutError::InvalidCardNumber);
        }

        let last4: String = digits.chars().skip(digits.len() - 4).collect();
        Ok(format!("{method} •••• {last4}"))
    }
}

fn longest_digit_run(value: &str) -> usize {
    value
        .split(|c: char| !c.is_ascii_digit())
        .map(str::len)
        .max()
        .unwrap_or(0)
}

/// Human-readable order number derived from the creation time. Collisions
/// are possible in theory; the unique index on `order_number` rejects them.
pub fn order_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("ORD-{}{:03}", now.timestamp_millis(), suffix)
}

/// Everything needed to write one order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order: CreateOrderEntity,
    pub items: Vec<NewOrderItem>,
    pub totals: Totals,
}

/// `now` plus `days` calendar days. Negative or overflowing offsets are refused.
fn estimated_delivery(now: DateTime<Utc>, days: i64) -> Result<NaiveDate, CheckoutError> {
    u64::try_from(days)
        .ok()
        .and_then(|days| now.date_naive().checked_add_days(Days::new(days)))
        .ok_or(CheckoutError::DeliveryDateOutOfRange)
}

pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub shipping: ShippingDetails,
    pub payment: PaymentDetails,
    pub lines: Vec<CartLine>,
    pub discount: i64,
}

pub fn prepare_order(
    request: CheckoutRequest,
    config: &CheckoutConfig,
    now: DateTime<Utc>,
) -> Result<PlacedOrder, CheckoutError> {
    let cart = Cart::from_lines(request.lines)?;
    let items = cart.items()?;
    let totals = Totals::compute(&items, config.shipping_fee, request.discount)?;
    let shipping = request.shipping.trimmed()?;
    let payment_method = request.payment.masked_label()?;

    let order = CreateOrderEntity {
        order_number: order_number(now),
        user_id: request.user_id,
        status: OrderStatus::Pending,
        subtotal: totals.subtotal,
        shipping_fee: totals.shipping_fee,
        discount: totals.discount,
        total_amount: totals.total,
        shipping_name: shipping.name,
        shipping_phone: shipping.phone,
        shipping_address: shipping.address,
        shipping_city: shipping.city,
        shipping_postal_code: shipping.postal_code,
        payment_method,
        estimated_delivery: Some(estimated_delivery(now, config.estimated_delivery_days)?),
    };

    Ok(PlacedOrder {
        order,
        items,
        totals,
    })
}
