//! Presentation types for the ledger API.
//!
//! Order numbers are rendered as strings (an `i64` does not survive a round trip through a JSON number) and
//! timestamps as RFC3339. These shapes are a serialization-boundary concern; the internal records in
//! [`crate::db_types`] know nothing about them.
use chrono::{DateTime, Utc};
use lp_common::Points;
use serde::Serialize;

use crate::db_types::{Order, OrderNumber, OrderStatus, Withdrawal};

#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    pub number: OrderNumber,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderResult {
    fn from(order: Order) -> Self {
        Self {
            number: order.number,
            status: order.status,
            accrual: order.accrual,
            uploaded_at: order.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRecord {
    pub order: OrderNumber,
    pub sum: Points,
    pub processed_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalRecord {
    fn from(withdrawal: Withdrawal) -> Self {
        Self { order: withdrawal.order_ref, sum: withdrawal.amount, processed_at: withdrawal.processed_at }
    }
}

/// The account's current balance alongside everything it has ever withdrawn.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSummary {
    pub current: Points,
    pub withdrawn: Points,
}
