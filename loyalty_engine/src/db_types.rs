use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use lp_common::Points;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::helpers::luhn_checksum_is_valid;

//--------------------------------------    OrderNumber    -----------------------------------------------------------
/// An externally assigned order identifier.
///
/// Order numbers are 64-bit integers that must pass the Luhn checksum before the ledger accepts them. At the JSON
/// boundary they are rendered as strings, since the full range of an `i64` does not survive a round trip through a
/// JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type)]
#[sqlx(transparent)]
pub struct OrderNumber(pub i64);

impl OrderNumber {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Checks the number against the Luhn checksum.
    pub fn is_valid(&self) -> bool {
        luhn_checksum_is_valid(self.0)
    }
}

impl From<i64> for OrderNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for OrderNumber {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for OrderNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for OrderNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

//--------------------------------------    OrderStatus    -----------------------------------------------------------
/// The lifecycle status of an order.
///
/// Orders only ever move forward: `{Registered, Processing} → {Invalid, Processed}`. The two terminal statuses are
/// immutable and excluded from reconciliation. The string form is shared between the database, the accrual oracle
/// protocol and the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Submitted and awaiting its first successful poll of the oracle.
    Registered,
    /// The oracle has acknowledged the order but has not finished with it.
    Processing,
    /// Terminal. The oracle rejected the order; no points are credited.
    Invalid,
    /// Terminal. The order has been credited exactly once.
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Registered => write!(f, "REGISTERED"),
            OrderStatus::Processing => write!(f, "PROCESSING"),
            OrderStatus::Invalid => write!(f, "INVALID"),
            OrderStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for OrderStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTERED" => Ok(Self::Registered),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------      Account      -----------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub balance: Points,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Order       -----------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub number: OrderNumber,
    pub account_id: i64,
    pub status: OrderStatus,
    /// Present only once the order reaches `Processed`.
    pub accrual: Option<Points>,
    pub uploaded_at: DateTime<Utc>,
}

//--------------------------------------      NewOrder     -----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: OrderNumber,
    pub account_id: i64,
}

impl NewOrder {
    pub fn new(number: OrderNumber, account_id: i64) -> Self {
        Self { number, account_id }
    }
}

//--------------------------------------     Withdrawal    -----------------------------------------------------------
/// A debit against an account's balance. Immutable once created.
#[derive(Debug, Clone, FromRow)]
pub struct Withdrawal {
    pub id: i64,
    /// Client-supplied reference, unique across all withdrawals. It has the shape of an order number but does not
    /// refer to any order row; it exists to make a retried withdrawal request idempotent.
    pub order_ref: OrderNumber,
    pub account_id: i64,
    pub amount: Points,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub order_ref: OrderNumber,
    pub account_id: i64,
    pub amount: Points,
}

impl NewWithdrawal {
    pub fn new(order_ref: OrderNumber, account_id: i64, amount: Points) -> Self {
        Self { order_ref, account_id, amount }
    }
}
