//! Protocol adapter for the external accrual oracle.
//!
//! The oracle is the sole authority on whether an order is valid and how many points it yields. This module translates
//! its HTTP responses into the closed [`AccrualOutcome`] type that the reconciler matches on exhaustively.

mod client;

pub use client::{AccrualApiError, AccrualClient, AccrualOutcome, HttpAccrualClient, OrderInfo};
