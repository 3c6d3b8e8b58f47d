use std::fmt::Debug;

use log::*;
use lp_common::Points;
use thiserror::Error;

use super::order_objects::{BalanceSummary, OrderResult, WithdrawalRecord};
use crate::{
    db_types::{Account, NewOrder, NewWithdrawal, Order, OrderNumber},
    reconciler::CycleTrigger,
    traits::{LedgerError, LedgerStore},
};

/// `LedgerApi` is the primary API for submitting orders and moving points in and out of accounts. It enforces the
/// order-number checksum precondition and delegates every mutation to the [`LedgerStore`] contract, which owns the
/// ledger invariants.
pub struct LedgerApi<B> {
    store: B,
    trigger: Option<CycleTrigger>,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(store: B) -> Self {
        Self { store, trigger: None }
    }

    /// Attaches a reconciler trigger, so that a freshly submitted order is polled without waiting for the next timer
    /// tick.
    pub fn with_trigger(mut self, trigger: CycleTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }
}

impl<B> LedgerApi<B>
where B: LedgerStore
{
    pub async fn register_account(&self) -> Result<Account, LedgerApiError> {
        let account = self.store.create_account().await?;
        Ok(account)
    }

    /// Submits an order number for accrual.
    ///
    /// The number must pass the Luhn checksum. The call is idempotent for the submitting account; the boolean in the
    /// result is `false` when the account has submitted this number before.
    pub async fn submit_order(&self, account_id: i64, number: OrderNumber) -> Result<(Order, bool), LedgerApiError> {
        if !number.is_valid() {
            return Err(LedgerApiError::InvalidOrderNumber(number));
        }
        let (order, inserted) = self.store.submit_order(NewOrder::new(number, account_id)).await?;
        if inserted {
            debug!("🔄️📦️ Order [{number}] accepted for account #{account_id}");
            if let Some(trigger) = &self.trigger {
                trigger.fire();
            }
        }
        Ok((order, inserted))
    }

    pub async fn account_orders(&self, account_id: i64) -> Result<Vec<OrderResult>, LedgerApiError> {
        let orders = self.store.orders_for_account(account_id).await?;
        Ok(orders.into_iter().map(OrderResult::from).collect())
    }

    pub async fn balance(&self, account_id: i64) -> Result<BalanceSummary, LedgerApiError> {
        let account = self.store.fetch_account(account_id).await?;
        let withdrawn = self.store.total_withdrawn(account_id).await?;
        Ok(BalanceSummary { current: account.balance, withdrawn })
    }

    /// Withdraws `amount` points from the account, keyed by the client-supplied `order_ref`.
    ///
    /// The reference must pass the Luhn checksum; it is an idempotency token, not an order. Insufficient balance and
    /// a reused reference are expected, user-facing outcomes and arrive as their own error variants.
    pub async fn withdraw(
        &self,
        account_id: i64,
        order_ref: OrderNumber,
        amount: Points,
    ) -> Result<WithdrawalRecord, LedgerApiError> {
        if !order_ref.is_valid() {
            return Err(LedgerApiError::InvalidOrderNumber(order_ref));
        }
        let record = self.store.withdraw(NewWithdrawal::new(order_ref, account_id, amount)).await?;
        debug!("🔄️💰️ Withdrawal [{order_ref}] of {amount} processed for account #{account_id}");
        Ok(record.into())
    }

    pub async fn withdrawals(&self, account_id: i64) -> Result<Vec<WithdrawalRecord>, LedgerApiError> {
        let withdrawals = self.store.withdrawals_for_account(account_id).await?;
        Ok(withdrawals.into_iter().map(WithdrawalRecord::from).collect())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerApiError {
    #[error("Order number {0} failed checksum validation")]
    InvalidOrderNumber(OrderNumber),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
