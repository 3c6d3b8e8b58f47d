//! `SqliteLedger` is the concrete SQLite implementation of the [`LedgerStore`] contract.
//!
//! The low-level query functions live in [`super::db`]; this module composes them into atomic transactions. SQLite's
//! single-writer discipline plus the guarded UPDATEs in the account queries are what serialize concurrent mutations
//! against the same account.
use std::fmt::Debug;

use log::*;
use lp_common::Points;
use sqlx::SqlitePool;

use super::db::{accounts, db_url, new_pool, orders, withdrawals};
use crate::{
    db_types::{Account, NewOrder, NewWithdrawal, Order, OrderNumber, OrderStatus, Withdrawal},
    traits::{LedgerError, LedgerStore},
};

#[derive(Clone)]
pub struct SqliteLedger {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteLedger ({:?})", self.pool)
    }
}

impl SqliteLedger {
    /// Creates a new ledger using the database URL from the environment, or the default.
    pub async fn new(max_connections: u32) -> Result<Self, LedgerError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl LedgerStore for SqliteLedger {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_account(&self) -> Result<Account, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::insert_account(&mut conn).await?;
        debug!("🗃️ Account #{} created", account.id);
        Ok(account)
    }

    async fn fetch_account(&self, account_id: i64) -> Result<Account, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_account(account_id, &mut conn).await?.ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn submit_order(&self, order: NewOrder) -> Result<(Order, bool), LedgerError> {
        // the insert goes first so the transaction starts on the write lock instead of upgrading from a read
        let mut tx = self.pool.begin().await?;
        let result = match orders::insert_order(order.clone(), &mut tx).await? {
            Some(inserted) => (inserted, true),
            None => {
                let existing = orders::fetch_order_by_number(order.number, &mut tx)
                    .await?
                    .ok_or_else(|| LedgerError::DatabaseError(format!("Order {} vanished mid-submit", order.number)))?;
                if existing.account_id != order.account_id {
                    return Err(LedgerError::OrderOwnedByOtherAccount(order.number));
                }
                debug!("🗃️ Order [{}] was already submitted by account #{}", order.number, order.account_id);
                (existing, false)
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn orders_for_account(&self, account_id: i64) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::orders_for_account(account_id, &mut conn).await?;
        Ok(orders)
    }

    async fn unresolved_orders(&self) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::unresolved_orders(&mut conn).await?;
        Ok(orders)
    }

    async fn mark_invalid(&self, number: OrderNumber) -> Result<(), LedgerError> {
        // guarded UPDATE first, so the transaction never upgrades a read lock to a write lock
        let mut tx = self.pool.begin().await?;
        if !orders::invalidate_order(number, &mut tx).await? {
            let order =
                orders::fetch_order_by_number(number, &mut tx).await?.ok_or(LedgerError::OrderNotFound(number))?;
            return Err(LedgerError::TerminalOrder { number, status: order.status });
        }
        tx.commit().await?;
        debug!("🗃️ Order [{number}] marked as INVALID");
        Ok(())
    }

    /// The order status write and the balance credit share one transaction, so a crash between the two is never
    /// observable. The terminal-status guard makes a retried credit a no-op rather than a double deposit.
    async fn credit_order(&self, number: OrderNumber, account_id: i64, amount: Points) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!("cannot credit {amount} to order {number}")));
        }
        // guarded UPDATE first, so the transaction never upgrades a read lock to a write lock
        let mut tx = self.pool.begin().await?;
        if !orders::set_order_processed(number, amount, &mut tx).await? {
            let order =
                orders::fetch_order_by_number(number, &mut tx).await?.ok_or(LedgerError::OrderNotFound(number))?;
            return match order.status {
                OrderStatus::Processed => {
                    debug!("🗃️ Order [{number}] has already been credited. No action to take");
                    Ok(())
                },
                status => Err(LedgerError::TerminalOrder { number, status }),
            };
        }
        accounts::credit_balance(account_id, amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{number}] processed. {amount} credited to account #{account_id}");
        Ok(())
    }

    async fn withdraw(&self, withdrawal: NewWithdrawal) -> Result<Withdrawal, LedgerError> {
        let NewWithdrawal { order_ref, account_id, amount } = withdrawal.clone();
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!("cannot withdraw {amount} from account #{account_id}")));
        }
        let mut tx = self.pool.begin().await?;
        if !accounts::debit_balance_if_sufficient(account_id, amount, &mut tx).await? {
            // the guard fails for a missing account too; disambiguate before reporting
            return match accounts::fetch_account(account_id, &mut tx).await? {
                Some(_) => Err(LedgerError::InsufficientBalance),
                None => Err(LedgerError::AccountNotFound(account_id)),
            };
        }
        let record = withdrawals::insert_withdrawal(withdrawal, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Withdrawal [{order_ref}] of {amount} debited from account #{account_id}");
        Ok(record)
    }

    async fn withdrawals_for_account(&self, account_id: i64) -> Result<Vec<Withdrawal>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let withdrawals = withdrawals::withdrawals_for_account(account_id, &mut conn).await?;
        Ok(withdrawals)
    }

    async fn total_withdrawn(&self, account_id: i64) -> Result<Points, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let total = withdrawals::total_withdrawn(account_id, &mut conn).await?;
        Ok(total)
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}
