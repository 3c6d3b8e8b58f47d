use log::debug;
use lp_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderNumber},
    traits::LedgerError,
};

/// Inserts a new order with `Registered` status. Returns `None` when the order number already exists; the caller
/// fetches the existing row to decide whether that is a benign resubmission.
///
/// Not atomic on its own; embed the call in a transaction and pass `&mut *tx` as the connection argument when
/// atomicity is required. The insert is the first statement of the transaction, so the write lock is taken up front.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, LedgerError> {
    let result: Result<Order, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO orders (number, account_id) VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(order.number)
    .bind(order.account_id)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => {
            debug!("📝️ Order [{}] inserted", order.number);
            Ok(Some(order))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_number(
    number: OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE number = $1").bind(number).fetch_optional(conn).await?;
    Ok(order)
}

/// All orders submitted by the account, oldest first.
pub async fn orders_for_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE account_id = $1 ORDER BY uploaded_at ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// All orders that have not reached a terminal status yet.
pub async fn unresolved_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE status IN ('REGISTERED', 'PROCESSING')")
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Sets the `Invalid` status, guarded so a `Processed` order is never touched. Returns `false` when the guard did not
/// pass, i.e. the order is missing or already credited; the caller fetches the row to tell the two apart.
///
/// The status write is a guarded UPDATE issued as the first statement of the caller's transaction, so the write lock
/// is taken up front rather than upgraded from a read.
pub async fn invalidate_order(number: OrderNumber, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET status = 'INVALID' WHERE number = $1 AND status != 'PROCESSED'")
        .bind(number)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Writes the terminal `Processed` status together with the accrual amount, guarded against terminal orders. Returns
/// `false` when the guard did not pass. The balance update is the caller's responsibility and must live in the same
/// transaction, with this guarded UPDATE as its first statement so the write lock is taken up front.
pub async fn set_order_processed(
    number: OrderNumber,
    accrual: Points,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET status = 'PROCESSED', accrual = $1
            WHERE number = $2 AND status IN ('REGISTERED', 'PROCESSING')
        "#,
    )
    .bind(accrual)
    .bind(number)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
