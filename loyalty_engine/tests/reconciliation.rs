//! Reconciliation cycle and scheduler behaviour, driven by a scripted oracle.
mod common;

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use common::{luhn_number, prepare_test_env, random_db_path};
use lp_common::Points;
use loyalty_engine::{
    db_types::{NewOrder, OrderNumber, OrderStatus},
    run_cycle,
    AccrualApiError,
    AccrualClient,
    AccrualOutcome,
    CycleError,
    LedgerStore,
    ReconcileScheduler,
    SqliteLedger,
};
use tokio::{sync::watch, time::timeout};

/// An oracle that replays a canned script per order, recording when each call arrived. The last entry of a script
/// repeats forever.
#[derive(Clone, Default)]
struct ScriptedOracle {
    scripts: Arc<Mutex<HashMap<i64, VecDeque<Result<AccrualOutcome, AccrualApiError>>>>>,
    calls: Arc<Mutex<Vec<(i64, Instant)>>>,
}

impl ScriptedOracle {
    fn script(&self, number: OrderNumber, responses: Vec<Result<AccrualOutcome, AccrualApiError>>) {
        self.scripts.lock().unwrap().insert(number.value(), responses.into());
    }

    fn calls_for(&self, number: OrderNumber) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().filter(|(n, _)| *n == number.value()).map(|(_, at)| *at).collect()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl AccrualClient for ScriptedOracle {
    async fn order_status(&self, number: OrderNumber) -> Result<AccrualOutcome, AccrualApiError> {
        self.calls.lock().unwrap().push((number.value(), Instant::now()));
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(&number.value()).expect("no script for order");
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().expect("script exhausted")
        }
    }
}

async fn setup_order(amounts: &[i64]) -> (SqliteLedger, i64, Vec<OrderNumber>) {
    let db = prepare_test_env(&random_db_path()).await;
    let account = db.create_account().await.unwrap();
    let mut numbers = Vec::with_capacity(amounts.len());
    for payload in amounts {
        let number = OrderNumber::from(luhn_number(*payload));
        db.submit_order(NewOrder::new(number, account.id)).await.unwrap();
        numbers.push(number);
    }
    (db, account.id, numbers)
}

fn resolved(status: OrderStatus, accrual: Option<Points>) -> Result<AccrualOutcome, AccrualApiError> {
    Ok(AccrualOutcome::Resolved { status, accrual })
}

#[tokio::test]
async fn processed_resolution_credits_the_account_exactly_once() {
    let db = prepare_test_env(&random_db_path()).await;
    let account = db.create_account().await.unwrap();
    let number = OrderNumber::from(1234567812345670);
    db.submit_order(NewOrder::new(number, account.id)).await.unwrap();

    let oracle = ScriptedOracle::default();
    oracle.script(number, vec![resolved(OrderStatus::Processed, Some(Points::from_points(500)))]);
    let (_tx, mut shutdown) = watch::channel(false);

    let report = run_cycle(&db, &oracle, &mut shutdown).await.unwrap();
    assert_eq!(report.credited, 1);
    assert_eq!(db.fetch_account(account.id).await.unwrap().balance, Points::from_points(500));
    let order = db.orders_for_account(account.id).await.unwrap().remove(0);
    assert_eq!(order.status, OrderStatus::Processed);

    // the order is terminal now, so a second cycle has nothing to do
    let report = run_cycle(&db, &oracle, &mut shutdown).await.unwrap();
    assert_eq!(report.visited, 0);
    assert_eq!(db.fetch_account(account.id).await.unwrap().balance, Points::from_points(500));
}

#[tokio::test]
async fn invalid_resolution_marks_the_order_without_credit() {
    let (db, account_id, numbers) = setup_order(&[310]).await;
    let oracle = ScriptedOracle::default();
    oracle.script(numbers[0], vec![resolved(OrderStatus::Invalid, None)]);
    let (_tx, mut shutdown) = watch::channel(false);

    let report = run_cycle(&db, &oracle, &mut shutdown).await.unwrap();
    assert_eq!(report.invalidated, 1);
    let order = db.orders_for_account(account_id).await.unwrap().remove(0);
    assert_eq!(order.status, OrderStatus::Invalid);
    assert_eq!(db.fetch_account(account_id).await.unwrap().balance, Points::from_cents(0));
}

#[tokio::test]
async fn pending_oracle_statuses_leave_the_order_unresolved() {
    let (db, _, numbers) = setup_order(&[320]).await;
    let oracle = ScriptedOracle::default();
    oracle.script(numbers[0], vec![resolved(OrderStatus::Processing, None)]);
    let (_tx, mut shutdown) = watch::channel(false);

    run_cycle(&db, &oracle, &mut shutdown).await.unwrap();
    let unresolved = db.unresolved_orders().await.unwrap();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].number, numbers[0]);
}

#[tokio::test]
async fn unknown_orders_are_deferred_to_the_next_cycle() {
    let (db, _, numbers) = setup_order(&[330]).await;
    let oracle = ScriptedOracle::default();
    oracle.script(numbers[0], vec![Ok(AccrualOutcome::Unknown)]);
    let (_tx, mut shutdown) = watch::channel(false);

    let report = run_cycle(&db, &oracle, &mut shutdown).await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(db.unresolved_orders().await.unwrap().len(), 1);

    // it reappears on the next pass, untouched
    let report = run_cycle(&db, &oracle, &mut shutdown).await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(db.unresolved_orders().await.unwrap()[0].status, OrderStatus::Registered);
}

#[tokio::test]
async fn rate_limiting_pauses_the_cycle_then_retries_the_same_order() {
    let (db, _, numbers) = setup_order(&[340]).await;
    let pause = Duration::from_millis(300);
    let oracle = ScriptedOracle::default();
    oracle.script(
        numbers[0],
        vec![Ok(AccrualOutcome::RateLimited { retry_after: pause }), resolved(OrderStatus::Processing, None)],
    );
    let (_tx, mut shutdown) = watch::channel(false);

    run_cycle(&db, &oracle, &mut shutdown).await.unwrap();

    let calls = oracle.calls_for(numbers[0]);
    assert_eq!(calls.len(), 2, "the rate-limited order is retried within the cycle");
    assert!(calls[1] - calls[0] >= pause, "the cycle must honour the Retry-After hint");
    // a rate limit is a scheduling directive, not a verdict on the order
    assert_eq!(db.unresolved_orders().await.unwrap()[0].status, OrderStatus::Registered);
}

#[tokio::test]
async fn transient_oracle_failures_abort_the_cycle() {
    let (db, _, numbers) = setup_order(&[350]).await;
    let oracle = ScriptedOracle::default();
    oracle.script(numbers[0], vec![Err(AccrualApiError::UpstreamError(500))]);
    let (_tx, mut shutdown) = watch::channel(false);

    let err = run_cycle(&db, &oracle, &mut shutdown).await.unwrap_err();
    assert!(matches!(err, CycleError::Accrual(AccrualApiError::UpstreamError(500))));
    // nothing was applied; the next tick starts from scratch
    assert_eq!(db.unresolved_orders().await.unwrap()[0].status, OrderStatus::Registered);
}

#[tokio::test]
async fn non_positive_accruals_are_rejected_and_never_applied() {
    let (db, account_id, numbers) = setup_order(&[360, 361]).await;
    let oracle = ScriptedOracle::default();
    oracle.script(numbers[0], vec![resolved(OrderStatus::Processed, None)]);
    oracle.script(numbers[1], vec![resolved(OrderStatus::Processed, Some(Points::from_cents(0)))]);
    let (_tx, mut shutdown) = watch::channel(false);

    let report = run_cycle(&db, &oracle, &mut shutdown).await.unwrap();
    assert_eq!(report.rejected, 2);
    assert_eq!(report.credited, 0);
    assert_eq!(db.fetch_account(account_id).await.unwrap().balance, Points::from_cents(0));
    assert_eq!(db.unresolved_orders().await.unwrap().len(), 2);
}

#[tokio::test]
async fn scheduler_reconciles_end_to_end() {
    let (db, account_id, numbers) = setup_order(&[370]).await;
    let oracle = ScriptedOracle::default();
    oracle.script(numbers[0], vec![resolved(OrderStatus::Processed, Some(Points::from_points(500)))]);

    let scheduler = ReconcileScheduler::new(db.clone(), oracle, Duration::from_millis(50));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(db.fetch_account(account_id).await.unwrap().balance, Points::from_points(500));
}

#[tokio::test]
async fn a_recovered_cycle_clears_the_reported_error() {
    let (db, account_id, numbers) = setup_order(&[375]).await;
    let oracle = ScriptedOracle::default();
    // first cycle fails on a flaky oracle, the next one succeeds
    oracle.script(
        numbers[0],
        vec![
            Err(AccrualApiError::UpstreamError(500)),
            resolved(OrderStatus::Processed, Some(Points::from_points(50))),
        ],
    );

    let scheduler = ReconcileScheduler::new(db.clone(), oracle, Duration::from_millis(50));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown_tx.send(true).unwrap();
    // the failure was recovered from, so the supervisor hears nothing about it
    handle.await.unwrap().unwrap();
    assert_eq!(db.fetch_account(account_id).await.unwrap().balance, Points::from_points(50));
}

#[tokio::test]
async fn burst_triggers_coalesce_into_a_single_cycle() {
    let (db, _, numbers) = setup_order(&[380]).await;
    let oracle = ScriptedOracle::default();
    oracle.script(numbers[0], vec![resolved(OrderStatus::Processing, None)]);

    // a poll interval far beyond the test horizon, so only the manual triggers matter
    let scheduler = ReconcileScheduler::new(db, oracle.clone(), Duration::from_secs(600));
    let trigger = scheduler.trigger();
    for _ in 0..5 {
        trigger.fire();
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));
    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(oracle.total_calls(), 1, "five rapid triggers collapse into one cycle");
}

#[tokio::test]
async fn shutdown_interrupts_a_rate_limit_pause_promptly() {
    let (db, _, numbers) = setup_order(&[390]).await;
    let oracle = ScriptedOracle::default();
    oracle.script(numbers[0], vec![Ok(AccrualOutcome::RateLimited { retry_after: Duration::from_secs(600) })]);

    let scheduler = ReconcileScheduler::new(db, oracle, Duration::from_millis(50));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(true).unwrap();
    let result = timeout(Duration::from_secs(2), handle).await.expect("scheduler must not wait out the pause");
    result.unwrap().unwrap();
}
