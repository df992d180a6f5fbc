//! End-to-end reconciliation tests against an in-memory store.

use spg_common::MinorUnits;
use spg_engine::{
    db_types::{FulfilmentStatus, NewOrder, OrderId, PaymentMethod, PaymentStatus},
    traits::{AccountManagement, HashSyncResult, PaymentGatewayDatabase},
    CallbackEvent, CallbackPayload, CallbackReconciler, ReconcileError, SqliteDatabase,
};

async fn setup_db() -> SqliteDatabase {
    let _ = env_logger::try_init().ok();
    SqliteDatabase::new_in_memory().await.expect("Error creating database")
}

async fn seed_order(db: &SqliteDatabase, order_id: &str, method: PaymentMethod, cents: i64) {
    let order = NewOrder::new(OrderId::from(order_id), "cust-1".to_string(), method, MinorUnits::from(cents));
    let (_, created) = db.insert_order(order).await.expect("Error inserting order");
    assert!(created);
}

fn event(json: &str) -> CallbackEvent {
    let payload = serde_json::from_str::<CallbackPayload>(json).expect("Error parsing payload");
    CallbackEvent::try_from(payload).expect("Error normalising payload")
}

#[tokio::test]
async fn webhook_settles_an_order_and_redeliveries_are_noops() {
    let db = setup_db().await;
    seed_order(&db, "ORD-100", PaymentMethod::HostedCheckout, 5000).await;
    let reconciler = CallbackReconciler::new(db.clone());

    let paid = r#"{"orderId": "ORD-100", "status": "paid", "transactionId": "tx-1", "amount": 5000}"#;
    let outcome = reconciler.ingest(event(paid)).await.expect("Error ingesting the webhook");
    assert!(outcome.applied);
    assert_eq!(outcome.status, PaymentStatus::Completed);

    let order = db.fetch_order_by_order_id(&OrderId::from("ORD-100")).await.unwrap().unwrap();
    assert_eq!(order.payment.status, PaymentStatus::Completed);
    assert_eq!(order.payment.transaction_id.as_deref(), Some("tx-1"));
    assert!(order.payment.paid_at.is_some(), "paid_at must be stamped on completion");
    assert_eq!(order.fulfilment, FulfilmentStatus::OrderProcessing);
    let paid_at = order.payment.paid_at;

    // The gateway redelivers the same webhook. Nothing changes, including the settlement stamp.
    let outcome = reconciler.ingest(event(paid)).await.expect("Error ingesting the redelivery");
    assert!(!outcome.applied);
    assert_eq!(outcome.status, PaymentStatus::Completed);
    let order = db.fetch_order_by_order_id(&OrderId::from("ORD-100")).await.unwrap().unwrap();
    assert_eq!(order.payment.paid_at, paid_at);

    // A late "failed" event cannot undo the completion.
    let failed = r#"{"orderId": "ORD-100", "status": "failed"}"#;
    let outcome = reconciler.ingest(event(failed)).await.expect("Error ingesting the failure");
    assert!(!outcome.applied);
    assert_eq!(outcome.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn a_failure_does_not_block_a_later_completion() {
    let db = setup_db().await;
    seed_order(&db, "ORD-200", PaymentMethod::HostedCheckout, 2500).await;
    let reconciler = CallbackReconciler::new(db.clone());

    let outcome = reconciler.ingest(event(r#"{"orderId": "ORD-200", "status": "failed"}"#)).await.unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.status, PaymentStatus::Failed);

    // The shopper retried and the retry succeeded.
    let outcome =
        reconciler.ingest(event(r#"{"orderId": "ORD-200", "status": "success", "transactionId": "tx-9"}"#)).await.unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn orders_are_recovered_from_session_ids() {
    let db = setup_db().await;
    seed_order(&db, "ORD-300", PaymentMethod::HostedCheckout, 1000).await;
    let reconciler = CallbackReconciler::new(db.clone());

    let payload = r#"{"session_id": "session_ORD-300", "status": "completed"}"#;
    let outcome = reconciler.ingest(event(payload)).await.expect("Error ingesting the callback");
    assert_eq!(outcome.order_id, OrderId::from("ORD-300"));
    assert_eq!(outcome.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn unmatchable_callbacks_fail_closed() {
    let db = setup_db().await;
    let reconciler = CallbackReconciler::new(db);

    let payload = r#"{"session_id": "session_<script>alert(1)</script>", "status": "completed"}"#;
    let result = reconciler.ingest(event(payload)).await;
    assert!(matches!(result, Err(ReconcileError::OrderNotFound)));
}

#[tokio::test]
async fn refunds_require_a_completed_payment() {
    let db = setup_db().await;
    seed_order(&db, "ORD-400", PaymentMethod::HostedCheckout, 9900).await;
    let reconciler = CallbackReconciler::new(db.clone());

    let refund = r#"{"orderId": "ORD-400", "status": "refunded"}"#;
    let outcome = reconciler.ingest(event(refund)).await.unwrap();
    assert!(!outcome.applied, "a pending order cannot be refunded");
    assert_eq!(outcome.status, PaymentStatus::Pending);

    reconciler.ingest(event(r#"{"orderId": "ORD-400", "status": "paid"}"#)).await.unwrap();
    let outcome = reconciler.ingest(event(refund)).await.unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn onchain_hash_reports_are_deduplicated() {
    let db = setup_db().await;
    seed_order(&db, "ORD-500", PaymentMethod::CryptoTransfer, 12000).await;
    let order_id = OrderId::from("ORD-500");

    let result = db.record_onchain_hash(&order_id, "0xabc123").await.expect("Error recording the hash");
    let HashSyncResult::Synced(write) = result else {
        panic!("The first hash report must be synced");
    };
    assert!(write.applied);
    assert_eq!(write.status(), PaymentStatus::Completed);
    assert_eq!(write.order.payment.transaction_id.as_deref(), Some("0xabc123"));

    // The wallet widget re-rendered and reported the same hash again.
    let result = db.record_onchain_hash(&order_id, "0xabc123").await.expect("Error recording the repeat");
    assert!(matches!(result, HashSyncResult::Duplicate));
}

#[tokio::test]
async fn initiation_latch_is_acquired_exactly_once() {
    let db = setup_db().await;
    seed_order(&db, "ORD-600", PaymentMethod::HostedCheckout, 700).await;
    let order_id = OrderId::from("ORD-600");

    assert!(db.acquire_initiation_latch(&order_id, PaymentMethod::HostedCheckout).await.unwrap());
    assert!(!db.acquire_initiation_latch(&order_id, PaymentMethod::HostedCheckout).await.unwrap());
}

#[tokio::test]
async fn completed_payments_accrue_affiliate_commission() {
    use spg_engine::db_types::{NewAffiliateAccount, NewGatewayAccount};

    let db = setup_db().await;
    let account = db
        .register_account(NewGatewayAccount {
            brand: "paygate".to_string(),
            label: "Main".to_string(),
            wallet_address: "0xFEED".to_string(),
            set_default: true,
        })
        .await
        .expect("Error registering the account");
    let affiliate = db
        .bind_affiliate(NewAffiliateAccount {
            gateway_account_id: account.id,
            payout_wallet: "0xaff".to_string(),
            commission_rate: 0.10,
            merchant_rate: 0.85,
        })
        .await
        .expect("Error binding the affiliate");

    seed_order(&db, "ORD-700", PaymentMethod::HostedCheckout, 10000).await;
    let order_id = OrderId::from("ORD-700");
    db.set_gateway_session(&order_id, Some(account.id), serde_json::json!({"session_id": "sess-1"}))
        .await
        .expect("Error recording the session");

    let reconciler = CallbackReconciler::new(db.clone());
    let outcome = reconciler.ingest(event(r#"{"orderId": "ORD-700", "status": "paid"}"#)).await.unwrap();
    assert!(outcome.applied);

    let updated = db.fetch_affiliate_for_account(account.id).await.unwrap().unwrap();
    assert_eq!(updated.id, affiliate.id);
    assert_eq!(updated.total_transactions, 1);
    assert_eq!(updated.total_commission, MinorUnits::from(1000));

    // The redelivered webhook must not accrue a second commission.
    reconciler.ingest(event(r#"{"orderId": "ORD-700", "status": "paid"}"#)).await.unwrap();
    let updated = db.fetch_affiliate_for_account(account.id).await.unwrap().unwrap();
    assert_eq!(updated.total_transactions, 1);
}
