//! Callback ingress tests against a real in-memory store, since reconciliation spans the whole backend.

use actix_web::{http::{header, StatusCode}, test, test::TestRequest, web, App};
use spg_common::MinorUnits;
use spg_engine::{
    db_types::{NewOrder, OrderId, PaymentMethod, PaymentStatus},
    traits::PaymentGatewayDatabase,
    CallbackReconciler,
    SqliteDatabase,
};

use super::helpers::test_config;
use crate::{
    data_objects::JsonResponse,
    routes::{PaymentReturnRoute, PaymentWebhookRoute},
};

async fn seeded_db() -> SqliteDatabase {
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let order =
        NewOrder::new(OrderId::from("ORD-1"), "cust-1".to_string(), PaymentMethod::HostedCheckout, MinorUnits::from(5000));
    db.insert_order(order).await.expect("Error seeding order");
    db
}

macro_rules! callback_app {
    ($db:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(CallbackReconciler::new($db.clone())))
                .app_data(web::Data::new(test_config()))
                .service(PaymentWebhookRoute::<SqliteDatabase>::new())
                .service(PaymentReturnRoute::<SqliteDatabase>::new()),
        )
        .await
    };
}

#[actix_web::test]
async fn a_webhook_settles_the_order_and_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db().await;
    let app = callback_app!(db);

    let req = TestRequest::post()
        .uri("/callback/payment")
        .set_json(serde_json::json!({"orderId": "ORD-1", "status": "paid", "transactionId": "tx-1", "amount": 5000}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: JsonResponse = test::read_body_json(res).await;
    assert!(ack.success);
    assert_eq!(ack.status, Some(PaymentStatus::Completed));

    let order = db.fetch_order_by_order_id(&OrderId::from("ORD-1")).await.unwrap().unwrap();
    assert_eq!(order.payment.status, PaymentStatus::Completed);
    assert_eq!(order.payment.transaction_id.as_deref(), Some("tx-1"));
}

#[actix_web::test]
async fn an_unmatchable_webhook_is_a_not_found_error() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db().await;
    let app = callback_app!(db);

    let req = TestRequest::post()
        .uri("/callback/payment")
        .set_json(serde_json::json!({"orderId": "ORD-404", "status": "paid"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["message"].as_str().unwrap_or_default().contains("not found"), "unexpected body: {body}");
}

#[actix_web::test]
async fn a_webhook_without_a_status_is_a_pending_no_op() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db().await;
    let app = callback_app!(db);

    // An absent status maps to the safe default, pending, which matches the fresh order and is absorbed.
    let req = TestRequest::post()
        .uri("/callback/payment")
        .set_json(serde_json::json!({"orderId": "ORD-1"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let order = db.fetch_order_by_order_id(&OrderId::from("ORD-1")).await.unwrap().unwrap();
    assert_eq!(order.payment.status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn a_webhook_without_any_identifier_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db().await;
    let app = callback_app!(db);

    let req = TestRequest::post()
        .uri("/callback/payment")
        .set_json(serde_json::json!({"status": "paid"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn a_browser_return_redirects_to_the_result_page() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db().await;
    let app = callback_app!(db);

    let req = TestRequest::get().uri("/callback/payment?order_id=ORD-1&status=success&transaction_id=tx-2").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    assert!(location.contains("payment=success"), "unexpected redirect: {location}");
    assert!(location.contains("order_id=ORD-1"), "unexpected redirect: {location}");

    // The browser return settles the order just like a webhook would have.
    let order = db.fetch_order_by_order_id(&OrderId::from("ORD-1")).await.unwrap().unwrap();
    assert_eq!(order.payment.status, PaymentStatus::Completed);
}

#[actix_web::test]
async fn a_bare_browser_return_redirects_with_an_error() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db().await;
    let app = callback_app!(db);

    let req = TestRequest::get().uri("/callback/payment").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    assert!(location.contains("error=missing_parameters"), "unexpected redirect: {location}");
}

#[actix_web::test]
async fn a_browser_return_for_an_unknown_order_redirects_with_an_error() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db().await;
    let app = callback_app!(db);

    let req = TestRequest::get().uri("/callback/payment?order_id=ORD-404&status=success").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    assert!(location.contains("error=order_not_found"), "unexpected redirect: {location}");
}
