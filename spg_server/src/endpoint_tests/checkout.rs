//! Checkout rail tests against a real in-memory store with a scripted SDK client.

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use spg_common::{MinorUnits, Secret};
use spg_engine::{
    adapters::{
        CryptoTransferAdapter,
        HostedCheckoutAdapter,
        ScriptedSdkClient,
        SdkCheckoutAdapter,
        SdkPaymentResult,
        SdkStatus,
    },
    db_types::{NewOrder, Order, OrderId, PaymentMethod, PaymentStatus},
    CheckoutApi,
    SqliteDatabase,
};

use crate::{
    data_objects::JsonResponse,
    endpoint_tests::helpers::test_config,
    routes::{CheckoutStatusRoute, CryptoConfirmRoute, InitiateCheckoutRoute, NewOrderRoute, SdkPayRoute},
};

fn checkout_api(db: SqliteDatabase, sdk: ScriptedSdkClient) -> CheckoutApi<SqliteDatabase, ScriptedSdkClient> {
    // The hosted adapter is never exercised here. A throwaway endpoint keeps it honest if it is.
    let hosted = HostedCheckoutAdapter::new("http://localhost:1".to_string(), Secret::new("test".to_string()));
    CheckoutApi::new(db, hosted, SdkCheckoutAdapter::new(sdk), CryptoTransferAdapter::new())
}

macro_rules! checkout_app {
    ($db:expr, $sdk:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(checkout_api($db.clone(), $sdk.clone())))
                .service(NewOrderRoute::<SqliteDatabase, ScriptedSdkClient>::new())
                .service(InitiateCheckoutRoute::<SqliteDatabase, ScriptedSdkClient>::new())
                .service(CheckoutStatusRoute::<SqliteDatabase, ScriptedSdkClient>::new())
                .service(SdkPayRoute::<SqliteDatabase, ScriptedSdkClient>::new())
                .service(CryptoConfirmRoute::<SqliteDatabase, ScriptedSdkClient>::new()),
        )
        .await
    };
}

fn order_request(order_id: &str, method: PaymentMethod) -> serde_json::Value {
    serde_json::to_value(NewOrder::new(
        OrderId::from(order_id),
        "cust-1".to_string(),
        method,
        MinorUnits::from(2500),
    ))
    .expect("Unserializable order")
}

#[actix_web::test]
async fn submitting_an_order_twice_is_idempotent() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let app = checkout_app!(db, ScriptedSdkClient::new());

    let req = TestRequest::post().uri("/orders").set_json(order_request("ORD-1", PaymentMethod::CashApp)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let req = TestRequest::post().uri("/orders").set_json(order_request("ORD-1", PaymentMethod::CashApp)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let order: Order = test::read_body_json(res).await;
    assert_eq!(order.order_id.as_str(), "ORD-1");
}

#[actix_web::test]
async fn a_fresh_order_reports_a_pending_payment() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let app = checkout_app!(db, ScriptedSdkClient::new());

    let req = TestRequest::post().uri("/orders").set_json(order_request("ORD-1", PaymentMethod::CashApp)).to_request();
    test::call_service(&app, req).await;

    let req = TestRequest::get().uri("/checkout/status/ORD-1").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: JsonResponse = test::read_body_json(res).await;
    assert_eq!(ack.status, Some(PaymentStatus::Pending));
}

#[actix_web::test]
async fn the_status_of_an_unknown_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let app = checkout_app!(db, ScriptedSdkClient::new());

    let req = TestRequest::get().uri("/checkout/status/ORD-404").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn an_sdk_payment_settles_in_one_round_trip() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let sdk = ScriptedSdkClient::new();
    sdk.queue(SdkPaymentResult { status: SdkStatus::Ok, transaction_id: Some("sdk-tx-1".to_string()), error: None });
    let app = checkout_app!(db, sdk);

    let req = TestRequest::post().uri("/orders").set_json(order_request("ORD-1", PaymentMethod::CashApp)).to_request();
    test::call_service(&app, req).await;

    let req =
        TestRequest::post().uri("/checkout/sdk/pay").set_json(serde_json::json!({"order_id": "ORD-1"})).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: JsonResponse = test::read_body_json(res).await;
    assert_eq!(ack.status, Some(PaymentStatus::Completed));
}

#[actix_web::test]
async fn a_failed_sdk_payment_is_recorded_as_failed() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let sdk = ScriptedSdkClient::new();
    sdk.queue(SdkPaymentResult {
        status: SdkStatus::Failed,
        transaction_id: None,
        error: Some("declined".to_string()),
    });
    let app = checkout_app!(db, sdk);

    let req = TestRequest::post().uri("/orders").set_json(order_request("ORD-1", PaymentMethod::CashApp)).to_request();
    test::call_service(&app, req).await;

    let req =
        TestRequest::post().uri("/checkout/sdk/pay").set_json(serde_json::json!({"order_id": "ORD-1"})).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: JsonResponse = test::read_body_json(res).await;
    assert_eq!(ack.status, Some(PaymentStatus::Failed));
}

#[actix_web::test]
async fn the_sdk_rail_rejects_orders_from_other_rails() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let app = checkout_app!(db, ScriptedSdkClient::new());

    let req =
        TestRequest::post().uri("/orders").set_json(order_request("ORD-1", PaymentMethod::HostedCheckout)).to_request();
    test::call_service(&app, req).await;

    let req =
        TestRequest::post().uri("/checkout/sdk/pay").set_json(serde_json::json!({"order_id": "ORD-1"})).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn initiation_with_the_wrong_rail_is_rejected() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let app = checkout_app!(db, ScriptedSdkClient::new());

    let req = TestRequest::post().uri("/orders").set_json(order_request("ORD-1", PaymentMethod::CashApp)).to_request();
    test::call_service(&app, req).await;

    let body = serde_json::json!({"order_id": "ORD-1", "method": "hosted_checkout"});
    let req = TestRequest::post().uri("/checkout/initiate").set_json(body).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn an_onchain_confirmation_settles_and_duplicates_are_absorbed() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_in_memory().await.expect("Error creating database");
    let app = checkout_app!(db, ScriptedSdkClient::new());

    let req =
        TestRequest::post().uri("/orders").set_json(order_request("ORD-1", PaymentMethod::CryptoTransfer)).to_request();
    test::call_service(&app, req).await;

    let confirm = serde_json::json!({"order_id": "ORD-1", "tx_hash": "0xFEED"});
    let req = TestRequest::post().uri("/checkout/crypto/confirm").set_json(confirm.clone()).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: JsonResponse = test::read_body_json(res).await;
    assert_eq!(ack.status, Some(PaymentStatus::Completed));

    // The widget re-reports the same hash. Nothing changes.
    let req = TestRequest::post().uri("/checkout/crypto/confirm").set_json(confirm).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: JsonResponse = test::read_body_json(res).await;
    assert_eq!(ack.status, Some(PaymentStatus::Completed));
}
