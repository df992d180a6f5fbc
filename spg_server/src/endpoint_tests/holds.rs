use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use spg_engine::{
    db_types::{NewHold, ProductHold},
    traits::InventoryError,
    InventoryApi,
};

use super::helpers::{delete_request, get_request, post_request};
use crate::{
    endpoint_tests::mocks::MockInventory,
    routes::{AvailabilityRoute, PlaceHoldRoute, ReleaseHoldRoute},
};

#[actix_web::test]
async fn placing_a_hold_returns_the_stored_hold() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "product_id": "giftcard-gold",
        "denomination": 0.25,
        "quantity": 2,
        "cart_key": "cart-1"
    });
    let (status, body) = post_request("", "/cart/hold", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    let hold = serde_json::from_str::<ProductHold>(&body).expect("Unparseable hold");
    assert_eq!(hold.product_id, "giftcard-gold");
    assert_eq!(hold.quantity, 2);
    assert!(hold.expires_at > Utc::now(), "the hold must carry a future expiry");
}

#[actix_web::test]
async fn overdrawing_the_pool_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "product_id": "giftcard-gold",
        "denomination": 0.25,
        "quantity": 10,
        "cart_key": "cart-1"
    });
    let (status, body) = post_request("", "/cart/hold", body, configure_exhausted).await.expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("requested 10, available 1"), "unexpected body: {body}");
}

#[actix_web::test]
async fn a_non_positive_quantity_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "product_id": "giftcard-gold",
        "denomination": 0.25,
        "quantity": 0,
        "cart_key": "cart-1"
    });
    let (status, _) = post_request("", "/cart/hold", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn availability_is_reported_per_denomination() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("", "/cart/availability?product_id=giftcard-gold&denomination=0.25", configure)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"available\":7"), "unexpected body: {body}");
}

#[actix_web::test]
async fn releasing_a_missing_hold_is_still_a_success() {
    let _ = env_logger::try_init().ok();
    let (status, body) = delete_request("", "/cart/hold/99", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("already gone"), "unexpected body: {body}");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut inventory = MockInventory::new();
    inventory.expect_create_hold().returning(|hold| Ok(stored_hold(hold)));
    inventory.expect_available_quantity().returning(|_, _| Ok(7));
    inventory.expect_release_hold().returning(|_| Ok(false));
    register(cfg, inventory);
}

fn configure_exhausted(cfg: &mut ServiceConfig) {
    let mut inventory = MockInventory::new();
    inventory.expect_create_hold().returning(|hold| {
        Err(InventoryError::InsufficientStock {
            product_id: hold.product_id,
            denomination: hold.denomination,
            requested: hold.quantity,
            available: 1,
        })
    });
    register(cfg, inventory);
}

fn register(cfg: &mut ServiceConfig, inventory: MockInventory) {
    let api = InventoryApi::new(inventory);
    cfg.service(PlaceHoldRoute::<MockInventory>::new())
        .service(ReleaseHoldRoute::<MockInventory>::new())
        .service(AvailabilityRoute::<MockInventory>::new())
        .app_data(web::Data::new(api));
}

// Echo the request back as the row the backend would have stored.
fn stored_hold(hold: NewHold) -> ProductHold {
    ProductHold {
        id: 1,
        product_id: hold.product_id,
        denomination: hold.denomination,
        quantity: hold.quantity,
        cart_key: hold.cart_key,
        expires_at: hold.expires_at,
        created_at: Utc::now(),
    }
}
