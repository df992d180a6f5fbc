use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use spg_engine::{
    db_types::GatewayAccount,
    AffiliateApi,
    GatewayAccountApi,
    HttpAffiliateRegistrar,
};

use super::helpers::{get_request, post_request, TEST_ADMIN_KEY};
use crate::{
    endpoint_tests::mocks::MockAccountManager,
    routes::{BindAffiliateRoute, ListAccountsRoute, RegisterAccountRoute},
};

#[actix_web::test]
async fn admin_routes_demand_the_admin_key() {
    let _ = env_logger::try_init().ok();
    let body = account_request();
    let (status, _) = post_request("", "/accounts", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn a_wrong_admin_key_is_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("definitely-wrong", "/accounts", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("admin API key"), "unexpected body: {body}");
}

#[actix_web::test]
async fn registering_an_account() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request(TEST_ADMIN_KEY, "/accounts", account_request(), configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    let account = serde_json::from_str::<GatewayAccount>(&body).expect("Unparseable account");
    assert_eq!(account.brand, "paygate");
    assert!(account.is_default);
}

#[actix_web::test]
async fn listing_accounts() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(TEST_ADMIN_KEY, "/accounts?brand=paygate", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let accounts = serde_json::from_str::<Vec<GatewayAccount>>(&body).expect("Unparseable accounts");
    assert_eq!(accounts.len(), 1);
}

#[actix_web::test]
async fn binding_an_affiliate_with_a_bad_rate_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "gateway_account_id": 1,
        "payout_wallet": "0xAFF1",
        "commission_rate": 1.2,
        "merchant_rate": 0.0
    });
    let (status, body) = post_request(TEST_ADMIN_KEY, "/affiliates", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("must lie in [0, 1]"), "unexpected body: {body}");
}

#[actix_web::test]
async fn binding_an_affiliate_whose_rates_sum_past_one_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "gateway_account_id": 1,
        "payout_wallet": "0xAFF1",
        "commission_rate": 0.6,
        "merchant_rate": 0.6
    });
    let (status, _) = post_request(TEST_ADMIN_KEY, "/affiliates", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn configure(cfg: &mut ServiceConfig) {
    let mut accounts = MockAccountManager::new();
    accounts.expect_register_account().returning(|account| {
        Ok(GatewayAccount {
            id: 1,
            brand: account.brand,
            label: account.label,
            wallet_address: account.wallet_address.to_lowercase(),
            enabled: true,
            is_default: true,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        })
    });
    accounts.expect_fetch_accounts().returning(|_| {
        Ok(vec![GatewayAccount {
            id: 1,
            brand: "paygate".to_string(),
            label: "main".to_string(),
            wallet_address: "0xabc123".to_string(),
            enabled: true,
            is_default: true,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        }])
    });
    let accounts_api = GatewayAccountApi::new(accounts);

    // Rate validation happens before the backend is touched, so no expectations are needed here.
    let affiliates_api: AffiliateApi<MockAccountManager, HttpAffiliateRegistrar> =
        AffiliateApi::without_registrar(MockAccountManager::new());

    cfg.service(RegisterAccountRoute::<MockAccountManager>::new())
        .service(ListAccountsRoute::<MockAccountManager>::new())
        .service(BindAffiliateRoute::<MockAccountManager, HttpAffiliateRegistrar>::new())
        .app_data(web::Data::new(accounts_api))
        .app_data(web::Data::new(affiliates_api));
}

fn account_request() -> serde_json::Value {
    serde_json::json!({
        "brand": "paygate",
        "label": "main",
        "wallet_address": "0xABC123",
        "set_default": true
    })
}
