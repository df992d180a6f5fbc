use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use spg_common::Secret;

use crate::{auth::AdminAuth, auth::ADMIN_KEY_HEADER, config::ServerConfig};

// The shared secret every test app accepts on the admin routes. DO NOT re-use this key anywhere.
pub const TEST_ADMIN_KEY: &str = "test-admin-key-000";

pub fn test_config() -> ServerConfig {
    ServerConfig::new("127.0.0.1", 0)
}

async fn send_request(
    req: TestRequest,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let app = App::new()
        .app_data(web::Data::new(test_config()))
        .app_data(web::Data::new(AdminAuth::new(Secret::new(TEST_ADMIN_KEY.to_string()))))
        .configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

pub async fn get_request(
    admin_key: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send_request(with_key(TestRequest::get().uri(path), admin_key), configure).await
}

pub async fn post_request(
    admin_key: &str,
    path: &str,
    body: serde_json::Value,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send_request(with_key(TestRequest::post().uri(path).set_json(body), admin_key), configure).await
}

pub async fn delete_request(
    admin_key: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    send_request(with_key(TestRequest::delete().uri(path), admin_key), configure).await
}

fn with_key(req: TestRequest, admin_key: &str) -> TestRequest {
    if admin_key.is_empty() {
        req
    } else {
        req.insert_header((ADMIN_KEY_HEADER, admin_key))
    }
}
