use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use spg_engine::{
    adapters::{CryptoTransferAdapter, HostedCheckoutAdapter, HttpPaymentSdkClient, SdkCheckoutAdapter},
    AffiliateApi,
    CallbackReconciler,
    CheckoutApi,
    GatewayAccountApi,
    HttpAffiliateRegistrar,
    InventoryApi,
    SqliteDatabase,
    StatusPoller,
};
use tokio::sync::watch;

use crate::{
    auth::AdminAuth,
    config::ServerConfig,
    errors::ServerError,
    hold_expiry_worker::start_hold_expiry_worker,
    routes::{
        health,
        AvailabilityRoute,
        BindAffiliateRoute,
        CheckoutStatusRoute,
        CryptoConfirmRoute,
        InitiateCheckoutRoute,
        ListAccountsRoute,
        ListAffiliatesRoute,
        NewOrderRoute,
        PaymentReturnRoute,
        PaymentWebhookRoute,
        PlaceHoldRoute,
        RefundOrderRoute,
        RegisterAccountRoute,
        ReleaseHoldRoute,
        SdkPayRoute,
        SearchOrdersRoute,
        SetDefaultAccountRoute,
        SetFulfilmentRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = StatusPoller::new(Arc::new(build_checkout_api(&config, db.clone())), config.poll_interval, shutdown_rx);
    let poller_handle = tokio::spawn(poller.run());
    let _expiry_handle = start_hold_expiry_worker(db.clone());
    let srv = create_server_instance(config, db)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    if shutdown_tx.send(true).is_err() {
        debug!("💻️ Status poller already stopped");
    }
    if let Err(e) = poller_handle.await {
        warn!("💻️ Status poller did not shut down cleanly. {e}");
    }
    result
}

fn build_checkout_api(config: &ServerConfig, db: SqliteDatabase) -> CheckoutApi<SqliteDatabase, HttpPaymentSdkClient> {
    let hosted = HostedCheckoutAdapter::new(config.gateway.base_url.clone(), config.gateway.api_key.clone());
    let sdk_client = HttpPaymentSdkClient::new(config.sdk.base_url.clone(), config.sdk.client_id.clone());
    CheckoutApi::new(db, hosted, SdkCheckoutAdapter::new(sdk_client), CryptoTransferAdapter::new())
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let checkout_api = build_checkout_api(&config, db.clone());
        let reconciler = CallbackReconciler::new(db.clone());
        let inventory_api = InventoryApi::new(db.clone());
        let accounts_api = GatewayAccountApi::new(db.clone());
        let affiliates_api = match &config.affiliate_registrar_url {
            Some(url) => AffiliateApi::new(
                db.clone(),
                HttpAffiliateRegistrar::new(url.clone(), config.gateway.api_key.clone()),
            ),
            None => AffiliateApi::without_registrar(db.clone()),
        };
        let admin_auth = AdminAuth::new(config.admin_api_key.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(reconciler))
            .app_data(web::Data::new(inventory_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(affiliates_api))
            .app_data(web::Data::new(admin_auth));
        // Admin routes. Each handler demands the admin key header via the `AdminKey` extractor.
        let admin_scope = web::scope("/admin")
            .service(RegisterAccountRoute::<SqliteDatabase>::new())
            .service(SetDefaultAccountRoute::<SqliteDatabase>::new())
            .service(ListAccountsRoute::<SqliteDatabase>::new())
            .service(BindAffiliateRoute::<SqliteDatabase, HttpAffiliateRegistrar>::new())
            .service(ListAffiliatesRoute::<SqliteDatabase, HttpAffiliateRegistrar>::new())
            .service(SearchOrdersRoute::<SqliteDatabase, HttpPaymentSdkClient>::new())
            .service(RefundOrderRoute::<SqliteDatabase, HttpPaymentSdkClient>::new())
            .service(SetFulfilmentRoute::<SqliteDatabase, HttpPaymentSdkClient>::new());
        app.service(health)
            .service(PaymentWebhookRoute::<SqliteDatabase>::new())
            .service(PaymentReturnRoute::<SqliteDatabase>::new())
            .service(NewOrderRoute::<SqliteDatabase, HttpPaymentSdkClient>::new())
            .service(InitiateCheckoutRoute::<SqliteDatabase, HttpPaymentSdkClient>::new())
            .service(CheckoutStatusRoute::<SqliteDatabase, HttpPaymentSdkClient>::new())
            .service(SdkPayRoute::<SqliteDatabase, HttpPaymentSdkClient>::new())
            .service(CryptoConfirmRoute::<SqliteDatabase, HttpPaymentSdkClient>::new())
            .service(PlaceHoldRoute::<SqliteDatabase>::new())
            .service(ReleaseHoldRoute::<SqliteDatabase>::new())
            .service(AvailabilityRoute::<SqliteDatabase>::new())
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
