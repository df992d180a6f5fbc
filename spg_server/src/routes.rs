//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database queries, calls to
//! the upstream gateway) must therefore be expressed as futures or asynchronous functions.

use actix_web::{get, http::header::LOCATION, web, HttpRequest, HttpResponse, Responder};
use log::*;
use spg_engine::{
    adapters::{CheckoutUrls, PaymentSdkClient},
    db_types::{NewAffiliateAccount, NewGatewayAccount, NewHold, NewOrder, OrderId, PaymentStatus},
    traits::{AccountManagement, InventoryManagement, OrderQueryFilter, PaymentGatewayDatabase, PaymentGatewayError},
    AffiliateApi, AffiliateRegistrar, CallbackEvent, CallbackPayload, CallbackReconciler, CheckoutApi,
    GatewayAccountApi, InventoryApi, ReconcileError,
};

use crate::{
    auth::AdminKey,
    config::ServerConfig,
    data_objects::{
        AvailabilityQuery, BrandQuery, CryptoConfirmParams, FulfilmentParams, HoldRequest, InitiateParams,
        JsonResponse, RefundParams, SdkPayParams,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Callbacks  ----------------------------------------------------
route!(payment_webhook => Post "/callback/payment" impl PaymentGatewayDatabase);
/// Server-to-server webhook ingress for the hosted checkout gateway.
///
/// Payloads arrive in both the gateway's documented snake_case shape and the camelCase shape its older API
/// emits; both are normalised before reconciliation. A callback that cannot be matched to an order answers
/// 404 with an `{error, message}` body.
pub async fn payment_webhook<B: PaymentGatewayDatabase>(
    req: HttpRequest,
    body: web::Json<CallbackPayload>,
    reconciler: web::Data<CallbackReconciler<B>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let peer = get_remote_ip(&req, config.use_x_forwarded_for, config.use_forwarded);
    trace!("💻️ Received payment webhook from {peer:?}");
    let event = CallbackEvent::try_from(body.into_inner())
        .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let outcome = reconciler.ingest(event).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(outcome.order_id, outcome.status)))
}

route!(payment_return => Get "/callback/payment" impl PaymentGatewayDatabase);
/// Browser return ingress: the shopper lands here when the gateway redirects back to us. The callback is
/// reconciled exactly like a webhook, then the browser is forwarded to the storefront's result page with the
/// outcome in the query string.
pub async fn payment_return<B: PaymentGatewayDatabase>(
    query: web::Query<CallbackPayload>,
    reconciler: web::Data<CallbackReconciler<B>>,
    config: web::Data<ServerConfig>,
) -> HttpResponse {
    trace!("💻️ Received browser payment return");
    let base = config.storefront_result_url.as_str();
    let event = match CallbackEvent::try_from(query.into_inner()) {
        Ok(event) => event,
        Err(e) => {
            debug!("💻️ Browser return was unusable. {e}");
            return redirect_to(&format!("{base}?error=missing_parameters"));
        },
    };
    match reconciler.ingest(event).await {
        Ok(outcome) => {
            let result = match outcome.status {
                PaymentStatus::Completed => "success",
                PaymentStatus::Failed => "failed",
                _ => "pending",
            };
            redirect_to(&format!("{base}?payment={result}&order_id={}", outcome.order_id.as_str()))
        },
        Err(ReconcileError::OrderNotFound) => redirect_to(&format!("{base}?error=order_not_found")),
        Err(e) => {
            warn!("💻️ Browser return reconciliation failed. {e}");
            redirect_to(&format!("{base}?error=callback_failed"))
        },
    }
}

fn redirect_to(url: &str) -> HttpResponse {
    HttpResponse::Found().insert_header((LOCATION, url)).finish()
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(new_order => Post "/orders" impl PaymentGatewayDatabase, PaymentSdkClient);
/// Store a new order. Idempotent: a repeated order id answers 200 with the stored order instead of 201.
pub async fn new_order<B: PaymentGatewayDatabase, C: PaymentSdkClient>(
    body: web::Json<NewOrder>,
    api: web::Data<CheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let (order, created) = api.insert_order(body.into_inner()).await?;
    let response = if created { HttpResponse::Created().json(order) } else { HttpResponse::Ok().json(order) };
    Ok(response)
}

//----------------------------------------------  Checkout  ----------------------------------------------------
route!(initiate_checkout => Post "/checkout/initiate" impl PaymentGatewayDatabase, PaymentSdkClient);
/// Open a payment session for an order on its configured rail. The first request per (order, rail) reaches
/// the gateway; any retry answers 409.
pub async fn initiate_checkout<B: PaymentGatewayDatabase, C: PaymentSdkClient>(
    body: web::Json<InitiateParams>,
    api: web::Data<CheckoutApi<B, C>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST checkout initiation for {}", params.order_id);
    if let Some(method) = params.method {
        let order = api.fetch_order(&params.order_id).await?;
        if method != order.payment.method {
            return Err(PaymentGatewayError::MethodMismatch(order.payment.method, method).into());
        }
    }
    let base = config.storefront_result_url.clone();
    let urls = CheckoutUrls {
        return_url: params.return_url.unwrap_or_else(|| base.clone()),
        cancel_url: params.cancel_url.unwrap_or(base),
        webhook_url: params.webhook_url,
    };
    let response = api.initiate(&params.order_id, urls).await?;
    Ok(HttpResponse::Ok().json(response))
}

route!(checkout_status => Get "/checkout/status/{order_id}" impl PaymentGatewayDatabase, PaymentSdkClient);
/// The polling endpoint for the storefront. Safe to call repeatedly; never mutates.
pub async fn checkout_status<B: PaymentGatewayDatabase, C: PaymentSdkClient>(
    path: web::Path<String>,
    api: web::Data<CheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let status = api.check_status(&order_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(order_id, status)))
}

route!(sdk_pay => Post "/checkout/sdk/pay" impl PaymentGatewayDatabase, PaymentSdkClient);
/// Run an SDK payment to its definitive result. Unlike the hosted rail there is no pending window: the
/// response already carries `completed` or `failed`.
pub async fn sdk_pay<B: PaymentGatewayDatabase, C: PaymentSdkClient>(
    body: web::Json<SdkPayParams>,
    api: web::Data<CheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST SDK payment for {}", params.order_id);
    let write = api.pay_with_sdk(&params.order_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(params.order_id, write.status())))
}

route!(crypto_confirm => Post "/checkout/crypto/confirm" impl PaymentGatewayDatabase, PaymentSdkClient);
/// The wallet widget reports the on-chain transaction hash here. Re-reports of the same hash are
/// acknowledged without changing anything.
pub async fn crypto_confirm<B: PaymentGatewayDatabase, C: PaymentSdkClient>(
    body: web::Json<CryptoConfirmParams>,
    api: web::Data<CheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST on-chain confirmation for {}", params.order_id);
    api.report_onchain_hash(&params.order_id, &params.tx_hash).await?;
    let status = api.check_status(&params.order_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(params.order_id, status)))
}

//----------------------------------------------    Cart   ----------------------------------------------------
route!(place_hold => Post "/cart/hold" impl InventoryManagement);
/// Reserve stock for a cart. Over-asking answers 409 with the shortfall spelled out in the error message.
pub async fn place_hold<B: InventoryManagement>(
    body: web::Json<HoldRequest>,
    api: web::Data<InventoryApi<B>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let expires_at = chrono::Utc::now() + chrono::Duration::from_std(config.hold_ttl)
        .map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let hold = api
        .place_hold(NewHold {
            product_id: request.product_id,
            denomination: request.denomination,
            quantity: request.quantity,
            cart_key: request.cart_key,
            expires_at,
        })
        .await?;
    Ok(HttpResponse::Created().json(hold))
}

route!(release_hold => Delete "/cart/hold/{id}" impl InventoryManagement);
pub async fn release_hold<B: InventoryManagement>(
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let hold_id = path.into_inner();
    let released = api.release_hold(hold_id).await?;
    // Releasing a hold that is already gone is still a success.
    Ok(HttpResponse::Ok().json(JsonResponse::message(if released { "released" } else { "already gone" })))
}

route!(availability => Get "/cart/availability" impl InventoryManagement);
pub async fn availability<B: InventoryManagement>(
    query: web::Query<AvailabilityQuery>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    let available = api.available_quantity(&query.product_id, query.denomination).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "product_id": query.product_id,
        "denomination": query.denomination,
        "available": available,
    })))
}

//----------------------------------------------   Admin   ----------------------------------------------------
route!(register_account => Post "/accounts" impl AccountManagement);
pub async fn register_account<B: AccountManagement>(
    _auth: AdminKey,
    body: web::Json<NewGatewayAccount>,
    api: web::Data<GatewayAccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account = api.register_account(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(account))
}

route!(set_default_account => Post "/accounts/{id}/default" impl AccountManagement);
pub async fn set_default_account<B: AccountManagement>(
    _auth: AdminKey,
    path: web::Path<i64>,
    api: web::Data<GatewayAccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account = api.set_default_account(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(account))
}

route!(list_accounts => Get "/accounts" impl AccountManagement);
pub async fn list_accounts<B: AccountManagement>(
    _auth: AdminKey,
    query: web::Query<BrandQuery>,
    api: web::Data<GatewayAccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let accounts = api.fetch_accounts(query.brand.as_deref()).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

route!(bind_affiliate => Post "/affiliates" impl AccountManagement, AffiliateRegistrar);
pub async fn bind_affiliate<B: AccountManagement, R: AffiliateRegistrar>(
    _auth: AdminKey,
    body: web::Json<NewAffiliateAccount>,
    api: web::Data<AffiliateApi<B, R>>,
) -> Result<HttpResponse, ServerError> {
    let affiliate = api.bind_affiliate(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(affiliate))
}

route!(list_affiliates => Get "/affiliates" impl AccountManagement, AffiliateRegistrar);
pub async fn list_affiliates<B: AccountManagement, R: AffiliateRegistrar>(
    _auth: AdminKey,
    api: web::Data<AffiliateApi<B, R>>,
) -> Result<HttpResponse, ServerError> {
    let affiliates = api.fetch_affiliates().await?;
    Ok(HttpResponse::Ok().json(affiliates))
}

route!(search_orders => Get "/orders" impl PaymentGatewayDatabase, PaymentSdkClient);
pub async fn search_orders<B: PaymentGatewayDatabase, C: PaymentSdkClient>(
    _auth: AdminKey,
    query: web::Query<OrderQueryFilter>,
    api: web::Data<CheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.search_orders(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(refund_order => Post "/orders/{order_id}/refund" impl PaymentGatewayDatabase, PaymentSdkClient);
/// Refunds are admin-only. A refund of anything but a completed payment is a no-op; the response says which.
pub async fn refund_order<B: PaymentGatewayDatabase, C: PaymentSdkClient>(
    _auth: AdminKey,
    path: web::Path<String>,
    body: web::Json<RefundParams>,
    api: web::Data<CheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let write = api.refund(&order_id, body.partial).await?;
    let mut response = JsonResponse::success(order_id, write.status());
    if !write.applied {
        response.success = false;
        response.message = "refund requires a completed payment".to_string();
    }
    Ok(HttpResponse::Ok().json(response))
}

route!(set_fulfilment => Post "/orders/{order_id}/fulfilment" impl PaymentGatewayDatabase, PaymentSdkClient);
pub async fn set_fulfilment<B: PaymentGatewayDatabase, C: PaymentSdkClient>(
    _auth: AdminKey,
    path: web::Path<String>,
    body: web::Json<FulfilmentParams>,
    api: web::Data<CheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let order = api.set_fulfilment_status(&order_id, body.status).await?;
    Ok(HttpResponse::Ok().json(order))
}
