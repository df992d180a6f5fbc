use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use spg_common::Secret;

use crate::{
    adapters::{InitiateContext, InitiateResponse, RailAdapter},
    callback_event::map_external_status,
    db_types::{Order, PaymentMethod, PaymentStatus},
    redirect_extract::extract_redirect_url,
    traits::PaymentGatewayError,
};

/// Adapter for the hosted external checkout rail.
///
/// Session creation posts the order to the gateway and expects a JSON body carrying the checkout URL. Gateways
/// in the wild also answer with an HTML interstitial instead of JSON; in that degraded mode the redirect URL is
/// recovered from the markup via [`extract_redirect_url`] rather than failing the initiation outright.
#[derive(Debug, Clone)]
pub struct HostedCheckoutAdapter {
    base_url: String,
    api_key: Secret<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(alias = "checkoutUrl", alias = "checkout_url", alias = "url")]
    checkout_url: Option<String>,
    #[serde(alias = "sessionId", alias = "session_id")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionStatusResponse {
    status: Option<String>,
    #[serde(alias = "eventType", alias = "event_type")]
    event_type: Option<String>,
}

impl HostedCheckoutAdapter {
    pub fn new(base_url: String, api_key: Secret<String>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { base_url, api_key, client: reqwest::Client::new() }
    }

    fn session_body(ctx: &InitiateContext) -> serde_json::Value {
        let order = &ctx.order;
        let mut body = json!({
            "order_id": order.order_id,
            "amount": order.total.value(),
            "currency": order.currency,
            "return_url": ctx.urls.return_url,
            "cancel_url": ctx.urls.cancel_url,
        });
        if let Some(url) = &ctx.urls.webhook_url {
            body["webhook_url"] = json!(url);
        }
        if let Some(account) = &ctx.receiving_account {
            body["receiving_wallet"] = json!(account.wallet_address);
        }
        if let Some(affiliate) = ctx.affiliate.as_ref().filter(|a| a.enabled) {
            body["affiliate"] = json!({
                "payout_wallet": affiliate.payout_wallet,
                "commission_rate": affiliate.commission_rate,
                "merchant_rate": affiliate.merchant_rate,
            });
        }
        body
    }

    /// The gateway session id recorded at initiation time, if any.
    fn session_id(order: &Order) -> Option<String> {
        let payload = order.payment.gateway_payload.as_deref()?;
        let value = serde_json::from_str::<serde_json::Value>(payload).ok()?;
        value.get("session_id").and_then(|v| v.as_str()).map(String::from)
    }
}

impl RailAdapter for HostedCheckoutAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::HostedCheckout
    }

    async fn initiate(&self, ctx: &InitiateContext) -> Result<InitiateResponse, PaymentGatewayError> {
        let url = format!("{}/paygate/session", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.reveal())
            .json(&Self::session_body(ctx))
            .send()
            .await
            .map_err(|e| PaymentGatewayError::GatewayError(format!("Session request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(PaymentGatewayError::GatewayError(format!(
                "Gateway rejected the session request for {} with {}",
                ctx.order.order_id,
                response.status()
            )));
        }
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentGatewayError::GatewayError(format!("Could not read session response: {e}")))?;
        if let Ok(session) = serde_json::from_str::<SessionResponse>(&body) {
            if let Some(checkout_url) = session.checkout_url {
                debug!("🛒️ Gateway returned a checkout URL for {}", ctx.order.order_id);
                return Ok(InitiateResponse::Redirect { checkout_url, session_id: session.session_id });
            }
        }
        // Degraded mode. The gateway answered with markup instead of the documented JSON shape.
        match extract_redirect_url(&body, &final_url) {
            Some(checkout_url) => {
                warn!(
                    "🛒️ Gateway answered with HTML for {}. Recovered the checkout URL from the markup.",
                    ctx.order.order_id
                );
                Ok(InitiateResponse::Redirect { checkout_url, session_id: None })
            },
            None => Err(PaymentGatewayError::GatewayError(format!(
                "Gateway response for {} carried neither a checkout URL nor a recognisable redirect",
                ctx.order.order_id
            ))),
        }
    }

    async fn check_status(&self, order: &Order) -> Result<PaymentStatus, PaymentGatewayError> {
        let Some(session_id) = Self::session_id(order) else {
            // No session was ever recorded, so the gateway has nothing to report.
            return Ok(order.payment.status);
        };
        let url = format!("{}/paygate/session/{session_id}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.reveal())
            .send()
            .await
            .map_err(|e| PaymentGatewayError::GatewayError(format!("Status request failed: {e}")))?;
        let status = response
            .json::<SessionStatusResponse>()
            .await
            .map_err(|e| PaymentGatewayError::GatewayError(format!("Could not parse status response: {e}")))?;
        Ok(map_external_status(status.status.as_deref(), status.event_type.as_deref()))
    }
}
