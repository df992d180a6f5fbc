use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use spg_common::MinorUnits;
use tokio::sync::OnceCell;

use crate::{
    adapters::{InitiateContext, InitiateResponse, RailAdapter},
    db_types::{Order, PaymentMethod, PaymentStatus},
    traits::PaymentGatewayError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SdkStatus {
    Ok,
    Failed,
}

/// The definitive result of an SDK payment attempt. Unlike the hosted rail, the SDK resolves synchronously,
/// so there is no pending window to poll through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkPaymentResult {
    pub status: SdkStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The vendor SDK seam. The real client loads the SDK session exactly once and reuses it for every payment;
/// tests script results through [`ScriptedSdkClient`] instead.
#[allow(async_fn_in_trait)]
pub trait PaymentSdkClient: Clone {
    /// Establish the SDK session if it is not already live. Idempotent; concurrent callers share one load.
    async fn ensure_loaded(&self) -> Result<(), PaymentGatewayError>;

    async fn pay(
        &self,
        amount: MinorUnits,
        currency: &str,
        reference_id: &str,
    ) -> Result<SdkPaymentResult, PaymentGatewayError>;
}

/// Talks to the vendor SDK bridge over HTTP. The session token is memoized, so repeated checkouts do not
/// re-initialise the SDK.
#[derive(Debug, Clone)]
pub struct HttpPaymentSdkClient {
    base_url: String,
    client_id: String,
    client: reqwest::Client,
    session: Arc<OnceCell<String>>,
}

#[derive(Debug, Deserialize)]
struct SdkSessionResponse {
    #[serde(alias = "sessionToken", alias = "session_token")]
    session_token: String,
}

impl HttpPaymentSdkClient {
    pub fn new(base_url: String, client_id: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { base_url, client_id, client: reqwest::Client::new(), session: Arc::new(OnceCell::new()) }
    }

    async fn session_token(&self) -> Result<&str, PaymentGatewayError> {
        let token = self
            .session
            .get_or_try_init(|| async {
                info!("📱️ Initialising the payment SDK session");
                let url = format!("{}/sdk/session", self.base_url);
                let response = self
                    .client
                    .post(&url)
                    .json(&json!({ "client_id": self.client_id }))
                    .send()
                    .await
                    .map_err(|e| PaymentGatewayError::SdkUnavailable(format!("SDK session request failed: {e}")))?;
                if !response.status().is_success() {
                    return Err(PaymentGatewayError::SdkUnavailable(format!(
                        "SDK session request was rejected with {}",
                        response.status()
                    )));
                }
                let session = response
                    .json::<SdkSessionResponse>()
                    .await
                    .map_err(|e| PaymentGatewayError::SdkUnavailable(format!("Unparseable SDK session: {e}")))?;
                Ok::<String, PaymentGatewayError>(session.session_token)
            })
            .await?;
        Ok(token.as_str())
    }
}

impl PaymentSdkClient for HttpPaymentSdkClient {
    async fn ensure_loaded(&self) -> Result<(), PaymentGatewayError> {
        self.session_token().await.map(|_| ())
    }

    async fn pay(
        &self,
        amount: MinorUnits,
        currency: &str,
        reference_id: &str,
    ) -> Result<SdkPaymentResult, PaymentGatewayError> {
        let token = self.session_token().await?;
        let url = format!("{}/sdk/pay", self.base_url);
        let body = json!({
            "session_token": token,
            "amount": amount.value(),
            "currency": currency,
            "reference_id": reference_id,
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentGatewayError::SdkUnavailable(format!("SDK payment request failed: {e}")))?;
        response
            .json::<SdkPaymentResult>()
            .await
            .map_err(|e| PaymentGatewayError::SdkUnavailable(format!("Unparseable SDK payment result: {e}")))
    }
}

/// A scripted SDK client for tests. Results are handed back in the order they were queued; running off the
/// end of the script is an [`PaymentGatewayError::SdkUnavailable`] error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSdkClient {
    results: Arc<Mutex<VecDeque<SdkPaymentResult>>>,
}

impl ScriptedSdkClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, result: SdkPaymentResult) {
        if let Ok(mut results) = self.results.lock() {
            results.push_back(result);
        }
    }
}

impl PaymentSdkClient for ScriptedSdkClient {
    async fn ensure_loaded(&self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }

    async fn pay(
        &self,
        _amount: MinorUnits,
        _currency: &str,
        _reference_id: &str,
    ) -> Result<SdkPaymentResult, PaymentGatewayError> {
        self.results
            .lock()
            .ok()
            .and_then(|mut results| results.pop_front())
            .ok_or_else(|| PaymentGatewayError::SdkUnavailable("No scripted SDK result remaining".to_string()))
    }
}

/// Adapter for the embedded SDK rail.
#[derive(Debug, Clone)]
pub struct SdkCheckoutAdapter<C: PaymentSdkClient> {
    client: C,
}

impl<C: PaymentSdkClient> SdkCheckoutAdapter<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: PaymentSdkClient> RailAdapter for SdkCheckoutAdapter<C> {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::CashApp
    }

    async fn initiate(&self, ctx: &InitiateContext) -> Result<InitiateResponse, PaymentGatewayError> {
        self.client.ensure_loaded().await?;
        debug!("📱️ SDK session ready for {}", ctx.order.order_id);
        Ok(InitiateResponse::SdkConfig {
            sdk_session: "ready".to_string(),
            amount: ctx.order.total,
            currency: ctx.order.currency.clone(),
            reference_id: ctx.order.order_id.as_str().to_string(),
        })
    }

    async fn check_status(&self, order: &Order) -> Result<PaymentStatus, PaymentGatewayError> {
        // The SDK resolves synchronously, so the recorded status is already definitive.
        Ok(order.payment.status)
    }
}
