//! Payment rail adapters.
//!
//! One adapter per rail, all exposing the same contract: `initiate` turns an order into a rail-specific payload
//! (a hosted redirect, an SDK config, or wallet instructions), and `check_status` is a pure read of the rail's
//! view of the attempt. Missing prerequisites (no receiving wallet, SDK unavailable, wrong method for the rail)
//! are typed initiation errors, never silent successes.

mod crypto;
mod hosted;
mod sdk;

pub use crypto::CryptoTransferAdapter;
pub use hosted::HostedCheckoutAdapter;
pub use sdk::{HttpPaymentSdkClient, PaymentSdkClient, ScriptedSdkClient, SdkCheckoutAdapter, SdkPaymentResult, SdkStatus};

use serde::{Deserialize, Serialize};
use spg_common::MinorUnits;

use crate::{
    db_types::{AffiliateAccount, GatewayAccount, Order, PaymentMethod, PaymentStatus},
    traits::PaymentGatewayError,
};

/// Everything an adapter needs to open an external payment session. Assembled by [`crate::CheckoutApi`] after
/// the initiation latch has been acquired.
#[derive(Debug, Clone)]
pub struct InitiateContext {
    pub order: Order,
    /// The receiving account selected for the rail's gateway brand (the enabled default). `None` only for rails
    /// that do not receive into a registered wallet.
    pub receiving_account: Option<GatewayAccount>,
    /// The affiliate split bound to the receiving account, when one is enabled.
    pub affiliate: Option<AffiliateAccount>,
    pub urls: CheckoutUrls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutUrls {
    pub return_url: String,
    pub cancel_url: String,
    /// Only meaningful for server-notified rails.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// The rail-specific payload returned by a successful initiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitiateResponse {
    /// Hosted checkout: redirect the browser here.
    Redirect { checkout_url: String, session_id: Option<String> },
    /// SDK rail: configuration for the embedded SDK session.
    SdkConfig { sdk_session: String, amount: MinorUnits, currency: String, reference_id: String },
    /// Crypto rail: surface these to the wallet-connect widget. Nothing is created server-side.
    WalletInstructions { wallet_address: String, amount: MinorUnits, currency: String },
}

/// The common adapter contract. `initiate` must be called at most once per order in the common path; the caller
/// guards with the initiation latch. `check_status` never mutates.
#[allow(async_fn_in_trait)]
pub trait RailAdapter {
    fn method(&self) -> PaymentMethod;

    async fn initiate(&self, ctx: &InitiateContext) -> Result<InitiateResponse, PaymentGatewayError>;

    async fn check_status(&self, order: &Order) -> Result<PaymentStatus, PaymentGatewayError>;
}
