use log::{info, warn};
use serde_json::json;
use spg_common::{MinorUnits, Secret};

use crate::{
    db_types::{AffiliateAccount, NewAffiliateAccount},
    traits::{AccountError, AccountManagement},
};

/// Notifies an external affiliate program when a payout wallet is bound. The engine works without one
/// (see [`AffiliateApi::without_registrar`]); registration failures are logged and never block the bind.
#[allow(async_fn_in_trait)]
pub trait AffiliateRegistrar {
    async fn register(&self, affiliate: &AffiliateAccount) -> Result<(), String>;
}

/// Registers payout wallets with the gateway's affiliate program over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAffiliateRegistrar {
    base_url: String,
    api_key: Secret<String>,
    client: reqwest::Client,
}

impl HttpAffiliateRegistrar {
    pub fn new(base_url: String, api_key: Secret<String>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { base_url, api_key, client: reqwest::Client::new() }
    }
}

impl AffiliateRegistrar for HttpAffiliateRegistrar {
    async fn register(&self, affiliate: &AffiliateAccount) -> Result<(), String> {
        let url = format!("{}/affiliates", self.base_url);
        let body = json!({
            "payout_wallet": affiliate.payout_wallet,
            "commission_rate": affiliate.commission_rate,
            "merchant_rate": affiliate.merchant_rate,
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.reveal())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Affiliate registration request failed: {e}"))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("Affiliate registration was rejected with {}", response.status()))
        }
    }
}

/// The `AffiliateApi` binds affiliate payout splits to gateway accounts and records settled commissions.
///
/// A gateway account carries at most one affiliate binding. Commission accrual happens in the reconciler
/// when a payment through the bound account reaches `completed`; this API only manages the bindings and the
/// running totals.
pub struct AffiliateApi<B, R = HttpAffiliateRegistrar> {
    db: B,
    registrar: Option<R>,
}

impl<B, R> std::fmt::Debug for AffiliateApi<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AffiliateApi")
    }
}

impl<B> AffiliateApi<B, HttpAffiliateRegistrar>
where B: AccountManagement
{
    pub fn without_registrar(db: B) -> Self {
        Self { db, registrar: None }
    }
}

impl<B, R> AffiliateApi<B, R>
where
    B: AccountManagement,
    R: AffiliateRegistrar,
{
    pub fn new(db: B, registrar: R) -> Self {
        Self { db, registrar: Some(registrar) }
    }

    /// Bind an affiliate split to a gateway account. Both rates must lie in `[0, 1]` and may not sum past 1.
    /// An account can carry at most one binding.
    pub async fn bind_affiliate(&self, affiliate: NewAffiliateAccount) -> Result<AffiliateAccount, AccountError> {
        for rate in [affiliate.commission_rate, affiliate.merchant_rate] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(AccountError::RateOutOfRange(rate));
            }
        }
        if affiliate.commission_rate + affiliate.merchant_rate > 1.0 {
            return Err(AccountError::RateOutOfRange(affiliate.commission_rate + affiliate.merchant_rate));
        }
        let affiliate = self.db.bind_affiliate(affiliate).await?;
        info!(
            "🤝️ Bound affiliate #{} ({}) to gateway account #{} at a commission rate of {}",
            affiliate.id, affiliate.payout_wallet, affiliate.gateway_account_id, affiliate.commission_rate
        );
        if let Some(registrar) = &self.registrar {
            if let Err(e) = registrar.register(&affiliate).await {
                warn!("🤝️ Affiliate #{} was bound locally but upstream registration failed. {e}", affiliate.id);
            }
        }
        Ok(affiliate)
    }

    pub async fn fetch_affiliate_for_account(
        &self,
        gateway_account_id: i64,
    ) -> Result<Option<AffiliateAccount>, AccountError> {
        self.db.fetch_affiliate_for_account(gateway_account_id).await
    }

    pub async fn fetch_affiliates(&self) -> Result<Vec<AffiliateAccount>, AccountError> {
        self.db.fetch_affiliates().await
    }

    /// Accrue a settled commission against an affiliate: bumps the transaction count and the running
    /// commission total.
    pub async fn record_transaction(
        &self,
        affiliate_id: i64,
        commission: MinorUnits,
    ) -> Result<AffiliateAccount, AccountError> {
        let affiliate = self.db.record_affiliate_transaction(affiliate_id, commission).await?;
        info!(
            "🤝️ Affiliate #{} earned {commission}. Lifetime: {} transactions, {} commission.",
            affiliate.id, affiliate.total_transactions, affiliate.total_commission
        );
        Ok(affiliate)
    }
}
