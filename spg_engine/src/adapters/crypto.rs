use log::debug;

use crate::{
    adapters::{InitiateContext, InitiateResponse, RailAdapter},
    db_types::{Order, PaymentMethod, PaymentStatus},
    traits::PaymentGatewayError,
};

/// Adapter for the direct crypto transfer rail.
///
/// Nothing is created on an external gateway. Initiation hands back the receiving wallet so the storefront's
/// wallet-connect widget can build the transfer; confirmation arrives later as an on-chain transaction hash.
#[derive(Debug, Clone, Default)]
pub struct CryptoTransferAdapter;

impl CryptoTransferAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl RailAdapter for CryptoTransferAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::CryptoTransfer
    }

    async fn initiate(&self, ctx: &InitiateContext) -> Result<InitiateResponse, PaymentGatewayError> {
        let account = ctx
            .receiving_account
            .as_ref()
            .filter(|a| a.enabled)
            .ok_or_else(|| PaymentGatewayError::NoReceivingAccount(PaymentMethod::CryptoTransfer.to_string()))?;
        debug!("⛓️ Issuing transfer instructions for {} into {}", ctx.order.order_id, account.wallet_address);
        Ok(InitiateResponse::WalletInstructions {
            wallet_address: account.wallet_address.clone(),
            amount: ctx.order.total,
            currency: ctx.order.currency.clone(),
        })
    }

    async fn check_status(&self, order: &Order) -> Result<PaymentStatus, PaymentGatewayError> {
        // Confirmation is push-based (the hash report endpoint), so the stored status is authoritative.
        Ok(order.payment.status)
    }
}
