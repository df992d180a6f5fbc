use serde::{Deserialize, Serialize};
use spg_engine::db_types::{Denomination, FulfilmentStatus, OrderId, PaymentMethod, PaymentStatus};

/// The acknowledgement body for callback and settlement endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    #[serde(rename = "orderId", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    pub message: String,
}

impl JsonResponse {
    pub fn success(order_id: OrderId, status: PaymentStatus) -> Self {
        Self { success: true, order_id: Some(order_id), status: Some(status), message: "ok".to_string() }
    }

    pub fn message<S: std::fmt::Display>(message: S) -> Self {
        Self { success: true, order_id: None, status: None, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateParams {
    pub order_id: OrderId,
    /// Must match the rail the order was placed on when given. The stored order is authoritative.
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkPayParams {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfirmParams {
    pub order_id: OrderId,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldRequest {
    pub product_id: String,
    pub denomination: Denomination,
    pub quantity: i64,
    pub cart_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub product_id: String,
    pub denomination: Denomination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundParams {
    #[serde(default)]
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfilmentParams {
    pub status: FulfilmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandQuery {
    #[serde(default)]
    pub brand: Option<String>,
}
