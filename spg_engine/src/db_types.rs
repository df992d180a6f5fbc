use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use spg_common::MinorUnits;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
/// The human-readable order number assigned by the storefront, e.g. `ORD-100`. This is the identifier that external
/// gateways echo back in callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Order ids follow the storefront's `<prefix>-<digits>` convention. Callbacks that recover an id from a
    /// session string must validate it with this before trusting it.
    pub fn is_well_formed(&self) -> bool {
        let mut parts = self.0.splitn(2, '-');
        let prefix = parts.next().unwrap_or_default();
        let digits = parts.next().unwrap_or_default();
        !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_alphanumeric())
            && !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
    }
}

//--------------------------------------     Denomination      -------------------------------------------------------
/// A package-size variant of a product (0.125, 1, 3.5, ...), stored as integer thousandths so that it can act as part
/// of a stock key and an SQL column without floating-point equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type)]
#[sqlx(transparent)]
pub struct Denomination(i64);

impl Denomination {
    pub const ONE: Denomination = Denomination(1000);

    pub fn from_thousandths(value: i64) -> Self {
        Self(value)
    }

    pub fn thousandths(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn try_from_f64(value: f64) -> Result<Self, ConversionError> {
        let scaled = value * 1000.0;
        let rounded = scaled.round();
        if !value.is_finite() || value <= 0.0 {
            return Err(ConversionError(format!("{value} is not a valid denomination")));
        }
        if (scaled - rounded).abs() > 1e-6 {
            return Err(ConversionError(format!("Denomination {value} has more than 3 decimal places")));
        }
        Ok(Self(rounded as i64))
    }
}

impl FromStr for Denomination {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<f64>().map_err(|e| ConversionError(format!("Invalid denomination {s}: {e}")))?;
        Self::try_from_f64(value)
    }
}

impl Display for Denomination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.as_f64();
        if v.fract() == 0.0 {
            write!(f, "{}", v as i64)
        } else {
            write!(f, "{v}")
        }
    }
}

impl Serialize for Denomination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Denomination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Denomination::try_from_f64(value).map_err(de::Error::custom)
    }
}

//--------------------------------------    PaymentMethod      -------------------------------------------------------
/// The three payment rails supported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Redirect to the hosted third-party checkout page.
    HostedCheckout,
    /// Card / Cash-App style payment driven by the embedded SDK.
    CashApp,
    /// Direct on-chain transfer to a receiving wallet.
    CryptoTransfer,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::HostedCheckout => write!(f, "hosted_checkout"),
            PaymentMethod::CashApp => write!(f, "cash_app"),
            PaymentMethod::CryptoTransfer => write!(f, "crypto_transfer"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hosted_checkout" => Ok(Self::HostedCheckout),
            "cash_app" => Ok(Self::CashApp),
            "crypto_transfer" => Ok(Self::CryptoTransfer),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------
/// The canonical payment status for an order. Every status write, from any rail or ingress, passes through
/// [`crate::state_machine`], which decides whether a proposed transition is applied or ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    /// Terminal statuses restrict further writes under the no-downgrade rule.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Refunded | Self::PartiallyRefunded)
    }

    pub fn is_refund(&self) -> bool {
        matches!(self, Self::Refunded | Self::PartiallyRefunded)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Processing => write!(f, "processing"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
            PaymentStatus::PartiallyRefunded => write!(f, "partially_refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "partially_refunded" => Ok(Self::PartiallyRefunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------   FulfilmentStatus    -------------------------------------------------------
/// Coarse fulfilment status, separate from the payment status. Orders are never deleted; cancellation is a soft
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FulfilmentStatus {
    PendingPayment,
    OrderProcessing,
    AwaitingCourierPickup,
    Shipped,
    Resend,
    Cancelled,
}

impl Display for FulfilmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfilmentStatus::PendingPayment => write!(f, "pending_payment"),
            FulfilmentStatus::OrderProcessing => write!(f, "order_processing"),
            FulfilmentStatus::AwaitingCourierPickup => write!(f, "awaiting_courier_pickup"),
            FulfilmentStatus::Shipped => write!(f, "shipped"),
            FulfilmentStatus::Resend => write!(f, "resend"),
            FulfilmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

//--------------------------------------       Payment         -------------------------------------------------------
/// The payment record embedded in an order row. The order owns this value exclusively; no other entity holds a
/// competing copy.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    #[sqlx(rename = "payment_method")]
    pub method: PaymentMethod,
    #[sqlx(rename = "payment_status")]
    pub status: PaymentStatus,
    /// External transaction reference. Optional until settlement.
    pub transaction_id: Option<String>,
    /// Set exactly once, on the transition into `completed`.
    pub paid_at: Option<DateTime<Utc>>,
    /// Adapter-specific payload (hosted checkout URL, session id, ...) as a JSON string.
    pub gateway_payload: Option<String>,
}

impl Payment {
    pub fn new(method: PaymentMethod) -> Self {
        Self { method, status: PaymentStatus::Pending, transaction_id: None, paid_at: None, gateway_payload: None }
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub currency: String,
    pub subtotal: MinorUnits,
    pub discount: MinorUnits,
    pub tax: MinorUnits,
    pub shipping: MinorUnits,
    pub total: MinorUnits,
    #[sqlx(rename = "fulfilment_status")]
    pub fulfilment: FulfilmentStatus,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub contact_email: Option<String>,
    /// The most recent on-chain transaction hash applied to this order. Used to deduplicate wallet-widget
    /// completion reports on the crypto rail.
    pub last_synced_hash: Option<String>,
    /// The receiving gateway account selected at initiation. Links a completed payment back to the affiliate
    /// split bound to that account.
    pub gateway_account_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: Payment,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: String,
    pub currency: String,
    pub method: PaymentMethod,
    pub subtotal: MinorUnits,
    #[serde(default)]
    pub discount: MinorUnits,
    #[serde(default)]
    pub tax: MinorUnits,
    #[serde(default)]
    pub shipping: MinorUnits,
    pub total: MinorUnits,
    pub items: Vec<NewOrderLine>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub billing_address: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    /// The cart whose holds this order converts into committed lines.
    #[serde(default)]
    pub cart_key: Option<String>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_id: String, method: PaymentMethod, total: MinorUnits) -> Self {
        Self {
            order_id,
            customer_id,
            currency: spg_common::DEFAULT_CURRENCY_CODE.to_string(),
            method,
            subtotal: total,
            discount: MinorUnits::default(),
            tax: MinorUnits::default(),
            shipping: MinorUnits::default(),
            total,
            items: Vec::new(),
            shipping_address: None,
            billing_address: None,
            contact_email: None,
            cart_key: None,
        }
    }

    pub fn with_item(mut self, item: NewOrderLine) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_cart_key<S: Into<String>>(mut self, key: S) -> Self {
        self.cart_key = Some(key.into());
        self
    }
}

//--------------------------------------     OrderLineItem     -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: i64,
    pub order_row_id: i64,
    pub product_id: String,
    pub denomination: Denomination,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    pub total: MinorUnits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: String,
    pub denomination: Denomination,
    pub quantity: i64,
    pub unit_price: MinorUnits,
}

impl NewOrderLine {
    pub fn new<S: Into<String>>(product_id: S, denomination: Denomination, quantity: i64, unit_price: MinorUnits) -> Self {
        Self { product_id: product_id.into(), denomination, quantity, unit_price }
    }

    pub fn total(&self) -> MinorUnits {
        self.unit_price * self.quantity
    }
}

//--------------------------------------     StatusUpdate      -------------------------------------------------------
/// A proposed payment status transition, assembled by an adapter or the reconciler and handed to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: PaymentStatus,
    /// External transaction reference carried by the event, if any.
    pub transaction_id: Option<String>,
    /// Gateway-supplied settlement time. If absent and the transition lands on `completed`, the reconciliation
    /// time is stamped instead.
    pub paid_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn new(status: PaymentStatus) -> Self {
        Self { status, transaction_id: None, paid_at: None }
    }

    pub fn with_transaction_id<S: Into<String>>(mut self, txid: S) -> Self {
        self.transaction_id = Some(txid.into());
        self
    }

    pub fn with_paid_at(mut self, at: DateTime<Utc>) -> Self {
        self.paid_at = Some(at);
        self
    }
}

//--------------------------------------     ProductHold       -------------------------------------------------------
/// A time-bounded inventory reservation for one product+denomination, created when a shopper adds the denomination
/// to their cart.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductHold {
    pub id: i64,
    pub product_id: String,
    pub denomination: Denomination,
    pub quantity: i64,
    /// The session or user that owns the hold.
    pub cart_key: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ProductHold {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHold {
    pub product_id: String,
    pub denomination: Denomination,
    pub quantity: i64,
    pub cart_key: String,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------    GatewayAccount     -------------------------------------------------------
/// A receiving wallet registered for a gateway brand. At most one account per brand is the default.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GatewayAccount {
    pub id: i64,
    pub brand: String,
    pub label: String,
    /// Stored lowercased. See [`crate::GatewayAccountApi`].
    pub wallet_address: String,
    pub enabled: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGatewayAccount {
    pub brand: String,
    pub label: String,
    pub wallet_address: String,
    #[serde(default)]
    pub set_default: bool,
}

//--------------------------------------   AffiliateAccount    -------------------------------------------------------
/// A commission split bound to a gateway account. Rates are fractions in `[0, 1]`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AffiliateAccount {
    pub id: i64,
    pub gateway_account_id: i64,
    pub payout_wallet: String,
    pub commission_rate: f64,
    pub merchant_rate: f64,
    pub enabled: bool,
    pub total_transactions: i64,
    pub total_commission: MinorUnits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAffiliateAccount {
    pub gateway_account_id: i64,
    pub payout_wallet: String,
    pub commission_rate: f64,
    pub merchant_rate: f64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn denominations_parse_to_thousandths() {
        assert_eq!("0.125".parse::<Denomination>().unwrap().thousandths(), 125);
        assert_eq!("1".parse::<Denomination>().unwrap(), Denomination::ONE);
        assert_eq!("3.5".parse::<Denomination>().unwrap().thousandths(), 3500);
        assert!("0.0001".parse::<Denomination>().is_err());
        assert!("-1".parse::<Denomination>().is_err());
        assert!("nope".parse::<Denomination>().is_err());
    }

    #[test]
    fn denomination_display() {
        assert_eq!(Denomination::from_thousandths(125).to_string(), "0.125");
        assert_eq!(Denomination::ONE.to_string(), "1");
        assert_eq!(Denomination::from_thousandths(3500).to_string(), "3.5");
    }

    #[test]
    fn order_id_well_formedness() {
        assert!(OrderId::from("ORD-100").is_well_formed());
        assert!(OrderId::from("A1-42").is_well_formed());
        assert!(!OrderId::from("ORD-").is_well_formed());
        assert!(!OrderId::from("-100").is_well_formed());
        assert!(!OrderId::from("ORD-1a").is_well_formed());
        assert!(!OrderId::from("justtext").is_well_formed());
    }

    #[test]
    fn terminal_statuses() {
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Processing.is_terminal());
        assert!(PaymentStatus::PartiallyRefunded.is_refund());
    }
}
