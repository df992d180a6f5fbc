//! Canonical form of an inbound gateway notification.
//!
//! The gateway reaches us over two ingress shapes (query parameters on a redirect GET, and a JSON body on a
//! server-to-server POST), and its field names waver between snake_case and camelCase. Everything is normalised
//! into one [`CallbackEvent`] at the boundary; no business logic ever looks at the raw wire fields.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use spg_common::MinorUnits;
use thiserror::Error;

use crate::db_types::{OrderId, PaymentStatus};

#[derive(Debug, Clone, Error)]
pub enum CallbackEventError {
    #[error("The notification carried neither an order id nor a session id")]
    MissingParameters,
}

/// The raw wire shape. Both ingress variants deserialize into this; `event_type` is only ever present on the
/// POST variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackPayload {
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default, alias = "orderId")]
    pub order_id: Option<String>,
    #[serde(default, alias = "transactionId")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, with = "amount_wire")]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "paidAt")]
    pub paid_at: Option<String>,
    #[serde(default, alias = "eventType")]
    pub event_type: Option<String>,
}

/// Gateways send the amount as either a bare number or a string. Accept both.
mod amount_wire {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Text(String),
        }
        let raw = Option::<Raw>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Raw::Num(n)) => Some(n),
            Some(Raw::Text(s)) => s.trim().parse::<i64>().ok(),
            None => None,
        })
    }
}

/// The normalized internal event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    /// Resolution candidates, in order of preference.
    pub order_id: Option<OrderId>,
    pub session_id: Option<String>,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub amount: Option<MinorUnits>,
    pub currency: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<CallbackPayload> for CallbackEvent {
    type Error = CallbackEventError;

    fn try_from(raw: CallbackPayload) -> Result<Self, Self::Error> {
        if raw.order_id.is_none() && raw.session_id.is_none() {
            return Err(CallbackEventError::MissingParameters);
        }
        let status = map_external_status(raw.status.as_deref(), raw.event_type.as_deref());
        let paid_at = raw.paid_at.as_deref().and_then(parse_timestamp);
        Ok(Self {
            order_id: raw.order_id.map(OrderId::from),
            session_id: raw.session_id,
            status,
            transaction_id: raw.transaction_id,
            amount: raw.amount.map(MinorUnits::from),
            currency: raw.currency,
            paid_at,
        })
    }
}

impl CallbackEvent {
    /// Recover an order id embedded in a `session_<id>` pattern. Only trusted when the recovered id is
    /// well-formed; otherwise the lookup must fail closed.
    pub fn order_id_from_session(&self) -> Option<OrderId> {
        let session = self.session_id.as_deref()?;
        let embedded = session.strip_prefix("session_")?;
        let candidate = OrderId::from(embedded);
        candidate.is_well_formed().then_some(candidate)
    }
}

/// Map the gateway's status vocabulary (considering both the `status` and the `event_type` field) onto the
/// internal status enum. Case-insensitive; anything unrecognised maps to `pending`, the safe default.
pub fn map_external_status(status: Option<&str>, event_type: Option<&str>) -> PaymentStatus {
    for token in [status, event_type].into_iter().flatten() {
        if let Some(mapped) = map_token(token) {
            return mapped;
        }
    }
    debug!("🧭️ Unrecognised gateway status tokens (status={status:?}, event_type={event_type:?}); treating as pending");
    PaymentStatus::Pending
}

fn map_token(token: &str) -> Option<PaymentStatus> {
    match token.trim().to_ascii_lowercase().as_str() {
        "completed" | "paid" | "success" | "payment_success" | "payment.completed" => Some(PaymentStatus::Completed),
        "failed" | "error" | "canceled" | "cancelled" | "payment_failed" | "payment.failed" => {
            Some(PaymentStatus::Failed)
        },
        "processing" | "payment_processing" | "payment.processing" => Some(PaymentStatus::Processing),
        "pending" => Some(PaymentStatus::Pending),
        "refunded" | "payment_refunded" | "payment.refunded" => Some(PaymentStatus::Refunded),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    // Some gateways send a bare unix epoch.
    s.trim().parse::<i64>().ok().and_then(|secs| DateTime::from_timestamp(secs, 0))
}
