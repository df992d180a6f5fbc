use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use spg_engine::{
    traits::{AccountError, InventoryError, PaymentGatewayError},
    ReconcileError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with existing state. {0}")]
    Conflict(String),
    #[error("The admin API key is missing or wrong")]
    InvalidApiKey,
    #[error("The upstream payment gateway failed. {0}")]
    UpstreamGatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::UpstreamGatewayError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        let error = code.canonical_reason().unwrap_or("Error");
        HttpResponse::build(code)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": error, "message": self.to_string() }).to_string())
    }
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match &e {
            PaymentGatewayError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentGatewayError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            PaymentGatewayError::AlreadyInitiated(..) => Self::Conflict(e.to_string()),
            PaymentGatewayError::MethodMismatch(..) => Self::InvalidRequestBody(e.to_string()),
            PaymentGatewayError::NoReceivingAccount(_) => Self::ConfigurationError(e.to_string()),
            PaymentGatewayError::GatewayError(_) => Self::UpstreamGatewayError(e.to_string()),
            PaymentGatewayError::SdkUnavailable(_) => Self::UpstreamGatewayError(e.to_string()),
            _ => Self::BackendError(e.to_string()),
        }
    }
}

impl From<InventoryError> for ServerError {
    fn from(e: InventoryError) -> Self {
        match &e {
            InventoryError::InsufficientStock { .. } => Self::Conflict(e.to_string()),
            InventoryError::NonPositiveQuantity(_) => Self::InvalidRequestBody(e.to_string()),
            InventoryError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<AccountError> for ServerError {
    fn from(e: AccountError) -> Self {
        match &e {
            AccountError::AccountNotFound(_) | AccountError::AffiliateNotFound(_) => Self::NoRecordFound(e.to_string()),
            AccountError::DuplicateAccount { .. } | AccountError::AffiliateAlreadyBound(_) => {
                Self::Conflict(e.to_string())
            },
            AccountError::RateOutOfRange(_) => Self::InvalidRequestBody(e.to_string()),
            AccountError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        match &e {
            ReconcileError::OrderNotFound => Self::NoRecordFound(e.to_string()),
            ReconcileError::InvalidPayload(_) => Self::InvalidRequestBody(e.to_string()),
            ReconcileError::Backend(inner) => Self::from(inner.clone()),
        }
    }
}
