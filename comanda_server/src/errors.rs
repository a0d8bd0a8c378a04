use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use comanda_engine::{
    traits::{AccountApiError, GatewayError},
    ErrorCategory,
    OrderFlowError,
};
use log::error;
use stripe_tools::StripeApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Invalid request. {0}")]
    BadRequest(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Invalid webhook event. {0}")]
    InvalidWebhookEvent(String),
    #[error("{0}")]
    OrderFlowError(#[from] OrderFlowError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhookEvent(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::CouldNotIssueToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::OrderFlowError(e) => order_flow_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ {self}");
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn order_flow_status(e: &OrderFlowError) -> StatusCode {
    match (e, e.category()) {
        (OrderFlowError::ActorNotAdmin(_), _) => StatusCode::FORBIDDEN,
        (OrderFlowError::Gateway(GatewayError::Timeout(_)), _) => StatusCode::GATEWAY_TIMEOUT,
        (_, ErrorCategory::Validation) => StatusCode::BAD_REQUEST,
        (_, ErrorCategory::NotFound) => StatusCode::NOT_FOUND,
        (_, ErrorCategory::Conflict) => StatusCode::CONFLICT,
        (_, ErrorCategory::State) => StatusCode::CONFLICT,
        (_, ErrorCategory::Gateway) => StatusCode::BAD_GATEWAY,
        (_, ErrorCategory::Database) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::QueryError(s) => Self::BadRequest(s),
            AccountApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
        }
    }
}

impl From<StripeApiError> for ServerError {
    fn from(e: StripeApiError) -> Self {
        match e {
            StripeApiError::Initialization(s) => Self::InitializeError(s),
            e => Self::InvalidWebhookEvent(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("The access token is invalid. {0}")]
    ValidationError(String),
    #[error("The access token has expired.")]
    ExpiredToken,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Could not issue an access token. {0}")]
    CouldNotIssueToken(String),
}
