use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Stripe did not respond in time: {0}")]
    Timeout(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Webhook signature verification failed. {0}")]
    InvalidSignature(String),
    #[error("Webhook event could not be read. {0}")]
    InvalidEvent(String),
}

impl From<reqwest::Error> for StripeApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::RestRequestError(e.to_string())
        }
    }
}
