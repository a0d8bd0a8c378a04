use thiserror::Error;

use crate::{api::errors::OrderFlowError, traits::AccountApiError};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Could not run database migrations: {0}")]
    MigrationError(String),
}

impl SqliteDatabaseError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::DriverError(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<SqliteDatabaseError> for OrderFlowError {
    fn from(e: SqliteDatabaseError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<SqliteDatabaseError> for AccountApiError {
    fn from(e: SqliteDatabaseError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
