use thiserror::Error;

use crate::models::DeliveryStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },
    #[error("persistence error: {0}")]
    Persistence(String),
}
