use thiserror::Error;

use shared_models::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<anyhow::Error> for NotificationError {
    fn from(err: anyhow::Error) -> Self {
        NotificationError::Storage(err.to_string())
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match &err {
            NotificationError::NotFound(_) => AppError::NotFound(err.to_string()),
            NotificationError::Storage(_) => AppError::Database(err.to_string()),
            NotificationError::Serialization(_) => AppError::Internal(err.to_string()),
        }
    }
}
