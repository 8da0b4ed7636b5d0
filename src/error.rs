// Engine error type
// Errors surfaced to the host UI by the interaction services

use thiserror::Error;

use crate::services::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid event: {0}")]
    Validation(String),

    #[error("Event {0} not found")]
    NotFound(String),

    #[error("A drag is already in progress for event {0}")]
    SessionActive(String),

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::NotFound(id)) => Self::NotFound(id.clone()),
            _ => Self::Store(err),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
