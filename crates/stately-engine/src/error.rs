use stately_core::{ConfigurationError, PatternError};
use stately_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PatternError> for EngineError {
    fn from(e: PatternError) -> Self {
        EngineError::Internal(e.to_string())
    }
}
