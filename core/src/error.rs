use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollupError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Donation record '{id}' not found")]
    RecordNotFound { id: String },

    #[error("Invalid date in stored row: {value}")]
    InvalidDate { value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RollupResult<T> = Result<T, RollupError>;
