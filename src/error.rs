use crate::store::key::Kind;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("{kind} record is missing field '{field}'")]
    MissingField { kind: Kind, field: &'static str },

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("malformed key path: {0}")]
    BadKey(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("property encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(key: &crate::store::key::Key) -> Self {
        StoreError::NotFound { path: key.path() }
    }

    pub fn missing_field(kind: Kind, field: &'static str) -> Self {
        StoreError::MissingField { kind, field }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
