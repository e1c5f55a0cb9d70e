use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Entry {id} not found")]
    NotFound { id: String },

    #[error("Remote rejected request (status {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Duplicate group mixes kinds: {first} and {second}")]
    AmbiguousGroup { first: String, second: String },

    #[error("Invalid duplicate group: {0}")]
    InvalidGroup(String),

    #[error("Invalid merge plan: {0}")]
    InvalidPlan(String),

    #[error("Similarity threshold must be within 0.0..=1.0, got {0}")]
    InvalidThreshold(f64),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Nothing matched: {0}")]
    NoMatches(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Remote shell error: {0}")]
    RemoteShell(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        match self {
            CatalogError::NotFound { .. } => true,
            CatalogError::RemoteRejected { status, .. } => *status == 404,
            _ => false,
        }
    }
}
