//! Custom error types for sqlrag

use thiserror::Error;

/// Main error type for sqlrag operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema extraction error: {0}")]
    Extraction(String),

    #[error("Index build error: {0}")]
    IndexBuild(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Error in SQL agent: {0}")]
    Agent(String),

    #[error("Service not fully initialized: {0}")]
    NotReady(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for sqlrag
pub type Result<T> = std::result::Result<T, Error>;

/// Convert qdrant errors
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::Qdrant(err.to_string())
    }
}

impl Error {
    /// Whether this error means a backing service could not be reached.
    pub fn is_connection(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Qdrant(_) => true,
            Error::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
            ),
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
