/// Domain-specific error types for the analytics service.
/// Pure computations never fail; everything that touches the store,
/// the environment or a byte stream returns one of these.
/// The request boundary turns any of them into a failure payload.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AnalyticsError {
    fn from(e: rusqlite::Error) -> Self {
        AnalyticsError::Database(e.to_string())
    }
}

impl From<csv::Error> for AnalyticsError {
    fn from(e: csv::Error) -> Self {
        AnalyticsError::Csv(e.to_string())
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        AnalyticsError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for AnalyticsError {
    fn from(e: std::io::Error) -> Self {
        AnalyticsError::Io(e.to_string())
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
