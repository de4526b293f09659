use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for InsightError {
    fn from(err: polars::error::PolarsError) -> Self {
        InsightError::Polars(err.to_string())
    }
}

impl InsightError {
    /// Fatal errors abort the run before any report is produced. Inside
    /// drafting they also end the retry loop early.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, InsightError::Llm(_))
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
