use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("probe tool failed: {0}")]
    Tool(String),

    #[error("could not parse probe output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
