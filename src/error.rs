/// Errors surfaced by the segmentation session.
#[derive(thiserror::Error, Debug)]
pub enum SegmentError {
    #[error("image embedding must be set before predict")]
    NotEmbedded,

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Invalid minimum area: {0} (must be greater than zero)")]
    InvalidMinArea(usize),

    #[error("Malformed prediction batch: {0}")]
    MalformedBatch(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config Parse Error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Failure raised inside the backbone, passed through untouched.
    #[error(transparent)]
    Backbone(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SegmentError>;
