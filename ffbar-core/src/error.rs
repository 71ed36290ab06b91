use thiserror::Error;

/// Custom error types for ffbar
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("failed to start {program}: {source}")]
    SpawnFailed {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} did not expose a {stream} pipe")]
    MissingPipe {
        program: String,
        stream: &'static str,
    },

    #[error("failed to wait for {program}: {source}")]
    WaitFailed {
        program: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ffbar operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
