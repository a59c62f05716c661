use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Short machine-readable tag, used as the diagnostic on degraded results.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Http(e) if e.is_timeout() => "timeout",
            Error::Http(e) if e.is_decode() => "malformed_envelope",
            Error::Http(_) => "transport",
            Error::Timeout(_) => "timeout",
            Error::Status { .. } => "http_status",
            Error::MalformedEnvelope(_) => "malformed_envelope",
            Error::InvalidInput(_) => "invalid_input",
            Error::Inference(_) => "inference_error",
            Error::Storage(_) => "storage_error",
            Error::External(_) => "external_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
