use thiserror::Error;

pub type CreativeResult<T> = Result<T, CreativeError>;

/// Errors surfaced by the creative workflow to its caller.
#[derive(Error, Debug)]
pub enum CreativeError {
    #[error("invalid image intake: {0}")]
    InvalidIntake(String),

    #[error("no product image uploaded")]
    NoIntake,

    #[error("invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("generation job #{sequence} is still {status}")]
    JobInFlight { sequence: u64, status: String },

    #[error("no generation job in flight")]
    NothingToCancel,

    #[error("variant {0} is not in the current result set")]
    UnknownVariant(String),

    #[error("variant image could not be decoded: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the remote image-generation service boundary.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response from generation service: {0}")]
    InvalidResponse(String),

    #[error("invalid service endpoint: {0}")]
    Endpoint(String),

    #[error("image encoding failed: {0}")]
    Encode(String),
}
