use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("No credential available for the vote stream")]
    MissingCredential,
    #[error("Vote stream request failed with status {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("Could not reach the vote stream: {0}")]
    Transport(String),
    #[error("Vote stream read failed: {0}")]
    Read(String),
}

/// A single event-stream record whose payload could not be decoded.
#[derive(Error, Debug)]
#[error("Malformed `{event}` payload: {source}")]
pub struct RecordError {
    pub event: String,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request rejected ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("The voting link has no token")]
    MissingToken,
    #[error("The voting link does not identify a property and voting")]
    MissingScope,
    #[error("Operation not allowed while in the {actual} stage")]
    WrongStage { actual: &'static str },
    #[error("Option {0} is not part of this ballot")]
    UnknownOption(i64),
    #[error("This resident has already voted")]
    AlreadyVoted,
    #[error("The ballot has not been loaded")]
    NoBallot,
    #[error("No vote has been cast yet")]
    BallotPending,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl From<reqwest::Error> for StreamError {
    fn from(error: reqwest::Error) -> Self {
        StreamError::Transport(error.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::Decode(error.to_string())
        } else {
            ApiError::Transport(error.to_string())
        }
    }
}

/// Human-readable text for a rejected response, preferring the server's own
/// `error`/`message`/`details` field over the raw body.
pub fn response_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message", "details"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_owned))
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.to_owned()
            }
        })
}

impl ApiError {
    pub fn from_body(status: u16, body: &str) -> Self {
        ApiError::Status {
            status,
            message: response_message(status, body),
        }
    }
}
