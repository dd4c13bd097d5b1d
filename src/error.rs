// Error types for tracking lookups
use thiserror::Error;

use crate::request::Operation;
use crate::tree::GenericNode;

// Failures of a single tracking call
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unexpected response shape for {operation}: missing {path}")]
    UnexpectedResponseShape {
        operation: Operation,
        path: &'static str,
        tree: Box<GenericNode>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TrackingError {
    pub(crate) fn unexpected_shape(
        operation: Operation,
        path: &'static str,
        tree: &GenericNode,
    ) -> Self {
        TrackingError::UnexpectedResponseShape {
            operation,
            path,
            tree: Box::new(tree.clone()),
        }
    }
}

impl From<reqwest::Error> for TrackingError {
    fn from(err: reqwest::Error) -> Self {
        TrackingError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (status {})", code))
        .unwrap_or_default()
}

// Failures while setting up a client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}
