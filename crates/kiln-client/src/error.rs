//! Client error types

use kiln_build::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned while talking to the build daemon
#[derive(Error, Debug)]
pub enum ClientError {
    /// The socket is absent or refused the connection. Never retried.
    #[error("cannot connect to daemon at {}: {source}", socket.display())]
    Unreachable {
        socket: PathBuf,
        source: std::io::Error,
    },

    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// Failure reported by the daemon, kept verbatim
    #[error("{0}")]
    Remote(String),

    /// Rejected locally before any connection was made
    #[error("{0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub(crate) fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        ClientError::Transport {
            operation,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Remote(_) => ErrorKind::Remote,
            ClientError::InvalidRequest(_) => ErrorKind::InputValidation,
            ClientError::Unreachable { .. } | ClientError::Transport { .. } | ClientError::Io(_) => {
                ErrorKind::Transport
            }
        }
    }

    /// User-facing message with a hint where one helps
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Unreachable { .. } => format!(
                "{}\n\
                 \n\
                 Hint:\n  \
                 • check that the kiln daemon is running\n  \
                 • or point to its socket with -H/--host or KILN_SOCKET",
                self
            ),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
