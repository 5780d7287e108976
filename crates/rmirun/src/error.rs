//! Errors surfaced to local callers of the dispatcher.

use crate::transport;

#[derive(Debug)]
pub enum Error {
    /// The transport refused to set the dispatcher up.
    Transport(transport::Error),
    /// The identifier is reserved for the dispatcher's own service.
    ReservedIdentifier(String),
    /// Identifiers must not be empty.
    EmptyIdentifier,
    /// The dispatcher has stopped and no longer accepts work.
    Closed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::ReservedIdentifier(id) => write!(f, "Identifier '{}' is reserved", id),
            Self::EmptyIdentifier => write!(f, "Identifier must not be empty"),
            Self::Closed => write!(f, "Dispatcher is closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
