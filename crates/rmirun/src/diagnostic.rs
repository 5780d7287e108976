//! # Diagnostics
//!
//! Conditions the dispatcher cannot hand to anyone waiting: failed
//! notifications, orphaned responses, undeliverable replies. They are terminal
//! at the dispatcher. Each one is logged once and, when an observer is
//! attached, forwarded to it.

use std::fmt;

use rmiwire::Address;
use rmiwire::ErrorKind;
use rmiwire::RpcError;
use tokio::sync::mpsc;
use tracing::error;
use tracing::warn;

/// Receiving side for whoever wants to watch dispatcher diagnostics.
pub type DiagnosticSender = mpsc::UnboundedSender<Diagnostic>;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A call or request had no destination hop to go to.
    MissingDestination { method: String },
    /// A response was produced for a request that carried no source route.
    NoReplyRoute { target: Address, id: u64 },
    /// A notification failed and nobody is waiting to hear about it.
    NotificationFailed { target: Address, method: String, error: RpcError },
    /// A response arrived without a correlation id.
    UncorrelatedResponse,
    /// A response arrived for an id that is not pending: a duplicate, or late.
    OrphanedResponse { id: u64 },
    /// The callback of a matched call names an unknown handler.
    CallbackTargetMissing { target: Address, id: u64 },
    /// A notification could not be delivered.
    NotificationUndeliverable { method: String, reason: String },
    /// A response could not be delivered back to its caller.
    ResponseUndeliverable { id: Option<u64>, reason: String },
    /// Something other than a request or response was undeliverable.
    UnexpectedFailure { kind: &'static str, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDestination { method } => write!(f, "No destination for '{}'", method),
            Self::NoReplyRoute { target, id } => write!(f, "No route to reply to request {} for {}", id, target),
            Self::NotificationFailed { target, method, error } => {
                write!(f, "Notification failed: {} method {}, {}", target, method, error)
            }
            Self::UncorrelatedResponse => write!(f, "Response without correlation id"),
            Self::OrphanedResponse { id } => write!(f, "No pending request with id {}", id),
            Self::CallbackTargetMissing { target, id } => {
                write!(f, "Callback target not found {} for response {}", target, id)
            }
            Self::NotificationUndeliverable { method, reason } => {
                write!(f, "Delivery failed for notification '{}': {}", method, reason)
            }
            Self::ResponseUndeliverable { id: Some(id), reason } => {
                write!(f, "Delivery failed for response with id {}: {}", id, reason)
            }
            Self::ResponseUndeliverable { id: None, reason } => {
                write!(f, "Delivery failed for uncorrelated response: {}", reason)
            }
            Self::UnexpectedFailure { kind, reason } => {
                write!(f, "Unexpected delivery failure of {}: {}", kind, reason)
            }
        }
    }
}

impl Diagnostic {
    /// Writes the diagnostic to the log. Invocation exceptions carry their full
    /// detail at error level; everything else is a warning.
    pub fn log(&self) {
        match self {
            Self::NotificationFailed { error: e, .. } if e.kind == ErrorKind::InvocationException => {
                error!(detail = %e.data, "{}", self);
            }
            _ => warn!("{}", self),
        }
    }
}
