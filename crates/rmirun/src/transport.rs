//! # Transport Abstraction
//!
//! The dispatcher's only view of the network. A transport delivers messages to
//! the inbox registered for their destination scheme, and hands undeliverable
//! ones back to the sender as a `DeliveryFailure`.
//!
//! ## Philosophy
//!
//! - **Best-Effort**: `send` returning `Ok` means "accepted", not "delivered".
//!   Failures surface later as inbound messages.
//! - **Scheme-Routed**: addressing beyond the scheme of the first hop is the
//!   transport's business.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::message::Message;

/// Sending side of a dispatcher's inbound queue.
pub type Inbox = mpsc::UnboundedSender<Message>;

/// Errors that occur at the transport layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// No inbox is registered for the scheme.
    UnknownScheme(String),
    /// The receiving inbox has been dropped.
    InboxClosed(String),
    /// Generic transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownScheme(scheme) => write!(f, "No inbox registered for scheme '{}'", scheme),
            Self::InboxClosed(scheme) => write!(f, "Inbox for scheme '{}' is closed", scheme),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A mechanism to move messages between participants.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Routes every message whose destination uses `scheme` into `inbox`.
    fn register(&self, scheme: &str, inbox: Inbox) -> Result<()>;

    /// Hands a message over for delivery.
    ///
    /// # invariants
    /// - Must not block on the receiver.
    /// - A message that later proves undeliverable comes back to its source
    ///   wrapped in a `DeliveryFailure`.
    async fn send(&self, message: Message) -> Result<()>;

    /// Delivers `message` after `initial_delay`, then again every `period`.
    fn send_every(&self, message: Message, initial_delay: Duration, period: Duration) -> Result<()>;
}
