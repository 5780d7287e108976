//! # In-process envelopes
//!
//! A [`Message`] is what transports hand to the dispatcher and what the
//! dispatcher hands back. Its [`Payload`] is a closed set: the dispatch loop
//! matches on it exhaustively, so there is no "unknown content" case to handle.

use std::fmt;

use rmiwire::Address;
use rmiwire::Callback;
use rmiwire::Route;
use rmiwire::RpcRequest;
use rmiwire::RpcResponse;
use rmiwire::Value;
use tokio::time::Instant;

/// A locally initiated outbound invocation.
///
/// With a callback it is correlated and tracked until answered or expired.
/// Without one it is fire-and-forget.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub targets: Vec<Route>,
    pub method: String,
    pub params: Vec<Value>,
    pub callback: Option<Callback>,
    /// Stamped by the dispatcher when the call is sent.
    pub sent_at: Option<Instant>,
}

impl Call {
    pub fn new(targets: Vec<Route>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            targets,
            method: method.into(),
            params,
            callback: None,
            sent_at: None,
        }
    }

    /// Shorthand for a call to a single address.
    pub fn to(target: Address, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new(vec![Route::to(target)], method, params)
    }

    pub fn with_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// A message the transport could not deliver, handed back to its sender.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    pub message: Box<Message>,
    pub reason: String,
}

impl DeliveryFailure {
    pub fn new(message: Message, reason: impl Into<String>) -> Self {
        Self {
            message: Box::new(message),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Call(Call),
    Request(RpcRequest),
    Response(RpcResponse),
    DeliveryFailure(DeliveryFailure),
    Shutdown,
    CleanupTick,
}

impl Payload {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Call(_) => "call",
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::DeliveryFailure(_) => "delivery-failure",
            Self::Shutdown => "shutdown",
            Self::CleanupTick => "cleanup-tick",
        }
    }
}

/// An envelope: where it came from, where it goes, what it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub source: Option<Route>,
    pub destinations: Vec<Route>,
    pub payload: Payload,
}

impl Message {
    pub fn new(source: Option<Route>, destinations: Vec<Route>, payload: Payload) -> Self {
        Self {
            source,
            destinations,
            payload,
        }
    }

    /// A sourceless message to a single address.
    pub fn to(destination: Address, payload: Payload) -> Self {
        Self::new(None, vec![Route::to(destination)], payload)
    }

    pub fn from_route(mut self, source: Route) -> Self {
        self.source = Some(source);
        self
    }

    /// First hop of the first destination; the address the message is for.
    pub fn primary_destination(&self) -> Option<&Address> {
        self.destinations.first().and_then(Route::first)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to [", self.payload.kind())?;
        for (i, route) in self.destinations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", route)?;
        }
        write!(f, "]")?;
        if let Some(source) = &self.source {
            write!(f, " from {}", source)?;
        }
        Ok(())
    }
}
