//! # rmirun
//!
//! The dispatch core of a remote-invocation service. A [`Dispatcher`] sits
//! between a [`Transport`] and a set of [`RpcHandler`]s, turning unordered,
//! unreliable message delivery into correlated request, response and callback
//! semantics, with a periodic sweep for calls that never got an answer.

pub mod config;
pub mod diagnostic;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod local;
pub mod message;
pub mod transport;

mod pending;
mod registry;

pub use config::DispatcherConfig;
pub use diagnostic::Diagnostic;
pub use dispatcher::Dispatcher;
pub use dispatcher::DispatcherBuilder;
pub use dispatcher::DispatcherHandle;
pub use error::Error;
pub use error::Result;
pub use handler::DefaultHandler;
pub use handler::Invocable;
pub use handler::InvokeError;
pub use handler::Methods;
pub use handler::RpcHandler;
pub use handler::Target;
pub use local::LocalTransport;
pub use message::Call;
pub use message::DeliveryFailure;
pub use message::Message;
pub use message::Payload;
pub use transport::Transport;

#[cfg(test)]
mod mock_transport;
