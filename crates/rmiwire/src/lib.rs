//! # rmiwire
//!
//! The wire-safe half of the remote-invocation stack: addresses, routes, opaque
//! values and the request/response/error records that cross process boundaries.
//!
//! Nothing in here knows about queues, handlers or time. Types that only make
//! sense inside one process (calls with timestamps, delivery failures) live in
//! `rmirun`.

pub mod address;
pub mod error;
pub mod rpc;
pub mod value;

pub use address::Address;
pub use address::Route;
pub use error::Error;
pub use error::Result;
pub use rpc::Callback;
pub use rpc::ErrorKind;
pub use rpc::RpcError;
pub use rpc::RpcRequest;
pub use rpc::RpcResponse;
pub use value::Value;
