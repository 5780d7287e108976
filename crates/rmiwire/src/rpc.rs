//! # RPC records
//!
//! Requests, responses and errors as they travel between participants, plus the
//! callback descriptor a caller attaches to an outbound call.

use std::fmt;

use crate::address::Address;
use crate::value::Value;

/// Kind tag of an [`RpcError`].
///
/// The first three are produced by the dispatcher itself. Anything a handler
/// defines travels opaquely as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request named an identifier nobody registered.
    TargetNotFound,
    /// The transport could not deliver the request.
    Unreachable,
    /// The handler failed while executing the method.
    InvocationException,
    Other(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TargetNotFound => "TARGET_NOT_FOUND",
            Self::Unreachable => "UNREACHABLE",
            Self::InvocationException => "INVOCATION_EXCEPTION",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error kind plus opaque diagnostic data.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub kind: ErrorKind,
    pub data: Value,
}

impl RpcError {
    pub fn new(kind: ErrorKind, data: impl Into<Value>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Flattens the error into `[kind, data]` for handlers that only speak values.
    pub fn to_value(&self) -> Value {
        Value::List(vec![Value::Str(self.kind.as_str().to_string()), self.data.clone()])
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.data)
    }
}

impl std::error::Error for RpcError {}

/// An invocation request. `id` is present iff the caller waits for a response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub method: String,
    pub params: Vec<Value>,
    pub id: Option<u64>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: Option<u64>) -> Self {
        Self {
            method: method.into(),
            params,
            id,
        }
    }

    /// A request nobody waits on.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// The answer to an [`RpcRequest`], correlated by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub id: Option<u64>,
    pub outcome: Result<Value, RpcError>,
}

impl RpcResponse {
    pub fn ok(id: Option<u64>, result: impl Into<Value>) -> Self {
        Self {
            id,
            outcome: Ok(result.into()),
        }
    }

    pub fn err(id: Option<u64>, error: RpcError) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        self.outcome.as_ref().err()
    }

    pub fn result(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }
}

/// Where to deliver the response of a call: the handler registered under
/// `target`, told to run `method`.
///
/// `data` is extra context the caller wants handed back alongside the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Callback {
    pub target: Address,
    pub method: String,
    pub data: Vec<Value>,
}

impl Callback {
    pub fn new(target: Address, method: impl Into<String>) -> Self {
        Self {
            target,
            method: method.into(),
            data: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: Vec<Value>) -> Self {
        self.data = data;
        self
    }
}
