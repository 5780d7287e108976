//! # Handler capability
//!
//! A handler executes the requests addressed to one registry identifier and
//! completes the callbacks that name it. The dispatcher calls every method
//! synchronously from its worker task, never re-entrantly. Work that takes
//! longer belongs on the handler's own task, reporting back through a
//! [`DispatcherHandle`](crate::DispatcherHandle).
//!
//! Plain objects that only know how to run named methods implement
//! [`Invocable`] instead and get wrapped in a [`DefaultHandler`] at
//! registration time.

use std::collections::HashMap;
use std::fmt;

use rmiwire::Address;
use rmiwire::Callback;
use rmiwire::ErrorKind;
use rmiwire::Route;
use rmiwire::RpcError;
use rmiwire::RpcRequest;
use rmiwire::RpcResponse;
use rmiwire::Value;
use tracing::debug;
use tracing::warn;

/// Error kind reported when an object has no such method.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";

/// Error kind reported when an object rejects its arguments.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";

/// The capability the dispatcher resolves registry identifiers to.
pub trait RpcHandler: Send + 'static {
    /// Executes `request`, addressed to `target`, sent from `reply_to`.
    ///
    /// Returning `None` means there is nothing to answer.
    fn handle_request(
        &mut self,
        request: RpcRequest,
        target: &Address,
        reply_to: Option<&Route>,
    ) -> Option<RpcResponse>;

    /// Completes `callback` with the response to a call it was attached to.
    fn handle_response(&mut self, response: RpcResponse, callback: &Callback);

    /// Tears the handler down. Called once when the dispatcher stops.
    fn shutdown(&mut self) {}

    /// Called on every cleanup tick for the handler's own bookkeeping.
    fn periodic_cleanup(&mut self) {}
}

/// Why an [`Invocable`] could not run a method.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeError {
    MethodNotFound(String),
    InvalidParams(String),
    Failed(String),
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MethodNotFound(method) => write!(f, "Method not found: {}", method),
            Self::InvalidParams(msg) => write!(f, "Invalid params: {}", msg),
            Self::Failed(msg) => write!(f, "Invocation failed: {}", msg),
        }
    }
}

impl std::error::Error for InvokeError {}

impl InvokeError {
    fn into_rpc_error(self, target: &Address) -> RpcError {
        match self {
            Self::MethodNotFound(method) => RpcError::new(
                ErrorKind::Other(METHOD_NOT_FOUND.into()),
                vec![Value::from(target.to_string()), Value::from(method)],
            ),
            Self::InvalidParams(msg) => RpcError::new(ErrorKind::Other(INVALID_PARAMS.into()), msg),
            Self::Failed(msg) => RpcError::new(ErrorKind::InvocationException, msg),
        }
    }
}

/// Something that runs named methods over opaque values.
pub trait Invocable: Send + 'static {
    fn invoke(&mut self, method: &str, params: Vec<Value>) -> Result<Value, InvokeError>;
}

impl<F> Invocable for F
where
    F: FnMut(&str, Vec<Value>) -> Result<Value, InvokeError> + Send + 'static,
{
    fn invoke(&mut self, method: &str, params: Vec<Value>) -> Result<Value, InvokeError> {
        self(method, params)
    }
}

type Method = Box<dyn FnMut(Vec<Value>) -> Result<Value, InvokeError> + Send>;

/// A method table: the name-to-closure stand-in for reflective dispatch.
#[derive(Default)]
pub struct Methods {
    table: HashMap<String, Method>,
}

impl Methods {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(Vec<Value>) -> Result<Value, InvokeError> + Send + 'static,
    {
        self.table.insert(name.into(), Box::new(f));
        self
    }
}

impl Invocable for Methods {
    fn invoke(&mut self, method: &str, params: Vec<Value>) -> Result<Value, InvokeError> {
        let f = self
            .table
            .get_mut(method)
            .ok_or_else(|| InvokeError::MethodNotFound(method.to_string()))?;
        f(params)
    }
}

/// Adapts an [`Invocable`] to the handler capability.
///
/// Requests run the named method. A failing notification still produces an
/// error response (without id) so the dispatcher can report it; a successful
/// one produces nothing. Callbacks run `callback.method` with
/// `callback.data` followed by the result (or null) and the error (or null).
pub struct DefaultHandler {
    object: Box<dyn Invocable>,
}

impl DefaultHandler {
    pub fn new(object: Box<dyn Invocable>) -> Self {
        Self { object }
    }
}

impl RpcHandler for DefaultHandler {
    fn handle_request(
        &mut self,
        request: RpcRequest,
        target: &Address,
        _reply_to: Option<&Route>,
    ) -> Option<RpcResponse> {
        let RpcRequest { method, params, id } = request;
        match (self.object.invoke(&method, params), id) {
            (Ok(_), None) => None,
            (Ok(result), id) => Some(RpcResponse::ok(id, result)),
            (Err(e), id) => Some(RpcResponse::err(id, e.into_rpc_error(target))),
        }
    }

    fn handle_response(&mut self, response: RpcResponse, callback: &Callback) {
        let (result, error) = match response.outcome {
            Ok(result) => (result, Value::Null),
            Err(error) => (Value::Null, error.to_value()),
        };

        let mut params = callback.data.clone();
        params.push(result);
        params.push(error);

        match self.object.invoke(&callback.method, params) {
            Ok(_) => debug!(callback_target = %callback.target, method = %callback.method, "callback completed"),
            Err(e) => warn!(callback_target = %callback.target, method = %callback.method, error = %e, "callback failed"),
        }
    }
}

/// What a registry identifier can be bound to.
pub enum Target {
    /// A full handler, used as is.
    Handler(Box<dyn RpcHandler>),
    /// A plain object, wrapped in a [`DefaultHandler`].
    Object(Box<dyn Invocable>),
}

impl Target {
    pub fn handler(handler: impl RpcHandler) -> Self {
        Self::Handler(Box::new(handler))
    }

    pub fn object(object: impl Invocable) -> Self {
        Self::Object(Box::new(object))
    }

    pub(crate) fn into_handler(self) -> Box<dyn RpcHandler> {
        match self {
            Self::Handler(handler) => handler,
            Self::Object(object) => Box::new(DefaultHandler::new(object)),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => write!(f, "Target::Handler"),
            Self::Object(_) => write!(f, "Target::Object"),
        }
    }
}

impl From<Methods> for Target {
    fn from(methods: Methods) -> Self {
        Self::object(methods)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;

    fn calc() -> Methods {
        Methods::new()
            .method("add", |params| {
                let sum = params
                    .iter()
                    .map(|p| p.as_int().ok_or_else(|| InvokeError::InvalidParams(format!("not an int: {}", p))))
                    .sum::<Result<i64, _>>()?;
                Ok(Value::Int(sum))
            })
            .method("boom", |_| Err(InvokeError::Failed("division by zero".into())))
    }

    fn addr() -> Address {
        Address::new("rmi", "calc")
    }

    #[test]
    fn test_request_runs_method() {
        let mut handler = DefaultHandler::new(Box::new(calc()));
        let request = RpcRequest::new("add", vec![Value::Int(2), Value::Int(3)], Some(4));
        let response = handler.handle_request(request, &addr(), None);
        assert_eq!(response, Some(RpcResponse::ok(Some(4), 5i64)));
    }

    #[test]
    fn test_request_error_kinds() {
        let mut handler = DefaultHandler::new(Box::new(calc()));

        let missing = handler.handle_request(RpcRequest::new("mul", vec![], Some(1)), &addr(), None).unwrap();
        assert_eq!(missing.error().unwrap().kind, ErrorKind::Other(METHOD_NOT_FOUND.into()));

        let bad = handler
            .handle_request(RpcRequest::new("add", vec![Value::from("x")], Some(2)), &addr(), None)
            .unwrap();
        assert_eq!(bad.error().unwrap().kind, ErrorKind::Other(INVALID_PARAMS.into()));

        let boom = handler.handle_request(RpcRequest::new("boom", vec![], Some(3)), &addr(), None).unwrap();
        assert_eq!(boom.error().unwrap().kind, ErrorKind::InvocationException);
        assert_eq!(boom.id, Some(3));
    }

    #[test]
    fn test_notification_answers_only_on_failure() {
        let mut handler = DefaultHandler::new(Box::new(calc()));
        assert_eq!(handler.handle_request(RpcRequest::new("add", vec![], None), &addr(), None), None);

        let failed = handler.handle_request(RpcRequest::new("boom", vec![], None), &addr(), None).unwrap();
        assert_eq!(failed.id, None);
        assert!(failed.error().is_some());
    }

    #[test]
    fn test_callback_receives_data_result_and_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let object = move |method: &str, params: Vec<Value>| {
            sink.lock().unwrap().push((method.to_string(), params));
            Ok::<_, InvokeError>(Value::Null)
        };
        let mut handler = Target::object(object).into_handler();

        let callback = Callback::new(Address::new("rmi", "client"), "on_done").with_data(vec![Value::from("ctx")]);
        handler.handle_response(RpcResponse::ok(Some(1), "pong"), &callback);
        handler.handle_response(
            RpcResponse::err(Some(2), RpcError::new(ErrorKind::Unreachable, Value::Null)),
            &callback,
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (String::from("on_done"), vec![Value::from("ctx"), Value::from("pong"), Value::Null]));
        assert_eq!(
            seen[1],
            (
                String::from("on_done"),
                vec![
                    Value::from("ctx"),
                    Value::Null,
                    Value::List(vec![Value::from("UNREACHABLE"), Value::Null]),
                ]
            )
        );
    }
}
