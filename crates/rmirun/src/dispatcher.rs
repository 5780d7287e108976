//! # Dispatcher
//!
//! A single actor between a [`Transport`] and the registered handlers. One tokio
//! task owns the dispatcher and drains its inbox; the handler registry, the
//! pending-call registry and the id counter are touched from nowhere else, so
//! none of them needs a lock.
//!
//! ## Flow
//!
//! - `Call`: correlate (if a callback is attached), then send an `RpcRequest`.
//! - `Request`: resolve the target identifier, run the handler, route the
//!   answer back to the source (or report it if nobody waits).
//! - `Response`: match the id against pending calls and complete the callback.
//! - `DeliveryFailure`: turn an undelivered request into an `UNREACHABLE`
//!   response for its caller; report anything else.
//! - `CleanupTick`: expire stale calls and let handlers do their bookkeeping.
//! - `Shutdown`: stop after the current message and tear the handlers down.

use std::ops::ControlFlow;
use std::sync::Arc;

use rmiwire::Address;
use rmiwire::ErrorKind;
use rmiwire::Route;
use rmiwire::RpcError;
use rmiwire::RpcRequest;
use rmiwire::RpcResponse;
use rmiwire::Value;
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::config::DispatcherConfig;
use crate::config::SCHEME;
use crate::config::SERVICE_ID;
use crate::diagnostic::Diagnostic;
use crate::diagnostic::DiagnosticSender;
use crate::error::Error;
use crate::error::Result;
use crate::handler::INVALID_PARAMS;
use crate::handler::METHOD_NOT_FOUND;
use crate::handler::Target;
use crate::message::Call;
use crate::message::DeliveryFailure;
use crate::message::Message;
use crate::message::Payload;
use crate::pending::PendingCall;
use crate::pending::PendingCalls;
use crate::registry::Entry;
use crate::registry::HandlerRegistry;
use crate::transport;
use crate::transport::Inbox;
use crate::transport::Transport;

/// A local registration on its way to the worker.
pub(crate) struct Registration {
    id: String,
    target: Target,
    reply: oneshot::Sender<Result<Address>>,
}

/// Fluent builder wiring a dispatcher to its transport.
pub struct DispatcherBuilder {
    transport: Arc<dyn Transport>,
    config: DispatcherConfig,
    diagnostics: Option<DiagnosticSender>,
    registrations: Vec<(String, Target)>,
}

impl DispatcherBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: DispatcherConfig::default(),
            diagnostics: None,
            registrations: Vec::new(),
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Forwards every diagnostic to `sender` in addition to logging it.
    pub fn diagnostics(mut self, sender: DiagnosticSender) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    /// Registers `target` under `id` before the dispatcher starts.
    pub fn register(mut self, id: impl Into<String>, target: impl Into<Target>) -> Self {
        self.registrations.push((id.into(), target.into()));
        self
    }

    /// Binds the inbox to the `rmi` scheme, schedules the cleanup tick and
    /// applies the queued registrations.
    ///
    /// The cleanup schedule is owned by the transport; `LocalTransport` needs a
    /// tokio runtime to be running.
    pub fn build(self) -> Result<(Dispatcher, DispatcherHandle)> {
        let address = Address::new(SCHEME, SERVICE_ID);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let cancel = Arc::new(Notify::new());

        self.transport.register(SCHEME, inbox_tx.clone())?;
        self.transport.send_every(
            Message::to(address.clone(), Payload::CleanupTick),
            self.config.cleanup_interval,
            self.config.cleanup_interval,
        )?;

        let mut handlers = HandlerRegistry::new();
        for (id, target) in self.registrations {
            let registered = handlers.register(&id, target)?;
            debug!(address = %registered, "registered handler");
        }

        let dispatcher = Dispatcher {
            address: address.clone(),
            transport: self.transport,
            config: self.config,
            inbox: inbox_rx,
            control: control_rx,
            cancel: Arc::clone(&cancel),
            handlers,
            pending: PendingCalls::new(),
            diagnostics: self.diagnostics,
        };

        let handle = DispatcherHandle {
            address,
            inbox: inbox_tx,
            control: control_tx,
            cancel,
        };

        Ok((dispatcher, handle))
    }
}

/// Cloneable front door to a running dispatcher.
///
/// Everything goes through the dispatcher's queues; nothing here touches its
/// state directly.
#[derive(Clone)]
pub struct DispatcherHandle {
    address: Address,
    inbox: Inbox,
    control: mpsc::UnboundedSender<Registration>,
    cancel: Arc<Notify>,
}

impl DispatcherHandle {
    /// The dispatcher's own address, `rmi:service`.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Enqueues a raw message, as a transport or an asynchronous handler would.
    pub fn send(&self, message: Message) -> Result<()> {
        self.inbox.send(message).map_err(|_| Error::Closed)
    }

    /// Enqueues an outbound call.
    pub fn call(&self, call: Call) -> Result<()> {
        self.send(Message::to(self.address.clone(), Payload::Call(call)))
    }

    /// Registers `target` under `id` and returns its `rmi:<id>` address.
    pub async fn register(&self, id: impl Into<String>, target: impl Into<Target>) -> Result<Address> {
        let (reply, answer) = oneshot::channel();
        let registration = Registration {
            id: id.into(),
            target: target.into(),
            reply,
        };
        self.control.send(registration).map_err(|_| Error::Closed)?;
        answer.await.map_err(|_| Error::Closed)?
    }

    /// Stops the dispatcher after the message it is currently processing.
    /// Messages still queued are abandoned.
    pub fn shutdown(&self) {
        self.cancel.notify_one();
    }
}

/// The dispatch actor. Build it with [`DispatcherBuilder`], then `run` or
/// `spawn` it.
pub struct Dispatcher {
    address: Address,
    transport: Arc<dyn Transport>,
    config: DispatcherConfig,
    inbox: mpsc::UnboundedReceiver<Message>,
    control: mpsc::UnboundedReceiver<Registration>,
    cancel: Arc<Notify>,
    handlers: HandlerRegistry,
    pending: PendingCalls,
    diagnostics: Option<DiagnosticSender>,
}

impl Dispatcher {
    pub fn builder(transport: Arc<dyn Transport>) -> DispatcherBuilder {
        DispatcherBuilder::new(transport)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drains the inbox until cancelled, told to shut down, or every producer
    /// has gone away. Handlers are torn down on the way out.
    pub async fn run(mut self) {
        info!(address = %self.address, "dispatcher started");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.notified() => {
                    debug!("dispatcher cancelled");
                    break;
                }

                Some(registration) = self.control.recv() => {
                    self.on_register(registration);
                }

                inbound = self.inbox.recv() => {
                    let Some(message) = inbound else {
                        debug!("inbox closed");
                        break;
                    };
                    if self.process(message).await.is_break() {
                        break;
                    }
                }
            }
        }

        self.handlers.shutdown();
        info!(address = %self.address, pending = self.pending.len(), "dispatcher stopped");
    }

    pub(crate) async fn process(&mut self, message: Message) -> ControlFlow<()> {
        trace!(%message, "processing");
        let Message { source, destinations, payload } = message;

        match payload {
            Payload::Call(call) => self.on_call(call).await,
            Payload::Request(request) => self.on_request(request, source, destinations).await,
            Payload::Response(response) => self.on_response(response),
            Payload::DeliveryFailure(failure) => self.on_delivery_failure(failure),
            Payload::CleanupTick => self.on_cleanup_tick(),
            Payload::Shutdown => {
                debug!("shutdown requested");
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    pub(crate) fn on_register(&mut self, registration: Registration) {
        let Registration { id, target, reply } = registration;
        let result = self.handlers.register(&id, target);
        match &result {
            Ok(address) => debug!(%address, "registered handler"),
            Err(e) => warn!(id, error = %e, "registration rejected"),
        }
        let _ = reply.send(result);
    }

    async fn on_call(&mut self, mut call: Call) {
        if call.targets.is_empty() {
            self.report(Diagnostic::MissingDestination { method: call.method });
            return;
        }

        let sent_at = Instant::now();
        call.sent_at = Some(sent_at);

        // Register before sending: the reply may be queued before we loop again.
        let id = call.callback.take().map(|callback| {
            self.pending.insert(PendingCall {
                callback,
                method: call.method.clone(),
                sent_at,
            })
        });

        let Call { targets, method, params, .. } = call;
        debug!(method, id, "sending call");
        let request = RpcRequest::new(method.clone(), params, id);
        let message = Message::new(
            Some(Route::to(self.address.clone())),
            targets.clone(),
            Payload::Request(request),
        );

        // A refused request is answered like one that bounced.
        if let Err(e) = self.send(message).await {
            match id {
                Some(id) => self.on_response(RpcResponse::err(Some(id), unreachable(&targets))),
                None => self.report(Diagnostic::NotificationUndeliverable { method, reason: e.to_string() }),
            }
        }
    }

    async fn on_request(&mut self, request: RpcRequest, source: Option<Route>, destinations: Vec<Route>) {
        let Some(target) = destinations.first().and_then(Route::first).cloned() else {
            self.report(Diagnostic::MissingDestination { method: request.method });
            return;
        };

        let method = request.method.clone();
        let response = match self.handlers.resolve(target.id()) {
            Some(Entry::Handler(handler)) => handler.handle_request(request, &target, source.as_ref()),
            Some(Entry::Service) => Some(serve(request)),
            None => Some(RpcResponse::err(
                request.id,
                RpcError::new(ErrorKind::TargetNotFound, target.to_string()),
            )),
        };

        let Some(response) = response else { return };

        match (response.id, source) {
            (Some(id), Some(reply_to)) => {
                let message = Message::new(
                    Some(Route::to(self.address.clone())),
                    vec![reply_to],
                    Payload::Response(response),
                );
                if let Err(e) = self.send(message).await {
                    self.report(Diagnostic::ResponseUndeliverable { id: Some(id), reason: e.to_string() });
                }
            }
            (Some(id), None) => self.report(Diagnostic::NoReplyRoute { target, id }),
            (None, _) => {
                if let Err(error) = response.outcome {
                    self.report(Diagnostic::NotificationFailed { target, method, error });
                }
            }
        }
    }

    fn on_response(&mut self, response: RpcResponse) {
        let Some(id) = response.id else {
            self.report(Diagnostic::UncorrelatedResponse);
            return;
        };

        // Matching consumes the id, so a duplicate delivery lands in the orphan branch.
        let Some(call) = self.pending.take(id) else {
            self.report(Diagnostic::OrphanedResponse { id });
            return;
        };

        let callback = call.callback;
        match self.handlers.resolve(callback.target.id()) {
            Some(Entry::Handler(handler)) => {
                trace!(id, method = %call.method, "completing callback");
                handler.handle_response(response, &callback);
            }
            Some(Entry::Service) | None => {
                self.report(Diagnostic::CallbackTargetMissing { target: callback.target, id });
            }
        }
    }

    fn on_delivery_failure(&mut self, failure: DeliveryFailure) {
        let DeliveryFailure { message, reason } = failure;
        let Message { destinations, payload, .. } = *message;

        match payload {
            Payload::Request(RpcRequest { id: Some(id), .. }) => {
                debug!(id, %reason, "request undeliverable");
                self.on_response(RpcResponse::err(Some(id), unreachable(&destinations)));
            }
            Payload::Request(request) => {
                self.report(Diagnostic::NotificationUndeliverable { method: request.method, reason });
            }
            Payload::Response(response) => {
                self.report(Diagnostic::ResponseUndeliverable { id: response.id, reason });
            }
            other => {
                self.report(Diagnostic::UnexpectedFailure { kind: other.kind(), reason });
            }
        }
    }

    fn on_cleanup_tick(&mut self) {
        let expired = self.pending.sweep(Instant::now(), self.config.call_expiry);
        if expired > 0 {
            debug!(expired, remaining = self.pending.len(), "expired pending calls");
        }
        self.handlers.periodic_cleanup();
    }

    async fn send(&mut self, message: Message) -> transport::Result<()> {
        let result = self.transport.send(message).await;
        if let Err(e) = &result {
            warn!(error = %e, "transport rejected message");
        }
        result
    }

    fn report(&self, diagnostic: Diagnostic) {
        diagnostic.log();
        if let Some(observer) = &self.diagnostics {
            let _ = observer.send(diagnostic);
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> &PendingCalls {
        &self.pending
    }

    #[cfg(test)]
    pub(crate) fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }
}

/// `UNREACHABLE`, carrying the routes that could not be reached.
fn unreachable(routes: &[Route]) -> RpcError {
    let routes: Vec<Value> = routes.iter().map(|route| Value::from(route.to_string())).collect();
    RpcError::new(ErrorKind::Unreachable, routes)
}

/// Wire requests addressed to the dispatcher's own service.
///
/// `rmi:service` is a registered target like any other, but its `register`
/// method takes a live handler object, which cannot travel in a request. Over
/// the wire it therefore always fails with `INVALID_PARAMS`; in-process
/// callers register through [`DispatcherHandle::register`], which reaches the
/// same registry from the worker task.
fn serve(request: RpcRequest) -> RpcResponse {
    let error = match request.method.as_str() {
        "register" => RpcError::new(
            ErrorKind::Other(INVALID_PARAMS.into()),
            "register takes a local target; use DispatcherHandle::register",
        ),
        other => RpcError::new(
            ErrorKind::Other(METHOD_NOT_FOUND.into()),
            vec![Value::from(format!("{}:{}", SCHEME, SERVICE_ID)), Value::from(other)],
        ),
    };
    RpcResponse::err(request.id, error)
}
