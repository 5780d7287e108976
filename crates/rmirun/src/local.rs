//! # In-process transport
//!
//! [`LocalTransport`] connects dispatchers (and anything else holding an inbox)
//! living in the same process. Each destination route is delivered to the inbox
//! registered for the scheme of its first hop. When that fails the message is
//! narrowed to the failed route and handed back to the inbox of its source
//! scheme as a `DeliveryFailure`.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::message::DeliveryFailure;
use crate::message::Message;
use crate::message::Payload;
use crate::transport::Error;
use crate::transport::Inbox;
use crate::transport::Result;
use crate::transport::Transport;

/// Scheme-routed delivery between inboxes of one process.
///
/// Recurring deliveries scheduled with `send_every` run on the ambient tokio
/// runtime and are aborted when the transport is dropped.
#[derive(Default)]
pub struct LocalTransport {
    inboxes: Arc<DashMap<String, Inbox>>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        if let Ok(timers) = self.timers.get_mut() {
            for timer in timers.drain(..) {
                timer.abort();
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    fn register(&self, scheme: &str, inbox: Inbox) -> Result<()> {
        if self.inboxes.insert(scheme.to_string(), inbox).is_some() {
            debug!(scheme, "replaced inbox");
        }
        Ok(())
    }

    async fn send(&self, message: Message) -> Result<()> {
        deliver(&self.inboxes, message);
        Ok(())
    }

    fn send_every(&self, message: Message, initial_delay: Duration, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(Error::Io("recurring delivery needs a non-zero period".into()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Io(format!("no tokio runtime for recurring delivery: {}", e)))?;

        let inboxes = Arc::clone(&self.inboxes);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if deliver(&inboxes, message.clone()) == 0 {
                    debug!(%message, "recurring delivery has no live inbox left, stopping");
                    break;
                }
            }
        });

        self.timers
            .lock()
            .map_err(|_| Error::Io("timer registry poisoned".into()))?
            .push(timer);
        Ok(())
    }
}

/// Delivers one copy per destination route. Returns how many copies landed.
fn deliver(inboxes: &DashMap<String, Inbox>, message: Message) -> usize {
    let mut delivered = 0;

    for route in &message.destinations {
        let narrowed = Message::new(message.source.clone(), vec![route.clone()], message.payload.clone());

        let outcome = match route.first() {
            Some(hop) => push(inboxes, hop.scheme(), narrowed),
            None => Err((narrowed, Error::Io("route has no hops".into()))),
        };

        match outcome {
            Ok(()) => delivered += 1,
            Err((undelivered, error)) => bounce(inboxes, undelivered, error),
        }
    }

    delivered
}

fn push(
    inboxes: &DashMap<String, Inbox>,
    scheme: &str,
    message: Message,
) -> std::result::Result<(), (Message, Error)> {
    let Some(inbox) = inboxes.get(scheme) else {
        return Err((message, Error::UnknownScheme(scheme.to_string())));
    };

    trace!(%message, "delivering");
    inbox
        .send(message)
        .map_err(|mpsc::error::SendError(message)| (message, Error::InboxClosed(scheme.to_string())))
}

/// Returns an undeliverable message to the inbox of its source scheme.
fn bounce(inboxes: &DashMap<String, Inbox>, message: Message, error: Error) {
    if let Payload::DeliveryFailure(_) = message.payload {
        warn!(%message, %error, "dropping undeliverable delivery failure");
        return;
    }

    let Some(source) = message.source.clone() else {
        debug!(%message, %error, "dropping undeliverable message without source");
        return;
    };

    let Some(scheme) = source.first().map(|hop| hop.scheme().to_string()) else {
        debug!(%message, %error, "dropping undeliverable message with empty source route");
        return;
    };

    debug!(%message, %error, "bouncing undeliverable message");
    let failure = Message::new(
        None,
        vec![source],
        Payload::DeliveryFailure(DeliveryFailure::new(message, error.to_string())),
    );

    if let Err((_, error)) = push(inboxes, &scheme, failure) {
        warn!(%error, "delivery failure could not be returned to sender");
    }
}

#[cfg(test)]
mod tests {
    use rmiwire::Address;
    use rmiwire::Route;
    use rmiwire::RpcRequest;

    use super::*;

    fn request_to(dest: Address) -> Message {
        Message::to(dest, Payload::Request(RpcRequest::new("ping", vec![], Some(1))))
            .from_route(Route::to(Address::new("rmi", "service")))
    }

    #[tokio::test]
    async fn test_routes_by_scheme_of_first_hop() {
        let transport = LocalTransport::new();
        let (rmi_tx, mut rmi_rx) = mpsc::unbounded_channel();
        let (ipc_tx, mut ipc_rx) = mpsc::unbounded_channel();
        transport.register("rmi", rmi_tx).unwrap();
        transport.register("ipc", ipc_tx).unwrap();

        transport.send(request_to(Address::new("ipc", "calc"))).await.unwrap();

        let got = ipc_rx.try_recv().expect("ipc inbox should receive the request");
        assert_eq!(got.primary_destination(), Some(&Address::new("ipc", "calc")));
        assert!(rmi_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fans_out_one_copy_per_route() {
        let transport = LocalTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.register("rmi", tx).unwrap();

        let msg = Message::new(
            None,
            vec![Route::to(Address::new("rmi", "a")), Route::to(Address::new("rmi", "b"))],
            Payload::CleanupTick,
        );
        transport.send(msg).await.unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.destinations, vec![Route::to(Address::new("rmi", "a"))]);
        assert_eq!(second.destinations, vec![Route::to(Address::new("rmi", "b"))]);
    }

    #[tokio::test]
    async fn test_unknown_scheme_bounces_to_source() {
        let transport = LocalTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.register("rmi", tx).unwrap();

        transport.send(request_to(Address::new("tcp", "nowhere"))).await.unwrap();

        let bounced = rx.try_recv().expect("failure should come back to rmi");
        let Payload::DeliveryFailure(failure) = bounced.payload else {
            panic!("expected delivery failure, got {}", bounced.payload.kind());
        };
        assert_eq!(failure.message.primary_destination(), Some(&Address::new("tcp", "nowhere")));
        assert!(failure.reason.contains("tcp"));
    }

    #[tokio::test]
    async fn test_closed_inbox_bounces_once_to_source() {
        let transport = LocalTransport::new();
        let (rmi_tx, mut rmi_rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        transport.register("rmi", rmi_tx).unwrap();
        transport.register("ipc", dead_tx).unwrap();

        transport.send(request_to(Address::new("ipc", "calc"))).await.unwrap();

        let bounced = rmi_rx.try_recv().expect("failure should come back to rmi");
        let Payload::DeliveryFailure(failure) = bounced.payload else {
            panic!("expected delivery failure, got {}", bounced.payload.kind());
        };
        assert_eq!(failure.message.primary_destination(), Some(&Address::new("ipc", "calc")));
        assert!(failure.reason.contains("ipc"));
        assert!(rmi_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_undeliverable_failure_is_dropped_not_bounced() {
        let transport = LocalTransport::new();
        let (rmi_tx, mut rmi_rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        transport.register("rmi", rmi_tx).unwrap();
        transport.register("ipc", dead_tx).unwrap();

        let original = request_to(Address::new("tcp", "nowhere"));
        let failure = Message::to(
            Address::new("ipc", "calc"),
            Payload::DeliveryFailure(DeliveryFailure::new(original, "unreachable")),
        )
        .from_route(Route::to(Address::new("rmi", "service")));
        transport.send(failure).await.unwrap();

        // The source scheme is live, yet nothing comes back.
        assert!(rmi_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_every_delivers_after_delay_then_periodically() {
        let transport = LocalTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.register("rmi", tx).unwrap();

        let tick = Message::to(Address::new("rmi", "service"), Payload::CleanupTick);
        transport
            .send_every(tick, Duration::from_secs(30), Duration::from_secs(30))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.try_recv().map(|m| m.payload), Ok(Payload::CleanupTick));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv().map(|m| m.payload), Ok(Payload::CleanupTick));
    }

    #[test]
    fn test_send_every_rejects_zero_period() {
        let transport = LocalTransport::new();
        let tick = Message::to(Address::new("rmi", "service"), Payload::CleanupTick);
        assert!(transport.send_every(tick, Duration::ZERO, Duration::ZERO).is_err());
    }
}
