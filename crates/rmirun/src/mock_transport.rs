//! Mock transports for testing.
//!
//! These are used internally by the test suite and are not part of the public API.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::message::Message;
use crate::transport;
use crate::transport::Inbox;
use crate::transport::Transport;

/// A transport that delivers nothing and remembers everything.
///
/// Sent messages, scheme registrations and recurring schedules are kept for
/// inspection. Cloning shares the recordings.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Message>>>,
    registered: Arc<std::sync::Mutex<Vec<String>>>,
    schedules: Arc<std::sync::Mutex<Vec<(Message, Duration, Duration)>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns every message sent so far.
    pub async fn take_sent(&self) -> Vec<Message> {
        std::mem::take(&mut *self.sent.lock().await)
    }

    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }

    pub fn schedules(&self) -> Vec<(Message, Duration, Duration)> {
        self.schedules.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    fn register(&self, scheme: &str, _inbox: Inbox) -> transport::Result<()> {
        self.registered.lock().unwrap().push(scheme.to_string());
        Ok(())
    }

    async fn send(&self, message: Message) -> transport::Result<()> {
        self.sent.lock().await.push(message);
        Ok(())
    }

    fn send_every(&self, message: Message, initial_delay: Duration, period: Duration) -> transport::Result<()> {
        self.schedules.lock().unwrap().push((message, initial_delay, period));
        Ok(())
    }
}

/// A transport that refuses everything after registration.
pub struct RefusingTransport;

#[async_trait::async_trait]
impl Transport for RefusingTransport {
    fn register(&self, _scheme: &str, _inbox: Inbox) -> transport::Result<()> {
        Ok(())
    }

    async fn send(&self, _message: Message) -> transport::Result<()> {
        Err(transport::Error::Io("refused".into()))
    }

    fn send_every(&self, _message: Message, _initial_delay: Duration, _period: Duration) -> transport::Result<()> {
        Err(transport::Error::Io("no timers here".into()))
    }
}

/// A transport that sets up fine but rejects every send.
pub struct DownTransport;

#[async_trait::async_trait]
impl Transport for DownTransport {
    fn register(&self, _scheme: &str, _inbox: Inbox) -> transport::Result<()> {
        Ok(())
    }

    async fn send(&self, _message: Message) -> transport::Result<()> {
        Err(transport::Error::Io("down".into()))
    }

    fn send_every(&self, _message: Message, _initial_delay: Duration, _period: Duration) -> transport::Result<()> {
        Ok(())
    }
}
