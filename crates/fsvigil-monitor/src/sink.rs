//! Event sinks: how collaborators receive the event stream.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use fsvigil_core::Event;

/// Receiver of monitor output.
///
/// `handle` is called once per event, in emission order, from whichever
/// thread emitted it. Implementations must not block for long and must not
/// call back into the monitor's `add_path`.
pub trait EventSink: Send + Sync {
    /// Receive one event.
    fn handle(&self, event: &Event);

    /// The monitored path display should be redrawn.
    fn refresh_paths(&self) {}

    /// Statistics were cleared; drop any displayed log.
    fn logs_cleared(&self) {}
}

impl<F> EventSink for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle(&self, event: &Event) {
        self(event)
    }
}

/// Forwards events onto an unbounded channel for consumers on another task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn handle(&self, event: &Event) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}

/// In-memory event log, cleared together with the statistics.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<Event>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every logged event, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of logged events.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn handle(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn logs_cleared(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
