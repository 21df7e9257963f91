//! Human-readable notifications pushed to the host application.

use log::info;
use std::sync::mpsc::Sender;

/// Receives one string per notable event. Called concurrently from every
/// connection handler; implementations must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: String);
}

/// Forwards events into an unbounded channel drained by the host.
pub struct ChannelSink {
    tx: Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: String) {
        // The host may have stopped listening.
        let _ = self.tx.send(event);
    }
}

/// Writes events to the log.
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: String) {
        info!("{event}");
    }
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: String) {}
}
