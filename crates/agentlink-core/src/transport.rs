//! Outbound side of the peer channel.

use agentlink_types::{Signal, TransportError};
use tokio::sync::mpsc;

/// Delivers signals to the remote peer.
pub trait SignalSink: Send + Sync {
    fn send(&self, signal: Signal) -> Result<(), TransportError>;

    /// Called once a dispatch learns its session identity. Transports that
    /// route per session can use it; the default ignores it.
    fn bind_session(&self, _session_id: &str) {}
}

/// Best-effort send: transport failures are logged and dropped so that
/// translation never stops on a send error.
pub fn emit(sink: &dyn SignalSink, signal: Signal) {
    let name = signal.name();
    if let Err(e) = sink.send(signal) {
        tracing::debug!(signal = name, error = %e, "dropping signal");
    }
}

/// Encodes each signal as one JSON line and queues it for a writer task.
#[derive(Clone)]
pub struct LineSink {
    tx: mpsc::UnboundedSender<String>,
}

impl LineSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl SignalSink for LineSink {
    fn send(&self, signal: Signal) -> Result<(), TransportError> {
        let line = serde_json::to_string(&signal)?;
        self.tx.send(line).map_err(|_| TransportError::Closed)
    }
}
