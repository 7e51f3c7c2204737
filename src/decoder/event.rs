//! Decoder events
//!
//! Fan-out of lifecycle and diagnostic notifications over a
//! `tokio::sync::broadcast` channel. Sending never blocks the producer;
//! receivers that fall behind observe `RecvError::Lagged`.

use tokio::sync::broadcast;

/// Notification emitted by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    /// A frame was stored; `sequence` frames have been produced so far
    FrameDecoded { sequence: u64, pts: i64 },
    /// Dumping the frame failed; decoding continued
    DiagnosticWriteFailed { sequence: u64, error: String },
    /// A consumer identity was added to the registry
    ConsumerRegistered { consumer: String },
    /// A consumer identity was removed from the registry
    ConsumerRemoved { consumer: String },
    /// The decoder was closed
    Closed { frames_decoded: u64 },
}

/// Sender side of the event channel
#[derive(Debug)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<DecoderEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<DecoderEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of receivers, or 0 if there are none
    pub(crate) fn send(&self, event: DecoderEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}
