//! Named frame consumer
//!
//! A `FrameConsumer` is a registration on a shared decoder. Dropping it
//! releases the registration, so long-running services do not accumulate
//! stale identities.

use std::sync::Arc;
use std::time::Duration;

use super::error::Result;
use super::facade::Decoder;
use crate::registry::{Delivery, WaitHandoff};

/// Registered reader of decoded frames
#[derive(Debug)]
pub struct FrameConsumer {
    decoder: Arc<Decoder>,
    id: String,
}

impl FrameConsumer {
    pub(super) fn new(decoder: Arc<Decoder>, id: String) -> Self {
        Self { decoder, id }
    }

    /// Consumer identity
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The decoder this consumer reads from
    pub fn decoder(&self) -> &Arc<Decoder> {
        &self.decoder
    }

    /// Block until the next frame, then read at `offset`
    pub fn recv(&self, offset: i64) -> Result<Delivery> {
        self.decoder.get_frame(offset, &self.id)
    }

    /// Like [`FrameConsumer::recv`], giving up after `timeout`
    pub fn recv_timeout(&self, offset: i64, timeout: Duration) -> Result<Delivery> {
        self.decoder.get_frame_timeout(offset, &self.id, timeout)
    }

    /// Wait for the next frame from async code
    ///
    /// The wait runs on the blocking pool. If the future is dropped first
    /// (a `select!` branch losing, a `timeout` firing), the blocking wait is
    /// abandoned and a signal it already took is restored, so the next
    /// receive still gets the frame.
    pub async fn recv_async(&self, offset: i64) -> Result<Delivery> {
        let handoff = Arc::new(WaitHandoff::new());
        let mut guard = AbandonOnDrop {
            consumer: self,
            handoff: Arc::clone(&handoff),
            armed: true,
        };

        let decoder = Arc::clone(&self.decoder);
        let id = self.id.clone();
        let joined =
            tokio::task::spawn_blocking(move || decoder.wait_with_handoff(offset, &id, &handoff))
                .await;
        guard.armed = false;

        let delivery = joined??;
        self.decoder.count_delivery(&delivery);
        Ok(delivery)
    }
}

/// Abandons an in-flight async wait unless the result reached the caller
struct AbandonOnDrop<'a> {
    consumer: &'a FrameConsumer,
    handoff: Arc<WaitHandoff>,
    armed: bool,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(consumer = %self.consumer.id, "Async frame wait abandoned");
            self.consumer
                .decoder
                .abandon_wait(&self.consumer.id, &self.handoff);
        }
    }
}

impl Drop for FrameConsumer {
    fn drop(&mut self) {
        if let Err(e) = self.decoder.unregister_consumer(&self.id) {
            tracing::debug!(consumer = %self.id, error = %e, "Consumer already gone");
        }
    }
}
