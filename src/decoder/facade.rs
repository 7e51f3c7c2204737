//! Decoder facade
//!
//! Drives the backend from the producer thread, stores each decoded frame in
//! the ring and wakes the consumers.
//!
//! Two locks are involved and always taken in this order:
//! - the producer lock, held for the whole `decode` call (backend work,
//!   publish, diagnostics). Consumers never take it.
//! - the monitor lock, held only inside `SyncMonitor` for bookkeeping.
//!
//! `close` releases the monitor lock before taking the producer lock, so a
//! decode in flight finishes (and finds the monitor closed) before teardown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::config::DecoderConfig;
use super::consumer::FrameConsumer;
use super::error::{DecoderError, InitStage, Result};
use super::event::{DecoderEvent, EventBus};
use crate::backend::{Accelerator, BackendError, DecodeBackend, DeviceContext, SubmitOutcome};
use crate::dump::{DiagnosticError, DiagnosticSink, Nv12FileSink};
use crate::frame::{DecodedFrame, FrameHandle, Packet, StreamParameters};
use crate::registry::{Delivery, SyncMonitor, Unregistered, WaitHandoff};
use crate::stats::{DecoderCounters, DecoderStats};

/// Result of feeding one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A frame was stored; `sequence` frames have been produced so far
    Decoded { sequence: u64 },
    /// The backend needs more input before it can output a frame
    NeedMoreInput,
    /// The backend is fully drained
    EndOfStream,
}

impl DecodeStatus {
    /// Check if a frame was produced
    pub fn is_decoded(&self) -> bool {
        matches!(self, DecodeStatus::Decoded { .. })
    }
}

/// Resources owned by the producer side
struct Producer {
    backend: Box<dyn DecodeBackend>,
    device: DeviceContext,
    dump: Option<Box<dyn DiagnosticSink>>,
}

/// Frame-delivery core: one producer, many named consumers
///
/// Share it between threads with `Arc<Decoder>`.
pub struct Decoder {
    config: DecoderConfig,
    monitor: SyncMonitor,
    producer: Mutex<Option<Producer>>,
    accelerator: Arc<dyn Accelerator>,
    counters: DecoderCounters,
    events: EventBus,
}

impl Decoder {
    /// Attach the device, open the backend and size the ring
    ///
    /// With diagnostics enabled the dump file at `config.dump_path` is
    /// created as well. Stops at the first failing step and releases what
    /// earlier steps acquired.
    pub fn init<B: DecodeBackend>(
        config: DecoderConfig,
        params: &StreamParameters,
        backend: B,
        accelerator: Arc<dyn Accelerator>,
    ) -> Result<Self> {
        Self::start(config, params, Box::new(backend), accelerator, None)
    }

    /// Like [`Decoder::init`], dumping into `sink` instead of a file
    ///
    /// Diagnostics are enabled regardless of the config flag.
    pub fn init_with_sink<B: DecodeBackend>(
        config: DecoderConfig,
        params: &StreamParameters,
        backend: B,
        accelerator: Arc<dyn Accelerator>,
        sink: Box<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let config = config.enable_diagnostics();
        Self::start(config, params, Box::new(backend), accelerator, Some(sink))
    }

    fn start(
        config: DecoderConfig,
        params: &StreamParameters,
        mut backend: Box<dyn DecodeBackend>,
        accelerator: Arc<dyn Accelerator>,
        sink: Option<Box<dyn DiagnosticSink>>,
    ) -> Result<Self> {
        config.validate()?;

        let device = accelerator
            .attach()
            .map_err(|e| DecoderError::init(InitStage::Device, e))?;

        if let Err(e) = backend.open(params, &device) {
            accelerator.detach(device);
            return Err(DecoderError::init(InitStage::Backend, e));
        }

        let dump = match sink {
            Some(sink) => Some(sink),
            None if config.diagnostics_enabled => match Nv12FileSink::create(&config.dump_path) {
                Ok(sink) => Some(Box::new(sink) as Box<dyn DiagnosticSink>),
                Err(e) => {
                    backend.close();
                    accelerator.detach(device);
                    return Err(DecoderError::init(InitStage::DumpSink, BackendError::Io(e)));
                }
            },
            None => None,
        };

        tracing::info!(
            backend = backend.name(),
            codec = ?params.codec,
            width = params.width,
            height = params.height,
            device = ?device.kind,
            capacity = config.buffer_capacity,
            diagnostics = dump.is_some(),
            "Decoder initialized"
        );

        Ok(Self {
            monitor: SyncMonitor::new(config.buffer_capacity),
            producer: Mutex::new(Some(Producer {
                backend,
                device,
                dump,
            })),
            accelerator,
            counters: DecoderCounters::new(),
            events: EventBus::new(config.event_capacity),
            config,
        })
    }

    /// Get the decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Feed one packet to the backend
    ///
    /// When the backend yields a frame it is stored at slot
    /// `sequence % capacity`, the sequence counter advances and every
    /// consumer is flagged and woken. Never waits for consumers.
    pub fn decode(&self, packet: Packet) -> Result<DecodeStatus> {
        let mut guard = self.producer.lock();
        let producer = guard.as_mut().ok_or(DecoderError::Closed)?;

        DecoderCounters::bump(&self.counters.packets_submitted);
        let packet_pts = packet.pts;

        let frame = match producer.backend.submit(packet) {
            Ok(SubmitOutcome::Ready(frame)) => frame,
            Ok(SubmitOutcome::NeedMoreInput) => {
                DecoderCounters::bump(&self.counters.not_ready);
                tracing::trace!(pts = packet_pts, "Backend needs more input");
                return Ok(DecodeStatus::NeedMoreInput);
            }
            Ok(SubmitOutcome::EndOfStream) => {
                DecoderCounters::bump(&self.counters.not_ready);
                tracing::debug!("Backend reached end of stream");
                return Ok(DecodeStatus::EndOfStream);
            }
            Err(e) => {
                DecoderCounters::bump(&self.counters.decode_errors);
                tracing::error!(
                    backend = producer.backend.name(),
                    pts = packet_pts,
                    error = %e,
                    "Decode failed"
                );
                return Err(DecoderError::Decode(e));
            }
        };

        let pts = frame.pts;
        let handle = FrameHandle::new(frame);
        let dump_ref = producer.dump.is_some().then(|| handle.acquire_ref());

        let sequence = self.monitor.publish(handle).ok_or(DecoderError::Closed)?;
        tracing::trace!(sequence = sequence, pts = pts, "Frame published");
        self.events.send(DecoderEvent::FrameDecoded { sequence, pts });

        if let Some(frame) = dump_ref {
            self.dump_frame(producer, sequence, &frame);
        }

        Ok(DecodeStatus::Decoded { sequence })
    }

    /// Copy a published frame to the dump sink, reporting failures
    fn dump_frame(&self, producer: &mut Producer, sequence: u64, frame: &DecodedFrame) {
        let Producer { backend, dump, .. } = producer;
        let Some(sink) = dump.as_mut() else {
            return;
        };

        let result = if frame.is_device_resident() {
            backend
                .transfer_to_host(frame)
                .map_err(DiagnosticError::from)
                .and_then(|host| sink.write_frame(&host))
        } else {
            sink.write_frame(frame)
        };

        match result {
            Ok(()) => DecoderCounters::bump(&self.counters.frames_dumped),
            Err(e) => {
                DecoderCounters::bump(&self.counters.dump_failures);
                tracing::warn!(sequence = sequence, error = %e, "Frame dump failed");
                self.events.send(DecoderEvent::DiagnosticWriteFailed {
                    sequence,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Wait for the next frame signal for `consumer`, then read at `offset`
    ///
    /// `offset` counts frames behind the newest: `0` is the newest, `-k` is
    /// `k` frames older. Positive values are treated as `0`. Unseen
    /// identities are registered and wait for the next decoded frame.
    ///
    /// Returns `Delivery::Repeat` when no frame exists at the offset (too
    /// deep, or not produced yet); the signal is consumed either way.
    pub fn get_frame(&self, offset: i64, consumer: &str) -> Result<Delivery> {
        self.ensure_consumer(consumer)?;
        let delivery = self.monitor.wait_for_frame(consumer, offset, None)?;
        self.count_delivery(&delivery);
        Ok(delivery)
    }

    /// Like [`Decoder::get_frame`], giving up after `timeout`
    pub fn get_frame_timeout(
        &self,
        offset: i64,
        consumer: &str,
        timeout: Duration,
    ) -> Result<Delivery> {
        let deadline = Instant::now() + timeout;
        self.ensure_consumer(consumer)?;
        let delivery = self.monitor.wait_for_frame(consumer, offset, Some(deadline))?;
        self.count_delivery(&delivery);
        Ok(delivery)
    }

    /// Blocking half of an async receive; the caller counts the delivery
    pub(super) fn wait_with_handoff(
        &self,
        offset: i64,
        consumer: &str,
        handoff: &WaitHandoff,
    ) -> Result<Delivery> {
        self.ensure_consumer(consumer)?;
        self.monitor.wait_with_handoff(consumer, offset, handoff)
    }

    /// The receiver of an async wait went away
    pub(super) fn abandon_wait(&self, consumer: &str, handoff: &WaitHandoff) {
        self.monitor.abandon(consumer, handoff);
    }

    /// Lazily register an unseen identity, reporting it like an explicit one
    fn ensure_consumer(&self, consumer: &str) -> Result<()> {
        if self.monitor.ensure(consumer)? {
            tracing::info!(consumer = consumer, "Consumer registered on first request");
            self.events.send(DecoderEvent::ConsumerRegistered {
                consumer: consumer.to_string(),
            });
        }
        Ok(())
    }

    pub(super) fn count_delivery(&self, delivery: &Delivery) {
        match delivery {
            Delivery::Frame { .. } => DecoderCounters::bump(&self.counters.deliveries),
            Delivery::Repeat => DecoderCounters::bump(&self.counters.repeats),
        }
    }

    /// Add a registration for `consumer`
    ///
    /// The identity starts with no pending frame. Registrations are counted;
    /// the entry stays until every registration is dropped.
    pub fn register_consumer(&self, consumer: &str) -> Result<()> {
        if self.monitor.register(consumer)? {
            tracing::info!(consumer = consumer, "Consumer registered");
            self.events.send(DecoderEvent::ConsumerRegistered {
                consumer: consumer.to_string(),
            });
        }
        Ok(())
    }

    /// Drop one registration for `consumer`
    ///
    /// A consumer blocked under a removed identity returns
    /// `ConsumerUnregistered`.
    pub fn unregister_consumer(&self, consumer: &str) -> Result<()> {
        match self.monitor.unregister(consumer) {
            Unregistered::Unknown => Err(DecoderError::ConsumerUnregistered(consumer.to_string())),
            Unregistered::Remaining(left) => {
                tracing::debug!(consumer = consumer, registrations = left, "Consumer released");
                Ok(())
            }
            Unregistered::Removed => {
                tracing::info!(consumer = consumer, "Consumer removed");
                self.events.send(DecoderEvent::ConsumerRemoved {
                    consumer: consumer.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Register `consumer` and return a handle that unregisters on drop
    pub fn subscribe(self: &Arc<Self>, consumer: impl Into<String>) -> Result<FrameConsumer> {
        let consumer = consumer.into();
        self.register_consumer(&consumer)?;
        Ok(FrameConsumer::new(Arc::clone(self), consumer))
    }

    /// Frames produced since init
    pub fn current_sequence(&self) -> u64 {
        self.monitor.sequence()
    }

    /// Check if the decoder has been closed
    pub fn is_closed(&self) -> bool {
        self.monitor.is_closed()
    }

    /// Subscribe to decoder events
    pub fn events(&self) -> broadcast::Receiver<DecoderEvent> {
        self.events.subscribe()
    }

    /// Get a statistics snapshot
    pub fn stats(&self) -> DecoderStats {
        self.counters.snapshot(self.monitor.snapshot())
    }

    /// Shut the decoder down
    ///
    /// Wakes every blocked consumer with `Closed`, releases all buffered
    /// frames, forgets all consumers, then closes the dump sink and the
    /// backend and detaches the device. Calling it again does nothing.
    pub fn close(&self) {
        if !self.monitor.close() {
            return;
        }

        let producer = self.producer.lock().take();
        if let Some(mut producer) = producer {
            if let Some(mut sink) = producer.dump.take() {
                if let Err(e) = sink.close() {
                    tracing::warn!(error = %e, "Failed to close dump sink");
                }
            }
            producer.backend.close();
            self.accelerator.detach(producer.device);
        }

        let frames_decoded = self.monitor.sequence();
        tracing::info!(frames_decoded = frames_decoded, "Decoder closed");
        self.events.send(DecoderEvent::Closed { frames_decoded });
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.monitor.snapshot();
        f.debug_struct("Decoder")
            .field("capacity", &snapshot.capacity)
            .field("sequence", &snapshot.sequence)
            .field("consumers", &snapshot.consumers)
            .field("closed", &snapshot.closed)
            .finish()
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    use bytes::Bytes;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::backend::{DeviceKind, HostAccelerator, SyntheticBackend};
    use crate::frame::CodecId;

    const WAIT: Duration = Duration::from_millis(50);

    fn params() -> StreamParameters {
        StreamParameters::new(CodecId::H264, 8, 4)
    }

    fn packet(pts: i64) -> Packet {
        Packet::new(Bytes::from_static(&[0, 0, 0, 1, 0x65]), pts, pts == 0)
    }

    fn decoder(capacity: usize) -> Arc<Decoder> {
        decoder_with(capacity, SyntheticBackend::new())
    }

    fn decoder_with(capacity: usize, backend: SyntheticBackend) -> Arc<Decoder> {
        let config = DecoderConfig::with_capacity(capacity);
        Arc::new(Decoder::init(config, &params(), backend, Arc::new(HostAccelerator)).unwrap())
    }

    fn frame_at(decoder: &Decoder, offset: i64, consumer: &str) -> (u64, FrameHandle) {
        decoder
            .get_frame_timeout(offset, consumer, WAIT)
            .unwrap()
            .into_frame()
            .expect("expected a frame")
    }

    /// Counts attach/detach calls
    #[derive(Default)]
    struct CountingAccelerator {
        attached: AtomicU32,
        detached: AtomicU32,
        fail: bool,
    }

    impl Accelerator for CountingAccelerator {
        fn attach(&self) -> std::result::Result<DeviceContext, BackendError> {
            if self.fail {
                return Err(BackendError::DeviceUnavailable("no device".into()));
            }
            self.attached.fetch_add(1, Ordering::SeqCst);
            Ok(DeviceContext::new(DeviceKind::Cuda, 0))
        }

        fn detach(&self, _context: DeviceContext) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Collects dumped frames in memory
    struct MemorySink {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        fail: bool,
    }

    impl DiagnosticSink for MemorySink {
        fn write_frame(
            &mut self,
            frame: &DecodedFrame,
        ) -> std::result::Result<(), DiagnosticError> {
            if self.fail {
                return Err(DiagnosticError::Io(std::io::Error::other("disk full")));
            }
            let mut out = Vec::new();
            crate::dump::write_nv12(&mut out, frame)?;
            self.frames.lock().push(out);
            Ok(())
        }

        fn close(&mut self) -> std::result::Result<(), DiagnosticError> {
            Ok(())
        }
    }

    #[test]
    fn test_scenario_interleaved_reads() {
        // capacity 4, six decodes, one read after each
        let decoder = decoder(4);
        decoder.register_consumer("reader").unwrap();

        let mut observed = Vec::new();
        for pts in 0..6 {
            assert_eq!(
                decoder.decode(packet(pts)).unwrap(),
                DecodeStatus::Decoded {
                    sequence: pts as u64 + 1
                }
            );
            let (sequence, frame) = frame_at(&decoder, 0, "reader");
            assert_eq!(frame.pts, pts);
            observed.push(sequence);
        }

        assert_eq!(observed, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_scenario_look_back_before_history() {
        let decoder = decoder(2);
        decoder.register_consumer("reader").unwrap();
        decoder.decode(packet(0)).unwrap();

        let delivery = decoder.get_frame_timeout(-1, "reader", WAIT).unwrap();
        assert!(delivery.is_repeat());
        assert_eq!(decoder.stats().repeats, 1);
    }

    #[test]
    fn test_scenario_two_consumers_same_frame() {
        let decoder = decoder(4);
        decoder.register_consumer("A").unwrap();
        decoder.register_consumer("B").unwrap();

        decoder.decode(packet(0)).unwrap();

        let (seq_a, frame_a) = frame_at(&decoder, 0, "A");
        let (seq_b, frame_b) = frame_at(&decoder, 0, "B");
        assert_eq!(seq_a, 1);
        assert_eq!(seq_a, seq_b);
        assert!(frame_a.same_frame(&frame_b));
        assert_eq!(frame_a.planes[0].data, frame_b.planes[0].data);
    }

    #[test]
    fn test_exactly_once_delivery_across_threads() {
        const FRAMES: u64 = 50;
        let decoder = decoder(8);
        decoder.register_consumer("reader").unwrap();

        let (ack_tx, ack_rx) = std::sync::mpsc::channel();
        let reader = {
            let decoder = Arc::clone(&decoder);
            thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..FRAMES {
                    let (sequence, _) = decoder
                        .get_frame(0, "reader")
                        .unwrap()
                        .into_frame()
                        .unwrap();
                    seen.push(sequence);
                    ack_tx.send(()).unwrap();
                }
                seen
            })
        };

        for pts in 0..FRAMES as i64 {
            decoder.decode(packet(pts)).unwrap();
            // Pace the producer so the reader never falls behind
            ack_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        let seen = reader.join().unwrap();
        assert_eq!(seen, (1..=FRAMES).collect::<Vec<_>>());
    }

    #[test]
    fn test_look_back_bound() {
        let decoder = decoder(4);
        decoder.register_consumer("reader").unwrap();
        for pts in 0..10 {
            decoder.decode(packet(pts)).unwrap();
        }

        // One signal per request, so publish again between look-backs
        for k in 0..4i64 {
            let (sequence, frame) = frame_at(&decoder, -k, "reader");
            assert_eq!(frame.pts, sequence as i64 - 1 - k);
            decoder.decode(packet(10 + k)).unwrap();
        }

        let delivery = decoder.get_frame_timeout(-4, "reader", WAIT).unwrap();
        assert!(delivery.is_repeat());
    }

    #[test]
    fn test_positive_offset_reads_newest() {
        // Positive offsets are not look-ahead; they read the newest frame
        let decoder = decoder(4);
        decoder.register_consumer("reader").unwrap();
        decoder.decode(packet(0)).unwrap();
        decoder.decode(packet(1)).unwrap();

        let (sequence, frame) = frame_at(&decoder, 3, "reader");
        assert_eq!(sequence, 2);
        assert_eq!(frame.pts, 1);
    }

    #[test]
    fn test_late_consumer_waits_for_next_frame() {
        let decoder = decoder(4);
        for pts in 0..3 {
            decoder.decode(packet(pts)).unwrap();
        }

        let result = decoder.get_frame_timeout(0, "late", WAIT);
        assert!(matches!(result, Err(DecoderError::Timeout)));

        decoder.decode(packet(3)).unwrap();
        let (sequence, frame) = frame_at(&decoder, 0, "late");
        assert_eq!(sequence, 4);
        assert_eq!(frame.pts, 3);
    }

    #[test]
    fn test_decode_never_waits_for_consumers() {
        let decoder = decoder(2);
        for i in 0..16 {
            decoder.register_consumer(&format!("idle-{}", i)).unwrap();
        }

        let started = Instant::now();
        for pts in 0..100 {
            decoder.decode(packet(pts)).unwrap();
        }

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(decoder.current_sequence(), 100);
        assert_eq!(decoder.stats().occupied_slots, 2);
    }

    #[test]
    fn test_slow_consumer_sees_newest_only() {
        let decoder = decoder(2);
        decoder.register_consumer("slow").unwrap();
        for pts in 0..5 {
            decoder.decode(packet(pts)).unwrap();
        }

        let (sequence, frame) = frame_at(&decoder, 0, "slow");
        assert_eq!(sequence, 5);
        assert_eq!(frame.pts, 4);
        // Pending flag was set five times but consumed once
        assert!(matches!(
            decoder.get_frame_timeout(0, "slow", WAIT),
            Err(DecoderError::Timeout)
        ));
    }

    #[test]
    fn test_need_more_input_leaves_state() {
        let decoder = decoder_with(4, SyntheticBackend::new().latency(2));
        decoder.register_consumer("reader").unwrap();

        assert_eq!(decoder.decode(packet(0)).unwrap(), DecodeStatus::NeedMoreInput);
        assert_eq!(decoder.decode(packet(1)).unwrap(), DecodeStatus::NeedMoreInput);
        assert_eq!(decoder.current_sequence(), 0);
        assert!(matches!(
            decoder.get_frame_timeout(0, "reader", WAIT),
            Err(DecoderError::Timeout)
        ));

        assert!(decoder.decode(packet(2)).unwrap().is_decoded());
        assert_eq!(decoder.decode(Packet::flush()).unwrap(), DecodeStatus::Decoded { sequence: 2 });
        assert_eq!(decoder.decode(Packet::flush()).unwrap(), DecodeStatus::Decoded { sequence: 3 });
        assert_eq!(decoder.decode(Packet::flush()).unwrap(), DecodeStatus::EndOfStream);

        let stats = decoder.stats();
        assert_eq!(stats.packets_submitted, 6);
        assert_eq!(stats.not_ready, 3);
    }

    #[test]
    fn test_decode_error_keeps_buffer() {
        let decoder = decoder_with(4, SyntheticBackend::new().fail_at_packet(3));
        decoder.register_consumer("reader").unwrap();
        decoder.decode(packet(0)).unwrap();
        decoder.decode(packet(1)).unwrap();

        let result = decoder.decode(packet(2));
        assert!(matches!(result, Err(DecoderError::Decode(BackendError::Corrupt { .. }))));
        assert_eq!(decoder.current_sequence(), 2);

        let (sequence, frame) = frame_at(&decoder, -1, "reader");
        assert_eq!(sequence, 2);
        assert_eq!(frame.pts, 0);
        assert_eq!(decoder.stats().decode_errors, 1);

        // The stream continues after the bad packet
        assert!(decoder.decode(packet(3)).unwrap().is_decoded());
    }

    #[test]
    fn test_close_is_idempotent() {
        let accelerator = Arc::new(CountingAccelerator::default());
        let decoder = Decoder::init(
            DecoderConfig::with_capacity(2),
            &params(),
            SyntheticBackend::new(),
            accelerator.clone(),
        )
        .unwrap();
        decoder.decode(packet(0)).unwrap();

        decoder.close();
        decoder.close();
        drop(decoder);

        assert_eq!(accelerator.attached.load(Ordering::SeqCst), 1);
        assert_eq!(accelerator.detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_releases_frames_and_consumers() {
        let decoder = decoder(2);
        decoder.register_consumer("reader").unwrap();
        decoder.decode(packet(0)).unwrap();
        let (_, held) = frame_at(&decoder, 0, "reader");
        assert_eq!(held.ref_count(), 2);

        decoder.close();

        assert_eq!(held.ref_count(), 1);
        let stats = decoder.stats();
        assert_eq!(stats.consumer_count, 0);
        assert_eq!(stats.occupied_slots, 0);
        assert!(decoder.is_closed());
        assert!(matches!(decoder.decode(packet(1)), Err(DecoderError::Closed)));
        assert!(matches!(decoder.get_frame(0, "reader"), Err(DecoderError::Closed)));
    }

    #[test]
    fn test_close_wakes_blocked_consumers() {
        let decoder = decoder(2);
        let waiters: Vec<_> = (0..3)
            .map(|i| {
                let decoder = Arc::clone(&decoder);
                let id = format!("consumer-{}", i);
                decoder.register_consumer(&id).unwrap();
                thread::spawn(move || decoder.get_frame(0, &id))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        decoder.close();

        for waiter in waiters {
            assert!(matches!(waiter.join().unwrap(), Err(DecoderError::Closed)));
        }
    }

    #[test]
    fn test_init_device_failure() {
        let accelerator = Arc::new(CountingAccelerator {
            fail: true,
            ..Default::default()
        });

        let result = Decoder::init(
            DecoderConfig::with_capacity(2),
            &params(),
            SyntheticBackend::new(),
            accelerator,
        );
        assert!(matches!(
            result,
            Err(DecoderError::BackendInit {
                stage: InitStage::Device,
                ..
            })
        ));
    }

    #[test]
    fn test_init_backend_failure_detaches_device() {
        let accelerator = Arc::new(CountingAccelerator::default());

        let result = Decoder::init(
            DecoderConfig::with_capacity(2),
            &params(),
            SyntheticBackend::new().reject_codec(CodecId::H264),
            accelerator.clone(),
        );

        assert!(matches!(
            result,
            Err(DecoderError::BackendInit {
                stage: InitStage::Backend,
                ..
            })
        ));
        assert_eq!(accelerator.detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_init_dump_sink_failure() {
        let accelerator = Arc::new(CountingAccelerator::default());
        let dir = tempfile::tempdir().unwrap();
        let config = DecoderConfig::with_capacity(2)
            .enable_diagnostics()
            .dump_path(dir.path().join("missing").join("NV12.yuv"));

        let result = Decoder::init(config, &params(), SyntheticBackend::new(), accelerator.clone());

        assert!(matches!(
            result,
            Err(DecoderError::BackendInit {
                stage: InitStage::DumpSink,
                ..
            })
        ));
        assert_eq!(accelerator.detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_init_rejects_zero_capacity() {
        let accelerator = Arc::new(CountingAccelerator::default());
        let result = Decoder::init(
            DecoderConfig::with_capacity(0),
            &params(),
            SyntheticBackend::new(),
            accelerator.clone(),
        );

        let err = assert_err!(result);
        assert!(matches!(err, DecoderError::InvalidConfig(_)));
        assert!(err.is_terminal());
        // Nothing was acquired
        assert_eq!(accelerator.attached.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_diagnostics_dump_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("NV12.yuv");
        let config = DecoderConfig::with_capacity(2)
            .enable_diagnostics()
            .dump_path(&path);
        let decoder = Decoder::init(
            config,
            &params(),
            SyntheticBackend::new(),
            Arc::new(HostAccelerator),
        )
        .unwrap();

        decoder.decode(packet(1)).unwrap();
        decoder.decode(packet(2)).unwrap();
        decoder.close();

        // 8x4 luma + 8x2 chroma per frame, stride padding removed
        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents.len(), 2 * (8 * 4 + 8 * 2));
        assert!(contents[..32].iter().all(|&b| b == 1));
        assert!(contents[32..48].iter().all(|&b| b == 128));
        assert!(contents[48..80].iter().all(|&b| b == 2));
        assert_eq!(decoder.stats().frames_dumped, 2);
    }

    #[test]
    fn test_diagnostics_transfer_device_frames() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = MemorySink {
            frames: frames.clone(),
            fail: false,
        };
        let decoder = Decoder::init_with_sink(
            DecoderConfig::with_capacity(2),
            &params(),
            SyntheticBackend::new(),
            Arc::new(CountingAccelerator::default()),
            Box::new(sink),
        )
        .unwrap();

        decoder.decode(packet(7)).unwrap();

        let frames = frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 8 * 4 + 8 * 2);
        assert_eq!(frames[0][0], 7);
    }

    #[test]
    fn test_diagnostics_failure_does_not_fail_decode() {
        let decoder = Decoder::init_with_sink(
            DecoderConfig::with_capacity(2),
            &params(),
            SyntheticBackend::new(),
            Arc::new(HostAccelerator),
            Box::new(MemorySink {
                frames: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            }),
        )
        .unwrap();
        let mut events = decoder.events();
        decoder.register_consumer("reader").unwrap();

        let status = assert_ok!(decoder.decode(packet(0)));
        assert_eq!(status, DecodeStatus::Decoded { sequence: 1 });

        let (sequence, _) = frame_at(&decoder, 0, "reader");
        assert_eq!(sequence, 1);
        assert_eq!(decoder.stats().dump_failures, 1);

        assert!(matches!(
            events.try_recv(),
            Ok(DecoderEvent::ConsumerRegistered { .. })
        ));
        assert!(matches!(events.try_recv(), Ok(DecoderEvent::FrameDecoded { sequence: 1, .. })));
        assert!(matches!(
            events.try_recv(),
            Ok(DecoderEvent::DiagnosticWriteFailed { sequence: 1, .. })
        ));
    }

    #[test]
    fn test_diagnostics_transfer_failure_reported() {
        let decoder = Decoder::init_with_sink(
            DecoderConfig::with_capacity(2),
            &params(),
            SyntheticBackend::new().failing_transfers(),
            Arc::new(CountingAccelerator::default()),
            Box::new(MemorySink {
                frames: Arc::new(Mutex::new(Vec::new())),
                fail: false,
            }),
        )
        .unwrap();

        assert!(decoder.decode(packet(0)).unwrap().is_decoded());
        assert_eq!(decoder.stats().dump_failures, 1);
        assert_eq!(decoder.current_sequence(), 1);
    }

    #[test]
    fn test_unregister_consumer() {
        let decoder = decoder(2);
        decoder.register_consumer("a").unwrap();
        decoder.register_consumer("a").unwrap();

        decoder.unregister_consumer("a").unwrap();
        assert_eq!(decoder.stats().consumer_count, 1);

        decoder.unregister_consumer("a").unwrap();
        assert_eq!(decoder.stats().consumer_count, 0);

        assert!(matches!(
            decoder.unregister_consumer("a"),
            Err(DecoderError::ConsumerUnregistered(_))
        ));
    }

    #[test]
    fn test_events_sequence() {
        let decoder = decoder(2);
        let mut events = decoder.events();

        decoder.register_consumer("a").unwrap();
        decoder.decode(packet(0)).unwrap();
        decoder.unregister_consumer("a").unwrap();
        decoder.close();

        let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(
            received,
            vec![
                DecoderEvent::ConsumerRegistered {
                    consumer: "a".into()
                },
                DecoderEvent::FrameDecoded { sequence: 1, pts: 0 },
                DecoderEvent::ConsumerRemoved {
                    consumer: "a".into()
                },
                DecoderEvent::Closed { frames_decoded: 1 },
            ]
        );
    }

    #[test]
    fn test_lazy_consumer_events() {
        let decoder = decoder(2);
        let mut events = decoder.events();

        // First request from an unseen identity registers it
        assert!(matches!(
            decoder.get_frame_timeout(0, "late", WAIT),
            Err(DecoderError::Timeout)
        ));
        assert!(matches!(
            decoder.get_frame_timeout(0, "late", WAIT),
            Err(DecoderError::Timeout)
        ));
        decoder.unregister_consumer("late").unwrap();

        let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(
            received,
            vec![
                DecoderEvent::ConsumerRegistered {
                    consumer: "late".into()
                },
                DecoderEvent::ConsumerRemoved {
                    consumer: "late".into()
                },
            ]
        );
    }
}
