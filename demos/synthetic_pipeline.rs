//! Synthetic decode pipeline
//!
//! Run with: cargo run --example synthetic_pipeline [FRAMES] [DUMP_PATH]
//!
//! Examples:
//!   cargo run --example synthetic_pipeline                 # 120 frames, no dump
//!   cargo run --example synthetic_pipeline 300             # 300 frames
//!   cargo run --example synthetic_pipeline 60 NV12.yuv     # also dump raw NV12
//!
//! One producer thread decodes synthetic packets at ~60 fps. Three consumers
//! read at their own pace:
//! - "preview": newest frame, on a blocking thread
//! - "history": two frames back, on a blocking thread (sees Repeat at first)
//! - "analytics": newest frame from an async task
//!
//! Set RUST_LOG=framering=debug for decoder logs.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use framering::backend::{HostAccelerator, SyntheticBackend};
use framering::{
    CodecId, DecodeStatus, Decoder, DecoderConfig, DecoderError, DecoderEvent, Delivery,
    FrameConsumer, Packet, StreamParameters,
};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Blocking consumer loop; returns (frames, repeats)
fn run_blocking_consumer(consumer: FrameConsumer, offset: i64, pause: Duration) -> (u64, u64) {
    let mut frames = 0;
    let mut repeats = 0;

    loop {
        match consumer.recv(offset) {
            Ok(Delivery::Frame { sequence, frame }) => {
                frames += 1;
                tracing::debug!(consumer = consumer.id(), sequence, pts = frame.pts, "Got frame");
                thread::sleep(pause);
            }
            Ok(Delivery::Repeat) => repeats += 1,
            Err(DecoderError::Closed) => break,
            Err(e) => {
                eprintln!("[{}] error: {}", consumer.id(), e);
                break;
            }
        }
    }

    (frames, repeats)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("framering=info".parse()?),
        )
        .init();

    let frame_count: i64 = std::env::args()
        .nth(1)
        .map(|s| s.parse::<i64>())
        .transpose()?
        .unwrap_or(120);
    let dump_path = std::env::args().nth(2).map(PathBuf::from);

    let mut config = DecoderConfig::with_capacity(4);
    if let Some(path) = &dump_path {
        config = config.enable_diagnostics().dump_path(path);
    }

    let params = StreamParameters::new(CodecId::H264, 320, 240);
    let backend = SyntheticBackend::new().latency(2);
    let decoder = Arc::new(Decoder::init(
        config,
        &params,
        backend,
        Arc::new(HostAccelerator),
    )?);

    println!("Synthetic Decode Pipeline");
    println!("=========================");
    println!("Frames:   {}", frame_count);
    println!("Capacity: {}", decoder.config().buffer_capacity);
    if let Some(path) = &dump_path {
        println!("Dump:     {}", path.display());
    }
    println!();

    let mut events = decoder.events();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DecoderEvent::DiagnosticWriteFailed { sequence, error } => {
                    eprintln!("dump failed for frame #{}: {}", sequence, error);
                }
                DecoderEvent::Closed { frames_decoded } => {
                    println!("decoder closed after {} frames", frames_decoded);
                    break;
                }
                _ => {}
            }
        }
    });

    let preview = decoder.subscribe("preview")?;
    let history = decoder.subscribe("history")?;
    let analytics = decoder.subscribe("analytics")?;

    let preview = thread::spawn(move || run_blocking_consumer(preview, 0, Duration::ZERO));
    let history = thread::spawn(move || run_blocking_consumer(history, -2, FRAME_INTERVAL * 3));

    let analytics = tokio::spawn(async move {
        let mut frames = 0u64;
        while let Ok(delivery) = analytics.recv_async(0).await {
            if let Delivery::Frame { frame, .. } = delivery {
                frames += 1;
                tracing::trace!(pts = frame.pts, size = frame.size(), "Analyzed frame");
            }
        }
        frames
    });

    let producer = {
        let decoder = Arc::clone(&decoder);
        thread::spawn(move || -> Result<u64, DecoderError> {
            let mut decoded = 0;
            let packets = (0..frame_count)
                .map(|pts| Packet::new(Bytes::from_static(&[0, 0, 0, 1, 0x65]), pts, pts % 30 == 0))
                .chain(std::iter::repeat_with(Packet::flush));

            for packet in packets {
                match decoder.decode(packet)? {
                    DecodeStatus::Decoded { .. } => decoded += 1,
                    DecodeStatus::NeedMoreInput => continue,
                    DecodeStatus::EndOfStream => break,
                }
                thread::sleep(FRAME_INTERVAL);
            }
            Ok(decoded)
        })
    };

    // Thread joins block, keep them off the runtime workers
    let decoded = tokio::task::spawn_blocking(move || producer.join())
        .await?
        .map_err(|_| "producer panicked")??;
    let stats = decoder.stats();
    decoder.close();

    let (preview_frames, _) = tokio::task::spawn_blocking(move || preview.join())
        .await?
        .map_err(|_| "preview panicked")?;
    let (history_frames, history_repeats) = tokio::task::spawn_blocking(move || history.join())
        .await?
        .map_err(|_| "history panicked")?;
    let analytics_frames = analytics.await?;
    event_log.await?;

    println!();
    println!("Decoded:   {} frames ({} packets)", decoded, stats.packets_submitted);
    println!("Preview:   {} frames", preview_frames);
    println!("History:   {} frames, {} repeats", history_frames, history_repeats);
    println!("Analytics: {} frames", analytics_frames);
    println!("Dumped:    {} frames", stats.frames_dumped);

    Ok(())
}
