//! Decoder statistics

pub mod metrics;

pub(crate) use metrics::DecoderCounters;
pub use metrics::DecoderStats;
