//! Deterministic software backend
//!
//! Produces NV12 frames whose luma is filled with the low byte of the packet
//! pts. Output can be delayed by a fixed number of packets to mimic decoder
//! reordering latency, and a failure can be injected at a given packet.

use std::collections::VecDeque;

use bytes::Bytes;

use super::accelerator::DeviceContext;
use super::error::BackendError;
use super::{DecodeBackend, SubmitOutcome};
use crate::frame::{CodecId, DecodedFrame, Packet, Plane, StreamParameters};

/// Row alignment of generated planes
const STRIDE_ALIGN: usize = 32;

/// Software backend generating synthetic frames
#[derive(Debug, Default)]
pub struct SyntheticBackend {
    /// Packets held back before the first frame comes out
    latency: usize,
    /// 1-based packet number that fails to decode
    fail_at: Option<u64>,
    /// Codec rejected at open
    rejected_codec: Option<CodecId>,
    /// Host transfers fail
    transfer_fails: bool,

    params: Option<StreamParameters>,
    device: Option<DeviceContext>,
    pending: VecDeque<i64>,
    submitted: u64,
}

impl SyntheticBackend {
    /// Create a backend emitting one frame per packet
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold back `packets` packets before emitting frames
    pub fn latency(mut self, packets: usize) -> Self {
        self.latency = packets;
        self
    }

    /// Fail to decode the `n`-th submitted packet (1-based)
    pub fn fail_at_packet(mut self, n: u64) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// Refuse to open streams of `codec`
    pub fn reject_codec(mut self, codec: CodecId) -> Self {
        self.rejected_codec = Some(codec);
        self
    }

    /// Make every host transfer fail
    pub fn failing_transfers(mut self) -> Self {
        self.transfer_fails = true;
        self
    }

    /// Check if the backend is open
    pub fn is_open(&self) -> bool {
        self.params.is_some()
    }

    fn host_frame(params: &StreamParameters, pts: i64) -> DecodedFrame {
        let width = params.width as usize;
        let height = params.height as usize;
        let stride = (width + STRIDE_ALIGN - 1) & !(STRIDE_ALIGN - 1);

        let luma = Plane::new(Bytes::from(vec![pts as u8; stride * height]), stride);
        let chroma = Plane::new(Bytes::from(vec![128u8; stride * height.div_ceil(2)]), stride);
        DecodedFrame::nv12(params.width, params.height, pts, luma, chroma)
    }

    fn make_frame(&self, pts: i64) -> Result<DecodedFrame, BackendError> {
        let params = self.params.as_ref().ok_or(BackendError::NotOpen)?;
        match &self.device {
            Some(device) if device.is_hardware() => Ok(DecodedFrame::device(
                params.width,
                params.height,
                pts,
                device.ordinal,
            )),
            _ => Ok(Self::host_frame(params, pts)),
        }
    }
}

impl DecodeBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(
        &mut self,
        params: &StreamParameters,
        device: &DeviceContext,
    ) -> Result<(), BackendError> {
        if self.rejected_codec == Some(params.codec) {
            return Err(BackendError::Unsupported(format!("{:?}", params.codec)));
        }
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::Unsupported(format!(
                "{}x{}",
                params.width, params.height
            )));
        }

        self.params = Some(params.clone());
        self.device = Some(device.clone());
        Ok(())
    }

    fn submit(&mut self, packet: Packet) -> Result<SubmitOutcome, BackendError> {
        if self.params.is_none() {
            return Err(BackendError::NotOpen);
        }

        self.submitted += 1;
        if self.fail_at == Some(self.submitted) {
            return Err(BackendError::corrupt(packet.pts, "injected failure"));
        }

        if packet.is_flush() {
            return match self.pending.pop_front() {
                Some(pts) => Ok(SubmitOutcome::Ready(self.make_frame(pts)?)),
                None => Ok(SubmitOutcome::EndOfStream),
            };
        }

        self.pending.push_back(packet.pts);
        if self.pending.len() <= self.latency {
            return Ok(SubmitOutcome::NeedMoreInput);
        }

        match self.pending.pop_front() {
            Some(pts) => Ok(SubmitOutcome::Ready(self.make_frame(pts)?)),
            None => Ok(SubmitOutcome::NeedMoreInput),
        }
    }

    fn transfer_to_host(&mut self, frame: &DecodedFrame) -> Result<DecodedFrame, BackendError> {
        if self.transfer_fails {
            return Err(BackendError::Transfer("injected transfer failure".into()));
        }
        if !frame.is_device_resident() {
            return Ok(frame.clone());
        }

        let params = self.params.as_ref().ok_or(BackendError::NotOpen)?;
        Ok(Self::host_frame(params, frame.pts))
    }

    fn close(&mut self) {
        self.params = None;
        self.device = None;
        self.pending.clear();
    }
}
