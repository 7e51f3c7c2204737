//! Compressed input packets and stream parameters

use bytes::Bytes;

/// Codec of the compressed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    /// AVC (H.264)
    H264,
    /// HEVC (H.265)
    Hevc,
    /// VP9
    Vp9,
    /// AV1
    Av1,
}

/// Parameters of the demuxed video stream, handed to the backend at init
#[derive(Debug, Clone)]
pub struct StreamParameters {
    /// Codec of the bitstream
    pub codec: CodecId,
    /// Coded width in pixels
    pub width: u32,
    /// Coded height in pixels
    pub height: u32,
    /// Codec configuration record (SPS/PPS, hvcC, ...)
    pub extradata: Bytes,
}

impl StreamParameters {
    /// Create stream parameters without extradata
    pub fn new(codec: CodecId, width: u32, height: u32) -> Self {
        Self {
            codec,
            width,
            height,
            extradata: Bytes::new(),
        }
    }

    /// Attach codec extradata
    pub fn with_extradata(mut self, extradata: Bytes) -> Self {
        self.extradata = extradata;
        self
    }
}

/// One compressed access unit
///
/// Ownership moves into the backend on submit. An empty packet asks the
/// backend to drain buffered frames.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Compressed payload (zero-copy via reference counting)
    pub data: Bytes,
    /// Presentation timestamp
    pub pts: i64,
    /// Decode timestamp
    pub dts: i64,
    /// Whether this packet starts a keyframe
    pub is_keyframe: bool,
}

impl Packet {
    /// Create a packet with equal pts and dts
    pub fn new(data: Bytes, pts: i64, is_keyframe: bool) -> Self {
        Self {
            data,
            pts,
            dts: pts,
            is_keyframe,
        }
    }

    /// Create a drain request
    pub fn flush() -> Self {
        Self {
            data: Bytes::new(),
            pts: 0,
            dts: 0,
            is_keyframe: false,
        }
    }

    /// Set the decode timestamp
    pub fn with_dts(mut self, dts: i64) -> Self {
        self.dts = dts;
        self
    }

    /// Check if this is a drain request
    pub fn is_flush(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_flush() {
        assert!(Packet::flush().is_flush());
        assert!(!Packet::new(Bytes::from_static(&[0, 0, 1]), 0, true).is_flush());
    }

    #[test]
    fn test_packet_dts() {
        let packet = Packet::new(Bytes::from_static(&[1]), 3000, false).with_dts(1500);
        assert_eq!(packet.pts, 3000);
        assert_eq!(packet.dts, 1500);
        assert_eq!(packet.size(), 1);
    }

    #[test]
    fn test_stream_parameters() {
        let params = StreamParameters::new(CodecId::Hevc, 3840, 2160)
            .with_extradata(Bytes::from_static(b"hvcC"));

        assert_eq!(params.codec, CodecId::Hevc);
        assert_eq!(params.width, 3840);
        assert_eq!(params.extradata.len(), 4);
    }
}
