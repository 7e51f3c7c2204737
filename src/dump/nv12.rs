//! Raw NV12 dump file

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{DiagnosticError, DiagnosticSink};
use crate::frame::{DecodedFrame, PixelFormat};

/// Write one NV12 frame without row padding
///
/// Emits `height` luma rows followed by `height / 2` interleaved chroma rows,
/// each `width` bytes, skipping the stride padding.
pub fn write_nv12<W: Write>(writer: &mut W, frame: &DecodedFrame) -> Result<(), DiagnosticError> {
    if frame.format != PixelFormat::Nv12 || frame.is_device_resident() {
        return Err(DiagnosticError::Layout(format!(
            "expected host NV12, got {:?} at {:?}",
            frame.format, frame.location
        )));
    }
    let (luma, chroma) = match frame.planes.as_slice() {
        [luma, chroma, ..] => (luma, chroma),
        _ => {
            return Err(DiagnosticError::Layout(format!(
                "NV12 needs 2 planes, got {}",
                frame.planes.len()
            )))
        }
    };

    let width = frame.width as usize;
    let height = frame.height as usize;

    // Validate every row first so a bad frame never leaves a partial image behind
    let mut rows = Vec::with_capacity(height + height / 2);
    for (plane, count, name) in [(luma, height, "luma"), (chroma, height / 2, "chroma")] {
        for row in 0..count {
            let bytes = plane.row(row, width).ok_or_else(|| {
                DiagnosticError::Layout(format!("{} plane too short at row {}", name, row))
            })?;
            rows.push(bytes);
        }
    }

    for bytes in rows {
        writer.write_all(bytes)?;
    }

    writer.flush()?;
    Ok(())
}

/// NV12 dump sink backed by a file
#[derive(Debug)]
pub struct Nv12FileSink {
    writer: Option<BufWriter<File>>,
    frames: u64,
}

impl Nv12FileSink {
    /// Create (or truncate) the dump file
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            frames: 0,
        })
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl DiagnosticSink for Nv12FileSink {
    fn write_frame(&mut self, frame: &DecodedFrame) -> Result<(), DiagnosticError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            DiagnosticError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "dump sink closed",
            ))
        })?;

        write_nv12(writer, frame)?;
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DiagnosticError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
