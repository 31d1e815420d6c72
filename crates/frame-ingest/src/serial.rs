//! Length-prefixed frame reassembly for the serial camera link.
//!
//! Wire format, as emitted by the camera firmware: an ASCII decimal length
//! line, that many raw payload bytes, then a line holding the literal
//! `ENDIMG` marker. Anything that does not fit that shape is discarded and
//! reading resumes at the next length line; a corrupted stream is not
//! guaranteed to resynchronise beyond that.

use std::{
    io::{self, BufRead, BufReader, Read},
    time::Duration,
};

use anyhow::Context;
use serialport::SerialPort;
use tracing::debug;

use crate::types::IngestError;

/// Literal marker terminating every frame on the wire.
pub const END_MARKER: &str = "ENDIMG";

/// Upper bound on a single frame payload. Length lines above this are treated
/// as line noise rather than honoured with a giant allocation.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Open the serial device the embedded camera streams on.
///
/// The timeout applies to every blocking read; an idle link surfaces as
/// `io::ErrorKind::TimedOut` rather than hanging forever.
pub fn open_serial_port(
    path: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, IngestError> {
    let port = serialport::new(path, baud_rate)
        .timeout(timeout)
        .open()
        .with_context(|| format!("failed to open serial device {path}"))?;
    Ok(port)
}

/// Reassembles frames from a blocking byte stream.
pub struct FrameReader<R> {
    inner: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            inner: BufReader::new(stream),
        }
    }

    /// Block until one complete frame payload has been reassembled.
    ///
    /// Empty and non-numeric length lines are skipped silently. A missing end
    /// marker discards the payload and surfaces [`IngestError::Desync`] so
    /// the caller can decide how loudly to complain; the next call resumes at
    /// whatever bytes follow.
    pub fn next_frame(&mut self) -> Result<Vec<u8>, IngestError> {
        let length = loop {
            let line = self.read_line()?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<usize>() {
                Ok(len) if len <= MAX_FRAME_BYTES => break len,
                Ok(len) => {
                    debug!("discarding length line {len} above the frame cap");
                }
                Err(_) => {
                    debug!("discarding non-numeric length line {line:?}");
                }
            }
        };

        let mut payload = vec![0u8; length];
        self.inner.read_exact(&mut payload)?;

        let marker = self.read_line()?;
        let marker = marker.trim();
        if marker != END_MARKER {
            return Err(IngestError::Desync {
                got: marker.to_string(),
            });
        }

        Ok(payload)
    }

    fn read_line(&mut self) -> Result<String, IngestError> {
        let mut raw = Vec::new();
        let read = self.inner.read_until(b'\n', &mut raw)?;
        if read == 0 {
            return Err(IngestError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "frame stream closed",
            )));
        }
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}
