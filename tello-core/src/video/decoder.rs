//! Seams for the external H.264 decoder and the recording muxer.
//!
//! Neither is implemented here. The client hands the decoder a blocking
//! [`StreamReader`] and pulls decoded images back out; the recorder just
//! receives every n-th decoded image.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};

use crate::error::TelloError;
use crate::video::stream::{StreamReader, VideoStreamBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
}

/// One decoded image.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Bytes,
}

impl fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A running decoder. Called from a blocking thread.
pub trait VideoDecoder: Send {
    /// Decode the next image. `Ok(None)` means the byte source ended;
    /// an error is logged by the caller and decoding continues.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, TelloError>;
}

/// Opens decoders over the live byte stream.
pub trait DecoderFactory: Send + Sync {
    /// Probe the stream and return a decoder, giving up after `timeout`.
    fn open(
        &self,
        reader: StreamReader,
        timeout: Duration,
    ) -> Result<Box<dyn VideoDecoder>, TelloError>;
}

/// Consumes decoded frames for recording to a file.
pub trait VideoRecorder: Send {
    fn write_frame(&mut self, frame: &DecodedFrame, pts: Duration) -> Result<(), TelloError>;

    /// Flush and close the output.
    fn finish(&mut self) -> Result<(), TelloError>;
}

// ── Bounded open ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub per_attempt: Duration,
}

/// Try to open a decoder up to `policy.attempts` times. The first
/// bytes after start are often not a clean stream head, so early
/// failures are expected. Stops early if the stream closes.
pub fn open_with_retry(
    factory: &dyn DecoderFactory,
    stream: &Arc<VideoStreamBuffer>,
    policy: RetryPolicy,
) -> Result<Box<dyn VideoDecoder>, TelloError> {
    let mut last_error = String::from("no attempt made");
    let mut attempts = 0;
    while attempts < policy.attempts {
        attempts += 1;
        match factory.open(stream.reader(), policy.per_attempt) {
            Ok(decoder) => {
                info!(attempts, "video decoder opened");
                return Ok(decoder);
            }
            Err(e) => {
                warn!(attempt = attempts, error = %e, "video decoder open failed");
                last_error = e.to_string();
            }
        }
        if stream.is_closed() {
            break;
        }
    }
    Err(TelloError::CodecOpenFailure {
        attempts,
        last_error,
    })
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Nothing;

    impl VideoDecoder for Nothing {
        fn next_frame(&mut self) -> Result<Option<DecodedFrame>, TelloError> {
            Ok(None)
        }
    }

    /// Fails until `succeed_on`.
    struct Flaky {
        calls: AtomicU32,
        succeed_on: u32,
    }

    impl DecoderFactory for Flaky {
        fn open(
            &self,
            _reader: StreamReader,
            _timeout: Duration,
        ) -> Result<Box<dyn VideoDecoder>, TelloError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(Box::new(Nothing))
            } else {
                Err(TelloError::CodecDecodeError(format!("open attempt {n} failed")))
            }
        }
    }

    const POLICY: RetryPolicy = RetryPolicy {
        attempts: 3,
        per_attempt: Duration::from_millis(10),
    };

    #[test]
    fn opens_after_transient_failures() {
        let factory = Flaky { calls: AtomicU32::new(0), succeed_on: 3 };
        let stream = VideoStreamBuffer::new();
        assert!(open_with_retry(&factory, &stream, POLICY).is_ok());
        assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausted_budget_is_typed_failure() {
        let factory = Flaky { calls: AtomicU32::new(0), succeed_on: 10 };
        let stream = VideoStreamBuffer::new();
        match open_with_retry(&factory, &stream, POLICY) {
            Err(TelloError::CodecOpenFailure { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("open attempt 3"));
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn closed_stream_stops_retrying() {
        let factory = Flaky { calls: AtomicU32::new(0), succeed_on: 10 };
        let stream = VideoStreamBuffer::new();
        stream.close();
        assert!(open_with_retry(&factory, &stream, POLICY).is_err());
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }
}
