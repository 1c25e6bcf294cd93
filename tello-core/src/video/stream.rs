//! Byte pipe between the video receive loop and the blocking decoder.
//!
//! Holds at most two units: the one being drained and one waiting. A
//! newer unit replaces a waiting one that was never started, so a slow
//! decoder skips ahead instead of falling behind, but a unit that is
//! already half read is always finished first.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::{Buf, Bytes};

#[derive(Debug, Default)]
struct Inner {
    current: Bytes,
    pending: Option<Bytes>,
    closed: bool,
    pushed: u64,
    replaced: u64,
}

#[derive(Debug, Default)]
pub struct VideoStreamBuffer {
    inner: Mutex<Inner>,
    ready: Condvar,
}

impl VideoStreamBuffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a unit, replacing any waiting unit not yet started.
    /// Ignored once the stream is closed.
    pub fn push(&self, unit: Bytes) {
        let mut inner = self.lock();
        if inner.closed || unit.is_empty() {
            return;
        }
        if inner.pending.replace(unit).is_some() {
            inner.replaced += 1;
        }
        inner.pushed += 1;
        drop(inner);
        self.ready.notify_all();
    }

    /// Mark end of stream. Buffered bytes stay readable.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Units accepted so far, and how many of them were replaced unread.
    pub fn counts(&self) -> (u64, u64) {
        let inner = self.lock();
        (inner.pushed, inner.replaced)
    }

    /// Block until the first unit arrives. Returns `false` on timeout
    /// or if the stream closed with nothing to read.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if inner.pushed > 0 {
                return true;
            }
            if inner.closed {
                return false;
            }
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            inner = self
                .ready
                .wait_timeout(inner, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Fill `buf`, blocking for more units as needed. Returns fewer
    /// bytes than asked only once the stream is closed; 0 means ended.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut filled = 0;
        let mut inner = self.lock();
        while filled < buf.len() {
            if !inner.current.has_remaining() {
                if let Some(next) = inner.pending.take() {
                    inner.current = next;
                } else if inner.closed {
                    break;
                } else {
                    inner = self.ready.wait(inner).unwrap_or_else(PoisonError::into_inner);
                    continue;
                }
            }
            let n = inner.current.remaining().min(buf.len() - filled);
            inner.current.copy_to_slice(&mut buf[filled..filled + n]);
            filled += n;
        }
        filled
    }

    /// A [`std::io::Read`] handle for the decoder.
    pub fn reader(self: &Arc<Self>) -> StreamReader {
        StreamReader {
            buffer: Arc::clone(self),
        }
    }
}

/// Blocking reader over a [`VideoStreamBuffer`].
#[derive(Debug, Clone)]
pub struct StreamReader {
    buffer: Arc<VideoStreamBuffer>,
}

impl io::Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.buffer.read(buf))
    }
}

// ── Tests ────────────────────────────────────────────────────────
