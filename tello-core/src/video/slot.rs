//! Latest-frame mailbox.
//!
//! One value plus a version number. The decode thread overwrites it,
//! readers either take whatever is newest or wait for a version newer
//! than the one they already have.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::TelloError;
use crate::video::decoder::DecodedFrame;

/// A frame with its 1-based sequence number.
#[derive(Debug, Clone)]
pub struct NumberedFrame {
    pub number: u64,
    pub frame: Arc<DecodedFrame>,
}

#[derive(Debug)]
pub struct FrameSlot {
    tx: watch::Sender<Option<NumberedFrame>>,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSlot {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Store `frame` under the next number. Safe to call from a
    /// blocking thread.
    pub fn publish(&self, frame: DecodedFrame) -> NumberedFrame {
        let mut stored = NumberedFrame {
            number: 0,
            frame: Arc::new(frame),
        };
        self.tx.send_modify(|slot| {
            stored.number = slot.as_ref().map_or(0, |f| f.number) + 1;
            *slot = Some(stored.clone());
        });
        stored
    }

    pub fn latest(&self) -> Option<NumberedFrame> {
        self.tx.borrow().clone()
    }

    /// Frames published so far.
    pub fn count(&self) -> u64 {
        self.tx.borrow().as_ref().map_or(0, |f| f.number)
    }

    /// The newest frame, waiting up to `timeout` if none exists yet.
    pub async fn get(&self, timeout: Duration) -> Result<NumberedFrame, TelloError> {
        self.next_after(0, timeout).await
    }

    /// Wait for a frame numbered above `after`.
    pub async fn next_after(
        &self,
        after: u64,
        timeout: Duration,
    ) -> Result<NumberedFrame, TelloError> {
        let mut rx = self.tx.subscribe();
        let wait = rx.wait_for(|slot| slot.as_ref().is_some_and(|f| f.number > after));
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(slot)) => slot.clone().ok_or(TelloError::ChannelClosed),
            Ok(Err(_)) => Err(TelloError::ChannelClosed),
            Err(_) => Err(TelloError::ProtocolTimeout(timeout)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
