//! Video decode loop. Runs on a blocking thread because the decoder
//! pulls bytes through a blocking reader.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Shared;
use crate::error::TelloError;
use crate::event::{Event, Payload};
use crate::video::{DecoderFactory, RetryPolicy, VideoStreamBuffer, open_with_retry};

/// How often the wait for the first unit checks for cancellation.
const READY_POLL: Duration = Duration::from_millis(100);

pub(crate) fn run(
    shared: Arc<Shared>,
    factory: Arc<dyn DecoderFactory>,
    stream: Arc<VideoStreamBuffer>,
    policy: RetryPolicy,
    opened: oneshot::Sender<Result<(), TelloError>>,
    cancel: CancellationToken,
) {
    while !stream.wait_until_ready(READY_POLL) {
        if cancel.is_cancelled() || stream.is_closed() {
            let _ = opened.send(Err(TelloError::InvalidState(
                "video stopped before any data arrived",
            )));
            return;
        }
    }
    debug!("first video unit received, opening decoder");

    let mut decoder = match open_with_retry(factory.as_ref(), &stream, policy) {
        Ok(decoder) => {
            let _ = opened.send(Ok(()));
            decoder
        }
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };

    let mut errors = 0u64;
    while !cancel.is_cancelled() {
        match decoder.next_frame() {
            Ok(Some(frame)) => {
                let numbered = shared.frames.publish(frame);
                shared.record(&numbered.frame);
                shared
                    .dispatcher
                    .publish(Event::VideoFrame, &Payload::Frame { number: numbered.number });
            }
            Ok(None) => break,
            Err(e) => {
                errors += 1;
                warn!(error = %e, errors, "video decode error");
            }
        }
    }
    info!(frames = shared.frames.count(), errors, "decode loop stopped");
}
