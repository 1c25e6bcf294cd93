//! Recording writer. Runs on a blocking thread and owns the recorder,
//! so the decode loop only hands frames over a channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::TelloError;
use crate::video::{DecodedFrame, VideoRecorder};

pub(crate) type RecordedFrame = (Arc<DecodedFrame>, Duration);

/// Write frames until every sender is dropped, then finish the output.
pub(crate) fn run(
    mut recorder: Box<dyn VideoRecorder>,
    mut frames: mpsc::UnboundedReceiver<RecordedFrame>,
) -> Result<(), TelloError> {
    let mut written = 0u64;
    while let Some((frame, pts)) = frames.blocking_recv() {
        match recorder.write_frame(&frame, pts) {
            Ok(()) => written += 1,
            Err(e) => warn!(error = %e, ?pts, "recorder rejected frame"),
        }
    }
    info!(written, "recording stopped");
    recorder.finish()
}
