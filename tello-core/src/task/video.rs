//! Video receive loop.

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Shared;
use crate::video::{GapEstimator, SliceAssembler, SliceHeader, SlicePush, VideoStreamBuffer};

/// Reassemble slices from `socket` into `stream` until cancelled.
/// Closes `stream` on the way out so the decoder sees end of stream.
pub(crate) async fn receive(
    shared: Arc<Shared>,
    socket: UdpSocket,
    stream: Arc<VideoStreamBuffer>,
    cancel: CancellationToken,
) {
    let video = &shared.config.video;
    let mut buf = vec![0u8; shared.config.network.max_datagram];
    let mut assembler = SliceAssembler::new();
    let mut gaps = GapEstimator::new();
    let mut refresh = time::interval(video.refresh_interval());
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    refresh.tick().await;

    info!(local = ?socket.local_addr().ok(), "video loop started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = refresh.tick() => shared.request_key_frame().await,
            received = time::timeout(video.receive_timeout(), socket.recv(&mut buf)) => match received {
                Ok(Ok(n)) => {
                    let datagram = &buf[..n];
                    if let Ok(header) = SliceHeader::decode(datagram) {
                        let lost = gaps.observe(header);
                        if lost > 0 {
                            debug!(lost, total = gaps.total_lost(), "video datagrams missing");
                        }
                    }
                    match assembler.push(datagram) {
                        Ok(SlicePush::Complete(unit)) => stream.push(unit),
                        Ok(SlicePush::Pending | SlicePush::Discarded) => {}
                        Err(e) => debug!(error = %e, "dropping video datagram"),
                    }
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "video receive failed");
                    time::sleep(video.receive_timeout() / 40).await;
                }
                Err(_) => {
                    warn!(timeout = ?video.receive_timeout(), "no video; re-requesting stream");
                    shared.request_video_stream().await;
                }
            },
        }
    }

    stream.close();
    info!(
        slices = assembler.slices(),
        discards = assembler.discards(),
        lost = gaps.total_lost(),
        "video loop stopped"
    );
}
