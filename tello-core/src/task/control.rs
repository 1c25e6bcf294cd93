//! Control/telemetry loop and inbound routing.
//!
//! The loop sends the stick heartbeat while connected, then waits one
//! receive tick. Every datagram is parsed and routed before the next
//! heartbeat; a silent tick becomes a `Timeout` for the state machine.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Shared;
use crate::error::TelloError;
use crate::event::{Event, Payload};
use crate::header::HEADER_SIZE;
use crate::message::MessageId;
use crate::packet::{Frame, Inbound};
use crate::protocol::control;
use crate::protocol::file::{self, FileAnnouncement, FileFragment, FileTransfers};
use crate::state::ConnectionState;
use crate::telemetry::{FlightData, LogDecoder, TelemetrySnapshot};

pub(crate) async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut buf = vec![0u8; shared.config.network.max_datagram];
    let tick = shared.config.network.receive_timeout();
    let mut router = InboundRouter::new((**shared.telemetry.borrow()).clone());
    let mut state_rx = shared.connection.subscribe();

    info!(local = ?shared.link.local_addr().ok(), "control loop started");
    loop {
        let state = *state_rx.borrow_and_update();
        if state == ConnectionState::Quit {
            break;
        }
        if state.is_connected() {
            shared.send_heartbeat().await;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            received = tokio::time::timeout(tick, shared.link.recv(&mut buf)) => match received {
                Ok(Ok(n)) => router.route(&shared, &buf[..n]).await,
                Ok(Err(e)) => {
                    debug!(error = %e, "control receive failed");
                    tokio::time::sleep(tick / 20).await;
                }
                Err(_) => {
                    if state.is_connected() {
                        warn!(?tick, "no datagram from device");
                    }
                    shared.drive(Event::Timeout).await;
                }
            },
        }
    }
    info!("control loop stopped");
}

// ── InboundRouter ────────────────────────────────────────────────

/// Per-message handling of control-port datagrams. Owns the working
/// copy of the telemetry snapshot and publishes it whole after each
/// change.
pub(crate) struct InboundRouter {
    snapshot: TelemetrySnapshot,
    log: LogDecoder,
    files: FileTransfers,
}

impl InboundRouter {
    pub(crate) fn new(snapshot: TelemetrySnapshot) -> Self {
        Self {
            snapshot,
            log: LogDecoder::new(),
            files: FileTransfers::new(),
        }
    }

    pub(crate) async fn route(&mut self, shared: &Shared, datagram: &[u8]) {
        let frame = match Frame::parse(datagram) {
            Ok(Inbound::HandshakeAck { port }) => {
                debug!(?port, "handshake acknowledged");
                shared.drive(Event::HandshakeAck).await;
                return;
            }
            Ok(Inbound::Frame(frame)) => frame,
            Err(e) => {
                debug!(error = %e, len = datagram.len(), "dropping datagram");
                return;
            }
        };

        let id = match frame.message_id() {
            Ok(id) => id,
            Err(_) => {
                debug!(id = frame.raw_id(), "unknown message");
                return;
            }
        };

        if let Err(e) = self.handle(shared, id, &frame, datagram).await {
            debug!(%id, error = %e, "message handling failed");
        }
    }

    async fn handle(
        &mut self,
        shared: &Shared,
        id: MessageId,
        frame: &Frame,
        datagram: &[u8],
    ) -> Result<(), TelloError> {
        let payload = frame.payload();
        match id {
            MessageId::LogHeaderMsg => {
                let [lo, hi, ..] = payload else {
                    return Err(TelloError::MalformedFrame("log header too short"));
                };
                shared.link.send(&control::log_header_ack([*lo, *hi])).await?;
            }
            MessageId::LogDataMsg => {
                // Records start after the first payload byte and the
                // stream keeps the frame's own trailer as its last two bytes.
                let stream = &datagram[HEADER_SIZE + 1..];
                let walked = self.log.apply(stream, &mut self.snapshot);
                if let Ok(records) = walked {
                    self.snapshot.log_records += records as u64;
                }
                let snapshot = self.publish_snapshot(shared);
                shared.first_log.send_replace(true);
                shared.dispatcher.publish(Event::LogUpdate, &Payload::Telemetry(snapshot));
                walked?;
            }
            MessageId::WifiMsg => {
                let Some(&strength) = payload.first() else {
                    return Err(TelloError::MalformedFrame("empty wifi message"));
                };
                self.snapshot.wifi_strength = strength;
                if let Some(&disturb) = payload.get(1) {
                    self.snapshot.wifi_disturb = disturb;
                }
                self.publish_snapshot(shared);
                shared.dispatcher.publish(Event::WifiUpdate, &Payload::Wifi { strength });
            }
            MessageId::LightMsg => {
                let Some(&strength) = payload.first() else {
                    return Err(TelloError::MalformedFrame("empty light message"));
                };
                self.snapshot.light_strength = strength;
                self.publish_snapshot(shared);
                shared.dispatcher.publish(Event::LightUpdate, &Payload::Light { strength });
            }
            MessageId::FlightMsg => {
                let flight = FlightData::decode(payload)
                    .ok_or(TelloError::MalformedFrame("flight status too short"))?;
                self.snapshot.flight = flight;
                let snapshot = self.publish_snapshot(shared);
                shared
                    .dispatcher
                    .publish(Event::FlightDataUpdate, &Payload::Telemetry(snapshot));
            }
            MessageId::TimeCmd => {
                shared.dispatcher.publish(
                    Event::TimeUpdate,
                    &Payload::Time {
                        sequence: frame.sequence(),
                    },
                );
            }
            MessageId::FileSize => {
                // Every announcement is echoed, including the short
                // second one the device sends with each photo.
                shared.link.send_raw(datagram).await?;
                match FileAnnouncement::decode(payload) {
                    Ok(announcement) => self.files.announce(announcement),
                    Err(_) => warn!(len = payload.len(), "file size payload too small"),
                }
            }
            MessageId::FileData => {
                let fragment = FileFragment::decode(payload)?;
                let progress = self.files.receive(&fragment)?;
                if progress.group_complete {
                    shared
                        .link
                        .send(&file::group_ack(fragment.file_id, fragment.group))
                        .await?;
                }
                if let Some(received) = progress.file {
                    for ack in file::completion_frames(received.data.len() as u32) {
                        shared.link.send(&ack).await?;
                    }
                    info!(file_id = received.file_id, bytes = received.data.len(), "file received");
                    shared
                        .dispatcher
                        .publish(Event::FileReceived, &Payload::File(Arc::new(received)));
                }
            }
            id if id.is_command_ack() => debug!(%id, "command acknowledged"),
            id => debug!(%id, len = payload.len(), "unhandled message"),
        }
        Ok(())
    }

    fn publish_snapshot(&self, shared: &Shared) -> Arc<TelemetrySnapshot> {
        let snapshot = Arc::new(self.snapshot.clone());
        shared.telemetry.send_replace(Arc::clone(&snapshot));
        snapshot
    }
}
