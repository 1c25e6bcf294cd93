//! The [`Tello`] client: owns the control link, the dispatcher, the
//! connection state machine, the telemetry and frame state, and the
//! loops that feed them.
//!
//! ```text
//!            ┌────────────── control loop ──────────────┐
//!  device ──►│ parse ─► route ─► snapshot (watch, Arc)   │──► subscribers
//!            │            └────► state machine ─► effects│
//!            └──────────────────────────────────────────┘
//!  video ──► receive loop ─► VideoStreamBuffer ─► decode thread ─► FrameSlot
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TelloConfig;
use crate::error::TelloError;
use crate::event::{Dispatcher, Event, Payload, Subscriber, Topic};
use crate::network::ControlLink;
use crate::packet::Frame;
use crate::protocol::control::{self, CONTROL_NAMES, StickState};
use crate::state::{ConnectionState, ConnectionStateMachine, Effect};
use crate::task;
use crate::task::record::RecordedFrame;
use crate::telemetry::{SENSORS, TelemetrySnapshot, fly_mode, read_sensor};
use crate::video::{
    DecodedFrame, DecoderFactory, FrameSlot, NumberedFrame, VideoRecorder, VideoStreamBuffer,
};

/// Largest accepted `frame_skip` for recording.
pub const MAX_FRAME_SKIP: u32 = 29;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Shared ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct CameraSettings {
    exposure: i8,
    bitrate: u8,
    zoom: bool,
}

struct Recording {
    frames: mpsc::UnboundedSender<RecordedFrame>,
    writer: JoinHandle<Result<(), TelloError>>,
    every: u64,
    seen: u64,
    started: Instant,
}

/// State reachable from every loop.
pub(crate) struct Shared {
    pub(crate) config: TelloConfig,
    pub(crate) link: ControlLink,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) connection: ConnectionStateMachine,
    pub(crate) telemetry: watch::Sender<Arc<TelemetrySnapshot>>,
    /// Flips to true on the first log-data message.
    pub(crate) first_log: watch::Sender<bool>,
    pub(crate) frames: FrameSlot,
    sticks: Mutex<StickState>,
    camera: Mutex<CameraSettings>,
    recording: Mutex<Option<Recording>>,
}

impl Shared {
    /// Feed the state machine and carry out what it asks for, after
    /// its lock is released.
    pub(crate) async fn drive(&self, event: Event) {
        for effect in self.connection.handle(event) {
            let sent = match effect {
                Effect::SendHandshake => {
                    self.link.send_handshake(self.config.network.handshake_port).await
                }
                Effect::SendTimeSync => {
                    let frame = control::time_sync(&Local::now());
                    self.link.send(&frame).await.map(drop)
                }
                Effect::Notify(event) => {
                    info!(%event, "connection");
                    self.dispatcher.publish(event, &Payload::None);
                    Ok(())
                }
            };
            if let Err(e) = sent {
                warn!(?effect, error = %e, "state machine effect failed");
            }
        }
    }

    pub(crate) fn sticks(&self) -> StickState {
        *lock(&self.sticks)
    }

    pub(crate) async fn send_heartbeat(&self) {
        let frame = control::stick(&self.sticks(), &Local::now());
        if let Err(e) = self.link.send_with_sequence(&frame, 0).await {
            debug!(error = %e, "heartbeat not sent");
        }
    }

    async fn send_logged(&self, frame: &Frame) {
        if let Err(e) = self.link.send(frame).await {
            warn!(id = frame.raw_id(), error = %e, "send failed");
        }
    }

    /// Ask for an SPS/PPS and key frame.
    pub(crate) async fn request_key_frame(&self) {
        self.send_logged(&control::video_start()).await;
    }

    /// Re-send the camera settings, then request a key frame.
    pub(crate) async fn request_video_stream(&self) {
        let camera = *lock(&self.camera);
        match control::exposure(camera.exposure) {
            Ok(frame) => self.send_logged(&frame).await,
            Err(e) => warn!(error = %e, "exposure not sent"),
        }
        match control::video_bitrate(camera.bitrate) {
            Ok(frame) => self.send_logged(&frame).await,
            Err(e) => warn!(error = %e, "bitrate not sent"),
        }
        self.request_key_frame().await;
    }

    /// Queue `frame` for the recording writer if this is one of the
    /// frames kept. Never blocks on the recorder.
    pub(crate) fn record(&self, frame: &Arc<DecodedFrame>) {
        let mut recording = lock(&self.recording);
        let Some(rec) = recording.as_mut() else {
            return;
        };
        if rec.seen % rec.every == 0
            && rec.frames.send((Arc::clone(frame), rec.started.elapsed())).is_err()
        {
            debug!("recording writer gone");
        }
        rec.seen += 1;
    }

    fn is_recording(&self) -> bool {
        lock(&self.recording).is_some()
    }
}

// ── Tello ────────────────────────────────────────────────────────

struct VideoSession {
    cancel: CancellationToken,
    stream: Arc<VideoStreamBuffer>,
    receive: JoinHandle<()>,
    decode: JoinHandle<()>,
}

/// A client for one device.
///
/// Dropping it cancels every loop it started.
pub struct Tello {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    control: Mutex<Option<JoinHandle<()>>>,
    video: Mutex<Option<VideoSession>>,
}

impl Tello {
    /// Bind the control socket. Nothing is sent until [`connect`].
    ///
    /// [`connect`]: Tello::connect
    pub async fn new(config: TelloConfig) -> Result<Self, TelloError> {
        config.validate()?;
        let link = ControlLink::bind(config.network.local(), config.network.drone()).await?;
        info!(local = %link.local_addr()?, drone = %link.remote_addr(), "control socket bound");

        let camera = CameraSettings {
            exposure: config.video.exposure,
            bitrate: config.video.bitrate,
            zoom: config.video.zoom,
        };
        let (telemetry, _) = watch::channel(Arc::new(TelemetrySnapshot::default()));
        let (first_log, _) = watch::channel(false);
        let shared = Shared {
            config,
            link,
            dispatcher: Dispatcher::new(),
            connection: ConnectionStateMachine::new(),
            telemetry,
            first_log,
            frames: FrameSlot::new(),
            sticks: Mutex::new(StickState::default()),
            camera: Mutex::new(camera),
            recording: Mutex::new(None),
        };
        Ok(Self {
            shared: Arc::new(shared),
            cancel: CancellationToken::new(),
            control: Mutex::new(None),
            video: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &TelloConfig {
        &self.shared.config
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TelloError> {
        self.shared.link.local_addr()
    }

    // ── Connection ───────────────────────────────────────────────

    /// Start the control loop, handshake, and wait until the device has
    /// acknowledged and sent its first log message.
    pub async fn connect(&self, timeout: Duration) -> Result<(), TelloError> {
        if self.state() == ConnectionState::Quit {
            return Err(TelloError::InvalidState("client has quit"));
        }
        let mut state_rx = self.shared.connection.subscribe();
        let mut log_rx = self.shared.first_log.subscribe();
        self.ensure_control_loop();
        self.shared.drive(Event::ConnectRequested).await;

        let ready = async {
            state_rx.wait_for(|s| s.is_connected()).await?;
            log_rx.wait_for(|seen| *seen).await?;
            Ok::<_, TelloError>(())
        };
        match time::timeout(timeout, ready).await {
            Ok(result) => result,
            Err(_) => Err(TelloError::ConnectionTimeout(timeout)),
        }
    }

    fn ensure_control_loop(&self) {
        let mut control = lock(&self.control);
        if control.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        *control = Some(tokio::spawn(task::control::run(shared, self.cancel.child_token())));
    }

    /// Leave the session and stop every loop.
    pub async fn quit(&self) -> Result<(), TelloError> {
        self.shared.drive(Event::QuitRequested).await;
        if self.is_video_running() {
            if let Err(e) = self.stop_video(self.shared.config.video.receive_timeout()).await {
                warn!(error = %e, "video did not stop cleanly");
            }
        }
        self.cancel.cancel();
        let control = lock(&self.control).take();
        if let Some(handle) = control {
            handle.await?;
        }
        info!("quit");
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.connection.state()
    }

    pub fn subscribe(&self, topic: impl Into<Topic>, subscriber: &Subscriber) {
        self.shared.dispatcher.subscribe(topic, subscriber);
    }

    pub fn unsubscribe(&self, topic: impl Into<Topic>, subscriber: &Subscriber) {
        self.shared.dispatcher.unsubscribe(topic, subscriber);
    }

    // ── Telemetry ────────────────────────────────────────────────

    /// The latest complete snapshot.
    pub fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        Arc::clone(&*self.shared.telemetry.borrow())
    }

    /// A receiver that wakes on every snapshot update.
    pub fn telemetry_updates(&self) -> watch::Receiver<Arc<TelemetrySnapshot>> {
        self.shared.telemetry.subscribe()
    }

    /// Every name accepted by [`sensor_values`](Tello::sensor_values).
    pub fn sensor_names(&self) -> Vec<&'static str> {
        SENSORS
            .iter()
            .map(|s| s.name)
            .chain(CONTROL_NAMES.iter().copied())
            .collect()
    }

    /// Read sensors and stick controls by name, all from one snapshot.
    pub fn sensor_values(&self, names: &[&str]) -> Result<Vec<f64>, TelloError> {
        let snapshot = self.telemetry();
        let sticks = self.shared.sticks();
        names
            .iter()
            .map(|name| {
                read_sensor(&snapshot, name)
                    .or_else(|| sticks.control(name))
                    .ok_or_else(|| TelloError::InvalidArgument(format!("unknown sensor {name:?}")))
            })
            .collect()
    }

    // ── Flight ───────────────────────────────────────────────────

    /// Stick deflections in percent, clipped to ±100. Sent with the
    /// next heartbeat.
    pub fn set_sticks(&self, left_right: f64, forward_backward: f64, up_down: f64, yaw: f64) {
        lock(&self.shared.sticks).set_percent(left_right, forward_backward, up_down, yaw);
    }

    pub fn set_fast_mode(&self, fast: bool) {
        lock(&self.shared.sticks).fast_mode = fast;
    }

    pub fn fast_mode(&self) -> bool {
        self.shared.sticks().fast_mode
    }

    /// Set the altitude ceiling, then ask the device to report it back.
    pub async fn set_altitude_limit(&self, metres: u16) -> Result<(), TelloError> {
        info!(metres, "set altitude limit");
        self.shared.link.send(&control::altitude_limit(metres)).await?;
        self.shared.link.send(&control::altitude_limit_query()).await?;
        Ok(())
    }

    /// Set the low-battery warning level, then ask for it back.
    pub async fn set_low_battery_threshold(&self, percent: u8) -> Result<(), TelloError> {
        let frame = control::low_battery_threshold(percent)?;
        info!(percent, "set low battery threshold");
        self.shared.link.send(&frame).await?;
        self.shared
            .link
            .send(&control::low_battery_threshold_query())
            .await?;
        Ok(())
    }

    /// Send the altitude limit and take off. With `wait`, returns
    /// whether the device went through its take-off mode in time.
    pub async fn takeoff(&self, wait: bool) -> Result<bool, TelloError> {
        let flight = &self.shared.config.flight;
        self.shared
            .link
            .send(&control::altitude_limit(flight.takeoff_altitude_limit))
            .await?;
        self.shared.link.send(&control::takeoff()).await?;
        if !wait {
            return Ok(false);
        }

        let deadline = time::Instant::now() + flight.takeoff_timeout();
        let done = self.wait_fly_mode(|m| m == fly_mode::TAKING_OFF, deadline).await
            && self.wait_fly_mode(|m| m != fly_mode::TAKING_OFF, deadline).await;
        if !done {
            warn!(timeout = ?flight.takeoff_timeout(), "take-off not confirmed");
        }
        Ok(done)
    }

    /// Land. With `wait`, returns whether the device entered its
    /// landing mode in time.
    pub async fn land(&self, wait: bool) -> Result<bool, TelloError> {
        self.shared.link.send(&control::land()).await?;
        if !wait {
            return Ok(false);
        }
        let timeout = self.shared.config.flight.land_timeout();
        let done = self
            .wait_fly_mode(|m| m == fly_mode::LANDING, time::Instant::now() + timeout)
            .await;
        if !done {
            warn!(?timeout, "landing not confirmed");
        }
        Ok(done)
    }

    async fn wait_fly_mode(&self, mut accept: impl FnMut(u8) -> bool, deadline: time::Instant) -> bool {
        let mut rx = self.shared.telemetry.subscribe();
        matches!(
            time::timeout_at(deadline, rx.wait_for(|s| accept(s.fly_mode()))).await,
            Ok(Ok(_))
        )
    }

    // ── Camera ───────────────────────────────────────────────────

    /// Ask for a photo. It arrives later as [`Event::FileReceived`].
    pub async fn take_picture(&self) -> Result<(), TelloError> {
        self.shared.link.send(&control::take_picture()).await?;
        Ok(())
    }

    pub async fn set_zoom(&self, zoom: bool) -> Result<(), TelloError> {
        let current = lock(&self.shared.camera).zoom;
        if zoom != current && self.shared.is_recording() {
            return Err(TelloError::UnsupportedOperation("cannot change zoom while recording"));
        }
        self.shared.link.send(&control::video_mode(zoom)).await?;
        lock(&self.shared.camera).zoom = zoom;
        Ok(())
    }

    /// `true` for 16:9 (1280x720), `false` for 4:3 (960x720).
    pub fn zoom(&self) -> bool {
        lock(&self.shared.camera).zoom
    }

    pub fn exposure(&self) -> i8 {
        lock(&self.shared.camera).exposure
    }

    pub fn video_bitrate(&self) -> u8 {
        lock(&self.shared.camera).bitrate
    }

    pub async fn set_exposure(&self, level: i8) -> Result<(), TelloError> {
        let frame = control::exposure(level)?;
        self.shared.link.send(&frame).await?;
        lock(&self.shared.camera).exposure = level;
        Ok(())
    }

    pub async fn set_video_bitrate(&self, rate: u8) -> Result<(), TelloError> {
        let frame = control::video_bitrate(rate)?;
        self.shared.link.send(&frame).await?;
        lock(&self.shared.camera).bitrate = rate;
        Ok(())
    }

    // ── Video ────────────────────────────────────────────────────

    pub fn is_video_running(&self) -> bool {
        lock(&self.video).is_some()
    }

    /// Request the stream, start the receive and decode loops, and wait
    /// for the first decoded frame.
    pub async fn start_video(
        &self,
        factory: Arc<dyn DecoderFactory>,
        timeout: Duration,
    ) -> Result<(), TelloError> {
        if !self.state().is_connected() {
            return Err(TelloError::InvalidState("not connected"));
        }
        if self.is_video_running() {
            return Err(TelloError::InvalidState("video already running"));
        }

        let socket = UdpSocket::bind(self.shared.config.video.local()).await?;
        self.shared.request_video_stream().await;

        let stream = VideoStreamBuffer::new();
        let cancel = self.cancel.child_token();
        let (opened_tx, opened_rx) = oneshot::channel();
        let baseline = self.shared.frames.count();

        let receive = tokio::spawn(task::video::receive(
            Arc::clone(&self.shared),
            socket,
            Arc::clone(&stream),
            cancel.clone(),
        ));
        let decode = tokio::task::spawn_blocking({
            let shared = Arc::clone(&self.shared);
            let stream = Arc::clone(&stream);
            let cancel = cancel.clone();
            let policy = self.shared.config.video.retry_policy();
            move || task::decode::run(shared, factory, stream, policy, opened_tx, cancel)
        });

        {
            let mut video = lock(&self.video);
            if video.is_some() {
                cancel.cancel();
                stream.close();
                return Err(TelloError::InvalidState("video already running"));
            }
            *video = Some(VideoSession {
                cancel,
                stream,
                receive,
                decode,
            });
        }

        let first_frame = async {
            opened_rx.await??;
            self.shared.frames.next_after(baseline, timeout).await
        };
        let result = match time::timeout(timeout, first_frame).await {
            Ok(Ok(frame)) => {
                info!(number = frame.number, "video started");
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(_) => TelloError::ProtocolTimeout(timeout),
        };
        if let Err(e) = self.stop_video(timeout).await {
            debug!(error = %e, "cleanup after failed video start");
        }
        Err(result)
    }

    /// Stop recording, then the video loops.
    pub async fn stop_video(&self, timeout: Duration) -> Result<(), TelloError> {
        if self.shared.is_recording() {
            if let Err(e) = self.stop_recording().await {
                warn!(error = %e, "recording did not finish cleanly");
            }
        }
        let taken = lock(&self.video).take();
        let Some(session) = taken else {
            return Err(TelloError::InvalidState("video not running"));
        };
        session.cancel.cancel();
        session.stream.close();

        let joined = async {
            session.receive.await?;
            session.decode.await?;
            Ok::<_, TelloError>(())
        };
        match time::timeout(timeout, joined).await {
            Ok(result) => {
                info!("video stopped");
                result
            }
            Err(_) => Err(TelloError::ProtocolTimeout(timeout)),
        }
    }

    /// Forward every `(1 + frame_skip)`-th decoded frame to `recorder`,
    /// which runs on its own blocking thread.
    pub async fn start_recording(
        &self,
        recorder: Box<dyn VideoRecorder>,
        frame_skip: u32,
    ) -> Result<(), TelloError> {
        if frame_skip > MAX_FRAME_SKIP {
            return Err(TelloError::InvalidArgument(format!(
                "frame_skip {frame_skip} above {MAX_FRAME_SKIP}"
            )));
        }
        if !self.is_video_running() {
            return Err(TelloError::InvalidState("video not running"));
        }
        let mut recording = lock(&self.shared.recording);
        if recording.is_some() {
            return Err(TelloError::InvalidState("already recording"));
        }
        let (frames, rx) = mpsc::unbounded_channel();
        let writer = tokio::task::spawn_blocking(move || task::record::run(recorder, rx));
        *recording = Some(Recording {
            frames,
            writer,
            every: u64::from(frame_skip) + 1,
            seen: 0,
            started: Instant::now(),
        });
        info!(frame_skip, "recording started");
        Ok(())
    }

    /// Stop queueing frames, wait for the writer to drain, and finish
    /// the output.
    pub async fn stop_recording(&self) -> Result<(), TelloError> {
        let taken = lock(&self.shared.recording).take();
        let Some(rec) = taken else {
            return Err(TelloError::InvalidState("not recording"));
        };
        debug!(queued = rec.seen.div_ceil(rec.every), "draining recording");
        drop(rec.frames);
        rec.writer.await?
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    /// The newest decoded frame, waiting up to `timeout` for the first.
    pub async fn get_frame(&self, timeout: Duration) -> Result<NumberedFrame, TelloError> {
        self.shared.frames.get(timeout).await
    }

    /// The first frame numbered above `after`.
    pub async fn next_frame(&self, after: u64, timeout: Duration) -> Result<NumberedFrame, TelloError> {
        self.shared.frames.next_after(after, timeout).await
    }
}

impl Drop for Tello {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(session) = lock(&self.video).take() {
            session.cancel.cancel();
            session.stream.close();
        }
    }
}
