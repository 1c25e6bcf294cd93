//! Synchronous event dispatch.
//!
//! Subscribers register for one [`Event`] or for every event with
//! [`Topic::All`]. Publishing runs the exact-event handlers first, then
//! the wildcard ones, each in registration order, on the caller's
//! thread. The registry lock is released before any handler runs, so
//! handlers may publish or (un)subscribe themselves.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::protocol::ReceivedFile;
use crate::telemetry::TelemetrySnapshot;

// ── Event ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    // Client-visible.
    Connected,
    Disconnected,
    WifiUpdate,
    LightUpdate,
    FlightDataUpdate,
    LogUpdate,
    TimeUpdate,
    FileReceived,
    VideoFrame,
    // Connection state machine inputs.
    ConnectRequested,
    HandshakeAck,
    Timeout,
    QuitRequested,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A subscription target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Event(Event),
    All,
}

impl From<Event> for Topic {
    fn from(event: Event) -> Self {
        Topic::Event(event)
    }
}

/// Data delivered alongside an event.
#[derive(Debug, Clone)]
pub enum Payload {
    None,
    Wifi { strength: u8 },
    Light { strength: u8 },
    Telemetry(Arc<TelemetrySnapshot>),
    Time { sequence: u16 },
    File(Arc<ReceivedFile>),
    Frame { number: u64 },
}

// ── Subscriber ───────────────────────────────────────────────────

type Handler = dyn Fn(Event, &Payload) + Send + Sync;

static NEXT_SUBSCRIBER: AtomicU64 = AtomicU64::new(1);

/// A callback with a stable identity, so the same subscriber can be
/// removed later. Clones share the identity.
#[derive(Clone)]
pub struct Subscriber {
    id: u64,
    handler: Arc<Handler>,
}

impl Subscriber {
    pub fn new(handler: impl Fn(Event, &Payload) + Send + Sync + 'static) -> Self {
        Self {
            id: NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed),
            handler: Arc::new(handler),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscriber({})", self.id)
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// ── Dispatcher ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Dispatcher {
    routes: Mutex<HashMap<Topic, Vec<Subscriber>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<Topic, Vec<Subscriber>>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `subscriber` for `topic`. Registering twice is a no-op.
    pub fn subscribe(&self, topic: impl Into<Topic>, subscriber: &Subscriber) {
        let mut routes = self.routes();
        let list = routes.entry(topic.into()).or_default();
        if !list.contains(subscriber) {
            list.push(subscriber.clone());
        }
    }

    /// Remove `subscriber` from `topic`; [`Topic::All`] removes it
    /// everywhere. Unknown subscribers are ignored.
    pub fn unsubscribe(&self, topic: impl Into<Topic>, subscriber: &Subscriber) {
        let mut routes = self.routes();
        match topic.into() {
            Topic::All => {
                for list in routes.values_mut() {
                    list.retain(|s| s != subscriber);
                }
            }
            topic => {
                if let Some(list) = routes.get_mut(&topic) {
                    list.retain(|s| s != subscriber);
                }
            }
        }
        routes.retain(|_, list| !list.is_empty());
    }

    pub fn publish(&self, event: Event, payload: &Payload) {
        let targets: Vec<Subscriber> = {
            let routes = self.routes();
            [Topic::Event(event), Topic::All]
                .iter()
                .filter_map(|t| routes.get(t))
                .flatten()
                .cloned()
                .collect()
        };
        for subscriber in targets {
            (subscriber.handler)(event, payload);
        }
    }

    /// Subscribers registered for `topic`.
    pub fn count(&self, topic: impl Into<Topic>) -> usize {
        self.routes().get(&topic.into()).map_or(0, Vec::len)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Subscriber {
        let log = Arc::clone(log);
        Subscriber::new(move |event, _| log.lock().unwrap().push(format!("{tag}:{event}")))
    }

    #[test]
    fn exact_handlers_run_before_wildcards() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = Dispatcher::new();
        let wild = recorder(&log, "all");
        let first = recorder(&log, "a");
        let second = recorder(&log, "b");
        d.subscribe(Topic::All, &wild);
        d.subscribe(Event::WifiUpdate, &first);
        d.subscribe(Event::WifiUpdate, &second);

        d.publish(Event::WifiUpdate, &Payload::Wifi { strength: 80 });
        d.publish(Event::Connected, &Payload::None);

        assert_eq!(
            *log.lock().unwrap(),
            ["a:WifiUpdate", "b:WifiUpdate", "all:WifiUpdate", "all:Connected"]
        );
    }

    #[test]
    fn subscribe_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = Dispatcher::new();
        let s = recorder(&log, "s");
        d.subscribe(Event::TimeUpdate, &s);
        d.subscribe(Event::TimeUpdate, &s);
        assert_eq!(d.count(Event::TimeUpdate), 1);

        d.publish(Event::TimeUpdate, &Payload::Time { sequence: 1 });
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn unsubscribe_all_removes_everywhere() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = Dispatcher::new();
        let s = recorder(&log, "s");
        let other = recorder(&log, "o");
        d.subscribe(Event::Connected, &s);
        d.subscribe(Event::Disconnected, &s);
        d.subscribe(Topic::All, &s);
        d.subscribe(Event::Connected, &other);

        d.unsubscribe(Topic::All, &s);
        d.publish(Event::Connected, &Payload::None);
        d.publish(Event::Disconnected, &Payload::None);

        assert_eq!(*log.lock().unwrap(), ["o:Connected"]);
    }

    #[test]
    fn unsubscribe_unknown_is_noop() {
        let d = Dispatcher::new();
        let s = Subscriber::new(|_, _| {});
        d.unsubscribe(Event::LightUpdate, &s);
        d.unsubscribe(Topic::All, &s);
        assert_eq!(d.count(Topic::All), 0);
    }

    #[test]
    fn handler_may_reenter_dispatcher() {
        let d = Arc::new(Dispatcher::new());
        let hits = Arc::new(AtomicU64::new(0));
        let inner = {
            let hits = Arc::clone(&hits);
            Subscriber::new(move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let outer = {
            let d = Arc::clone(&d);
            let inner = inner.clone();
            Subscriber::new(move |event, _| {
                if event == Event::HandshakeAck {
                    d.subscribe(Event::Connected, &inner);
                    d.publish(Event::Connected, &Payload::None);
                }
            })
        };
        d.subscribe(Event::HandshakeAck, &outer);
        d.publish(Event::HandshakeAck, &Payload::None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
