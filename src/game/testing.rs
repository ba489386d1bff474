//! Recording doubles and a fast-clock registry for tests

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::GameTimings;
use crate::events::{AnalyticsEvent, EventSink};
use crate::store::{GameRecord, GameStore, StoreError};

use super::registry::{MatchNotice, MatchRegistry};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(AnalyticsEvent::kind).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: AnalyticsEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Default)]
pub struct RecordingStore {
    users: Mutex<Vec<String>>,
    games: Mutex<Vec<GameRecord>>,
}

impl RecordingStore {
    pub fn saved(&self) -> Vec<GameRecord> {
        self.games.lock().clone()
    }

    pub fn users(&self) -> Vec<String> {
        self.users.lock().clone()
    }
}

impl GameStore for RecordingStore {
    fn upsert_user<'a>(&'a self, username: &'a str, _is_bot: bool) -> BoxFuture<'a, Result<(), StoreError>> {
        self.users.lock().push(username.to_string());
        futures::future::ready(Ok(())).boxed()
    }

    fn save_game<'a>(&'a self, record: &'a GameRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        self.games.lock().push(record.clone());
        futures::future::ready(Ok(())).boxed()
    }
}

/// Production clocks with the background delays shortened
pub fn fast_timings() -> GameTimings {
    GameTimings {
        eviction_grace: Duration::from_millis(200),
        bot_move_delay: Duration::from_millis(10),
        ..GameTimings::default()
    }
}

pub struct Harness {
    pub registry: Arc<MatchRegistry>,
    pub notices: mpsc::UnboundedReceiver<MatchNotice>,
    pub events: Arc<RecordingSink>,
    pub store: Arc<RecordingStore>,
}

pub fn test_registry() -> Harness {
    let events = Arc::new(RecordingSink::default());
    let store = Arc::new(RecordingStore::default());
    let (registry, notices) = MatchRegistry::new(fast_timings(), store.clone(), events.clone());
    Harness {
        registry,
        notices,
        events,
        store,
    }
}

/// Poll `condition` until it holds, failing the test after ten seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 10s");
}
