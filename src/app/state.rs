//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::events::{EventSink, HttpEventSink, LogEventSink};
use crate::game::{MatchNotice, MatchRegistry};
use crate::matchmaking::MatchmakingService;
use crate::store::{DisabledGameStore, GameStore, SupabaseClient, SupabaseGameStore};
use crate::ws::ConnectionHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<MatchRegistry>,
    pub matchmaker: Arc<MatchmakingService>,
    pub hub: Arc<ConnectionHub>,
}

impl AppState {
    /// Build the state plus the registry's notice stream, which the caller hands to the dispatcher
    pub fn new(config: Config) -> (Self, mpsc::UnboundedReceiver<MatchNotice>) {
        let config = Arc::new(config);

        // Persistence is optional: without Supabase credentials results are only logged
        let store: Arc<dyn GameStore> = match &config.supabase {
            Some(supabase) => Arc::new(SupabaseGameStore::new(SupabaseClient::new(supabase))),
            None => Arc::new(DisabledGameStore),
        };

        let events: Arc<dyn EventSink> = match &config.analytics_url {
            Some(url) => Arc::new(HttpEventSink::new(url.clone())),
            None => Arc::new(LogEventSink),
        };

        let (registry, notices) = MatchRegistry::new(config.timings.clone(), store, events);
        let matchmaker = Arc::new(MatchmakingService::new(registry.clone()));

        let state = Self {
            config,
            registry,
            matchmaker,
            hub: Arc::new(ConnectionHub::new()),
        };
        (state, notices)
    }
}
