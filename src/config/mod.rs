//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase credentials; persistence is disabled when absent
    pub supabase: Option<SupabaseConfig>,
    /// Analytics collector endpoint; events are only logged when absent
    pub analytics_url: Option<String>,
    /// Allowed client origins for CORS (empty = any)
    pub client_origins: Vec<String>,

    pub timings: GameTimings,
}

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

/// Domain clocks and sweep periods
#[derive(Clone, Debug)]
pub struct GameTimings {
    /// Per-turn budget before the turn is skipped
    pub turn_timeout: Duration,
    /// Time without a move before the player on turn forfeits
    pub inactivity_limit: Duration,
    /// Silence from a connected player before they forfeit
    pub heartbeat_timeout: Duration,
    /// How long a disconnected seat may be resumed
    pub reconnect_window: Duration,
    /// Delay between reaching a terminal state and eviction
    pub eviction_grace: Duration,
    /// Queue wait before a bot is seated
    pub matchmaking_timeout: Duration,
    pub matchmaking_sweep: Duration,
    pub disconnect_sweep: Duration,
    pub turn_sweep: Duration,
    /// Pacing delay before the bot plays
    pub bot_move_delay: Duration,
    pub metrics_interval: Duration,
}

impl Default for GameTimings {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(30),
            inactivity_limit: Duration::from_secs(60),
            heartbeat_timeout: Duration::from_secs(30),
            reconnect_window: Duration::from_secs(30),
            eviction_grace: Duration::from_secs(60),
            matchmaking_timeout: Duration::from_secs(10),
            matchmaking_sweep: Duration::from_secs(1),
            disconnect_sweep: Duration::from_secs(5),
            turn_sweep: Duration::from_secs(2),
            bot_move_delay: Duration::from_millis(500),
            metrics_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins (hosting platforms), then SERVER_ADDR, then default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let supabase = match (env::var("SUPABASE_URL"), env::var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Ok(url), Ok(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (Ok(_), Err(_)) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
            (Err(_), Ok(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
            (Err(_), Err(_)) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            supabase,
            analytics_url: env::var("ANALYTICS_URL").ok().filter(|s| !s.is_empty()),
            client_origins: env::var("CLIENT_ORIGIN")
                .map(|s| parse_origins(&s))
                .unwrap_or_default(),

            timings: GameTimings::default(),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_split() {
        assert_eq!(
            parse_origins(" http://a.test, https://b.test ,,"),
            vec!["http://a.test".to_string(), "https://b.test".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn default_timings_match_the_game_rules() {
        let t = GameTimings::default();
        assert_eq!(t.turn_timeout, Duration::from_secs(30));
        assert_eq!(t.inactivity_limit, Duration::from_secs(60));
        assert_eq!(t.reconnect_window, Duration::from_secs(30));
        assert_eq!(t.matchmaking_timeout, Duration::from_secs(10));
        assert!(t.disconnect_sweep <= Duration::from_secs(5));
    }
}
