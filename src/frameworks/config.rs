// Runtime/server constants, environment-variable driven with defaults.
// Gameplay tuning constants stay with the domain modules that own them
// (battle.rs, queue.rs, battle_coordinator.rs); this module is bootstrap-only.

use std::{env, time::Duration};

pub fn listen_host() -> String {
    env::var("LISTEN_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

pub fn listen_port() -> u16 {
    env::var("LISTEN_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5004)
}

/// Token verification is delegated entirely to the auth collaborator; this
/// core only needs its base URL and a client-side timeout.
pub fn auth_service_url() -> String {
    env::var("AUTH_SERVICE_URL").unwrap_or_else(|_| "http://127.0.0.1:5001".to_string())
}

pub fn auth_verify_timeout() -> Duration {
    let millis = env::var("AUTH_VERIFY_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1500);
    Duration::from_millis(millis)
}

pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

pub const MATCHMAKING_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const BATTLE_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const CHALLENGE_REAP_INTERVAL: Duration = Duration::from_secs(10);
