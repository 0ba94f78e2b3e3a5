// Direct player-to-player challenge bookkeeping.

use std::time::{SystemTime, UNIX_EPOCH};

pub const CHALLENGE_REAP_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct PendingChallenge {
    pub id: String,
    pub challenger_id: String,
    pub challenged_id: String,
    pub mode: String,
    pub created_at: u64,
}

impl PendingChallenge {
    pub fn new(id: String, challenger_id: String, challenged_id: String, mode: String) -> Self {
        Self {
            id,
            challenger_id,
            challenged_id,
            mode,
            created_at: now_epoch_seconds(),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) >= CHALLENGE_REAP_SECS
    }
}

pub fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
