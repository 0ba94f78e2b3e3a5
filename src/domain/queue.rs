// Matchmaking queue entry and tolerance-widening rules.

use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub player_id: String,
    pub mode: String,
    pub trophies: i64,
    pub rating: i64,
    pub deck: Vec<String>,
    pub joined_at: u64,
    pub tolerance: i64,
}

impl QueueEntry {
    pub fn new(player_id: String, mode: String, trophies: i64, rating: i64, deck: Vec<String>) -> Self {
        Self {
            player_id,
            mode,
            trophies,
            rating,
            deck,
            joined_at: now_epoch_seconds(),
            tolerance: 100,
        }
    }

    /// Widen tolerance with wait time: +50 every 5 seconds, capped at 1000.
    pub fn refresh_tolerance(&mut self, now: u64) {
        let wait_seconds = now.saturating_sub(self.joined_at);
        self.tolerance = (100 + 50 * (wait_seconds / 5) as i64).min(1000);
    }
}

/// Match quality score: lower is better. `None` if the pair is outside
/// either side's trophy tolerance window.
pub fn match_score(a: &QueueEntry, b: &QueueEntry) -> Option<f64> {
    let trophy_diff = (a.trophies - b.trophies).unsigned_abs() as f64;
    let rating_diff = (a.rating - b.rating).unsigned_abs() as f64;

    let max_tolerance = a.tolerance.max(b.tolerance) as f64;
    if trophy_diff > max_tolerance {
        return None;
    }

    Some(0.7 * rating_diff + 0.3 * trophy_diff)
}

/// Heuristic estimated wait: 10s per waiting player in the mode, floor 5s.
pub fn estimated_wait_seconds(queue_size: usize) -> u64 {
    (10 * queue_size as u64).max(5)
}

pub fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
