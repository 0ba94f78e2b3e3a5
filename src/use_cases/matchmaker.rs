// Matchmaking queue engine. A single mutex guards both maps so join/leave/
// find_match never observe a torn state between the per-mode queues and the
// player→mode index.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::errors::QueueError;
use crate::domain::queue::{self, QueueEntry};

/// Modes actively ticked by the queue driver. `pvp` (direct challenges) is
/// deliberately absent — those battles are created by ChallengeBroker, never
/// matched off this queue.
pub const MATCHMAKING_MODES: &[&str] = &["normal", "ranked", "medals", "2v2", "draft", "chaos"];

struct MatchmakerState {
    queues: HashMap<String, Vec<QueueEntry>>,
    player_mode: HashMap<String, String>,
}

pub struct Matchmaker {
    state: Mutex<MatchmakerState>,
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Matchmaker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MatchmakerState {
                queues: HashMap::new(),
                player_mode: HashMap::new(),
            }),
        }
    }

    pub async fn join_queue(&self, entry: QueueEntry) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        Self::remove_locked(&mut state, &entry.player_id);
        state
            .queues
            .entry(entry.mode.clone())
            .or_default()
            .push(entry.clone());
        state.player_mode.insert(entry.player_id, entry.mode);
        Ok(())
    }

    pub async fn leave_queue(&self, player_id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if Self::remove_locked(&mut state, player_id) {
            Ok(())
        } else {
            Err(QueueError::NotQueued(player_id.to_string()))
        }
    }

    fn remove_locked(state: &mut MatchmakerState, player_id: &str) -> bool {
        if let Some(mode) = state.player_mode.remove(player_id) {
            if let Some(queue) = state.queues.get_mut(&mode) {
                queue.retain(|e| e.player_id != player_id);
            }
            true
        } else {
            false
        }
    }

    pub async fn position(&self, player_id: &str) -> Option<usize> {
        let state = self.state.lock().await;
        let mode = state.player_mode.get(player_id)?;
        let queue = state.queues.get(mode)?;
        queue.iter().position(|e| e.player_id == player_id).map(|i| i + 1)
    }

    pub async fn queue_size(&self, mode: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(mode).map(|q| q.len()).unwrap_or(0)
    }

    pub async fn estimated_wait(&self, mode: &str) -> u64 {
        queue::estimated_wait_seconds(self.queue_size(mode).await)
    }

    /// Widens every waiting entry's tolerance, then scans all pairs in the
    /// mode's queue for the lowest-scoring match (O(n^2), matching the
    /// original's `find_match`). Removes and returns the matched pair.
    pub async fn find_match(&self, mode: &str, now: u64) -> Option<(QueueEntry, QueueEntry)> {
        let mut state = self.state.lock().await;
        let queue = state.queues.get_mut(mode)?;
        if queue.len() < 2 {
            return None;
        }

        for entry in queue.iter_mut() {
            entry.refresh_tolerance(now);
        }

        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..queue.len() {
            for j in (i + 1)..queue.len() {
                if let Some(score) = queue::match_score(&queue[i], &queue[j]) {
                    if best.map(|(_, _, b)| score < b).unwrap_or(true) {
                        best = Some((i, j, score));
                    }
                }
            }
        }

        let (i, j, _) = best?;
        // Remove the higher index first so the lower index stays valid.
        let b = queue.remove(j);
        let a = queue.remove(i);
        state.player_mode.remove(&a.player_id);
        state.player_mode.remove(&b.player_id);
        Some((a, b))
    }

    /// Snapshot of every still-waiting entry in `mode`, used by the queue
    /// driver to push `queue_status` updates without holding the lock.
    pub async fn snapshot(&self, mode: &str) -> Vec<QueueEntry> {
        let state = self.state.lock().await;
        state.queues.get(mode).cloned().unwrap_or_default()
    }
}
