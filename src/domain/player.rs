// Player record projection: the fields the core reads, plus an opaque
// round-tripped payload for everything else the client stores.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: String,
    pub username: String,
    pub trophies: i64,
    pub rating: i64,
    pub deck: Vec<String>,
    pub current_deck: usize,
    pub banned: bool,
    pub clan_id: Option<String>,
    // Everything the client persists that the core does not interpret.
    #[serde(default)]
    pub extra: Value,
}

impl PlayerRecord {
    pub fn active_deck(&self) -> Vec<String> {
        self.deck.clone()
    }

    // Fixed threshold ladder used only for the presence roster's `arena`
    // field; the original source reads `stats.arena` directly from the
    // player record, which this rewrite's explicit projection does not carry.
    pub fn arena(&self) -> u32 {
        const THRESHOLDS: &[i64] = &[0, 300, 600, 1000, 1500, 2100, 2800, 3600];
        THRESHOLDS
            .iter()
            .rposition(|&t| self.trophies >= t)
            .map(|idx| idx as u32 + 1)
            .unwrap_or(1)
    }
}

// Economic deltas produced by a finished battle, applied via PlayerStore.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementDelta {
    pub trophy_change: i64,
    pub rating: Option<i64>,
    pub gold_earned: i64,
}
