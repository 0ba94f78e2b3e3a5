// Battle aggregate: tower HP, crown counting, and the timing/tiebreak math
// used to settle a finished duel.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

pub const BATTLE_DURATION_SECS: u64 = 180;
pub const STARTING_TOWER_HP: i64 = 2000;
pub const STARTING_KING_HP: i64 = 4000;
pub const STARTING_ELIXIR: f64 = 5.0;
pub const DEFAULT_ELIXIR_RATE: f64 = 1.0;
pub const CHAOS_ELIXIR_RATE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    Waiting,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy)]
pub struct TowerHp {
    pub king: i64,
    pub left: i64,
    pub right: i64,
}

impl TowerHp {
    pub fn starting() -> Self {
        Self {
            king: STARTING_KING_HP,
            left: STARTING_TOWER_HP,
            right: STARTING_TOWER_HP,
        }
    }

    /// Crowns earned by the *opponent* from this side's destroyed towers.
    pub fn crowns_conceded(&self) -> u8 {
        if self.king <= 0 {
            return 3;
        }
        let mut crowns = 0u8;
        if self.left <= 0 {
            crowns += 1;
        }
        if self.right <= 0 {
            crowns += 1;
        }
        crowns
    }

    pub fn king_hp_fraction(&self) -> f64 {
        self.king.max(0) as f64 / STARTING_KING_HP as f64
    }
}

#[derive(Debug, Clone)]
pub struct BattleSide {
    pub player_id: String,
    pub deck: Vec<String>,
    pub entering_trophies: i64,
    pub entering_rating: i64,
    pub towers: TowerHp,
    pub elixir: f64,
    pub ready: bool,
    pub damage_window_start: u64,
    pub damage_window_total: i64,
    pub reports_window_start: u64,
    pub reports_window_count: u32,
}

impl BattleSide {
    pub fn new(player_id: String, deck: Vec<String>, entering_trophies: i64, entering_rating: i64) -> Self {
        Self {
            player_id,
            deck,
            entering_trophies,
            entering_rating,
            towers: TowerHp::starting(),
            elixir: STARTING_ELIXIR,
            ready: false,
            damage_window_start: 0,
            damage_window_total: 0,
            reports_window_start: 0,
            reports_window_count: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Battle {
    pub id: String,
    pub mode: String,
    pub side_a: BattleSide,
    pub side_b: BattleSide,
    pub phase: BattlePhase,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub duration_secs: u64,
    pub elixir_rate: f64,
    pub winner_id: Option<String>,
    pub actions: Vec<Value>,
    pub warned_30s: bool,
    pub warned_10s: bool,
}

impl Battle {
    pub fn new(id: String, mode: String, side_a: BattleSide, side_b: BattleSide) -> Self {
        let elixir_rate = if mode == "chaos" { CHAOS_ELIXIR_RATE } else { DEFAULT_ELIXIR_RATE };
        Self {
            id,
            mode,
            side_a,
            side_b,
            phase: BattlePhase::Waiting,
            created_at: now_epoch_seconds(),
            started_at: None,
            ended_at: None,
            duration_secs: BATTLE_DURATION_SECS,
            elixir_rate,
            winner_id: None,
            actions: Vec::new(),
            warned_30s: false,
            warned_10s: false,
        }
    }

    pub fn side_for(&self, player_id: &str) -> Option<&BattleSide> {
        if self.side_a.player_id == player_id {
            Some(&self.side_a)
        } else if self.side_b.player_id == player_id {
            Some(&self.side_b)
        } else {
            None
        }
    }

    pub fn side_mut(&mut self, player_id: &str) -> Option<&mut BattleSide> {
        if self.side_a.player_id == player_id {
            Some(&mut self.side_a)
        } else if self.side_b.player_id == player_id {
            Some(&mut self.side_b)
        } else {
            None
        }
    }

    pub fn crowns_a(&self) -> u8 {
        self.side_b.towers.crowns_conceded()
    }

    pub fn crowns_b(&self) -> u8 {
        self.side_a.towers.crowns_conceded()
    }

    pub fn both_ready(&self) -> bool {
        self.side_a.ready && self.side_b.ready
    }

    pub fn elapsed_secs(&self, now: u64) -> u64 {
        self.started_at.map(|s| now.saturating_sub(s)).unwrap_or(0)
    }

    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.duration_secs.saturating_sub(self.elapsed_secs(now))
    }

    /// Resolves a winner by crown count, tiebreaking on remaining king HP
    /// fraction. `None` means a draw.
    /// Crowns earned by a side come from the *opponent's* destroyed towers.
    pub fn resolve_winner(&self) -> Option<&str> {
        let crowns_a = self.side_b.towers.crowns_conceded();
        let crowns_b = self.side_a.towers.crowns_conceded();
        if crowns_a > crowns_b {
            Some(self.side_a.player_id.as_str())
        } else if crowns_b > crowns_a {
            Some(self.side_b.player_id.as_str())
        } else {
            let hp_a = self.side_a.towers.king_hp_fraction();
            let hp_b = self.side_b.towers.king_hp_fraction();
            if (hp_a - hp_b).abs() < f64::EPSILON {
                None
            } else if hp_a > hp_b {
                Some(self.side_a.player_id.as_str())
            } else {
                Some(self.side_b.player_id.as_str())
            }
        }
    }
}

pub fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
