// Duel state machine: creation, readiness, actions, tower damage, surrender,
// disconnect forfeits, and timeout termination. Tower-damage reports are
// rate-limited and damage-capped per side since the reporting client cannot
// be trusted to report accurately.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::battle::{now_epoch_seconds, Battle, BattlePhase, BattleSide};
use crate::domain::errors::BattleError;
use crate::domain::player::SettlementDelta;
use crate::domain::ports::PlayerStore;
use crate::domain::session::battle_channel;
use crate::interface_adapters::protocol::{BattleOutcomeDto, ServerMessage, Side, TowerHpDto};
use crate::use_cases::ranking;
use crate::use_cases::session_hub::SessionHub;

/// Tower damage reports above this rate, per side per battle, are dropped.
pub const MAX_REPORTS_PER_SECOND: u32 = 20;
/// Cumulative damage a side may inflict on the opponent within one rolling
/// second; reports that would exceed it are clamped to the remaining budget.
pub const MAX_DAMAGE_PER_SECOND: i64 = 6000;
/// How long a finished Battle record is kept around for late reconnects.
pub const GRACE_PERIOD_SECS: u64 = 30;

pub struct BattleCoordinator {
    session_hub: Arc<SessionHub>,
    player_store: Arc<dyn PlayerStore>,
    battles: RwLock<HashMap<String, Battle>>,
    player_index: RwLock<HashMap<String, String>>,
}

impl BattleCoordinator {
    pub fn new(session_hub: Arc<SessionHub>, player_store: Arc<dyn PlayerStore>) -> Self {
        Self {
            session_hub,
            player_store,
            battles: RwLock::new(HashMap::new()),
            player_index: RwLock::new(HashMap::new()),
        }
    }

    pub async fn player_battle_id(&self, player_id: &str) -> Option<String> {
        self.player_index.read().await.get(player_id).cloned()
    }

    /// Materializes a duel between two sides and subscribes both to its
    /// channel. `side_a` is reported to clients as `player1`.
    pub async fn create(&self, side_a: BattleSide, side_b: BattleSide, mode: String) -> String {
        let battle_id = Uuid::new_v4().to_string();
        let battle = Battle::new(battle_id.clone(), mode, side_a, side_b);

        let (p1, p2) = (battle.side_a.player_id.clone(), battle.side_b.player_id.clone());
        {
            let mut battles = self.battles.write().await;
            battles.insert(battle_id.clone(), battle);
        }
        {
            let mut index = self.player_index.write().await;
            index.insert(p1.clone(), battle_id.clone());
            index.insert(p2.clone(), battle_id.clone());
        }

        let channel = battle_channel(&battle_id);
        self.session_hub.subscribe(&p1, &channel).await;
        self.session_hub.subscribe(&p2, &channel).await;

        info!(battle_id = %battle_id, player1 = %p1, player2 = %p2, "battle created");
        battle_id
    }

    pub async fn ready(&self, battle_id: &str, player_id: &str) -> Result<(), BattleError> {
        let start = {
            let mut battles = self.battles.write().await;
            let battle = battles.get_mut(battle_id).ok_or_else(|| BattleError::NotFound(battle_id.to_string()))?;
            if battle.phase == BattlePhase::Finished {
                return Ok(());
            }
            let side = battle
                .side_mut(player_id)
                .ok_or_else(|| BattleError::NotParticipant(player_id.to_string(), battle_id.to_string()))?;
            side.ready = true;

            if battle.both_ready() && battle.phase == BattlePhase::Waiting {
                battle.phase = BattlePhase::Active;
                let now = now_epoch_seconds();
                battle.started_at = Some(now);
                Some((now, battle.duration_secs, battle.elixir_rate))
            } else {
                None
            }
        };

        if let Some((start_time, duration, elixir_rate)) = start {
            info!(battle_id, "battle started");
            self.session_hub
                .broadcast_channel(
                    &battle_channel(battle_id),
                    ServerMessage::BattleStart {
                        start_time,
                        duration,
                        elixir_rate,
                    },
                    None,
                )
                .await;
        }
        Ok(())
    }

    pub async fn action(&self, battle_id: &str, player_id: &str, action: Value) -> Result<(), BattleError> {
        let (from, augmented) = {
            let mut battles = self.battles.write().await;
            let battle = battles.get_mut(battle_id).ok_or_else(|| BattleError::NotFound(battle_id.to_string()))?;
            if battle.phase != BattlePhase::Active {
                return Ok(());
            }
            let from = if battle.side_a.player_id == player_id {
                Side::Player1
            } else if battle.side_b.player_id == player_id {
                Side::Player2
            } else {
                return Err(BattleError::NotParticipant(player_id.to_string(), battle_id.to_string()));
            };

            let now = now_epoch_seconds();
            let battle_time = battle.elapsed_secs(now);
            let mut record = action;
            if let Value::Object(ref mut map) = record {
                map.insert("player_id".to_string(), Value::String(player_id.to_string()));
                map.insert("timestamp".to_string(), Value::from(now));
                map.insert("battle_time".to_string(), Value::from(battle_time));
            }
            battle.actions.push(record.clone());
            (from, record)
        };

        self.session_hub
            .broadcast_channel(
                &battle_channel(battle_id),
                ServerMessage::BattleAction { action: augmented, from },
                Some(player_id),
            )
            .await;
        Ok(())
    }

    pub async fn tower_damage(
        &self,
        battle_id: &str,
        player_id: &str,
        target_player: &str,
        target: &str,
        damage: i64,
    ) -> Result<(), BattleError> {
        let outcome = {
            let mut battles = self.battles.write().await;
            let battle = battles.get_mut(battle_id).ok_or_else(|| BattleError::NotFound(battle_id.to_string()))?;
            if battle.phase != BattlePhase::Active {
                return Ok(());
            }
            if battle.side_for(player_id).is_none() {
                return Err(BattleError::NotParticipant(player_id.to_string(), battle_id.to_string()));
            }

            let reporter_side = if battle.side_a.player_id == player_id { 0 } else { 1 };
            let now = now_epoch_seconds();
            let admitted_damage = {
                let side = if reporter_side == 0 { &mut battle.side_a } else { &mut battle.side_b };
                if side.reports_window_start != now {
                    side.reports_window_start = now;
                    side.reports_window_count = 0;
                }
                side.reports_window_count += 1;
                if side.reports_window_count > MAX_REPORTS_PER_SECOND {
                    warn!(battle_id, player_id, "tower_damage report rate exceeded; dropping");
                    None
                } else {
                    if side.damage_window_start != now {
                        side.damage_window_start = now;
                        side.damage_window_total = 0;
                    }
                    let budget = (MAX_DAMAGE_PER_SECOND - side.damage_window_total).max(0);
                    let admitted = damage.clamp(0, budget);
                    side.damage_window_total += admitted;
                    Some(admitted)
                }
            };

            let Some(damage) = admitted_damage else {
                return Ok(());
            };

            let target_side = if target_player == "player1" { &mut battle.side_a } else { &mut battle.side_b };
            match target {
                "king" => target_side.towers.king = (target_side.towers.king - damage).max(0),
                "left" => target_side.towers.left = (target_side.towers.left - damage).max(0),
                "right" => target_side.towers.right = (target_side.towers.right - damage).max(0),
                _ => {}
            }

            let crowns_a = battle.crowns_a();
            let crowns_b = battle.crowns_b();
            let state_msg = ServerMessage::BattleState {
                player1_hp: TowerHpDto {
                    king: battle.side_a.towers.king,
                    left: battle.side_a.towers.left,
                    right: battle.side_a.towers.right,
                },
                player2_hp: TowerHpDto {
                    king: battle.side_b.towers.king,
                    left: battle.side_b.towers.left,
                    right: battle.side_b.towers.right,
                },
                player1_crowns: crowns_a,
                player2_crowns: crowns_b,
            };
            let should_end = crowns_a >= 3 || crowns_b >= 3;
            (state_msg, should_end)
        };

        let (state_msg, should_end) = outcome;
        self.session_hub
            .broadcast_channel(&battle_channel(battle_id), state_msg, None)
            .await;

        if should_end {
            self.terminate(battle_id, false).await;
        }
        Ok(())
    }

    /// Ends the sender's current battle. When `surrender` is true the sender
    /// forfeits outright (their king tower is forced to 0, handing the
    /// opponent a three-crown win); otherwise the battle is settled on
    /// whatever crown state it already holds, with no forced forfeit.
    pub async fn surrender(&self, player_id: &str, surrender: bool) -> Result<(), BattleError> {
        let Some(battle_id) = self.player_battle_id(player_id).await else {
            return Ok(());
        };
        {
            let mut battles = self.battles.write().await;
            if let Some(battle) = battles.get_mut(&battle_id) {
                if battle.phase != BattlePhase::Active {
                    return Ok(());
                }
                if surrender {
                    if battle.side_a.player_id == player_id {
                        battle.side_a.towers.king = 0;
                    } else {
                        battle.side_b.towers.king = 0;
                    }
                }
            }
        }
        self.terminate(&battle_id, false).await;
        Ok(())
    }

    /// Forfeits the battle in progress for `player_id` in favor of the
    /// opponent. No-op if the player has no live battle.
    pub async fn on_disconnect(&self, player_id: &str) {
        let Some(battle_id) = self.player_battle_id(player_id).await else {
            return;
        };
        {
            let mut battles = self.battles.write().await;
            if let Some(battle) = battles.get_mut(&battle_id) {
                if battle.phase == BattlePhase::Finished {
                    return;
                }
                if battle.side_a.player_id == player_id {
                    battle.side_a.towers.king = 0;
                } else {
                    battle.side_b.towers.king = 0;
                }
            }
        }
        self.terminate(&battle_id, false).await;
    }

    /// Driven once per second: advances timeouts and emits the two
    /// time-warning thresholds exactly once each.
    pub async fn tick(&self, now: u64) {
        let mut to_end = Vec::new();
        let mut warnings = Vec::new();
        {
            let mut battles = self.battles.write().await;
            for (id, battle) in battles.iter_mut() {
                if battle.phase != BattlePhase::Active {
                    continue;
                }
                let remaining = battle.remaining_secs(now);
                if remaining == 0 {
                    to_end.push(id.clone());
                } else if remaining <= 30 && !battle.warned_30s {
                    battle.warned_30s = true;
                    warnings.push((id.clone(), 30u64));
                } else if remaining <= 10 && !battle.warned_10s {
                    battle.warned_10s = true;
                    warnings.push((id.clone(), 10u64));
                }
            }
        }

        for (id, remaining) in warnings {
            self.session_hub
                .broadcast_channel(&battle_channel(&id), ServerMessage::TimeWarning { remaining }, None)
                .await;
        }
        for id in to_end {
            self.terminate(&id, true).await;
        }
    }

    /// Prunes battles whose grace period has elapsed, matching the
    /// original's delayed `_cleanup_battle`.
    pub async fn reap_expired(&self, now: u64) {
        let mut battles = self.battles.write().await;
        battles.retain(|_, battle| match battle.ended_at {
            Some(ended) => now.saturating_sub(ended) < GRACE_PERIOD_SECS,
            None => true,
        });
    }

    async fn terminate(&self, battle_id: &str, timeout: bool) {
        let finished = {
            let mut battles = self.battles.write().await;
            let Some(battle) = battles.get_mut(battle_id) else { return };
            if battle.phase == BattlePhase::Finished {
                return;
            }
            battle.phase = BattlePhase::Finished;
            battle.ended_at = Some(now_epoch_seconds());
            battle.winner_id = battle.resolve_winner().map(|s| s.to_string());
            battle.clone()
        };

        {
            let mut index = self.player_index.write().await;
            index.remove(&finished.side_a.player_id);
            index.remove(&finished.side_b.player_id);
        }

        let crowns_a = finished.crowns_a();
        let crowns_b = finished.crowns_b();
        let winner_crowns = crowns_a.max(crowns_b);
        let a_won = finished.winner_id.as_deref() == Some(finished.side_a.player_id.as_str());
        let b_won = finished.winner_id.as_deref() == Some(finished.side_b.player_id.as_str());
        let drew = finished.winner_id.is_none();

        let (a_rating_new, b_rating_new) = if drew {
            (finished.side_a.entering_rating, finished.side_b.entering_rating)
        } else if a_won {
            let change = ranking::calculate_rating_change(
                finished.side_a.entering_rating,
                finished.side_b.entering_rating,
                winner_crowns,
            );
            (change.new_winner_rating, change.new_loser_rating)
        } else {
            let change = ranking::calculate_rating_change(
                finished.side_b.entering_rating,
                finished.side_a.entering_rating,
                winner_crowns,
            );
            (change.new_loser_rating, change.new_winner_rating)
        };

        let a_trophy_change = ranking::trophy_change_for(crowns_a, a_won, drew);
        let b_trophy_change = ranking::trophy_change_for(crowns_b, b_won, drew);
        let a_gold = ranking::gold_reward_for(crowns_a, a_won);
        let b_gold = ranking::gold_reward_for(crowns_b, b_won);

        if let Err(err) = self
            .player_store
            .apply_settlement(
                &finished.side_a.player_id,
                SettlementDelta {
                    trophy_change: a_trophy_change,
                    rating: Some(a_rating_new),
                    gold_earned: a_gold,
                },
            )
            .await
        {
            warn!(battle_id, error = %err, "player store settlement failed for side_a");
        }
        if let Err(err) = self
            .player_store
            .apply_settlement(
                &finished.side_b.player_id,
                SettlementDelta {
                    trophy_change: b_trophy_change,
                    rating: Some(b_rating_new),
                    gold_earned: b_gold,
                },
            )
            .await
        {
            warn!(battle_id, error = %err, "player store settlement failed for side_b");
        }

        let result_a = ServerMessage::BattleResult {
            battle_id: finished.id.clone(),
            winner_id: finished.winner_id.clone(),
            player1_crowns: crowns_a,
            player2_crowns: crowns_b,
            timeout,
            your_result: BattleOutcomeDto {
                won: a_won,
                trophy_change: a_trophy_change,
                new_elo: a_rating_new,
                crowns: crowns_a,
                gold_earned: a_gold,
            },
        };
        let result_b = ServerMessage::BattleResult {
            battle_id: finished.id.clone(),
            winner_id: finished.winner_id.clone(),
            player1_crowns: crowns_a,
            player2_crowns: crowns_b,
            timeout,
            your_result: BattleOutcomeDto {
                won: b_won,
                trophy_change: b_trophy_change,
                new_elo: b_rating_new,
                crowns: crowns_b,
                gold_earned: b_gold,
            },
        };

        let _ = self.session_hub.send(&finished.side_a.player_id, result_a).await;
        let _ = self.session_hub.send(&finished.side_b.player_id, result_b).await;

        let channel = battle_channel(&finished.id);
        self.session_hub.unsubscribe(&finished.side_a.player_id, &channel).await;
        self.session_hub.unsubscribe(&finished.side_b.player_id, &channel).await;

        info!(battle_id, winner = ?finished.winner_id, "battle ended");
    }
}
