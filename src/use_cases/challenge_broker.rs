// Direct player-to-player challenges: issue, accept/decline, cancel, and
// the periodic reap of stale pending invitations.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::domain::battle::BattleSide;
use crate::domain::challenge::{now_epoch_seconds, PendingChallenge};
use crate::domain::errors::ChallengeError;
use crate::domain::player::PlayerRecord;
use crate::interface_adapters::protocol::{ServerMessage, Side};
use crate::use_cases::battle_coordinator::BattleCoordinator;
use crate::use_cases::session_hub::SessionHub;

pub struct ChallengeBroker {
    session_hub: Arc<SessionHub>,
    battle_coordinator: Arc<BattleCoordinator>,
    pending: RwLock<HashMap<String, PendingChallenge>>,
}

impl ChallengeBroker {
    pub fn new(session_hub: Arc<SessionHub>, battle_coordinator: Arc<BattleCoordinator>) -> Self {
        Self {
            session_hub,
            battle_coordinator,
            pending: RwLock::new(HashMap::new()),
        }
    }

    pub async fn challenge(&self, challenger: &PlayerRecord, target_id: &str) -> Result<(), ChallengeError> {
        if challenger.id == target_id {
            return Err(ChallengeError::SelfChallenge(challenger.id.clone()));
        }
        if !self.session_hub.is_online(target_id).await {
            return Err(ChallengeError::NotFound(target_id.to_string()));
        }

        let id = format!("{}:{}", challenger.id, now_epoch_seconds());
        let record = PendingChallenge::new(id, challenger.id.clone(), target_id.to_string(), "pvp".to_string());
        self.pending.write().await.insert(challenger.id.clone(), record);

        self.session_hub
            .send(
                target_id,
                ServerMessage::ChallengeReceived {
                    challenger_id: challenger.id.clone(),
                    challenger_name: challenger.username.clone(),
                    challenger_trophies: challenger.trophies,
                },
            )
            .await
            .ok();
        self.session_hub
            .send(
                &challenger.id,
                ServerMessage::ChallengeSent {
                    target_id: target_id.to_string(),
                },
            )
            .await
            .ok();
        info!(challenger = %challenger.id, target = %target_id, "challenge issued");
        Ok(())
    }

    pub async fn respond(
        &self,
        target_id: &str,
        challenger_id: &str,
        accepted: bool,
        target: &PlayerRecord,
        challenger: &PlayerRecord,
    ) -> Result<(), ChallengeError> {
        let removed = self.pending.write().await.remove(challenger_id);
        let pending = removed.ok_or_else(|| ChallengeError::NotFound(challenger_id.to_string()))?;
        if pending.challenged_id != target_id {
            return Err(ChallengeError::NotRecipient(target_id.to_string(), challenger_id.to_string()));
        }

        if !accepted {
            self.session_hub
                .send(
                    challenger_id,
                    ServerMessage::ChallengeDeclined {
                        target_id: target_id.to_string(),
                    },
                )
                .await
                .ok();
            return Ok(());
        }

        let side_a = BattleSide::new(
            challenger.id.clone(),
            challenger.active_deck(),
            challenger.trophies,
            challenger.rating,
        );
        let side_b = BattleSide::new(target.id.clone(), target.active_deck(), target.trophies, target.rating);
        let battle_id = self.battle_coordinator.create(side_a, side_b, "pvp".to_string()).await;

        self.session_hub
            .send(
                challenger_id,
                ServerMessage::ChallengeAccepted {
                    battle_id: battle_id.clone(),
                    you_are: Side::Player1,
                },
            )
            .await
            .ok();
        self.session_hub
            .send(
                target_id,
                ServerMessage::ChallengeAccepted {
                    battle_id,
                    you_are: Side::Player2,
                },
            )
            .await
            .ok();
        Ok(())
    }

    pub async fn cancel(&self, challenger_id: &str) -> Result<(), ChallengeError> {
        let removed = self
            .pending
            .write()
            .await
            .remove(challenger_id)
            .ok_or_else(|| ChallengeError::NotFound(challenger_id.to_string()))?;

        self.session_hub
            .send(
                &removed.challenged_id,
                ServerMessage::ChallengeCancelled {
                    challenger_id: challenger_id.to_string(),
                },
            )
            .await
            .ok();
        Ok(())
    }

    /// Removes challenges past the reap window (the broker is ticked every
    /// 60 seconds).
    pub async fn reap_expired(&self, now: u64) {
        self.pending.write().await.retain(|_, c| !c.is_expired(now));
    }
}
