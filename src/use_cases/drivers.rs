// Background tick tasks driving Matchmaker, BattleCoordinator, and
// ChallengeBroker on their own intervals. Each driver owns nothing; it only
// calls into the already-locked use case it drives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use crate::domain::battle::{now_epoch_seconds, BattleSide};
use crate::interface_adapters::protocol::{OpponentDto, ServerMessage, Side};
use crate::use_cases::battle_coordinator::BattleCoordinator;
use crate::use_cases::challenge_broker::ChallengeBroker;
use crate::use_cases::matchmaker::{Matchmaker, MATCHMAKING_MODES};
use crate::use_cases::session_hub::SessionHub;

/// Runs once per second: widens every waiting entry's tolerance, attempts a
/// pair per mode, and on a miss pushes `queue_status` to everyone still
/// waiting.
pub async fn matchmaking_driver(
    matchmaker: Arc<Matchmaker>,
    battle_coordinator: Arc<BattleCoordinator>,
    session_hub: Arc<SessionHub>,
    interval: Duration,
    shutdown: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = ticker.tick() => {}
        }

        for &mode in MATCHMAKING_MODES {
            let now = now_epoch_seconds();
            if let Some((a, b)) = matchmaker.find_match(mode, now).await {
                let side_a = BattleSide::new(a.player_id.clone(), a.deck.clone(), a.trophies, a.rating);
                let side_b = BattleSide::new(b.player_id.clone(), b.deck.clone(), b.trophies, b.rating);
                let battle_id = battle_coordinator.create(side_a, side_b, mode.to_string()).await;
                info!(mode, battle_id, p1 = %a.player_id, p2 = %b.player_id, "match found");

                let _ = session_hub
                    .send(
                        &a.player_id,
                        ServerMessage::MatchFound {
                            battle_id: battle_id.clone(),
                            opponent: OpponentDto {
                                id: b.player_id.clone(),
                                trophies: b.trophies,
                                deck: b.deck.clone(),
                            },
                            mode: mode.to_string(),
                            you_are: Side::Player1,
                        },
                    )
                    .await;
                let _ = session_hub
                    .send(
                        &b.player_id,
                        ServerMessage::MatchFound {
                            battle_id,
                            opponent: OpponentDto {
                                id: a.player_id.clone(),
                                trophies: a.trophies,
                                deck: a.deck.clone(),
                            },
                            mode: mode.to_string(),
                            you_are: Side::Player2,
                        },
                    )
                    .await;
            } else {
                for entry in matchmaker.snapshot(mode).await {
                    let position = matchmaker.position(&entry.player_id).await.unwrap_or(0);
                    let queue_size = matchmaker.queue_size(mode).await;
                    let estimated_wait = matchmaker.estimated_wait(mode).await;
                    let _ = session_hub
                        .send(
                            &entry.player_id,
                            ServerMessage::QueueStatus {
                                position,
                                queue_size,
                                estimated_wait,
                                mode: mode.to_string(),
                            },
                        )
                        .await;
                }
            }
        }
    }
}

/// Runs once per second: advances battle timeouts/warnings and prunes
/// battles past their post-finish grace period.
pub async fn battle_tick_driver(battle_coordinator: Arc<BattleCoordinator>, interval: Duration, shutdown: Arc<Notify>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = ticker.tick() => {}
        }
        let now = now_epoch_seconds();
        battle_coordinator.tick(now).await;
        battle_coordinator.reap_expired(now).await;
    }
}

/// Reaps challenges past `CHALLENGE_REAP_SECS` on the broker's own cadence.
pub async fn challenge_reap_driver(challenge_broker: Arc<ChallengeBroker>, interval: Duration, shutdown: Arc<Notify>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = ticker.tick() => {}
        }
        challenge_broker.reap_expired(now_epoch_seconds()).await;
    }
}
