// Shared application state handed to every axum route.

use std::sync::Arc;

use crate::domain::ports::{AuthVerifier, PlayerStore};
use crate::use_cases::{BattleCoordinator, ChallengeBroker, Matchmaker, PresenceBroadcaster, SessionHub};

#[derive(Clone)]
pub struct AppState {
    pub session_hub: Arc<SessionHub>,
    pub matchmaker: Arc<Matchmaker>,
    pub battle_coordinator: Arc<BattleCoordinator>,
    pub challenge_broker: Arc<ChallengeBroker>,
    pub presence: Arc<PresenceBroadcaster>,
    pub player_store: Arc<dyn PlayerStore>,
    pub auth_verifier: Arc<dyn AuthVerifier>,
}
