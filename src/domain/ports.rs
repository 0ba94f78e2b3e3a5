// Ports the core depends on but does not implement: durable player storage
// and token verification both live in out-of-scope collaborators reached
// through these traits.

use async_trait::async_trait;

use crate::domain::errors::{AuthError, PlayerStoreError};
use crate::domain::player::{PlayerRecord, SettlementDelta};

/// Port for reading and updating player records. A real implementation talks
/// to a durable key-value collaborator; this crate ships only an in-memory
/// reference adapter (interface_adapters::stores).
#[async_trait]
pub trait PlayerStore: Send + Sync {
    async fn get(&self, player_id: &str) -> Result<PlayerRecord, PlayerStoreError>;

    /// Applies a battle settlement to the player's trophies/rating/gold.
    /// Implementations must guard against a caller already holding this
    /// player's lock and fail loudly on reentrancy rather than deadlocking.
    async fn apply_settlement(
        &self,
        player_id: &str,
        delta: SettlementDelta,
    ) -> Result<PlayerRecord, PlayerStoreError>;
}

/// Port for verifying a client-presented session token. A real
/// implementation talks to a separate auth collaborator over the network;
/// token issuance/guest creation is out of scope here.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub player_id: String,
    pub username: String,
}
