pub mod battle;
pub mod challenge;
pub mod errors;
pub mod player;
pub mod ports;
pub mod queue;
pub mod session;

pub use battle::{Battle, BattlePhase, BattleSide, TowerHp};
pub use challenge::PendingChallenge;
pub use errors::{AuthError, BattleError, ChallengeError, PlayerStoreError, QueueError, SessionError};
pub use player::{PlayerRecord, SettlementDelta};
pub use ports::{AuthVerifier, PlayerStore, VerifiedIdentity};
pub use queue::QueueEntry;
