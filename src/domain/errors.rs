// Typed domain error enums, one per component, each with a manual Display
// impl rather than a derive macro.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NotConnected(String),
    UnknownChannel(String),
    Backpressure(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotConnected(id) => write!(f, "player {id} is not connected"),
            SessionError::UnknownChannel(ch) => write!(f, "channel {ch} does not exist"),
            SessionError::Backpressure(id) => write!(f, "send queue full for player {id}"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    AlreadyQueued(String),
    NotQueued(String),
    UnknownMode(String),
    AlreadyInBattle(String),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::AlreadyQueued(id) => write!(f, "player {id} is already queued"),
            QueueError::NotQueued(id) => write!(f, "player {id} is not queued"),
            QueueError::UnknownMode(mode) => write!(f, "unknown matchmaking mode {mode}"),
            QueueError::AlreadyInBattle(id) => write!(f, "player {id} is already in a battle"),
        }
    }
}

impl std::error::Error for QueueError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleError {
    NotFound(String),
    NotParticipant(String, String),
    NotActive(String),
    AlreadyFinished(String),
}

impl fmt::Display for BattleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattleError::NotFound(id) => write!(f, "battle {id} not found"),
            BattleError::NotParticipant(player, battle) => {
                write!(f, "player {player} is not a participant in battle {battle}")
            }
            BattleError::NotActive(id) => write!(f, "battle {id} is not active"),
            BattleError::AlreadyFinished(id) => write!(f, "battle {id} already finished"),
        }
    }
}

impl std::error::Error for BattleError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    NotFound(String),
    Expired(String),
    SelfChallenge(String),
    NotRecipient(String, String),
}

impl fmt::Display for ChallengeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeError::NotFound(id) => write!(f, "challenge {id} not found"),
            ChallengeError::Expired(id) => write!(f, "challenge {id} expired"),
            ChallengeError::SelfChallenge(id) => write!(f, "player {id} cannot challenge themselves"),
            ChallengeError::NotRecipient(player, challenge) => {
                write!(f, "player {player} is not the recipient of challenge {challenge}")
            }
        }
    }
}

impl std::error::Error for ChallengeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerStoreError {
    NotFound(String),
    ReentrantLock(String),
}

impl fmt::Display for PlayerStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerStoreError::NotFound(id) => write!(f, "player {id} not found"),
            PlayerStoreError::ReentrantLock(id) => write!(f, "reentrant lock acquisition on player {id}"),
        }
    }
}

impl std::error::Error for PlayerStoreError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidToken,
    SessionExpired,
    UpstreamUnavailable,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "invalid token"),
            AuthError::SessionExpired => write!(f, "session expired"),
            AuthError::UpstreamUnavailable => write!(f, "auth service unavailable"),
        }
    }
}

impl std::error::Error for AuthError {}
