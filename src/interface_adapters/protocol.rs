// Wire protocol DTOs: every client-to-server and server-to-client message
// shape, tagged by `type` with the payload nested under `data`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every `type` tag a well-formed client frame may carry. Used to tell a
/// genuinely unrecognized message type apart from a malformed payload for a
/// type we do recognize.
pub const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "auth",
    "queue_join",
    "queue_leave",
    "battle_ready",
    "battle_action",
    "tower_damage",
    "battle_end",
    "chat_send",
    "subscribe",
    "unsubscribe",
    "get_online_players",
    "challenge_player",
    "challenge_response",
    "cancel_challenge",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth { token: String },
    QueueJoin { mode: String, #[serde(default)] deck: Option<Vec<String>> },
    QueueLeave {},
    BattleReady { battle_id: String },
    BattleAction { battle_id: String, action: Value },
    TowerDamage {
        battle_id: String,
        target_player: String,
        target: String,
        damage: i64,
    },
    BattleEnd { #[serde(default)] surrender: bool },
    ChatSend {
        #[serde(default = "default_channel")]
        channel: String,
        #[serde(default)]
        clan_id: Option<String>,
        message: String,
    },
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    GetOnlinePlayers {},
    ChallengePlayer { target_id: String },
    ChallengeResponse { challenger_id: String, accepted: bool },
    CancelChallenge {},
}

fn default_channel() -> String {
    "global".to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthOk { player_id: String, username: String },
    AuthError { reason: String, #[serde(skip_serializing_if = "Option::is_none")] banned: Option<bool> },
    Error { reason: String },
    QueueJoined { mode: String, position: usize },
    QueueLeft { success: bool },
    QueueStatus {
        position: usize,
        queue_size: usize,
        estimated_wait: u64,
        mode: String,
    },
    MatchFound {
        battle_id: String,
        opponent: OpponentDto,
        mode: String,
        you_are: Side,
    },
    BattleStart {
        start_time: u64,
        duration: u64,
        elixir_rate: f64,
    },
    BattleAction {
        action: Value,
        from: Side,
    },
    BattleState {
        player1_hp: TowerHpDto,
        player2_hp: TowerHpDto,
        player1_crowns: u8,
        player2_crowns: u8,
    },
    TimeWarning {
        remaining: u64,
    },
    BattleResult {
        battle_id: String,
        winner_id: Option<String>,
        player1_crowns: u8,
        player2_crowns: u8,
        timeout: bool,
        your_result: BattleOutcomeDto,
    },
    ChatMessage {
        channel: String,
        sender_id: String,
        sender_name: String,
        message: String,
        timestamp: u64,
    },
    OnlineCount {
        count: usize,
    },
    OnlinePlayers {
        players: Vec<RosterEntryDto>,
    },
    ChallengeReceived { challenger_id: String, challenger_name: String, challenger_trophies: i64 },
    ChallengeSent { target_id: String },
    ChallengeAccepted { battle_id: String, you_are: Side },
    ChallengeDeclined { target_id: String },
    ChallengeCancelled { challenger_id: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player1,
    Player2,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpponentDto {
    pub id: String,
    pub trophies: i64,
    pub deck: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TowerHpDto {
    pub king: i64,
    pub left: i64,
    pub right: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BattleOutcomeDto {
    pub won: bool,
    pub trophy_change: i64,
    pub new_elo: i64,
    pub crowns: u8,
    pub gold_earned: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterEntryDto {
    pub id: String,
    pub name: String,
    pub trophies: i64,
    pub arena: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_client_message_type_tag_round_trips() {
        for tag in CLIENT_MESSAGE_TYPES {
            let value = match *tag {
                "auth" => serde_json::json!({"type": tag, "data": {"token": "t"}}),
                "queue_join" => serde_json::json!({"type": tag, "data": {"mode": "normal"}}),
                "queue_leave" | "get_online_players" | "cancel_challenge" => {
                    serde_json::json!({"type": tag, "data": {}})
                }
                "battle_ready" => serde_json::json!({"type": tag, "data": {"battle_id": "b"}}),
                "battle_action" => serde_json::json!({"type": tag, "data": {"battle_id": "b", "action": {}}}),
                "tower_damage" => serde_json::json!({"type": tag, "data": {
                    "battle_id": "b", "target_player": "player1", "target": "king", "damage": 100
                }}),
                "battle_end" => serde_json::json!({"type": tag, "data": {}}),
                "chat_send" => serde_json::json!({"type": tag, "data": {"message": "hi"}}),
                "subscribe" | "unsubscribe" => serde_json::json!({"type": tag, "data": {"channel": "global"}}),
                "challenge_player" => serde_json::json!({"type": tag, "data": {"target_id": "p2"}}),
                "challenge_response" => serde_json::json!({"type": tag, "data": {"challenger_id": "p2", "accepted": true}}),
                other => panic!("add a fixture for client message type {other}"),
            };
            serde_json::from_value::<ClientMessage>(value)
                .unwrap_or_else(|e| panic!("type tag {tag:?} should deserialize: {e}"));
        }
    }

    #[test]
    fn unknown_type_tag_is_rejected_by_the_known_list() {
        assert!(!CLIENT_MESSAGE_TYPES.contains(&"do_a_barrel_roll"));
    }
}
