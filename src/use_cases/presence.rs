// Online-count and roster fan-out.

use std::sync::Arc;

use crate::domain::ports::PlayerStore;
use crate::interface_adapters::protocol::{RosterEntryDto, ServerMessage};
use crate::use_cases::session_hub::SessionHub;

pub struct PresenceBroadcaster {
    session_hub: Arc<SessionHub>,
    player_store: Arc<dyn PlayerStore>,
}

impl PresenceBroadcaster {
    pub fn new(session_hub: Arc<SessionHub>, player_store: Arc<dyn PlayerStore>) -> Self {
        Self {
            session_hub,
            player_store,
        }
    }

    /// Emits the current online count to every connected session. Called on
    /// every genuine connect/disconnect — a displaced session's teardown
    /// must NOT call this, or a reconnecting client would see its own old
    /// session's departure after its new session is already live.
    pub async fn broadcast_online_count(&self) {
        let count = self.session_hub.online_count().await;
        self.session_hub.broadcast_all(ServerMessage::OnlineCount { count }, None).await;
    }

    /// Answers a `get_online_players` request with a roster enriched from
    /// PlayerStore, excluding the requester.
    pub async fn online_players_for(&self, requester_id: &str) -> ServerMessage {
        let roster = self.session_hub.online_roster(Some(requester_id)).await;
        let mut players = Vec::with_capacity(roster.len());
        for player_id in roster {
            if let Ok(record) = self.player_store.get(&player_id).await {
                players.push(RosterEntryDto {
                    id: record.id.clone(),
                    name: record.username.clone(),
                    trophies: record.trophies,
                    arena: record.arena(),
                });
            }
        }
        ServerMessage::OnlinePlayers { players }
    }
}
