// Channel naming helpers. SessionHub owns the actual session registry; see
// use_cases::session_hub.

/// Builds the flat channel name for a battle's multicast group.
pub fn battle_channel(battle_id: &str) -> String {
    format!("battle:{battle_id}")
}

/// Builds the flat channel name for a clan's multicast group.
pub fn clan_channel(clan_id: &str) -> String {
    format!("clan:{clan_id}")
}
