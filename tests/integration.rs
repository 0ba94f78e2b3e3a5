// End-to-end scenarios driven over a real websocket connection against a
// freshly booted server instance: a happy match, a three-crown victory, a
// surrender, and a disconnect mid-battle. Scenarios requiring many seconds
// of wall-clock wait (tolerance widening, the 180s timeout draw) are instead
// covered as fast unit tests against Matchmaker/BattleCoordinator directly,
// which accept an explicit `now` and don't need to sleep for real.

mod support;

use std::time::Duration;

use support::{connect_and_auth, recv_json, sample_player, send_json, spawn_test_server};

/// Polls `recv_json` until a frame with the given `type` arrives, ignoring
/// any interleaved pushes (queue_status, online_count) along the way.
async fn recv_until(socket: &mut support::TestSocket, expected_type: &str) -> serde_json::Value {
    for _ in 0..50 {
        let msg = recv_json(socket).await;
        if msg["type"] == expected_type {
            return msg;
        }
    }
    panic!("never received a `{expected_type}` frame");
}

#[tokio::test]
async fn happy_match_pairs_two_queued_players() {
    let base = spawn_test_server(vec![sample_player("p1", 500, 1200), sample_player("p2", 520, 1190)]).await;

    let mut a = connect_and_auth(&base, "p1").await;
    let mut b = connect_and_auth(&base, "p2").await;

    send_json(&mut a, serde_json::json!({"type": "queue_join", "data": {"mode": "normal"}})).await;
    send_json(&mut b, serde_json::json!({"type": "queue_join", "data": {"mode": "normal"}})).await;

    recv_until(&mut a, "queue_joined").await;
    recv_until(&mut b, "queue_joined").await;

    let found_a = recv_until(&mut a, "match_found").await;
    let found_b = recv_until(&mut b, "match_found").await;

    assert_eq!(found_a["data"]["opponent"]["id"], "p2");
    assert_eq!(found_b["data"]["opponent"]["id"], "p1");
    assert_ne!(found_a["data"]["you_are"], found_b["data"]["you_are"]);
    assert_eq!(found_a["data"]["battle_id"], found_b["data"]["battle_id"]);

    let battle_id = found_a["data"]["battle_id"].as_str().unwrap().to_string();
    send_json(&mut a, serde_json::json!({"type": "battle_ready", "data": {"battle_id": battle_id}})).await;
    send_json(&mut b, serde_json::json!({"type": "battle_ready", "data": {"battle_id": battle_id}})).await;

    recv_until(&mut a, "battle_start").await;
    recv_until(&mut b, "battle_start").await;
}

async fn matched_and_started(base: &str, a_id: &str, b_id: &str) -> (support::TestSocket, support::TestSocket, String) {
    let mut a = connect_and_auth(base, a_id).await;
    let mut b = connect_and_auth(base, b_id).await;

    send_json(&mut a, serde_json::json!({"type": "queue_join", "data": {"mode": "normal"}})).await;
    send_json(&mut b, serde_json::json!({"type": "queue_join", "data": {"mode": "normal"}})).await;

    let found_a = recv_until(&mut a, "match_found").await;
    let battle_id = found_a["data"]["battle_id"].as_str().unwrap().to_string();
    recv_until(&mut b, "match_found").await;

    send_json(&mut a, serde_json::json!({"type": "battle_ready", "data": {"battle_id": battle_id}})).await;
    send_json(&mut b, serde_json::json!({"type": "battle_ready", "data": {"battle_id": battle_id}})).await;
    recv_until(&mut a, "battle_start").await;
    recv_until(&mut b, "battle_start").await;

    (a, b, battle_id)
}

#[tokio::test]
async fn three_crown_king_tower_hit_ends_the_battle() {
    let base = spawn_test_server(vec![sample_player("p1", 500, 1200), sample_player("p2", 520, 1190)]).await;
    let (mut a, mut b, battle_id) = matched_and_started(&base, "p1", "p2").await;

    send_json(
        &mut a,
        serde_json::json!({"type": "tower_damage", "data": {
            "battle_id": battle_id,
            "target_player": "player2",
            "target": "king",
            "damage": 4000,
        }}),
    )
    .await;

    let state = recv_until(&mut a, "battle_state").await;
    assert_eq!(state["data"]["player1_crowns"], 3);

    let result_a = recv_until(&mut a, "battle_result").await;
    assert_eq!(result_a["data"]["your_result"]["won"], true);
    assert_eq!(result_a["data"]["your_result"]["trophy_change"], 45);
    assert_eq!(result_a["data"]["your_result"]["gold_earned"], 110);

    let result_b = recv_until(&mut b, "battle_result").await;
    assert_eq!(result_b["data"]["your_result"]["won"], false);
    assert_eq!(result_b["data"]["your_result"]["trophy_change"], -20);
    assert_eq!(result_b["data"]["your_result"]["gold_earned"], 10);
}

#[tokio::test]
async fn surrender_hands_the_opponent_a_three_crown_win() {
    let base = spawn_test_server(vec![sample_player("p1", 500, 1200), sample_player("p2", 520, 1190)]).await;
    let (mut a, mut b, _battle_id) = matched_and_started(&base, "p1", "p2").await;

    send_json(&mut a, serde_json::json!({"type": "battle_end", "data": {"surrender": true}})).await;

    let result_a = recv_until(&mut a, "battle_result").await;
    assert_eq!(result_a["data"]["your_result"]["won"], false);
    assert_eq!(result_a["data"]["player2_crowns"], 3);

    let result_b = recv_until(&mut b, "battle_result").await;
    assert_eq!(result_b["data"]["your_result"]["won"], true);
    assert_eq!(result_b["data"]["winner_id"], "p2");
}

#[tokio::test]
async fn disconnect_mid_battle_awards_the_remaining_player_the_win() {
    let base = spawn_test_server(vec![sample_player("p1", 500, 1200), sample_player("p2", 520, 1190)]).await;
    let (a, mut b, _battle_id) = matched_and_started(&base, "p1", "p2").await;

    drop(a);
    // Give the server a moment to observe the closed connection and run
    // BattleCoordinator::on_disconnect before asserting on b's stream.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let result_b = recv_until(&mut b, "battle_result").await;
    assert_eq!(result_b["data"]["your_result"]["won"], true);
    assert_eq!(result_b["data"]["player2_crowns"], 3);
}

#[tokio::test]
async fn ending_without_surrender_settles_on_current_crown_state() {
    let base = spawn_test_server(vec![sample_player("p1", 500, 1200), sample_player("p2", 520, 1190)]).await;
    let (mut a, mut b, battle_id) = matched_and_started(&base, "p1", "p2").await;

    send_json(
        &mut a,
        serde_json::json!({"type": "tower_damage", "data": {
            "battle_id": battle_id,
            "target_player": "player2",
            "target": "left",
            "damage": 1000,
        }}),
    )
    .await;
    recv_until(&mut a, "battle_state").await;

    send_json(&mut a, serde_json::json!({"type": "battle_end", "data": {"surrender": false}})).await;

    let result_a = recv_until(&mut a, "battle_result").await;
    assert_eq!(result_a["data"]["your_result"]["won"], true);
    assert_eq!(result_a["data"]["winner_id"], "p1");

    let result_b = recv_until(&mut b, "battle_result").await;
    assert_eq!(result_b["data"]["your_result"]["won"], false);
}

#[tokio::test]
async fn unrecognized_message_type_gets_its_own_error_reason() {
    let base = spawn_test_server(vec![sample_player("p1", 500, 1200)]).await;
    let mut a = connect_and_auth(&base, "p1").await;

    send_json(&mut a, serde_json::json!({"type": "do_a_barrel_roll", "data": {}})).await;

    let err = recv_until(&mut a, "error").await;
    assert_eq!(err["data"]["reason"], "Unknown message type: do_a_barrel_roll");
}
