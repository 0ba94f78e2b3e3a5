// Shared primitives for booting isolated server instances per integration
// test. Each test gets its own in-process server rather than one
// process-wide instance, since matchmaking/battle state is test-mutated and
// scenarios would otherwise interfere with each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arena_duel_server::domain::errors::AuthError;
use arena_duel_server::domain::player::PlayerRecord;
use arena_duel_server::domain::ports::{AuthVerifier, VerifiedIdentity};
use arena_duel_server::interface_adapters::stores::InMemoryPlayerStore;
use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Test-only auth collaborator: treats the bearer token as the player_id
/// verbatim, so tests can "authenticate" a seeded fixture by sending its id
/// as the token. Mirrors the real `AuthClient` shape without the network hop.
struct FakeAuthVerifier {
    known: HashMap<String, String>,
}

#[async_trait]
impl AuthVerifier for FakeAuthVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.known
            .get(token)
            .map(|username| VerifiedIdentity {
                player_id: token.to_string(),
                username: username.clone(),
            })
            .ok_or(AuthError::InvalidToken)
    }
}

pub type TestSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Spawns a fresh server on an ephemeral port seeded with the given player
/// fixtures, and returns its ws:// base URL. Each call gets its own
/// Matchmaker/BattleCoordinator/SessionHub/PlayerStore, so tests never
/// observe each other's queues or battles.
pub async fn spawn_test_server(players: Vec<PlayerRecord>) -> String {
    let player_store = Arc::new(InMemoryPlayerStore::new());
    let mut known = HashMap::new();
    for record in players {
        known.insert(record.id.clone(), record.username.clone());
        player_store.seed(record).await;
    }
    let auth_verifier = Arc::new(FakeAuthVerifier { known });

    let state = arena_duel_server::build_state_with(player_store, auth_verifier);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let _ = arena_duel_server::serve(listener, state).await;
    });

    format!("ws://{addr}/ws")
}

/// Connects and completes the auth handshake (token == player_id), returning
/// the open socket positioned right after `auth_ok`.
pub async fn connect_and_auth(base_url: &str, player_id: &str) -> TestSocket {
    let (mut socket, _) = connect_async(base_url).await.expect("ws connect");
    send_json(&mut socket, serde_json::json!({"type": "auth", "data": {"token": player_id}})).await;
    let reply = recv_json(&mut socket).await;
    assert_eq!(reply["type"], "auth_ok", "expected auth_ok, got {reply}");
    socket
}

pub async fn send_json(socket: &mut TestSocket, value: serde_json::Value) {
    use futures_util::SinkExt;
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

/// Receives the next text frame and parses it as JSON, with a bounded wait
/// so a protocol regression fails the test instead of hanging the suite.
pub async fn recv_json(socket: &mut TestSocket) -> serde_json::Value {
    use futures_util::StreamExt;
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for server message")
            .expect("socket closed unexpectedly")
            .expect("websocket error");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).expect("valid json frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

pub fn sample_player(id: &str, trophies: i64, rating: i64) -> PlayerRecord {
    PlayerRecord {
        id: id.to_string(),
        username: format!("user-{id}"),
        trophies,
        rating,
        deck: vec!["knight".to_string(), "archers".to_string()],
        current_deck: 0,
        banned: false,
        clan_id: None,
        extra: serde_json::json!({}),
    }
}
