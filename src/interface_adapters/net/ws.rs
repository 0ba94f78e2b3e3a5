// WebSocket handshake and per-connection message loop, split into bootstrap
// (auth handshake), the steady-state read/write loop, and disconnect
// cleanup. Every inbound frame is the single `ClientMessage` envelope.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::time::timeout;
use tracing::{info, info_span, warn};

use crate::domain::errors::AuthError;
use crate::domain::queue::{now_epoch_seconds, QueueEntry};
use crate::domain::session::clan_channel;
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage, CLIENT_MESSAGE_TYPES};
use crate::interface_adapters::state::AppState;
use crate::use_cases::matchmaker::MATCHMAKING_MODES;
use crate::use_cases::session_hub::{ConnHandle, DepartureKind};

const AUTH_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_INVALID_JSON: u32 = 10;
const MAX_CHAT_LEN: usize = 200;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let Some(mut ctx) = bootstrap_connection(&mut socket, &state).await else {
        return;
    };

    let span = info_span!("conn", player_id = %ctx.conn.player_id);
    let _enter = span.enter();
    info!("client authenticated");
    state.presence.broadcast_online_count().await;

    run_client_loop(&mut socket, &mut ctx, &state).await;

    disconnect_cleanup(&ctx.conn.player_id, ctx.conn.generation, &state).await;
}

struct ConnCtx {
    conn: ConnHandle,
    invalid_json: u32,
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), ()> {
    let text = serde_json::to_string(msg).map_err(|_| ())?;
    socket.send(Message::Text(text.into())).await.map_err(|_| ())
}

async fn send_close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
    let _ = socket.close().await;
}

/// Reads exactly one inbound frame, expects `{type:"auth", data:{token}}`,
/// verifies it, loads the player record, and registers the session — or
/// refuses with `auth_error` and closes.
async fn bootstrap_connection(socket: &mut WebSocket, state: &Arc<AppState>) -> Option<ConnCtx> {
    let incoming = match timeout(AUTH_HANDSHAKE_TIMEOUT, socket.recv()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        _ => {
            send_close(socket, close_code::POLICY, "auth timeout").await;
            return None;
        }
    };

    let token = match serde_json::from_str::<ClientMessage>(&incoming) {
        Ok(ClientMessage::Auth { token }) => token,
        _ => {
            let _ = send_message(
                socket,
                &ServerMessage::AuthError {
                    reason: "invalid".into(),
                    banned: None,
                },
            )
            .await;
            send_close(socket, close_code::POLICY, "auth required").await;
            return None;
        }
    };

    let identity = match state.auth_verifier.verify(&token).await {
        Ok(identity) => identity,
        Err(AuthError::UpstreamUnavailable) => {
            let _ = send_message(
                socket,
                &ServerMessage::AuthError {
                    reason: "invalid".into(),
                    banned: None,
                },
            )
            .await;
            send_close(socket, close_code::ERROR, "auth unavailable").await;
            return None;
        }
        Err(_) => {
            let _ = send_message(
                socket,
                &ServerMessage::AuthError {
                    reason: "invalid".into(),
                    banned: None,
                },
            )
            .await;
            send_close(socket, close_code::POLICY, "invalid token").await;
            return None;
        }
    };

    let record = match state.player_store.get(&identity.player_id).await {
        Ok(record) => record,
        Err(_) => {
            let _ = send_message(
                socket,
                &ServerMessage::AuthError {
                    reason: "invalid".into(),
                    banned: None,
                },
            )
            .await;
            send_close(socket, close_code::POLICY, "unknown player").await;
            return None;
        }
    };
    if record.banned {
        let _ = send_message(
            socket,
            &ServerMessage::AuthError {
                reason: "banned".into(),
                banned: Some(true),
            },
        )
        .await;
        send_close(socket, close_code::POLICY, "banned").await;
        return None;
    }

    let conn = state.session_hub.accept(record.id.clone(), record.username.clone()).await;
    if send_message(
        socket,
        &ServerMessage::AuthOk {
            player_id: record.id.clone(),
            username: record.username.clone(),
        },
    )
    .await
    .is_err()
    {
        state.session_hub.disconnect(&record.id, conn.generation).await;
        return None;
    }

    Some(ConnCtx { conn, invalid_json: 0 })
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx, state: &Arc<AppState>) {
    let player_id = ctx.conn.player_id.clone();
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(&text, &player_id, state, ctx).await;
                        if ctx.invalid_json > MAX_INVALID_JSON {
                            warn!(player_id = %player_id, "too many invalid messages; disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(player_id = %player_id, error = %e, "websocket recv error");
                        break;
                    }
                }
            }
            outgoing = ctx.conn.out_rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        if send_message(socket, &msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ctx.conn.shutdown.notified() => {
                info!(player_id = %player_id, "connection replaced by newer session");
                send_close(socket, close_code::POLICY, "connection replaced").await;
                break;
            }
        }
    }
}

async fn handle_inbound(text: &str, player_id: &str, state: &Arc<AppState>, ctx: &mut ConnCtx) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            ctx.invalid_json += 1;
            warn!(player_id, error = %e, "invalid client message");
            let _ = state
                .session_hub
                .send(player_id, ServerMessage::Error { reason: "Invalid JSON".into() })
                .await;
            return;
        }
    };

    let msg_type = value.get("type").and_then(serde_json::Value::as_str).map(str::to_string);
    let Some(msg_type) = msg_type else {
        ctx.invalid_json += 1;
        warn!(player_id, "client message missing a type tag");
        let _ = state
            .session_hub
            .send(player_id, ServerMessage::Error { reason: "Invalid JSON".into() })
            .await;
        return;
    };

    if !CLIENT_MESSAGE_TYPES.contains(&msg_type.as_str()) {
        ctx.invalid_json += 1;
        warn!(player_id, %msg_type, "unknown client message type");
        let _ = state
            .session_hub
            .send(player_id, ServerMessage::Error { reason: format!("Unknown message type: {msg_type}") })
            .await;
        return;
    }

    let parsed = match serde_json::from_value::<ClientMessage>(value) {
        Ok(msg) => msg,
        Err(e) => {
            ctx.invalid_json += 1;
            warn!(player_id, error = %e, "invalid client message");
            let _ = state
                .session_hub
                .send(player_id, ServerMessage::Error { reason: "Invalid JSON".into() })
                .await;
            return;
        }
    };

    if let Err(reason) = dispatch_message(parsed, player_id, state).await {
        let _ = state.session_hub.send(player_id, ServerMessage::Error { reason }).await;
    }
}

async fn dispatch_message(msg: ClientMessage, player_id: &str, state: &Arc<AppState>) -> Result<(), String> {
    match msg {
        ClientMessage::Auth { .. } => Ok(()),

        ClientMessage::QueueJoin { mode, deck } => {
            if !MATCHMAKING_MODES.contains(&mode.as_str()) {
                return Err(format!("Unknown matchmaking mode: {mode}"));
            }
            let record = state.player_store.get(player_id).await.map_err(|e| e.to_string())?;
            let deck = deck.unwrap_or_else(|| record.active_deck());
            let entry = QueueEntry::new(player_id.to_string(), mode.clone(), record.trophies, record.rating, deck);
            state.matchmaker.join_queue(entry).await.map_err(|e| e.to_string())?;
            let position = state.matchmaker.position(player_id).await.unwrap_or(1);
            let _ = state.session_hub.send(player_id, ServerMessage::QueueJoined { mode, position }).await;
            Ok(())
        }

        ClientMessage::QueueLeave {} => {
            let success = state.matchmaker.leave_queue(player_id).await.is_ok();
            let _ = state.session_hub.send(player_id, ServerMessage::QueueLeft { success }).await;
            Ok(())
        }

        ClientMessage::BattleReady { battle_id } => {
            state.battle_coordinator.ready(&battle_id, player_id).await.map_err(|e| e.to_string())
        }

        ClientMessage::BattleAction { battle_id, action } => state
            .battle_coordinator
            .action(&battle_id, player_id, action)
            .await
            .map_err(|e| e.to_string()),

        ClientMessage::TowerDamage {
            battle_id,
            target_player,
            target,
            damage,
        } => state
            .battle_coordinator
            .tower_damage(&battle_id, player_id, &target_player, &target, damage)
            .await
            .map_err(|e| e.to_string()),

        ClientMessage::BattleEnd { surrender } => state
            .battle_coordinator
            .surrender(player_id, surrender)
            .await
            .map_err(|e| e.to_string()),

        ClientMessage::ChatSend { channel, clan_id, message } => handle_chat(&channel, clan_id, message, player_id, state).await,

        ClientMessage::Subscribe { channel } => {
            state.session_hub.subscribe(player_id, &channel).await;
            Ok(())
        }

        ClientMessage::Unsubscribe { channel } => {
            state.session_hub.unsubscribe(player_id, &channel).await;
            Ok(())
        }

        ClientMessage::GetOnlinePlayers {} => {
            let msg = state.presence.online_players_for(player_id).await;
            let _ = state.session_hub.send(player_id, msg).await;
            Ok(())
        }

        ClientMessage::ChallengePlayer { target_id } => {
            let record = state.player_store.get(player_id).await.map_err(|e| e.to_string())?;
            state.challenge_broker.challenge(&record, &target_id).await.map_err(|e| e.to_string())
        }

        ClientMessage::ChallengeResponse { challenger_id, accepted } => {
            let target = state.player_store.get(player_id).await.map_err(|e| e.to_string())?;
            let challenger = state.player_store.get(&challenger_id).await.map_err(|e| e.to_string())?;
            state
                .challenge_broker
                .respond(player_id, &challenger_id, accepted, &target, &challenger)
                .await
                .map_err(|e| e.to_string())
        }

        ClientMessage::CancelChallenge {} => state.challenge_broker.cancel(player_id).await.map_err(|e| e.to_string()),
    }
}

async fn handle_chat(
    channel: &str,
    clan_id: Option<String>,
    message: String,
    player_id: &str,
    state: &Arc<AppState>,
) -> Result<(), String> {
    let message: String = message.chars().take(MAX_CHAT_LEN).collect();
    let record = state.player_store.get(player_id).await.map_err(|e| e.to_string())?;
    let out = ServerMessage::ChatMessage {
        channel: channel.to_string(),
        sender_id: player_id.to_string(),
        sender_name: record.username.clone(),
        message,
        timestamp: now_epoch_seconds(),
    };

    match channel {
        "clan" => {
            let clan_id = clan_id.or(record.clan_id).ok_or_else(|| "player has no clan".to_string())?;
            state.session_hub.broadcast_channel(&clan_channel(&clan_id), out, None).await;
        }
        _ => state.session_hub.broadcast_all(out, None).await,
    }
    Ok(())
}

async fn disconnect_cleanup(player_id: &str, generation: u64, state: &Arc<AppState>) {
    let kind = state.session_hub.disconnect(player_id, generation).await;
    if kind == DepartureKind::Current {
        let _ = state.matchmaker.leave_queue(player_id).await;
        state.battle_coordinator.on_disconnect(player_id).await;
        state.presence.broadcast_online_count().await;
        info!(player_id, "client disconnected");
    }
}
