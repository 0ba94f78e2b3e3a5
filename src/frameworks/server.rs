// Framework bootstrap: wires the use cases into an AppState, spawns the
// background drivers, and serves the single `/ws` route.

use std::io::Result;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::Notify;

use crate::domain::ports::PlayerStore;
use crate::frameworks::config;
use crate::interface_adapters::clients::auth_client::AuthClient;
use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::stores::InMemoryPlayerStore;
use crate::use_cases::drivers::{battle_tick_driver, challenge_reap_driver, matchmaking_driver};
use crate::use_cases::{BattleCoordinator, ChallengeBroker, Matchmaker, PresenceBroadcaster, SessionHub};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let state = build_state()?;
    serve(listener, state).await
}

/// Serves the `/ws` route against an already-constructed `AppState`. Split
/// out from [`run`] so tests can supply isolated collaborators (an in-memory
/// `PlayerStore` seeded with fixtures, a fake `AuthVerifier`) instead of the
/// network-backed auth client.
pub async fn serve(listener: tokio::net::TcpListener, state: Arc<AppState>) -> Result<()> {
    let address = listener.local_addr()?;
    spawn_drivers(&state);

    let app = Router::new().route("/ws", get(ws_handler)).with_state(state);

    tracing::info!(%address, "listening");
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let host: IpAddr = config::listen_host()
        .parse()
        .unwrap_or_else(|_| IpAddr::from([127, 0, 0, 1]));
    let address = SocketAddr::new(host, config::listen_port());

    let listener = tokio::net::TcpListener::bind(address).await.inspect_err(|e| {
        tracing::error!(%address, error = %e, "failed to bind");
    })?;

    run(listener).await
}

/// Wires a set of already-constructed collaborators into an `AppState`,
/// bypassing `build_state`'s network-backed `AuthClient`. Used by the
/// integration test harness to seed an in-memory store and a fake verifier.
pub fn build_state_with(
    player_store: Arc<dyn PlayerStore>,
    auth_verifier: Arc<dyn crate::domain::ports::AuthVerifier>,
) -> Arc<AppState> {
    let session_hub = Arc::new(SessionHub::new(config::OUTBOUND_CHANNEL_CAPACITY));
    let battle_coordinator = Arc::new(BattleCoordinator::new(session_hub.clone(), player_store.clone()));
    let matchmaker = Arc::new(Matchmaker::new());
    let challenge_broker = Arc::new(ChallengeBroker::new(session_hub.clone(), battle_coordinator.clone()));
    let presence = Arc::new(PresenceBroadcaster::new(session_hub.clone(), player_store.clone()));

    Arc::new(AppState {
        session_hub,
        matchmaker,
        battle_coordinator,
        challenge_broker,
        presence,
        player_store,
        auth_verifier,
    })
}

fn build_state() -> Result<Arc<AppState>> {
    let auth_base_url = config::auth_service_url();
    let auth_verify_timeout = config::auth_verify_timeout();
    let auth_client = AuthClient::new(auth_base_url.clone(), auth_verify_timeout)
        .map_err(|e| std::io::Error::other(format!("failed to initialize auth client: {e}")))?;
    tracing::debug!(
        auth_base_url = %auth_base_url,
        auth_verify_timeout_ms = auth_verify_timeout.as_millis(),
        "auth client configured"
    );

    let session_hub = Arc::new(SessionHub::new(config::OUTBOUND_CHANNEL_CAPACITY));
    let player_store: Arc<dyn PlayerStore> = Arc::new(InMemoryPlayerStore::new());
    let battle_coordinator = Arc::new(BattleCoordinator::new(session_hub.clone(), player_store.clone()));
    let matchmaker = Arc::new(Matchmaker::new());
    let challenge_broker = Arc::new(ChallengeBroker::new(session_hub.clone(), battle_coordinator.clone()));
    let presence = Arc::new(PresenceBroadcaster::new(session_hub.clone(), player_store.clone()));

    Ok(Arc::new(AppState {
        session_hub,
        matchmaker,
        battle_coordinator,
        challenge_broker,
        presence,
        player_store,
        auth_verifier: Arc::new(auth_client),
    }))
}

/// Spawns the three background tick tasks. None of them are ever asked to
/// shut down today (the process lives as long as the listener); the shared
/// `Notify` exists so a future graceful-shutdown path has somewhere to hook
/// in without changing the driver signatures.
fn spawn_drivers(state: &Arc<AppState>) {
    let shutdown = Arc::new(Notify::new());

    tokio::spawn(matchmaking_driver(
        state.matchmaker.clone(),
        state.battle_coordinator.clone(),
        state.session_hub.clone(),
        config::MATCHMAKING_TICK_INTERVAL,
        shutdown.clone(),
    ));
    tokio::spawn(battle_tick_driver(
        state.battle_coordinator.clone(),
        config::BATTLE_TICK_INTERVAL,
        shutdown.clone(),
    ));
    tokio::spawn(challenge_reap_driver(
        state.challenge_broker.clone(),
        config::CHALLENGE_REAP_INTERVAL,
        shutdown,
    ));
}
