use arena_duel_server::frameworks::server;

#[tokio::main]
async fn main() {
    if let Err(e) = server::run_with_config().await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}
