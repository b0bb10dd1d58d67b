use std::sync::Arc;

use chat_server::{handle_connection, ServerConfig, ServerState};
use chat_store::ChatStore;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();

    let store = match &config.fixture_path {
        Some(path) => ChatStore::load(path),
        None => ChatStore::seeded(),
    };
    let store = match store {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to load fixture: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Store ready with {} users and {} chats",
        store.user_count(),
        store.chat_count()
    );

    let state = Arc::new(ServerState::with_max_pending(
        Arc::new(store),
        config.max_pending,
    ));

    let listener = match TcpListener::bind(&config.addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.addr, e);
            std::process::exit(1);
        }
    };

    info!("Chat server listening on {}", config.addr);

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                info!("New connection from {}", peer_addr);

                let state = state.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws_stream) => {
                            handle_connection(ws_stream, state).await;
                        }
                        Err(e) => {
                            error!("WebSocket handshake failed for {}: {}", peer_addr, e);
                        }
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
