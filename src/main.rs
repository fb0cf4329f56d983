use actix_cors::Cors;
use actix_files::Files;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use relaychat_server::relay::RelayServer;
use relaychat_server::{gateway, AppError, AppState, Settings};
use std::net::TcpListener;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> relaychat_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully");

    // Initialize application state
    let state = web::Data::new(AppState::new(config).await?);
    let settings = state.config.clone();

    // The relay listens on its own port and shares the session store and
    // hub with the HTTP gateway through AppState.
    let relay_server = Arc::new(RelayServer::new(
        state.sessions.clone(),
        state.hub.clone(),
        settings.relay.heartbeat_interval_ms,
    ));
    let relay_addr = format!("{}:{}", settings.server.host, settings.relay.port);
    let relay_listener = tokio::net::TcpListener::bind(&relay_addr).await?;
    info!("Relay listening at ws://{}", relay_addr);

    tokio::spawn(async move {
        loop {
            match relay_listener.accept().await {
                Ok((stream, addr)) => {
                    let server = relay_server.clone();
                    tokio::spawn(server.handle_connection(stream, addr));
                }
                Err(e) => error!("relay accept failed: {}", e),
            }
        }
    });

    // Create and bind TCP listener for the HTTP gateway
    let listener = TcpListener::bind(format!("{}:{}", settings.server.host, settings.server.port))?;
    info!(
        "HTTP gateway listening at http://{}:{}",
        settings.server.host, settings.server.port
    );

    let workers = settings.server.workers as usize;
    HttpServer::new(move || {
        let cors = if settings.cors.enabled {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST"])
                .allowed_headers(vec!["Content-Type"])
                .supports_credentials();
            for origin in &settings.cors.allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        } else {
            // Same-origin deployment; keep the most restrictive settings
            Cors::default()
        };

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(gateway::configure)
            .service(
                Files::new("/", settings.assets.public_dir.clone())
                    .index_file("index.html")
                    // SPA routing: unknown paths fall back to the entry document
                    .default_handler(web::get().to(gateway::handlers::spa_index)),
            )
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(())
}
