use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use eco_core::RecordStore;
use eco_persistence::{
    SeaOrmRecordStore,
    connection::connect_and_migrate,
    repositories::{QuizRepository, UserRepository},
};
use eco_server::{attempts::AttemptManager, auth::AuthService, config::Config, create_routes};

async fn shutdown_signal() {
    // Wait for SIGINT (Ctrl+C) or SIGTERM
    #[cfg(unix)]
    {
        let sigterm = signal::unix::signal(signal::unix::SignalKind::terminate());
        match sigterm {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received SIGINT, shutting down gracefully...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down gracefully...");
                    }
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Received Ctrl+C, shutting down gracefully...");
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting eco quiz server...");

    let config = Config::new();

    // Initialize database connection and run migrations
    let db = match connect_and_migrate().await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn RecordStore> = Arc::new(SeaOrmRecordStore::new(db.clone()));
    let user_repository = Arc::new(UserRepository::new(db.clone()));
    let quiz_repository = Arc::new(QuizRepository::new(db));
    let attempt_manager = Arc::new(AttemptManager::new(store));

    let auth_service = if config.auth_dev_mode {
        info!("Starting in development authentication mode - JWT validation disabled");
        Arc::new(AuthService::new_dev_mode())
    } else {
        if config.jwt_secret.is_empty() {
            warn!("JWT_SECRET is not set; every token will be rejected");
        }
        Arc::new(AuthService::new(
            &config.jwt_secret,
            config.jwt_audience.clone(),
        ))
    };

    let routes = create_routes(
        attempt_manager.clone(),
        auth_service,
        user_repository,
        quiz_repository,
    );

    // Start cleanup task
    let cleanup_attempt_manager = attempt_manager.clone();
    let cleanup_config = config.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            cleanup_config.cleanup_interval_seconds.max(1),
        ));
        loop {
            interval.tick().await;
            cleanup_attempt_manager.cleanup_stale(
                cleanup_config.result_display_delay(),
                cleanup_config.attempt_idle_timeout(),
            );
        }
    });

    let ip = match config.host.parse::<std::net::IpAddr>() {
        Ok(ip) => ip,
        Err(e) => {
            error!("Invalid HOST {:?}: {}", config.host, e);
            std::process::exit(1);
        }
    };

    info!("Server starting on {}:{}", config.host, config.port);

    let (addr, server) =
        warp::serve(routes).bind_with_graceful_shutdown((ip, config.port), shutdown_signal());

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
