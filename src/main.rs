use axum::{
    routing::{get, post},
    Router,
};
use quizrelay::room::{self, ExpiryConfig};
use quizrelay::shared::AppState;
use quizrelay::websockets::{self, LivenessConfig};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizrelay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting quiz relay server");

    // Create shared application state with dependency injection
    let room_repository = Arc::new(room::repository::InMemoryRoomRepository::new());
    let connection_manager = Arc::new(websockets::InMemoryConnectionManager::new());
    let app_state = AppState::new(room_repository, connection_manager);

    // Background tasks: room expiry and connection liveness
    tokio::spawn(room::start_expiry_task(
        app_state.clone(),
        ExpiryConfig::default(),
    ));
    tokio::spawn(websockets::start_liveness_task(
        app_state.clone(),
        LivenessConfig::default(),
    ));

    let app = Router::new()
        .route("/room", post(room::create_room))
        .route("/room/:code", get(room::get_room))
        .route("/rooms", get(room::list_rooms))
        .route("/ws", get(websockets::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = match tokio::net::TcpListener::bind("0.0.0.0:3000").await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind 0.0.0.0:3000: {}", e);
            std::process::exit(1);
        }
    };
    info!("Server running on http://localhost:3000");
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
