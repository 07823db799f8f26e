use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use chrysalis_api::auth::{self, AppState, AppStateInner};
use chrysalis_api::middleware::require_auth;
use chrysalis_api::{achievements, meadows, proposals, resources, stages};
use chrysalis_gateway::connection;
use chrysalis_gateway::registry::Registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chrysalis=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("CHRYSALIS_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("CHRYSALIS_DB_PATH").unwrap_or_else(|_| "chrysalis.db".into());
    let host = std::env::var("CHRYSALIS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CHRYSALIS_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = chrysalis_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state: the connection registry is constructed here and
    // injected everywhere it is needed.
    let registry = Registry::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        registry: registry.clone(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/proposals", get(proposals::list_proposals))
        .route("/proposals", post(proposals::create_proposal))
        .route("/proposals/{id}", get(proposals::get_proposal))
        .route("/proposals/{id}", patch(proposals::update_proposal))
        .route("/proposals/{id}/start", post(proposals::start_voting))
        .route("/proposals/{id}/vote", post(proposals::cast_vote))
        .route("/proposals/{id}/close", post(proposals::close_voting))
        .route("/stages/transition", post(stages::transition_stage))
        .route("/stages/eligibility", get(stages::check_eligibility))
        .route("/stages/history", get(stages::stage_history))
        .route("/achievements", get(achievements::list_achievements))
        .route("/achievements/{id}/seen", post(achievements::mark_seen))
        .route("/achievements/refresh", post(achievements::refresh))
        .route("/meadows", get(meadows::list_meadows))
        .route("/meadows", post(meadows::create_meadow))
        .route("/meadows/{id}", get(meadows::get_meadow))
        .route("/meadows/{id}/join", post(meadows::join_meadow))
        .route("/meadows/{id}/leave", post(meadows::leave_meadow))
        .route("/meadows/{id}/complete", post(meadows::complete_meadow))
        .route("/resources", get(resources::list_resources))
        .route("/resources", post(resources::create_resource))
        .route("/resource-categories", get(resources::list_categories))
        .route("/resource-categories", post(resources::create_category))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Chrysalis server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let registry = state.registry.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, registry, jwt_secret))
}
