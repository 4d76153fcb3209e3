mod config;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::auth::{self, AppState, AppStateInner};
use parley_api::middleware::require_auth;
use parley_api::model::OpenAiGateway;
use parley_api::{chats, health, messages, users};
use parley_core::{ChatService, TurnOrchestrator};
use parley_db::Database;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,parley_api=debug,parley_core=debug,parley_db=info,tower_http=debug".into()),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Fix your environment or .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    let gateway = OpenAiGateway::new(
        &config.model.base_url,
        config.model.api_key.clone(),
        config.model.timeout,
    )?;
    info!(
        "Model gateway: {} ({})",
        gateway.endpoint(),
        config.model.model
    );

    // Shared state
    let turns = TurnOrchestrator::new(
        db.clone(),
        Arc::new(gateway),
        config.model.model.clone(),
        config.model.timeout,
    );
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        auth: config.auth,
        chats: ChatService::new(db),
        turns,
    });

    let app = router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Parley server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(app_state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/users", post(users::register))
        .route("/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/users/{id}", get(users::get_user).delete(users::delete_user))
        .route("/chats", get(chats::list_chats).post(chats::create_chat))
        .route(
            "/chats/{id}",
            get(chats::get_chat).put(chats::update_chat).delete(chats::delete_chat),
        )
        .route("/chats/clear/{id}", delete(chats::clear_chat))
        .route("/chats/talk/{id}", post(chats::talk))
        .route(
            "/messages/{chat_id}",
            get(messages::get_messages).post(messages::send_message),
        )
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    Router::new().merge(public_routes).merge(protected_routes)
}
