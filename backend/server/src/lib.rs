//! Task, chat log and trip records kept in a hosted realtime document database.
//!
//!
//!
//! # General Infrastructure
//! - Stateless HTTP server, every record lives in the database
//! - One subtree per collection, each with its own integer id counter
//! - Task mutations ping a chat webhook, failures there never fail the request
//!
//!
//!
//! # Routes
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET, POST | `/task`, `/` | list the task tree, add a task |
//! | PUT, DELETE | `/task` | edit or remove the task named by `id` in the body |
//! | PUT, DELETE | `/tasks/{id}` | same, id in the path |
//! | GET, POST | `/chat` | read the chat log, append a prompt/reply pair |
//! | GET, POST | `/main` | read trips, record a trip |
//! | GET | `/test1`, `/health` | liveness |
//!
//!
//!
//! # Ids
//!
//! See [`allocator`]. The default counter strategy is a plain read-then-write, so two
//! simultaneous creates may get the same id. `ID_STRATEGY=transactional` closes that gap
//! with conditional writes.
//!
//!
//!
//! # Setup
//!
//! Local run against the in-memory store.
//! ```sh
//! STORE_BACKEND=memory RUST_LOG=info cargo run
//! ```
//!
//! Against Firebase.
//! ```sh
//! FIREBASE_DATABASE_URL=https://<db>.firebasedatabase.app \
//! FIREBASE_SERVICE_ACCOUNT="$(cat service-account.json)" \
//! SLACK_WEBHOOK_URL=https://hooks.slack.com/services/... \
//! cargo run
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, put},
};

#[cfg(unix)]
use signal::unix::{SignalKind, signal};
use signal::ctrl_c;
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod allocator;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod namespace;
pub mod notifier;
pub mod routes;
pub mod state;
pub mod utils;

#[cfg(test)]
mod testing;

use routes::{
    create_task_handler, delete_task_at_handler, delete_task_handler, health_handler,
    list_chat_handler, list_tasks_handler, list_trips_handler, log_chat_handler,
    record_trip_handler, update_task_at_handler, update_task_handler,
};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(list_tasks_handler).post(create_task_handler))
        .route(
            "/task",
            get(list_tasks_handler)
                .post(create_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        )
        .route(
            "/tasks/{id}",
            put(update_task_at_handler).delete(delete_task_at_handler),
        )
        .route("/chat", get(list_chat_handler).post(log_chat_handler))
        .route("/main", get(list_trips_handler).post(record_trip_handler))
        .route("/test1", get(health_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new()?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
