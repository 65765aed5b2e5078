use std::sync::Arc;

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    clients::{connector::ConnectorClient, health::HealthChecker},
    config::Config,
    models::{activity::InboundActivity, destination::DestinationRegistry, health::HealthStatus},
};

pub struct AppState {
    health_checker: HealthChecker,
    registry: Arc<DestinationRegistry>,
    connector: Arc<ConnectorClient>,
}

pub async fn run_api_server(
    config: Config,
    registry: Arc<DestinationRegistry>,
    connector: Arc<ConnectorClient>,
) -> Result<(), Error> {
    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(config.clone()),
        registry,
        connector,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/messages", post(receive_activity))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// The conversational front-end. A message activity binds the notification
/// destination to its conversation; anything else gets a short echo so the
/// sender sees the event was noticed.
async fn receive_activity(
    State(state): State<Arc<AppState>>,
    Json(activity): Json<InboundActivity>,
) -> impl IntoResponse {
    if activity.activity_type.eq_ignore_ascii_case("message") {
        state.registry.set(activity.destination());

        info!(
            conversation_id = %activity.conversation.id,
            channel_id = %activity.channel_id,
            "Conversation destination updated"
        );
    } else {
        let text = format!("{} event detected", activity.activity_type);

        if let Err(e) = state.connector.reply(&activity, &text).await {
            warn!(
                activity_type = %activity.activity_type,
                error = %e,
                "Failed to reply to non-message activity"
            );
        }
    }

    StatusCode::OK
}
