use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, put},
};
use entity::activities;
use platform_api::{ApiError, ApiResult, FieldError, JsonBody, Message, PathParam};
use platform_db::{ActivityStore, StoreError};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::AppConfig,
    validation::{ActivityPayload, validate_activity},
};

const CREATED: &str = "Successfully create activity";
const UPDATED: &str = "Successfully update activity";
const DELETED: &str = "Successfully delete activity";

#[derive(Clone)]
pub struct AppState {
    pub store: ActivityStore,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "activities server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/activities", get(list_activities).post(create_activity))
        .route(
            "/activities/{id}",
            put(update_activity).delete(delete_activity),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

#[instrument(name = "http.activities.list", skip_all)]
async fn list_activities(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<activities::Model>>> {
    let rows = state.store.list().await.map_err(|err| {
        error!(%err, "listing activities failed");
        ApiError::Internal(err.to_string())
    })?;
    Ok(Json(rows))
}

#[instrument(name = "http.activities.create", skip_all)]
async fn create_activity(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ActivityPayload>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let activity = validate_activity(payload).map_err(invalid)?;
    let id = state.store.create(activity).await.map_err(write_error)?;
    info!(id, "activity created");
    Ok((StatusCode::CREATED, Message::new(CREATED)))
}

#[instrument(name = "http.activities.update", skip(state, payload))]
async fn update_activity(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    JsonBody(payload): JsonBody<ActivityPayload>,
) -> ApiResult<Json<Message>> {
    let activity = validate_activity(payload).map_err(invalid)?;
    state
        .store
        .update(id, activity.into())
        .await
        .map_err(|err| match err {
            StoreError::NotFound => ApiError::BadRequest(format!("activity {id} not found")),
            other => write_error(other),
        })?;
    info!("activity updated");
    Ok(Message::new(UPDATED))
}

#[instrument(name = "http.activities.delete", skip(state))]
async fn delete_activity(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Message>> {
    state.store.delete(id).await.map_err(|err| match err {
        StoreError::NotFound => ApiError::NotFound(format!("activity {id} not found")),
        other => write_error(other),
    })?;
    info!("activity deleted");
    Ok(Message::new(DELETED))
}

fn invalid(errors: Vec<FieldError>) -> ApiError {
    let err = ApiError::Validation(errors);
    debug!(%err, "rejected activity payload");
    err
}

/// Maps write-path storage failures: statement errors stay client faults, outages do not.
fn write_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::NotFound("activity not found".into()),
        StoreError::Rejected(message) => {
            warn!(%message, "database rejected write");
            ApiError::BadRequest(message)
        }
        StoreError::Unavailable(message) => ApiError::Unavailable(message),
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.store.ping().await.is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
    info!("shutdown signal received");
}
