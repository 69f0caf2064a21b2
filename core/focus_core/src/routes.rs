use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::model::{parse_range_bound, NewSession, Session, Settings, SettingsUpdate};
use crate::quotes::QuoteService;
use crate::store::{SessionRepository, SettingsRepository};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub quotes: Arc<QuoteService>,
}

#[derive(Serialize)]
struct HealthInfo {
    ok: bool,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct Motivation {
    quote: String,
}

#[derive(Deserialize)]
struct DateRangeQuery {
    #[serde(rename = "startDate", default)]
    start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    end_date: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api/motivation", get(get_motivation))
        .route(
            "/api/session",
            get(get_sessions).post(post_session).options(options_ok),
        )
        .route("/api/session/date-range", get(get_sessions_in_range))
        .route(
            "/api/settings",
            get(get_settings).put(put_settings).options(options_ok),
        )
        .with_state(state)
        .layer(cors)
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

async fn health() -> impl IntoResponse {
    Json(HealthInfo {
        ok: true,
        service: "focus_core",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_motivation(State(state): State<AppState>) -> Json<Motivation> {
    let quote = state.quotes.quote().await;
    Json(Motivation { quote })
}

async fn post_session(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!("rejected session body: {e}");
        ApiError::InvalidSession
    })?;
    let new: NewSession = serde_json::from_value(payload).map_err(|e| {
        warn!("rejected session payload: {e}");
        ApiError::InvalidSession
    })?;
    if let Err(reason) = new.validate() {
        warn!("rejected session payload: {reason}");
        return Err(ApiError::InvalidSession);
    }

    let session = state.sessions.create(new).await.map_err(|e| {
        error!("create session failed: {e}");
        ApiError::store("Failed to create session", e)
    })?;
    info!(
        id = session.id,
        duration = session.duration,
        completed = session.completed,
        "session recorded"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_sessions(State(state): State<AppState>) -> Result<Json<Vec<Session>>, ApiError> {
    match state.sessions.list().await {
        Ok(sessions) => Ok(Json(sessions)),
        Err(err) => {
            error!("list sessions failed: {err}");
            Err(ApiError::store("Failed to fetch sessions", err))
        }
    }
}

async fn get_sessions_in_range(
    State(state): State<AppState>,
    Query(q): Query<DateRangeQuery>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(start), Some(end)) = (non_empty(q.start_date), non_empty(q.end_date)) else {
        return Err(ApiError::MissingDateRange);
    };
    let (Some(start), Some(end)) = (parse_range_bound(&start), parse_range_bound(&end)) else {
        return Err(ApiError::InvalidDateRange);
    };

    match state.sessions.list_between(start, end).await {
        Ok(sessions) => Ok(Json(sessions)),
        Err(err) => {
            error!("list sessions by range failed: {err}");
            Err(ApiError::store("Failed to fetch sessions", err))
        }
    }
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, ApiError> {
    match state.settings.get().await {
        Ok(settings) => Ok(Json(settings)),
        Err(err) => {
            error!("load settings failed: {err}");
            Err(ApiError::store("Failed to fetch settings", err))
        }
    }
}

async fn put_settings(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Settings>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!("rejected settings body: {e}");
        ApiError::InvalidSettings
    })?;
    let update: SettingsUpdate = serde_json::from_value(payload).map_err(|e| {
        warn!("rejected settings payload: {e}");
        ApiError::InvalidSettings
    })?;
    if let Err(reason) = update.validate() {
        warn!("rejected settings payload: {reason}");
        return Err(ApiError::InvalidSettings);
    }

    match state.settings.update(update).await {
        Ok(settings) => {
            info!("settings updated");
            Ok(Json(settings))
        }
        Err(err) => {
            error!("update settings failed: {err}");
            Err(ApiError::store("Failed to update settings", err))
        }
    }
}
