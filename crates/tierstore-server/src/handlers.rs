use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use tierstore_cache::CacheContext;
use tierstore_storage::Record;

use crate::error::ApiError;
use crate::server::{AppState, ServiceFor};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    tiers: Vec<String>,
    local_entries: usize,
}

pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok",
        tiers: state
            .cache
            .tier_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
        local_entries: state.local.len(),
    };
    (StatusCode::OK, Json(body))
}

// ---- CRUD, shared by every record type ----

fn request_context(state: &AppState) -> CacheContext {
    CacheContext::with_timeout(state.cache_deadline)
}

pub async fn list_records<R: Record>(
    State(state): State<AppState>,
) -> Result<Json<Vec<R>>, ApiError>
where
    AppState: ServiceFor<R>,
{
    let ctx = request_context(&state);
    let records = state.records::<R>().find_all(&ctx).await?;
    Ok(Json(records))
}

pub async fn read_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<R>, ApiError>
where
    AppState: ServiceFor<R>,
{
    let ctx = request_context(&state);
    let record = state.records::<R>().find_by_id(&ctx, id).await?;
    Ok(Json(record))
}

pub async fn create_record<R: Record>(
    State(state): State<AppState>,
    Json(payload): Json<R>,
) -> Result<(StatusCode, Json<R>), ApiError>
where
    AppState: ServiceFor<R>,
{
    let ctx = request_context(&state);
    let created = state.records::<R>().create(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut payload): Json<R>,
) -> Result<Json<R>, ApiError>
where
    AppState: ServiceFor<R>,
{
    if id <= 0 {
        return Err(ApiError::bad_request(format!("invalid {} id: {id}", R::ENTITY)));
    }
    payload.set_id(id);
    let ctx = request_context(&state);
    let updated = state.records::<R>().update(&ctx, payload).await?;
    Ok(Json(updated))
}

pub async fn delete_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    AppState: ServiceFor<R>,
{
    let ctx = request_context(&state);
    state.records::<R>().delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
