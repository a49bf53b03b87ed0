use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::TimeDelta;
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, CountDto, EntryFilter, EntryListDto, MessageResponse,
    RecentQuery,
};
use crate::domain::{self, EntryId};
use crate::models::{NewUsageEntry, UsageEntry, UsageEntryPatch};
use crate::services::Identity;

// ============================================================================
// Read-only
// ============================================================================

/// GET /entries
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EntryFilter>,
) -> Result<Json<ApiResponse<EntryListDto>>, ApiError> {
    let mut entries = state.storage().read_all().await?;
    entries.retain(|entry| filter.matches(entry));
    Ok(Json(ApiResponse::success(entries.into())))
}

/// GET /entries/count
pub async fn count_entries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CountDto>>, ApiError> {
    let storage = state.storage();
    let count = storage.count().await?;
    Ok(Json(ApiResponse::success(CountDto {
        count,
        backend: storage.kind().to_string(),
    })))
}

/// GET /entries/recent?days=N
pub async fn recent_entries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<EntryListDto>>, ApiError> {
    let since = TimeDelta::try_days(i64::from(query.days))
        .and_then(|window| domain::now().checked_sub_signed(window))
        .ok_or_else(|| ApiError::validation("days out of range"))?;
    let entries = state.storage().read_since(since).await?;
    Ok(Json(ApiResponse::success(entries.into())))
}

/// GET /entries/{id}
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UsageEntry>>, ApiError> {
    let entry = state.storage().read_by_id(EntryId::new(id)).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// GET /me/entries
/// Entries the caller owns, by display name or username
pub async fn my_entries(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<EntryListDto>>, ApiError> {
    let entries = state
        .storage()
        .read_by_owner(&[identity.display_name.as_str(), identity.username.as_str()])
        .await?;
    Ok(Json(ApiResponse::success(entries.into())))
}

// ============================================================================
// Mutations (session required)
// ============================================================================

/// POST /entries
/// A blank `employee_name` is filled from the caller's display name.
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(mut payload): Json<NewUsageEntry>,
) -> Result<(StatusCode, Json<ApiResponse<UsageEntry>>), ApiError> {
    if payload.employee_name.trim().is_empty() {
        payload.employee_name.clone_from(&identity.display_name);
    }
    state
        .auth()
        .authorize_entry_mutation(&identity, &payload.employee_name)?;

    let entry = state.storage().create(payload).await?;
    tracing::info!(id = %entry.id, user = %identity.username, "Entry created");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

/// PUT /entries/{id}
///
/// Ownership is checked against a read taken before the write. An owner
/// change landing between the two is not detected.
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
    Json(patch): Json<UsageEntryPatch>,
) -> Result<Json<ApiResponse<UsageEntry>>, ApiError> {
    let id = EntryId::new(id);
    let existing = state.storage().read_by_id(id).await?;
    state
        .auth()
        .authorize_entry_mutation(&identity, &existing.employee_name)?;
    if let Some(new_owner) = &patch.employee_name {
        state.auth().authorize_entry_mutation(&identity, new_owner)?;
    }

    let entry = state.storage().update(id, patch).await?;
    tracing::info!(id = %id, user = %identity.username, "Entry updated");

    Ok(Json(ApiResponse::success(entry)))
}

/// DELETE /entries/{id}
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = EntryId::new(id);
    let existing = state.storage().read_by_id(id).await?;
    state
        .auth()
        .authorize_entry_mutation(&identity, &existing.employee_name)?;

    state.storage().delete(id).await?;
    tracing::info!(id = %id, user = %identity.username, "Entry deleted");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Entry {id} deleted"),
    })))
}

/// POST /entries/{id}/duplicate
pub async fn duplicate_entry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<ApiResponse<UsageEntry>>), ApiError> {
    let id = EntryId::new(id);
    let existing = state.storage().read_by_id(id).await?;
    state
        .auth()
        .authorize_entry_mutation(&identity, &existing.employee_name)?;

    let copy = state.storage().duplicate(id).await?;
    tracing::info!(source = %id, id = %copy.id, user = %identity.username, "Entry duplicated");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(copy))))
}
