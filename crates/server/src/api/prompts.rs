//! # Prompt Config API
//!
//! Admin CRUD for the editable prompt configs, plus preview against a real
//! release and reset to the bundled default.

use axum::{
    extract::{Path, State},
    Json,
};
use pressroom_core::prompts::{PromptConfig, RenderedPrompt};
use pressroom_core::state::PromptUpdate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::auth::AdminAuth;
use super::error::{ApiError, ApiResult};
use super::SharedState;

#[derive(Debug, Serialize)]
pub struct PromptDetail {
    #[serde(flatten)]
    pub config: PromptConfig,
    /// Variables referenced by either template
    pub variables: Vec<String>,
}

impl From<PromptConfig> for PromptDetail {
    fn from(config: PromptConfig) -> Self {
        Self {
            variables: config.variables(),
            config,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    pub release_id: String,
}

fn load(state: &SharedState, slug: &str) -> ApiResult<PromptConfig> {
    state
        .db
        .get_prompt(slug)?
        .ok_or_else(|| ApiError::NotFound(format!("prompt not found: {}", slug)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/prompts",
    tag = "prompts",
    security(("admin_token" = [])),
    responses((status = 200, description = "All prompt configs"))
)]
pub async fn list_prompts(
    _: AdminAuth,
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<PromptDetail>>> {
    let prompts = state.db.list_prompts()?;
    Ok(Json(prompts.into_iter().map(PromptDetail::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/prompts/{slug}",
    tag = "prompts",
    security(("admin_token" = [])),
    params(("slug" = String, Path, description = "Prompt slug")),
    responses((status = 200, description = "Prompt config"), (status = 404, description = "Unknown slug", body = super::error::ErrorBody))
)]
pub async fn get_prompt(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PromptDetail>> {
    Ok(Json(load(&state, &slug)?.into()))
}

/// Partial update; bumps the version
#[utoipa::path(
    patch,
    path = "/api/v1/admin/prompts/{slug}",
    request_body = Object,
    tag = "prompts",
    security(("admin_token" = [])),
    params(("slug" = String, Path, description = "Prompt slug")),
    responses((status = 200, description = "Updated prompt config"), (status = 400, description = "Invalid settings", body = super::error::ErrorBody))
)]
pub async fn update_prompt(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    Json(update): Json<PromptUpdate>,
) -> ApiResult<Json<PromptDetail>> {
    load(&state, &slug)?;
    let config = state
        .db
        .update_prompt(&slug, update)
        .map_err(ApiError::bad_request)?;
    tracing::info!(prompt = %slug, version = config.version, "Prompt config updated");
    Ok(Json(config.into()))
}

/// Create the prompt if the slug is new, otherwise update it like PATCH
#[utoipa::path(
    put,
    path = "/api/v1/admin/prompts/{slug}",
    request_body = Object,
    tag = "prompts",
    security(("admin_token" = [])),
    params(("slug" = String, Path, description = "Prompt slug")),
    responses((status = 200, description = "Saved prompt config"), (status = 400, description = "Invalid settings", body = super::error::ErrorBody))
)]
pub async fn upsert_prompt(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    Json(update): Json<PromptUpdate>,
) -> ApiResult<Json<PromptDetail>> {
    let config = state
        .db
        .upsert_prompt(&slug, update)
        .map_err(ApiError::bad_request)?;
    tracing::info!(prompt = %slug, version = config.version, "Prompt config saved");
    Ok(Json(config.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/prompts/{slug}/reset",
    tag = "prompts",
    security(("admin_token" = [])),
    params(("slug" = String, Path, description = "Prompt slug")),
    responses((status = 200, description = "Default restored"))
)]
pub async fn reset_prompt(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PromptDetail>> {
    let config = state
        .db
        .reset_prompt(&slug)
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(Json(config.into()))
}

/// Render against a release without calling the model
#[utoipa::path(
    post,
    path = "/api/v1/admin/prompts/{slug}/preview",
    tag = "prompts",
    security(("admin_token" = [])),
    params(("slug" = String, Path, description = "Prompt slug")),
    request_body = PreviewRequest,
    responses((status = 200, description = "Rendered system and user prompts with any missing variables"))
)]
pub async fn preview_prompt(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<RenderedPrompt>> {
    load(&state, &slug)?;
    let pipeline = state.pipeline().await;
    Ok(Json(pipeline.preview(&slug, &req.release_id)?))
}
