//! # Admin API
//!
//! Console endpoints behind the admin token: the release queue, pipeline
//! steps, manual edits, accounts, the mailing list and the distribution queue.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use pressroom_core::models::LlmProvider;
use pressroom_core::pipeline::{
    Actor, DraftOutcome, PanelOutcome, ReleaseAction, ReleaseEvent, ReleaseEventKind,
    ReleaseStatus, StatusInfo,
};
use pressroom_core::state::{
    ActionOptions, CreditEntry, Customer, CustomerManager, DistributionEntry, DistributionManager,
    DistributionStatus, Draft, DraftEdit, DraftManager, HeadlineTally, HistoryEntry, Journalist,
    JournalistManager, PanelReview, ReleaseManager, ReleaseRequest, Transition, VoteManager,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::auth::AdminAuth;
use super::error::{ApiError, ApiResult};
use super::SharedState;
use crate::config::PressroomConfig;

const ADMIN_VOTER: &str = "admin";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReleaseFilter {
    /// Only releases in this status
    #[serde(default)]
    pub status: Option<String>,
}

/// Everything the console shows for one release
#[derive(Debug, Serialize)]
pub struct ReleaseDetail {
    pub release: ReleaseRequest,
    pub info: StatusInfo,
    pub drafts: Vec<Draft>,
    pub panels: Vec<PanelReview>,
    pub history: Vec<HistoryEntry>,
    pub votes: Vec<HeadlineTally>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActionRequest {
    /// Action name, e.g. `send_to_client`
    pub action: String,
    #[serde(default)]
    pub expected_version: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
    /// Required for `schedule`
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Editor instructions for `revise`
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Result of an action; pipeline actions also carry what they produced
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub release: ReleaseRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<Draft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<PanelReview>,
    pub distribution_queued: usize,
}

impl From<Transition> for ActionResponse {
    fn from(t: Transition) -> Self {
        Self {
            release: t.release,
            draft: None,
            review: None,
            distribution_queued: t.distribution_queued,
        }
    }
}

impl From<DraftOutcome> for ActionResponse {
    fn from(o: DraftOutcome) -> Self {
        Self {
            release: o.release,
            draft: Some(o.draft),
            review: None,
            distribution_queued: 0,
        }
    }
}

impl From<PanelOutcome> for ActionResponse {
    fn from(o: PanelOutcome) -> Self {
        Self {
            release: o.release,
            draft: None,
            review: Some(o.review),
            distribution_queued: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReviseRequest {
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HeadlineRequest {
    pub headline: String,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminVoteRequest {
    pub headline: String,
}

#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    pub customer: Customer,
    pub ledger: Vec<CreditEntry>,
    pub releases: Vec<ReleaseRequest>,
}

/// Either a plan purchase or a manual adjustment
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreditRequest {
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub delta: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JournalistFilter {
    /// Include opted-out journalists
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DistributionFilter {
    #[serde(default)]
    pub release_id: Option<String>,
    /// `queued` or `sent`
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub status: Option<DistributionStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub default_model: String,
    /// Used unless the config sets `base_url`
    pub default_base_url: String,
    pub env_var: String,
}

fn provider_info() -> Vec<ProviderInfo> {
    LlmProvider::all()
        .into_iter()
        .map(|p| ProviderInfo {
            id: p.as_str().to_string(),
            name: p.display_name().to_string(),
            default_model: p.default_model().to_string(),
            default_base_url: p.default_base_url().to_string(),
            env_var: p.env_var().to_string(),
        })
        .collect()
}

// === Releases ===

#[utoipa::path(
    get,
    path = "/api/v1/admin/releases",
    tag = "admin",
    security(("admin_token" = [])),
    params(ReleaseFilter),
    responses((status = 200, description = "Releases, newest first"))
)]
pub async fn list_releases(
    _: AdminAuth,
    State(state): State<SharedState>,
    Query(filter): Query<ReleaseFilter>,
) -> ApiResult<Json<Vec<ReleaseRequest>>> {
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<ReleaseStatus>)
        .transpose()?;
    Ok(Json(ReleaseManager::new(&state.db).list(status)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/releases/{id}",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    responses((status = 200, description = "Release with drafts, panels, history and votes"))
)]
pub async fn get_release(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReleaseDetail>> {
    let releases = ReleaseManager::new(&state.db);
    let drafts = DraftManager::new(&state.db);
    let release = releases.get(&id)?;
    Ok(Json(ReleaseDetail {
        info: release.info(),
        drafts: drafts.list(&id)?,
        panels: drafts.list_panels(&id)?,
        history: releases.history(&id)?,
        votes: VoteManager::new(&state.db).tally(&id)?,
        release,
    }))
}

/// Apply any lifecycle action; pipeline actions run their LLM step
#[utoipa::path(
    post,
    path = "/api/v1/admin/releases/{id}/actions",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Release after the action"),
        (status = 409, description = "Invalid transition or stale version", body = super::error::ErrorBody),
        (status = 502, description = "Language model call failed", body = super::error::ErrorBody)
    )
)]
pub async fn apply_action(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let action: ReleaseAction = req.action.parse()?;
    let pipeline = state.pipeline().await;

    let response = match action {
        ReleaseAction::GenerateDraft => pipeline.spawn_generate_draft(id, Actor::Admin).await?.into(),
        ReleaseAction::RunPanel => pipeline.spawn_run_panel(id, Actor::Admin).await?.into(),
        ReleaseAction::Revise => {
            let instructions = req.instructions.unwrap_or_default();
            pipeline.revise_with_feedback(&id, &instructions).await?.into()
        }
        _ => {
            let options = ActionOptions {
                expected_version: req.expected_version,
                note: req.note.filter(|n| !n.trim().is_empty()),
                scheduled_for: req.scheduled_for,
            };
            pipeline.apply_action(&id, action, Actor::Admin, options)?.into()
        }
    };
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/releases/{id}/draft",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    responses((status = 200, description = "Draft generated"))
)]
pub async fn generate_draft(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DraftOutcome>> {
    let pipeline = state.pipeline().await;
    Ok(Json(pipeline.spawn_generate_draft(id, Actor::Admin).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/releases/{id}/panel",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    responses((status = 200, description = "Panel review stored"))
)]
pub async fn run_panel(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PanelOutcome>> {
    let pipeline = state.pipeline().await;
    Ok(Json(pipeline.spawn_run_panel(id, Actor::Admin).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/releases/{id}/revise",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    request_body = ReviseRequest,
    responses((status = 200, description = "Revised draft stored"))
)]
pub async fn revise(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Option<Json<ReviseRequest>>,
) -> ApiResult<Json<DraftOutcome>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let pipeline = state.pipeline().await;
    Ok(Json(pipeline.revise_with_feedback(&id, &req.instructions).await?))
}

/// Hand edit of the latest draft, stored as a new revision
#[utoipa::path(
    put,
    path = "/api/v1/admin/releases/{id}/draft",
    request_body = Object,
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    responses((status = 200, description = "New revision"))
)]
pub async fn edit_draft(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(edit): Json<DraftEdit>,
) -> ApiResult<Json<Draft>> {
    let release = ReleaseManager::new(&state.db).get(&id)?;
    if release.status.is_terminal() {
        return Err(ApiError::bad_request(format!(
            "release is {}; its copy can no longer change",
            release.status
        )));
    }
    let draft = DraftManager::new(&state.db).save_edit(&id, edit)?;
    state.emit(
        ReleaseEvent::new(ReleaseEventKind::RevisionSaved, &id)
            .with_actor(Actor::Admin)
            .with_data(serde_json::json!({ "revision": draft.revision })),
    );
    Ok(Json(draft))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/releases/{id}/headline",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    request_body = HeadlineRequest,
    responses((status = 200, description = "Headline selected"))
)]
pub async fn select_headline(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<HeadlineRequest>,
) -> ApiResult<Json<ReleaseRequest>> {
    Ok(Json(ReleaseManager::new(&state.db).select_headline(
        &id,
        &req.headline,
        req.expected_version,
    )?))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/releases/{id}/history",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    responses((status = 200, description = "Status history, oldest first"))
)]
pub async fn history(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    Ok(Json(ReleaseManager::new(&state.db).history(&id)?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/releases/{id}/votes",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Release id")),
    request_body = AdminVoteRequest,
    responses((status = 200, description = "Tally after the vote"))
)]
pub async fn cast_vote(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<AdminVoteRequest>,
) -> ApiResult<Json<Vec<HeadlineTally>>> {
    let votes = VoteManager::new(&state.db);
    votes.cast(&id, ADMIN_VOTER, &req.headline)?;
    Ok(Json(votes.tally(&id)?))
}

// === Customers ===

#[utoipa::path(
    get,
    path = "/api/v1/admin/customers",
    tag = "admin",
    security(("admin_token" = [])),
    responses((status = 200, description = "All customers"))
)]
pub async fn list_customers(
    _: AdminAuth,
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(CustomerManager::new(&state.db).list()?))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/customers/{id}",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Customer id")),
    responses((status = 200, description = "Customer with ledger and releases"))
)]
pub async fn get_customer(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CustomerDetail>> {
    let customers = CustomerManager::new(&state.db);
    Ok(Json(CustomerDetail {
        customer: customers.get(&id)?,
        ledger: customers.ledger(&id)?,
        releases: ReleaseManager::new(&state.db).list_for_customer(&id)?,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/customers/{id}/credits",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Customer id")),
    request_body = CreditRequest,
    responses((status = 200, description = "Customer with the new balance"))
)]
pub async fn add_credits(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<CreditRequest>,
) -> ApiResult<Json<Customer>> {
    let customers = CustomerManager::new(&state.db);
    let customer = match (req.plan_id, req.delta) {
        (Some(plan), None) => customers.purchase_plan(&id, &plan)?,
        (None, Some(delta)) => customers.adjust(&id, delta)?,
        _ => {
            return Err(ApiError::bad_request(
                "provide exactly one of plan_id or delta",
            ))
        }
    };
    Ok(Json(customer))
}

// === Journalists & distribution ===

#[utoipa::path(
    get,
    path = "/api/v1/admin/journalists",
    tag = "admin",
    security(("admin_token" = [])),
    params(JournalistFilter),
    responses((status = 200, description = "Mailing list"))
)]
pub async fn list_journalists(
    _: AdminAuth,
    State(state): State<SharedState>,
    Query(filter): Query<JournalistFilter>,
) -> ApiResult<Json<Vec<Journalist>>> {
    Ok(Json(
        JournalistManager::new(&state.db).list(filter.include_inactive)?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/distribution",
    tag = "admin",
    security(("admin_token" = [])),
    params(DistributionFilter),
    responses((status = 200, description = "Distribution entries"))
)]
pub async fn list_distribution(
    _: AdminAuth,
    State(state): State<SharedState>,
    Query(filter): Query<DistributionFilter>,
) -> ApiResult<Json<Vec<DistributionEntry>>> {
    Ok(Json(
        DistributionManager::new(&state.db).list(filter.release_id.as_deref(), filter.status)?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/distribution/{id}/sent",
    tag = "admin",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Distribution entry id")),
    responses((status = 200, description = "Entry marked sent"))
)]
pub async fn mark_sent(
    _: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DistributionEntry>> {
    Ok(Json(DistributionManager::new(&state.db).mark_sent(&id)?))
}

// === Config ===

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub config: PressroomConfig,
    pub providers: Vec<ProviderInfo>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/config",
    tag = "admin",
    security(("admin_token" = [])),
    responses((status = 200, description = "Current configuration", body = ConfigResponse))
)]
pub async fn get_config(_: AdminAuth, State(state): State<SharedState>) -> Json<ConfigResponse> {
    let config = state.config.read().await.redacted();
    Json(ConfigResponse {
        config,
        providers: provider_info(),
    })
}

/// Merge a partial config, persist it, and swap the LLM client
#[utoipa::path(
    patch,
    path = "/api/v1/admin/config",
    tag = "admin",
    security(("admin_token" = [])),
    request_body = PressroomConfig,
    responses(
        (status = 200, description = "Configuration saved", body = ConfigResponse),
        (status = 400, description = "Invalid configuration", body = super::error::ErrorBody)
    )
)]
pub async fn update_config(
    _: AdminAuth,
    State(state): State<SharedState>,
    Json(patch): Json<PressroomConfig>,
) -> ApiResult<Json<ConfigResponse>> {
    // Held until the new config is in place
    let mut current = state.config.write().await;
    let mut merged = current.clone();
    merged.merge(patch);
    merged.validate().map_err(ApiError::bad_request)?;
    merged.save_to(&state.config_path).await?;

    if merged.model_config()? != current.model_config()?
        || merged.llm_timeout() != current.llm_timeout()
    {
        state.reload_llm(&merged).await?;
    }
    *current = merged.clone();
    drop(current);
    tracing::info!("Configuration updated");

    Ok(Json(ConfigResponse {
        config: merged.redacted(),
        providers: provider_info(),
    }))
}
