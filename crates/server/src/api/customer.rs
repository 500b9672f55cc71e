//! # Customer API
//!
//! Dashboard endpoints authenticated with the customer's API key. Customers
//! only ever see their own releases, and only see copy once it has been
//! sent to them for review.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use pressroom_core::parsing::Quote;
use pressroom_core::pipeline::{
    Actor, ReleaseAction, ReleaseEvent, ReleaseEventKind, ReleaseStatus, StatusInfo,
};
use pressroom_core::state::{
    ActionOptions, CreditEntry, Customer, CustomerManager, Draft, DraftManager, HeadlineTally,
    NewRelease, ReleaseManager, ReleaseRequest, Vote, VoteManager,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::auth::CustomerAuth;
use super::error::{ApiError, ApiResult};
use super::SharedState;

/// Draft copy as the customer sees it
#[derive(Debug, Serialize)]
pub struct ClientDraft {
    pub revision: i64,
    pub headline: String,
    pub alternative_headlines: Vec<String>,
    pub subheadline: Option<String>,
    pub body: String,
    pub quotes: Vec<Quote>,
}

impl From<Draft> for ClientDraft {
    fn from(d: Draft) -> Self {
        Self {
            revision: d.revision,
            headline: d.headline,
            alternative_headlines: d.alternative_headlines,
            subheadline: d.subheadline,
            body: d.body,
            quotes: d.quotes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientRelease {
    pub release: ReleaseRequest,
    pub info: StatusInfo,
    pub draft: Option<ClientDraft>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub customer: Customer,
    pub ledger: Vec<CreditEntry>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClientActionRequest {
    #[serde(default)]
    pub expected_version: Option<i64>,
    /// Requested changes, or a reason for cancelling
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    pub headline: String,
}

#[derive(Debug, Serialize)]
pub struct VotesResponse {
    pub tally: Vec<HeadlineTally>,
    pub mine: Option<Vote>,
}

/// Statuses in which the customer can read the copy
fn copy_visible(status: ReleaseStatus) -> bool {
    matches!(
        status,
        ReleaseStatus::AwaitingClient
            | ReleaseStatus::ChangesRequested
            | ReleaseStatus::ClientApproved
            | ReleaseStatus::Scheduled
            | ReleaseStatus::Published
    )
}

fn voter_id(customer: &Customer) -> String {
    format!("customer:{}", customer.id)
}

/// Load a release owned by `customer`; other customers' releases are reported missing
fn owned_release(state: &SharedState, customer: &Customer, id: &str) -> ApiResult<ReleaseRequest> {
    let release = ReleaseManager::new(&state.db).get(id)?;
    if release.customer_id != customer.id {
        return Err(ApiError::NotFound(format!("release not found: {}", id)));
    }
    Ok(release)
}

fn client_view(state: &SharedState, release: ReleaseRequest) -> ApiResult<ClientRelease> {
    let draft = if copy_visible(release.status) {
        DraftManager::new(&state.db).latest(&release.id)?.map(ClientDraft::from)
    } else {
        None
    };
    Ok(ClientRelease {
        info: release.info(),
        release,
        draft,
    })
}

/// The signed-in customer and their credit ledger
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "customer",
    security(("api_key" = [])),
    responses((status = 200, description = "Account and credit history"))
)]
pub async fn me(State(state): State<SharedState>, CustomerAuth(customer): CustomerAuth) -> ApiResult<Json<MeResponse>> {
    let ledger = CustomerManager::new(&state.db).ledger(&customer.id)?;
    Ok(Json(MeResponse { customer, ledger }))
}

#[utoipa::path(
    get,
    path = "/api/v1/releases",
    tag = "customer",
    security(("api_key" = [])),
    responses((status = 200, description = "The customer's releases, newest first"))
)]
pub async fn list_releases(
    State(state): State<SharedState>,
    CustomerAuth(customer): CustomerAuth,
) -> ApiResult<Json<Vec<ReleaseRequest>>> {
    Ok(Json(ReleaseManager::new(&state.db).list_for_customer(&customer.id)?))
}

/// Order a press release; consumes one credit
#[utoipa::path(
    post,
    path = "/api/v1/releases",
    request_body = Object,
    tag = "customer",
    security(("api_key" = [])),
    responses(
        (status = 201, description = "Release submitted"),
        (status = 402, description = "No credits left", body = super::error::ErrorBody),
        (status = 422, description = "Missing required fields", body = super::error::ErrorBody)
    )
)]
pub async fn create_release(
    State(state): State<SharedState>,
    CustomerAuth(customer): CustomerAuth,
    Json(form): Json<NewRelease>,
) -> ApiResult<(StatusCode, Json<ReleaseRequest>)> {
    let release = ReleaseManager::new(&state.db).create(&customer.id, form)?;
    state.emit(
        ReleaseEvent::new(ReleaseEventKind::Submitted, &release.id)
            .with_status(release.status)
            .with_actor(Actor::Customer),
    );
    Ok((StatusCode::CREATED, Json(release)))
}

#[utoipa::path(
    get,
    path = "/api/v1/releases/{id}",
    tag = "customer",
    security(("api_key" = [])),
    params(("id" = String, Path, description = "Release id")),
    responses(
        (status = 200, description = "Release with its latest copy once sent for review"),
        (status = 404, description = "Not found", body = super::error::ErrorBody)
    )
)]
pub async fn get_release(
    State(state): State<SharedState>,
    CustomerAuth(customer): CustomerAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<ClientRelease>> {
    let release = owned_release(&state, &customer, &id)?;
    Ok(Json(client_view(&state, release)?))
}

async fn client_action(
    state: SharedState,
    customer: Customer,
    id: String,
    action: ReleaseAction,
    req: ClientActionRequest,
) -> ApiResult<Json<ClientRelease>> {
    owned_release(&state, &customer, &id)?;
    let options = ActionOptions {
        expected_version: req.expected_version,
        note: req.note.filter(|n| !n.trim().is_empty()),
        scheduled_for: None,
    };
    let pipeline = state.pipeline().await;
    let moved = pipeline.apply_action(&id, action, Actor::Customer, options)?;
    Ok(Json(client_view(&state, moved.release)?))
}

#[utoipa::path(
    post,
    path = "/api/v1/releases/{id}/approve",
    tag = "customer",
    security(("api_key" = [])),
    params(("id" = String, Path, description = "Release id")),
    request_body = ClientActionRequest,
    responses((status = 200, description = "Approved"), (status = 409, description = "Not awaiting approval", body = super::error::ErrorBody))
)]
pub async fn approve(
    State(state): State<SharedState>,
    CustomerAuth(customer): CustomerAuth,
    Path(id): Path<String>,
    body: Option<Json<ClientActionRequest>>,
) -> ApiResult<Json<ClientRelease>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    client_action(state, customer, id, ReleaseAction::ClientApprove, req).await
}

#[utoipa::path(
    post,
    path = "/api/v1/releases/{id}/request-changes",
    tag = "customer",
    security(("api_key" = [])),
    params(("id" = String, Path, description = "Release id")),
    request_body = ClientActionRequest,
    responses((status = 200, description = "Changes requested"))
)]
pub async fn request_changes(
    State(state): State<SharedState>,
    CustomerAuth(customer): CustomerAuth,
    Path(id): Path<String>,
    Json(req): Json<ClientActionRequest>,
) -> ApiResult<Json<ClientRelease>> {
    client_action(state, customer, id, ReleaseAction::RequestChanges, req).await
}

/// Cancel before work starts; the credit is refunded
#[utoipa::path(
    post,
    path = "/api/v1/releases/{id}/cancel",
    tag = "customer",
    security(("api_key" = [])),
    params(("id" = String, Path, description = "Release id")),
    request_body = ClientActionRequest,
    responses((status = 200, description = "Cancelled"), (status = 403, description = "Already in progress", body = super::error::ErrorBody))
)]
pub async fn cancel(
    State(state): State<SharedState>,
    CustomerAuth(customer): CustomerAuth,
    Path(id): Path<String>,
    body: Option<Json<ClientActionRequest>>,
) -> ApiResult<Json<ClientRelease>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    client_action(state, customer, id, ReleaseAction::Cancel, req).await
}

#[utoipa::path(
    post,
    path = "/api/v1/releases/{id}/votes",
    tag = "customer",
    security(("api_key" = [])),
    params(("id" = String, Path, description = "Release id")),
    request_body = VoteRequest,
    responses((status = 200, description = "Vote recorded"))
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    CustomerAuth(customer): CustomerAuth,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<Json<VotesResponse>> {
    owned_release(&state, &customer, &id)?;
    let votes = VoteManager::new(&state.db);
    let mine = votes.cast(&id, &voter_id(&customer), &req.headline)?;
    Ok(Json(VotesResponse {
        tally: votes.tally(&id)?,
        mine: Some(mine),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/releases/{id}/votes",
    tag = "customer",
    security(("api_key" = [])),
    params(("id" = String, Path, description = "Release id")),
    responses((status = 200, description = "Headline tally and the caller's vote"))
)]
pub async fn get_votes(
    State(state): State<SharedState>,
    CustomerAuth(customer): CustomerAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<VotesResponse>> {
    owned_release(&state, &customer, &id)?;
    let votes = VoteManager::new(&state.db);
    Ok(Json(VotesResponse {
        tally: votes.tally(&id)?,
        mine: votes.vote_of(&id, &voter_id(&customer))?,
    }))
}
