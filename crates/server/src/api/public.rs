//! # Public API
//!
//! Pricing, the lifecycle table, customer signup and the journalist
//! mailing list. No credentials required.

use axum::{extract::State, http::StatusCode, Json};
use pressroom_core::pipeline::{ReleaseStatus, StatusInfo};
use pressroom_core::pricing::{self, Plan};
use pressroom_core::state::{Customer, CustomerManager, Journalist, JournalistManager, NewCustomer, Subscription};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::ApiResult;
use super::SharedState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub company_name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub customer: Customer,
    /// Shown once; used as the dashboard bearer token
    pub api_key: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub outlet: Option<String>,
    #[serde(default)]
    pub beats: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UnsubscribeRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "public",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Plan catalog
#[utoipa::path(
    get,
    path = "/api/v1/pricing",
    tag = "public",
    responses((status = 200, description = "Plans, cheapest first"))
)]
pub async fn list_plans() -> Json<&'static [Plan]> {
    Json(pricing::plans())
}

/// The release lifecycle table
#[utoipa::path(
    get,
    path = "/api/v1/statuses",
    tag = "public",
    responses((status = 200, description = "Every release status with label, color and next actions"))
)]
pub async fn list_statuses() -> Json<Vec<StatusInfo>> {
    Json(ReleaseStatus::all().iter().map(|s| s.info()).collect())
}

/// Create a customer account with the free credit allowance
#[utoipa::path(
    post,
    path = "/api/v1/signup",
    tag = "public",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Customer created"),
        (status = 422, description = "Invalid or duplicate email", body = super::error::ErrorBody)
    )
)]
pub async fn signup(
    State(state): State<SharedState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let free_credits = state.config.read().await.free_credits();
    let customer = CustomerManager::new(&state.db).signup(
        NewCustomer {
            email: req.email,
            company_name: req.company_name,
            contact_name: req.contact_name,
        },
        free_credits,
    )?;
    let api_key = customer.api_key.clone();
    Ok((StatusCode::CREATED, Json(SignupResponse { customer, api_key })))
}

/// Join the journalist mailing list (or update beats)
#[utoipa::path(
    post,
    path = "/api/v1/journalists/subscribe",
    tag = "public",
    request_body = SubscribeRequest,
    responses((status = 200, description = "Subscription active"))
)]
pub async fn subscribe(
    State(state): State<SharedState>,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<Json<Journalist>> {
    let journalist = JournalistManager::new(&state.db).subscribe(Subscription {
        email: req.email,
        name: req.name,
        outlet: req.outlet,
        beats: req.beats,
    })?;
    Ok(Json(journalist))
}

#[utoipa::path(
    post,
    path = "/api/v1/journalists/unsubscribe",
    tag = "public",
    request_body = UnsubscribeRequest,
    responses(
        (status = 200, description = "Opted out"),
        (status = 404, description = "Unknown token", body = super::error::ErrorBody)
    )
)]
pub async fn unsubscribe(
    State(state): State<SharedState>,
    Json(req): Json<UnsubscribeRequest>,
) -> ApiResult<Json<Journalist>> {
    Ok(Json(JournalistManager::new(&state.db).unsubscribe(&req.token)?))
}
