//! Bearer-token extractors for the customer and admin APIs.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use pressroom_core::state::{Customer, CustomerManager};

use super::error::ApiError;
use super::SharedState;

/// The customer owning the presented API key
pub struct CustomerAuth(pub Customer);

/// Proof that the request carried the admin token
pub struct AdminAuth;

/// `Authorization: Bearer <token>`, or `?access_token=` for EventSource clients
fn presented_token(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());
    if header.is_some() {
        return header;
    }
    parts.uri.query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "access_token")
            .map(|(_, value)| value.to_string())
    })
}

fn tokens_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl FromRequestParts<SharedState> for CustomerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = presented_token(parts).ok_or(ApiError::Unauthorized)?;
        let customer = CustomerManager::new(&state.db)
            .find_by_api_key(&token)?
            .ok_or(ApiError::Unauthorized)?;
        Ok(Self(customer))
    }
}

#[async_trait]
impl FromRequestParts<SharedState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = presented_token(parts).ok_or(ApiError::Unauthorized)?;
        let config = state.config.read().await;
        match config.admin_token.as_deref() {
            Some(expected) if tokens_match(expected, &token) => Ok(Self),
            Some(_) => Err(ApiError::Unauthorized),
            None => {
                tracing::warn!("Admin request rejected: no admin token configured");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
