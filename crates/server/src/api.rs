//! Recommendation HTTP surface.
//!
//! - `GET /recommendations/{user_id}` with `Authorization: Bearer <token>`

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use shoprec_core::domain::analytics::UserId;
use shoprec_core::domain::product::ProductSummary;
use shoprec_core::errors::InterfaceError;
use shoprec_core::{RecommendationService, TokenSigner};
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    service: Arc<RecommendationService>,
    signer: Arc<TokenSigner>,
}

impl ApiState {
    pub fn new(service: Arc<RecommendationService>, signer: Arc<TokenSigner>) -> Self {
        Self { service, signer }
    }
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub success: bool,
    pub recommendations: Vec<ProductSummary>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: &'static str,
}

pub fn router(state: ApiState) -> Router {
    Router::new().route("/recommendations/{user_id}", get(get_recommendations)).with_state(state)
}

async fn get_recommendations(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<RecommendationsResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let user_id = UserId(user_id);
    let authorization = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());

    if let Err(error) = state.signer.authorize(authorization, &user_id, Utc::now()) {
        warn!(
            event_name = "http.auth.rejected",
            correlation_id = %correlation_id,
            user_id = %user_id,
            error = %error,
            "recommendation request rejected"
        );
        return Err(error_response(InterfaceError::Unauthorized {
            message: error.to_string(),
            correlation_id,
        }));
    }

    match state.service.get_recommendations(&user_id, &correlation_id).await {
        Ok(result) => {
            Ok(Json(RecommendationsResponse { success: true, recommendations: result.products }))
        }
        Err(error) => Err(error_response(error.into_interface(correlation_id))),
    }
}

fn error_response(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let status = match error {
        InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiError { success: false, error: error.user_message() }))
}
