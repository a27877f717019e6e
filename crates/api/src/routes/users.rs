//! Account registration endpoints.
//!
//! The in-process directory stands in for a real identity provider;
//! these endpoints mint an ID with the requested role so the rest of
//! the API has callers to work with.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use event_store::EventStore;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct RegisteredResponse {
    pub user_id: String,
    pub role: &'static str,
}

/// POST /users/buyers — registers a new buyer account.
pub async fn register_buyer<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<RegisteredResponse>) {
    let buyer = state.directory.register_buyer().await;
    (
        StatusCode::CREATED,
        Json(RegisteredResponse {
            user_id: buyer.to_string(),
            role: "buyer",
        }),
    )
}

/// POST /users/sellers — registers a new seller account.
pub async fn register_seller<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<RegisteredResponse>) {
    let seller = state.directory.register_seller().await;
    (
        StatusCode::CREATED,
        Json(RegisteredResponse {
            user_id: seller.to_string(),
            role: "seller",
        }),
    )
}
