use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::{User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

/// Router for seller discovery (the booking page's seller picker)
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_sellers))
}

#[derive(Debug, Serialize)]
pub struct SellerResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

impl From<User> for SellerResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SellersResponse {
    pub success: bool,
    pub sellers: Vec<SellerResponse>,
    pub count: usize,
}

/// List all sellers, newest first. Requires authentication.
async fn list_sellers(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
) -> AppResult<Json<SellersResponse>> {
    let sellers = UserRepository::list_sellers(&state.db).await?;

    if sellers.is_empty() {
        return Err(AppError::NotFound("No sellers found".to_string()));
    }

    let sellers: Vec<SellerResponse> = sellers.into_iter().map(Into::into).collect();
    let count = sellers.len();

    Ok(Json(SellersResponse {
        success: true,
        sellers,
        count,
    }))
}
