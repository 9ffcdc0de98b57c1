use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{UserRepository, UserRole};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::availability::{compute_slots, TimeSlot};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_availability))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub seller_email: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub available_slots: Vec<TimeSlot>,
}

/// Compute a seller's open slots for a date range.
///
/// Slots are recomputed on every request against the seller's live calendar;
/// nothing is cached or persisted.
async fn get_availability(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let (seller_email, start_date, end_date) =
        match (query.seller_email, query.start_date, query.end_date) {
            (Some(seller), Some(start), Some(end)) => (seller, start, end),
            _ => {
                return Err(AppError::BadRequest(
                    "Missing required parameters: sellerEmail, startDate, endDate".to_string(),
                ))
            }
        };

    let range_start = parse_date(&start_date, "startDate")?;
    let range_end = parse_date(&end_date, "endDate")?;

    let seller = UserRepository::find_by_email_and_role(&state.db, &seller_email, UserRole::Seller)
        .await?
        .ok_or_else(|| AppError::NotFound("Seller not found".to_string()))?;

    if !seller.has_calendar_connected() {
        return Err(AppError::PreconditionFailed(
            "Seller has not connected their Google Calendar".to_string(),
        ));
    }

    let available_slots = compute_slots(
        &state,
        &seller.email,
        range_start,
        range_end,
        state.config.scheduling.slot_duration_minutes,
    )
    .await?;

    Ok(Json(AvailabilityResponse { available_slots }))
}

fn parse_date(value: &str, field: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            AppError::BadRequest(format!(
                "Invalid {} format. Use ISO 8601 format (e.g., 2023-12-01T00:00:00Z)",
                field
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_query_uses_camel_case_params() {
        let query: AvailabilityQuery = serde_json::from_str(
            r#"{"sellerEmail": "s@x.com", "startDate": "2024-01-02T00:00:00Z", "endDate": "2024-01-03T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(query.seller_email.as_deref(), Some("s@x.com"));
        assert!(parse_date(query.start_date.as_deref().unwrap(), "startDate").is_ok());
    }
}
