use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{UserRepository, UserRole};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::appointments::{
    Appointment, AppointmentService, CreateAppointment, CreatedAppointment,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(list_appointments)
                .post(create_appointment)
                .delete(cancel_appointment),
        )
        .route("/:id/response", patch(update_response_status))
        .route("/:id/time", patch(update_time))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// When set, a buyer is asking for this seller's appointments to judge
    /// availability before booking.
    pub seller_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub seller_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatusRequest {
    pub response_status: String,
    pub user_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRequest {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Serialize)]
pub struct AppointmentResponse {
    pub success: bool,
    pub message: String,
    pub appointment: Appointment,
}

// ============================================================================
// Handlers
// ============================================================================

/// List appointments visible to the caller, or a seller's appointments when
/// `sellerEmail` is given (buyers only, for booking purposes).
async fn list_appointments(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let time_min = query
        .start_time
        .as_deref()
        .map(|s| parse_timestamp(s, "startTime"))
        .transpose()?;
    let time_max = query
        .end_time
        .as_deref()
        .map(|s| parse_timestamp(s, "endTime"))
        .transpose()?;

    if let (Some(min), Some(max)) = (time_min, time_max) {
        if min >= max {
            return Err(AppError::BadRequest(
                "startTime must be before endTime".to_string(),
            ));
        }
    }

    let appointments = if let Some(seller_email) = query.seller_email {
        if user.role != UserRole::Buyer {
            return Err(AppError::Forbidden(
                "Only buyers can view seller appointments".to_string(),
            ));
        }

        let seller =
            UserRepository::find_by_email_and_role(&state.db, &seller_email, UserRole::Seller)
                .await?
                .ok_or_else(|| AppError::NotFound("Seller not found".to_string()))?;

        if !seller.has_calendar_connected() {
            return Err(AppError::PreconditionFailed(
                "Seller has not connected their Google Calendar".to_string(),
            ));
        }

        AppointmentService::list(&state, &seller.email, UserRole::Seller, time_min, time_max)
            .await?
    } else {
        AppointmentService::list(&state, &user.email, user.role, time_min, time_max).await?
    };

    Ok(Json(ListResponse { appointments }))
}

/// Book an appointment with a seller. The caller must be a buyer.
async fn create_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateRequest>,
) -> AppResult<Json<CreateResponse>> {
    if request.title.trim().is_empty() {
        return Err(AppError::BadRequest("Missing required field: title".to_string()));
    }

    let start_time = parse_timestamp(&request.start_time, "startTime")?;
    let end_time = parse_timestamp(&request.end_time, "endTime")?;

    let CreatedAppointment {
        event_id,
        meeting_link,
    } = AppointmentService::create(
        &state,
        &user,
        &request.seller_email,
        CreateAppointment {
            title: request.title,
            description: request.description,
            start_time,
            end_time,
        },
    )
    .await?;

    Ok(Json(CreateResponse {
        event_id,
        meeting_link,
        message: "Appointment created successfully".to_string(),
    }))
}

/// Cancel an appointment by event id, using the caller's credential.
async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<CancelQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let event_id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing event ID".to_string()))?;

    AppointmentService::cancel(&state, &user, &event_id).await?;

    Ok(Json(serde_json::json!({
        "message": "Appointment cancelled successfully"
    })))
}

/// Update the caller's own RSVP on an appointment.
async fn update_response_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ResponseStatusRequest>,
) -> AppResult<Json<AppointmentResponse>> {
    if request.response_status.is_empty() || request.user_email.is_empty() {
        return Err(AppError::BadRequest(
            "Response status and user email are required".to_string(),
        ));
    }

    // Self-service only: the boundary trusts the authenticated identity once,
    // here, and the service layer takes it as given.
    if request.user_email != user.email {
        return Err(AppError::Forbidden(
            "You can only update your own response status".to_string(),
        ));
    }

    let appointment =
        AppointmentService::update_response_status(&state, &id, &user, &request.response_status)
            .await?;

    Ok(Json(AppointmentResponse {
        success: true,
        message: "Response status updated successfully".to_string(),
        appointment,
    }))
}

/// Reschedule an appointment. The caller must be the organizer; the provider
/// rejects the read/write on anyone else's credential.
async fn update_time(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<TimeRequest>,
) -> AppResult<Json<AppointmentResponse>> {
    let start_time = parse_timestamp(&request.start_time, "startTime")?;
    let end_time = parse_timestamp(&request.end_time, "endTime")?;

    let appointment =
        AppointmentService::update_time(&state, &id, &user, start_time, end_time).await?;

    Ok(Json(AppointmentResponse {
        success: true,
        message: "Appointment time updated successfully".to_string(),
        appointment,
    }))
}

// ============================================================================
// Helper functions
// ============================================================================

fn parse_timestamp(value: &str, field: &str) -> AppResult<DateTime<Utc>> {
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
    fn create_request_accepts_camel_case_body() {
        let body = r#"{
            "title": "Intro call",
            "description": "First meeting",
            "startTime": "2024-03-04T10:00:00Z",
            "endTime": "2024-03-04T11:00:00Z",
            "sellerEmail": "seller@x.com"
        }"#;

        let request: CreateRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.title, "Intro call");
        assert_eq!(request.seller_email, "seller@x.com");
        assert_eq!(request.start_time, "2024-03-04T10:00:00Z");
    }

    #[test]
    fn response_status_request_requires_both_fields() {
        let body = r#"{"responseStatus": "accepted", "userEmail": "buyer@x.com"}"#;
        let request: ResponseStatusRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.response_status, "accepted");
        assert_eq!(request.user_email, "buyer@x.com");

        let missing: Result<ResponseStatusRequest, _> =
            serde_json::from_str(r#"{"responseStatus": "accepted"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        assert!(parse_timestamp("2024-03-04T10:00:00Z", "startTime").is_ok());
        assert!(parse_timestamp("2024-03-04T10:00:00+02:00", "startTime").is_ok());

        let err = parse_timestamp("tomorrow", "startTime").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("startTime")));
    }
}
