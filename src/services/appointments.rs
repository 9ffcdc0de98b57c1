use std::collections::HashSet;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{UserRepository, User, UserRole};
use crate::error::{AppError, AppResult};
use crate::services::credentials::CredentialResolver;
use crate::services::google::{
    ConferenceCreateRequest, ConferenceData, ConferenceSolutionKey, EventAttendee, EventDateTime,
    GoogleEvent,
};
use crate::AppState;

const VALID_RESPONSE_STATUSES: [&str; 3] = ["accepted", "declined", "tentative"];

// ============================================================================
// Canonical Appointment (provider-independent)
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// None when the provider payload carried no parseable dateTime
    /// (all-day events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub attendees: Vec<Attendee>,
    pub organizer: Organizer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    /// Absent when the attendee has not responded; callers decide how to
    /// render "no response".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Organizer {
    pub email: String,
}

// ============================================================================
// Event Translator (pure, total on well-formed provider payloads)
// ============================================================================

/// Map a raw provider event into the canonical appointment shape.
///
/// Defaulting: missing summary becomes "Untitled", missing status
/// "confirmed", missing emails empty strings. The meeting link prefers the
/// provider-native hangout link over the first conference entry point URI.
pub fn appointment_from_event(event: &GoogleEvent) -> Appointment {
    let attendees = event
        .attendees
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|a| Attendee {
            email: a.email.clone().unwrap_or_default(),
            response_status: a.response_status.clone(),
        })
        .collect();

    let meeting_link = event.hangout_link.clone().or_else(|| {
        event
            .conference_data
            .as_ref()
            .and_then(|c| c.entry_points.as_ref())
            .and_then(|points| points.first())
            .and_then(|p| p.uri.clone())
    });

    Appointment {
        id: event.id.clone().unwrap_or_default(),
        title: event
            .summary
            .clone()
            .unwrap_or_else(|| "Untitled".to_string()),
        description: event.description.clone(),
        start_time: parse_event_time(event.start.as_ref()),
        end_time: parse_event_time(event.end.as_ref()),
        attendees,
        organizer: Organizer {
            email: event
                .organizer
                .as_ref()
                .and_then(|o| o.email.clone())
                .unwrap_or_default(),
        },
        meeting_link,
        status: event
            .status
            .clone()
            .unwrap_or_else(|| "confirmed".to_string()),
        created: event
            .created
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

fn parse_event_time(time: Option<&EventDateTime>) -> Option<DateTime<Utc>> {
    time?
        .date_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build the provider payload for a new dual-party event.
///
/// Requests an auto-generated conference link alongside the event itself.
pub fn event_insert_payload(
    title: &str,
    description: Option<&str>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    attendees: &[(String, String)],
) -> GoogleEvent {
    GoogleEvent {
        summary: Some(title.to_string()),
        description: description.map(str::to_string),
        start: Some(utc_event_time(start_time)),
        end: Some(utc_event_time(end_time)),
        attendees: Some(
            attendees
                .iter()
                .map(|(email, display_name)| EventAttendee {
                    email: Some(email.clone()),
                    display_name: Some(display_name.clone()),
                    response_status: None,
                })
                .collect(),
        ),
        conference_data: Some(ConferenceData {
            create_request: Some(ConferenceCreateRequest {
                request_id: format!("meet-{}", Uuid::new_v4()),
                conference_solution_key: ConferenceSolutionKey {
                    key_type: "hangoutsMeet".to_string(),
                },
            }),
            entry_points: None,
        }),
        ..Default::default()
    }
}

fn utc_event_time(time: DateTime<Utc>) -> EventDateTime {
    EventDateTime {
        date_time: Some(time.to_rfc3339_opts(SecondsFormat::Secs, true)),
        date: None,
        time_zone: Some("UTC".to_string()),
    }
}

// ============================================================================
// Query filtering (pure)
// ============================================================================

/// Role-dependent visibility: sellers see everything they are involved in,
/// buyers only appointments someone else organizes for them.
fn visible_to(appointment: &Appointment, email: &str, role: UserRole) -> bool {
    let is_organizer = appointment.organizer.email == email;
    let is_attendee = appointment.attendees.iter().any(|a| a.email == email);

    match role {
        UserRole::Seller => is_organizer || is_attendee,
        UserRole::Buyer => is_attendee && !is_organizer,
    }
}

/// Translate, filter and order a raw event listing for one user.
///
/// Cancelled events are dropped, duplicates collapse on event id and the
/// result is ascending by start time (events without one sort first).
pub fn visible_appointments(
    events: &[GoogleEvent],
    email: &str,
    role: UserRole,
) -> Vec<Appointment> {
    let mut seen = HashSet::new();
    let mut appointments: Vec<Appointment> = events
        .iter()
        .map(appointment_from_event)
        .filter(|a| a.status != "cancelled")
        .filter(|a| visible_to(a, email, role))
        .filter(|a| seen.insert(a.id.clone()))
        .collect();

    appointments.sort_by_key(|a| a.start_time.unwrap_or(DateTime::<Utc>::MIN_UTC));
    appointments
}

// ============================================================================
// Appointment Lifecycle Manager + Query Service
// ============================================================================

#[derive(Debug)]
pub struct CreateAppointment {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAppointment {
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
}

pub struct AppointmentService;

impl AppointmentService {
    /// Book an appointment between a buyer and a seller.
    ///
    /// One event is created on the seller's calendar with both parties as
    /// attendees; that single event id is authoritative for both sides. The
    /// insert is the only provider write, so a failure anywhere leaves no
    /// partial state behind.
    pub async fn create(
        state: &AppState,
        buyer: &User,
        seller_email: &str,
        request: CreateAppointment,
    ) -> AppResult<CreatedAppointment> {
        if buyer.role != UserRole::Buyer {
            return Err(AppError::Forbidden(
                "Only buyers can create appointments".to_string(),
            ));
        }

        let seller =
            UserRepository::find_by_email_and_role(&state.db, seller_email, UserRole::Seller)
                .await?
                .ok_or_else(|| AppError::NotFound("Seller not found".to_string()))?;

        if !seller.has_calendar_connected() || !buyer.has_calendar_connected() {
            return Err(AppError::PreconditionFailed(
                "Both parties must have Google Calendar connected".to_string(),
            ));
        }

        validate_booking_window(request.start_time, request.end_time, Utc::now())?;

        let session =
            CredentialResolver::resolve(&state.db, &state.google, &seller.email).await?;

        let payload = event_insert_payload(
            &request.title,
            request.description.as_deref(),
            request.start_time,
            request.end_time,
            &[
                (seller.email.clone(), seller.name.clone()),
                (buyer.email.clone(), buyer.name.clone()),
            ],
        );

        let created = state
            .google
            .insert_event(&session.access_token, &payload)
            .await?;
        let appointment = appointment_from_event(&created);

        tracing::info!(
            "Created appointment {} for buyer {} with seller {}",
            appointment.id,
            buyer.email,
            seller.email
        );

        Ok(CreatedAppointment {
            event_id: appointment.id,
            meeting_link: appointment.meeting_link,
        })
    }

    /// List the appointments visible to a user, ascending by start time.
    ///
    /// Defaults to a window from 30 days back to 90 days ahead when no bounds
    /// are given.
    pub async fn list(
        state: &AppState,
        user_email: &str,
        role: UserRole,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Appointment>> {
        let now = Utc::now();
        let time_min =
            time_min.unwrap_or(now - Duration::days(state.config.scheduling.list_window_past_days));
        let time_max = time_max
            .unwrap_or(now + Duration::days(state.config.scheduling.list_window_future_days));

        let session = CredentialResolver::resolve(&state.db, &state.google, user_email).await?;

        let events = state
            .google
            .list_events(
                &session.access_token,
                &time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
                &time_max.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .await?;

        Ok(visible_appointments(&events, user_email, role))
    }

    /// Update the requesting user's own RSVP on an appointment.
    ///
    /// Read-modify-write against the provider with no optimistic lock; a
    /// concurrent reschedule can race this and the last write wins.
    pub async fn update_response_status(
        state: &AppState,
        event_id: &str,
        user: &User,
        new_status: &str,
    ) -> AppResult<Appointment> {
        if !VALID_RESPONSE_STATUSES.contains(&new_status) {
            return Err(AppError::Validation(format!(
                "Invalid response status. Must be one of: {}",
                VALID_RESPONSE_STATUSES.join(", ")
            )));
        }

        let session = CredentialResolver::resolve(&state.db, &state.google, &user.email).await?;

        let mut event = state.google.get_event(&session.access_token, event_id).await?;
        set_attendee_response(&mut event, &user.email, new_status)?;

        let updated = state
            .google
            .update_event(&session.access_token, event_id, &event)
            .await?;

        Ok(appointment_from_event(&updated))
    }

    /// Reschedule an appointment on the organizer's calendar.
    ///
    /// Does not re-check the organizer's other events for overlap; callers
    /// are expected to pre-check through the availability computation.
    pub async fn update_time(
        state: &AppState,
        event_id: &str,
        organizer: &User,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> AppResult<Appointment> {
        if new_start >= new_end {
            return Err(AppError::BadRequest(
                "End time must be after start time".to_string(),
            ));
        }

        let session =
            CredentialResolver::resolve(&state.db, &state.google, &organizer.email).await?;

        let mut event = state.google.get_event(&session.access_token, event_id).await?;
        event.start = Some(utc_event_time(new_start));
        event.end = Some(utc_event_time(new_end));

        let updated = state
            .google
            .update_event(&session.access_token, event_id, &event)
            .await?;

        Ok(appointment_from_event(&updated))
    }

    /// Cancel an appointment.
    ///
    /// The event is hard-deleted at the provider under the acting user's
    /// credential; subsequent listings simply no longer contain it. The
    /// "cancelled" status filter in the query path still applies to events
    /// that arrive cancelled through the provider itself (attendee-side
    /// copies of declined/removed events).
    pub async fn cancel(state: &AppState, user: &User, event_id: &str) -> AppResult<()> {
        let session = CredentialResolver::resolve(&state.db, &state.google, &user.email).await?;

        state
            .google
            .delete_event(&session.access_token, event_id)
            .await?;

        tracing::info!("Cancelled appointment {} for {}", event_id, user.email);

        Ok(())
    }
}

/// Overwrite one attendee's RSVP in place.
///
/// Failing when the requester is not on the attendee list keeps the outcome
/// deterministic instead of silently writing back an unchanged event.
fn set_attendee_response(event: &mut GoogleEvent, email: &str, status: &str) -> AppResult<()> {
    let attendee = event
        .attendees
        .as_mut()
        .and_then(|list| list.iter_mut().find(|a| a.email.as_deref() == Some(email)))
        .ok_or_else(|| {
            AppError::Forbidden("You are not an attendee of this appointment".to_string())
        })?;

    attendee.response_status = Some(status.to_string());
    Ok(())
}

/// A new booking must start in the future and end after it starts.
fn validate_booking_window(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if start_time <= now {
        return Err(AppError::BadRequest(
            "Appointment time must be in the future".to_string(),
        ));
    }

    if start_time >= end_time {
        return Err(AppError::BadRequest(
            "End time must be after start time".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::google::{ConferenceEntryPoint, EventOrganizer, GoogleService};
    use sqlx::sqlite::SqlitePoolOptions;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn event(id: &str, organizer: &str, attendees: &[&str], start: &str) -> GoogleEvent {
        GoogleEvent {
            id: Some(id.to_string()),
            summary: Some(format!("Meeting {}", id)),
            status: Some("confirmed".to_string()),
            organizer: Some(EventOrganizer {
                email: Some(organizer.to_string()),
            }),
            attendees: Some(
                attendees
                    .iter()
                    .map(|email| EventAttendee {
                        email: Some(email.to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            start: Some(EventDateTime {
                date_time: Some(start.to_string()),
                ..Default::default()
            }),
            end: Some(EventDateTime {
                date_time: Some(start.replace("T10", "T11")),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn translator_applies_defaults() {
        let appointment = appointment_from_event(&GoogleEvent::default());

        assert_eq!(appointment.id, "");
        assert_eq!(appointment.title, "Untitled");
        assert_eq!(appointment.status, "confirmed");
        assert_eq!(appointment.organizer.email, "");
        assert!(appointment.description.is_none());
        assert!(appointment.start_time.is_none());
        assert!(appointment.attendees.is_empty());
        assert!(appointment.meeting_link.is_none());
    }

    #[test]
    fn translator_keeps_missing_response_status_absent() {
        let raw = GoogleEvent {
            attendees: Some(vec![
                EventAttendee {
                    email: Some("a@x.com".to_string()),
                    response_status: Some("accepted".to_string()),
                    ..Default::default()
                },
                EventAttendee {
                    email: Some("b@x.com".to_string()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        let appointment = appointment_from_event(&raw);
        assert_eq!(
            appointment.attendees[0].response_status.as_deref(),
            Some("accepted")
        );
        assert!(appointment.attendees[1].response_status.is_none());
    }

    #[test]
    fn meeting_link_prefers_hangout_link() {
        let entry = ConferenceData {
            create_request: None,
            entry_points: Some(vec![ConferenceEntryPoint {
                uri: Some("https://meet.example/entry".to_string()),
                entry_point_type: Some("video".to_string()),
            }]),
        };

        let both = GoogleEvent {
            hangout_link: Some("https://meet.example/native".to_string()),
            conference_data: Some(entry.clone()),
            ..Default::default()
        };
        assert_eq!(
            appointment_from_event(&both).meeting_link.as_deref(),
            Some("https://meet.example/native")
        );

        let entry_only = GoogleEvent {
            conference_data: Some(entry),
            ..Default::default()
        };
        assert_eq!(
            appointment_from_event(&entry_only).meeting_link.as_deref(),
            Some("https://meet.example/entry")
        );
    }

    #[test]
    fn translator_round_trips_through_insert_payload() {
        let raw = event(
            "evt-1",
            "seller@x.com",
            &["seller@x.com", "buyer@x.com"],
            "2024-03-04T10:00:00Z",
        );
        let first = appointment_from_event(&raw);

        let payload = event_insert_payload(
            &first.title,
            first.description.as_deref(),
            first.start_time.unwrap(),
            first.end_time.unwrap(),
            &[
                ("seller@x.com".to_string(), "Seller".to_string()),
                ("buyer@x.com".to_string(), "Buyer".to_string()),
            ],
        );
        let second = appointment_from_event(&payload);

        // The provider reassigns id/created/organizer on insert; everything
        // the caller controls must survive the trip.
        assert_eq!(second.title, first.title);
        assert_eq!(second.description, first.description);
        assert_eq!(second.start_time, first.start_time);
        assert_eq!(second.end_time, first.end_time);
        assert_eq!(
            second
                .attendees
                .iter()
                .map(|a| a.email.as_str())
                .collect::<Vec<_>>(),
            first
                .attendees
                .iter()
                .map(|a| a.email.as_str())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn buyer_never_sees_appointments_they_organize() {
        let events = vec![
            event("own", "buyer@x.com", &["buyer@x.com"], "2024-03-04T10:00:00Z"),
            event(
                "booked",
                "seller@x.com",
                &["seller@x.com", "buyer@x.com"],
                "2024-03-05T10:00:00Z",
            ),
        ];

        let visible = visible_appointments(&events, "buyer@x.com", UserRole::Buyer);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "booked");
        assert!(visible.iter().all(|a| a.organizer.email != "buyer@x.com"));
    }

    #[test]
    fn seller_sees_organized_and_attended_sorted() {
        let events = vec![
            event(
                "later",
                "seller@x.com",
                &["seller@x.com", "b1@x.com"],
                "2024-03-06T10:00:00Z",
            ),
            event(
                "attended",
                "other@x.com",
                &["other@x.com", "seller@x.com"],
                "2024-03-04T10:00:00Z",
            ),
            event(
                "earlier",
                "seller@x.com",
                &["seller@x.com", "b2@x.com"],
                "2024-03-05T10:00:00Z",
            ),
            event("unrelated", "other@x.com", &["b3@x.com"], "2024-03-07T10:00:00Z"),
        ];

        let visible = visible_appointments(&events, "seller@x.com", UserRole::Seller);

        let ids: Vec<_> = visible.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["attended", "earlier", "later"]);
    }

    #[test]
    fn cancelled_events_are_excluded_from_listings() {
        let mut cancelled = event(
            "gone",
            "seller@x.com",
            &["seller@x.com", "buyer@x.com"],
            "2024-03-04T10:00:00Z",
        );
        cancelled.status = Some("cancelled".to_string());

        let visible = visible_appointments(&[cancelled], "seller@x.com", UserRole::Seller);
        assert!(visible.is_empty());
    }

    #[test]
    fn duplicate_event_ids_collapse() {
        let events = vec![
            event(
                "dup",
                "seller@x.com",
                &["seller@x.com", "buyer@x.com"],
                "2024-03-04T10:00:00Z",
            ),
            event(
                "dup",
                "seller@x.com",
                &["seller@x.com", "buyer@x.com"],
                "2024-03-04T10:00:00Z",
            ),
        ];

        let visible = visible_appointments(&events, "seller@x.com", UserRole::Seller);
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn response_update_for_non_attendee_is_forbidden() {
        let mut raw = event(
            "evt-1",
            "seller@x.com",
            &["seller@x.com", "buyer@x.com"],
            "2024-03-04T10:00:00Z",
        );

        let outsider = set_attendee_response(&mut raw, "stranger@x.com", "accepted");
        assert!(matches!(outsider, Err(AppError::Forbidden(_))));

        set_attendee_response(&mut raw, "buyer@x.com", "accepted").unwrap();
        let updated = appointment_from_event(&raw);
        let buyer = updated
            .attendees
            .iter()
            .find(|a| a.email == "buyer@x.com")
            .unwrap();
        assert_eq!(buyer.response_status.as_deref(), Some("accepted"));
        // The seller's own entry is untouched.
        let seller = updated
            .attendees
            .iter()
            .find(|a| a.email == "seller@x.com")
            .unwrap();
        assert!(seller.response_status.is_none());
    }

    #[test]
    fn booking_window_rejects_past_and_inverted_ranges() {
        let now = utc("2024-03-04T12:00:00Z");

        let past = validate_booking_window(
            utc("2024-03-04T11:00:00Z"),
            utc("2024-03-04T13:00:00Z"),
            now,
        );
        assert!(matches!(past, Err(AppError::BadRequest(_))));

        let inverted = validate_booking_window(
            utc("2024-03-04T14:00:00Z"),
            utc("2024-03-04T13:00:00Z"),
            now,
        );
        assert!(matches!(inverted, Err(AppError::BadRequest(_))));

        let ok = validate_booking_window(
            utc("2024-03-04T13:00:00Z"),
            utc("2024-03-04T14:00:00Z"),
            now,
        );
        assert!(ok.is_ok());
    }

    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let config = Config::default();
        let google = GoogleService::new(&config).unwrap();
        AppState {
            db: pool,
            config,
            google,
        }
    }

    fn booking_request() -> CreateAppointment {
        CreateAppointment {
            title: "Intro call".to_string(),
            description: None,
            start_time: Utc::now() + Duration::hours(24),
            end_time: Utc::now() + Duration::hours(25),
        }
    }

    #[tokio::test]
    async fn create_rejects_non_buyers() {
        let state = test_state().await;

        let mut seller =
            UserRepository::upsert_by_google_id(&state.db, "g-s", "s@x.com", "S", Some("tok"))
                .await
                .unwrap();
        UserRepository::update_role(&state.db, &seller.id, UserRole::Seller)
            .await
            .unwrap();
        seller.role = UserRole::Seller;

        let result =
            AppointmentService::create(&state, &seller, "s@x.com", booking_request()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn create_requires_existing_seller() {
        let state = test_state().await;

        let buyer =
            UserRepository::upsert_by_google_id(&state.db, "g-b", "b@x.com", "B", Some("tok"))
                .await
                .unwrap();

        let result =
            AppointmentService::create(&state, &buyer, "missing@x.com", booking_request()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_requires_both_calendars_connected() {
        let state = test_state().await;

        let buyer =
            UserRepository::upsert_by_google_id(&state.db, "g-b", "b@x.com", "B", Some("tok"))
                .await
                .unwrap();

        // Seller exists but never connected a calendar.
        let seller = UserRepository::upsert_by_google_id(&state.db, "g-s", "s@x.com", "S", None)
            .await
            .unwrap();
        UserRepository::update_role(&state.db, &seller.id, UserRole::Seller)
            .await
            .unwrap();

        let result = AppointmentService::create(&state, &buyer, "s@x.com", booking_request()).await;
        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn create_rejects_past_start_before_touching_the_provider() {
        let state = test_state().await;

        let buyer =
            UserRepository::upsert_by_google_id(&state.db, "g-b", "b@x.com", "B", Some("tok"))
                .await
                .unwrap();
        let seller =
            UserRepository::upsert_by_google_id(&state.db, "g-s", "s@x.com", "S", Some("tok"))
                .await
                .unwrap();
        UserRepository::update_role(&state.db, &seller.id, UserRole::Seller)
            .await
            .unwrap();

        let request = CreateAppointment {
            title: "Intro call".to_string(),
            description: None,
            start_time: Utc::now() - Duration::hours(1),
            end_time: Utc::now() + Duration::hours(1),
        };

        let result = AppointmentService::create(&state, &buyer, "s@x.com", request).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn response_status_validation_happens_first() {
        let state = test_state().await;

        let buyer =
            UserRepository::upsert_by_google_id(&state.db, "g-b", "b@x.com", "B", Some("tok"))
                .await
                .unwrap();

        let result =
            AppointmentService::update_response_status(&state, "evt-1", &buyer, "maybe").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
