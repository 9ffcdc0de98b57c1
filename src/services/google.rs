use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const GOOGLE_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Client for Google OAuth and the Calendar v3 events API.
///
/// All calendar operations run against the `primary` calendar of whichever
/// user the supplied access token belongs to.
#[derive(Debug, Clone)]
pub struct GoogleService {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

// ============================================================================
// OAuth Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Only present on the first consent (or when re-consenting).
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserinfo {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

// ============================================================================
// Calendar Event Types (wire format, camelCase)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EventsListResponse {
    pub items: Option<Vec<GoogleEvent>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<EventAttendee>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<EventOrganizer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hangout_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conference_data: Option<ConferenceData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// All-day events carry a date instead of a dateTime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOrganizer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_request: Option<ConferenceCreateRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_points: Option<Vec<ConferenceEntryPoint>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceCreateRequest {
    pub request_id: String,
    pub conference_solution_key: ConferenceSolutionKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferenceSolutionKey {
    #[serde(rename = "type")]
    pub key_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceEntryPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point_type: Option<String>,
}

impl GoogleService {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            client_id: config.google.client_id.clone(),
            client_secret: config.google.client_secret.clone(),
            redirect_uri: config.google.redirect_uri.clone(),
        })
    }

    /// Scopes requested at sign-in. Calendar event access is what makes the
    /// stored refresh token usable for bookings later.
    pub fn get_required_scopes() -> Vec<&'static str> {
        vec![
            "openid",
            "email",
            "profile",
            "https://www.googleapis.com/auth/calendar.events",
        ]
    }

    // ========================================================================
    // OAuth Methods
    // ========================================================================

    /// Generate the OAuth authorization URL.
    ///
    /// `access_type=offline` together with `prompt=consent` makes Google issue
    /// a refresh token, which is the credential the booking flows depend on.
    pub fn get_auth_url(&self, state: &str, scopes: &[&str]) -> String {
        let scope = scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            GOOGLE_AUTH_URL,
            self.client_id,
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> AppResult<TokenResponse> {
        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!(
                "Failed to exchange code: {}",
                error_text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse token response: {}", e)))
    }

    /// Exchange a stored refresh token for a short-lived access token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<AccessTokenResponse> {
        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!(
                "Failed to refresh token: {}",
                error_text
            )));
        }

        response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse token response: {}", e)))
    }

    /// Get the signed-in user's OpenID profile.
    pub async fn get_userinfo(&self, access_token: &str) -> AppResult<GoogleUserinfo> {
        let response = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!(
                "Failed to get userinfo: {}",
                error_text
            )));
        }

        response
            .json::<GoogleUserinfo>()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse userinfo response: {}", e)))
    }

    // ========================================================================
    // Calendar Event Methods
    // ========================================================================

    /// List events on the primary calendar within `[time_min, time_max)`.
    ///
    /// `singleEvents=true` expands recurring series so the availability scan
    /// only ever sees concrete instances; results come back ordered by start.
    pub async fn list_events(
        &self,
        access_token: &str,
        time_min: &str,
        time_max: &str,
    ) -> AppResult<Vec<GoogleEvent>> {
        let response = self
            .client
            .get(format!(
                "{}/calendars/primary/events",
                GOOGLE_CALENDAR_API_URL
            ))
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min),
                ("timeMax", time_max),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!(
                "Failed to list events: {}",
                error_text
            )));
        }

        let list: EventsListResponse = response
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse events response: {}", e)))?;

        Ok(list.items.unwrap_or_default())
    }

    /// Fetch a single event by id.
    pub async fn get_event(&self, access_token: &str, event_id: &str) -> AppResult<GoogleEvent> {
        let response = self
            .client
            .get(format!(
                "{}/calendars/primary/events/{}",
                GOOGLE_CALENDAR_API_URL, event_id
            ))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND || response.status() == StatusCode::GONE {
            return Err(AppError::NotFound("Appointment not found".to_string()));
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!(
                "Failed to get event: {}",
                error_text
            )));
        }

        response
            .json::<GoogleEvent>()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse event response: {}", e)))
    }

    /// Insert a new event.
    ///
    /// `conferenceDataVersion=1` is required for the conference create request
    /// in the payload to take effect (auto-generated Meet link).
    pub async fn insert_event(
        &self,
        access_token: &str,
        event: &GoogleEvent,
    ) -> AppResult<GoogleEvent> {
        let response = self
            .client
            .post(format!(
                "{}/calendars/primary/events",
                GOOGLE_CALENDAR_API_URL
            ))
            .bearer_auth(access_token)
            .query(&[("conferenceDataVersion", "1")])
            .json(event)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!(
                "Failed to insert event: {}",
                error_text
            )));
        }

        response
            .json::<GoogleEvent>()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse event response: {}", e)))
    }

    /// Full-replace update of an existing event.
    ///
    /// Callers read the event, mutate it and write the whole thing back.
    /// There is no etag check; concurrent writers race and the last write
    /// wins.
    pub async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &GoogleEvent,
    ) -> AppResult<GoogleEvent> {
        let response = self
            .client
            .put(format!(
                "{}/calendars/primary/events/{}",
                GOOGLE_CALENDAR_API_URL, event_id
            ))
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND || response.status() == StatusCode::GONE {
            return Err(AppError::NotFound("Appointment not found".to_string()));
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!(
                "Failed to update event: {}",
                error_text
            )));
        }

        response
            .json::<GoogleEvent>()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse event response: {}", e)))
    }

    /// Delete an event from the owning calendar.
    pub async fn delete_event(&self, access_token: &str, event_id: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(format!(
                "{}/calendars/primary/events/{}",
                GOOGLE_CALENDAR_API_URL, event_id
            ))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND || response.status() == StatusCode::GONE {
            return Err(AppError::NotFound("Appointment not found".to_string()));
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GoogleApi(format!(
                "Failed to delete event: {}",
                error_text
            )));
        }

        Ok(())
    }
}
