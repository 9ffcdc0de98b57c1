use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::db::{UserRepository, UserRole};
use crate::error::AppError;
use crate::services::google::GoogleService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/me", get(me).put(update_me))
        .route("/logout", post(logout))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    /// Whether the user has granted offline calendar access.
    pub calendar_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub role: String,
}

// ============================================================================
// State for OAuth flow
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OAuthState {
    csrf_token: String,
    redirect_to: Option<String>,
    iat: usize,
    exp: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Initiate Google OAuth login
async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> Result<impl IntoResponse, AppError> {
    // Generate CSRF token
    let csrf_token = generate_random_string(32);

    // Build short-lived state claims (10 minutes)
    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::minutes(10)).timestamp() as usize;

    let redirect_to = query.redirect_to.filter(|r| !r.is_empty());

    let state_claims = OAuthState {
        csrf_token,
        redirect_to,
        iat,
        exp,
    };

    // Sign state as a JWT so we don't need to set a CSRF cookie
    let state_jwt = encode(
        &Header::default(),
        &state_claims,
        &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
    )?;

    let scopes = GoogleService::get_required_scopes();
    let auth_url = state.google.get_auth_url(&state_jwt, &scopes);

    Ok(Redirect::to(&auth_url))
}

/// Handle Google OAuth callback
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, AppError> {
    // Check for OAuth errors
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::error!("OAuth error: {} - {}", error, description);
        return Err(AppError::BadRequest(format!(
            "OAuth error: {}",
            description
        )));
    }

    let code = query.code.ok_or_else(|| {
        tracing::error!("OAuth callback missing authorization code");
        AppError::BadRequest("Missing authorization code".to_string())
    })?;

    // Get and validate state (signed JWT)
    let state_encoded = query.state.ok_or_else(|| {
        tracing::error!("OAuth callback missing state parameter");
        AppError::BadRequest("Missing state parameter".to_string())
    })?;

    let token_data = decode::<OAuthState>(
        &state_encoded,
        &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::error!("Failed to decode OAuth state: {:?}", e);
        e
    })?;
    let oauth_state = token_data.claims;

    // Exchange code for tokens
    let token_response = state.google.exchange_code(&code).await?;

    // Get the user's OpenID profile
    let userinfo = state
        .google
        .get_userinfo(&token_response.access_token)
        .await?;

    // Create or update the user. The refresh token only arrives on the first
    // consent; the repository preserves any previously stored one.
    let display_name = userinfo.name.clone().unwrap_or_else(|| userinfo.email.clone());
    let user = UserRepository::upsert_by_google_id(
        &state.db,
        &userinfo.sub,
        &userinfo.email,
        &display_name,
        token_response.refresh_token.as_deref(),
    )
    .await?;

    // Create JWT token for the client (Bearer)
    let token = create_jwt(&state, &user.id)?;

    tracing::info!(
        "OAuth authentication successful for user: {} (google_id: {})",
        user.id,
        user.google_id
    );

    // Always redirect to /auth/callback on the frontend first. The token goes
    // into the URL fragment for the callback page to extract and store.
    let frontend_base = state.config.server.frontend_url.trim_end_matches('/');
    let callback_url = format!("{}/auth/callback", frontend_base);

    let token_enc: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    let expires_at = (Utc::now() + Duration::hours(state.config.jwt.expiration_hours)).timestamp();

    let raw_redirect = oauth_state.redirect_to.as_deref().unwrap_or("/dashboard");
    let safe_redirect = if is_safe_redirect(raw_redirect, frontend_base) {
        raw_redirect.to_string()
    } else {
        tracing::warn!("Rejected unsafe redirect_to value: {}", raw_redirect);
        "/dashboard".to_string()
    };

    let redirect_with_fragment = format!(
        "{}#access_token={}&token_type=Bearer&expires_at={}&redirect_to={}",
        callback_url,
        token_enc,
        expires_at,
        urlencoding::encode(&safe_redirect)
    );

    Ok(Redirect::to(&redirect_with_fragment))
}

/// Get current user info
async fn me(
    State(_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let calendar_connected = user.has_calendar_connected();
    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
        calendar_connected,
    }))
}

/// Update the current user's role (Buyer <-> Seller)
async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateMeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let role: UserRole = request
        .role
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid role".to_string()))?;

    UserRepository::update_role(&state.db, &user.id, role).await?;

    Ok(Json(serde_json::json!({ "success": true, "role": role })))
}

/// Logout - invalidate session
async fn logout(State(_state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, AppError> {
    // Auth is a stateless JWT; there is no server-side session to clear.
    // The endpoint exists so the frontend can call it without 404s and gives
    // a place to implement token blacklisting later if needed.
    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get current user from a bearer token string
pub async fn get_user_from_token(
    state: &Arc<AppState>,
    token: &str,
) -> Result<crate::db::User, AppError> {
    let claims = decode_jwt(state, token)?;
    let user = UserRepository::find_by_id(&state.db, &claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(user)
}

/// Generate a random string of specified length
fn generate_random_string(length: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Create a signed JWT for a user id
fn create_jwt(state: &Arc<AppState>, user_id: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(state.config.jwt.expiration_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    let header = Header::default();
    let token = encode(
        &header,
        &claims,
        &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
    )?;
    Ok(token)
}

/// Decode and validate a JWT, returning the claims
fn decode_jwt(state: &Arc<AppState>, token: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Validate a post-login redirect target to prevent open redirects.
///
/// Accepts relative paths starting with a single '/' and absolute URLs with
/// the same origin as the configured frontend.
fn is_safe_redirect(redirect: &str, frontend_base: &str) -> bool {
    if redirect.starts_with('/') && !redirect.starts_with("//") {
        return true;
    }
    if let Ok(u) = Url::parse(redirect) {
        if let Ok(front) = Url::parse(frontend_base) {
            return u.origin() == front.origin();
        }
    }
    false
}

// ============================================================================
// Auth Middleware / Extractor
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Extractor for authenticated user
pub struct AuthUser(pub crate::db::User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract Authorization header (Bearer token)
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let user = get_user_from_token(state, token).await.map_err(|e| {
            tracing::debug!("Failed to get user from token: {:?}", e);
            e
        })?;

        Ok(AuthUser(user))
    }
}
