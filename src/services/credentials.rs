use sqlx::SqlitePool;

use crate::db::UserRepository;
use crate::error::{AppError, AppResult};
use crate::services::google::GoogleService;

/// A short-lived authorized calendar session for a single user.
///
/// Produced from the user's stored refresh credential; never persisted.
pub struct CalendarSession {
    pub access_token: String,
}

pub struct CredentialResolver;

impl CredentialResolver {
    /// Resolve a user's stored refresh credential into an authorized session.
    ///
    /// Fails with `NotFound` when no such user exists and with
    /// `PreconditionFailed` when the user has never connected their calendar.
    /// Read-only: the refreshed access token is handed to the caller and not
    /// stored anywhere.
    pub async fn resolve(
        pool: &SqlitePool,
        google: &GoogleService,
        email: &str,
    ) -> AppResult<CalendarSession> {
        let user = UserRepository::find_by_email(pool, email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))?;

        let refresh_token = user
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::PreconditionFailed(format!(
                    "{} has not connected their Google Calendar",
                    email
                ))
            })?;

        let token = google.refresh_access_token(refresh_token).await?;

        Ok(CalendarSession {
            access_token: token.access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn resolve_unknown_user_is_not_found() {
        let pool = test_pool().await;
        let google = GoogleService::new(&Config::default()).unwrap();

        let result = CredentialResolver::resolve(&pool, &google, "ghost@example.com").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn resolve_without_stored_credential_is_precondition_failed() {
        let pool = test_pool().await;
        let google = GoogleService::new(&Config::default()).unwrap();

        UserRepository::upsert_by_google_id(&pool, "g-1", "alice@example.com", "Alice", None)
            .await
            .unwrap();

        let result = CredentialResolver::resolve(&pool, &google, "alice@example.com").await;
        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }
}
