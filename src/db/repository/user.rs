use chrono::Utc;

use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, google_id, email, name, role, refresh_token,
                created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            google_id: r.get("google_id"),
            email: r.get("email"),
            name: r.get("name"),
            role: r.get("role"),
            refresh_token: r.get("refresh_token"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, google_id, email, name, role, refresh_token,
                created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            google_id: r.get("google_id"),
            email: r.get("email"),
            name: r.get("name"),
            role: r.get("role"),
            refresh_token: r.get("refresh_token"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Look up a user by email, requiring the given role.
    pub async fn find_by_email_and_role(
        pool: &SqlitePool,
        email: &str,
        role: UserRole,
    ) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, google_id, email, name, role, refresh_token,
                created_at, updated_at
            FROM users
            WHERE email = ? AND role = ?
            "#,
        )
        .bind(email)
        .bind(role)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            google_id: r.get("google_id"),
            email: r.get("email"),
            name: r.get("name"),
            role: r.get("role"),
            refresh_token: r.get("refresh_token"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// All sellers, newest first.
    pub async fn list_sellers(pool: &SqlitePool) -> AppResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, google_id, email, name, role, refresh_token,
                created_at, updated_at
            FROM users
            WHERE role = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(UserRole::Seller)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| User {
                id: r.get("id"),
                google_id: r.get("google_id"),
                email: r.get("email"),
                name: r.get("name"),
                role: r.get("role"),
                refresh_token: r.get("refresh_token"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
            .collect())
    }

    /// Create or update a user keyed by their Google identity.
    ///
    /// Google only returns a refresh token on the first consent, so an
    /// existing stored token is preserved when `refresh_token` is `None`.
    pub async fn upsert_by_google_id(
        pool: &SqlitePool,
        google_id: &str,
        email: &str,
        name: &str,
        refresh_token: Option<&str>,
    ) -> AppResult<User> {
        let now = Utc::now().naive_utc();

        let existing = Self::find_by_google_id(pool, google_id).await?;

        let row = if let Some(user) = existing {
            sqlx::query(
                r#"
                UPDATE users
                SET
                    email = ?,
                    name = ?,
                    refresh_token = COALESCE(?, refresh_token),
                    updated_at = ?
                WHERE id = ?
                RETURNING
                    id, google_id, email, name, role, refresh_token,
                    created_at, updated_at
                "#,
            )
            .bind(email)
            .bind(name)
            .bind(refresh_token)
            .bind(now)
            .bind(&user.id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?
        } else {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO users (
                    id, google_id, email, name, role, refresh_token,
                    created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING
                    id, google_id, email, name, role, refresh_token,
                    created_at, updated_at
                "#,
            )
            .bind(&id)
            .bind(google_id)
            .bind(email)
            .bind(name)
            .bind(UserRole::Buyer)
            .bind(refresh_token)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?
        };

        Ok(User {
            id: row.get("id"),
            google_id: row.get("google_id"),
            email: row.get("email"),
            name: row.get("name"),
            role: row.get("role"),
            refresh_token: row.get("refresh_token"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    pub async fn find_by_google_id(pool: &SqlitePool, google_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, google_id, email, name, role, refresh_token,
                created_at, updated_at
            FROM users
            WHERE google_id = ?
            "#,
        )
        .bind(google_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            google_id: r.get("google_id"),
            email: r.get("email"),
            name: r.get("name"),
            role: r.get("role"),
            refresh_token: r.get("refresh_token"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn update_role(pool: &SqlitePool, user_id: &str, role: UserRole) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET
                role = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(role)
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }

}
