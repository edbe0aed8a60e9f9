//! Opaque bearer tokens mapping to a user id.
//!
//! Tokens have no expiry; a session ends on logout or when its user is
//! deleted. `created_at` is kept for auditing.

use crate::error::AppResult;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

pub async fn create(conn: &mut SqliteConnection, user_id: i64) -> AppResult<String> {
    let token = Uuid::new_v4().simple().to_string();
    let created_at = Utc::now();

    sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)")
        .bind(&token)
        .bind(user_id)
        .bind(created_at)
        .execute(&mut *conn)
        .await?;

    Ok(token)
}

/// User id behind a token, or `None` for unknown and logged-out tokens
pub async fn resolve(conn: &mut SqliteConnection, token: &str) -> AppResult<Option<i64>> {
    let user_id = sqlx::query_scalar("SELECT user_id FROM sessions WHERE token = ?1")
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user_id)
}

/// When a session was opened
pub async fn created_at(
    conn: &mut SqliteConnection,
    token: &str,
) -> AppResult<Option<DateTime<Utc>>> {
    let created_at = sqlx::query_scalar("SELECT created_at FROM sessions WHERE token = ?1")
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(created_at)
}

pub async fn delete(conn: &mut SqliteConnection, token: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?1")
        .bind(token)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
