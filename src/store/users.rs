//! User accounts and the user-delete cascade.

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::store::{conflict_on_unique, orphans};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sqlx::SqliteConnection;

const USERNAME_TAKEN: &str = "Username already taken";

/// Hash a password into an argon2id PHC string
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn create(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
) -> AppResult<User> {
    let result = sqlx::query("INSERT INTO users (username, password) VALUES (?1, ?2)")
        .bind(username)
        .bind(password_hash)
        .execute(&mut *conn)
        .await
        .map_err(|e| conflict_on_unique(e, USERNAME_TAKEN))?;

    Ok(User {
        id: result.last_insert_rowid(),
        username: username.to_string(),
        password_hash: password_hash.to_string(),
    })
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT id, username, password FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

pub async fn get_by_username(conn: &mut SqliteConnection, username: &str) -> AppResult<Option<User>> {
    let user =
        sqlx::query_as::<_, User>("SELECT id, username, password FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(user)
}

pub async fn rename(conn: &mut SqliteConnection, id: i64, username: &str) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET username = ?2 WHERE id = ?1")
        .bind(id)
        .bind(username)
        .execute(&mut *conn)
        .await
        .map_err(|e| conflict_on_unique(e, USERNAME_TAKEN))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User"));
    }
    Ok(())
}

/// Delete a user with all their phrasebooks and sessions.
///
/// Translation ids are gathered across every phrasebook of the user first,
/// and collected once at the end, so a translation shared between two of
/// the user's own books is judged only after both links are gone. Returns
/// the number of purged translations.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> AppResult<usize> {
    let referenced: Vec<i64> = sqlx::query_scalar(
        "SELECT DISTINCT pt.translation_id
         FROM phrasebook_translation pt
         JOIN phrasebooks p ON p.id = pt.phrasebook_id
         WHERE p.user_id = ?1",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    sqlx::query(
        "DELETE FROM phrasebook_translation
         WHERE phrasebook_id IN (SELECT id FROM phrasebooks WHERE user_id = ?1)",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM phrasebooks WHERE user_id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User"));
    }

    orphans::collect_many(conn, referenced).await
}
