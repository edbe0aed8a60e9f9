//! Phrasebook ↔ translation links and their per-link notes.

use crate::error::{AppError, AppResult};
use crate::models::{Association, SavedTranslation};
use crate::store::{orphans, phrasebooks, translations};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

/// What a detach actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detached {
    /// An association row existed and was removed
    pub removed: bool,
    /// The translation lost its last reference and was deleted
    pub translation_purged: bool,
}

pub async fn get(
    conn: &mut SqliteConnection,
    phrasebook_id: i64,
    translation_id: i64,
) -> AppResult<Option<Association>> {
    let association = sqlx::query_as::<_, Association>(
        "SELECT phrasebook_id, translation_id, note
         FROM phrasebook_translation
         WHERE phrasebook_id = ?1 AND translation_id = ?2",
    )
    .bind(phrasebook_id)
    .bind(translation_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(association)
}

/// Link a translation to a phrasebook.
///
/// Idempotent: if the pair already exists the stored row (and its note) is
/// returned untouched and `note` is ignored.
pub async fn attach(
    conn: &mut SqliteConnection,
    phrasebook_id: i64,
    translation_id: i64,
    note: Option<&str>,
) -> AppResult<Association> {
    if phrasebooks::get(conn, phrasebook_id).await?.is_none() {
        return Err(AppError::not_found("Phrasebook"));
    }
    if translations::get(conn, translation_id).await?.is_none() {
        return Err(AppError::not_found("Translation"));
    }

    let result = sqlx::query(
        "INSERT INTO phrasebook_translation (phrasebook_id, translation_id, note)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (phrasebook_id, translation_id) DO NOTHING",
    )
    .bind(phrasebook_id)
    .bind(translation_id)
    .bind(note)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(
            "Translation {} already in phrasebook {}",
            translation_id, phrasebook_id
        );
    }

    get(conn, phrasebook_id, translation_id)
        .await?
        .ok_or_else(|| AppError::Internal("association vanished after insert".to_string()))
}

/// Remove a link, then collect the translation if that was its last
/// reference. Detaching a pair that does not exist is a no-op, but the
/// collection step still runs.
pub async fn detach(
    conn: &mut SqliteConnection,
    phrasebook_id: i64,
    translation_id: i64,
) -> AppResult<Detached> {
    let result = sqlx::query(
        "DELETE FROM phrasebook_translation WHERE phrasebook_id = ?1 AND translation_id = ?2",
    )
    .bind(phrasebook_id)
    .bind(translation_id)
    .execute(&mut *conn)
    .await?;

    let translation_purged = orphans::collect(conn, translation_id).await?;

    Ok(Detached {
        removed: result.rows_affected() > 0,
        translation_purged,
    })
}

/// Replace the note on an existing link. `None` clears it.
pub async fn set_note(
    conn: &mut SqliteConnection,
    phrasebook_id: i64,
    translation_id: i64,
    note: Option<&str>,
) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE phrasebook_translation SET note = ?3
         WHERE phrasebook_id = ?1 AND translation_id = ?2",
    )
    .bind(phrasebook_id)
    .bind(translation_id)
    .bind(note)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Translation in phrasebook"));
    }
    Ok(())
}

/// Translation ids referenced by one phrasebook
pub async fn translation_ids(conn: &mut SqliteConnection, phrasebook_id: i64) -> AppResult<Vec<i64>> {
    let ids = sqlx::query_scalar(
        "SELECT translation_id FROM phrasebook_translation
         WHERE phrasebook_id = ?1
         ORDER BY translation_id",
    )
    .bind(phrasebook_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Every link of a phrasebook joined with the translation content
pub async fn list(conn: &mut SqliteConnection, phrasebook_id: i64) -> AppResult<Vec<SavedTranslation>> {
    let rows = sqlx::query_as::<_, SavedTranslation>(
        "SELECT t.id AS translation_id, t.lang_from, t.lang_to, t.text_from, t.text_to, pt.note
         FROM phrasebook_translation pt
         JOIN translations t ON t.id = pt.translation_id
         WHERE pt.phrasebook_id = ?1
         ORDER BY t.id",
    )
    .bind(phrasebook_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
