//! Translation rows: immutable content, lifetime derived from associations.

use crate::error::AppResult;
use crate::models::Translation;
use sqlx::SqliteConnection;
use tracing::debug;

pub async fn get(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Translation>> {
    let translation = sqlx::query_as::<_, Translation>(
        "SELECT id, lang_from, lang_to, text_from, text_to FROM translations WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(translation)
}

/// Find-or-reuse. An existing row with the same `(text_from, text_to,
/// lang_to)` is returned as is; `lang_from` is not part of the identity.
/// Otherwise a new row is inserted.
pub async fn ingest(
    conn: &mut SqliteConnection,
    text_from: &str,
    lang_from: &str,
    text_to: &str,
    lang_to: &str,
) -> AppResult<Translation> {
    let existing = sqlx::query_as::<_, Translation>(
        "SELECT id, lang_from, lang_to, text_from, text_to
         FROM translations
         WHERE text_from = ?1 AND text_to = ?2 AND lang_to = ?3
         ORDER BY id
         LIMIT 1",
    )
    .bind(text_from)
    .bind(text_to)
    .bind(lang_to)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(translation) = existing {
        debug!("Reusing translation {}", translation.id);
        return Ok(translation);
    }

    let result = sqlx::query(
        "INSERT INTO translations (lang_from, lang_to, text_from, text_to) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(lang_from)
    .bind(lang_to)
    .bind(text_from)
    .bind(text_to)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    debug!("Created translation {}", id);

    Ok(Translation {
        id,
        lang_from: lang_from.to_string(),
        lang_to: lang_to.to_string(),
        text_from: text_from.to_string(),
        text_to: text_to.to_string(),
    })
}

/// Whether `user_id` may see a translation: it sits in at least one public
/// phrasebook or in one of the user's own.
pub async fn visible_to(
    conn: &mut SqliteConnection,
    translation_id: i64,
    user_id: i64,
) -> AppResult<bool> {
    let visible: bool = sqlx::query_scalar(
        "SELECT EXISTS (
             SELECT 1 FROM phrasebook_translation pt
             JOIN phrasebooks p ON p.id = pt.phrasebook_id
             WHERE pt.translation_id = ?1 AND (p.public = 1 OR p.user_id = ?2)
         )",
    )
    .bind(translation_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(visible)
}
