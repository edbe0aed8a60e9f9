//! Phrasebook rows and their lifecycle.

use crate::error::{AppError, AppResult};
use crate::models::{NewPhrasebook, Phrasebook, PhrasebookView, SortKey};
use crate::store::{associations, orphans};
use sqlx::SqliteConnection;

const COLUMNS: &str = "id, name, user_id, public, lang_from, lang_to";

pub async fn get(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Phrasebook>> {
    let phrasebook =
        sqlx::query_as::<_, Phrasebook>(&format!("SELECT {COLUMNS} FROM phrasebooks WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(phrasebook)
}

/// Insert a phrasebook. Input is expected to be validated already.
pub async fn create(
    conn: &mut SqliteConnection,
    owner_id: i64,
    input: &NewPhrasebook,
) -> AppResult<Phrasebook> {
    let result = sqlx::query(
        "INSERT INTO phrasebooks (name, user_id, public, lang_from, lang_to)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&input.name)
    .bind(owner_id)
    .bind(input.public)
    .bind(&input.lang_from)
    .bind(&input.lang_to)
    .execute(&mut *conn)
    .await?;

    Ok(Phrasebook {
        id: result.last_insert_rowid(),
        name: input.name.clone(),
        user_id: owner_id,
        public: input.public,
        lang_from: input.lang_from.clone(),
        lang_to: input.lang_to.clone(),
    })
}

/// Rename and/or change visibility
pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
    public: bool,
) -> AppResult<Phrasebook> {
    let result = sqlx::query("UPDATE phrasebooks SET name = ?2, public = ?3 WHERE id = ?1")
        .bind(id)
        .bind(name)
        .bind(public)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Phrasebook"));
    }

    get(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Phrasebook"))
}

/// Delete a phrasebook, its links, and any translation left unreferenced.
///
/// Referenced ids are captured before the links go, and collection runs only
/// after the phrasebook row itself is gone. Returns the number of purged
/// translations.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> AppResult<usize> {
    let referenced = associations::translation_ids(conn, id).await?;

    sqlx::query("DELETE FROM phrasebook_translation WHERE phrasebook_id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query("DELETE FROM phrasebooks WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Phrasebook"));
    }

    orphans::collect_many(conn, referenced).await
}

/// Copy a phrasebook to a new owner.
///
/// The copy shares the source's translation rows: only new links are
/// created, each with an empty note. The copy starts private.
pub async fn copy(
    conn: &mut SqliteConnection,
    source_id: i64,
    new_owner_id: i64,
) -> AppResult<Phrasebook> {
    let source = get(conn, source_id)
        .await?
        .ok_or_else(|| AppError::not_found("Phrasebook"))?;

    let copy = create(
        conn,
        new_owner_id,
        &NewPhrasebook {
            name: source.name,
            lang_from: source.lang_from,
            lang_to: source.lang_to,
            public: false,
        },
    )
    .await?;

    sqlx::query(
        "INSERT INTO phrasebook_translation (phrasebook_id, translation_id, note)
         SELECT ?1, translation_id, NULL
         FROM phrasebook_translation
         WHERE phrasebook_id = ?2",
    )
    .bind(copy.id)
    .bind(source_id)
    .execute(&mut *conn)
    .await?;

    Ok(copy)
}

pub async fn list_for_owner(
    conn: &mut SqliteConnection,
    owner_id: i64,
    sort: SortKey,
) -> AppResult<Vec<Phrasebook>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM phrasebooks WHERE user_id = ?1 ORDER BY {}",
        sort.order_by()
    );
    let phrasebooks = sqlx::query_as::<_, Phrasebook>(&sql)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(phrasebooks)
}

/// Public phrasebooks, optionally hiding those owned by `exclude_owner`
pub async fn list_public(
    conn: &mut SqliteConnection,
    exclude_owner: Option<i64>,
    sort: SortKey,
) -> AppResult<Vec<Phrasebook>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM phrasebooks
         WHERE public = 1 AND (?1 IS NULL OR user_id != ?1)
         ORDER BY {}",
        sort.order_by()
    );
    let phrasebooks = sqlx::query_as::<_, Phrasebook>(&sql)
        .bind(exclude_owner)
        .fetch_all(&mut *conn)
        .await?;
    Ok(phrasebooks)
}

/// Attach each phrasebook's saved translations
pub async fn with_translations(
    conn: &mut SqliteConnection,
    phrasebooks: Vec<Phrasebook>,
) -> AppResult<Vec<PhrasebookView>> {
    let mut views = Vec::with_capacity(phrasebooks.len());
    for phrasebook in phrasebooks {
        let translations = associations::list(conn, phrasebook.id).await?;
        views.push(PhrasebookView {
            phrasebook,
            translations,
        });
    }
    Ok(views)
}
