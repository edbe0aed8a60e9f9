//! Orphan collection: a translation lives exactly as long as some
//! phrasebook references it.
//!
//! Both functions read the reference count through the caller's connection,
//! so when that connection is a transaction the count reflects every
//! association removed earlier in the same transaction.

use crate::error::AppResult;
use sqlx::SqliteConnection;
use std::collections::BTreeSet;
use tracing::debug;

/// Number of associations currently pointing at a translation
pub async fn reference_count(conn: &mut SqliteConnection, translation_id: i64) -> AppResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM phrasebook_translation WHERE translation_id = ?1")
            .bind(translation_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

/// Delete the translation iff nothing references it. Returns whether a row
/// was deleted.
pub async fn collect(conn: &mut SqliteConnection, translation_id: i64) -> AppResult<bool> {
    // Count and delete in one statement so no attach can slip in between
    let result = sqlx::query(
        "DELETE FROM translations
         WHERE id = ?1
           AND NOT EXISTS (
               SELECT 1 FROM phrasebook_translation WHERE translation_id = ?1
           )",
    )
    .bind(translation_id)
    .execute(&mut *conn)
    .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        debug!("Collected orphaned translation {}", translation_id);
    }
    Ok(deleted)
}

/// Run [`collect`] once per distinct id. Call only after the owning
/// associations are gone. Returns how many translations were purged.
pub async fn collect_many<I>(conn: &mut SqliteConnection, translation_ids: I) -> AppResult<usize>
where
    I: IntoIterator<Item = i64>,
{
    let unique: BTreeSet<i64> = translation_ids.into_iter().collect();

    let mut purged = 0;
    for id in unique {
        if collect(conn, id).await? {
            purged += 1;
        }
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::create_test_db;
    use crate::store::{fixtures, translations};

    #[tokio::test]
    async fn test_collect_removes_only_unreferenced() {
        let (db, _temp_dir) = create_test_db().await;
        let fx = fixtures::seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(!collect(&mut conn, fx.t1).await.unwrap());
        assert!(!collect(&mut conn, fx.t2).await.unwrap());
        assert!(collect(&mut conn, fx.t3).await.unwrap());

        assert!(translations::get(&mut conn, fx.t1).await.unwrap().is_some());
        assert!(translations::get(&mut conn, fx.t2).await.unwrap().is_some());
        assert!(translations::get(&mut conn, fx.t3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_collect_missing_translation_is_noop() {
        let (db, _temp_dir) = create_test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(!collect(&mut conn, 9999).await.unwrap());
    }

    #[tokio::test]
    async fn test_reference_count() {
        let (db, _temp_dir) = create_test_db().await;
        let fx = fixtures::seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(reference_count(&mut conn, fx.t1).await.unwrap(), 1);
        assert_eq!(reference_count(&mut conn, fx.t2).await.unwrap(), 2);
        assert_eq!(reference_count(&mut conn, fx.t3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_collect_many_dedupes_and_counts() {
        let (db, _temp_dir) = create_test_db().await;
        let fx = fixtures::seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let purged = collect_many(&mut conn, vec![fx.t3, fx.t3, fx.t1, fx.t2])
            .await
            .unwrap();
        assert_eq!(purged, 1);
    }

    #[tokio::test]
    async fn test_collect_sees_deletes_in_same_transaction() {
        let (db, _temp_dir) = create_test_db().await;
        let fx = fixtures::seed(&db).await;

        let mut tx = db.begin().await.unwrap();
        sqlx::query("DELETE FROM phrasebook_translation WHERE translation_id = ?1")
            .bind(fx.t1)
            .execute(&mut *tx)
            .await
            .unwrap();
        assert!(collect(&mut tx, fx.t1).await.unwrap());
        tx.rollback().await.unwrap();

        // Rolled back: both association and translation are back
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(translations::get(&mut conn, fx.t1).await.unwrap().is_some());
        assert_eq!(reference_count(&mut conn, fx.t1).await.unwrap(), 1);
    }
}
