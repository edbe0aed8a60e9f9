//! Connection-level persistence primitives.
//!
//! Every function takes `&mut SqliteConnection` so the service layer can run
//! several of them inside one transaction. Nothing here checks ownership;
//! that is the caller's job.

pub mod associations;
pub mod orphans;
pub mod phrasebooks;
pub mod sessions;
pub mod translations;
pub mod users;

use crate::error::AppError;

/// Map a unique-constraint violation to `Conflict`, pass everything else through
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(err),
    }
}
