//! Application operations.
//!
//! Each mutating operation runs in a single transaction: authorization,
//! validation and every store call happen on the same connection, and an
//! early `?` drops the transaction, which rolls it back. The provider call
//! in [`translate`] happens before any transaction is opened.

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    Association, NewPhrasebook, PendingTranslation, Phrasebook, PhrasebookEdit, PhrasebookView,
    SortKey, User,
};
use crate::store::associations::{self, Detached};
use crate::store::{phrasebooks, sessions, translations, users};
use crate::translation::DeeplClient;
use crate::validation::{
    normalize_lang_code, normalize_note, validate_password, validate_phrasebook_name,
    validate_text, validate_username,
};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// A logged-in user and the bearer token for their session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user: User,
    pub phrasebooks: Vec<PhrasebookView>,
}

fn require_user(actor: Option<i64>) -> AppResult<i64> {
    actor.ok_or(AppError::Unauthorized)
}

/// Load a phrasebook the actor owns. Missing is `NotFound`, someone else's
/// is `Unauthorized`.
async fn owned_phrasebook(
    conn: &mut SqliteConnection,
    actor: i64,
    phrasebook_id: i64,
) -> AppResult<Phrasebook> {
    let phrasebook = phrasebooks::get(conn, phrasebook_id)
        .await?
        .ok_or_else(|| AppError::not_found("Phrasebook"))?;

    if phrasebook.user_id != actor {
        warn!(
            "User {} tried to modify phrasebook {} owned by {}",
            actor, phrasebook_id, phrasebook.user_id
        );
        return Err(AppError::Unauthorized);
    }
    Ok(phrasebook)
}

/// Target phrasebooks for a save, deduplicated and all owned by the actor
async fn owned_targets(
    conn: &mut SqliteConnection,
    actor: i64,
    phrasebook_ids: &[i64],
) -> AppResult<Vec<i64>> {
    let ids: BTreeSet<i64> = phrasebook_ids.iter().copied().collect();
    if ids.is_empty() {
        return Err(AppError::validation("No data submitted"));
    }
    for &id in &ids {
        owned_phrasebook(conn, actor, id).await?;
    }
    Ok(ids.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub async fn signup(db: &Database, username: &str, password: &str) -> AppResult<Session> {
    let username = validate_username(username)?;
    validate_password(password)?;
    let password_hash = users::hash_password(password)?;

    let mut tx = db.begin().await?;
    let user = users::create(&mut tx, &username, &password_hash).await?;
    let token = sessions::create(&mut tx, user.id).await?;
    tx.commit().await?;

    info!("Created user {} ({})", user.id, user.username);
    Ok(Session { token, user })
}

pub async fn login(db: &Database, username: &str, password: &str) -> AppResult<Session> {
    let mut tx = db.begin().await?;
    let user = users::get_by_username(&mut tx, username.trim())
        .await?
        .filter(|user| users::verify_password(password, &user.password_hash))
        .ok_or(AppError::Unauthorized)?;
    let token = sessions::create(&mut tx, user.id).await?;
    tx.commit().await?;

    info!("User {} logged in", user.id);
    Ok(Session { token, user })
}

pub async fn logout(db: &Database, token: &str) -> AppResult<()> {
    let mut conn = db.pool().acquire().await?;
    sessions::delete(&mut conn, token).await?;
    Ok(())
}

/// Map an optional bearer token to the current user id
pub async fn resolve_session(db: &Database, token: Option<&str>) -> AppResult<Option<i64>> {
    let Some(token) = token else {
        return Ok(None);
    };
    let mut conn = db.pool().acquire().await?;
    sessions::resolve(&mut conn, token).await
}

pub async fn user_profile(
    db: &Database,
    actor: Option<i64>,
    sort: SortKey,
) -> AppResult<UserProfile> {
    let actor = require_user(actor)?;
    let mut conn = db.pool().acquire().await?;

    let user = users::get(&mut conn, actor)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let books = phrasebooks::list_for_owner(&mut conn, actor, sort).await?;
    let phrasebooks = phrasebooks::with_translations(&mut conn, books).await?;

    Ok(UserProfile { user, phrasebooks })
}

/// Change the username. The current password must be supplied.
pub async fn edit_user(
    db: &Database,
    actor: Option<i64>,
    new_username: &str,
    password: &str,
) -> AppResult<User> {
    let actor = require_user(actor)?;
    let new_username = validate_username(new_username)?;

    let mut tx = db.begin().await?;
    let user = users::get(&mut tx, actor)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    if !users::verify_password(password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }
    users::rename(&mut tx, actor, &new_username).await?;
    tx.commit().await?;

    info!("User {} renamed to {}", actor, new_username);
    Ok(User {
        username: new_username,
        ..user
    })
}

/// Delete the actor's account, phrasebooks and sessions. Returns the number
/// of translations purged.
pub async fn delete_user(db: &Database, actor: Option<i64>) -> AppResult<usize> {
    let actor = require_user(actor)?;

    let mut tx = db.begin().await?;
    let purged = users::delete(&mut tx, actor).await?;
    tx.commit().await?;

    info!("Deleted user {}, purged {} translations", actor, purged);
    Ok(purged)
}

// ---------------------------------------------------------------------------
// Phrasebooks
// ---------------------------------------------------------------------------

pub async fn create_phrasebook(
    db: &Database,
    actor: Option<i64>,
    input: NewPhrasebook,
) -> AppResult<Phrasebook> {
    let actor = require_user(actor)?;
    let input = NewPhrasebook {
        name: validate_phrasebook_name(&input.name)?,
        lang_from: normalize_lang_code(&input.lang_from)?,
        lang_to: normalize_lang_code(&input.lang_to)?,
        public: input.public,
    };

    let mut tx = db.begin().await?;
    let phrasebook = phrasebooks::create(&mut tx, actor, &input).await?;
    tx.commit().await?;

    info!("User {} created phrasebook {}", actor, phrasebook.id);
    Ok(phrasebook)
}

pub async fn update_phrasebook(
    db: &Database,
    actor: Option<i64>,
    phrasebook_id: i64,
    edit: PhrasebookEdit,
) -> AppResult<Phrasebook> {
    let actor = require_user(actor)?;
    let name = validate_phrasebook_name(&edit.name)?;

    let mut tx = db.begin().await?;
    owned_phrasebook(&mut tx, actor, phrasebook_id).await?;
    let phrasebook = phrasebooks::update(&mut tx, phrasebook_id, &name, edit.public).await?;
    tx.commit().await?;

    Ok(phrasebook)
}

/// Returns the number of translations purged along with the phrasebook
pub async fn delete_phrasebook(
    db: &Database,
    actor: Option<i64>,
    phrasebook_id: i64,
) -> AppResult<usize> {
    let actor = require_user(actor)?;

    let mut tx = db.begin().await?;
    owned_phrasebook(&mut tx, actor, phrasebook_id).await?;
    let purged = phrasebooks::delete(&mut tx, phrasebook_id).await?;
    tx.commit().await?;

    info!(
        "Deleted phrasebook {}, purged {} translations",
        phrasebook_id, purged
    );
    Ok(purged)
}

/// Copy a public phrasebook (or one of the actor's own) into the actor's
/// account. Private phrasebooks of other users look missing.
pub async fn copy_public(
    db: &Database,
    actor: Option<i64>,
    source_id: i64,
) -> AppResult<Phrasebook> {
    let actor = require_user(actor)?;

    let mut tx = db.begin().await?;
    let source = phrasebooks::get(&mut tx, source_id)
        .await?
        .filter(|p| p.public || p.user_id == actor)
        .ok_or_else(|| AppError::not_found("Phrasebook"))?;
    let copy = phrasebooks::copy(&mut tx, source.id, actor).await?;
    tx.commit().await?;

    info!(
        "User {} copied phrasebook {} as {}",
        actor, source_id, copy.id
    );
    Ok(copy)
}

/// Public phrasebooks of other users, or of everyone when anonymous
pub async fn public_phrasebooks(
    db: &Database,
    actor: Option<i64>,
    sort: SortKey,
) -> AppResult<Vec<PhrasebookView>> {
    let mut conn = db.pool().acquire().await?;
    let books = phrasebooks::list_public(&mut conn, actor, sort).await?;
    phrasebooks::with_translations(&mut conn, books).await
}

// ---------------------------------------------------------------------------
// Translations
// ---------------------------------------------------------------------------

/// Fetch a translation from the provider. Nothing is persisted.
pub async fn translate(
    translator: &DeeplClient,
    text: &str,
    source_lang: Option<&str>,
    target_lang: &str,
) -> AppResult<PendingTranslation> {
    validate_text(text)?;
    let target_lang = normalize_lang_code(target_lang)?;
    let source_lang = source_lang
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_lang_code)
        .transpose()?;

    let result = translator
        .translate(text.trim(), source_lang.as_deref(), &target_lang)
        .await?;

    Ok(PendingTranslation {
        lang_from: source_lang.unwrap_or(result.detected_source_lang),
        lang_to: target_lang,
        text_from: text.trim().to_string(),
        text_to: result.translated_text,
    })
}

/// Persist a pending translation into one or more of the actor's
/// phrasebooks. An identical stored translation is reused.
pub async fn save_pending(
    db: &Database,
    actor: Option<i64>,
    pending: &PendingTranslation,
    phrasebook_ids: &[i64],
    note: Option<&str>,
) -> AppResult<Vec<Association>> {
    let actor = require_user(actor)?;
    validate_text(&pending.text_from)?;
    validate_text(&pending.text_to)?;
    let text_from = pending.text_from.trim();
    let text_to = pending.text_to.trim();
    let lang_from = normalize_lang_code(&pending.lang_from)?;
    let lang_to = normalize_lang_code(&pending.lang_to)?;
    let note = normalize_note(note);

    let mut tx = db.begin().await?;
    let targets = owned_targets(&mut tx, actor, phrasebook_ids).await?;
    let translation = translations::ingest(&mut tx, text_from, &lang_from, text_to, &lang_to).await?;

    let mut saved = Vec::with_capacity(targets.len());
    for phrasebook_id in targets {
        saved.push(associations::attach(&mut tx, phrasebook_id, translation.id, note.as_deref()).await?);
    }
    tx.commit().await?;

    info!(
        "User {} saved translation {} to {} phrasebook(s)",
        actor,
        translation.id,
        saved.len()
    );
    Ok(saved)
}

/// Add an already stored translation, seen in a public phrasebook, to the
/// actor's own phrasebooks
pub async fn add_existing(
    db: &Database,
    actor: Option<i64>,
    translation_id: i64,
    phrasebook_ids: &[i64],
    note: Option<&str>,
) -> AppResult<Vec<Association>> {
    let actor = require_user(actor)?;
    let note = normalize_note(note);

    let mut tx = db.begin().await?;
    if !translations::visible_to(&mut tx, translation_id, actor).await? {
        return Err(AppError::not_found("Translation"));
    }
    let targets = owned_targets(&mut tx, actor, phrasebook_ids).await?;

    let mut saved = Vec::with_capacity(targets.len());
    for phrasebook_id in targets {
        saved.push(associations::attach(&mut tx, phrasebook_id, translation_id, note.as_deref()).await?);
    }
    tx.commit().await?;

    Ok(saved)
}

pub async fn detach(
    db: &Database,
    actor: Option<i64>,
    phrasebook_id: i64,
    translation_id: i64,
) -> AppResult<Detached> {
    let actor = require_user(actor)?;

    let mut tx = db.begin().await?;
    owned_phrasebook(&mut tx, actor, phrasebook_id).await?;
    let detached = associations::detach(&mut tx, phrasebook_id, translation_id).await?;
    tx.commit().await?;

    if detached.translation_purged {
        info!(
            "Translation {} purged after leaving phrasebook {}",
            translation_id, phrasebook_id
        );
    }
    Ok(detached)
}

pub async fn set_note(
    db: &Database,
    actor: Option<i64>,
    phrasebook_id: i64,
    translation_id: i64,
    note: Option<&str>,
) -> AppResult<Association> {
    let actor = require_user(actor)?;
    let note = normalize_note(note);

    let mut tx = db.begin().await?;
    owned_phrasebook(&mut tx, actor, phrasebook_id).await?;
    associations::set_note(&mut tx, phrasebook_id, translation_id, note.as_deref()).await?;
    tx.commit().await?;

    Ok(Association {
        phrasebook_id,
        translation_id,
        note,
    })
}
