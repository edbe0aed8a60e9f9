//! JSON HTTP surface.

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    Association, NewPhrasebook, PendingTranslation, Phrasebook, PhrasebookEdit, PhrasebookView,
    SortKey, User,
};
use crate::service::{self, Session, UserProfile};
use crate::store::associations::Detached;
use crate::translation::{DeeplClient, TargetLanguage};
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub translator: DeeplClient,
}

/// The user behind the request's bearer token, if any. Unknown or logged-out
/// tokens resolve to `None`.
pub struct CurrentUser(pub Option<i64>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = service::resolve_session(&state.db, bearer_token(&parts.headers)).await?;
        Ok(CurrentUser(user_id))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub sort: SortKey,
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    #[serde(default)]
    pub source_lang: Option<String>,
    pub target_lang: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveTranslationRequest {
    pub translation: PendingTranslation,
    pub phrasebook_ids: Vec<i64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddToPhrasebooksRequest {
    pub phrasebook_ids: Vec<i64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Purged {
    pub translations_purged: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/languages", get(languages))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(show_user))
        .route("/user/edit", post(edit_user))
        .route("/user/delete", post(delete_user))
        .route("/translate", post(translate))
        .route("/translation/add", post(save_translation))
        .route("/phrasebook/add", post(add_phrasebook))
        .route("/phrasebook/:id/edit", post(edit_phrasebook))
        .route("/phrasebook/:id/delete", post(delete_phrasebook))
        .route(
            "/phrasebook/:phrasebook_id/translation/:translation_id/delete",
            post(remove_translation),
        )
        .route(
            "/phrasebook/:phrasebook_id/translation/:translation_id/note",
            post(edit_note),
        )
        .route("/public", get(show_public))
        .route("/public/translation/:translation_id/add", post(add_public_translation))
        .route("/public/phrasebook/:id/add", post(copy_public_phrasebook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Extractor failures come back as JSON `VALIDATION_ERROR` bodies instead of
// axum's plain-text rejections.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(format!("Malformed request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation(format!("Malformed path: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(format!("Malformed query: {}", rejection.body_text()))
    }
}

async fn health(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    state.db.ping().await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

async fn languages(State(state): State<AppState>) -> AppResult<Json<Vec<TargetLanguage>>> {
    Ok(Json(state.translator.target_languages().await?))
}

async fn signup(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let Json(body) = body?;
    let session = service::signup(&state.db, &body.username, &body.password).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<Json<Session>> {
    let Json(body) = body?;
    Ok(Json(
        service::login(&state.db, &body.username, &body.password).await?,
    ))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<StatusCode> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    service::logout(&state.db, token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn show_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<UserProfile>> {
    let Query(query) = query?;
    Ok(Json(
        service::user_profile(&state.db, actor, query.sort).await?,
    ))
}

async fn edit_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    body: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<Json<User>> {
    let Json(body) = body?;
    Ok(Json(
        service::edit_user(&state.db, actor, &body.username, &body.password).await?,
    ))
}

async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> AppResult<Json<Purged>> {
    let translations_purged = service::delete_user(&state.db, actor).await?;
    Ok(Json(Purged {
        translations_purged,
    }))
}

async fn translate(
    State(state): State<AppState>,
    body: Result<Json<TranslateRequest>, JsonRejection>,
) -> AppResult<Json<PendingTranslation>> {
    let Json(body) = body?;
    let pending = service::translate(
        &state.translator,
        &body.text,
        body.source_lang.as_deref(),
        &body.target_lang,
    )
    .await?;
    Ok(Json(pending))
}

async fn save_translation(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    body: Result<Json<SaveTranslationRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Vec<Association>>)> {
    let Json(body) = body?;
    let saved = service::save_pending(
        &state.db,
        actor,
        &body.translation,
        &body.phrasebook_ids,
        body.note.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn add_phrasebook(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    body: Result<Json<NewPhrasebook>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Phrasebook>)> {
    let Json(body) = body?;
    let phrasebook = service::create_phrasebook(&state.db, actor, body).await?;
    Ok((StatusCode::CREATED, Json(phrasebook)))
}

async fn edit_phrasebook(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<PhrasebookEdit>, JsonRejection>,
) -> AppResult<Json<Phrasebook>> {
    let Path(id) = id?;
    let Json(body) = body?;
    Ok(Json(
        service::update_phrasebook(&state.db, actor, id, body).await?,
    ))
}

async fn delete_phrasebook(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Purged>> {
    let Path(id) = id?;
    let translations_purged = service::delete_phrasebook(&state.db, actor, id).await?;
    Ok(Json(Purged {
        translations_purged,
    }))
}

async fn remove_translation(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> AppResult<Json<Detached>> {
    let Path((phrasebook_id, translation_id)) = ids?;
    Ok(Json(
        service::detach(&state.db, actor, phrasebook_id, translation_id).await?,
    ))
}

async fn edit_note(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ids: Result<Path<(i64, i64)>, PathRejection>,
    body: Result<Json<NoteRequest>, JsonRejection>,
) -> AppResult<Json<Association>> {
    let Path((phrasebook_id, translation_id)) = ids?;
    let Json(body) = body?;
    let association = service::set_note(
        &state.db,
        actor,
        phrasebook_id,
        translation_id,
        body.note.as_deref(),
    )
    .await?;
    Ok(Json(association))
}

async fn show_public(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<Vec<PhrasebookView>>> {
    let Query(query) = query?;
    Ok(Json(
        service::public_phrasebooks(&state.db, actor, query.sort).await?,
    ))
}

async fn add_public_translation(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    translation_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<AddToPhrasebooksRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Vec<Association>>)> {
    let Path(translation_id) = translation_id?;
    let Json(body) = body?;
    let saved = service::add_existing(
        &state.db,
        actor,
        translation_id,
        &body.phrasebook_ids,
        body.note.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn copy_public_phrasebook(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<(StatusCode, Json<Phrasebook>)> {
    let Path(id) = id?;
    let copy = service::copy_public(&state.db, actor, id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers_with("Bearer   abc123 ")), Some("abc123"));
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
