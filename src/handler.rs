//! HTTP request handlers
//!
//! Handlers only unpack the request and hand over to the services. Protected
//! handlers receive the [`AuthUser`] that the gate attached to the request.

use std::collections::HashMap;

use axum::{extract::State, http::header, response::IntoResponse, Extension};
use serde_json::Value;
use tracing::info;

use crate::database::{DeleteResult, InsertResult, UpdateResult};
use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::model::{
    into_document, DeleteRecommendationParams, DetailsParams, Document, EmailParams,
    SuccessResponse, TokenRequest, UpdateQueryParams,
};
use crate::query_service::QueryService;
use crate::recommendation_service::RecommendationService;
use crate::state::AppState;

/// `GET /`
pub async fn welcome() -> &'static str {
    "welcome!"
}

/// `POST /jwt` - issues a session cookie for the given email
///
/// # Request Body
///
/// ```json
/// { "email": "user@example.com" }
/// ```
pub async fn issue_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.tokens.issue(&payload.email)?;
    info!(email = %payload.email, "session issued");

    Ok((
        [(header::SET_COOKIE, state.config.session_cookie(&token))],
        Json(SuccessResponse { success: true }),
    ))
}

/// `GET /clear-jwt` - expires the session cookie
pub async fn clear_token(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, state.config.cleared_session_cookie())],
        Json(SuccessResponse { success: true }),
    )
}

/// `GET /all-queries`
pub async fn all_queries(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(QueryService::new(&state.store).list_all()?))
}

/// `GET /recent-queries`
pub async fn recent_queries(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(QueryService::new(&state.store).list_recent()?))
}

/// `GET /my-queries?userEmail=...[&category=...]`
pub async fn my_queries(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(QueryService::new(&state.store).list_mine(&user, &params)?))
}

/// `GET /query-details?id=...`
pub async fn query_details(
    State(state): State<AppState>,
    Query(params): Query<DetailsParams>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(QueryService::new(&state.store).get_by_id(&params.id)?))
}

/// `POST /add-query`
///
/// The body is the query itself and must name its owner in `userEmail`.
pub async fn add_query(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> Result<Json<InsertResult>, AppError> {
    let content = into_document(body)?;
    Ok(Json(QueryService::new(&state.store).create(&user, content)?))
}

/// `PATCH /update-query?id=...&email=...`
pub async fn update_query(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<UpdateQueryParams>,
    Json(body): Json<Value>,
) -> Result<Json<UpdateResult>, AppError> {
    let patch = into_document(body)?;
    let result =
        QueryService::new(&state.store).update(&user, &params.id, &params.email, patch)?;
    Ok(Json(result))
}

/// `DELETE /delete-query/{id}?email=...`
pub async fn delete_query(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(params): Query<EmailParams>,
) -> Result<Json<DeleteResult>, AppError> {
    Ok(Json(
        QueryService::new(&state.store).delete(&user, &id, &params.email)?,
    ))
}

/// `GET /query-comments?queryId=...`
pub async fn query_comments(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(
        RecommendationService::new(&state.store).list_for_query(&params)?,
    ))
}

/// `GET /all-recommendations?email=...`
pub async fn all_recommendations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<EmailParams>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(
        RecommendationService::new(&state.store).list_for_user(&user, &params.email)?,
    ))
}

/// `POST /add-recommendation`
///
/// The body must carry `recommenderEmail` and `queryId`.
pub async fn add_recommendation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> Result<Json<InsertResult>, AppError> {
    let content = into_document(body)?;
    Ok(Json(
        RecommendationService::new(&state.store).create(&user, content)?,
    ))
}

/// `DELETE /delete-recommendation/{id}?email=...&queryId=...`
pub async fn delete_recommendation_by_path(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(params): Query<DeleteRecommendationParams>,
) -> Result<Json<DeleteResult>, AppError> {
    remove_recommendation(&state, &user, &id, &params)
}

/// `DELETE /delete-recommendation?id=...&email=...&queryId=...`
pub async fn delete_recommendation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DeleteRecommendationParams>,
) -> Result<Json<DeleteResult>, AppError> {
    let id = params
        .id
        .clone()
        .ok_or_else(|| AppError::BadRequest("'id' is required".to_string()))?;
    remove_recommendation(&state, &user, &id, &params)
}

fn remove_recommendation(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    params: &DeleteRecommendationParams,
) -> Result<Json<DeleteResult>, AppError> {
    let result = RecommendationService::new(&state.store).delete(
        user,
        id,
        params.query_id.as_deref(),
        &params.email,
    )?;
    Ok(Json(result))
}
