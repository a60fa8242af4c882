//! Request and response shapes for the HTTP API
//!
//! Query and recommendation bodies stay schema-flexible ([`Document`]); only
//! the parameters the server itself interprets get a typed struct here.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::database::Document;
use crate::error::AppError;

/// Field names shared by both collections
pub mod fields {
    /// Owner of a query; on a recommendation, owner of the referenced query
    pub const USER_EMAIL: &str = "userEmail";
    /// Author of a recommendation
    pub const RECOMMENDER_EMAIL: &str = "recommenderEmail";
    /// Recommendation's reference to its query
    pub const QUERY_ID: &str = "queryId";
    /// Creation time in epoch milliseconds, used for newest-first listings
    pub const POSTED_TIMESTAMP: &str = "postedTimestamp";
    /// Number of recommendations referencing a query
    pub const RECOMMENDATION_COUNT: &str = "recommendationCount";
}

/// Body of `POST /jwt`
#[derive(Deserialize, Debug)]
pub struct TokenRequest {
    pub email: String,
}

/// Body returned by the cookie endpoints
#[derive(Serialize, Debug)]
pub struct SuccessResponse {
    pub success: bool,
}

/// `GET /query-details?id=...`
#[derive(Deserialize, Debug)]
pub struct DetailsParams {
    pub id: String,
}

/// `GET /all-recommendations?email=...` and `DELETE /delete-query/{id}?email=...`
#[derive(Deserialize, Debug)]
pub struct EmailParams {
    pub email: String,
}

/// `PATCH /update-query?id=...&email=...`
#[derive(Deserialize, Debug)]
pub struct UpdateQueryParams {
    pub id: String,
    pub email: String,
}

/// `DELETE /delete-recommendation[/{id}]?email=...&queryId=...`
///
/// The id may come from the path or from the query string.
#[derive(Deserialize, Debug)]
pub struct DeleteRecommendationParams {
    pub id: Option<String>,
    #[serde(rename = "queryId")]
    pub query_id: Option<String>,
    pub email: String,
}

/// Stamps the current time as the posting time unless the client sent a number
pub fn ensure_posted_timestamp(doc: &mut Document) {
    let has_timestamp = doc
        .get(fields::POSTED_TIMESTAMP)
        .is_some_and(Value::is_number);
    if !has_timestamp {
        doc.insert(
            fields::POSTED_TIMESTAMP.to_string(),
            Utc::now().timestamp_millis().into(),
        );
    }
}

/// Unwraps a JSON body that must be an object
pub fn into_document(body: Value) -> Result<Document, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::BadRequest(
            "request body must be a JSON object".to_string(),
        )),
    }
}

/// Reads a string field that the server relies on
pub fn required_str<'a>(doc: &'a Document, field: &str) -> Result<&'a str, AppError> {
    doc.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is required", field)))
}
