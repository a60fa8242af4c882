//! Operations on the queries collection
//!
//! Reads are public. Every write first checks that the caller's verified
//! identity is the claimed owner, and for existing documents also the stored
//! owner, before the store is touched.

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use crate::database::{
    Collection, DeleteResult, DocumentStore, Filter, FindOptions, InsertResult, Sort, Update,
    UpdateResult, ID_FIELD,
};
use crate::error::AppError;
use crate::middleware::{ensure_document_owner, ensure_owner, AuthUser};
use crate::model::{ensure_posted_timestamp, fields, required_str, Document};

/// How many queries `list_recent` returns
pub const RECENT_LIMIT: usize = 6;

/// Fields a caller may filter their own queries by
pub const MY_QUERIES_FILTER_FIELDS: &[&str] = &[
    fields::USER_EMAIL,
    "category",
    "productName",
    "productBrand",
];

/// Fields only the server writes
const PROTECTED_FIELDS: &[&str] = &[ID_FIELD, fields::USER_EMAIL, fields::RECOMMENDATION_COUNT];

/// Business operations on product queries.
///
/// Borrowed per request from [`crate::state::AppState`]; holds no state of
/// its own beyond the store handle.
pub struct QueryService<'a> {
    store: &'a DocumentStore,
}

fn newest_first() -> FindOptions {
    FindOptions::default().sort(Sort::desc(fields::POSTED_TIMESTAMP))
}

impl<'a> QueryService<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// All queries, newest first
    pub fn list_all(&self) -> Result<Vec<Document>, AppError> {
        Ok(self
            .store
            .find(Collection::Queries, &Filter::new(), &newest_first())?)
    }

    /// The [`RECENT_LIMIT`] newest queries
    pub fn list_recent(&self) -> Result<Vec<Document>, AppError> {
        Ok(self.store.find(
            Collection::Queries,
            &Filter::new(),
            &newest_first().limit(RECENT_LIMIT),
        )?)
    }

    /// The caller's own queries, narrowed by whitelisted equality filters.
    ///
    /// `params` must contain `userEmail`, which has to be the caller.
    pub fn list_mine(
        &self,
        user: &AuthUser,
        params: &HashMap<String, String>,
    ) -> Result<Vec<Document>, AppError> {
        let owner = params
            .get(fields::USER_EMAIL)
            .ok_or_else(|| AppError::BadRequest("'userEmail' is required".to_string()))?;
        ensure_owner(user, owner)?;

        let filter = Filter::from_params(params, MY_QUERIES_FILTER_FIELDS)?;
        Ok(self.store.find(Collection::Queries, &filter, &newest_first())?)
    }

    /// Fetches one query by id.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] when no query has that id.
    pub fn get_by_id(&self, id: &str) -> Result<Document, AppError> {
        self.store
            .find_one(Collection::Queries, id)?
            .ok_or_else(|| AppError::NotFound(format!("query {} not found", id)))
    }

    /// Stores a new query owned by the caller.
    ///
    /// # Arguments
    ///
    /// * `user` - Identity verified by the gate
    /// * `content` - The query document; `userEmail` must equal `user.email`
    ///
    /// # Returns
    ///
    /// The generated id. Any client `_id` is discarded, `recommendationCount`
    /// starts at 0 and `postedTimestamp` is filled in when absent.
    pub fn create(&self, user: &AuthUser, mut content: Document) -> Result<InsertResult, AppError> {
        ensure_owner(user, required_str(&content, fields::USER_EMAIL)?)?;

        content.remove(ID_FIELD);
        content.insert(fields::RECOMMENDATION_COUNT.to_string(), Value::from(0));
        ensure_posted_timestamp(&mut content);

        let result = self.store.insert_one(Collection::Queries, content)?;
        info!(id = %result.inserted_id, owner = %user.email, "query created");
        Ok(result)
    }

    /// Overwrites the fields in `patch` on a query the caller owns.
    ///
    /// # Arguments
    ///
    /// * `id` - Query to update
    /// * `owner_email` - Owner claimed by the request, checked against the caller
    /// * `patch` - Fields to set; `_id`, `userEmail` and `recommendationCount` are refused
    ///
    /// # Errors
    ///
    /// `Forbidden` if either the claimed or the stored owner is not the
    /// caller, `NotFound` for an unknown id, `BadRequest` for a protected field.
    pub fn update(
        &self,
        user: &AuthUser,
        id: &str,
        owner_email: &str,
        patch: Document,
    ) -> Result<UpdateResult, AppError> {
        ensure_owner(user, owner_email)?;

        if let Some(field) = PROTECTED_FIELDS.iter().find(|f| patch.contains_key(**f)) {
            return Err(AppError::BadRequest(format!("'{}' cannot be updated", field)));
        }

        let existing = self.get_by_id(id)?;
        ensure_document_owner(user, &existing, fields::USER_EMAIL)?;

        let result = self
            .store
            .update_one(Collection::Queries, id, &Update::Set(patch))?;
        info!(id = %id, modified = result.modified_count, "query updated");
        Ok(result)
    }

    /// Removes a query the caller owns; its recommendations are left in place
    pub fn delete(&self, user: &AuthUser, id: &str, owner_email: &str) -> Result<DeleteResult, AppError> {
        ensure_owner(user, owner_email)?;

        let existing = self.get_by_id(id)?;
        ensure_document_owner(user, &existing, fields::USER_EMAIL)?;

        let result = self.store.delete_one(Collection::Queries, id)?;
        info!(id = %id, "query deleted");
        Ok(result)
    }
}
