//! Operations on the recommendations collection
//!
//! Creating or deleting a recommendation also moves the parent query's
//! `recommendationCount`. The document write and the counter write are two
//! separate store transactions: if the counter write fails the first write
//! stays, the failure is logged, and [`RecommendationService::reconcile_counts`]
//! repairs the drift later.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::database::{
    Collection, DeleteResult, DocumentStore, Filter, FindOptions, InsertResult, Sort, Update,
    ID_FIELD,
};
use crate::error::AppError;
use crate::middleware::{ensure_document_owner, ensure_owner, AuthUser};
use crate::model::{ensure_posted_timestamp, fields, required_str, Document};

/// Fields recommendations may be listed by
pub const COMMENT_FILTER_FIELDS: &[&str] = &[
    fields::QUERY_ID,
    fields::RECOMMENDER_EMAIL,
    fields::USER_EMAIL,
];

/// Business operations on recommendations and the counters they drive
pub struct RecommendationService<'a> {
    store: &'a DocumentStore,
}

fn newest_first() -> FindOptions {
    FindOptions::default().sort(Sort::desc(fields::POSTED_TIMESTAMP))
}

impl<'a> RecommendationService<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Recommendations matching whitelisted equality filters, newest first
    pub fn list_for_query(&self, params: &HashMap<String, String>) -> Result<Vec<Document>, AppError> {
        let filter = Filter::from_params(params, COMMENT_FILTER_FIELDS)?;
        Ok(self
            .store
            .find(Collection::Recommendations, &filter, &newest_first())?)
    }

    /// Recommendations the caller wrote or received on their own queries
    pub fn list_for_user(&self, user: &AuthUser, email: &str) -> Result<Vec<Document>, AppError> {
        ensure_owner(user, email)?;

        let filter = Filter::new().or(vec![
            Filter::new().eq(fields::RECOMMENDER_EMAIL, email),
            Filter::new().eq(fields::USER_EMAIL, email),
        ]);
        Ok(self
            .store
            .find(Collection::Recommendations, &filter, &newest_first())?)
    }

    /// Stores a recommendation authored by the caller, then bumps the parent counter.
    ///
    /// # Arguments
    ///
    /// * `user` - Identity verified by the gate
    /// * `content` - Must carry `recommenderEmail` (the caller) and `queryId`
    ///
    /// # Returns
    ///
    /// The generated id. `userEmail` is copied from the parent query rather
    /// than taken from the client.
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent query does not exist; nothing is written.
    pub fn create(&self, user: &AuthUser, mut content: Document) -> Result<InsertResult, AppError> {
        ensure_owner(user, required_str(&content, fields::RECOMMENDER_EMAIL)?)?;
        let query_id = required_str(&content, fields::QUERY_ID)?.to_string();

        let query = self
            .store
            .find_one(Collection::Queries, &query_id)?
            .ok_or_else(|| AppError::NotFound(format!("query {} not found", query_id)))?;

        content.remove(ID_FIELD);
        match query.get(fields::USER_EMAIL) {
            Some(owner) => content.insert(fields::USER_EMAIL.to_string(), owner.clone()),
            None => content.remove(fields::USER_EMAIL),
        };
        ensure_posted_timestamp(&mut content);

        let result = self.store.insert_one(Collection::Recommendations, content)?;
        info!(id = %result.inserted_id, query_id = %query_id, "recommendation created");

        self.adjust_count(&query_id, 1, &result.inserted_id)?;
        Ok(result)
    }

    /// Removes a recommendation the caller wrote, then lowers the parent counter.
    ///
    /// When `query_id` is given it must name the recommendation's query.
    pub fn delete(
        &self,
        user: &AuthUser,
        id: &str,
        query_id: Option<&str>,
        email: &str,
    ) -> Result<DeleteResult, AppError> {
        ensure_owner(user, email)?;

        let existing = self
            .store
            .find_one(Collection::Recommendations, id)?
            .ok_or_else(|| AppError::NotFound(format!("recommendation {} not found", id)))?;
        ensure_document_owner(user, &existing, fields::RECOMMENDER_EMAIL)?;

        let stored_query_id = existing
            .get(fields::QUERY_ID)
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(claimed) = query_id {
            if stored_query_id.as_deref() != Some(claimed) {
                return Err(AppError::BadRequest(format!(
                    "recommendation {} does not belong to query {}",
                    id, claimed
                )));
            }
        }

        let result = self.store.delete_one(Collection::Recommendations, id)?;
        info!(id = %id, "recommendation deleted");

        match stored_query_id {
            Some(parent) if result.deleted_count > 0 => self.adjust_count(&parent, -1, id)?,
            Some(_) => {}
            None => warn!(id = %id, "deleted recommendation had no query reference"),
        }
        Ok(result)
    }

    /// Rewrites every drifted `recommendationCount` from the actual number of
    /// recommendations.
    ///
    /// # Returns
    ///
    /// How many queries were corrected. Run once at startup.
    pub fn reconcile_counts(&self) -> Result<usize, AppError> {
        let recommendations = self.store.find(
            Collection::Recommendations,
            &Filter::new(),
            &FindOptions::default(),
        )?;

        let mut actual: HashMap<&str, i64> = HashMap::new();
        for rec in &recommendations {
            if let Some(query_id) = rec.get(fields::QUERY_ID).and_then(Value::as_str) {
                *actual.entry(query_id).or_default() += 1;
            }
        }

        let queries = self
            .store
            .find(Collection::Queries, &Filter::new(), &FindOptions::default())?;

        let mut corrected = 0;
        for query in &queries {
            let Some(id) = query.get(ID_FIELD).and_then(Value::as_str) else {
                continue;
            };
            let expected = actual.get(id).copied().unwrap_or(0);
            let stored = query.get(fields::RECOMMENDATION_COUNT).and_then(Value::as_i64);
            if stored == Some(expected) {
                continue;
            }

            let mut patch = Document::new();
            patch.insert(fields::RECOMMENDATION_COUNT.to_string(), Value::from(expected));
            self.store
                .update_one(Collection::Queries, id, &Update::Set(patch))?;
            warn!(id = %id, ?stored, expected, "recommendation count corrected");
            corrected += 1;
        }

        Ok(corrected)
    }

    fn adjust_count(&self, query_id: &str, by: i64, recommendation_id: &str) -> Result<(), AppError> {
        match self.store.update_one(
            Collection::Queries,
            query_id,
            &Update::inc(fields::RECOMMENDATION_COUNT, by),
        ) {
            Ok(result) => {
                if result.matched_count == 0 {
                    warn!(query_id = %query_id, "query vanished before its counter could be adjusted");
                }
                Ok(())
            }
            Err(e) => {
                error!(
                    query_id = %query_id,
                    recommendation_id = %recommendation_id,
                    by,
                    error = %e,
                    "recommendation written but counter update failed"
                );
                Err(e.into())
            }
        }
    }
}
