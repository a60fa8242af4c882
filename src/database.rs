//! Document store built on the embedded redb database
//!
//! Each collection is one redb table. Documents are JSON objects stored as
//! strings and keyed by a store-assigned id, which is also written into the
//! document under [`ID_FIELD`].

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, StoreError};

/// A schema-flexible record
pub type Document = Map<String, Value>;

/// Field holding the document identity
pub const ID_FIELD: &str = "_id";

/// Length of generated document ids
const ID_LEN: usize = 24;

/// Query documents
///
/// Key: document id
/// Value: JSON-serialized document
const TABLE_QUERIES: TableDefinition<&str, &str> = TableDefinition::new("queries_v1");

/// Recommendation documents, same layout as [`TABLE_QUERIES`]
const TABLE_RECOMMENDATIONS: TableDefinition<&str, &str> =
    TableDefinition::new("recommendations_v1");

/// Named collections known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Queries,
    Recommendations,
}

impl Collection {
    fn table(self) -> TableDefinition<'static, &'static str, &'static str> {
        match self {
            Collection::Queries => TABLE_QUERIES,
            Collection::Recommendations => TABLE_RECOMMENDATIONS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Collection::Queries => "queries",
            Collection::Recommendations => "recommendations",
        }
    }
}

/// Equality predicates over document fields.
///
/// A document matches when every `field = value` clause holds and, if any
/// alternatives are given, at least one alternative matches too.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
    alternatives: Vec<Filter>,
}

impl Filter {
    /// A filter matching every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `field = value` clause
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Requires at least one of `alternatives` to match
    pub fn or(mut self, alternatives: Vec<Filter>) -> Self {
        self.alternatives.extend(alternatives);
        self
    }

    /// Builds a filter from request parameters.
    ///
    /// Only keys listed in `allowed` become clauses; any other key is rejected
    /// so clients cannot filter on fields they were never meant to reach.
    pub fn from_params(
        params: &HashMap<String, String>,
        allowed: &[&str],
    ) -> Result<Self, AppError> {
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();

        let mut filter = Filter::new();
        for key in keys {
            if !allowed.contains(&key.as_str()) {
                return Err(AppError::BadRequest(format!(
                    "unsupported filter field '{}'",
                    key
                )));
            }
            filter = filter.eq(key.as_str(), params[key].as_str());
        }
        Ok(filter)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let clauses_hold = self
            .clauses
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value));

        clauses_hold
            && (self.alternatives.is_empty() || self.alternatives.iter().any(|f| f.matches(doc)))
    }
}

/// Ordering on a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    field: String,
    descending: bool,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Documents lacking the field always sort after those that have it
    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y);
                if self.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Modification applied by [`DocumentStore::update_one`]
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Overwrites the given fields, leaving the others untouched
    Set(Document),

    /// Adds `by` to a numeric field. Missing fields count as 0 and the result
    /// never drops below 0.
    Inc { field: String, by: i64 },
}

impl Update {
    pub fn inc(field: impl Into<String>, by: i64) -> Self {
        Update::Inc {
            field: field.into(),
            by,
        }
    }

    /// Applies the update in place and reports whether anything changed
    fn apply(&self, doc: &mut Document) -> bool {
        match self {
            Update::Set(fields) => {
                let mut modified = false;
                for (key, value) in fields {
                    if key == ID_FIELD || doc.get(key) == Some(value) {
                        continue;
                    }
                    doc.insert(key.clone(), value.clone());
                    modified = true;
                }
                modified
            }
            Update::Inc { field, by } => {
                let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
                let next = Value::from(current.saturating_add(*by).max(0));
                if doc.get(field) == Some(&next) {
                    return false;
                }
                doc.insert(field.clone(), next);
                true
            }
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Collection-oriented access to the embedded database.
///
/// Every call runs in its own redb transaction, so single-document operations
/// are atomic and writers are serialized. Nothing spans two calls.
pub struct DocumentStore {
    db: Database,
}

/// Creates or opens the database file and makes sure every collection exists
///
/// # Example
///
/// ```no_run
/// # use recommender::database::init_db;
/// let store = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<DocumentStore, StoreError> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_QUERIES)?;
        write_txn.open_table(TABLE_RECOMMENDATIONS)?;
    }
    write_txn.commit()?;

    Ok(DocumentStore { db })
}

impl DocumentStore {
    /// Returns the documents matching `filter`, sorted and truncated per `options`
    pub fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(collection.table())?;

        let mut docs = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            let doc = decode(collection, key.value(), value.value())?;
            if filter.matches(&doc) {
                docs.push(doc);
            }
        }

        if let Some(sort) = &options.sort {
            docs.sort_by(|a, b| sort.compare(a, b));
        }
        if let Some(limit) = options.limit {
            docs.truncate(limit);
        }

        Ok(docs)
    }

    pub fn find_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(collection.table())?;

        let doc = match table.get(id)? {
            Some(value) => Some(decode(collection, id, value.value())?),
            None => None,
        };
        Ok(doc)
    }

    pub fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(collection.table())?;

        let mut count = 0;
        for entry in table.iter()? {
            let (key, value) = entry?;
            if filter.matches(&decode(collection, key.value(), value.value())?) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Stores `doc` under a freshly generated id, ignoring any id it carries
    pub fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> Result<InsertResult, StoreError> {
        let write_txn = self.db.begin_write()?;
        let id = {
            let mut table = write_txn.open_table(collection.table())?;

            let id = loop {
                let candidate = generate_id();
                if table.get(candidate.as_str())?.is_none() {
                    break candidate;
                }
            };

            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            let raw = serde_json::to_string(&doc)?;
            table.insert(id.as_str(), raw.as_str())?;
            id
        };
        write_txn.commit()?;

        Ok(InsertResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    /// Applies `update` to the document with the given id.
    ///
    /// The read and the write happen inside one write transaction, so
    /// concurrent [`Update::Inc`] calls on the same document never lose a delta.
    pub fn update_one(
        &self,
        collection: Collection,
        id: &str,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(collection.table())?;
            let current = table.get(id)?.map(|guard| guard.value().to_string());

            match current {
                None => UpdateResult {
                    acknowledged: true,
                    matched_count: 0,
                    modified_count: 0,
                },
                Some(raw) => {
                    let mut doc = decode(collection, id, &raw)?;
                    let modified = update.apply(&mut doc);
                    if modified {
                        let raw = serde_json::to_string(&doc)?;
                        table.insert(id, raw.as_str())?;
                    }
                    UpdateResult {
                        acknowledged: true,
                        matched_count: 1,
                        modified_count: u64::from(modified),
                    }
                }
            }
        };
        write_txn.commit()?;

        Ok(result)
    }

    pub fn delete_one(&self, collection: Collection, id: &str) -> Result<DeleteResult, StoreError> {
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(collection.table())?;
            // bound first so the guard drops before the table
            let removed = table.remove(id)?.is_some();
            removed
        };
        write_txn.commit()?;

        Ok(DeleteResult {
            acknowledged: true,
            deleted_count: u64::from(deleted),
        })
    }
}

fn decode(collection: Collection, id: &str, raw: &str) -> Result<Document, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        collection: collection.name(),
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}
