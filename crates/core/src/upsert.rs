//! Insert-if-absent on a store without uniqueness constraints.
//!
//! The store happily keeps any number of nodes with the same value under a
//! predicate. Uniqueness is emulated by querying first and inserting only
//! when nothing matches, inside the same transaction; the store's conflict
//! detection (with an `@upsert` index) is what keeps two concurrent upserts
//! from both succeeding. When it does not, duplicates appear, and the next
//! lookup reports them as [`Error::DuplicateRecords`] instead of silently
//! picking one.

use serde_json::{Map, Value as Json};

use crate::client::{AssignedIds, Mutation, Query, Transaction};
use crate::error::Error;
use crate::value::{Record, Value};

/// Run `query` and return the matching records.
///
/// # Errors
///
/// Returns RPC failures, or [`Error::MalformedResponse`] if the response has
/// no `q` array of objects.
pub fn find<T: Transaction>(txn: &mut T, query: &Query) -> Result<Vec<Map<String, Json>>, Error> {
    let response = txn.query(query)?;
    let malformed = |reason: &str| Error::MalformedResponse {
        reason: format!("{reason} in {response}"),
    };
    let rows = match response.get("q") {
        None => return Ok(Vec::new()),
        Some(Json::Array(rows)) => rows,
        Some(_) => return Err(malformed("`q` is not an array")),
    };
    rows.iter()
        .map(|row| match row {
            Json::Object(fields) => Ok(fields.clone()),
            _ => Err(malformed("row is not an object")),
        })
        .collect()
}

/// Find the single record whose `predicate` equals `value`.
///
/// # Errors
///
/// Returns [`Error::DuplicateRecords`] if more than one record matches.
pub fn find_unique<T: Transaction>(
    txn: &mut T,
    query: &Query,
) -> Result<Option<Map<String, Json>>, Error> {
    let mut rows = find(txn, query)?;
    match rows.len() {
        0 | 1 => Ok(rows.pop()),
        count => Err(Error::DuplicateRecords {
            predicate: query.predicate.clone(),
            value: query.value.clone(),
            count,
        }),
    }
}

/// Insert `record` as a new node.
///
/// # Errors
///
/// Returns the store's failure signal.
pub fn insert<T: Transaction>(txn: &mut T, record: &Record) -> Result<AssignedIds, Error> {
    Ok(txn.mutate(&Mutation::Set(record.clone()))?)
}

/// Insert `record` unless a node with the same value under `predicate`
/// already exists.
///
/// Returns the assigned ids of the new node, or `None` if nothing was
/// written.
///
/// # Errors
///
/// Returns [`Error::MissingUpsertKey`] if `record` has no value under
/// `predicate`, [`Error::DuplicateRecords`] if the store already holds more
/// than one match, and RPC failures.
pub fn upsert<T: Transaction>(
    txn: &mut T,
    predicate: &str,
    record: &Record,
) -> Result<Option<AssignedIds>, Error> {
    let value: &Value = record.get(predicate).ok_or_else(|| Error::MissingUpsertKey {
        predicate: predicate.to_owned(),
    })?;
    let query = Query::eq(predicate, value.clone());
    if let Some(existing) = find_unique(txn, &query)? {
        tracing::trace!(predicate, %value, uid = ?existing.get("uid"), "upsert: already present");
        return Ok(None);
    }
    insert(txn, record).map(Some)
}
