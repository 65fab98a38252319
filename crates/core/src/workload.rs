//! Executing read/write operations.

use crate::classify::Classifier;
use crate::client::{Client, Query, Transaction};
use crate::error::Error;
use crate::op::{MicroOp, MicroOpKind, Outcome, Resolved};
use crate::schema::SchemaConfig;
use crate::txn::{with_transaction, ExecConfig};
use crate::upsert::{find_unique, insert, upsert};
use crate::value::{Record, Value};

fn read<T: Transaction>(
    txn: &mut T,
    schema: &SchemaConfig,
    key: i64,
) -> Result<Option<i64>, Error> {
    let value_pred = schema.value_predicate(key);
    let query = Query::eq(schema.key_predicate(key), Value::Int(key)).field(value_pred.clone());
    let Some(row) = find_unique(txn, &query)? else {
        return Ok(None);
    };
    let Some(raw) = row.get(&value_pred) else {
        return Ok(None);
    };
    let value = Value::from_json(raw)?;
    value
        .as_int()
        .map(Some)
        .ok_or_else(|| Error::UnsupportedValue {
            found: raw.to_string(),
        })
}

fn write<T: Transaction>(
    txn: &mut T,
    schema: &SchemaConfig,
    config: &ExecConfig,
    key: i64,
    value: i64,
) -> Result<(), Error> {
    let key_pred = schema.key_predicate(key);
    let record = Record::from([
        (key_pred.clone(), Value::Int(key)),
        (schema.value_predicate(key), Value::Int(value)),
    ]);
    if config.blind_insert_on_write {
        insert(txn, &record)?;
    } else {
        upsert(txn, &key_pred, &record)?;
    }
    Ok(())
}

/// Run `ops` in order inside `txn`.
///
/// Reads resolve to the stored value, or `None` for a key never written.
/// Writes resolve to the value they wrote. The first failure stops the
/// remaining micro-ops.
///
/// # Errors
///
/// Returns the first failure; see [`upsert`] for the faults a write can
/// raise. A read that matches more than one record returns
/// [`Error::DuplicateRecords`].
pub fn execute<T: Transaction>(
    ops: &[MicroOp],
    schema: &SchemaConfig,
    config: &ExecConfig,
    txn: &mut T,
) -> Result<Vec<Resolved>, Error> {
    ops.iter()
        .map(|op| {
            let resolved = match op.kind {
                MicroOpKind::Read => read(txn, schema, op.key)?,
                MicroOpKind::Write => {
                    let value = op.value.ok_or(Error::MissingWriteValue { key: op.key })?;
                    write(txn, schema, config, op.key, value)?;
                    Some(value)
                }
            };
            tracing::trace!(?op, ?resolved, "micro-op done");
            Ok((*op, resolved))
        })
        .collect()
}

/// Run one operation in its own transaction and classify the result.
///
/// # Errors
///
/// Returns failures the classifier does not recognize.
pub fn invoke<C: Client>(
    client: &C,
    schema: &SchemaConfig,
    config: &ExecConfig,
    classifier: &Classifier,
    ops: &[MicroOp],
) -> Result<Outcome, Error> {
    let result = with_transaction(config, client, |txn| execute(ops, schema, config, txn));
    classifier.outcome(ops, result)
}
