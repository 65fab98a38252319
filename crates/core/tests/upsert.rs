mod common;

use common::MockClient;
use txprobe_core::client::{Client, Query};
use txprobe_core::error::Error;
use txprobe_core::txn::{with_transaction, ExecConfig};
use txprobe_core::upsert::{find, upsert};
use txprobe_core::value::{Record, Value};

fn person(name: &str, age: i64) -> Record {
    Record::from([
        ("name".to_owned(), Value::from(name)),
        ("age".to_owned(), Value::Int(age)),
    ])
}

#[test]
fn upsert_twice_inserts_once() {
    let client = MockClient::new();
    let record = person("ada", 36);

    let first = with_transaction(&ExecConfig::default(), &client, |txn| {
        upsert(txn, "name", &record)
    })
    .unwrap();
    let second = with_transaction(&ExecConfig::default(), &client, |txn| {
        upsert(txn, "name", &record)
    })
    .unwrap();

    assert_eq!(first.unwrap().len(), 1);
    assert_eq!(second, None);
    assert_eq!(client.state.borrow().nodes.len(), 1);
}

#[test]
fn upsert_sees_own_insert() {
    let client = MockClient::new();
    let record = person("grace", 85);
    let results = with_transaction(&ExecConfig::default(), &client, |txn| {
        Ok((upsert(txn, "name", &record)?, upsert(txn, "name", &record)?))
    })
    .unwrap();
    assert!(results.0.is_some());
    assert!(results.1.is_none());
}

#[test]
fn upsert_requires_key_value() {
    let client = MockClient::new();
    let err = with_transaction(&ExecConfig::default(), &client, |txn| {
        upsert(txn, "email", &person("ada", 36))
    })
    .unwrap_err();
    assert!(matches!(err, Error::MissingUpsertKey { ref predicate } if predicate == "email"));
    assert_eq!(client.state.borrow().queries, 0);
}

#[test]
fn upsert_reports_duplicates() {
    let client = MockClient::new();
    client.seed(person("ada", 36));
    client.seed(person("ada", 37));
    let err = with_transaction(&ExecConfig::default(), &client, |txn| {
        upsert(txn, "name", &person("ada", 38))
    })
    .unwrap_err();
    match err {
        Error::DuplicateRecords {
            predicate,
            value,
            count,
        } => {
            assert_eq!(predicate, "name");
            assert_eq!(value, Value::from("ada"));
            assert_eq!(count, 2);
        }
        other => panic!("expected duplicate records, got {other:?}"),
    }
    assert_eq!(client.state.borrow().mutations, 0);
}

#[test]
fn upsert_distinguishes_values() {
    let client = MockClient::new();
    for name in ["a", "b", "c"] {
        with_transaction(&ExecConfig::default(), &client, |txn| {
            upsert(txn, "name", &person(name, 1))
        })
        .unwrap();
    }
    let mut txn = client.new_transaction(Default::default()).unwrap();
    let rows = find(&mut txn, &Query::eq("age", Value::Int(1)).field("name")).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.contains_key("uid")));
}
