//! A single-threaded recording store for driving the core in tests.
//!
//! Committed nodes live in a shared vector; a transaction buffers its own
//! inserts and sees them in its queries. Every open, commit and discard is
//! counted so tests can check that each transaction ends exactly once.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::{json, Map, Value as Json};
use txprobe_core::client::{AssignedIds, Client, Mutation, Query, Sequencing, Transaction};
use txprobe_core::error::RpcError;
use txprobe_core::value::Record;

#[derive(Debug, Default)]
pub struct MockState {
    pub nodes: Vec<(String, Record)>,
    pub next_uid: u64,
    pub opened: usize,
    pub commits: usize,
    pub discards: usize,
    pub queries: usize,
    pub mutations: usize,
    pub sequencing: Vec<Sequencing>,
    pub query_failures: VecDeque<RpcError>,
    pub commit_failures: VecDeque<RpcError>,
    pub schema_failures: VecDeque<RpcError>,
    pub schema_calls: usize,
    pub schemas: Vec<String>,
}

impl MockState {
    fn fresh_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("0x{:x}", self.next_uid)
    }

    pub fn terminated(&self) -> usize {
        self.commits + self.discards
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockClient {
    pub state: Rc<RefCell<MockState>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a committed node directly, bypassing transactions.
    pub fn seed(&self, record: Record) -> String {
        let mut state = self.state.borrow_mut();
        let uid = state.fresh_uid();
        state.nodes.push((uid.clone(), record));
        uid
    }

    pub fn fail_next_query(&self, err: RpcError) {
        self.state.borrow_mut().query_failures.push_back(err);
    }

    pub fn fail_next_commit(&self, err: RpcError) {
        self.state.borrow_mut().commit_failures.push_back(err);
    }

    pub fn fail_schema(&self, err: RpcError) {
        self.state.borrow_mut().schema_failures.push_back(err);
    }
}

pub struct MockTxn {
    state: Rc<RefCell<MockState>>,
    pending: Vec<(String, Record)>,
}

fn row(uid: &str, record: &Record, fields: &[String]) -> Json {
    let mut row = Map::new();
    row.insert("uid".into(), json!(uid));
    for field in fields {
        if let Some(v) = record.get(field) {
            row.insert(field.clone(), v.to_json());
        }
    }
    Json::Object(row)
}

impl Transaction for MockTxn {
    fn query(&mut self, query: &Query) -> Result<Json, RpcError> {
        let mut state = self.state.borrow_mut();
        state.queries += 1;
        if let Some(err) = state.query_failures.pop_front() {
            return Err(err);
        }
        let rows: Vec<Json> = state
            .nodes
            .iter()
            .chain(self.pending.iter())
            .filter(|(_, record)| record.get(&query.predicate) == Some(&query.value))
            .map(|(uid, record)| row(uid, record, &query.fields))
            .collect();
        Ok(json!({ "q": rows }))
    }

    fn mutate(&mut self, mutation: &Mutation) -> Result<AssignedIds, RpcError> {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        match mutation {
            Mutation::Set(record) => {
                let uid = state.fresh_uid();
                self.pending.push((uid.clone(), record.clone()));
                Ok(AssignedIds::from([("blank-0".to_owned(), uid)]))
            }
            Mutation::Delete(uid) => {
                self.pending.retain(|(u, _)| u != uid);
                Ok(AssignedIds::new())
            }
        }
    }

    fn commit(self) -> Result<(), RpcError> {
        let mut state = self.state.borrow_mut();
        state.commits += 1;
        if let Some(err) = state.commit_failures.pop_front() {
            return Err(err);
        }
        state.nodes.extend(self.pending);
        Ok(())
    }

    fn discard(self) -> Result<(), RpcError> {
        self.state.borrow_mut().discards += 1;
        Ok(())
    }
}

impl Client for MockClient {
    type Txn = MockTxn;

    fn new_transaction(&self, sequencing: Sequencing) -> Result<MockTxn, RpcError> {
        let mut state = self.state.borrow_mut();
        state.opened += 1;
        state.sequencing.push(sequencing);
        Ok(MockTxn {
            state: Rc::clone(&self.state),
            pending: Vec::new(),
        })
    }

    fn apply_schema(&self, schema: &str) -> Result<(), RpcError> {
        let mut state = self.state.borrow_mut();
        state.schema_calls += 1;
        if let Some(err) = state.schema_failures.pop_front() {
            return Err(err);
        }
        state.schemas.push(schema.to_owned());
        Ok(())
    }

    fn close(self) {}
}
