//! An in-process document store.
//!
//! Behaves like the store under test where the harness can observe it:
//!
//! - Reads come from a snapshot at the transaction's start timestamp, plus
//!   the transaction's own writes.
//! - Commits are first-committer-wins over conflict keys. Every written node
//!   is a conflict key, and so is every (predicate, value) pair written to a
//!   predicate declared `@upsert`. Without `@upsert`, two transactions can
//!   insert the same key concurrently and both commit.
//! - Equality queries need the predicate to be declared with `@index`.
//! - With client-side sequencing a transaction reads at the newest
//!   timestamp its client handle has seen, which may be stale.
//!
//! Faults can be queued per call site to exercise the outcome classifier.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::{HashMap, HashSet};
use serde_json::{json, Map, Value as Json};
use txprobe_core::client::{AssignedIds, Client, Mutation, Query, Sequencing, Transaction};
use txprobe_core::error::RpcError;
use txprobe_core::value::Record;

/// Where an injected fault fires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Call {
    NewTransaction,
    Query,
    Mutate,
    Commit,
    ApplySchema,
}

#[derive(Debug, Clone)]
struct Fault {
    call: Call,
    error: RpcError,
    /// For commits: apply the writes before reporting the error.
    applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConflictKey {
    Node(u64),
    Index(String, String),
}

#[derive(Debug, Default)]
struct Inner {
    ts: u64,
    next_uid: u64,
    versions: HashMap<u64, Vec<(u64, Option<Record>)>>,
    last_commit: HashMap<ConflictKey, u64>,
    indexed: HashSet<String>,
    upsert: HashSet<String>,
    faults: VecDeque<Fault>,
    commits: u64,
    aborts: u64,
}

impl Inner {
    fn take_fault(&mut self, call: Call) -> Option<Fault> {
        let at = self.faults.iter().position(|f| f.call == call)?;
        self.faults.remove(at)
    }

    fn fail(&mut self, call: Call) -> Result<(), RpcError> {
        self.take_fault(call).map_or(Ok(()), |f| Err(f.error))
    }

    fn snapshot(&self, ts: u64) -> impl Iterator<Item = (u64, &Record)> {
        self.versions.iter().filter_map(move |(uid, versions)| {
            versions
                .iter()
                .rev()
                .find(|(at, _)| *at <= ts)
                .and_then(|(_, rec)| rec.as_ref())
                .map(|rec| (*uid, rec))
        })
    }

    fn conflict_keys(&self, writes: &[(u64, Option<Record>)]) -> Vec<ConflictKey> {
        let mut keys = Vec::new();
        for (uid, rec) in writes {
            keys.push(ConflictKey::Node(*uid));
            for (pred, value) in rec.iter().flatten() {
                if self.upsert.contains(pred) {
                    keys.push(ConflictKey::Index(pred.clone(), value.to_string()));
                }
            }
        }
        keys
    }

    fn apply(&mut self, writes: Vec<(u64, Option<Record>)>) -> u64 {
        let keys = self.conflict_keys(&writes);
        self.ts += 1;
        let ts = self.ts;
        for (uid, rec) in writes {
            self.versions.entry(uid).or_default().push((ts, rec));
        }
        for key in keys {
            self.last_commit.insert(key, ts);
        }
        self.commits += 1;
        ts
    }
}

/// Counters describing what the store has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub commits: u64,
    pub aborts: u64,
    pub nodes: usize,
}

/// The store itself. Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a client handle, as if connecting to `node`.
    #[must_use]
    pub fn open(&self, node: &str, port: u16) -> MemoryClient {
        tracing::trace!(node, port, "opening in-memory channel");
        MemoryClient {
            inner: Arc::clone(&self.inner),
            closed: Arc::new(AtomicBool::new(false)),
            seen_ts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make the next `call` fail with `error`.
    pub fn inject(&self, call: Call, error: RpcError) {
        lock(&self.inner).faults.push_back(Fault {
            call,
            error,
            applied: false,
        });
    }

    /// Make the next commit apply its writes and then report `error`, as
    /// when a reply is lost after the store committed.
    pub fn inject_after_commit(&self, error: RpcError) {
        lock(&self.inner).faults.push_back(Fault {
            call: Call::Commit,
            error,
            applied: true,
        });
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        let inner = lock(&self.inner);
        Stats {
            commits: inner.commits,
            aborts: inner.aborts,
            nodes: inner.snapshot(inner.ts).count(),
        }
    }
}

/// A handle on a [`MemoryStore`]. Clones share the connection.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    inner: Arc<Mutex<Inner>>,
    closed: Arc<AtomicBool>,
    seen_ts: Arc<AtomicU64>,
}

impl MemoryClient {
    fn check_open(&self) -> Result<(), RpcError> {
        if self.closed.load(Ordering::Acquire) {
            Err(RpcError::status("No connection exists"))
        } else {
            Ok(())
        }
    }
}

fn parse_schema(schema: &str) -> Result<Vec<(String, bool, bool)>, RpcError> {
    schema
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (name, rest) = line
                .split_once(':')
                .filter(|(name, rest)| !name.trim().is_empty() && rest.trim_end().ends_with('.'))
                .ok_or_else(|| RpcError::status(format!("while lexing {line}: invalid schema")))?;
            Ok((
                name.trim().to_owned(),
                rest.contains("@index"),
                rest.contains("@upsert"),
            ))
        })
        .collect()
}

impl Client for MemoryClient {
    type Txn = MemoryTxn;

    fn new_transaction(&self, sequencing: Sequencing) -> Result<MemoryTxn, RpcError> {
        self.check_open()?;
        let mut inner = lock(&self.inner);
        inner.fail(Call::NewTransaction)?;
        let start_ts = match sequencing {
            Sequencing::Server => inner.ts,
            Sequencing::Client => self.seen_ts.load(Ordering::Acquire),
        };
        self.seen_ts.fetch_max(start_ts, Ordering::AcqRel);
        Ok(MemoryTxn {
            inner: Arc::clone(&self.inner),
            seen_ts: Arc::clone(&self.seen_ts),
            start_ts,
            writes: Vec::new(),
        })
    }

    fn apply_schema(&self, schema: &str) -> Result<(), RpcError> {
        self.check_open()?;
        let mut inner = lock(&self.inner);
        inner.fail(Call::ApplySchema)?;
        for (name, indexed, upsert) in parse_schema(schema)? {
            if indexed {
                inner.indexed.insert(name.clone());
            }
            if upsert {
                inner.upsert.insert(name);
            }
        }
        Ok(())
    }

    fn close(self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// A transaction on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTxn {
    inner: Arc<Mutex<Inner>>,
    seen_ts: Arc<AtomicU64>,
    start_ts: u64,
    writes: Vec<(u64, Option<Record>)>,
}

fn row(uid: u64, record: &Record, fields: &[String]) -> Json {
    let mut row = Map::new();
    row.insert("uid".into(), json!(format!("0x{uid:x}")));
    for field in fields {
        if let Some(value) = record.get(field) {
            row.insert(field.clone(), value.to_json());
        }
    }
    Json::Object(row)
}

fn parse_uid(uid: &str) -> Result<u64, RpcError> {
    uid.strip_prefix("0x")
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .ok_or_else(|| RpcError::status(format!("invalid uid {uid}")))
}

impl Transaction for MemoryTxn {
    fn query(&mut self, query: &Query) -> Result<Json, RpcError> {
        let mut inner = lock(&self.inner);
        inner.fail(Call::Query)?;
        if !inner.indexed.contains(&query.predicate) {
            return Err(RpcError::status(format!(
                "Predicate {} is not indexed",
                query.predicate
            )));
        }
        let mut visible: HashMap<u64, &Record> = inner.snapshot(self.start_ts).collect();
        for (uid, rec) in &self.writes {
            match rec {
                Some(rec) => visible.insert(*uid, rec),
                None => visible.remove(uid),
            };
        }
        let mut matches: Vec<_> = visible
            .into_iter()
            .filter(|(_, rec)| rec.get(&query.predicate) == Some(&query.value))
            .collect();
        matches.sort_unstable_by_key(|(uid, _)| *uid);
        let rows: Vec<Json> = matches
            .into_iter()
            .map(|(uid, rec)| row(uid, rec, &query.fields))
            .collect();
        Ok(json!({ "q": rows }))
    }

    fn mutate(&mut self, mutation: &Mutation) -> Result<AssignedIds, RpcError> {
        let mut inner = lock(&self.inner);
        inner.fail(Call::Mutate)?;
        match mutation {
            Mutation::Set(record) => {
                inner.next_uid += 1;
                let uid = inner.next_uid;
                self.writes.push((uid, Some(record.clone())));
                Ok(AssignedIds::from([(
                    "blank-0".to_owned(),
                    format!("0x{uid:x}"),
                )]))
            }
            Mutation::Delete(uid) => {
                self.writes.push((parse_uid(uid)?, None));
                Ok(AssignedIds::new())
            }
        }
    }

    fn commit(self) -> Result<(), RpcError> {
        let mut inner = lock(&self.inner);
        if let Some(fault) = inner.take_fault(Call::Commit) {
            if fault.applied {
                let ts = inner.apply(self.writes);
                self.seen_ts.fetch_max(ts, Ordering::AcqRel);
            }
            return Err(fault.error);
        }
        if self.writes.is_empty() {
            return Ok(());
        }
        let conflicted = inner
            .conflict_keys(&self.writes)
            .iter()
            .any(|key| inner.last_commit.get(key).is_some_and(|&ts| ts > self.start_ts));
        if conflicted {
            inner.aborts += 1;
            tracing::trace!(start_ts = self.start_ts, "commit aborted on conflict");
            return Err(RpcError::Conflict);
        }
        let ts = inner.apply(self.writes);
        self.seen_ts.fetch_max(ts, Ordering::AcqRel);
        Ok(())
    }

    fn discard(self) -> Result<(), RpcError> {
        Ok(())
    }
}
