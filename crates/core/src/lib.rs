//! Transactional workload harness for distributed document stores.
//!
//! `txprobe_core` drives a database under test with randomized read/write
//! operations and reports, for every operation, whether it definitely took
//! effect, definitely did not, or may have. Those three outcomes are what a
//! consistency checker needs to reason about a history:
//!
//! 1. **Ok** -- the transaction committed.
//! 2. **Fail** -- the store guarantees nothing was applied (for example a
//!    conflict abort).
//! 3. **Info** -- unknown; the request may have been applied before the
//!    failure was observed (for example a deadline).
//!
//! The store is schema-free and has no uniqueness constraint, so key-value
//! semantics are layered on top: each logical key lives in a node found by
//! equality on a sharded key predicate, and writes are insert-if-absent
//! upserts.
//!
//! # Entry point
//!
//! [`invoke()`] runs one operation (a list of [`MicroOp`]s) in its own
//! transaction and returns an [`Outcome`]:
//!
//! ```rust,ignore
//! use txprobe_core::{invoke, Classifier, ExecConfig, MicroOp, SchemaConfig};
//!
//! let schema = SchemaConfig::new(4, 4, true)?;
//! let ops = [MicroOp::write(1, 5), MicroOp::read(1)];
//! let outcome = invoke(&client, &schema, &ExecConfig::default(), &Classifier::new(), &ops)?;
//! ```
//!
//! Failures that are not in the classification table are returned as
//! errors rather than folded into an outcome.
//!
//! # Crate features
//!
//! - **`serde`** -- enables `Serialize`/`Deserialize` derives on the
//!   operation, outcome, history and config types.

pub mod classify;
pub mod client;
pub mod error;
pub mod history;
pub mod op;
pub mod schema;
pub mod shard;
pub mod txn;
pub mod upsert;
pub mod value;
pub mod workload;

pub use classify::{classify, Classifier};
pub use client::{Client, Sequencing, Transaction};
pub use error::{Error, RpcError};
pub use op::{ErrorKind, MicroOp, Outcome, Status};
pub use schema::SchemaConfig;
pub use txn::{with_transaction, ExecConfig};
pub use workload::{execute, invoke};
