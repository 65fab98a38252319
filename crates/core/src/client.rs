//! The RPC surface the harness drives.
//!
//! Drivers implement [`Client`] and [`Transaction`] on top of whatever
//! channel and wire encoding the store speaks. The core only ever sees
//! these two traits.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::RpcError;
use crate::value::{Record, Value};

/// Blank-node name to the uid the store assigned to it.
pub type AssignedIds = BTreeMap<String, String>;

/// Query variables, in their string encoding.
pub type Vars = BTreeMap<String, String>;

/// Who assigns a transaction's read timestamp.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Sequencing {
    #[default]
    Server,
    Client,
}

/// Fetch the records whose `predicate` equals `value`, with `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub predicate: String,
    pub value: Value,
    pub fields: Vec<String>,
}

impl Query {
    pub const VAR: &'static str = "$a";

    #[must_use]
    pub fn eq(predicate: impl Into<String>, value: Value) -> Self {
        Self {
            predicate: predicate.into(),
            value,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    #[must_use]
    pub fn vars(&self) -> Vars {
        BTreeMap::from([(Self::VAR.to_owned(), self.value.to_string())])
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "query all({}: {}) {{ q(func: eq({}, {})) {{ uid",
            Self::VAR,
            self.value.type_name(),
            self.predicate,
            Self::VAR
        )?;
        for field in &self.fields {
            write!(f, " {field}")?;
        }
        write!(f, " }} }}")
    }
}

/// A mutation payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert a new node carrying the record.
    Set(Record),
    /// Delete the node with this uid.
    Delete(String),
}

/// An open transaction.
///
/// `commit` and `discard` consume the handle, so each transaction ends
/// exactly once.
pub trait Transaction {
    /// Run a query and return the parsed JSON response, whose `q` member
    /// lists the matching records.
    ///
    /// # Errors
    ///
    /// Returns the store's failure signal.
    fn query(&mut self, query: &Query) -> Result<serde_json::Value, RpcError>;

    /// # Errors
    ///
    /// Returns the store's failure signal.
    fn mutate(&mut self, mutation: &Mutation) -> Result<AssignedIds, RpcError>;

    /// # Errors
    ///
    /// Returns the store's failure signal; the transaction's fate may be
    /// unknown afterwards.
    fn commit(self) -> Result<(), RpcError>;

    /// # Errors
    ///
    /// Returns the store's failure signal.
    fn discard(self) -> Result<(), RpcError>;
}

/// A handle on the store that opens transactions.
pub trait Client {
    type Txn: Transaction;

    /// # Errors
    ///
    /// Returns the store's failure signal.
    fn new_transaction(&self, sequencing: Sequencing) -> Result<Self::Txn, RpcError>;

    /// # Errors
    ///
    /// Returns the store's failure signal.
    fn apply_schema(&self, schema: &str) -> Result<(), RpcError>;

    /// Release the underlying channels. Best effort.
    fn close(self);
}
