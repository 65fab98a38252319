use derive_more::{Display, Error, From};

use crate::value::Value;

/// A failure signal reported by the store's RPC layer.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum RpcError {
    /// The store aborted the transaction because of a conflicting commit.
    #[display("transaction has been aborted due to a conflict")]
    Conflict,
    /// The per-call deadline expired before a reply arrived.
    #[display("DEADLINE_EXCEEDED: deadline exceeded")]
    DeadlineExceeded,
    /// Any other failure, carrying the status text from the server.
    #[display("{_0}")]
    Status(#[error(not(source))] String),
}

impl RpcError {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(message.into())
    }
}

/// Errors raised by the harness core.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The store rejected a call.
    #[from]
    #[display("rpc failed: {_0}")]
    Rpc(RpcError),
    /// An upsert record has no value under its uniqueness predicate.
    #[display("record has no value for upsert predicate {predicate}")]
    MissingUpsertKey { predicate: String },
    /// More than one record matched a predicate that should be unique.
    #[display("{count} records have {predicate} = {value}")]
    DuplicateRecords {
        predicate: String,
        value: Value,
        count: usize,
    },
    /// A write micro-op without a value.
    #[display("write to key {key} carries no value")]
    MissingWriteValue { key: i64 },
    /// A JSON value that has no [`Value`] counterpart.
    #[display("unsupported value {found}")]
    UnsupportedValue { found: String },
    /// A query result without the expected shape.
    #[display("malformed query response: {reason}")]
    MalformedResponse { reason: String },
    /// Shard counts must be positive.
    #[display("invalid shard count {count} for {prefix}")]
    InvalidShardCount { prefix: &'static str, count: u64 },
}

impl Error {
    /// The RPC signal behind this error, if there is one.
    #[must_use]
    pub const fn as_rpc(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(e) => Some(e),
            _ => None,
        }
    }
}
