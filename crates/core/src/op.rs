use std::fmt::{Debug, Formatter, Result as FmtResult};

use derive_more::Display;

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MicroOpKind {
    Read,
    Write,
}

/// A single read or write within one operation.
///
/// Reads are invoked with no value; writes always carry the value to write.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct MicroOp {
    pub kind: MicroOpKind,
    pub key: i64,
    pub value: Option<i64>,
}

impl MicroOp {
    #[must_use]
    pub const fn read(key: i64) -> Self {
        Self {
            kind: MicroOpKind::Read,
            key,
            value: None,
        }
    }

    #[must_use]
    pub const fn write(key: i64, value: i64) -> Self {
        Self {
            kind: MicroOpKind::Write,
            key,
            value: Some(value),
        }
    }

    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(self.kind, MicroOpKind::Read)
    }
}

impl Debug for MicroOp {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let arrow = if self.is_read() { "=>" } else { "<=" };
        write!(f, "{}{arrow}", self.key)?;
        match self.value {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "?"),
        }
    }
}

/// A micro-op paired with the value it resolved to.
pub type Resolved = (MicroOp, Option<i64>);

/// How certain we are that an operation took effect.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum Status {
    /// Definitely applied.
    #[display("ok")]
    Ok,
    /// Definitely not applied.
    #[display("fail")]
    Fail,
    /// Indeterminate: may or may not have been applied.
    #[display("info")]
    Info,
}

/// Canonical cause of a failed or indeterminate operation.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    #[display("timeout")]
    Timeout,
    #[display("conflict")]
    Conflict,
    #[display("old-timestamp")]
    OldTimestamp,
    #[display("predicate-moving")]
    PredicateMoving,
    #[display("tablet-not-served")]
    TabletNotServed,
    #[display("wrong-server")]
    WrongServer,
    #[display("not-ready")]
    NotReady,
    #[display("unavailable")]
    Unavailable,
    #[display("no-connection")]
    NoConnection,
    #[display("unavailable-all-subconns-down")]
    UnavailableAllSubconnsDown,
    #[display("unavailable-transport-closing")]
    UnavailableTransportClosing,
    #[display("unhealthy-connection")]
    UnhealthyConnection,
    #[display("only-leader-can-commit")]
    OnlyLeaderCanCommit,
    #[display("server-doesnt-serve-group")]
    ServerDoesntServeGroup,
}

/// The completed form of an operation, as handed to a checker.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,
    pub error: Option<ErrorKind>,
    pub value: Vec<Resolved>,
}

impl Outcome {
    #[must_use]
    pub const fn ok(value: Vec<Resolved>) -> Self {
        Self {
            status: Status::Ok,
            error: None,
            value,
        }
    }

    /// A failed or indeterminate outcome for `ops`.
    ///
    /// Reads resolve to nothing since we cannot know what they saw; writes
    /// keep the value they attempted.
    #[must_use]
    pub fn unresolved(status: Status, error: ErrorKind, ops: &[MicroOp]) -> Self {
        Self {
            status,
            error: Some(error),
            value: ops
                .iter()
                .map(|op| (*op, if op.is_read() { None } else { op.value }))
                .collect(),
        }
    }
}
