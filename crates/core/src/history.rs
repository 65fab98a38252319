//! The outcome stream handed to an external checker.
//!
//! Every operation appears twice: once when it is invoked and once when it
//! completes with an [`Outcome`]. `index` is a run-wide sequence number
//! taken when the event happens, so ordering by it gives the real-time
//! order across processes. `time_ms` (milliseconds since the run started)
//! is informational and often ties.

use crate::op::{ErrorKind, MicroOp, Outcome, Resolved, Status};

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventType {
    Invoke,
    Ok,
    Fail,
    Info,
}

impl From<Status> for EventType {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => Self::Ok,
            Status::Fail => Self::Fail,
            Status::Info => Self::Info,
        }
    }
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub process: u64,
    pub index: u64,
    pub time_ms: u64,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: EventType,
    pub value: Vec<Resolved>,
    pub error: Option<ErrorKind>,
}

impl Event {
    #[must_use]
    pub fn invoke(process: u64, index: u64, time_ms: u64, ops: &[MicroOp]) -> Self {
        Self {
            process,
            index,
            time_ms,
            kind: EventType::Invoke,
            value: ops.iter().map(|op| (*op, op.value)).collect(),
            error: None,
        }
    }

    #[must_use]
    pub fn complete(process: u64, index: u64, time_ms: u64, outcome: Outcome) -> Self {
        Self {
            process,
            index,
            time_ms,
            kind: outcome.status.into(),
            value: outcome.value,
            error: outcome.error,
        }
    }
}

/// Counts of completions by status.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub ok: u64,
    pub fail: u64,
    pub info: u64,
}

impl Summary {
    #[must_use]
    pub fn of(events: &[Event]) -> Self {
        events.iter().fold(Self::default(), |mut acc, e| {
            match e.kind {
                EventType::Invoke => {}
                EventType::Ok => acc.ok += 1,
                EventType::Fail => acc.fail += 1,
                EventType::Info => acc.info += 1,
            }
            acc
        })
    }
}
