//! Failure classification.
//!
//! A distributed store under test fails in many ways, and a checker needs to
//! know for each failure whether the operation could have taken effect.
//! [`classify`] looks the failure signal up in an ordered table and yields a
//! [`Status`] and an [`ErrorKind`]:
//!
//! - [`Status::Fail`] when the store guarantees nothing was applied (conflict
//!   aborts, requests refused before execution, ...).
//! - [`Status::Info`] when the outcome is unknown (deadlines, connections
//!   torn down mid-flight, ...).
//!
//! Signals missing from the table are not classified. They propagate to the
//! caller so that new failure modes show up instead of being absorbed.

use std::thread;
use std::time::Duration;

use rand::RngExt;

use crate::error::{Error, RpcError};
use crate::op::{ErrorKind, MicroOp, Outcome, Resolved, Status};

enum Matcher {
    /// The store's native conflict signal.
    Conflict,
    /// The RPC layer's native deadline signal.
    Deadline,
    /// Status text containing the substring.
    Contains(&'static str),
    /// Status text containing every substring, in order.
    ContainsInOrder(&'static [&'static str]),
}

impl Matcher {
    fn matches(&self, err: &RpcError) -> bool {
        match (self, err) {
            (Self::Conflict, RpcError::Conflict) | (Self::Deadline, RpcError::DeadlineExceeded) => {
                true
            }
            (Self::Contains(needle), RpcError::Status(msg)) => msg.contains(needle),
            (Self::ContainsInOrder(needles), RpcError::Status(msg)) => {
                let mut rest = msg.as_str();
                needles.iter().all(|needle| {
                    rest.find(needle).is_some_and(|at| {
                        rest = &rest[at + needle.len()..];
                        true
                    })
                })
            }
            _ => false,
        }
    }
}

/// Evaluated top to bottom; the first match wins.
const TABLE: &[(Matcher, Status, ErrorKind)] = &[
    (Matcher::Deadline, Status::Info, ErrorKind::Timeout),
    (
        Matcher::Contains("DEADLINE_EXCEEDED"),
        Status::Info,
        ErrorKind::Timeout,
    ),
    (
        Matcher::Contains("context deadline exceeded"),
        Status::Info,
        ErrorKind::Timeout,
    ),
    (
        Matcher::Contains("Conflicts with pending transaction"),
        Status::Fail,
        ErrorKind::Conflict,
    ),
    (Matcher::Conflict, Status::Fail, ErrorKind::Conflict),
    (
        Matcher::ContainsInOrder(&["readTs", "less than minTs"]),
        Status::Fail,
        ErrorKind::OldTimestamp,
    ),
    (
        Matcher::Contains("Predicate is being moved"),
        Status::Fail,
        ErrorKind::PredicateMoving,
    ),
    (
        Matcher::Contains("Tablet isn't being served"),
        Status::Fail,
        ErrorKind::TabletNotServed,
    ),
    (
        Matcher::Contains("Request sent to wrong server"),
        Status::Fail,
        ErrorKind::WrongServer,
    ),
    (
        Matcher::Contains("not ready to accept requests"),
        Status::Fail,
        ErrorKind::NotReady,
    ),
    // Connection failures arrive as `UNAVAILABLE: ...` status text, so they
    // must be tried before the bare code name.
    (
        Matcher::Contains("No connection exists"),
        Status::Fail,
        ErrorKind::NoConnection,
    ),
    // Kept indeterminate: a request may have reached the server before every
    // sub-connection dropped.
    (
        Matcher::Contains("all SubConns are in TransientFailure"),
        Status::Info,
        ErrorKind::UnavailableAllSubconnsDown,
    ),
    (
        Matcher::Contains("transport is closing"),
        Status::Info,
        ErrorKind::UnavailableTransportClosing,
    ),
    (
        Matcher::Contains("Unhealthy connection"),
        Status::Info,
        ErrorKind::UnhealthyConnection,
    ),
    (
        Matcher::Contains("UNAVAILABLE"),
        Status::Fail,
        ErrorKind::Unavailable,
    ),
    (
        Matcher::Contains("Only leader can decide"),
        Status::Fail,
        ErrorKind::OnlyLeaderCanCommit,
    ),
    (
        Matcher::Contains("doesn't serve group id"),
        Status::Fail,
        ErrorKind::ServerDoesntServeGroup,
    ),
];

/// Look up a failure signal. `None` means unrecognized.
#[must_use]
pub fn classify(err: &RpcError) -> Option<(Status, ErrorKind)> {
    TABLE
        .iter()
        .find(|(matcher, ..)| matcher.matches(err))
        .map(|&(_, status, kind)| (status, kind))
}

/// Whether `err` is a deadline expiry, native or reported in status text.
#[must_use]
pub fn is_deadline(err: &RpcError) -> bool {
    classify(err).is_some_and(|(_, kind)| kind == ErrorKind::Timeout)
}

/// Kinds that mean the node is overloaded or down; callers back off after
/// seeing one.
#[must_use]
pub const fn needs_backoff(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Unavailable | ErrorKind::UnhealthyConnection)
}

/// Turns operation results into [`Outcome`]s, backing off after overload
/// signals.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    max_backoff: Duration,
    sleep: fn(Duration),
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            max_backoff: Duration::from_millis(2000),
            sleep: thread::sleep,
        }
    }
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound (exclusive) of the random backoff.
    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Replace how the calling thread is blocked during backoff.
    #[must_use]
    pub const fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Rewrite the result of running `ops` into an outcome.
    ///
    /// # Errors
    ///
    /// Returns the error unchanged when it is not a recognized RPC signal.
    pub fn outcome(
        &self,
        ops: &[MicroOp],
        result: Result<Vec<Resolved>, Error>,
    ) -> Result<Outcome, Error> {
        let err = match result {
            Ok(value) => return Ok(Outcome::ok(value)),
            Err(err) => err,
        };
        let Some((status, kind)) = err.as_rpc().and_then(classify) else {
            tracing::debug!(%err, "unrecognized failure");
            return Err(err);
        };
        tracing::debug!(%status, %kind, %err, "classified failure");
        if needs_backoff(kind) {
            self.backoff();
        }
        Ok(Outcome::unresolved(status, kind, ops))
    }

    fn backoff(&self) {
        let max_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return;
        }
        let delay = Duration::from_millis(rand::rng().random_range(0..max_ms));
        tracing::trace!(?delay, "backing off");
        (self.sleep)(delay);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    thread_local! {
        static SLEPT: RefCell<Vec<Duration>> = const { RefCell::new(Vec::new()) };
    }

    fn record_sleep(d: Duration) {
        SLEPT.with(|s| s.borrow_mut().push(d));
    }

    fn take_sleeps() -> Vec<Duration> {
        SLEPT.with(|s| s.borrow_mut().drain(..).collect())
    }

    fn status(msg: &str) -> RpcError {
        RpcError::status(msg)
    }

    #[test]
    fn test_table() {
        let cases = [
            (RpcError::DeadlineExceeded, Status::Info, ErrorKind::Timeout),
            (
                status("DEADLINE_EXCEEDED: deadline exceeded after 9.9s"),
                Status::Info,
                ErrorKind::Timeout,
            ),
            (
                status("rpc error: context deadline exceeded"),
                Status::Info,
                ErrorKind::Timeout,
            ),
            (
                status("Conflicts with pending transaction. Please abort."),
                Status::Fail,
                ErrorKind::Conflict,
            ),
            (RpcError::Conflict, Status::Fail, ErrorKind::Conflict),
            (
                status("readTs: 12 less than minTs: 40 for key: \"x\""),
                Status::Fail,
                ErrorKind::OldTimestamp,
            ),
            (
                status("Predicate is being moved, please retry later"),
                Status::Fail,
                ErrorKind::PredicateMoving,
            ),
            (
                status("Tablet isn't being served by this instance."),
                Status::Fail,
                ErrorKind::TabletNotServed,
            ),
            (
                status("Request sent to wrong server."),
                Status::Fail,
                ErrorKind::WrongServer,
            ),
            (
                status("Please retry again, server is not ready to accept requests"),
                Status::Fail,
                ErrorKind::NotReady,
            ),
            (
                status("UNAVAILABLE: io exception"),
                Status::Fail,
                ErrorKind::Unavailable,
            ),
            (
                status("No connection exists"),
                Status::Fail,
                ErrorKind::NoConnection,
            ),
            (
                status("all SubConns are in TransientFailure"),
                Status::Info,
                ErrorKind::UnavailableAllSubconnsDown,
            ),
            (
                status("transport is closing"),
                Status::Info,
                ErrorKind::UnavailableTransportClosing,
            ),
            (
                status("Unhealthy connection"),
                Status::Info,
                ErrorKind::UnhealthyConnection,
            ),
            (
                status("Only leader can decide to commit or abort"),
                Status::Fail,
                ErrorKind::OnlyLeaderCanCommit,
            ),
            (
                status("Node 3 doesn't serve group id: 2"),
                Status::Fail,
                ErrorKind::ServerDoesntServeGroup,
            ),
        ];
        for (err, want_status, want_kind) in cases {
            assert_eq!(classify(&err), Some((want_status, want_kind)), "{err}");
        }
    }

    #[test]
    fn test_unavailable_detail_beats_code_name() {
        let cases = [
            (
                "UNAVAILABLE: No connection exists",
                Status::Fail,
                ErrorKind::NoConnection,
            ),
            (
                "UNAVAILABLE: all SubConns are in TransientFailure",
                Status::Info,
                ErrorKind::UnavailableAllSubconnsDown,
            ),
            (
                "rpc error: code = Unavailable desc = UNAVAILABLE: transport is closing",
                Status::Info,
                ErrorKind::UnavailableTransportClosing,
            ),
            (
                "UNAVAILABLE: Unhealthy connection",
                Status::Info,
                ErrorKind::UnhealthyConnection,
            ),
            ("UNAVAILABLE: io exception", Status::Fail, ErrorKind::Unavailable),
        ];
        for (msg, want_status, want_kind) in cases {
            assert_eq!(classify(&status(msg)), Some((want_status, want_kind)), "{msg}");
        }
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            classify(&status("UNAVAILABLE: Conflicts with pending transaction")),
            Some((Status::Fail, ErrorKind::Conflict))
        );
        assert_eq!(
            classify(&status("DEADLINE_EXCEEDED: transport is closing")),
            Some((Status::Info, ErrorKind::Timeout))
        );
    }

    #[test]
    fn test_deadline_variants() {
        assert!(is_deadline(&RpcError::DeadlineExceeded));
        assert!(is_deadline(&status("DEADLINE_EXCEEDED: 5s")));
        assert!(is_deadline(&status("rpc error: context deadline exceeded")));
        assert!(!is_deadline(&status("UNAVAILABLE: io exception")));
        assert!(!is_deadline(&RpcError::Conflict));
    }

    #[test]
    fn test_old_timestamp_needs_order() {
        assert_eq!(classify(&status("less than minTs then readTs")), None);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(classify(&status("disk on fire")), None);
    }

    #[test]
    fn test_backoff_kinds() {
        assert!(needs_backoff(ErrorKind::Unavailable));
        assert!(needs_backoff(ErrorKind::UnhealthyConnection));
        assert!(!needs_backoff(ErrorKind::UnavailableAllSubconnsDown));
        assert!(!needs_backoff(ErrorKind::Timeout));
    }

    #[test]
    fn test_outcome_conflict() {
        let classifier = Classifier::new().with_sleep(record_sleep);
        let ops = [MicroOp::write(1, 1)];
        let outcome = classifier
            .outcome(
                &ops,
                Err(status("Conflicts with pending transaction. Please abort.").into()),
            )
            .unwrap();
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.error, Some(ErrorKind::Conflict));
        assert!(take_sleeps().is_empty());
    }

    #[test]
    fn test_outcome_backs_off_when_unavailable() {
        let classifier = Classifier::new().with_sleep(record_sleep);
        let ops = [MicroOp::read(1)];
        for msg in ["UNAVAILABLE: node down", "Unhealthy connection"] {
            classifier.outcome(&ops, Err(status(msg).into())).unwrap();
            let slept = take_sleeps();
            assert_eq!(slept.len(), 1);
            assert!(slept[0] < Duration::from_millis(2000));
        }
    }

    #[test]
    fn test_outcome_subconns_is_info_without_backoff() {
        let classifier = Classifier::new().with_sleep(record_sleep);
        let ops = [MicroOp::read(3)];
        for msg in [
            "all SubConns are in TransientFailure",
            "UNAVAILABLE: all SubConns are in TransientFailure",
        ] {
            let outcome = classifier.outcome(&ops, Err(status(msg).into())).unwrap();
            assert_eq!(outcome.status, Status::Info, "{msg}");
            assert_eq!(outcome.error, Some(ErrorKind::UnavailableAllSubconnsDown));
            assert_eq!(outcome.value, vec![(ops[0], None)]);
            assert!(take_sleeps().is_empty(), "{msg}");
        }
    }

    #[test]
    fn test_outcome_rethrows_unknown() {
        let classifier = Classifier::new().with_sleep(record_sleep);
        let err = classifier
            .outcome(&[], Err(status("disk on fire").into()))
            .unwrap_err();
        assert!(matches!(err, Error::Rpc(RpcError::Status(msg)) if msg == "disk on fire"));
    }

    #[test]
    fn test_outcome_rethrows_contract_faults() {
        let classifier = Classifier::new();
        let err = classifier
            .outcome(
                &[],
                Err(Error::MissingUpsertKey {
                    predicate: "key_0".into(),
                }),
            )
            .unwrap_err();
        assert!(matches!(err, Error::MissingUpsertKey { .. }));
    }
}
