//! Running a workload with one thread per process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use txprobe_core::classify::Classifier;
use txprobe_core::client::Client;
use txprobe_core::error::Error;
use txprobe_core::history::{Event, Summary};
use txprobe_core::schema::{apply_schema, SchemaConfig, SchemaRetry};
use txprobe_core::txn::ExecConfig;
use txprobe_core::workload::invoke;
use txprobe_testgen::generator::{Process, Workload};
use typed_builder::TypedBuilder;

/// A recorded run, in real-time order of invocations and completions.
#[derive(Debug, Serialize, Deserialize)]
pub struct History {
    pub workload_id: u64,
    pub schema: SchemaConfig,
    pub exec: ExecConfig,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub summary: Summary,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct Runner {
    schema: SchemaConfig,
    #[builder(default)]
    exec: ExecConfig,
    #[builder(default)]
    classifier: Classifier,
    #[builder(default)]
    retry: SchemaRetry,
}

/// Run-wide event stamps. Every process draws from the same counter, so an
/// event that happens after another (in real time) always gets a larger
/// index, even when both fall in the same millisecond.
struct Clock {
    start: Instant,
    next: AtomicU64,
}

impl Clock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            next: AtomicU64::new(0),
        }
    }

    /// `(index, time_ms)` for an event happening now.
    fn stamp(&self) -> (u64, u64) {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let time_ms = u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX);
        (index, time_ms)
    }
}

impl Runner {
    fn run_process<C: Client>(
        &self,
        client: &C,
        process: u64,
        ops: &Process,
        clock: &Clock,
    ) -> Result<Vec<Event>, Error> {
        let mut events = Vec::with_capacity(ops.len() * 2);
        for op in ops {
            let (index, time_ms) = clock.stamp();
            events.push(Event::invoke(process, index, time_ms, op));
            let outcome = invoke(client, &self.schema, &self.exec, &self.classifier, op)
                .inspect_err(|err| tracing::warn!(process, %err, "process crashed"))?;
            tracing::trace!(process, status = %outcome.status, "operation completed");
            let (index, time_ms) = clock.stamp();
            events.push(Event::complete(process, index, time_ms, outcome));
        }
        Ok(events)
    }

    /// Apply the schema, then run every process of `workload` on its own
    /// thread against `client`.
    ///
    /// # Errors
    ///
    /// Returns a schema failure, or the first unclassified failure from any
    /// process. Processes that already finished are not rolled back.
    pub fn run<C: Client + Sync>(&self, client: &C, workload: &Workload) -> Result<History, Error> {
        apply_schema(client, &self.schema, self.retry)?;

        let start = Local::now();
        let clock = Clock::new();
        let clock = &clock;
        let results: Vec<Result<Vec<Event>, Error>> = thread::scope(|scope| {
            let handles: Vec<_> = workload
                .get_data()
                .iter()
                .zip(0u64..)
                .map(|(ops, process)| {
                    scope.spawn(move || self.run_process(client, process, ops, clock))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });
        let end = Local::now();

        let mut events = Vec::new();
        for result in results {
            events.extend(result?);
        }
        events.sort_unstable_by_key(|e| e.index);
        let summary = Summary::of(&events);
        tracing::debug!(
            workload = workload.get_id(),
            ok = summary.ok,
            fail = summary.fail,
            info = summary.info,
            "workload finished"
        );

        Ok(History {
            workload_id: workload.get_id(),
            schema: self.schema,
            exec: self.exec,
            start,
            end,
            summary,
            events,
        })
    }
}
