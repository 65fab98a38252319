use std::collections::HashSet;

use chrono::{DateTime, Duration, Local};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use txprobe_core::op::MicroOp;
use typed_builder::TypedBuilder;

/// The micro-ops of one operation, run in a single transaction.
pub type Operation = Vec<MicroOp>;

/// The operations one client runs, in order.
pub type Process = Vec<Operation>;

#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
pub struct WorkloadParams {
    #[builder(default)]
    pub id: u64,
    pub n_process: u64,
    pub n_key: u32,
    pub n_txn: u64,
    pub max_txn_len: u32,
    #[builder(default)]
    pub seed: u64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct Workload {
    params: WorkloadParams,
    info: String,
    start: DateTime<Local>,
    end: DateTime<Local>,
    data: Vec<Process>,
}

impl Workload {
    #[must_use]
    pub const fn new(
        params: WorkloadParams,
        info: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
        data: Vec<Process>,
    ) -> Self {
        Self {
            params,
            info,
            start,
            end,
            data,
        }
    }

    #[must_use]
    pub const fn get_id(&self) -> u64 {
        self.params.id
    }

    #[must_use]
    pub const fn get_data(&self) -> &Vec<Process> {
        &self.data
    }

    #[must_use]
    pub const fn get_params(&self) -> &WorkloadParams {
        &self.params
    }

    #[must_use]
    pub fn get_duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Generate `n_process` processes, each running `n_txn` operations of one to
/// `max_txn_len` micro-ops over keys `0..n_key`.
///
/// # Write-once keys
///
/// Writes go through an insert-if-absent upsert, so only the first write to
/// a key can take effect. Each key is therefore written at most once in the
/// whole workload, with a value no other write uses (a workload-wide counter
/// starting at 1). A read value then names exactly one write, and the
/// workload is also valid for blind-insert mode. Once a key has been written,
/// a micro-op that drew a write for it reads it instead, or is dropped if
/// the operation already reads that key. An operation reads a key at most
/// once and always has at least one micro-op.
///
/// The same `seed` always yields the same workload. With no keys or a zero
/// operation length, every process is empty.
#[must_use]
pub fn generate_single_workload(params: &WorkloadParams) -> Vec<Process> {
    if params.n_key == 0 || params.max_txn_len == 0 {
        return (0..params.n_process).map(|_| Vec::new()).collect();
    }
    let mut written: HashSet<i64> = HashSet::new();
    let mut next_value: i64 = 0;
    let mut rng = StdRng::seed_from_u64(params.seed);

    (0..params.n_process)
        .map(|_| {
            (0..params.n_txn)
                .map(|_| {
                    let len = rng.random_range(1..=params.max_txn_len);
                    let mut read_keys: HashSet<i64> = HashSet::new();
                    (0..len)
                        .filter_map(|_| {
                            let key = i64::from(rng.random_range(0..params.n_key));
                            let want_read = rng.random::<bool>();
                            if !want_read && written.insert(key) {
                                next_value += 1;
                                Some(MicroOp::write(key, next_value))
                            } else if read_keys.insert(key) {
                                Some(MicroOp::read(key))
                            } else {
                                None
                            }
                        })
                        .collect::<Operation>()
                })
                .collect::<Process>()
        })
        .collect()
}

/// Generate `n_work` workloads in parallel. Workload `i` gets id `i` and
/// seed `params.seed + i`.
#[must_use]
pub fn generate_mult_workloads(n_work: u64, params: &WorkloadParams) -> Vec<Workload> {
    (0..n_work)
        .into_par_iter()
        .map(|id| {
            let params = WorkloadParams {
                id,
                seed: params.seed.wrapping_add(id),
                ..params.clone()
            };
            let start = Local::now();
            let data = generate_single_workload(&params);
            let end = Local::now();
            tracing::debug!(id, processes = data.len(), "generated workload");
            Workload::new(params, "generated".to_string(), start, end, data)
        })
        .collect()
}
