//! Random read/write workloads for the harness.

pub mod generator;

pub use generator::{generate_mult_workloads, generate_single_workload, Workload, WorkloadParams};
