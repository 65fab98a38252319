//! txprobe CLI -- generate workloads, run them, print the schema.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use txprobe_core::client::Sequencing;
use txprobe_core::error::Error;
use txprobe_core::schema::SchemaConfig;
use txprobe_core::txn::ExecConfig;

#[derive(Debug, Parser)]
#[command(
    name = "txprobe",
    about = "Transactional workload harness for distributed document stores"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate random read/write workloads
    Generate(GenerateArgs),
    /// Run a workload against the in-memory store and record its history
    Run(RunArgs),
    /// Print the schema for a predicate layout
    Schema(SchemaArgs),
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Number of workloads to generate
    #[arg(long)]
    pub n_work: u64,
    /// Number of processes (concurrent clients)
    #[arg(long)]
    pub n_process: u64,
    /// Number of distinct keys
    #[arg(long)]
    pub n_key: u32,
    /// Number of operations per process
    #[arg(long)]
    pub n_txn: u64,
    /// Maximum micro-ops per operation
    #[arg(long)]
    pub max_txn_len: u32,
    /// Base random seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Output directory for generated workload files
    #[arg(long)]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    /// Number of predicates keys are spread over
    #[arg(long, default_value_t = 1)]
    pub key_shards: u64,
    /// Number of predicates values are spread over
    #[arg(long, default_value_t = 1)]
    pub value_shards: u64,
    /// Declare key predicates with @upsert
    #[arg(long)]
    pub upsert_index: bool,
}

impl SchemaArgs {
    /// # Errors
    ///
    /// Returns an error if a shard count is zero.
    pub fn schema_config(&self) -> Result<SchemaConfig, Error> {
        SchemaConfig::new(self.key_shards, self.value_shards, self.upsert_index)
    }
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Workload JSON file
    #[arg(long)]
    pub input: PathBuf,
    /// File to write the history JSON to
    #[arg(long)]
    pub output: PathBuf,
    #[command(flatten)]
    pub schema: SchemaArgs,
    /// Insert on every write without checking for an existing key
    #[arg(long)]
    pub blind_insert_on_write: bool,
    /// Who assigns transaction read timestamps
    #[arg(long, value_enum, default_value_t = SequencingMode::Server)]
    pub sequencing: SequencingMode,
    /// Number of simulated cluster nodes
    #[arg(long, default_value_t = 3)]
    pub nodes: usize,
}

impl RunArgs {
    #[must_use]
    pub fn exec_config(&self) -> ExecConfig {
        ExecConfig::builder()
            .sequencing(self.sequencing.into())
            .blind_insert_on_write(self.blind_insert_on_write)
            .build()
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SequencingMode {
    Server,
    Client,
}

impl From<SequencingMode> for Sequencing {
    fn from(mode: SequencingMode) -> Self {
        match mode {
            SequencingMode::Server => Self::Server,
            SequencingMode::Client => Self::Client,
        }
    }
}
