//! Connections to the store under test, and running workloads against it.
//!
//! [`Conn`] owns one channel per cluster node and spreads transactions over
//! them. [`memory::MemoryStore`] is an in-process store with the same
//! conflict behavior as the real thing, used for tests and dry runs.
//! [`runner::Runner`] executes a generated workload with one thread per
//! process and records the resulting history.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use txprobe_core::client::{Client, Sequencing};
use txprobe_core::error::RpcError;

pub mod memory;
pub mod runner;

/// Configuration for connecting to a database cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Hostnames or IP addresses of the cluster nodes.
    pub hosts: Vec<String>,
    /// Port number for RPC connections.
    pub port: u16,
    /// Deadline applied by the RPC layer to every call.
    pub rpc_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["n1".into()],
            port: 9080,
            rpc_timeout: Duration::from_secs(10),
        }
    }
}

/// A client owning one channel per node.
///
/// Transactions go to the nodes in round-robin order. Schema changes go to
/// the first node.
#[derive(Debug)]
pub struct Conn<C> {
    channels: Vec<C>,
    next: AtomicUsize,
}

impl<C: Client> Conn<C> {
    /// Open a channel to every host in `config`.
    ///
    /// Channels opened before a failure are closed again.
    ///
    /// # Errors
    ///
    /// Returns the first connection failure, or a `No connection exists`
    /// status when `config.hosts` is empty.
    pub fn open<F>(config: &ClusterConfig, mut connect: F) -> Result<Self, RpcError>
    where
        F: FnMut(&str, u16) -> Result<C, RpcError>,
    {
        if config.hosts.is_empty() {
            return Err(RpcError::status("No connection exists"));
        }
        let mut channels = Vec::with_capacity(config.hosts.len());
        for host in &config.hosts {
            match connect(host, config.port) {
                Ok(channel) => channels.push(channel),
                Err(err) => {
                    tracing::warn!(host, %err, "connect failed");
                    channels.into_iter().for_each(Client::close);
                    return Err(err);
                }
            }
        }
        tracing::debug!(nodes = channels.len(), "connected");
        Ok(Self {
            channels,
            next: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn channels(&self) -> &[C] {
        &self.channels
    }

    fn pick(&self) -> &C {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.channels.len();
        &self.channels[i]
    }
}

impl<C: Client> Client for Conn<C> {
    type Txn = C::Txn;

    fn new_transaction(&self, sequencing: Sequencing) -> Result<C::Txn, RpcError> {
        self.pick().new_transaction(sequencing)
    }

    fn apply_schema(&self, schema: &str) -> Result<(), RpcError> {
        self.channels[0].apply_schema(schema)
    }

    fn close(self) {
        self.channels.into_iter().for_each(Client::close);
    }
}
