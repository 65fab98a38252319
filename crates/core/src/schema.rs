//! Schema layout and setup.

use std::fmt::Write as _;
use std::num::NonZeroU64;
use std::thread;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::classify::is_deadline;
use crate::client::Client;
use crate::error::Error;
use crate::shard::{all_predicates, predicate_for};

pub const KEY_PREFIX: &str = "key";
pub const VALUE_PREFIX: &str = "value";

/// How keys and values are laid out across predicates.
///
/// Built once before a test and shared read-only by every client.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SchemaConfig {
    key_shards: NonZeroU64,
    value_shards: NonZeroU64,
    upsert_index: bool,
}

impl SchemaConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidShardCount`] if either count is zero.
    pub fn new(key_shards: u64, value_shards: u64, upsert_index: bool) -> Result<Self, Error> {
        let nonzero = |prefix: &'static str, count: u64| {
            NonZeroU64::new(count).ok_or(Error::InvalidShardCount { prefix, count })
        };
        Ok(Self {
            key_shards: nonzero(KEY_PREFIX, key_shards)?,
            value_shards: nonzero(VALUE_PREFIX, value_shards)?,
            upsert_index,
        })
    }

    #[must_use]
    pub const fn key_shards(&self) -> NonZeroU64 {
        self.key_shards
    }

    #[must_use]
    pub const fn value_shards(&self) -> NonZeroU64 {
        self.value_shards
    }

    #[must_use]
    pub const fn upsert_index(&self) -> bool {
        self.upsert_index
    }

    #[must_use]
    pub fn key_predicate(&self, key: i64) -> String {
        predicate_for(KEY_PREFIX, self.key_shards, key)
    }

    #[must_use]
    pub fn value_predicate(&self, key: i64) -> String {
        predicate_for(VALUE_PREFIX, self.value_shards, key)
    }

    /// The schema declarations, one predicate per line.
    ///
    /// Key predicates are indexed so they can be looked up by equality; with
    /// `upsert_index` they also carry `@upsert`, which makes the store treat
    /// concurrent writes to the same indexed value as conflicting.
    #[must_use]
    pub fn schema_text(&self) -> String {
        let upsert = if self.upsert_index { " @upsert" } else { "" };
        let mut text = String::new();
        for pred in all_predicates(KEY_PREFIX, self.key_shards) {
            let _ = writeln!(text, "{pred}: int @index(int){upsert} .");
        }
        for pred in all_predicates(VALUE_PREFIX, self.value_shards) {
            let _ = writeln!(text, "{pred}: int .");
        }
        text
    }
}

/// Retry policy for applying the schema while the cluster starts up.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct SchemaRetry {
    #[builder(default = 5)]
    pub attempts: u32,
    #[builder(default = Duration::from_secs(1))]
    pub delay: Duration,
}

impl Default for SchemaRetry {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Apply the schema, retrying only on deadline-exceeded (see
/// [`is_deadline`]).
///
/// Altering the schema is idempotent, so repeating it after a deadline is
/// safe. Freshly started clusters routinely miss the first few deadlines.
///
/// # Errors
///
/// Returns the last failure once `retry.attempts` are used up, or the first
/// failure that is not a deadline.
pub fn apply_schema<C: Client>(
    client: &C,
    schema: &SchemaConfig,
    retry: SchemaRetry,
) -> Result<(), Error> {
    let text = schema.schema_text();
    let mut attempt = 1;
    loop {
        match client.apply_schema(&text) {
            Ok(()) => {
                tracing::debug!(attempt, "schema applied");
                return Ok(());
            }
            Err(err) if is_deadline(&err) && attempt < retry.attempts => {
                tracing::warn!(attempt, %err, "schema apply timed out, retrying");
                attempt += 1;
                thread::sleep(retry.delay);
            }
            Err(err) => return Err(err.into()),
        }
    }
}
