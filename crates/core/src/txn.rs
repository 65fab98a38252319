//! Scoped transactions.

use typed_builder::TypedBuilder;

use crate::client::{Client, Sequencing, Transaction};
use crate::error::Error;

/// Per-operation execution settings, shared read-only by all clients.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, TypedBuilder)]
pub struct ExecConfig {
    /// Who assigns read timestamps.
    #[builder(default)]
    pub sequencing: Sequencing,
    /// Skip the existence check on writes and always insert. Only sound
    /// when no key is ever written twice.
    #[builder(default)]
    pub blind_insert_on_write: bool,
}

/// Run `body` inside a fresh transaction.
///
/// The transaction is committed if `body` succeeds and discarded if it
/// fails; either way it is terminated exactly once. A failed commit is
/// returned as is, since the transaction has already ended. Nothing is
/// retried.
///
/// # Errors
///
/// Returns the error from opening the transaction, from `body`, or from
/// the commit.
pub fn with_transaction<C, T, F>(config: &ExecConfig, client: &C, body: F) -> Result<T, Error>
where
    C: Client,
    F: FnOnce(&mut C::Txn) -> Result<T, Error>,
{
    let mut txn = client.new_transaction(config.sequencing)?;
    match body(&mut txn) {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(discard_err) = txn.discard() {
                tracing::warn!(%discard_err, %err, "discard failed after error");
            }
            Err(err)
        }
    }
}
