use thiserror::Error;

/// Failure to resolve a [`NodeHandle`](crate::NodeHandle).
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeError {
    /// The handle was minted by a different map.
    #[error("node handle belongs to a different map")]
    WrongMap,

    /// The handle's slot no longer holds the entry it was minted for: the
    /// entry was removed or migrated, or its array has been retired.
    #[error("node handle is stale")]
    Stale,
}
