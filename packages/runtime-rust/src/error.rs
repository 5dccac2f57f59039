//! Loader error types.

use std::sync::Arc;

/// Failures surfaced by an [`IncrementalLoader`](crate::loader::IncrementalLoader).
///
/// The source error is behind an `Arc` so a coalesced fetch can hand the same
/// failure to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoaderError {
    /// `find` failed. Pagination stops until an explicit reset or refresh.
    #[error("fetch failed: {0}")]
    Fetch(Arc<anyhow::Error>),
    /// `create`, `patch`, or `remove` failed. The item list was left untouched.
    #[error("mutation failed: {0}")]
    Mutation(Arc<anyhow::Error>),
}

impl LoaderError {
    pub(crate) fn fetch(err: anyhow::Error) -> Self {
        Self::Fetch(Arc::new(err))
    }

    pub(crate) fn mutation(err: anyhow::Error) -> Self {
        Self::Mutation(Arc::new(err))
    }
}
