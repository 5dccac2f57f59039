//! `Panelgen` Runtime: incremental loading, optimistic mutation, collection services, and the editor configuration endpoint.

pub mod config;
pub mod error;
pub mod http;
pub mod loader;
pub mod memory;
pub mod mutator;
pub mod service;

pub use config::{HttpConfig, LoaderConfig};
pub use error::LoaderError;
pub use loader::{FetchHandle, FetchOutcome, FetchResult, IncrementalLoader};
pub use memory::MemoryCollection;
pub use mutator::OptimisticMutator;
pub use service::{CollectionRegistry, CollectionService};
