//! Catalog-Lens: suggestion and pass-through services for a federated catalog
//!
//! Fronts a Solr catalog index, an EDS article index and a Firehose inventory
//! service with one resilient transport layer and a shared ranking engine.

pub mod autocomplete;
pub mod cache;
pub mod config;
pub mod inventory;
pub mod lens;
pub mod metrics;
pub mod network;
pub mod web;

pub use autocomplete::{BackendAdapter, SuggestParams, SuggestionTerm};
pub use config::Settings;
pub use lens::{Lens, LensLoader, LensRegistry};
pub use network::{TransportClient, TransportError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
