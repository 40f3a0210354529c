//! Lens loader for initializing clients and adapters from configuration

use super::registry::LensRegistry;
use super::Lens;
use crate::autocomplete::{BackendAdapter, EdsDocuments, SolrSuggester};
use crate::config::{BackendSettings, Settings};
use crate::network::{ErrorSchema, TransportClient};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Builds the lens registry once at startup
pub struct LensLoader;

impl LensLoader {
    /// Load every lens from settings
    pub fn load(settings: &Settings) -> Result<LensRegistry> {
        let mut registry = LensRegistry::new();

        for lens in Lens::all() {
            let (client, adapter) = Self::create_lens(lens, settings)?;
            info!(
                "Loaded lens: {} ({}{})",
                lens,
                client.base_url(),
                adapter
                    .as_ref()
                    .map(|a| format!(", {} adapter", a.name()))
                    .unwrap_or_default()
            );
            registry.register(lens, client, adapter);
        }

        info!("Loaded {} lenses", registry.len());
        Ok(registry)
    }

    /// Create the client and adapter for one lens
    fn create_lens(
        lens: Lens,
        settings: &Settings,
    ) -> Result<(Arc<TransportClient>, Option<Arc<dyn BackendAdapter>>)> {
        let (backend, schema, adapter): (&BackendSettings, ErrorSchema, Option<Arc<dyn BackendAdapter>>) =
            match lens {
                Lens::Catalog => (
                    &settings.catalog.client,
                    ErrorSchema::Solr,
                    Some(Arc::new(SolrSuggester::from_settings(&settings.catalog))),
                ),
                Lens::Articles => (
                    &settings.articles.client,
                    ErrorSchema::Eds,
                    Some(Arc::new(EdsDocuments::from_settings(
                        &settings.articles,
                        &settings.suggest,
                    ))),
                ),
                Lens::Inventory => (&settings.inventory.client, ErrorSchema::Firehose, None),
            };

        let client = TransportClient::new(lens.as_str(), backend, schema)
            .with_context(|| format!("Failed to load lens {}", lens))?;

        Ok((Arc::new(client), adapter))
    }
}
