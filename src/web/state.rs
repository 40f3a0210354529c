//! Application state shared across handlers

use crate::config::Settings;
use crate::inventory::InventoryClient;
use crate::lens::{Lens, LensRegistry};
use anyhow::anyhow;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Lens registry
    pub registry: Arc<LensRegistry>,
    /// Inventory pass-through, sharing the inventory lens client
    pub inventory: InventoryClient,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings, registry: LensRegistry) -> anyhow::Result<Self> {
        let inventory = registry
            .client(Lens::Inventory)
            .cloned()
            .map(InventoryClient::new)
            .ok_or_else(|| anyhow!("inventory lens is not configured"))?;

        Ok(Self {
            settings: Arc::new(settings),
            registry: Arc::new(registry),
            inventory,
        })
    }

    /// Get instance name
    pub fn instance_name(&self) -> &str {
        &self.settings.general.instance_name
    }
}
