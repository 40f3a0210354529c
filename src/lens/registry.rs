//! Lens registry for resolving clients and adapters by tag

use super::Lens;
use crate::autocomplete::{fetch_suggestions, BackendAdapter, SuggestParams, SuggestionTerm};
use crate::network::TransportClient;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Client and (optional) adapter serving one lens
#[derive(Clone)]
pub struct LensEntry {
    pub client: Arc<TransportClient>,
    /// `None` for pass-through lenses that do not suggest
    pub adapter: Option<Arc<dyn BackendAdapter>>,
}

/// Suggestions from one lens
#[derive(Debug, Clone, Serialize)]
pub struct LensSuggestions {
    pub lens: Lens,
    pub suggestions: Vec<SuggestionTerm>,
}

/// Registry of configured lenses
#[derive(Default)]
pub struct LensRegistry {
    lenses: HashMap<Lens, LensEntry>,
}

impl LensRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lens, replacing any previous entry
    pub fn register(
        &mut self,
        lens: Lens,
        client: Arc<TransportClient>,
        adapter: Option<Arc<dyn BackendAdapter>>,
    ) {
        self.lenses.insert(lens, LensEntry { client, adapter });
    }

    pub fn get(&self, lens: Lens) -> Option<&LensEntry> {
        self.lenses.get(&lens)
    }

    pub fn client(&self, lens: Lens) -> Option<&Arc<TransportClient>> {
        self.lenses.get(&lens).map(|e| &e.client)
    }

    pub fn adapter(&self, lens: Lens) -> Option<&Arc<dyn BackendAdapter>> {
        self.lenses.get(&lens).and_then(|e| e.adapter.as_ref())
    }

    /// Registered lenses, in declaration order
    pub fn lenses(&self) -> Vec<Lens> {
        let mut lenses: Vec<Lens> = self.lenses.keys().copied().collect();
        lenses.sort();
        lenses
    }

    /// Lenses with a suggestion adapter, in declaration order
    pub fn suggestable(&self) -> Vec<Lens> {
        self.lenses()
            .into_iter()
            .filter(|l| self.adapter(*l).is_some())
            .collect()
    }

    /// Suggestions from one lens; unknown or pass-through lenses yield none
    pub async fn suggest(&self, lens: Lens, params: &SuggestParams) -> Vec<SuggestionTerm> {
        match self.get(lens) {
            Some(LensEntry {
                client,
                adapter: Some(adapter),
            }) => fetch_suggestions(client, adapter.as_ref(), params).await,
            _ => vec![],
        }
    }

    /// Suggestions from every suggestable lens, queried concurrently
    pub async fn suggest_all(&self, params: &SuggestParams) -> Vec<LensSuggestions> {
        let lenses = self.suggestable();
        let futures = lenses.iter().map(|lens| self.suggest(*lens, params));
        let results = join_all(futures).await;

        lenses
            .into_iter()
            .zip(results)
            .map(|(lens, suggestions)| LensSuggestions { lens, suggestions })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lenses.is_empty()
    }
}
