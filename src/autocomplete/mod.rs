//! Autocomplete for catalog and article searches
//!
//! Each backend adapter knows how to ask its backend for suggestion data and
//! how to turn the answer into ranked terms.

mod backends;
pub mod ranking;

pub use backends::{BackendAdapter, EdsDocuments, SolrSuggester, SuggestParams};
pub use ranking::{
    rank, rank_candidates, CandidateDocument, RankingConfig, SuggestionCandidate, SuggestionTerm,
    DEFAULT_SUGGESTION_COUNT,
};

use crate::network::TransportClient;
use tracing::debug;

/// Fetch suggestions for `params` through `client`
///
/// A blank query or a failed backend call yields no suggestions.
pub async fn fetch_suggestions(
    client: &TransportClient,
    adapter: &dyn BackendAdapter,
    params: &SuggestParams,
) -> Vec<SuggestionTerm> {
    if params.q.trim().is_empty() {
        return vec![];
    }

    let request = adapter.build_suggest_request(params);
    match client.read(&request).await {
        Some(response) => adapter.extract_suggestions(params, &response),
        None => {
            debug!("{}: no suggestions for '{}'", adapter.name(), params.q);
            vec![]
        }
    }
}
