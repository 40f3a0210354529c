//! Backend adapter implementations

use super::ranking::{rank, CandidateDocument, RankingConfig, SuggestionTerm};
use crate::config::{ArticlesSettings, CatalogSettings, SuggestSettings};
use crate::network::{Request, Response};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Parameters of a suggestion request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SuggestParams {
    pub q: String,
    pub search_field: Option<String>,
}

impl SuggestParams {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            search_field: None,
        }
    }

    pub fn with_search_field(mut self, field: impl Into<String>) -> Self {
        self.search_field = Some(field.into());
        self
    }
}

/// Trait for autocomplete backends
pub trait BackendAdapter: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Build the request that fetches suggestion data
    fn build_suggest_request(&self, params: &SuggestParams) -> Request;

    /// Read the ordered suggestions out of a successful response
    fn extract_suggestions(&self, params: &SuggestParams, response: &Response) -> Vec<SuggestionTerm>;
}

/// Solr suggester: the backend returns a ranked list at a known path
pub struct SolrSuggester {
    base_url: String,
    handler: String,
    suggest_path: String,
    suggester_name: String,
}

impl SolrSuggester {
    pub fn new(
        base_url: impl Into<String>,
        handler: impl Into<String>,
        suggest_path: impl Into<String>,
        suggester_name: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            handler: handler.into(),
            suggest_path: suggest_path.into(),
            suggester_name: suggester_name.into(),
        }
    }

    pub fn from_settings(settings: &CatalogSettings) -> Self {
        Self::new(
            &settings.client.base_url,
            &settings.suggest_handler,
            &settings.suggest_path,
            &settings.suggester_name,
        )
    }
}

impl BackendAdapter for SolrSuggester {
    fn name(&self) -> &str {
        "solr"
    }

    fn build_suggest_request(&self, params: &SuggestParams) -> Request {
        Request::new(&self.base_url)
            .segment(&self.handler)
            .param("q", &params.q)
            .param("wt", "json")
            .param("suggest.dictionary", &self.suggester_name)
    }

    fn extract_suggestions(&self, params: &SuggestParams, response: &Response) -> Vec<SuggestionTerm> {
        // Solr returns: {suggest: {<suggester>: {<q>: {numFound, suggestions: [...]}}}}
        response
            .parsed_body()
            .and_then(|body| body.get(&self.suggest_path))
            .and_then(|s| s.get(&self.suggester_name))
            .and_then(|s| s.get(&params.q))
            .and_then(|s| s.get("suggestions"))
            .and_then(|s| s.as_array())
            .map(|arr| arr.iter().filter_map(suggestion_from_json).collect())
            .unwrap_or_default()
    }
}

fn suggestion_from_json(item: &Value) -> Option<SuggestionTerm> {
    let term = item.get("term")?.as_str()?;
    Some(SuggestionTerm {
        term: term.to_string(),
        weight: item.get("weight").and_then(|w| w.as_i64()).unwrap_or(1),
        payload: item
            .get("payload")
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

/// EDS records ranked locally against the query
pub struct EdsDocuments {
    base_url: String,
    ranking: RankingConfig,
    field_codes: BTreeMap<String, String>,
    results_per_page: u32,
    all_fields_value: String,
}

impl EdsDocuments {
    pub fn from_settings(settings: &ArticlesSettings, suggest: &SuggestSettings) -> Self {
        Self {
            base_url: settings.client.base_url.clone(),
            ranking: RankingConfig::new(settings.fields.clone(), suggest.suggestion_count),
            field_codes: settings.field_codes.clone(),
            results_per_page: settings.results_per_page,
            all_fields_value: suggest.all_fields_value.clone(),
        }
    }

    /// The requested search field, with "all fields" meaning no restriction
    pub fn search_field<'a>(&self, params: &'a SuggestParams) -> Option<&'a str> {
        params
            .search_field
            .as_deref()
            .filter(|f| !f.is_empty() && *f != self.all_fields_value)
    }

    /// Candidate documents from an EDS search response
    pub fn documents(&self, body: &Value) -> Vec<CandidateDocument> {
        // EDS returns: {SearchResult: {Data: {Records: [{Header: {RelevancyScore}, Items: [{Name, Data}]}]}}}
        body.get("SearchResult")
            .and_then(|r| r.get("Data"))
            .and_then(|d| d.get("Records"))
            .and_then(|r| r.as_array())
            .map(|records| records.iter().map(document_from_record).collect())
            .unwrap_or_default()
    }
}

fn document_from_record(record: &Value) -> CandidateDocument {
    let relevance = record
        .get("Header")
        .and_then(|h| h.get("RelevancyScore"))
        .and_then(|score| match score {
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_f64(),
        })
        .unwrap_or(0.0);

    let mut document = CandidateDocument::new(relevance);
    for item in record
        .get("Items")
        .and_then(|i| i.as_array())
        .into_iter()
        .flatten()
    {
        if let (Some(name), Some(data)) = (
            item.get("Name").and_then(|n| n.as_str()),
            item.get("Data").and_then(|d| d.as_str()),
        ) {
            document.push(name, data);
        }
    }
    document
}

impl BackendAdapter for EdsDocuments {
    fn name(&self) -> &str {
        "eds"
    }

    fn build_suggest_request(&self, params: &SuggestParams) -> Request {
        let code = self
            .search_field(params)
            .and_then(|f| self.field_codes.get(f));
        let query = match code {
            Some(code) => format!("AND,{}:{}", code, params.q),
            None => format!("AND,{}", params.q),
        };

        Request::new(&self.base_url)
            .segments(["edsapi", "rest", "Search"])
            .param("query", query)
            .param("resultsperpage", self.results_per_page.to_string())
            .param("view", "brief")
            .param("highlight", "n")
            .param("includefacets", "n")
    }

    fn extract_suggestions(&self, params: &SuggestParams, response: &Response) -> Vec<SuggestionTerm> {
        let documents = match response.parsed_body() {
            Some(body) => self.documents(body),
            None => return vec![],
        };
        rank(&params.q, self.search_field(params), &documents, &self.ranking)
    }
}
