//! Backend-agnostic suggestion ranking
//!
//! Turns a free-text query and a set of candidate documents into an ordered,
//! deduplicated, bounded list of suggested terms. Everything here is a pure
//! function over its inputs.

use scraper::Html;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Default number of suggestions returned
pub const DEFAULT_SUGGESTION_COUNT: usize = 7;

/// A single suggested term, in output order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionTerm {
    pub term: String,
    pub weight: i64,
    pub payload: String,
}

impl SuggestionTerm {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            weight: 1,
            payload: String::new(),
        }
    }
}

/// A raw document from a backend response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateDocument {
    /// Field name to one or more values
    pub fields: HashMap<String, Vec<String>>,
    /// Backend-provided relevance
    pub relevance: f64,
}

impl CandidateDocument {
    pub fn new(relevance: f64) -> Self {
        Self {
            fields: HashMap::new(),
            relevance,
        }
    }

    /// Append a value to `field`
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, value);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(field.into()).or_default().push(value.into());
    }
}

/// Field mapping and output bound for a ranking call
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Search field identifier to ordered document fields
    pub fields: BTreeMap<String, Vec<String>>,
    pub suggestion_count: usize,
}

impl RankingConfig {
    pub fn new(fields: BTreeMap<String, Vec<String>>, suggestion_count: usize) -> Self {
        Self {
            fields,
            suggestion_count,
        }
    }

    /// Fields searched for `search_field`; unknown or absent means all of them
    pub fn select_fields(&self, search_field: Option<&str>) -> Vec<&str> {
        if let Some(fields) = search_field.and_then(|f| self.fields.get(f)) {
            return fields.iter().map(String::as_str).collect();
        }

        let mut seen = HashSet::new();
        self.fields
            .values()
            .flatten()
            .map(String::as_str)
            .filter(|f| seen.insert(*f))
            .collect()
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self::new(BTreeMap::new(), DEFAULT_SUGGESTION_COUNT)
    }
}

/// A scored document, built per ranking call
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionCandidate {
    pub terms: Vec<String>,
    pub relevance: f64,
    /// Query tokens found in at least one term
    pub any_score: usize,
    /// Query tokens found in every term
    pub all_score: usize,
}

/// Lowercase, trim non-word characters at both ends, split on whitespace
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .trim_matches(|c: char| !is_word_char(c))
        .split_whitespace()
        .map(String::from)
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Strip markup and lowercase a field value
pub fn sanitize(value: &str) -> String {
    if !value.contains(['<', '&']) {
        return value.trim().to_lowercase();
    }
    let mut text = fragment_text(value);
    // Entity-escaped markup decodes to tags written as text; strip those too
    if text.contains('<') {
        text = fragment_text(&text);
    }
    text.trim().to_lowercase()
}

fn fragment_text(value: &str) -> String {
    Html::parse_fragment(value).root_element().text().collect()
}

/// Sanitized, order-preserving distinct values of `fields` in `document`
pub fn document_terms(document: &CandidateDocument, fields: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    fields
        .iter()
        .filter_map(|f| document.fields.get(*f))
        .flatten()
        .map(|v| sanitize(v))
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// Score one document; `None` if no query token matches any of its terms
pub fn score_document(
    document: &CandidateDocument,
    fields: &[&str],
    tokens: &[String],
) -> Option<SuggestionCandidate> {
    let terms = document_terms(document, fields);

    let any_score = tokens
        .iter()
        .filter(|qt| terms.iter().any(|t| t.contains(qt.as_str())))
        .count();
    if any_score == 0 {
        return None;
    }

    let all_score = tokens
        .iter()
        .filter(|qt| terms.iter().all(|t| t.contains(qt.as_str())))
        .count();

    Some(SuggestionCandidate {
        terms,
        relevance: document.relevance,
        any_score,
        all_score,
    })
}

/// Composite ordering: all-matched, then any-matched, then relevance, then terms
fn compare_candidates(a: &SuggestionCandidate, b: &SuggestionCandidate, token_count: usize) -> Ordering {
    (token_count - a.all_score)
        .cmp(&(token_count - b.all_score))
        .then_with(|| (token_count - a.any_score).cmp(&(token_count - b.any_score)))
        .then_with(|| (-a.relevance).total_cmp(&-b.relevance))
        .then_with(|| a.terms.cmp(&b.terms))
}

fn match_count(term: &str, tokens: &[String]) -> usize {
    tokens.iter().filter(|qt| term.contains(qt.as_str())).count()
}

/// Surviving candidates in ranked order
pub fn rank_candidates(
    query: &str,
    search_field: Option<&str>,
    documents: &[CandidateDocument],
    config: &RankingConfig,
) -> Vec<SuggestionCandidate> {
    let tokens = tokenize(query);
    let fields = config.select_fields(search_field);

    let mut candidates: Vec<SuggestionCandidate> = documents
        .iter()
        .filter_map(|d| score_document(d, &fields, &tokens))
        .collect();

    candidates.sort_by(|a, b| compare_candidates(a, b, tokens.len()));
    candidates
}

/// Rank `documents` against `query` and return the suggested terms
pub fn rank(
    query: &str,
    search_field: Option<&str>,
    documents: &[CandidateDocument],
    config: &RankingConfig,
) -> Vec<SuggestionTerm> {
    let tokens = tokenize(query);
    let token_count = tokens.len();
    let candidates = rank_candidates(query, search_field, documents, config);

    let mut seen = HashSet::new();
    let mut terms: Vec<String> = candidates
        .into_iter()
        .flat_map(|c| c.terms)
        .filter(|t| seen.insert(t.clone()))
        .filter(|t| match_count(t, &tokens) > 0)
        .collect();

    // Stable: ties keep their ranked order
    terms.sort_by_key(|t| token_count - match_count(t, &tokens));

    terms
        .into_iter()
        .take(config.suggestion_count)
        .map(SuggestionTerm::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RankingConfig {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), vec!["title".to_string()]);
        fields.insert(
            "subject".to_string(),
            vec!["subject".to_string(), "genre".to_string()],
        );
        RankingConfig::new(fields, DEFAULT_SUGGESTION_COUNT)
    }

    fn titled(title: &str, relevance: f64) -> CandidateDocument {
        CandidateDocument::new(relevance).with_value("title", title)
    }

    fn terms(output: &[SuggestionTerm]) -> Vec<&str> {
        output.iter().map(|s| s.term.as_str()).collect()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("  \"History of ROME!\" "), vec!["history", "of", "rome"]);
        assert_eq!(tokenize("don't stop"), vec!["don't", "stop"]);
        assert_eq!(tokenize("__init__"), vec!["__init__"]);
        assert!(tokenize("?!").is_empty());
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_sanitize_strips_markup() {
        assert_eq!(sanitize("<b>Cats</b> &amp; Dogs"), "cats & dogs");
        assert_eq!(sanitize("Plain Title"), "plain title");
        assert_eq!(sanitize("<highlight>Rome</highlight>"), "rome");
    }

    #[test]
    fn test_sanitize_decodes_escaped_markup() {
        let author = "&lt;searchLink fieldCode=&quot;AR&quot; term=&quot;%22Beard%2C+Mary%22&quot;&gt;Beard, Mary&lt;/searchLink&gt;";
        assert_eq!(sanitize(author), "beard, mary");
        assert_eq!(sanitize("Rome &lt;i&gt;Antiquity&lt;/i&gt;"), "rome antiquity");
        assert_eq!(sanitize("a &lt; b"), "a < b");
    }

    #[test]
    fn test_attribute_text_never_matches() {
        let document = CandidateDocument::new(1.0).with_value(
            "title",
            "&lt;searchLink fieldCode=&quot;AR&quot;&gt;Beard, Mary&lt;/searchLink&gt;",
        );
        let config = config();

        assert!(rank("field", None, &[document.clone()], &config).is_empty());
        assert_eq!(terms(&rank("beard", None, &[document], &config)), vec!["beard, mary"]);
    }

    #[test]
    fn test_select_fields() {
        let config = config();
        assert_eq!(config.select_fields(Some("title")), vec!["title"]);
        assert_eq!(config.select_fields(Some("subject")), vec!["subject", "genre"]);
        assert_eq!(config.select_fields(Some("nope")), vec!["subject", "genre", "title"]);
        assert_eq!(config.select_fields(None), vec!["subject", "genre", "title"]);
    }

    #[test]
    fn test_only_matching_documents_survive() {
        let documents = vec![titled("History of Rome", 1.0), titled("Mystery Novel", 2.0)];
        let output = rank("hist", None, &documents, &config());

        assert_eq!(terms(&output), vec!["history of rome"]);
        assert!(output[0].term.contains("hist"));
        assert_eq!(output[0].weight, 1);
        assert_eq!(output[0].payload, "");
    }

    #[test]
    fn test_scores() {
        let document = CandidateDocument::new(0.5)
            .with_value("title", "Roman history")
            .with_value("subject", "Rome -- History");
        let tokens = tokenize("rom hist");
        let candidate = score_document(&document, &["title", "subject"], &tokens).unwrap();

        assert_eq!(candidate.any_score, 2);
        assert_eq!(candidate.all_score, 2);
        assert_eq!(candidate.terms, vec!["roman history", "rome -- history"]);

        let document = document.with_value("genre", "Biography");
        let candidate =
            score_document(&document, &["title", "subject", "genre"], &tokens).unwrap();
        assert_eq!(candidate.any_score, 2);
        assert_eq!(candidate.all_score, 0);

        assert!(score_document(&titled("Cooking", 1.0), &["title"], &tokens).is_none());
    }

    #[test]
    fn test_relevance_orders_fully_matching_candidates() {
        let documents = vec![
            titled("Rome: a history", 1.0),
            titled("History of Rome", 9.0),
            titled("Rome and its history", 5.0),
        ];
        let ranked = rank_candidates("rome history", None, &documents, &config());

        let relevances: Vec<f64> = ranked.iter().map(|c| c.relevance).collect();
        assert_eq!(relevances, vec![9.0, 5.0, 1.0]);
    }

    #[test]
    fn test_all_matched_beats_relevance() {
        let documents = vec![
            titled("Rome travel guide", 100.0),
            titled("Rome history", 1.0),
        ];
        let output = rank("rome history", None, &documents, &config());
        assert_eq!(terms(&output), vec!["rome history", "rome travel guide"]);
    }

    #[test]
    fn test_terms_tie_break_is_lexicographic() {
        let documents = vec![titled("cats b", 1.0), titled("cats a", 1.0)];
        let output = rank("cats", None, &documents, &config());
        assert_eq!(terms(&output), vec!["cats a", "cats b"]);
    }

    #[test]
    fn test_dedup_and_unrelated_terms_filtered() {
        let documents = vec![
            CandidateDocument::new(2.0)
                .with_value("title", "Dogs")
                .with_value("subject", "Pets"),
            CandidateDocument::new(1.0)
                .with_value("title", "<i>Dogs</i>")
                .with_value("genre", "Fiction"),
        ];
        let output = rank("dog", None, &documents, &config());
        assert_eq!(terms(&output), vec!["dogs"]);
    }

    #[test]
    fn test_terms_matching_more_tokens_first() {
        let document = CandidateDocument::new(1.0)
            .with_value("title", "Jazz")
            .with_value("subject", "Jazz history")
            .with_value("genre", "History");
        let output = rank("jazz history", None, &[document], &config());
        assert_eq!(terms(&output), vec!["jazz history", "history", "jazz"]);
    }

    #[test]
    fn test_search_field_restricts_fields() {
        let document = CandidateDocument::new(1.0)
            .with_value("title", "Ocean life")
            .with_value("subject", "Oceanography");
        let output = rank("ocean", Some("subject"), &[document], &config());
        assert_eq!(terms(&output), vec!["oceanography"]);
    }

    #[test]
    fn test_output_is_bounded() {
        let documents: Vec<_> = (0..20)
            .map(|i| titled(&format!("Poetry volume {}", i), i as f64))
            .collect();
        let mut config = config();
        assert_eq!(rank("poetry", None, &documents, &config).len(), 7);

        config.suggestion_count = 3;
        let output = rank("poetry", None, &documents, &config);
        assert_eq!(terms(&output), vec!["poetry volume 19", "poetry volume 18", "poetry volume 17"]);
    }

    #[test]
    fn test_empty_query_yields_nothing() {
        let documents = vec![titled("Anything", 1.0)];
        assert!(rank("", None, &documents, &config()).is_empty());
        assert!(rank("  ...  ", None, &documents, &config()).is_empty());
    }

    #[test]
    fn test_deterministic_and_unique() {
        let documents = vec![
            titled("Art of war", 3.0),
            titled("Art history", 3.0),
            CandidateDocument::new(3.0)
                .with_value("title", "Art history")
                .with_value("subject", "Modern art"),
            titled("Artificial intelligence", 0.5),
            titled("War and peace", 2.0),
        ];
        let config = config();
        let first = rank("art war", None, &documents, &config);

        for _ in 0..10 {
            assert_eq!(rank("art war", None, &documents, &config), first);
        }

        let unique: HashSet<&str> = first.iter().map(|s| s.term.as_str()).collect();
        assert_eq!(unique.len(), first.len());
        assert_eq!(first[0].term, "art of war");
    }
}
