//! Settings structures for catalog-lens configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default Solr core used by the catalog lens
pub const DEFAULT_SOLR_URL: &str = "http://127.0.0.1:8983/solr/blacklight-core";

/// Default EDS proxy used by the articles lens
pub const DEFAULT_EDS_URL: &str = "http://127.0.0.1:8081/eds";

/// Default Firehose (ILS) endpoint used by the inventory lens
pub const DEFAULT_FIREHOSE_URL: &str = "http://127.0.0.1:8080/";

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub suggest: SuggestSettings,
    pub catalog: CatalogSettings,
    pub articles: ArticlesSettings,
    pub inventory: InventorySettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("CATALOG_LENS_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("CATALOG_LENS_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("CATALOG_LENS_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Ok(val) = std::env::var("SOLR_URL") {
            self.catalog.client.base_url = val;
        }
        if let Ok(val) = std::env::var("EDS_URL") {
            self.articles.client.base_url = val;
        }
        if let Ok(val) = std::env::var("FIREHOSE_URL") {
            self.inventory.client.base_url = val;
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug mode
    pub debug: bool,
    /// Instance name reported by the status endpoint
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "catalog-lens".to_string(),
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8888,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

/// Autosuggest behavior shared by every lens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestSettings {
    /// Maximum number of suggested terms returned
    pub suggestion_count: usize,
    /// Search field value meaning "search across all fields"
    pub all_fields_value: String,
}

impl Default for SuggestSettings {
    fn default() -> Self {
        Self {
            suggestion_count: 7,
            all_fields_value: "all_fields".to_string(),
        }
    }
}

/// Connection, retry and cache settings for a single backend client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// Read timeout in seconds
    pub timeout: f64,
    /// Connect timeout in seconds
    pub open_timeout: f64,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Retry tuning
    pub retry: RetrySettings,
    /// Response cache tuning
    pub cache: CacheSettings,
    /// Substring that marks an unstructured internal failure body
    pub internal_error_marker: String,
    /// Message templates applied to normalized error messages, first match wins
    pub message_templates: Vec<MessageTemplateConfig>,
}

impl BackendSettings {
    /// Settings for a backend reachable at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: 5.0,
            open_timeout: 2.0,
            pool_max_idle_per_host: 20,
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            internal_error_marker: "Internal Server Error".to_string(),
            message_templates: vec![],
        }
    }
}

/// Retry tuning for a backend client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base wait before the first retry, in milliseconds
    pub interval_ms: u64,
    /// Jitter applied to each wait, in [0, 1]
    pub randomness_factor: f64,
    /// Growth of the wait per attempt, > 1
    pub backoff_factor: f64,
    /// Upper bound for any single wait, in milliseconds
    pub retry_after_limit_ms: Option<u64>,
    /// Retry connection failures and timeouts
    pub retry_network_errors: bool,
    /// Retry any 5xx response
    pub retry_server_errors: bool,
    /// Additional status codes worth retrying
    pub retry_statuses: Vec<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval_ms: 50,
            randomness_factor: 0.5,
            backoff_factor: 2.0,
            retry_after_limit_ms: Some(2_000),
            retry_network_errors: true,
            retry_server_errors: true,
            retry_statuses: vec![429],
        }
    }
}

/// Response cache tuning for a backend client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache successful GET responses
    pub enabled: bool,
    /// Entry lifetime in seconds; absent means entries never expire
    pub ttl_seconds: Option<u64>,
    /// Optional bound on the number of entries
    pub max_entries: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: Some(300),
            max_entries: None,
        }
    }
}

/// One entry of an error message template table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplateConfig {
    /// Literal substring (or regex when `regex` is set); absent matches everything
    pub pattern: Option<String>,
    /// Interpret `pattern` as a regular expression
    pub regex: bool,
    /// Replacement text; `{message}` is substituted with the normalized message
    pub template: String,
}

/// Catalog lens: Solr with a native suggester
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub client: BackendSettings,
    /// Request handler serving suggestions
    pub suggest_handler: String,
    /// Top-level response key holding suggester output
    pub suggest_path: String,
    /// Suggester (dictionary) name
    pub suggester_name: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        let mut client = BackendSettings::with_base_url(DEFAULT_SOLR_URL);
        client.internal_error_marker = "java.lang.".to_string();
        Self {
            client,
            suggest_handler: "suggest".to_string(),
            suggest_path: "suggest".to_string(),
            suggester_name: "mySuggester".to_string(),
        }
    }
}

/// Articles lens: EDS records ranked locally
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticlesSettings {
    pub client: BackendSettings,
    /// Search field identifier to ordered record fields
    pub fields: BTreeMap<String, Vec<String>>,
    /// Search field identifier to EDS field code
    pub field_codes: BTreeMap<String, String>,
    /// Records requested per suggestion lookup
    pub results_per_page: u32,
}

impl Default for ArticlesSettings {
    fn default() -> Self {
        let fields = [
            ("title", vec!["Title"]),
            ("author", vec!["Author"]),
            ("subject", vec!["Subject", "SubjectGeographic"]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
        .collect();

        let field_codes = [("title", "TI"), ("author", "AU"), ("subject", "SU")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            client: BackendSettings::with_base_url(DEFAULT_EDS_URL),
            fields,
            field_codes,
            results_per_page: 20,
        }
    }
}

/// Inventory lens: Firehose ILS pass-through
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    pub client: BackendSettings,
}

impl Default for InventorySettings {
    fn default() -> Self {
        let mut client = BackendSettings::with_base_url(DEFAULT_FIREHOSE_URL);
        // Holdings change under us; never serve them stale.
        client.cache.enabled = false;
        Self { client }
    }
}
