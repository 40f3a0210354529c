//! Inventory (ILS) pass-through client
//!
//! Holdings and availability come straight from the Firehose service. There
//! is no ranking here: failures are reported with the backend's own text.

use crate::config::InventorySettings;
use crate::network::{
    ErrorKind, ErrorRecord, ErrorSchema, HttpMethod, Request, Response, TransportClient, TransportError,
};
use anyhow::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Why an inventory call produced no data
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub record: ErrorRecord,
    /// Body of the failed response, when one arrived
    pub body: Option<String>,
}

impl Diagnostic {
    /// Diagnostic for a failed response; `None` if it succeeded
    pub fn from_response(response: &Response) -> Option<Self> {
        let record = response.error()?.clone();
        Some(Self {
            record,
            body: response.raw_body().map(String::from),
        })
    }

    /// Backend text verbatim, or the normalized message when there is none
    pub fn text(&self) -> &str {
        match self.body.as_deref() {
            Some(body) if !body.trim().is_empty() => body,
            _ => self.record.display_message(),
        }
    }
}

impl From<TransportError> for Diagnostic {
    fn from(err: TransportError) -> Self {
        let record = match err.record() {
            Some(record) => record.clone(),
            None => ErrorRecord::new(ErrorKind::Unknown, err.to_string()),
        };
        Self { record, body: None }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Client for the inventory service
#[derive(Clone)]
pub struct InventoryClient {
    client: Arc<TransportClient>,
}

impl InventoryClient {
    pub fn new(client: Arc<TransportClient>) -> Self {
        Self { client }
    }

    pub fn from_settings(settings: &InventorySettings) -> Result<Self> {
        let client = TransportClient::new("inventory", &settings.client, ErrorSchema::Firehose)?;
        Ok(Self::new(Arc::new(client)))
    }

    fn request<'a, I>(&self, path: I) -> Request
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.client
            .request()
            .segments(path.into_iter().filter(|s| !s.is_empty()))
    }

    /// Fetch a resource
    ///
    /// Every failure is absorbed into the [`Diagnostic`] of this call, never
    /// raised as a transport error.
    pub async fn get<'a, I>(&self, path: I) -> Result<Value, Diagnostic>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let request = self.request(path);
        let response = self.client.fetch(HttpMethod::Get, &request).await.map_err(|e| {
            debug!("inventory: read failed: {}", e);
            Diagnostic::from(e)
        })?;

        match Diagnostic::from_response(&response) {
            Some(diagnostic) => Err(diagnostic),
            None => Ok(response.parsed_body().cloned().unwrap_or(Value::Null)),
        }
    }

    /// Send a JSON body; network failures are returned to the caller
    ///
    /// An HTTP error status comes back as a failed [`Response`]; see
    /// [`Diagnostic::from_response`].
    pub async fn post<'a, I>(&self, path: I, body: Value) -> Result<Response, TransportError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let request = self.request(path).json(body);
        self.client.write(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendSettings;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn inventory(base_url: &str) -> InventoryClient {
        let mut settings = InventorySettings::default();
        settings.client = BackendSettings {
            cache: settings.client.cache.clone(),
            ..BackendSettings::with_base_url(base_url)
        };
        settings.client.retry.interval_ms = 1;
        settings.client.retry.randomness_factor = 0.0;
        InventoryClient::from_settings(&settings).unwrap()
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/", port)
    }

    #[tokio::test]
    async fn test_get_holdings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/b1234"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"status": "on shelf"}]})))
            .expect(2)
            .mount(&server)
            .await;

        let inventory = inventory(&server.uri());
        let body = inventory.get(["items", "b1234"]).await.unwrap();
        assert_eq!(body["items"][0]["status"], "on shelf");

        // Inventory responses are not cached
        assert!(inventory.get(["items", "b1234"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_each_get_keeps_its_own_diagnostic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/a"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No such item: a"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "b"})))
            .mount(&server)
            .await;

        let inventory = inventory(&server.uri());
        let (a, b) = tokio::join!(inventory.get(["items", "a"]), inventory.get(["items", "b"]));

        let diagnostic = a.unwrap_err();
        assert_eq!(diagnostic.text(), "No such item: a");
        assert_eq!(diagnostic.record.status, Some(404));
        assert_eq!(b.unwrap()["id"], "b");

        // A later success does not erase what the failed call reported
        assert!(inventory.get(["items", "b"]).await.is_ok());
        assert_eq!(diagnostic.to_string(), "No such item: a");
    }

    #[tokio::test]
    async fn test_post_failure_returns_backend_text_verbatim() {
        let server = MockServer::start().await;
        let text = "Patron record 42 is blocked: fines exceed limit";
        Mock::given(method("POST"))
            .and(path("/requests"))
            .and(body_json(json!({"item": "b1234"})))
            .respond_with(ResponseTemplate::new(422).set_body_string(text))
            .expect(1)
            .mount(&server)
            .await;

        let inventory = inventory(&server.uri());
        let response = inventory.post(["requests"], json!({"item": "b1234"})).await.unwrap();

        assert!(!response.is_success());
        let diagnostic = Diagnostic::from_response(&response).unwrap();
        assert_eq!(diagnostic.text(), text);
    }

    #[tokio::test]
    async fn test_network_failure() {
        let inventory = inventory(&closed_port_url());

        let err = inventory.post(["requests"], json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);

        let diagnostic = inventory.get(["items"]).await.unwrap_err();
        assert_eq!(diagnostic.record.kind, ErrorKind::Network);
        assert_eq!(diagnostic.text(), "no result");
    }
}
