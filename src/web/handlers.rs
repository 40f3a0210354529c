//! HTTP request handlers

use super::state::AppState;
use crate::autocomplete::SuggestParams;
use crate::lens::Lens;
use crate::metrics::MetricsSnapshot;
use crate::network::ErrorRecord;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

/// Per-lens client health
#[derive(Debug, Serialize)]
pub struct LensStatus {
    pub lens: Lens,
    pub base_url: String,
    pub connected: bool,
    pub last_error: Option<ErrorRecord>,
    pub metrics: MetricsSnapshot,
    pub reliability: f64,
}

/// Health check handler
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// Suggestions from every suggestable lens
pub async fn suggest_all(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> impl IntoResponse {
    Json(state.registry.suggest_all(&params).await)
}

/// Suggestions from one lens
pub async fn suggest(
    State(state): State<AppState>,
    Path(lens): Path<String>,
    Query(params): Query<SuggestParams>,
) -> Response {
    let lens = match lens.parse::<Lens>() {
        Ok(lens) if state.registry.adapter(lens).is_some() => lens,
        _ => {
            debug!("No suggestions available for lens '{}'", lens);
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("unknown lens: {}", lens)})),
            )
                .into_response();
        }
    };

    Json(state.registry.suggest(lens, &params).await).into_response()
}

/// Inventory pass-through; backend text is returned verbatim on failure
pub async fn inventory(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match state.inventory.get(path.split('/')).await {
        Ok(body) => Json(body).into_response(),
        Err(diagnostic) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": diagnostic.text()})),
        )
            .into_response(),
    }
}

/// Client status for every lens
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let lenses: Vec<LensStatus> = state
        .registry
        .lenses()
        .into_iter()
        .filter_map(|lens| {
            let client = state.registry.client(lens)?;
            Some(LensStatus {
                lens,
                base_url: client.base_url().to_string(),
                connected: client.is_connected(),
                last_error: client.last_error(),
                metrics: client.metrics().snapshot(),
                reliability: client.metrics().reliability(),
            })
        })
        .collect();

    Json(json!({
        "instance_name": state.instance_name(),
        "version": crate::VERSION,
        "lenses": lenses,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::lens::LensLoader;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(settings: Settings) -> AppState {
        let registry = LensLoader::load(&settings).unwrap();
        AppState::new(settings, registry).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_lens_is_not_found() {
        let state = state(Settings::default());
        let params = SuggestParams::new("rome");

        let response = suggest(State(state.clone()), Path("journals".into()), Query(params.clone())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Inventory has no suggestion adapter
        let response = suggest(State(state), Path("inventory".into()), Query(params)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_query_answers_without_backend() {
        let state = state(Settings::default());

        let response = suggest(State(state.clone()), Path("catalog".into()), Query(SuggestParams::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.registry.client(Lens::Catalog).unwrap().is_connected());
    }

    #[tokio::test]
    async fn test_inventory_failure_reports_backend_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/b99"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No such item: b99"))
            .mount(&server)
            .await;

        let mut settings = Settings::default();
        settings.inventory.client.base_url = server.uri();
        let state = state(settings);

        let response = inventory(State(state), Path("items/b99".into())).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "No such item: b99");
    }
}
