use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::analyze;
use crate::config::Config;
use crate::error::AdapterError;
use crate::exa::{ExaClient, SearchParams};
use crate::gemini::GeminiClient;
use crate::models::ArticleResult;
use crate::registry::SourceRegistry;
use crate::translate;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SourceRegistry>,
    /// None when the corresponding API key is absent; handlers report it.
    pub gemini: Option<GeminiClient>,
    pub exa: Option<ExaClient>,
}

/// Build the app state from config, constructing adapter clients for
/// whichever API keys are present.
pub fn build_state(config: Arc<Config>) -> Result<AppState> {
    let registry = Arc::new(SourceRegistry::from_config(&config.source));

    let gemini_timeout = humantime::parse_duration(&config.gemini.timeout).context("gemini timeout")?;
    let exa_timeout = humantime::parse_duration(&config.exa.timeout).context("exa timeout")?;

    let gemini = match config.gemini_api_key() {
        Some(key) => Some(GeminiClient::new(&key, gemini_timeout)?),
        None => None,
    };
    let exa = match config.exa_api_key() {
        Some(key) => Some(ExaClient::new(&key, exa_timeout)?),
        None => None,
    };

    Ok(AppState {
        config,
        registry,
        gemini,
        exa,
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/translate", post(translate_handler))
        .route("/search", post(search_handler))
        .route("/analyze", post(analyze_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Handler-level error with a JSON body. Upstream failures map to 502,
/// boundary validation to 400, everything else to 500.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    MissingKey(&'static str),
    Adapter(AdapterError),
}

impl From<AdapterError> for ApiError {
    fn from(e: AdapterError) -> Self {
        ApiError::Adapter(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::MissingKey(name) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("missing API key: set {name} in config or environment"),
            ),
            ApiError::Adapter(e) => {
                warn!(error = %e, "adapter call failed");
                let status = if e.is_upstream() {
                    StatusCode::BAD_GATEWAY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Unwrap a JSON body, turning every extraction failure into a 400.
fn require_json<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(body)| body).map_err(|e| ApiError::BadRequest(e.body_text()))
}

#[derive(Debug, Deserialize)]
struct TranslateBody {
    topic: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    persian_query: String,
    model_used: String,
}

async fn translate_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TranslateBody>, JsonRejection>,
) -> ApiResult<Json<TranslateResponse>> {
    let body = require_json(payload)?;
    if body.topic.trim().is_empty() {
        return Err(ApiError::BadRequest("missing topic".to_string()));
    }

    let gemini = state.gemini.as_ref().ok_or(ApiError::MissingKey("GEMINI_API_KEY"))?;
    let model = &state.config.gemini.translation_model;
    let persian_query = translate::translate_topic(gemini, model, &body.topic).await?;

    Ok(Json(TranslateResponse {
        persian_query,
        model_used: model.clone(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody {
    query: String,
    #[serde(default)]
    include_domains: Vec<String>,
    num_results: Option<u32>,
    start_published_date: Option<String>,
    end_published_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<ArticleResult>,
}

async fn search_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SearchBody>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let body = require_json(payload)?;
    if body.query.trim().is_empty() {
        return Err(ApiError::BadRequest("missing query".to_string()));
    }

    let exa = state.exa.as_ref().ok_or(ApiError::MissingKey("EXA_API_KEY"))?;
    let results = exa
        .search(
            &state.registry.allowed_domains(),
            &SearchParams {
                query: &body.query,
                include_domains: &body.include_domains,
                num_results: body.num_results.unwrap_or(state.config.exa.num_results),
                start_published: body.start_published_date,
                end_published: body.end_published_date,
            },
        )
        .await?;

    Ok(Json(SearchResponse { results }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    topic: String,
    #[serde(default)]
    articles: Vec<ArticleResult>,
    #[serde(default)]
    domain_leanings: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    summary: String,
    model_used: String,
}

async fn analyze_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AnalyzeBody>, JsonRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let body = require_json(payload)?;
    if body.topic.trim().is_empty() {
        return Err(ApiError::BadRequest("missing topic".to_string()));
    }

    let gemini = state.gemini.as_ref().ok_or(ApiError::MissingKey("GEMINI_API_KEY"))?;
    let model = &state.config.gemini.analysis_model;
    let summary = analyze::analyze_articles(gemini, model, &body.topic, &body.articles, &body.domain_leanings).await?;

    Ok(Json(AnalyzeResponse {
        summary,
        model_used: model.clone(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    has_gemini_key: bool,
    has_exa_key: bool,
    gemini_translation_model: String,
    gemini_analysis_model: String,
}

/// Reports credential presence without leaking values.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        has_gemini_key: state.gemini.is_some(),
        has_exa_key: state.exa.is_some(),
        gemini_translation_model: state.config.gemini.translation_model.clone(),
        gemini_analysis_model: state.config.gemini.analysis_model.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> Config {
        toml::from_str(
            r#"
            [[source]]
            domain = "kayhan.ir"
            name = "Kayhan"
            leaning = "principlist"

            [[source]]
            domain = "sharghdaily.com"
            name = "Shargh"
            leaning = "reformist"
            "#,
        )
        .unwrap()
    }

    fn test_app(gemini_url: Option<&str>, exa_url: Option<&str>) -> Router {
        let config = Arc::new(test_config());
        let registry = Arc::new(SourceRegistry::from_config(&config.source));
        let gemini = gemini_url.map(|u| {
            GeminiClient::new("test-key", Duration::from_secs(5))
                .unwrap()
                .with_base_url(u.to_string())
        });
        let exa = exa_url.map(|u| {
            ExaClient::new("test-key", Duration::from_secs(5))
                .unwrap()
                .with_base_url(u.to_string())
        });
        build_router(AppState {
            config,
            registry,
            gemini,
            exa,
        })
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_key_presence_without_values() {
        let app = test_app(None, None);
        let (status, body) = send(app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["hasGeminiKey"], false);
        assert_eq!(body["hasExaKey"], false);
        assert_eq!(body["geminiTranslationModel"], "gemini-3-pro-preview");
    }

    #[tokio::test]
    async fn translate_returns_persian_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Nuclear Program"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "برنامه هسته‌ای" }] } }]
            })))
            .mount(&server)
            .await;

        let app = test_app(Some(&server.uri()), None);
        let (status, body) =
            send(app, Method::POST, "/translate", Some(serde_json::json!({ "topic": "Nuclear Program" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["persianQuery"], "برنامه هسته‌ای");
        assert_eq!(body["modelUsed"], "gemini-3-pro-preview");
    }

    #[tokio::test]
    async fn translate_rejects_blank_topic() {
        let app = test_app(None, None);
        let (status, body) =
            send(app, Method::POST, "/translate", Some(serde_json::json!({ "topic": "  " }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing topic");
    }

    #[tokio::test]
    async fn invalid_json_body_is_400() {
        let app = test_app(None, None);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/translate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let app = test_app(None, None);
        let (status, _) = send(app, Method::GET, "/translate", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn missing_key_is_500() {
        let app = test_app(None, None);
        let (status, body) =
            send(app, Method::POST, "/translate", Some(serde_json::json!({ "topic": "Nuclear Program" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_502() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let app = test_app(Some(&server.uri()), None);
        let (status, body) =
            send(app, Method::POST, "/translate", Some(serde_json::json!({ "topic": "Nuclear Program" }))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("429"));
    }

    #[tokio::test]
    async fn search_gates_results_to_registered_domains() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "title": "A", "url": "https://kayhan.ir/fa/news/1", "text": "متن" },
                    { "title": "B", "url": "https://unlisted-outlet.com/story", "text": "متن" }
                ]
            })))
            .mount(&server)
            .await;

        let app = test_app(None, Some(&server.uri()));
        let (status, body) = send(
            app,
            Method::POST,
            "/search",
            Some(serde_json::json!({
                "query": "برنامه هسته‌ای",
                "includeDomains": ["kayhan.ir", "unlisted-outlet.com"]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["domain"], "kayhan.ir");
    }

    #[tokio::test]
    async fn search_with_no_allowed_domain_returns_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let app = test_app(None, Some(&server.uri()));
        let (status, body) = send(
            app,
            Method::POST,
            "/search",
            Some(serde_json::json!({ "query": "x", "includeDomains": ["unlisted-outlet.com"] })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn analyze_empty_articles_short_circuits() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let app = test_app(Some(&server.uri()), None);
        let (status, body) = send(
            app,
            Method::POST,
            "/analyze",
            Some(serde_json::json!({ "topic": "Nuclear Program", "articles": [] })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], analyze::NO_ARTICLES_MESSAGE);
        assert_eq!(body["modelUsed"], "gemini-3-pro-preview");
    }
}
