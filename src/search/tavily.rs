//! Tavily search API client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SearchError, SearchProvider, SearchResult};

/// Default Tavily API base URL
pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";

#[derive(Clone)]
pub struct TavilyClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let endpoint = format!("{}/search", self.base_url);
        debug!(query, max_results, "Tavily search");

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                max_results,
                search_depth: "advanced",
            })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SearchError::Api {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }

        let mut parsed: SearchResponse = serde_json::from_str(&text)?;
        // The provider treats max_results as a hint
        parsed.results.truncate(max_results);
        Ok(parsed.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn spawn_tavily(status: StatusCode) -> String {
        let app = Router::new().route(
            "/search",
            post(move |Json(body): Json<Value>| async move {
                let results: Vec<Value> = (0..8)
                    .map(|i| {
                        json!({
                            "title": format!("hit {}", i),
                            "url": format!("https://example.com/{}", i),
                            "content": format!("{} snippet {}", body["query"].as_str().unwrap_or(""), i),
                            "score": 0.9
                        })
                    })
                    .collect();
                (status, Json(json!({"query": body["query"], "results": results})))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_results_are_capped() {
        let base = spawn_tavily(StatusCode::OK).await;
        let client = TavilyClient::new(base, "tvly-test", Duration::from_secs(5)).unwrap();

        let results = client.search("rust", 5).await.unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].url, "https://example.com/0");
        assert_eq!(results[0].content, "rust snippet 0");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let base = spawn_tavily(StatusCode::UNAUTHORIZED).await;
        let client = TavilyClient::new(base, "bad", Duration::from_secs(5)).unwrap();

        let err = client.search("rust", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Api { status: 401, .. }));
    }
}
