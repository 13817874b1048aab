//! HTTP client helpers for tests.

use std::time::Duration;

use serde::Deserialize;
use tally::sample::Sample;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unexpected status {0}: {1}")]
    UnexpectedStatus(u16, String),
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadyResponse {
    pub status: String,
    pub pool: String,
    pub workers: usize,
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, TestClientError> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;

        match resp.status().as_u16() {
            200 => Ok(resp.json().await?),
            400 => Err(TestClientError::BadRequest(resp.text().await?)),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(TestClientError::UnexpectedStatus(status, body))
            }
        }
    }

    pub async fn verify(&self, sample: &Sample) -> Result<Sample, TestClientError> {
        self.post("/v1/verify", sample).await
    }

    pub async fn verify_batch(&self, samples: &[Sample]) -> Result<Vec<Sample>, TestClientError> {
        self.post("/v1/verify/batch", &samples).await
    }

    pub async fn dispatch(&self, kind: &str, sample: &Sample) -> Result<Sample, TestClientError> {
        self.post(&format!("/v1/dispatch/{}", kind), sample).await
    }

    pub async fn stats(&self) -> Result<serde_json::Value, TestClientError> {
        Ok(self.client.get(self.url("/v1/stats")).send().await?.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse, TestClientError> {
        Ok(self.client.get(self.url("/healthz")).send().await?.json().await?)
    }

    pub async fn ready(&self) -> Result<(u16, ReadyResponse), TestClientError> {
        let resp = self.client.get(self.url("/ready")).send().await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }
}
