//! `reqwest`-backed [`HfClient`] implementation talking to HuggingFace
//! Inference API-shaped endpoints: a feature-extraction model for
//! embeddings and a text-classification model for toxicity, mirroring the
//! donor crate's `providers::ollama` shape (a `reqwest::Client`-holding
//! struct implementing a trait, JSON in/out).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dendron_core::error::{DendronError, Result};
use dendron_core::hf::{HfClient, ToxicityScore};

/// Configuration for a [`HuggingFaceClient`]: base URLs of the two
/// inference endpoints plus an optional bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HuggingFaceConfig {
    /// Feature-extraction (embedding) endpoint, e.g.
    /// `https://api-inference.huggingface.co/models/sentence-transformers/all-MiniLM-L6-v2`.
    pub embedding_url: String,
    /// Toxicity-classification endpoint, e.g.
    /// `https://api-inference.huggingface.co/models/unitary/toxic-bert`.
    pub toxicity_url: String,
    /// Bearer token for the HF Inference API, if required.
    pub api_token: Option<String>,
}

impl HuggingFaceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.embedding_url.is_empty() {
            return Err(DendronError::InvalidConfiguration("embedding_url cannot be empty".into()));
        }
        if self.toxicity_url.is_empty() {
            return Err(DendronError::InvalidConfiguration("toxicity_url cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct HfRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct ToxicityLabel {
    label: String,
    score: f32,
}

/// A `reqwest::Client`-holding implementation of [`HfClient`] against the
/// HuggingFace Inference API.
pub struct HuggingFaceClient {
    config: HuggingFaceConfig,
    http_client: reqwest::Client,
}

impl HuggingFaceClient {
    pub fn new(config: HuggingFaceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            http_client: reqwest::Client::new(),
        })
    }

    fn request(&self, url: &str, text: &str) -> reqwest::RequestBuilder {
        let req = self.http_client.post(url).json(&HfRequest { inputs: text });
        match &self.config.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl HfClient for HuggingFaceClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .request(&self.config.embedding_url, text)
            .send()
            .await
            .map_err(|e| DendronError::ExternalService(format!("failed to reach embedding endpoint: {e}")))?;

        if !response.status().is_success() {
            return Err(DendronError::ExternalService(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<f32>>()
            .await
            .map_err(|e| DendronError::ExternalService(format!("failed to parse embedding response: {e}")))
    }

    async fn classify_toxicity(&self, text: &str) -> Result<ToxicityScore> {
        let response = self
            .request(&self.config.toxicity_url, text)
            .send()
            .await
            .map_err(|e| DendronError::ExternalService(format!("failed to reach toxicity endpoint: {e}")))?;

        if !response.status().is_success() {
            return Err(DendronError::ExternalService(format!(
                "toxicity endpoint returned {}",
                response.status()
            )));
        }

        let batches: Vec<Vec<ToxicityLabel>> = response
            .json()
            .await
            .map_err(|e| DendronError::ExternalService(format!("failed to parse toxicity response: {e}")))?;

        let labels = batches
            .into_iter()
            .next()
            .ok_or_else(|| DendronError::ExternalService("toxicity response had no records".into()))?;

        let mut toxicity = 0.0f32;
        let mut severe_toxicity = 0.0f32;
        for l in labels {
            match l.label.as_str() {
                "toxic" | "toxicity" | "TOXIC" => toxicity = l.score,
                "severe_toxic" | "severe_toxicity" | "SEVERE_TOXIC" => severe_toxicity = l.score,
                _ => {}
            }
        }
        Ok(ToxicityScore {
            toxicity,
            severe_toxicity,
        })
    }
}

/// A client that answers every call with a zeroed-out result instead of
/// reaching the network. Used where no HF endpoints are configured; the
/// `DEBUG_SKIP_EMBEDDING_COMPUTATION`/`DEBUG_SKIP_TOXICITY_CALCULATION`
/// flags exist for skipping enrichment deliberately, but this covers a
/// caller that never wired real endpoints in the first place.
#[derive(Debug, Clone, Default)]
pub struct NoopHfClient;

#[async_trait]
impl HfClient for NoopHfClient {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }

    async fn classify_toxicity(&self, _text: &str) -> Result<ToxicityScore> {
        Ok(ToxicityScore {
            toxicity: 0.0,
            severe_toxicity: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> HuggingFaceConfig {
        HuggingFaceConfig {
            embedding_url: format!("{}/embed", server.uri()),
            toxicity_url: format!("{}/toxicity", server.uri()),
            api_token: None,
        }
    }

    #[test]
    fn empty_embedding_url_fails_validation() {
        let config = HuggingFaceConfig {
            embedding_url: String::new(),
            toxicity_url: "http://localhost/toxicity".into(),
            api_token: None,
        };
        assert!(HuggingFaceClient::new(config).is_err());
    }

    #[tokio::test]
    async fn embed_parses_vector_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![0.1, 0.2, 0.3]))
            .mount(&server)
            .await;

        let client = HuggingFaceClient::new(config_for(&server)).unwrap();
        let embedding = client.embed("hello").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn classify_toxicity_takes_first_inner_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/toxicity"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[
                {"label": "toxic", "score": 0.8},
                {"label": "severe_toxic", "score": 0.1}
            ]])))
            .mount(&server)
            .await;

        let client = HuggingFaceClient::new(config_for(&server)).unwrap();
        let score = client.classify_toxicity("you are bad").await.unwrap();
        assert_eq!(score.toxicity, 0.8);
        assert_eq!(score.severe_toxicity, 0.1);
    }

    #[tokio::test]
    async fn non_success_status_is_an_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HuggingFaceClient::new(config_for(&server)).unwrap();
        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, DendronError::ExternalService(_)));
    }
}
