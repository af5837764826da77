//! Inference Providers
//!
//! HTTP clients for Ollama and OpenAI-compatible completion services, sharing
//! one timeout and error classification.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::InferenceError;

/// Sampling options forwarded to the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            temperature: 0.1,
            max_tokens: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub prompt: String,
    pub options: InferenceOptions,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>, options: InferenceOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub text: String,
}

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn generate(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError>;

    fn name(&self) -> &str {
        "inference"
    }
}

fn build_client(timeout: Duration) -> Result<Client, InferenceError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| InferenceError::Connection(e.to_string()))
}

/// Reads the body of a non-2xx response into an `Http` error
async fn check_status(res: reqwest::Response, timeout: Duration) -> Result<reqwest::Response, InferenceError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res
        .text()
        .await
        .map_err(|e| InferenceError::from_reqwest(e, timeout))?;
    Err(InferenceError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Ollama `/api/generate`, non-streaming
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl InferenceProvider for OllamaProvider {
    async fn generate(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let body = json!({
            "model": request.options.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.options.temperature,
                "num_predict": request.options.max_tokens,
            },
        });

        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        debug!("POST {}", url);
        let res = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(e, self.timeout))?;
        let res = check_status(res, self.timeout).await?;
        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| InferenceError::from_reqwest(e, self.timeout))?;

        let text = json["response"]
            .as_str()
            .ok_or_else(|| InferenceError::InvalidResponse("missing 'response' field".to_string()))?;
        Ok(InferenceResponse { text: text.to_string() })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Any server exposing `/chat/completions`
pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, InferenceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            api_key,
            timeout,
        })
    }
}

#[async_trait]
impl InferenceProvider for OpenAICompatibleProvider {
    async fn generate(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let body = json!({
            "model": request.options.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.options.temperature,
            "max_tokens": request.options.max_tokens,
        });

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(e, self.timeout))?;
        let res = check_status(res, self.timeout).await?;
        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| InferenceError::from_reqwest(e, self.timeout))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| InferenceError::InvalidResponse("missing choices[0].message.content".to_string()))?;
        Ok(InferenceResponse {
            text: content.to_string(),
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_is_connection_error() {
        // port 9 (discard) is not expected to serve HTTP
        let provider = OllamaProvider::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = provider
            .generate(InferenceRequest::new("hi", InferenceOptions::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Connection(_) | InferenceError::Timeout(_)));
    }

    #[test]
    fn test_request_serializes() {
        let request = InferenceRequest::new("prompt", InferenceOptions::default());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "prompt");
        assert_eq!(json["options"]["max_tokens"], 256);
    }
}
