//! LLM keyword refinement
//!
//! After a page is accepted, its record can be sent to a language model that
//! proposes keywords for the rest of the crawl. This is best-effort feedback:
//! failures leave the current keywords in place.

use crate::config::RefinementConfig;
use crate::content::ContentRecord;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Timeout for one completion request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from a keyword refinement call
#[derive(Debug, Error)]
pub enum RefineError {
    #[error("refinement request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("refinement endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid API key header")]
    InvalidApiKey,

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Boxed future returned by [`KeywordRefiner::refine`]
pub type RefineFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>, RefineError>> + Send + 'a>>;

/// Proposes keywords from an accepted record
pub trait KeywordRefiner: Send + Sync {
    fn refine<'a>(&'a self, record: &'a ContentRecord, instruction: &'a str) -> RefineFuture<'a>;
}

/// Refiner backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiRefiner {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiRefiner {
    pub fn new(config: &RefinementConfig) -> Result<Self, RefineError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    async fn request_keywords(
        &self,
        record: &ContentRecord,
        instruction: &str,
    ) -> Result<Vec<String>, RefineError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| RefineError::InvalidApiKey)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let prompt = build_prompt(record, instruction)?;
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a helpful assistant.",
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RefineError::Status { status, body });
        }

        let parsed: ChatResponse = resp.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(parse_keywords(&answer))
    }
}

impl KeywordRefiner for OpenAiRefiner {
    fn refine<'a>(&'a self, record: &'a ContentRecord, instruction: &'a str) -> RefineFuture<'a> {
        Box::pin(self.request_keywords(record, instruction))
    }
}

fn build_prompt(record: &ContentRecord, instruction: &str) -> Result<String, serde_json::Error> {
    Ok(format!(
        "{}\nInput Data: {}\nPlease provide relevant keywords based on the given input data in json format.",
        instruction,
        serde_json::to_string(record)?
    ))
}

/// Reads `{"keywords": [...]}` from a model reply
///
/// Anything else yields an empty list.
pub fn parse_keywords(answer: &str) -> Vec<String> {
    serde_json::from_str::<KeywordReply>(answer.trim())
        .map(|reply| reply.keywords)
        .unwrap_or_default()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct KeywordReply {
    #[serde(default)]
    keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> ContentRecord {
        vec![("AI News", vec!["AI is transforming industries"])]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            parse_keywords(r#"{"keywords": ["ai", "robotics"]}"#),
            vec!["ai", "robotics"]
        );
        assert!(parse_keywords("Sure! Here are some keywords: ai").is_empty());
        assert!(parse_keywords(r#"{"topics": ["ai"]}"#).is_empty());
    }

    #[test]
    fn test_prompt_embeds_record() {
        let prompt = build_prompt(&record(), "Provide keywords.").unwrap();
        assert!(prompt.starts_with("Provide keywords.\nInput Data: "));
        assert!(prompt.contains(r#"{"AI News":["AI is transforming industries"]}"#));
    }

    #[tokio::test]
    async fn test_refine_against_mock_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "{\"keywords\": [\"machine learning\"]}"}}
                ]
            })))
            .mount(&server)
            .await;

        let refiner = OpenAiRefiner::new(&RefinementConfig {
            api_key: "sk-test".to_string(),
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            ..RefinementConfig::default()
        })
        .unwrap();

        let keywords = refiner.refine(&record(), "Provide keywords.").await.unwrap();
        assert_eq!(keywords, vec!["machine learning"]);
    }

    #[tokio::test]
    async fn test_refine_surfaces_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let refiner = OpenAiRefiner::new(&RefinementConfig {
            api_key: "sk-test".to_string(),
            endpoint: server.uri(),
            ..RefinementConfig::default()
        })
        .unwrap();

        let err = refiner.refine(&record(), "x").await.unwrap_err();
        assert!(matches!(err, RefineError::Status { status: 401, .. }));
    }
}
