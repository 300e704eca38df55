//! Metadata-generation collaborator (image + instructions -> raw text)
//!
//! The external service speaks the OpenAI chat-completions protocol: one
//! user message carrying the instruction text and the image as a base64
//! data URL. The call is stateless per invocation; every failure mode is
//! classified into [`TaskError`] at this boundary so the worker never sees
//! a raw HTTP error.

use crate::config::VisionConfig;
use crate::error::{Error, Result, TaskError};
use crate::types::PreparedImage;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Generates unstructured metadata text for one image.
///
/// Implementations must be safe to call concurrently up to the pipeline's
/// configured in-flight cap.
#[async_trait]
pub trait MetadataGenerator: Send + Sync {
    /// One call to the external service. The returned string is the raw
    /// response text, consumed immediately by parsing and not retained.
    async fn generate(
        &self,
        image: &PreparedImage,
        instructions: &str,
    ) -> std::result::Result<String, TaskError>;
}

// ── Wire types (OpenAI chat-completions, vision content parts) ───────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// OpenAI-compatible vision client
pub struct OpenAiVision {
    client: reqwest::Client,
    config: VisionConfig,
}

impl OpenAiVision {
    /// Build a client from configuration.
    ///
    /// The per-request timeout is applied at the client level so a hung
    /// service surfaces as a `Transport` task failure, not a stuck worker.
    pub fn new(config: VisionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl MetadataGenerator for OpenAiVision {
    async fn generate(
        &self,
        image: &PreparedImage,
        instructions: &str,
    ) -> std::result::Result<String, TaskError> {
        let data_url = format!(
            "data:{};base64,{}",
            image.format.mime(),
            STANDARD.encode(&image.bytes)
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: instructions },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_completion_tokens: self.config.max_output_tokens,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            tracing::warn!(status = status.as_u16(), "metadata service returned error");
            return Err(TaskError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response.json().await?;

        let Some(choice) = body.choices.into_iter().next() else {
            return Err(TaskError::Parse { raw: String::new() });
        };

        if let Some(refusal) = choice.message.refusal {
            return Err(TaskError::Service {
                status: status.as_u16(),
                message: format!("model refused to generate metadata: {refusal}"),
            });
        }

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(TaskError::Parse { raw: String::new() }),
        }
    }
}
