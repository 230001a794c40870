//! Google Gemini provider implementation
//!
//! Talks to the `generateContent` REST endpoint. Conversation turns map to
//! `user`/`model` contents, the system prompt travels as
//! `systemInstruction`, and audio or image payloads are sent inline as
//! base64 `inlineData` parts next to a short instruction.

use crate::config::ModelConfig;
use crate::error::{FinbotError, Result};
use crate::memory::{Role, Turn};
use crate::providers::{CompletionResponse, Provider, TokenUsage};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Instruction sent with audio payloads
pub const TRANSCRIBE_PROMPT: &str = "Transcribe this audio to text.";

/// Instruction sent with image payloads
pub const OCR_PROMPT: &str = "Extract the text from this image using OCR.";

/// Gemini provider
///
/// Holds a pooled HTTP client and the API key; cheap to share behind an `Arc`.
pub struct GeminiProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    api_base: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    ///
    /// # Arguments
    ///
    /// * `config` - Model settings (model name, API base, timeout)
    /// * `api_key` - Google API key
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &ModelConfig, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("finbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FinbotError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Gemini provider: base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            api_key: SecretString::from(api_key.to_string()),
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }

    fn convert_turns(turns: &[Turn]) -> Vec<Content> {
        turns
            .iter()
            .map(|turn| Content {
                role: match turn.role {
                    Role::Human => "user",
                    Role::Ai => "model",
                },
                parts: vec![Part::Text {
                    text: turn.content.clone(),
                }],
            })
            .collect()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                FinbotError::Provider(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned error {}: {}", status, error_text);
            return Err(FinbotError::Provider(format!(
                "Gemini returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}", e);
            FinbotError::Provider(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(FinbotError::Provider("Gemini response contained no text".to_string()).into());
        }

        let usage = body
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count));

        if let Some(usage) = usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Gemini usage"
            );
        }

        Ok(CompletionResponse { text, usage })
    }

    async fn describe_media(&self, prompt: &str, data: &[u8], mime_type: &str) -> Result<String> {
        let request = GenerateRequest {
            system_instruction: None,
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: STANDARD.encode(data),
                        },
                    },
                ],
            }],
        };
        Ok(self.generate(&request).await?.text)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn complete(&self, system: &str, turns: &[Turn]) -> Result<CompletionResponse> {
        let request = GenerateRequest {
            system_instruction: Some(SystemInstruction {
                parts: vec![Part::Text {
                    text: system.to_string(),
                }],
            }),
            contents: Self::convert_turns(turns),
        };

        tracing::debug!(
            model = %self.model,
            turns = request.contents.len(),
            "Sending Gemini completion request"
        );

        self.generate(&request).await
    }

    async fn transcribe_audio(&self, audio: &[u8], mime_type: &str) -> Result<String> {
        self.describe_media(TRANSCRIBE_PROMPT, audio, mime_type).await
    }

    async fn extract_image_text(&self, image: &[u8], mime_type: &str) -> Result<String> {
        self.describe_media(OCR_PROMPT, image, mime_type).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
