//! Conversation responder: the external model that writes the listener's
//! replies.
//!
//! `Responder` is object-safe so the service can hold any backend behind an
//! `Arc<dyn Responder>`. `GeminiResponder` talks to Google's
//! `generateContent` endpoint; tests substitute a scripted fake.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One entry of the prompt sequence sent to the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream refused the prompt: {0}")]
    Blocked(String),
}

pub trait Responder: Send + Sync {
    /// Produce one reply for the given prompt sequence. A blank reply is
    /// not an error; callers decide what to show instead.
    fn respond<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<String, ResponderError>>;
}

// -- Gemini --

pub struct GeminiResponder {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiResponder {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate(&self, turns: &[Turn]) -> Result<String, ResponderError> {
        let request = GenerateRequest::from_turns(turns);
        debug!(model = %self.model, turns = turns.len(), "Requesting reply");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResponderError::Status { status: status.as_u16(), body });
        }

        let body: GenerateResponse = response.json().await?;
        body.into_text()
    }
}

impl Responder for GeminiResponder {
    fn respond<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<String, ResponderError>> {
        Box::pin(self.generate(turns))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GenerateRequest {
    /// System turns are merged into `systemInstruction`; the rest keep their
    /// order as `user` / `model` contents.
    fn from_turns(turns: &[Turn]) -> Self {
        let system: Vec<Part> = turns
            .iter()
            .filter(|t| t.role == TurnRole::System)
            .map(|t| Part { text: t.content.clone() })
            .collect();

        let contents = turns
            .iter()
            .filter_map(|t| {
                let role = match t.role {
                    TurnRole::System => return None,
                    TurnRole::User => "user",
                    TurnRole::Assistant => "model",
                };
                Some(Content {
                    role: Some(role.to_string()),
                    parts: vec![Part { text: t.content.clone() }],
                })
            })
            .collect();

        Self {
            system_instruction: (!system.is_empty()).then(|| Content { role: None, parts: system }),
            contents,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, ResponderError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ResponderError::Blocked(reason));
        }

        Ok(self
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default())
    }
}
