//! Grounded answer synthesis
//!
//! Builds the fixed instruction plus numbered clause context, sends it to a
//! chat completion endpoint and parses the structured answer. Output that
//! cannot be parsed, or a failed call, yields [`Synthesis::Fallback`].

use crate::config::SynthesisConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const SYSTEM_PROMPT: &str = "You are an insurance policy assistant. Use only the provided context snippets to answer.
Return STRICT JSON with keys: answer (string), covered (boolean), conditions (string[]), matched_clauses (array of {snippet, score, source}), rationale (string).
If insufficient info, set covered=false and explain.";

const UNPARSEABLE_RATIONALE: &str = "unparseable model output";
const UNAVAILABLE_RATIONALE: &str = "synthesis endpoint unavailable";

/// Where a retrieved clause came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClauseSource {
    pub document_id: Option<String>,
    pub filename: Option<String>,
    pub chunk_index: Option<i64>,
}

/// One retrieved clause shown to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseContext {
    pub snippet: String,
    pub score: f32,
    pub source: ClauseSource,
}

/// A clause cited in an answer; the model may shape `source` freely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedClause {
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub source: Value,
}

impl From<&ClauseContext> for MatchedClause {
    fn from(ctx: &ClauseContext) -> Self {
        Self {
            snippet: ctx.snippet.clone(),
            score: ctx.score,
            source: serde_json::to_value(&ctx.source).unwrap_or(Value::Null),
        }
    }
}

/// Structured answer returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub covered: bool,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub matched_clauses: Vec<MatchedClause>,
    #[serde(default)]
    pub rationale: String,
}

/// Outcome of synthesis
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    /// The model returned a well-formed answer
    Structured(Answer),
    /// Degraded answer built locally; `raw` is the model text, if any
    Fallback { raw: String, answer: Answer },
}

impl Synthesis {
    pub fn answer(&self) -> &Answer {
        match self {
            Synthesis::Structured(answer) => answer,
            Synthesis::Fallback { answer, .. } => answer,
        }
    }

    pub fn into_answer(self) -> Answer {
        match self {
            Synthesis::Structured(answer) => answer,
            Synthesis::Fallback { answer, .. } => answer,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Synthesis::Fallback { .. })
    }
}

/// Chat completion backend
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Raw model text for a system instruction and user message
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Create a synthesizer based on configuration
pub fn create_synthesizer(config: &SynthesisConfig) -> Result<Arc<dyn Synthesizer>> {
    Ok(Arc::new(HttpSynthesizer::new(config)?))
}

/// User message: question, numbered clauses, output reminder
pub fn build_user_prompt(question: &str, contexts: &[ClauseContext]) -> String {
    let context_text = contexts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("Clause {} (score {:.3}):\n{}", i + 1, c.score, c.snippet))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Question: {}\n\nContext:\n{}\n\nRespond with pure JSON only.",
        question, context_text
    )
}

/// Parse model text into an answer, or fall back to the raw text
pub fn parse_answer(raw: &str, contexts: &[ClauseContext]) -> Synthesis {
    match serde_json::from_str::<Answer>(strip_code_fence(raw)) {
        Ok(answer) => Synthesis::Structured(answer),
        Err(e) => {
            debug!(error = %e, "Model output is not a structured answer");
            Synthesis::Fallback {
                raw: raw.to_string(),
                answer: fallback_answer(raw.to_string(), contexts, UNPARSEABLE_RATIONALE),
            }
        }
    }
}

/// Ask the synthesizer; never fails
pub async fn synthesize(
    synthesizer: &dyn Synthesizer,
    question: &str,
    contexts: &[ClauseContext],
) -> Synthesis {
    let user = build_user_prompt(question, contexts);
    match synthesizer.complete(SYSTEM_PROMPT, &user).await {
        Ok(raw) => parse_answer(&raw, contexts),
        Err(e) => {
            warn!(error = %e, "Answer synthesis failed, returning fallback answer");
            Synthesis::Fallback {
                raw: String::new(),
                answer: fallback_answer(
                    "The answer service is unavailable. Please try again.".to_string(),
                    contexts,
                    UNAVAILABLE_RATIONALE,
                ),
            }
        }
    }
}

fn fallback_answer(text: String, contexts: &[ClauseContext], rationale: &str) -> Answer {
    Answer {
        answer: text,
        covered: false,
        conditions: Vec::new(),
        matched_clauses: contexts.iter().map(MatchedClause::from).collect(),
        rationale: rationale.to_string(),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/v1/chat/completions` client
pub struct HttpSynthesizer {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl HttpSynthesizer {
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.backend_url)?
            .join("/v1/chat/completions")
            .map_err(|e| Error::Config(format!("Invalid synthesis backend URL: {}", e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key: config.api_key(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.temperature
        });

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Synthesis request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamUnavailable(format!(
                "Synthesis HTTP {}: {}",
                status, error_text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Malformed synthesis response: {}", e)))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
