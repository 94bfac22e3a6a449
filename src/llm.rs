//! Chat model providers.
//!
//! Defines the [`ChatModel`] trait and two hosted backends:
//! - **[`GeminiModel`]** — the Google Generative Language API
//!   (`models/{model}:generateContent`), including native function calling
//!   for the tool-using agent. Key from `GEMINI_API_KEY` or `GOOGLE_API_KEY`.
//! - **[`OpenAiModel`]** — any OpenAI-compatible `/v1/chat/completions`
//!   endpoint. Key from `OPENAI_API_KEY` (optional for local servers).
//!
//! Credentials are opaque secrets: read from the environment, held in
//! memory, never persisted or echoed. Transient HTTP errors (429/5xx,
//! network) retry with the same exponential backoff as the embedding
//! providers; other client errors fail immediately.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::LlmConfig;

/// Speaker of a provider-agnostic chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Provider-agnostic chat message.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::System,
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Generation parameters for a single request.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl From<&LlmConfig> for ChatOptions {
    fn from(cfg: &LlmConfig) -> Self {
        ChatOptions {
            temperature: cfg.temperature,
            max_output_tokens: cfg.max_output_tokens,
            timeout_secs: cfg.timeout_secs,
            max_retries: cfg.max_retries,
        }
    }
}

/// A tool the model may call during an agent turn.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool arguments.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Outcome of one model step in an agent turn.
#[derive(Debug)]
pub enum ModelReply {
    Answer(String),
    ToolCall(ToolCall),
}

/// One entry in an agent transcript: plain chat, a tool call the model made,
/// or the result fed back for it.
#[derive(Debug, Clone)]
pub enum AgentMessage {
    Chat(ChatMessage),
    ToolCall(ToolCall),
    ToolResult { name: String, content: Value },
}

/// Trait for chat model providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier (e.g. `"gemini-2.5-flash-lite"`).
    fn model_name(&self) -> &str;

    /// Whether [`complete_with_tools`](ChatModel::complete_with_tools) can
    /// actually surface tool calls.
    fn supports_tools(&self) -> bool {
        false
    }

    /// Send a message list and return the model's textual reply.
    async fn complete(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String>;

    /// Agent step: send a transcript plus tool declarations; the model either
    /// answers or requests a tool call. Providers without tool support answer
    /// from the flattened transcript.
    async fn complete_with_tools(
        &self,
        transcript: &[AgentMessage],
        _tools: &[ToolSpec],
        opts: &ChatOptions,
    ) -> Result<ModelReply> {
        let messages = flatten_transcript(transcript);
        let text = self.complete(&messages, opts).await?;
        Ok(ModelReply::Answer(text))
    }
}

/// Collapse an agent transcript into plain chat messages for providers
/// without native tool calling. Tool exchanges become user-visible context.
fn flatten_transcript(transcript: &[AgentMessage]) -> Vec<ChatMessage> {
    transcript
        .iter()
        .map(|m| match m {
            AgentMessage::Chat(c) => c.clone(),
            AgentMessage::ToolCall(tc) => {
                ChatMessage::assistant(format!("[called {}({})]", tc.name, tc.arguments))
            }
            AgentMessage::ToolResult { name, content } => {
                ChatMessage::user(format!("[{} returned: {}]", name, content))
            }
        })
        .collect()
}

/// Instantiate the configured chat model.
pub fn create_model(config: &LlmConfig) -> Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiModel::new(config)?)),
        "openai" => Ok(Box::new(OpenAiModel::new(config)?)),
        other => bail!("Unknown llm provider: '{}'. Must be gemini or openai.", other),
    }
}

/// Shared request loop: retry on 429/5xx and network errors, fail fast on
/// other client errors, parse on success.
async fn post_with_retry(
    build: impl Fn() -> reqwest::RequestBuilder,
    opts: &ChatOptions,
    label: &str,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=opts.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = build().send().await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!("{} error {}: {}", label, status, body_text));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("{} error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} failed after retries", label)))
}

// ============ Gemini ============

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Chat model backed by the Google Generative Language API.
pub struct GeminiModel {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                anyhow::anyhow!("GEMINI_API_KEY (or GOOGLE_API_KEY) environment variable not set")
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            client,
        })
    }

    fn request_body(
        transcript: &[AgentMessage],
        tools: &[ToolSpec],
        opts: &ChatOptions,
    ) -> Value {
        let mut system_parts: Vec<Value> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for msg in transcript {
            match msg {
                AgentMessage::Chat(c) => match c.role {
                    ChatRole::System => system_parts.push(json!({"text": c.content})),
                    ChatRole::User => {
                        contents.push(json!({"role": "user", "parts": [{"text": c.content}]}))
                    }
                    ChatRole::Assistant => {
                        contents.push(json!({"role": "model", "parts": [{"text": c.content}]}))
                    }
                },
                AgentMessage::ToolCall(tc) => contents.push(json!({
                    "role": "model",
                    "parts": [{"functionCall": {"name": tc.name, "args": tc.arguments}}]
                })),
                AgentMessage::ToolResult { name, content } => contents.push(json!({
                    "role": "user",
                    "parts": [{"functionResponse": {"name": name, "response": {"content": content}}}]
                })),
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": opts.temperature,
                "maxOutputTokens": opts.max_output_tokens,
            },
        });

        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({"parts": system_parts});
        }

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }

        body
    }
}

/// Pull the reply out of a `generateContent` response: a function call if the
/// model requested one, otherwise the concatenated text parts.
fn parse_gemini_reply(json: &Value) -> Result<ModelReply> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let block = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|b| b.as_str());
            match block {
                Some(reason) => anyhow::anyhow!("Gemini blocked the request: {}", reason),
                None => anyhow::anyhow!("Invalid Gemini response: no candidates"),
            }
        })?;

    for part in parts {
        if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: unnamed functionCall"))?;
            let arguments = call.get("args").cloned().unwrap_or_else(|| json!({}));
            return Ok(ModelReply::ToolCall(ToolCall {
                name: name.to_string(),
                arguments,
            }));
        }
    }

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        bail!("Invalid Gemini response: empty reply");
    }

    Ok(ModelReply::Answer(text))
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn complete(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String> {
        let transcript: Vec<AgentMessage> =
            messages.iter().cloned().map(AgentMessage::Chat).collect();
        match self.complete_with_tools(&transcript, &[], opts).await? {
            ModelReply::Answer(text) => Ok(text),
            ModelReply::ToolCall(tc) => {
                bail!("Gemini requested tool '{}' with no tools offered", tc.name)
            }
        }
    }

    async fn complete_with_tools(
        &self,
        transcript: &[AgentMessage],
        tools: &[ToolSpec],
        opts: &ChatOptions,
    ) -> Result<ModelReply> {
        let url = format!(
            "{}/models/{}:generateContent",
            GEMINI_BASE_URL, self.model
        );
        let body = Self::request_body(transcript, tools, opts);

        let json = post_with_retry(
            || {
                self.client
                    .post(&url)
                    .header("x-goog-api-key", &self.api_key)
                    .header("Content-Type", "application/json")
                    .json(&body)
            },
            opts,
            "Gemini API",
        )
        .await?;

        parse_gemini_reply(&json)
    }
}

// ============ OpenAI-compatible ============

/// Chat model speaking the OpenAI `/v1/chat/completions` protocol.
///
/// Works against api.openai.com and local OpenAI-compatible servers
/// (LM Studio, Ollama) via `[llm] url`.
pub struct OpenAiModel {
    model: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let api_key = std::env::var("OPENAI_API_KEY").ok();

        // A hosted endpoint without a key will only fail later with a 401;
        // catch the misconfiguration up front.
        if base_url.starts_with("https://api.openai.com") && api_key.is_none() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

fn openai_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

fn parse_openai_reply(json: &Value) -> Result<String> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or_default();
    if content.is_empty() {
        bail!("Invalid chat completion response: empty reply");
    }
    Ok(content.to_string())
}

#[async_trait]
impl ChatModel for OpenAiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": messages
                .iter()
                .map(|m| json!({"role": openai_role(m.role), "content": m.content}))
                .collect::<Vec<_>>(),
            "temperature": opts.temperature,
            "max_tokens": opts.max_output_tokens,
            "stream": false,
        });

        let json = post_with_retry(
            || {
                let mut req = self
                    .client
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .json(&body);
                if let Some(key) = &self.api_key {
                    req = req.header("Authorization", format!("Bearer {}", key));
                }
                req
            },
            opts,
            "Chat completion",
        )
        .await?;

        parse_openai_reply(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_text_reply_parsed() {
        let json = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there"}]}
            }]
        });
        match parse_gemini_reply(&json).unwrap() {
            ModelReply::Answer(text) => assert_eq!(text, "Hello there"),
            ModelReply::ToolCall(_) => panic!("expected answer"),
        }
    }

    #[test]
    fn gemini_function_call_parsed() {
        let json = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "web_search", "args": {"query": "rust 1.80"}}}
                ]}
            }]
        });
        match parse_gemini_reply(&json).unwrap() {
            ModelReply::ToolCall(tc) => {
                assert_eq!(tc.name, "web_search");
                assert_eq!(tc.arguments["query"], "rust 1.80");
            }
            ModelReply::Answer(_) => panic!("expected tool call"),
        }
    }

    #[test]
    fn gemini_block_reason_surfaced() {
        let json = json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        });
        let err = parse_gemini_reply(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn gemini_request_shape() {
        let transcript = vec![
            AgentMessage::Chat(ChatMessage::system("be helpful")),
            AgentMessage::Chat(ChatMessage::user("hi")),
            AgentMessage::Chat(ChatMessage::assistant("hello")),
            AgentMessage::ToolCall(ToolCall {
                name: "web_search".to_string(),
                arguments: json!({"query": "weather"}),
            }),
            AgentMessage::ToolResult {
                name: "web_search".to_string(),
                content: json!([{"title": "t"}]),
            },
        ];
        let opts = ChatOptions {
            temperature: 0.3,
            max_output_tokens: 250,
            timeout_secs: 30,
            max_retries: 0,
        };
        let body = GeminiModel::request_body(&transcript, &[], &opts);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["functionCall"]["name"], "web_search");
        assert_eq!(contents[3]["role"], "user");
        assert!(contents[3]["parts"][0]["functionResponse"].is_object());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 250);
    }

    #[test]
    fn openai_reply_parsed() {
        let json = json!({
            "choices": [{"message": {"role": "assistant", "content": "fine, thanks"}}]
        });
        assert_eq!(parse_openai_reply(&json).unwrap(), "fine, thanks");
    }

    #[test]
    fn openai_empty_reply_is_error() {
        let json = json!({"choices": []});
        assert!(parse_openai_reply(&json).is_err());
    }

    #[test]
    fn transcript_flattening_for_plain_providers() {
        let transcript = vec![
            AgentMessage::Chat(ChatMessage::user("question")),
            AgentMessage::ToolCall(ToolCall {
                name: "web_search".to_string(),
                arguments: json!({"query": "q"}),
            }),
            AgentMessage::ToolResult {
                name: "web_search".to_string(),
                content: json!("result text"),
            },
        ];
        let flat = flatten_transcript(&transcript);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[1].role, ChatRole::Assistant);
        assert!(flat[2].content.contains("result text"));
    }
}
