//! Tool-using chat turn.
//!
//! One agent turn lets the model call the `web_search` tool up to
//! [`MAX_TOOL_ITERATIONS`] times before it must answer. Prior conversation
//! turns are replayed as context; the tool transcript itself is not kept on
//! the conversation log.

use anyhow::{bail, Result};
use serde_json::json;

use crate::llm::{AgentMessage, ChatMessage, ChatModel, ChatOptions, ModelReply, ToolSpec};
use crate::models::{Role, Turn};
use crate::websearch::SearchTool;

/// Tool iterations allowed per turn before the model must answer.
pub const MAX_TOOL_ITERATIONS: usize = 3;

const AGENT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Use the web_search tool when you need current information.";

/// Declaration of the web search tool offered to the model.
pub fn web_search_spec(tool_name: &str) -> ToolSpec {
    ToolSpec {
        name: "web_search".to_string(),
        description: format!(
            "Search the web ({}) for current information. \
             Returns a list of results with title, url, and snippet.",
            tool_name
        ),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query."
                }
            },
            "required": ["query"]
        }),
    }
}

/// Run one agent turn: prior turns as context, then up to
/// [`MAX_TOOL_ITERATIONS`] model/tool rounds. After the last round the model
/// is re-asked with no tools offered, so it has to answer from what it
/// gathered.
pub async fn run_agent_turn(
    model: &dyn ChatModel,
    search: &dyn SearchTool,
    opts: &ChatOptions,
    history: &[Turn],
    input: &str,
) -> Result<String> {
    let mut transcript: Vec<AgentMessage> = Vec::new();
    transcript.push(AgentMessage::Chat(ChatMessage::system(AGENT_SYSTEM_PROMPT)));
    for turn in history {
        let msg = match turn.role {
            Role::User => ChatMessage::user(&turn.content),
            Role::Assistant => ChatMessage::assistant(&turn.content),
        };
        transcript.push(AgentMessage::Chat(msg));
    }
    transcript.push(AgentMessage::Chat(ChatMessage::user(input)));

    let tools = [web_search_spec(search.name())];

    for _ in 0..MAX_TOOL_ITERATIONS {
        match model.complete_with_tools(&transcript, &tools, opts).await? {
            ModelReply::Answer(text) => return Ok(text),
            ModelReply::ToolCall(call) => {
                if call.name != "web_search" {
                    bail!("model requested unknown tool: {}", call.name);
                }
                let query = call
                    .arguments
                    .get("query")
                    .and_then(|q| q.as_str())
                    .ok_or_else(|| anyhow::anyhow!("web_search call without a query"))?
                    .to_string();

                let hits = search.search(&query).await?;
                let results: Vec<serde_json::Value> = hits
                    .iter()
                    .map(|h| {
                        json!({"title": h.title, "url": h.url, "snippet": h.snippet})
                    })
                    .collect();

                transcript.push(AgentMessage::ToolCall(call));
                transcript.push(AgentMessage::ToolResult {
                    name: "web_search".to_string(),
                    content: json!(results),
                });
            }
        }
    }

    // Iterations exhausted: withhold the tools so the only move left is an answer.
    match model.complete_with_tools(&transcript, &[], opts).await? {
        ModelReply::Answer(text) => Ok(text),
        ModelReply::ToolCall(_) => bail!("model kept requesting tools after the iteration limit"),
    }
}
