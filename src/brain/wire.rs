// Wire types for the Messages API and conversion from the conversation model

use serde::{Deserialize, Serialize};

use super::types::{ChatResponse, FinishReason, Message, Role, ToolCall};

/// Wire role: the API only knows user and assistant turns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    #[default]
    User,
    Assistant,
}

/// A single message on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: Vec<ContentBlock>,
}

/// Content block types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },

    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    Thinking {
        #[serde(default)]
        thinking: String,
    },

    RedactedThinking,

    #[serde(other)]
    Other,
}

/// Stop reason from API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Tool schema as sent in the request `tools` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Complete request to inference backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<WireMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

/// Response from inference backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    pub model: String,
    #[serde(default)]
    pub role: WireRole,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Split the conversation into the `system` field and wire messages.
///
/// System messages are concatenated into the system prompt. Tool messages
/// become `tool_result` blocks on a user turn, and consecutive turns with the
/// same wire role are merged because the API requires strict alternation.
pub fn to_wire(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut wire: Vec<WireMessage> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg.role {
            Role::System => {
                system_parts.push(&msg.content);
                continue;
            }
            Role::User => (WireRole::User, text_blocks(&msg.content)),
            Role::Tool => (
                WireRole::User,
                vec![ContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: msg.content.clone(),
                    is_error: msg.is_error.then_some(true),
                }],
            ),
            Role::Assistant => {
                let mut blocks = text_blocks(&msg.content);
                blocks.extend(msg.tool_calls.iter().map(|call| ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                }));
                (WireRole::Assistant, blocks)
            }
        };

        if blocks.is_empty() {
            continue;
        }

        match wire.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => wire.push(WireMessage {
                role,
                content: blocks,
            }),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, wire)
}

fn text_blocks(content: &str) -> Vec<ContentBlock> {
    if content.trim().is_empty() {
        Vec::new()
    } else {
        vec![ContentBlock::Text {
            text: content.to_string(),
        }]
    }
}

/// Flatten an API response into the backend-independent shape
pub fn from_response(response: &MessageResponse) -> ChatResponse {
    let content = response
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("");

    let tool_calls: Vec<ToolCall> = response
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: input.clone(),
            }),
            _ => None,
        })
        .collect();

    let finish_reason = match response.stop_reason {
        Some(StopReason::ToolUse) => FinishReason::ToolCalls,
        Some(StopReason::MaxTokens) => FinishReason::Length,
        Some(StopReason::EndTurn) | Some(StopReason::StopSequence) | None => {
            if tool_calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            }
        }
    };

    ChatResponse {
        content,
        tool_calls,
        finish_reason,
    }
}
