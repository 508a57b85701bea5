//! Typed records of a Claude Code session log.
//!
//! A session file holds one JSON object per line, discriminated by `type`:
//! ```jsonl
//! {"type":"summary","summary":"Fix flaky test","leafUuid":"..."}
//! {"type":"user","uuid":"u1","parentUuid":null,"timestamp":"...","message":{...}}
//! {"type":"assistant","uuid":"a1","parentUuid":"u1","timestamp":"...","message":{...},"costUSD":0.01}
//! ```
//!
//! Optional fields that vary across client versions are modelled as `Option`
//! and never defaulted to zero here; aggregation decides what absence means.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decoded line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entry {
    #[serde(rename = "summary")]
    Summary(SummaryEntry),
    #[serde(rename = "user")]
    User(UserEntry),
    #[serde(rename = "assistant")]
    Assistant(AssistantEntry),
}

impl Entry {
    /// Split into the message graph or the summary list.
    pub fn into_message(self) -> Result<Message, SummaryEntry> {
        match self {
            Entry::Summary(summary) => Err(summary),
            Entry::User(user) => Ok(Message::User(user)),
            Entry::Assistant(assistant) => Ok(Message::Assistant(assistant)),
        }
    }

    pub(crate) fn set_line_number(&mut self, line_number: usize) {
        match self {
            Entry::Summary(_) => {}
            Entry::User(user) => user.header.line_number = line_number,
            Entry::Assistant(assistant) => assistant.header.line_number = line_number,
        }
    }
}

/// Label attached by convention to a leaf message. Not part of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub summary: String,
    pub leaf_uuid: String,
}

/// Fields shared by user and assistant records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub uuid: String,
    /// `None` marks a declared root.
    #[serde(default)]
    pub parent_uuid: Option<String>,
    /// Advisory only; never used to shape the tree.
    #[serde(default)]
    pub is_sidechain: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Ordering diagnostics only; a message without one still joins the tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// 1-based line in the source; set by the decoder, not read from JSON.
    #[serde(skip)]
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub message: UserMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_meta: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_result: Option<ToolUseResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(default = "default_user_role")]
    pub role: String,
    pub content: UserContent,
}

/// User content is either plain text or a list of blocks (mostly tool results).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Blocks(Vec<UserContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: ToolResultContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    // Images and anything newer
    #[serde(other)]
    Other,
}

/// tool_result content can be a string, a list of blocks, or absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ToolResultBlock>),
    #[default]
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolResultBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl ToolResultContent {
    pub fn to_text(&self) -> String {
        match self {
            ToolResultContent::Text(text) => text.clone(),
            ToolResultContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ToolResultBlock::Text { text } => Some(text.as_str()),
                    ToolResultBlock::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            ToolResultContent::Null => String::new(),
        }
    }
}

/// Side-channel output of the tool that produced a user tool_result.
///
/// Older and MCP-backed tools write plain strings or arbitrary JSON here, so
/// anything that does not fit the structured shape is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolUseResult {
    Structured(ToolUseOutput),
    Text(String),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_image: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<bool>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<ToolUseFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_todos: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_todos: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseFile {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantEntry {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub message: AssistantMessage,
    /// Absent on older records.
    #[serde(default, rename = "costUSD", skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    /// Absent on older records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// The model response envelope as returned by the Messages API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default = "default_assistant_role")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Vec<AssistantContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Map<String, serde_json::Value>,
    },
    // Thinking blocks and anything newer
    #[serde(other)]
    Other,
}

/// Token usage breakdown. Each counter may be missing on older records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A node of the conversation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "user")]
    User(UserEntry),
    #[serde(rename = "assistant")]
    Assistant(AssistantEntry),
}

impl Message {
    pub fn header(&self) -> &MessageHeader {
        match self {
            Message::User(user) => &user.header,
            Message::Assistant(assistant) => &assistant.header,
        }
    }

    pub fn uuid(&self) -> &str {
        &self.header().uuid
    }

    pub fn parent_uuid(&self) -> Option<&str> {
        self.header().parent_uuid.as_deref()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.header().timestamp
    }

    pub fn is_sidechain(&self) -> bool {
        self.header().is_sidechain
    }

    pub fn line_number(&self) -> usize {
        self.header().line_number
    }

    pub fn role(&self) -> Role {
        match self {
            Message::User(_) => Role::User,
            Message::Assistant(_) => Role::Assistant,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantEntry> {
        match self {
            Message::Assistant(assistant) => Some(assistant),
            Message::User(_) => None,
        }
    }

    pub fn as_user(&self) -> Option<&UserEntry> {
        match self {
            Message::User(user) => Some(user),
            Message::Assistant(_) => None,
        }
    }

    /// Model name for assistant messages.
    pub fn model(&self) -> Option<&str> {
        self.as_assistant()
            .and_then(|assistant| assistant.message.model.as_deref())
    }

    /// Ids of the tool_use blocks issued by this message, in block order.
    pub fn tool_use_ids(&self) -> impl Iterator<Item = &str> {
        self.as_assistant()
            .into_iter()
            .flat_map(|assistant| assistant.message.content.iter())
            .filter_map(|block| match block {
                AssistantContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
    }

    /// Concatenated plain text of the message, tool payloads excluded.
    pub fn text(&self) -> String {
        match self {
            Message::User(user) => match &user.message.content {
                UserContent::Text(text) => text.clone(),
                UserContent::Blocks(blocks) => blocks
                    .iter()
                    .filter_map(|block| match block {
                        UserContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            Message::Assistant(assistant) => assistant
                .message
                .content
                .iter()
                .filter_map(|block| match block {
                    AssistantContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn default_user_role() -> String {
    "user".to_string()
}
fn default_assistant_role() -> String {
    "assistant".to_string()
}
