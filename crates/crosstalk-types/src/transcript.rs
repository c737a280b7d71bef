//! Transcript JSONL record shapes.
//!
//! Only the fields the live engine needs are modelled; everything else in a
//! line is ignored. Record kinds other than `user` and `assistant` land in
//! [`TranscriptRecord::Unrecognized`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptRecord {
    User {
        #[serde(default)]
        timestamp: Option<Value>,
    },
    Assistant {
        #[serde(default)]
        timestamp: Option<Value>,
        #[serde(default)]
        message: Option<AssistantPayload>,
    },
    /// Summaries, file-history snapshots, system records and future kinds.
    #[serde(other)]
    Unrecognized,
}

impl TranscriptRecord {
    /// Raw timestamp string, if the record carries one.
    pub fn timestamp(&self) -> Option<&str> {
        match self {
            TranscriptRecord::User { timestamp } | TranscriptRecord::Assistant { timestamp, .. } => {
                timestamp.as_ref().and_then(Value::as_str)
            }
            TranscriptRecord::Unrecognized => None,
        }
    }
}

/// The `message` object of an assistant record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantPayload {
    #[serde(default)]
    pub content: MessageContent,
}

/// Assistant content is either plain text or a list of blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Blocks(Vec<ContentBlock>),
    Text(String),
    Other(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Blocks(Vec::new())
    }
}

impl MessageContent {
    /// First tool invocation in the content, if any.
    pub fn first_tool_use(&self) -> Option<(&str, &Value)> {
        match self {
            MessageContent::Blocks(blocks) => blocks.iter().find_map(|block| match block {
                ContentBlock::Typed(TranscriptBlock::ToolUse { name, input }) => {
                    Some((name.as_str(), input))
                }
                _ => None,
            }),
            _ => None,
        }
    }
}

/// One entry of a block list. Entries that are not typed objects are kept
/// as raw values and skipped, so they never hide the blocks around them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Typed(TranscriptBlock),
    Untyped(Value),
}

/// Content block inside an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptBlock {
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    /// Text, thinking, tool results and anything newer.
    #[serde(other)]
    Other,
}
