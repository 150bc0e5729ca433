//! Chat-completion wire types. Client → provider request body and the streamed
//! `chat.completion.chunk` payloads carried on `data: ` lines.

use serde::{Deserialize, Serialize};

/// Client → provider: streaming chat-completion request with one user message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub stream: bool,
    pub messages: [ChatMessage<'a>; 1],
}

impl<'a> ChatRequest<'a> {
    pub fn new(model: &'a str, prompt: &'a str) -> Self {
        Self {
            model,
            stream: true,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// Provider → client: one streamed chunk. Only the fields we read are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    pub delta: Delta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatChunk {
    /// Parse a `data: ` payload and return `choices[0].delta.content`.
    ///
    /// `Ok(None)` when the delta carries no content (role-only or final chunks).
    pub fn content_from_json(payload: &str) -> Result<Option<String>, String> {
        let chunk: ChatChunk = serde_json::from_str(payload).map_err(|e| e.to_string())?;
        let choice = chunk
            .choices
            .into_iter()
            .next()
            .ok_or("chunk has no choices")?;
        Ok(choice.delta.content)
    }
}
