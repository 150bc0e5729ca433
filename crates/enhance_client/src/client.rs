//! Streaming chat-completion client: POST one prompt, yield `delta.content`
//! fragments until `data: [DONE]`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::messages::ChatRequest;
use crate::sse::{parse_line, LineBuffer, LineEvent};

/// Provider endpoint used unless overridden.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Connect and idle timeout. The stream as a whole is not capped.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Finite sequence of response fragments for one request.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// Streaming client error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },
    #[error("malformed stream payload: {0}")]
    StreamParse(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// Heading shown above the message.
    pub fn title(&self) -> &'static str {
        "Request failed"
    }
}

/// HTTP client bound to one chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
}

impl Client {
    /// Client for [`DEFAULT_ENDPOINT`].
    pub fn new() -> Result<Self, ClientError> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Client for an OpenAI-compatible endpoint at `endpoint`.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .read_timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `prompt` and return the fragment stream.
    ///
    /// Fails before yielding anything when the provider answers with a
    /// non-success status. Dropping the stream closes the connection.
    pub async fn stream(
        &self,
        prompt: &str,
        credentials: &Credentials,
    ) -> Result<FragmentStream, ClientError> {
        let body = ChatRequest::new(&credentials.model, prompt);
        debug!(endpoint = %self.endpoint, model = %credentials.model, "sending chat request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&credentials.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "chat request rejected");
            return Err(ClientError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        Ok(fragments(response.bytes_stream().boxed()))
    }
}

struct FrameState {
    body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    lines: LineBuffer,
    pending: VecDeque<String>,
    finished: bool,
}

fn fragments(body: BoxStream<'static, reqwest::Result<bytes::Bytes>>) -> FragmentStream {
    let state = FrameState {
        body,
        lines: LineBuffer::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }
            if let Some(line) = state.pending.pop_front() {
                match parse_line(&line) {
                    Ok(LineEvent::Skip) => continue,
                    Ok(LineEvent::Fragment(text)) => return Some((Ok(text), state)),
                    Ok(LineEvent::Done) => {
                        debug!("stream reached [DONE]");
                        state.finished = true;
                        return None;
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed stream payload");
                        state.finished = true;
                        return Some((Err(ClientError::StreamParse(e)), state));
                    }
                }
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.pending.extend(state.lines.feed(&chunk)),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ClientError::Transport(e)), state));
                }
                None => match state.lines.finish() {
                    Some(rest) => state.pending.push_back(rest),
                    None => {
                        debug!("stream ended without [DONE]");
                        state.finished = true;
                        return None;
                    }
                },
            }
        }
    }))
}
