//! HTTP transport for the chat endpoints.
//!
//! The transport only knows how to get a streaming body out of the
//! backend. Turning bytes into events is left to
//! [`crate::chat::decoder`] so the two can be swapped independently.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::Serialize;

use super::error::ChatError;
use super::models::{ChatTarget, Message};

pub type ByteStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// How prior turns are given to the backend.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContextMode {
    /// Send the server-assigned conversation id (token-based variant)
    #[default]
    Conversation,
    /// Replay the full message history with every request
    History,
}

impl FromStr for ContextMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conversation" | "conversation_id" => Ok(ContextMode::Conversation),
            "history" => Ok(ContextMode::History),
            other => Err(format!("unknown context mode '{}'", other)),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ChatContext {
    Conversation {
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    History {
        history: Vec<Message>,
    },
}

/// Body of `POST /chat/message` and `POST /chat/global`.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatRequest {
    #[serde(skip)]
    pub target: ChatTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<i64>,
    pub message: String,
    #[serde(flatten)]
    pub context: ChatContext,
}

impl ChatRequest {
    pub fn new(target: ChatTarget, message: &str, context: ChatContext) -> Self {
        Self {
            target,
            article_id: target.article_id(),
            message: message.to_string(),
            context,
        }
    }

    pub fn path(&self) -> &'static str {
        match self.target {
            ChatTarget::Article(_) => "/chat/message",
            ChatTarget::Global => "/chat/global",
        }
    }
}

/// A live response body paired with its status.
pub struct ChatResponse {
    pub status: StatusCode,
    pub body: ByteStream,
}

impl ChatResponse {
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest, token: &str) -> Result<ChatResponse, ChatError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
}

impl HttpTransport {
    pub fn new(api_url: &str, connect_timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest, token: &str) -> Result<ChatResponse, ChatError> {
        let url = format!("{}{}", self.api_url, request.path());
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ChatError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ChatError::Request {
                status: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string(),
            });
        }
        if response.content_length() == Some(0) {
            return Err(ChatError::Protocol("No response body".to_string()));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ChatError::from))
            .boxed();

        Ok(ChatResponse { status, body })
    }
}
