//! Test utilities for integration tests
#![allow(dead_code)]
use std::sync::Arc;
use std::time::Duration;

use hnchat::chat::{ChatSession, ContextMode, HttpTransport, WireFormat};
use hnchat::core::AppConfig;

/// Creates a chat session talking to a mock backend at `url`.
pub fn test_session(
    url: &str,
    context_mode: ContextMode,
    wire_format: WireFormat,
) -> Arc<ChatSession> {
    let transport =
        HttpTransport::new(url, Duration::from_secs(2)).expect("Failed to build transport");
    Arc::new(ChatSession::new(
        Arc::new(transport),
        wire_format,
        context_mode,
        Some(String::from("test-token")),
    ))
}

/// Config pointing at a mock backend with a test token.
pub fn test_config(url: &str) -> AppConfig {
    let mut config = AppConfig::new(url);
    config.token = Some(String::from("test-token"));
    config
}

/// Frames text deltas the way the backend does, escaping newlines
/// and ending with the done marker.
pub fn sse_body(conversation_id: Option<&str>, deltas: &[&str]) -> String {
    let mut body = String::new();
    if let Some(id) = conversation_id {
        body.push_str(&format!("event: new_conversation\ndata: {}\n\n", id));
    }
    for delta in deltas {
        body.push_str(&format!("data: {}\n\n", delta.replace('\n', "\\n")));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
