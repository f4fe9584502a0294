//! Integration tests for streaming chat against a mock backend

mod test_utils;

#[cfg(test)]
mod tests {
    use std::io::Write;

    use mockito::Matcher;
    use serde_json::json;

    use hnchat::chat::{ChatError, ChatSession, ChatTarget, ContextMode, Message, WireFormat};

    use crate::test_utils::{sse_body, test_config, test_session};

    /// Tests a fresh global chat streams the reply into the placeholder
    #[tokio::test]
    async fn it_streams_a_global_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/global")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::Json(json!({"message": "Hello"})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(Some("conv-1"), &["Hi", " there"]))
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::Conversation, WireFormat::Framed);
        session
            .send_message("Hello", ChatTarget::Global)
            .await
            .unwrap();

        mock.assert_async().await;
        let state = session.state();
        assert!(!state.is_loading);
        assert_eq!(
            state.messages,
            vec![Message::user("Hello"), Message::assistant("Hi there")]
        );
        assert_eq!(session.conversation_id().as_deref(), Some("conv-1"));
    }

    /// Tests the assigned conversation id is sent with the next article
    /// message and newlines are unescaped
    #[tokio::test]
    async fn it_continues_an_article_conversation() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/chat/message")
            .match_body(Matcher::Json(json!({"article_id": 12, "message": "Summarize"})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(Some("conv-12"), &["Line one\nLine two"]))
            .create_async()
            .await;
        let second = server
            .mock("POST", "/chat/message")
            .match_body(Matcher::Json(json!({
                "article_id": 12,
                "message": "More",
                "conversation_id": "conv-12"
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(None, &["Sure."]))
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::Conversation, WireFormat::Framed);
        session
            .send_message("Summarize", ChatTarget::Article(12))
            .await
            .unwrap();
        session
            .send_message("More", ChatTarget::Article(12))
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let messages = session.state().messages;
        assert_eq!(messages[1], Message::assistant("Line one\nLine two"));
        assert_eq!(messages[3], Message::assistant("Sure."));
    }

    /// Tests history replay sends prior messages instead of an id
    #[tokio::test]
    async fn it_replays_history() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("POST", "/chat/global")
            .match_body(Matcher::Json(json!({"message": "One", "history": []})))
            .with_status(200)
            .with_body(sse_body(None, &["First"]))
            .create_async()
            .await;
        let second = server
            .mock("POST", "/chat/global")
            .match_body(Matcher::Json(json!({
                "message": "Two",
                "history": [
                    {"role": "user", "content": "One"},
                    {"role": "assistant", "content": "First"}
                ]
            })))
            .with_status(200)
            .with_body(sse_body(None, &["Second"]))
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::History, WireFormat::Framed);
        session.send_message("One", ChatTarget::Global).await.unwrap();
        session.send_message("Two", ChatTarget::Global).await.unwrap();

        second.assert_async().await;
        assert_eq!(
            session.state().messages.last(),
            Some(&Message::assistant("Second"))
        );
    }

    /// Tests a 401 asks the user to sign in again
    #[tokio::test]
    async fn it_renders_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/global")
            .with_status(401)
            .with_body(r#"{"detail":"Could not validate credentials"}"#)
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::Conversation, WireFormat::Framed);
        let err = session
            .send_message("Hello", ChatTarget::Global)
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        let state = session.state();
        assert!(!state.is_loading);
        assert_eq!(
            state.messages.last(),
            Some(&Message::assistant(
                "Error: Unauthorized. Please sign in again."
            ))
        );
    }

    /// Tests other error statuses carry the status text
    #[tokio::test]
    async fn it_renders_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/message")
            .with_status(500)
            .with_body("Internal server error")
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::Conversation, WireFormat::Framed);
        let err = session
            .send_message("Hello", ChatTarget::Article(1))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Request { status: 500, .. }));
        assert_eq!(
            session.state().messages.last(),
            Some(&Message::assistant("Error: API Error: Internal Server Error"))
        );
    }

    /// Tests an error event stops the stream and replaces the reply
    #[tokio::test]
    async fn it_renders_error_events() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/message")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: Partial\n\nevent: error\ndata: Article 99 not found\n\ndata: ignored\n\n",
            )
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::Conversation, WireFormat::Framed);
        let err = session
            .send_message("Hello", ChatTarget::Article(99))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::StreamErrorSignaled(_)));
        assert_eq!(
            session.state().messages,
            vec![
                Message::user("Hello"),
                Message::assistant("Error: Article 99 not found")
            ]
        );
    }

    /// Tests characters split across chunked writes decode intact
    #[tokio::test]
    async fn it_decodes_characters_split_across_chunks() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/global")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_chunked_body(|w| {
                let body = "data: 中文回答\n\ndata: [DONE]\n\n".as_bytes();
                w.write_all(&body[..7])?;
                w.flush()?;
                w.write_all(&body[7..14])?;
                w.flush()?;
                w.write_all(&body[14..])
            })
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::Conversation, WireFormat::Framed);
        session
            .send_message("你好", ChatTarget::Global)
            .await
            .unwrap();

        let reply = session.state().messages[1].content.clone();
        assert_eq!(reply, "中文回答");
        assert!(!reply.contains('\u{FFFD}'));
    }

    /// Tests a successful response with an empty chunked body is
    /// reported instead of leaving an empty reply
    #[tokio::test]
    async fn it_renders_empty_bodies() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/global")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_chunked_body(|_| Ok(()))
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::Conversation, WireFormat::Framed);
        let err = session
            .send_message("Hi", ChatTarget::Global)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Protocol(_)));
        let state = session.state();
        assert!(!state.is_loading);
        assert_eq!(
            state.messages,
            vec![
                Message::user("Hi"),
                Message::assistant("Error: Protocol error: No response body")
            ]
        );
    }

    /// Tests raw bodies are taken as text verbatim
    #[tokio::test]
    async fn it_streams_raw_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/global")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("Plain\nreply")
            .create_async()
            .await;

        let session = test_session(&server.url(), ContextMode::History, WireFormat::Raw);
        session.send_message("Hi", ChatTarget::Global).await.unwrap();

        assert_eq!(
            session.state().messages[1],
            Message::assistant("Plain\nreply")
        );
    }

    /// Tests the session can be built from config
    #[tokio::test]
    async fn it_builds_a_session_from_config() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/global")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(sse_body(None, &["ok"]))
            .create_async()
            .await;

        let session = ChatSession::from_config(&test_config(&server.url())).unwrap();
        session.send_message("Hi", ChatTarget::Global).await.unwrap();

        mock.assert_async().await;
        assert_eq!(session.state().messages[1], Message::assistant("ok"));
    }

    /// Tests an unreachable backend is reported as a transport error
    #[tokio::test]
    async fn it_renders_transport_errors() {
        let session = test_session(
            "http://127.0.0.1:1",
            ContextMode::Conversation,
            WireFormat::Framed,
        );
        let err = session
            .send_message("Hello", ChatTarget::Global)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Transport(_)));
        let state = session.state();
        assert!(!state.is_loading);
        assert!(
            state.messages[1]
                .content
                .starts_with("Error: Transport error:")
        );
    }
}
