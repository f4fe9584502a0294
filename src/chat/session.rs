//! The chat session that a UI drives.
//!
//! A session owns the conversation and publishes a [`SessionState`]
//! snapshot after every change. Observers hold a
//! `watch::Receiver<SessionState>` from [`ChatSession::subscribe`]
//! and never see a half-applied update since every value is a fresh
//! copy made while the session lock is held.
//!
//! Only one response streams at a time. `send_message` while another
//! is streaming returns [`ChatError::Busy`] without touching state.
//! `reset_chat` cancels the in-flight response and bumps the active
//! send out of the session so a late chunk can never land in the
//! cleared conversation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::decoder::{WireFormat, decode_stream};
use super::error::ChatError;
use super::models::{ChatTarget, SessionState, StreamEvent};
use super::state::{Conversation, Step};
use super::transport::{ChatContext, ChatRequest, ChatTransport, ContextMode, HttpTransport};
use crate::core::AppConfig;

struct ActiveSend {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    conversation: Conversation,
    active: Option<ActiveSend>,
    generation: u64,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    fn snapshot(&self) -> SessionState {
        SessionState {
            messages: self.conversation.messages().to_vec(),
            is_loading: self.active.is_some(),
        }
    }
}

pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    wire_format: WireFormat,
    context_mode: ContextMode,
    token: RwLock<Option<String>>,
    inner: Mutex<Inner>,
    snapshots: watch::Sender<SessionState>,
}

/// Clears the loading state if a send is dropped before it finishes,
/// e.g. when the caller aborts the task driving it.
struct SendGuard<'a> {
    session: &'a ChatSession,
    generation: u64,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.lock();
        if inner.is_current(self.generation) {
            tracing::debug!("Send dropped before completion");
            if let Some(active) = inner.active.take() {
                active.cancel.cancel();
            }
            self.session.publish(&inner);
        }
    }
}

impl ChatSession {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        wire_format: WireFormat,
        context_mode: ContextMode,
        token: Option<String>,
    ) -> Self {
        let (snapshots, _) = watch::channel(SessionState::default());
        Self {
            transport,
            wire_format,
            context_mode,
            token: RwLock::new(token),
            inner: Mutex::new(Inner::default()),
            snapshots,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ChatError> {
        let transport = HttpTransport::new(&config.api_url, config.connect_timeout)?;
        Ok(Self::new(
            Arc::new(transport),
            config.wire_format,
            config.context_mode,
            config.token.clone(),
        ))
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.snapshots.subscribe()
    }

    /// The latest published snapshot
    pub fn state(&self) -> SessionState {
        self.snapshots.borrow().clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.lock().conversation.id.clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.snapshots.send_replace(inner.snapshot());
    }

    /// Send `content` to `target` and stream the reply into the
    /// conversation. Resolves once the reply has finished, failed, or
    /// was cancelled by [`ChatSession::reset_chat`].
    ///
    /// Failures are rendered into the trailing assistant message and
    /// also returned so the caller can react, e.g. prompting for a new
    /// token on [`ChatError::Unauthorized`].
    pub async fn send_message(&self, content: &str, target: ChatTarget) -> Result<(), ChatError> {
        let token = self.token();

        let (generation, cancel, request, token) = {
            let mut inner = self.lock();
            if inner.active.is_some() {
                tracing::warn!("Rejected message while a response is streaming");
                return Err(ChatError::Busy);
            }
            let Some(token) = token else {
                inner
                    .conversation
                    .push_local_exchange(content, &ChatError::SignInRequired.user_message());
                self.publish(&inner);
                return Err(ChatError::SignInRequired);
            };

            let context = match self.context_mode {
                ContextMode::Conversation => ChatContext::Conversation {
                    conversation_id: inner.conversation.id.clone(),
                },
                ContextMode::History => ChatContext::History {
                    history: inner.conversation.history(),
                },
            };
            let request = ChatRequest::new(target, content, context);

            inner.conversation.begin_turn(content);
            inner.generation += 1;
            let generation = inner.generation;
            let cancel = CancellationToken::new();
            inner.active = Some(ActiveSend {
                generation,
                cancel: cancel.clone(),
            });
            self.publish(&inner);
            (generation, cancel, request, token)
        };

        let _guard = SendGuard {
            session: self,
            generation,
        };
        tracing::info!("Sending chat message to {}", request.path());

        let result = self.stream_reply(generation, &cancel, &request, &token).await;
        self.finish(generation, result)
    }

    async fn stream_reply(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        request: &ChatRequest,
        token: &str,
    ) -> Result<(), ChatError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            response = self.transport.send(request, token) => response?,
        };
        tracing::debug!("Chat response status {}", response.status);

        let mut events = decode_stream(response.body, self.wire_format.decoder());
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                next = events.next() => next,
            };
            let event = match next {
                Some(event) => event?,
                None => StreamEvent::Done,
            };

            match self.fold(generation, event) {
                None => return Ok(()),
                Some(Step::Continue) => {}
                Some(Step::Finished) => return Ok(()),
                Some(Step::Failed(message)) => {
                    return Err(ChatError::StreamErrorSignaled(message));
                }
            }
        }
    }

    /// Apply an event and publish the result. Returns `None` when the
    /// send is no longer current because the chat was reset.
    fn fold(&self, generation: u64, event: StreamEvent) -> Option<Step> {
        let mut inner = self.lock();
        if !inner.is_current(generation) {
            tracing::debug!("Discarding event for a reset conversation");
            return None;
        }
        let conversation = std::mem::take(&mut inner.conversation);
        let (conversation, step) = conversation.apply(event);
        inner.conversation = conversation;
        if step == Step::Continue {
            self.publish(&inner);
        }
        Some(step)
    }

    fn finish(&self, generation: u64, result: Result<(), ChatError>) -> Result<(), ChatError> {
        let mut inner = self.lock();
        if !inner.is_current(generation) {
            // Reset while streaming. The reset already published.
            return Ok(());
        }
        inner.active = None;

        if let Err(err) = &result {
            tracing::error!("Chat Error: {}", err);
            let discarded = inner.conversation.replace_placeholder(&err.user_message());
            if let Some(text) = discarded.filter(|t| !t.is_empty()) {
                tracing::debug!("Discarded {} bytes streamed before the error", text.len());
            }
        } else {
            tracing::info!("Chat response complete");
        }
        self.publish(&inner);
        result
    }

    /// Clear the conversation and abort any in-flight response.
    pub fn reset_chat(&self) {
        let mut inner = self.lock();
        if let Some(active) = inner.active.take() {
            tracing::info!("Aborting in-flight response");
            active.cancel.cancel();
        }
        inner.conversation.clear();
        self.publish(&inner);
    }
}
