//! The conversation log and the reducer that folds stream events into
//! it.
use super::models::{Message, Role, StreamEvent};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conversation {
    pub id: Option<String>,
    messages: Vec<Message>,
    /// Indexes of assistant messages written by the client rather than
    /// the model, e.g. rendered errors
    local_replies: Vec<usize>,
}

/// What the session should do after an event has been applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The server reported an error. The placeholder is left for the
    /// session to overwrite.
    Failed(String),
    Finished,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append the user's message followed by the empty assistant
    /// message that streamed text is folded into.
    pub fn begin_turn(&mut self, content: &str) {
        self.messages.push(Message::user(content));
        self.messages.push(Message::assistant(""));
    }

    /// Append an exchange answered locally without asking the model.
    pub fn push_local_exchange(&mut self, user: &str, reply: &str) {
        self.messages.push(Message::user(user));
        self.push_local_reply(reply);
    }

    fn push_local_reply(&mut self, reply: &str) {
        self.local_replies.push(self.messages.len());
        self.messages.push(Message::assistant(reply));
    }

    /// Replace the trailing assistant message's content with a locally
    /// written reply. Returns the text it held before.
    pub fn replace_placeholder(&mut self, content: &str) -> Option<String> {
        let last = self.messages.len().checked_sub(1);
        match self.messages.last_mut() {
            Some(msg) if msg.role == Role::Assistant => {
                let previous = std::mem::replace(&mut msg.content, content.to_string());
                self.local_replies.extend(last);
                Some(previous)
            }
            _ => {
                self.push_local_reply(content);
                None
            }
        }
    }

    /// Messages to replay as context. Exchanges whose reply was written
    /// locally are left out since the model never said them.
    pub fn history(&self) -> Vec<Message> {
        let mut skip = vec![false; self.messages.len()];
        for &idx in &self.local_replies {
            skip[idx] = true;
            if idx > 0 && self.messages[idx - 1].role == Role::User {
                skip[idx - 1] = true;
            }
        }
        self.messages
            .iter()
            .zip(skip)
            .filter(|(_, skip)| !skip)
            .map(|(msg, _)| msg.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.id = None;
        self.messages.clear();
        self.local_replies.clear();
    }

    /// Fold a single event into the conversation. Never removes or
    /// reorders messages, only the content of the last message and
    /// the conversation id change.
    pub fn apply(mut self, event: StreamEvent) -> (Self, Step) {
        let step = match event {
            StreamEvent::TextDelta(text) => {
                match self.messages.last_mut() {
                    Some(msg) if msg.role == Role::Assistant => msg.content.push_str(&text),
                    _ => tracing::warn!("Dropping text delta with no assistant message open"),
                }
                Step::Continue
            }
            StreamEvent::ConversationAssigned(id) => {
                tracing::debug!("Conversation assigned: {}", id);
                self.id = Some(id);
                Step::Continue
            }
            StreamEvent::ErrorSignaled(message) => Step::Failed(message),
            StreamEvent::Done => Step::Finished,
        };
        (self, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(content: &str) -> Conversation {
        let mut conversation = Conversation::new();
        conversation.begin_turn(content);
        conversation
    }

    #[test]
    fn test_deltas_concatenate_in_order() {
        let deltas = ["Hi", " there", ",\n", "", "中文", "!"];
        let mut conversation = started("Hello");
        for d in deltas {
            let (next, step) = conversation.apply(StreamEvent::TextDelta(d.to_string()));
            assert_eq!(step, Step::Continue);
            conversation = next;
        }
        assert_eq!(
            conversation.messages(),
            &[Message::user("Hello"), Message::assistant(&deltas.concat())]
        );
    }

    #[test]
    fn test_delta_without_placeholder_is_ignored() {
        let mut conversation = Conversation::new();
        conversation.messages.push(Message::user("Hello"));
        let (conversation, step) = conversation.apply(StreamEvent::TextDelta("x".to_string()));
        assert_eq!(step, Step::Continue);
        assert_eq!(conversation.messages(), &[Message::user("Hello")]);
    }

    #[test]
    fn test_conversation_assigned_keeps_messages() {
        let conversation = started("Hello");
        let before = conversation.messages().to_vec();
        let (conversation, step) =
            conversation.apply(StreamEvent::ConversationAssigned("abc".to_string()));
        assert_eq!(step, Step::Continue);
        assert_eq!(conversation.id.as_deref(), Some("abc"));
        assert_eq!(conversation.messages(), before.as_slice());
    }

    #[test]
    fn test_error_and_done_outcomes() {
        let (conversation, step) =
            started("Hello").apply(StreamEvent::ErrorSignaled("boom".to_string()));
        assert_eq!(step, Step::Failed("boom".to_string()));
        assert_eq!(conversation.messages()[1], Message::assistant(""));

        let (_, step) = conversation.apply(StreamEvent::Done);
        assert_eq!(step, Step::Finished);
    }

    #[test]
    fn test_replace_placeholder() {
        let (mut conversation, _) =
            started("Hello").apply(StreamEvent::TextDelta("partial".to_string()));
        let previous = conversation.replace_placeholder("Error: boom");
        assert_eq!(previous.as_deref(), Some("partial"));
        assert_eq!(
            conversation.messages(),
            &[Message::user("Hello"), Message::assistant("Error: boom")]
        );
    }

    #[test]
    fn test_history_leaves_out_local_replies() {
        let mut conversation = Conversation::new();
        conversation.push_local_exchange("Hi", "Please sign in to use the chat.");

        conversation.begin_turn("One");
        let (mut conversation, _) = conversation.apply(StreamEvent::TextDelta("First".to_string()));

        conversation.begin_turn("Two");
        conversation.replace_placeholder("Error: boom");

        assert_eq!(conversation.messages().len(), 6);
        assert_eq!(
            conversation.history(),
            vec![Message::user("One"), Message::assistant("First")]
        );
    }

    #[test]
    fn test_clear_resets_id_and_messages() {
        let (mut conversation, _) =
            started("Hello").apply(StreamEvent::ConversationAssigned("abc".to_string()));
        conversation.replace_placeholder("Error: boom");
        conversation.clear();
        assert!(conversation.messages().is_empty());
        assert!(conversation.history().is_empty());
        assert_eq!(conversation.id, None);

        conversation.begin_turn("Again");
        assert_eq!(
            conversation.history(),
            vec![Message::user("Again"), Message::assistant("")]
        );
    }
}
