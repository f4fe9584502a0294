use thiserror::Error;

/// Everything that can go wrong while sending a chat message. All of
/// these end up rendered into the trailing assistant message by the
/// session; none of them are fatal to the caller.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized. Please sign in again.")]
    Unauthorized,

    #[error("API Error: {status_text}")]
    Request { status: u16, status_text: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server explicitly reported an error inside the stream
    #[error("{0}")]
    StreamErrorSignaled(String),

    #[error("A response is already streaming")]
    Busy,

    #[error("Please sign in to use the chat.")]
    SignInRequired,
}

impl ChatError {
    /// Text for the assistant message that replaces the placeholder.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::SignInRequired => self.to_string(),
            _ => format!("Error: {}", self),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ChatError::Unauthorized)
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}
