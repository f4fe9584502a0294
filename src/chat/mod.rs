//! Streaming chat with the reader backend, globally or about a single
//! article.
pub mod decoder;
pub mod error;
pub mod models;
pub mod session;
pub mod state;
pub mod transport;

pub use decoder::{StreamDecoder, WireFormat, decode_stream};
pub use error::ChatError;
pub use models::{ChatTarget, Message, Role, SessionState, StreamEvent};
pub use session::ChatSession;
pub use state::{Conversation, Step};
pub use transport::{ChatContext, ChatRequest, ChatResponse, ChatTransport, ContextMode, HttpTransport};
