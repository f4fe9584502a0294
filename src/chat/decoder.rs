//! Turns a chat response body into [`StreamEvent`]s.
//!
//! Two framings are understood:
//!
//! - `Framed`: server-sent event blocks separated by a blank line,
//!   each with an optional `event:` line and one or more `data:`
//!   lines. `new_conversation` and `error` are the only named events;
//!   unnamed data is a text delta with `\n` escaped as a literal
//!   backslash-n. A `[DONE]` payload ends the stream.
//! - `Raw`: no framing at all, every decoded chunk is a text delta.
//!
//! Decoders are created once per response and dropped with it.

use std::str::FromStr;

use encoding_rs::UTF_8;
use futures::stream::BoxStream;
use futures_util::StreamExt;

use super::error::ChatError;
use super::models::StreamEvent;
use super::transport::ByteStream;

pub type EventStream = BoxStream<'static, Result<StreamEvent, ChatError>>;

const DONE_MARKER: &str = "[DONE]";

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// Server-sent event blocks
    #[default]
    Framed,
    /// Plain text deltas with no framing
    Raw,
}

impl WireFormat {
    pub fn decoder(&self) -> Box<dyn StreamDecoder> {
        match self {
            WireFormat::Framed => Box::new(FramedDecoder::new()),
            WireFormat::Raw => Box::new(RawDecoder::new()),
        }
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "framed" | "sse" => Ok(WireFormat::Framed),
            "raw" => Ok(WireFormat::Raw),
            other => Err(format!("unknown wire format '{}'", other)),
        }
    }
}

pub trait StreamDecoder: Send {
    /// Decode the next chunk of the body. Returns every event that is
    /// complete after this chunk, in order.
    fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent>;

    /// Flush anything still buffered once the body has ended.
    fn finish(&mut self) -> Vec<StreamEvent>;

    /// True once a terminal marker or error has been seen. Nothing
    /// more should be fed after that.
    fn is_terminated(&self) -> bool;
}

/// Incremental UTF-8 decoding that holds back an incomplete trailing
/// sequence until the next chunk completes it.
struct TextDecoder {
    inner: encoding_rs::Decoder,
}

impl TextDecoder {
    fn new() -> Self {
        Self {
            inner: UTF_8.new_decoder_with_bom_removal(),
        }
    }

    fn decode(&mut self, bytes: &[u8], last: bool) -> String {
        let capacity = self
            .inner
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 4);
        let mut text = String::with_capacity(capacity);
        let (_, _, replaced) = self.inner.decode_to_string(bytes, &mut text, last);
        if replaced {
            tracing::warn!("Replaced malformed UTF-8 in response body");
        }
        text
    }
}

pub struct FramedDecoder {
    text: TextDecoder,
    buffer: String,
    terminated: bool,
}

impl Default for FramedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FramedDecoder {
    pub fn new() -> Self {
        Self {
            text: TextDecoder::new(),
            buffer: String::new(),
            terminated: false,
        }
    }

    fn push_text(&mut self, text: &str) {
        self.buffer.push_str(text);
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }

    /// Process every complete block in the buffer. An incomplete
    /// trailing block stays buffered for the next chunk.
    fn drain_blocks(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = self.parse_block(&block) {
                events.push(event);
            }
            if self.terminated {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    fn parse_block(&mut self, block: &str) -> Option<StreamEvent> {
        let mut event_name: Option<&str> = None;
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            // Blank lines and comments (keep-alives) carry nothing
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(name) = field_value(line, "event") {
                event_name = Some(name.trim());
            } else if let Some(value) = field_value(line, "data") {
                data.push(value);
            } else {
                tracing::warn!("Skipping unrecognized stream line: {:?}", line);
            }
        }

        let payload = data.join("\n");
        match event_name {
            Some("new_conversation") => {
                let id = payload.trim();
                if id.is_empty() {
                    tracing::warn!("new_conversation event without an id");
                    return None;
                }
                Some(StreamEvent::ConversationAssigned(id.to_string()))
            }
            Some("error") => {
                self.terminated = true;
                let message = if payload.is_empty() {
                    "Unknown error".to_string()
                } else {
                    payload
                };
                Some(StreamEvent::ErrorSignaled(message))
            }
            None | Some("message") => {
                if data.is_empty() {
                    return None;
                }
                if payload == DONE_MARKER {
                    tracing::debug!("Received end of stream marker");
                    self.terminated = true;
                    return None;
                }
                if payload.is_empty() {
                    return None;
                }
                Some(StreamEvent::TextDelta(payload.replace("\\n", "\n")))
            }
            Some(other) => {
                tracing::warn!("Skipping unknown stream event '{}'", other);
                None
            }
        }
    }
}

/// Value of an SSE field line. A single space after the colon is
/// part of the syntax, anything beyond that is content.
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

impl StreamDecoder for FramedDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        let text = self.text.decode(chunk, false);
        self.push_text(&text);
        self.drain_blocks()
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        let text = self.text.decode(&[], true);
        self.push_text(&text);
        let mut events = self.drain_blocks();

        // Servers don't always terminate the final block
        if !self.terminated && !self.buffer.trim().is_empty() {
            let block = std::mem::take(&mut self.buffer);
            if let Some(event) = self.parse_block(&block) {
                events.push(event);
            }
        }
        self.terminated = true;
        events
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

pub struct RawDecoder {
    text: TextDecoder,
    terminated: bool,
}

impl Default for RawDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RawDecoder {
    pub fn new() -> Self {
        Self {
            text: TextDecoder::new(),
            terminated: false,
        }
    }

    fn delta(text: String) -> Vec<StreamEvent> {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![StreamEvent::TextDelta(text)]
        }
    }
}

impl StreamDecoder for RawDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        Self::delta(self.text.decode(chunk, false))
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        self.terminated = true;
        Self::delta(self.text.decode(&[], true))
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

/// Lazily decode `body` into events. The stream ends when the body
/// ends, when the decoder sees a terminal marker, or right after the
/// first transport error. A body that ends without a single byte is a
/// protocol error.
pub fn decode_stream(mut body: ByteStream, mut decoder: Box<dyn StreamDecoder>) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut bytes_received: usize = 0;
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            bytes_received += chunk.len();
            tracing::debug!(
                "Stream chunk received: {} bytes (total: {} bytes)",
                chunk.len(),
                bytes_received
            );

            for event in decoder.feed(&chunk) {
                yield Ok(event);
            }
            if decoder.is_terminated() {
                return;
            }
        }

        if bytes_received == 0 {
            tracing::warn!("Response body ended before any data arrived");
            yield Err(ChatError::Protocol("No response body".to_string()));
            return;
        }

        for event in decoder.finish() {
            yield Ok(event);
        }
    })
}
