//! Content-aware chunking of text, JSON and conversation transcripts.
//!
//! All sizes are measured in characters. No chunker ever emits an empty chunk.

mod conversation;
mod json;
mod text;

use lore_core::{ChunkingConfig, Result};
use std::mem::take;
use std::path::Path;

pub use conversation::ConversationChunker;
pub use json::JsonChunker;
pub use text::TextChunker;

/// Content formats the chunkers understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    /// Prose split at sentence boundaries
    Text,
    /// JSON split at object boundaries
    Json,
    /// Two-party transcript split at exchange boundaries
    Conversation,
}

impl ContentFormat {
    /// Pick a format from a file extension (`.json` is JSON, everything else text)
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// One of the three chunking strategies.
#[derive(Debug, Clone)]
pub enum Chunker {
    /// Sentence-aware sliding window
    Text(TextChunker),
    /// Structure-aware JSON splitting
    Json(JsonChunker),
    /// Exchange-preserving transcript splitting
    Conversation(ConversationChunker),
}

impl Chunker {
    /// Build the chunker for `format` from shared settings
    pub fn for_format(format: ContentFormat, config: &ChunkingConfig) -> Self {
        match format {
            ContentFormat::Text => Self::Text(TextChunker::new(config.chunk_size, config.chunk_overlap)),
            ContentFormat::Json => Self::Json(JsonChunker::new(config.chunk_size)),
            ContentFormat::Conversation => Self::Conversation(ConversationChunker::with_speakers(
                config.chunk_size,
                &config.first_speaker,
                &config.second_speaker,
            )),
        }
    }

    /// Split `content` into ordered, non-empty chunks
    ///
    /// # Errors
    /// Returns [`lore_core::Error::InvalidContent`] when the JSON chunker receives malformed JSON
    pub fn chunk(&self, content: &str) -> Result<Vec<String>> {
        match self {
            Self::Text(chunker) => Ok(chunker.chunk(content)),
            Self::Json(chunker) => chunker.chunk(content),
            Self::Conversation(chunker) => Ok(chunker.chunk(content)),
        }
    }
}

/// Length in characters, the unit every size limit uses
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Pass-through for content that already fits: the trimmed input, or nothing
pub(crate) fn single_chunk(content: &str) -> Vec<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        Vec::default()
    } else {
        vec![trimmed.to_owned()]
    }
}

/// Greedily pack `pieces` into newline-joined chunks of at most `max_size`
/// characters; a piece that alone exceeds the limit becomes its own chunk.
pub(crate) fn pack_pieces<I>(pieces: I, max_size: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut chunks = Vec::default();
    let mut buffer = String::default();
    let mut buffer_len = 0;

    for piece in pieces {
        if piece.trim().is_empty() {
            continue;
        }
        let piece_len = char_len(&piece);
        if buffer_len > 0 && buffer_len + 1 + piece_len > max_size {
            chunks.push(take(&mut buffer));
            buffer_len = 0;
        }
        if buffer_len > 0 {
            buffer.push('\n');
            buffer_len += 1;
        }
        buffer.push_str(&piece);
        buffer_len += piece_len;
    }

    if buffer_len > 0 {
        chunks.push(buffer);
    }

    chunks
}
