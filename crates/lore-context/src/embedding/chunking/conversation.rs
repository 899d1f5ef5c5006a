//! Conversation transcript chunking by speaker exchanges.

use std::mem::take;

use super::{char_len, pack_pieces, single_chunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    First,
    Second,
}

/// Consecutive lines forming one question/answer unit
#[derive(Debug, Default)]
struct Exchange {
    text: String,
    has_first: bool,
    has_second: bool,
}

impl Exchange {
    fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }

    fn push_turn(&mut self, line: &str, speaker: Speaker) {
        self.push_line(line);
        match speaker {
            Speaker::First => self.has_first = true,
            Speaker::Second => self.has_second = true,
        }
    }

    fn append(&mut self, other: Self) {
        self.push_line(&other.text);
        self.has_first |= other.has_first;
        self.has_second |= other.has_second;
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn is_complete(&self) -> bool {
        self.has_first && self.has_second
    }
}

/// Chunker that keeps each two-party exchange inside a single chunk
#[derive(Debug, Clone)]
pub struct ConversationChunker {
    max_size: usize,
    first_prefix: String,
    second_prefix: String,
}

impl ConversationChunker {
    /// Chunker for `Player:` / `Villager:` transcripts
    pub fn new(max_size: usize) -> Self {
        Self::with_speakers(max_size, "Player", "Villager")
    }

    /// Chunker for transcripts whose lines start with `"{first}:"` or `"{second}:"`
    pub fn with_speakers(max_size: usize, first: &str, second: &str) -> Self {
        Self {
            max_size: max_size.max(1),
            first_prefix: format!("{first}:"),
            second_prefix: format!("{second}:"),
        }
    }

    /// Split a transcript into chunks of whole exchanges
    #[must_use]
    pub fn chunk(&self, content: &str) -> Vec<String> {
        if char_len(content) <= self.max_size {
            return single_chunk(content);
        }

        let exchanges = Self::fold_one_sided(self.parse_exchanges(content));
        pack_pieces(exchanges.into_iter().map(|exchange| exchange.text), self.max_size)
    }

    fn speaker_of(&self, line: &str) -> Option<Speaker> {
        if line.starts_with(&self.first_prefix) {
            Some(Speaker::First)
        } else if line.starts_with(&self.second_prefix) {
            Some(Speaker::Second)
        } else {
            None
        }
    }

    /// Pair first-party turns with the following second-party turn.
    /// Consecutive turns of one party stay together; unlabelled lines continue
    /// whatever turn came before them.
    fn parse_exchanges(&self, content: &str) -> Vec<Exchange> {
        let mut exchanges: Vec<Exchange> = Vec::default();
        let mut current = Exchange::default();
        let mut last_speaker = None;

        for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
            match self.speaker_of(line) {
                None => match exchanges.last_mut() {
                    Some(previous) if current.is_empty() => previous.push_line(line),
                    _ => current.push_line(line),
                },
                Some(Speaker::Second) if last_speaker == Some(Speaker::First) => {
                    current.push_turn(line, Speaker::Second);
                    exchanges.push(take(&mut current));
                    last_speaker = None;
                }
                Some(Speaker::First) if last_speaker != Some(Speaker::First) && !current.is_empty() => {
                    exchanges.push(take(&mut current));
                    current.push_turn(line, Speaker::First);
                    last_speaker = Some(Speaker::First);
                }
                Some(speaker) => {
                    current.push_turn(line, speaker);
                    last_speaker = Some(speaker);
                }
            }
        }

        if !current.is_empty() {
            exchanges.push(current);
        }

        exchanges
    }

    /// Merge one-sided exchanges into a neighbouring complete one so that every
    /// packed chunk carries both roles whenever the transcript has a full exchange
    fn fold_one_sided(exchanges: Vec<Exchange>) -> Vec<Exchange> {
        if !exchanges.iter().any(Exchange::is_complete) {
            return exchanges;
        }

        let mut merged: Vec<Exchange> = Vec::with_capacity(exchanges.len());
        let mut leading: Option<Exchange> = None;

        for exchange in exchanges {
            if exchange.is_complete() {
                let combined = match leading.take() {
                    Some(mut prefix) => {
                        prefix.append(exchange);
                        prefix
                    }
                    None => exchange,
                };
                merged.push(combined);
            } else if let Some(previous) = merged.last_mut() {
                previous.append(exchange);
            } else {
                match leading.as_mut() {
                    Some(prefix) => prefix.append(exchange),
                    None => leading = Some(exchange),
                }
            }
        }

        merged
    }
}
