//! Conversation loading: a flat, ordered collection of decoded entries.
//!
//! A Claude Code session file is append-only JSONL:
//! ```jsonl
//! {"type":"summary","summary":"...","leafUuid":"..."}
//! {"type":"user","uuid":"u1","parentUuid":null,...}
//! {"type":"assistant","uuid":"a1","parentUuid":"u1",...}
//! ```
//!
//! Loading never reorders, deduplicates or validates. Lines that fail to
//! decode are collected next to the conversation instead of aborting it.

use crate::decode::{decode_line, DecodeFailure, DecodeFailureReason};
use crate::entry::{Message, Role, SummaryEntry};
use std::io::{self, BufRead};

/// Summaries and messages of one session file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    pub summaries: Vec<SummaryEntry>,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Session id of the first message that carries one.
    pub fn session_id(&self) -> Option<&str> {
        self.messages
            .iter()
            .find_map(|message| message.header().session_id.as_deref())
    }

    /// The last summary labelling `leaf_uuid`.
    pub fn summary_for_leaf(&self, leaf_uuid: &str) -> Option<&SummaryEntry> {
        self.summaries
            .iter()
            .rev()
            .find(|summary| summary.leaf_uuid == leaf_uuid)
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role() == Role::User)
    }

    pub fn assistant_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role() == Role::Assistant)
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty() && self.messages.is_empty()
    }
}

/// Hard failures: the line source itself is unusable.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    InvalidInput { path: String, source: io::Error },
    #[error("IO error after line {line}: {source}")]
    Io { line: usize, source: io::Error },
}

/// Loader knobs. Defaults follow the on-disk format exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Blank lines are skipped instead of reported as invalid JSON.
    pub skip_blank_lines: bool,
    /// Lines longer than this many bytes are reported without decoding.
    pub max_line_bytes: Option<usize>,
    /// Entry types dropped silently instead of reported as unknown.
    pub ignored_entry_types: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            skip_blank_lines: true,
            max_line_bytes: None,
            ignored_entry_types: Vec::new(),
        }
    }
}

/// Push-based loader: feed lines as they arrive, stop whenever.
///
/// Each [`push_line`](Self::push_line) is independent of the next, so a caller
/// reading from a slow source can suspend between lines or abandon the load
/// without any cleanup.
#[derive(Debug, Default)]
pub struct ConversationBuilder {
    options: LoadOptions,
    conversation: Conversation,
    failures: Vec<DecodeFailure>,
    line_number: usize,
    skipped: usize,
}

impl ConversationBuilder {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn push_line(&mut self, line: &str) {
        self.line_number += 1;
        let line = line.trim_end_matches(['\r', '\n']);

        if self.options.skip_blank_lines && line.trim().is_empty() {
            self.skipped += 1;
            return;
        }

        if let Some(max) = self.options.max_line_bytes {
            if line.len() > max {
                self.record_failure(DecodeFailure::new(
                    self.line_number,
                    line,
                    DecodeFailureReason::LineTooLong {
                        len: line.len(),
                        max,
                    },
                ));
                return;
            }
        }

        match decode_line(self.line_number, line) {
            Ok(entry) => match entry.into_message() {
                Ok(message) => self.conversation.messages.push(message),
                Err(summary) => self.conversation.summaries.push(summary),
            },
            Err(failure) => {
                let ignored = failure.unknown_type().is_some_and(|t| {
                    self.options.ignored_entry_types.iter().any(|i| i == t)
                });
                if ignored {
                    self.skipped += 1;
                } else {
                    self.record_failure(failure);
                }
            }
        }
    }

    /// Like [`push_line`](Self::push_line) for a raw line that may not be
    /// UTF-8. Such a line becomes an `InvalidEncoding` failure.
    pub fn push_bytes(&mut self, line: &[u8]) {
        match std::str::from_utf8(line) {
            Ok(text) => self.push_line(text),
            Err(err) => {
                self.line_number += 1;
                let raw = String::from_utf8_lossy(line);
                self.record_failure(DecodeFailure::new(
                    self.line_number,
                    raw.trim_end_matches(['\r', '\n']),
                    DecodeFailureReason::InvalidEncoding {
                        message: err.to_string(),
                    },
                ));
            }
        }
    }

    fn record_failure(&mut self, failure: DecodeFailure) {
        tracing::debug!(
            line = failure.line_number,
            "Skipping undecodable JSONL line: {}",
            failure.reason
        );
        self.failures.push(failure);
    }

    /// Lines consumed so far, blank and ignored ones included.
    pub fn line_count(&self) -> usize {
        self.line_number
    }

    pub fn failures(&self) -> &[DecodeFailure] {
        &self.failures
    }

    pub fn finish(self) -> (Conversation, Vec<DecodeFailure>) {
        tracing::trace!(
            lines = self.line_number,
            summaries = self.conversation.summaries.len(),
            messages = self.conversation.messages.len(),
            failures = self.failures.len(),
            skipped = self.skipped,
            "Loaded conversation"
        );
        (self.conversation, self.failures)
    }
}

/// Load a conversation from any line source with default options.
pub fn parse<I, S>(lines: I) -> Result<(Conversation, Vec<DecodeFailure>), LoadError>
where
    I: IntoIterator<Item = io::Result<S>>,
    S: AsRef<str>,
{
    parse_with(lines, &LoadOptions::default())
}

/// Load a conversation from any line source.
///
/// The source is consumed lazily; only a failing read stops the load.
pub fn parse_with<I, S>(
    lines: I,
    options: &LoadOptions,
) -> Result<(Conversation, Vec<DecodeFailure>), LoadError>
where
    I: IntoIterator<Item = io::Result<S>>,
    S: AsRef<str>,
{
    let mut builder = ConversationBuilder::new(options.clone());
    for line in lines {
        let line = line.map_err(|source| LoadError::Io {
            line: builder.line_count(),
            source,
        })?;
        builder.push_line(line.as_ref());
    }
    Ok(builder.finish())
}

/// Load from a byte reader. Lines are split on `\n` before any UTF-8 check,
/// so a badly encoded line is reported on its own and the rest still loads.
pub fn parse_reader<R: BufRead>(
    mut reader: R,
    options: &LoadOptions,
) -> Result<(Conversation, Vec<DecodeFailure>), LoadError> {
    let mut builder = ConversationBuilder::new(options.clone());
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| LoadError::Io {
                line: builder.line_count(),
                source,
            })?;
        if read == 0 {
            break;
        }
        builder.push_bytes(&buf);
    }
    Ok(builder.finish())
}

/// Load from an in-memory string. Cannot fail hard.
pub fn parse_str(data: &str) -> (Conversation, Vec<DecodeFailure>) {
    let mut builder = ConversationBuilder::new(LoadOptions::default());
    for line in data.lines() {
        builder.push_line(line);
    }
    builder.finish()
}
