use crate::entry::Message;
use crate::jsonl::Conversation;
use crate::tree::build_tree;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A structural anomaly in an otherwise decoded conversation.
///
/// Findings are advisory: the tree builder and stats accept a conversation
/// regardless of what is reported here. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Finding {
    #[error("duplicate uuid {uuid} on lines {occurrences:?}")]
    DuplicateUuid { uuid: String, occurrences: Vec<usize> },
    #[error("message {child_uuid} references unknown parent {parent_uuid}")]
    UnresolvedParent {
        child_uuid: String,
        parent_uuid: String,
    },
    #[error("message {uuid} at {this} is older than its predecessor at {previous}")]
    NonChronologicalTimestamp {
        uuid: String,
        previous: DateTime<Utc>,
        this: DateTime<Utc>,
    },
    #[error("duplicate tool_use id {id} on lines {occurrences:?}")]
    DuplicateToolUseId { id: String, occurrences: Vec<usize> },
    #[error("cycle broken at {uuid}, detached from {parent_uuid}")]
    CycleBroken { uuid: String, parent_uuid: String },
}

/// Which checks [`validate_with`] runs. Uuid and parent checks always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    pub check_timestamps: bool,
    pub check_tool_use_ids: bool,
    pub check_cycles: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            check_timestamps: true,
            check_tool_use_ids: true,
            check_cycles: true,
        }
    }
}

/// Run every check against a conversation.
pub fn validate(conversation: &Conversation) -> Vec<Finding> {
    validate_with(conversation, &ValidateOptions::default())
}

/// Validate a conversation by composing independent validators.
pub fn validate_with(conversation: &Conversation, options: &ValidateOptions) -> Vec<Finding> {
    let mut validators: Vec<fn(&[Message]) -> Vec<Finding>> =
        vec![duplicate_uuids, unresolved_parents];
    if options.check_timestamps {
        validators.push(non_chronological_timestamps);
    }
    if options.check_tool_use_ids {
        validators.push(duplicate_tool_use_ids);
    }
    if options.check_cycles {
        validators.push(broken_cycles);
    }

    validators
        .iter()
        .flat_map(|v| v(&conversation.messages))
        .collect()
}

/// Group line numbers by key, keeping keys in first-seen order.
fn occurrences<'a>(keys: impl Iterator<Item = (&'a str, usize)>) -> Vec<(&'a str, Vec<usize>)> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut grouped: Vec<(&str, Vec<usize>)> = Vec::new();
    for (key, line) in keys {
        match slots.get(key) {
            Some(&slot) => grouped[slot].1.push(line),
            None => {
                slots.insert(key, grouped.len());
                grouped.push((key, vec![line]));
            }
        }
    }
    grouped
}

fn duplicate_uuids(messages: &[Message]) -> Vec<Finding> {
    occurrences(messages.iter().map(|m| (m.uuid(), m.line_number())))
        .into_iter()
        .filter(|(_, lines)| lines.len() > 1)
        .map(|(uuid, occurrences)| Finding::DuplicateUuid {
            uuid: uuid.to_string(),
            occurrences,
        })
        .collect()
}

fn unresolved_parents(messages: &[Message]) -> Vec<Finding> {
    let known: HashSet<&str> = messages.iter().map(Message::uuid).collect();
    messages
        .iter()
        .filter_map(|m| {
            let parent = m.parent_uuid()?;
            (!known.contains(parent)).then(|| Finding::UnresolvedParent {
                child_uuid: m.uuid().to_string(),
                parent_uuid: parent.to_string(),
            })
        })
        .collect()
}

/// File order is not chronological order once a session branches, so this
/// only reports. Each stamped message is compared with the nearest stamped
/// message before it.
fn non_chronological_timestamps(messages: &[Message]) -> Vec<Finding> {
    let mut previous: Option<DateTime<Utc>> = None;
    let mut findings = Vec::new();
    for message in messages {
        let Some(this) = message.timestamp() else {
            continue;
        };
        if let Some(previous) = previous.filter(|previous| this < *previous) {
            findings.push(Finding::NonChronologicalTimestamp {
                uuid: message.uuid().to_string(),
                previous,
                this,
            });
        }
        previous = Some(this);
    }
    findings
}

fn duplicate_tool_use_ids(messages: &[Message]) -> Vec<Finding> {
    let ids = messages
        .iter()
        .flat_map(|m| m.tool_use_ids().map(move |id| (id, m.line_number())));
    occurrences(ids)
        .into_iter()
        .filter(|(_, lines)| lines.len() > 1)
        .map(|(id, occurrences)| Finding::DuplicateToolUseId {
            id: id.to_string(),
            occurrences,
        })
        .collect()
}

fn broken_cycles(messages: &[Message]) -> Vec<Finding> {
    build_tree(messages).findings().to_vec()
}
