use crate::entry::{Message, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cost, token and timing totals over a set of messages.
///
/// Absent optional fields count as zero, except `durationMs`, which only
/// assistant messages that carry it contribute to the average.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_cost_usd: f64,
    pub total_tokens: TokenTotals,
    /// `0.0` when no message reports a duration.
    pub average_response_time_ms: f64,
    pub message_count: MessageCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub cache_creation: u64,
    pub cache_read: u64,
}

impl TokenTotals {
    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.cache_creation)
            .saturating_add(self.cache_read)
    }

    fn add(&mut self, other: &TokenTotals) {
        self.input = self.input.saturating_add(other.input);
        self.output = self.output.saturating_add(other.output);
        self.cache_creation = self.cache_creation.saturating_add(other.cache_creation);
        self.cache_read = self.cache_read.saturating_add(other.cache_read);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCount {
    pub user: u64,
    pub assistant: u64,
}

impl MessageCount {
    pub fn total(&self) -> u64 {
        self.user + self.assistant
    }
}

/// Running totals. Accumulators over disjoint partitions can be merged in any
/// order and finish to the same [`Stats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsAccumulator {
    cost_usd: f64,
    tokens: TokenTotals,
    duration_total_ms: u64,
    timed_responses: u64,
    message_count: MessageCount,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: &Message) {
        let assistant = match message {
            Message::User(_) => {
                self.message_count.user += 1;
                return;
            }
            Message::Assistant(assistant) => assistant,
        };
        self.message_count.assistant += 1;

        // Negative or non-finite costs are treated as missing.
        if let Some(cost) = assistant.cost_usd.filter(|c| c.is_finite() && *c > 0.0) {
            self.cost_usd += cost;
        }

        if let Some(usage) = &assistant.message.usage {
            self.tokens.add(&TokenTotals {
                input: usage.input_tokens.unwrap_or(0),
                output: usage.output_tokens.unwrap_or(0),
                cache_creation: usage.cache_creation_input_tokens.unwrap_or(0),
                cache_read: usage.cache_read_input_tokens.unwrap_or(0),
            });
        }

        if let Some(duration) = assistant.duration_ms {
            self.duration_total_ms = self.duration_total_ms.saturating_add(duration);
            self.timed_responses += 1;
        }
    }

    pub fn merge(&mut self, other: &StatsAccumulator) {
        self.cost_usd += other.cost_usd;
        self.tokens.add(&other.tokens);
        self.duration_total_ms = self.duration_total_ms.saturating_add(other.duration_total_ms);
        self.timed_responses += other.timed_responses;
        self.message_count.user += other.message_count.user;
        self.message_count.assistant += other.message_count.assistant;
    }

    pub fn finish(&self) -> Stats {
        let average_response_time_ms = if self.timed_responses == 0 {
            0.0
        } else {
            self.duration_total_ms as f64 / self.timed_responses as f64
        };
        Stats {
            total_cost_usd: self.cost_usd,
            total_tokens: self.tokens,
            average_response_time_ms,
            message_count: self.message_count,
        }
    }
}

impl<'a> Extend<&'a Message> for StatsAccumulator {
    fn extend<I: IntoIterator<Item = &'a Message>>(&mut self, iter: I) {
        for message in iter {
            self.add(message);
        }
    }
}

/// Single pass over any message sequence: a whole conversation, or the
/// messages of one branch.
pub fn compute_stats<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Stats {
    let mut acc = StatsAccumulator::new();
    acc.extend(messages);
    acc.finish()
}

/// Stats per assistant model. User messages carry no model and are left out.
/// Results sorted by assistant message count descending, then model name.
pub fn compute_stats_by_model<'a>(
    messages: impl IntoIterator<Item = &'a Message>,
) -> Vec<(String, Stats)> {
    let mut map = HashMap::<String, StatsAccumulator>::new();
    for message in messages {
        if message.role() != Role::Assistant {
            continue;
        }
        let model = message.model().unwrap_or("unknown").to_string();
        map.entry(model).or_default().add(message);
    }
    let mut result: Vec<(String, Stats)> = map
        .into_iter()
        .map(|(model, acc)| (model, acc.finish()))
        .collect();
    result.sort_by(|a, b| {
        b.1.message_count
            .assistant
            .cmp(&a.1.message_count.assistant)
            .then_with(|| a.0.cmp(&b.0))
    });
    result
}
