pub mod branch;
pub mod decode;
pub mod entry;
pub mod jsonl;
pub mod stats;
pub mod tree;
pub mod validate;

pub use branch::{select_active_branch, select_summary_branches};
pub use decode::{decode_line, DecodeFailure, DecodeFailureReason};
pub use entry::*;
pub use jsonl::{
    parse, parse_reader, parse_str, parse_with, Conversation, ConversationBuilder, LoadError,
    LoadOptions,
};
pub use stats::{compute_stats, compute_stats_by_model, Stats, StatsAccumulator};
pub use tree::{build_tree, ConversationTree, DepthFirst};
pub use validate::{validate, validate_with, Finding, ValidateOptions};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
