//! End-to-end checks over real-shaped session files:
//! load -> validate -> tree -> branch -> stats.

use cctree_core::{
    build_tree, compute_stats, compute_stats_by_model, select_active_branch,
    select_summary_branches, validate, validate_with, DecodeFailureReason, Finding, LoadError,
    LoadOptions, Message,
};
use cctree_parsers::{parse_session_file, parse_session_file_async, session_id_from_path};
use cctree_runtime_config::{load_config_or_default, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn branching_session_loads_in_file_order() {
    let (conversation, failures) =
        parse_session_file(&fixture("branching_session.jsonl"), &LoadOptions::default())
            .expect("load fixture");

    assert_eq!(conversation.summaries.len(), 2);
    let uuids: Vec<&str> = conversation.messages.iter().map(Message::uuid).collect();
    assert_eq!(uuids, vec!["u1", "a1", "u2", "a2", "u3", "a3-retry", "side1"]);
    assert_eq!(
        conversation.session_id(),
        Some("7c1e0f52-2b1d-4f7e-9a53-0d6f0c1b9e11")
    );
    assert_eq!(
        conversation.summary_for_leaf("a2").map(|s| s.summary.as_str()),
        Some("Inspect failing request")
    );

    // The snapshot line is the only one the decoder does not know.
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].line_number, 8);
    assert_eq!(failures[0].unknown_type(), Some("file-history-snapshot"));
}

#[test]
fn branching_session_tree_and_branches() {
    let (conversation, _) =
        parse_session_file(&fixture("branching_session.jsonl"), &LoadOptions::default())
            .expect("load fixture");
    let tree = build_tree(&conversation.messages);

    assert_eq!(tree.len(), 7);
    assert_eq!(tree.roots().collect::<Vec<_>>(), vec!["u1"]);
    assert_eq!(tree.orphans().count(), 0);
    assert_eq!(tree.children("u1").collect::<Vec<_>>(), vec!["a1", "u3"]);
    assert_eq!(
        tree.leaves().collect::<Vec<_>>(),
        vec!["a2", "a3-retry", "side1"]
    );

    let active = select_active_branch(&tree, None);
    assert_eq!(active, vec!["u1", "u3", "a3-retry"]);

    let branches = select_summary_branches(&tree, &conversation.summaries);
    assert_eq!(branches[0].1, vec!["u1", "u3", "a3-retry"]);
    assert_eq!(branches[1].1, vec!["u1", "a1", "u2", "a2"]);
}

#[test]
fn branching_session_validation() {
    let (conversation, _) =
        parse_session_file(&fixture("branching_session.jsonl"), &LoadOptions::default())
            .expect("load fixture");

    let findings = validate(&conversation);
    assert_eq!(findings.len(), 1);
    assert!(matches!(
        &findings[0],
        Finding::NonChronologicalTimestamp { uuid, .. } if uuid == "side1"
    ));

    let relaxed = cctree_core::ValidateOptions {
        check_timestamps: false,
        ..Default::default()
    };
    assert!(validate_with(&conversation, &relaxed).is_empty());
}

#[test]
fn branching_session_stats() {
    let (conversation, _) =
        parse_session_file(&fixture("branching_session.jsonl"), &LoadOptions::default())
            .expect("load fixture");

    let all = compute_stats(&conversation.messages);
    assert!(approx(all.total_cost_usd, 0.04));
    assert_eq!(all.total_tokens.input, 420);
    assert_eq!(all.total_tokens.output, 160);
    assert_eq!(all.total_tokens.cache_creation, 10);
    assert_eq!(all.total_tokens.cache_read, 40);
    assert!(approx(all.average_response_time_ms, 2000.0));
    assert_eq!(all.message_count.user, 4);
    assert_eq!(all.message_count.assistant, 3);

    let tree = build_tree(&conversation.messages);
    let active = select_active_branch(&tree, None);
    let branch = compute_stats(tree.resolve(&active));
    assert!(approx(branch.total_cost_usd, 0.02));
    assert!(approx(branch.average_response_time_ms, 3000.0));
    assert_eq!(branch.message_count.user, 2);
    assert_eq!(branch.message_count.assistant, 1);

    let by_model = compute_stats_by_model(&conversation.messages);
    let models: Vec<&str> = by_model.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(models, vec!["claude-sonnet-4", "claude-opus-4"]);
    assert!(approx(by_model[0].1.total_cost_usd, 0.02));
}

#[test]
fn tool_result_is_paired_with_tool_use() {
    let (conversation, _) =
        parse_session_file(&fixture("branching_session.jsonl"), &LoadOptions::default())
            .expect("load fixture");

    let a1 = &conversation.messages[1];
    assert_eq!(a1.tool_use_ids().collect::<Vec<_>>(), vec!["toolu_01"]);
    assert_eq!(a1.model(), Some("claude-sonnet-4"));
    assert_eq!(a1.text(), "Let me run the tests first.");

    let u2 = conversation.messages[2].as_user().expect("u2 is a user message");
    let cctree_core::UserContent::Blocks(blocks) = &u2.message.content else {
        panic!("expected tool result blocks");
    };
    assert!(matches!(
        &blocks[0],
        cctree_core::UserContentBlock::ToolResult { tool_use_id, is_error: Some(true), .. }
            if tool_use_id == "toolu_01"
    ));
}

#[test]
fn config_can_ignore_snapshot_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &config_path,
        "[loader]\nignored_entry_types = [\"file-history-snapshot\"]\n",
    )
    .expect("write config");

    let config = load_config_or_default(&config_path).expect("load config");
    let (conversation, failures) = parse_session_file(
        &fixture("branching_session.jsonl"),
        &config.load_options(),
    )
    .expect("load fixture");
    assert!(failures.is_empty());
    assert_eq!(conversation.messages.len(), 7);
}

#[test]
fn malformed_session_reports_each_bad_line() {
    let (conversation, failures) =
        parse_session_file(&fixture("malformed_session.jsonl"), &LoadOptions::default())
            .expect("load fixture");

    let uuids: Vec<&str> = conversation.messages.iter().map(Message::uuid).collect();
    assert_eq!(uuids, vec!["u1", "a1", "a3", "a3", "c1", "c2"]);
    // a1 has no timestamp but still decodes.
    assert_eq!(conversation.messages[1].timestamp(), None);

    let lines: Vec<usize> = failures.iter().map(|f| f.line_number).collect();
    assert_eq!(lines, vec![2, 3, 4, 6]);
    assert!(matches!(
        failures[0].reason,
        DecodeFailureReason::InvalidJson { .. }
    ));
    assert_eq!(failures[1].unknown_type(), Some("progress"));
    assert_eq!(
        failures[2].reason,
        DecodeFailureReason::UnknownType { found: None }
    );
    assert!(matches!(
        failures[3].reason,
        DecodeFailureReason::InvalidField { .. }
    ));
}

#[test]
fn malformed_session_findings_and_tree() {
    let (conversation, _) =
        parse_session_file(&fixture("malformed_session.jsonl"), &LoadOptions::default())
            .expect("load fixture");

    let findings = validate(&conversation);
    assert_eq!(
        findings,
        vec![
            Finding::DuplicateUuid {
                uuid: "a3".to_string(),
                occurrences: vec![7, 8],
            },
            Finding::UnresolvedParent {
                child_uuid: "a3".to_string(),
                parent_uuid: "ghost".to_string(),
            },
            Finding::DuplicateToolUseId {
                id: "toolu_dup".to_string(),
                occurrences: vec![7, 8],
            },
            Finding::CycleBroken {
                uuid: "c1".to_string(),
                parent_uuid: "c2".to_string(),
            },
        ]
    );

    let tree = build_tree(&conversation.messages);
    assert_eq!(tree.len(), 5);
    assert_eq!(tree.children("u1").collect::<Vec<_>>(), vec!["a1"]);
    assert_eq!(tree.roots().collect::<Vec<_>>(), vec!["u1", "a3", "c1"]);
    assert_eq!(tree.orphans().collect::<Vec<_>>(), vec!["a3"]);
    // The first a3 (line 7) is the one kept.
    assert_eq!(tree.get("a3").map(Message::line_number), Some(7));

    // c2 carries the newest timestamp, so the repaired cycle is active.
    assert_eq!(select_active_branch(&tree, None), vec!["c1", "c2"]);
}

#[test]
fn session_id_matches_file_stem() {
    let path = fixture("branching_session.jsonl");
    assert_eq!(session_id_from_path(&path), Some("branching_session"));
}

#[test]
fn missing_session_file_is_invalid_input() {
    let err = parse_session_file(&fixture("does_not_exist.jsonl"), &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, LoadError::InvalidInput { .. }));
}

#[tokio::test]
async fn async_load_matches_blocking_load() {
    let path = fixture("branching_session.jsonl");
    let blocking = parse_session_file(&path, &LoadOptions::default()).expect("blocking load");
    let nonblocking = parse_session_file_async(&path, &LoadOptions::default())
        .await
        .expect("async load");
    assert_eq!(blocking, nonblocking);
}

#[tokio::test]
async fn async_load_of_malformed_session_is_not_fatal() {
    let (conversation, failures) =
        parse_session_file_async(&fixture("malformed_session.jsonl"), &LoadOptions::default())
            .await
            .expect("async load");
    assert_eq!(conversation.messages.len(), 6);
    assert_eq!(failures.len(), 4);
}
