//! Active branch selection: the single root-to-leaf path a replay follows.

use crate::entry::{Message, SummaryEntry};
use crate::tree::ConversationTree;
use chrono::{DateTime, Utc};

/// Pick the active branch of `tree`.
///
/// With a `leaf_hint` that names a known node, the branch is the chain from
/// its root down to that node. Otherwise the root whose subtree holds the
/// latest timestamp wins, and the walk descends through the latest-stamped
/// child at every fork until it reaches a leaf. Ties go to the earlier node in
/// file order. A message without a timestamp ranks below every stamped one.
/// Sidechain flags play no part.
///
/// An empty tree yields an empty branch.
pub fn select_active_branch<'a>(
    tree: &ConversationTree<'a>,
    leaf_hint: Option<&str>,
) -> Vec<&'a str> {
    if let Some(hint) = leaf_hint {
        match tree.path_to(hint) {
            Some(path) => return path,
            None => tracing::debug!(leaf = hint, "Leaf hint not in tree, using latest branch"),
        }
    }

    let Some(root) = latest_root(tree) else {
        return Vec::new();
    };

    let mut branch = vec![root];
    let mut current = root;
    while let Some(next) = latest_child(tree, current) {
        branch.push(next);
        current = next;
    }
    branch
}

/// One branch per summary, each selected independently with the summary's
/// `leafUuid` as hint.
pub fn select_summary_branches<'s, 'a>(
    tree: &ConversationTree<'a>,
    summaries: &'s [SummaryEntry],
) -> Vec<(&'s SummaryEntry, Vec<&'a str>)> {
    summaries
        .iter()
        .map(|summary| (summary, select_active_branch(tree, Some(&summary.leaf_uuid))))
        .collect()
}

fn timestamp(tree: &ConversationTree<'_>, uuid: &str) -> Option<DateTime<Utc>> {
    tree.get(uuid).and_then(Message::timestamp)
}

/// Keep the first candidate unless a later one is strictly newer.
fn latest<'a>(
    candidates: impl Iterator<Item = (&'a str, Option<DateTime<Utc>>)>,
) -> Option<&'a str> {
    let mut best: Option<(&'a str, Option<DateTime<Utc>>)> = None;
    for (uuid, ts) in candidates {
        match best {
            Some((_, best_ts)) if ts <= best_ts => {}
            _ => best = Some((uuid, ts)),
        }
    }
    best.map(|(uuid, _)| uuid)
}

fn latest_root<'a>(tree: &ConversationTree<'a>) -> Option<&'a str> {
    latest(tree.roots().map(|root| {
        let newest = tree
            .depth_first_from(root)
            .filter_map(|uuid| timestamp(tree, uuid))
            .max();
        (root, newest)
    }))
}

fn latest_child<'a>(tree: &ConversationTree<'a>, uuid: &str) -> Option<&'a str> {
    latest(tree.children(uuid).map(|child| (child, timestamp(tree, child))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sidechain, user};
    use crate::tree::build_tree;

    fn assert_connected(tree: &ConversationTree<'_>, branch: &[&str]) {
        for pair in branch.windows(2) {
            assert_eq!(tree.parent(pair[1]), Some(pair[0]));
        }
        if let Some(first) = branch.first() {
            assert_eq!(tree.parent(first), None);
        }
    }

    #[test]
    fn test_sidechain_with_latest_timestamp_wins() {
        let messages = vec![
            user("A", None, 1),
            user("B", Some("A"), 2),
            sidechain(user("C", Some("A"), 3)),
        ];
        let tree = build_tree(&messages);
        let branch = select_active_branch(&tree, None);
        assert_eq!(branch, vec!["A", "C"]);
        assert_connected(&tree, &branch);
    }

    #[test]
    fn test_descends_to_leaf() {
        let messages = vec![
            user("r", None, 0),
            user("a", Some("r"), 1),
            user("a1", Some("a"), 2),
            user("a2", Some("a1"), 3),
            user("b", Some("r"), 4),
        ];
        let tree = build_tree(&messages);
        let branch = select_active_branch(&tree, None);
        // b is the newer child of r
        assert_eq!(branch, vec!["r", "b"]);
        assert!(tree.is_leaf(branch[branch.len() - 1]));
        assert_connected(&tree, &branch);
    }

    #[test]
    fn test_tie_goes_to_earliest_child() {
        let messages = vec![
            user("r", None, 0),
            user("first", Some("r"), 5),
            user("second", Some("r"), 5),
        ];
        let tree = build_tree(&messages);
        assert_eq!(select_active_branch(&tree, None), vec!["r", "first"]);
    }

    #[test]
    fn test_root_with_latest_subtree_wins() {
        let messages = vec![
            user("old-root", None, 0),
            user("newest", Some("old-root"), 100),
            user("new-root", None, 50),
            user("mid", Some("new-root"), 60),
        ];
        let tree = build_tree(&messages);
        assert_eq!(
            select_active_branch(&tree, None),
            vec!["old-root", "newest"]
        );
    }

    #[test]
    fn test_root_tie_goes_to_earliest_root() {
        let messages = vec![user("r1", None, 7), user("r2", None, 7)];
        let tree = build_tree(&messages);
        assert_eq!(select_active_branch(&tree, None), vec!["r1"]);
    }

    #[test]
    fn test_unstamped_child_ranks_below_stamped_sibling() {
        let (conversation, failures) = crate::jsonl::parse_str(concat!(
            r#"{"type":"user","uuid":"r","timestamp":"2025-06-01T10:00:00Z","message":{"role":"user","content":"a"}}"#,
            "\n",
            r#"{"type":"user","uuid":"stamped","parentUuid":"r","timestamp":"2025-06-01T10:00:01Z","message":{"role":"user","content":"b"}}"#,
            "\n",
            r#"{"type":"user","uuid":"bare","parentUuid":"r","message":{"role":"user","content":"c"}}"#,
            "\n",
            r#"{"type":"user","uuid":"below-bare","parentUuid":"bare","timestamp":"2025-06-01T09:00:00Z","message":{"role":"user","content":"d"}}"#,
        ));
        assert!(failures.is_empty());
        let tree = build_tree(&conversation.messages);
        // The child of the unstamped message keeps its place in the tree.
        assert_eq!(tree.parent("below-bare"), Some("bare"));
        assert_eq!(select_active_branch(&tree, None), vec!["r", "stamped"]);
        assert_eq!(
            select_active_branch(&tree, Some("below-bare")),
            vec!["r", "bare", "below-bare"]
        );
    }

    #[test]
    fn test_leaf_hint() {
        let messages = vec![
            user("A", None, 1),
            user("B", Some("A"), 2),
            user("C", Some("A"), 3),
        ];
        let tree = build_tree(&messages);
        assert_eq!(select_active_branch(&tree, Some("B")), vec!["A", "B"]);
    }

    #[test]
    fn test_unknown_leaf_hint_falls_back() {
        let messages = vec![
            user("A", None, 1),
            user("B", Some("A"), 2),
            user("C", Some("A"), 3),
        ];
        let tree = build_tree(&messages);
        assert_eq!(select_active_branch(&tree, Some("nope")), vec!["A", "C"]);
    }

    #[test]
    fn test_empty_tree_gives_empty_branch() {
        let tree = build_tree(&[]);
        assert!(select_active_branch(&tree, None).is_empty());
        assert!(select_active_branch(&tree, Some("x")).is_empty());
    }

    #[test]
    fn test_cycle_broken_tree_still_terminates() {
        let messages = vec![user("x", Some("y"), 1), user("y", Some("x"), 2)];
        let tree = build_tree(&messages);
        let branch = select_active_branch(&tree, None);
        assert_eq!(branch, vec!["x", "y"]);
        assert_connected(&tree, &branch);
    }

    #[test]
    fn test_summary_branches_are_independent() {
        let messages = vec![
            user("A", None, 1),
            user("B", Some("A"), 2),
            user("C", Some("A"), 3),
        ];
        let summaries = vec![
            SummaryEntry {
                summary: "first try".to_string(),
                leaf_uuid: "B".to_string(),
            },
            SummaryEntry {
                summary: "second try".to_string(),
                leaf_uuid: "C".to_string(),
            },
        ];
        let tree = build_tree(&messages);
        let branches = select_summary_branches(&tree, &summaries);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].1, vec!["A", "B"]);
        assert_eq!(branches[1].1, vec!["A", "C"]);
    }
}
