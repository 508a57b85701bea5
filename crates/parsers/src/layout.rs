//! On-disk conventions of Claude Code session storage.
//!
//! ```text
//! ~/.claude/projects/
//!   -Users-me-work-app/          <- encode_project_dir("/Users/me/work/app")
//!     0f5c...e1.jsonl            <- one conversation, named by session id
//!     agent-1a2b.jsonl           <- subagent transcript, not a session
//! ```
//!
//! Read-only helpers; nothing here writes to the store.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const SESSION_EXTENSION: &str = "jsonl";

/// Directory name for a project path: every character that is not ASCII
/// alphanumeric becomes `-`, so `/a/b` maps to `-a-b`.
pub fn encode_project_dir(project_path: &str) -> String {
    project_path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// `<projects_root>/<encoded project>/<session_id>.jsonl`
pub fn session_file_path(projects_root: &Path, project_path: &str, session_id: &str) -> PathBuf {
    projects_root
        .join(encode_project_dir(project_path))
        .join(format!("{session_id}.{SESSION_EXTENSION}"))
}

/// Session id of a session file: its file stem. `None` for anything that is
/// not a session file.
pub fn session_id_from_path(path: &Path) -> Option<&str> {
    if !is_session_file(path) {
        return None;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
}

pub fn is_session_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SESSION_EXTENSION) && !is_subagent_path(path)
}

/// Subagent transcripts live in `subagents/` directories or carry an
/// `agent-` style file name prefix.
pub fn is_subagent_path(path: &Path) -> bool {
    if path.components().any(|c| c.as_os_str() == "subagents") {
        return true;
    }

    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    ["agent-", "agent_", "subagent-", "subagent_"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// All session files below `projects_root`, sorted by path.
pub fn find_session_files(projects_root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.{SESSION_EXTENSION}", projects_root.display());
    let paths = glob::glob(&pattern)
        .with_context(|| format!("invalid session search pattern {pattern}"))?;

    let mut files: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::debug!("Skipping unreadable path: {err}");
                None
            }
        })
        .filter(|path| is_session_file(path))
        .collect();
    files.sort();
    Ok(files)
}
