//! Line sources for `cctree-core`: session files on disk, blocking or async,
//! and the `~/.claude/projects` directory conventions.

pub mod layout;
mod source;

pub use layout::{
    encode_project_dir, find_session_files, is_session_file, is_subagent_path,
    session_file_path, session_id_from_path,
};
pub use source::{
    load_conversation_async, open_session_file, parse_session_file, parse_session_file_async,
};
