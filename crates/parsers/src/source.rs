use cctree_core::{
    parse_reader, Conversation, ConversationBuilder, DecodeFailure, LoadError, LoadOptions,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Open a session file for line-by-line reading.
///
/// This is the only place a load fails before reading its first line.
pub fn open_session_file(path: &Path) -> Result<BufReader<File>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::InvalidInput {
        path: path.display().to_string(),
        source,
    })?;
    Ok(BufReader::new(file))
}

pub fn parse_session_file(
    path: &Path,
    options: &LoadOptions,
) -> Result<(Conversation, Vec<DecodeFailure>), LoadError> {
    tracing::debug!(path = %path.display(), "Loading session file");
    parse_reader(open_session_file(path)?, options)
}

/// Async counterpart of [`cctree_core::parse_reader`]. Yields to the runtime
/// between lines, so dropping the future abandons the load cleanly.
pub async fn load_conversation_async<R>(
    mut reader: R,
    options: &LoadOptions,
) -> Result<(Conversation, Vec<DecodeFailure>), LoadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut builder = ConversationBuilder::new(options.clone());
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
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

pub async fn parse_session_file_async(
    path: &Path,
    options: &LoadOptions,
) -> Result<(Conversation, Vec<DecodeFailure>), LoadError> {
    tracing::debug!(path = %path.display(), "Loading session file");
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| LoadError::InvalidInput {
            path: path.display().to_string(),
            source,
        })?;
    load_conversation_async(tokio::io::BufReader::new(file), options).await
}
