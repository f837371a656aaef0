use std::path::Path;
use anyhow::{Result, Context};

const UNKNOWN_MIME: &str = "application/octet-stream";

/// MIME type of `path` from its leading bytes; unrecognized content is octet-stream.
pub fn sniff_mime(path: &Path) -> Result<&'static str> {
    let kind = infer::get_from_path(path)
        .with_context(|| format!("Failed to read {:?} for content sniffing", path))?;
    Ok(kind.map_or(UNKNOWN_MIME, |k| k.mime_type()))
}

pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}
