//! Remote-path helpers shared by the operations layer.

pub const PATH_SEPARATOR: char = '/';

// Reserved on servers that predate the relaxed naming rules (< 8.1).
const FORBIDDEN_CHARS: [char; 8] = ['\\', '<', '>', ':', '"', '|', '?', '*'];

/// Validates a remote path against the server's filename rules.
///
/// Every server rejects empty paths; only servers flagged with the legacy
/// restriction reject the reserved character set inside path segments.
pub fn is_valid_path(remote_path: &str, server_has_forbidden_chars: bool) -> bool {
    if remote_path.is_empty() || !remote_path.starts_with(PATH_SEPARATOR) {
        return false;
    }
    if server_has_forbidden_chars {
        !remote_path.contains(&FORBIDDEN_CHARS[..])
    } else {
        true
    }
}

/// Parent of a remote path: `/a/b/c` -> `/a/b`, `/a` -> `/`.
/// Trailing slashes are ignored, so `/a/b/` also yields `/a`.
pub fn parent_path(remote_path: &str) -> String {
    let trimmed = remote_path.trim_end_matches(PATH_SEPARATOR);
    match trimmed.rfind(PATH_SEPARATOR) {
        Some(0) | None => PATH_SEPARATOR.to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

/// Percent-encodes each path segment, leaving the separators alone.
pub fn encode_path(remote_path: &str) -> String {
    remote_path
        .split(PATH_SEPARATOR)
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
