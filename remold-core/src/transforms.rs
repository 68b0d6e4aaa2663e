use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// A runtime failure inside a transform. Filesystem probes that fail for any
/// reason other than not-found are surfaced here and abort the whole run.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("cannot check whether {path} exists: {source}")]
    Probe {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// How `clean` disposes of characters outside the filename-safe set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanMode {
    /// Remove the offending characters entirely.
    #[default]
    Strip,
    /// Replace each run of offending characters with a single `_`.
    Collapse,
}

/// Characters that need no scrubbing in a filename.
fn is_safe_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '/' | '-')
}

/// A name starting with `-` reads as a flag to downstream tools; swap the
/// leading dash for an underscore before any character-class pass.
fn dash_guard(value: &str) -> Cow<'_, str> {
    match value.strip_prefix('-') {
        Some(rest) => Cow::Owned(format!("_{rest}")),
        None => Cow::Borrowed(value),
    }
}

/// Scrub characters outside `[A-Za-z0-9_./-]` from a name. Idempotent in
/// both modes.
pub fn clean(value: &str, mode: CleanMode) -> String {
    let guarded = dash_guard(value);
    match mode {
        CleanMode::Strip => guarded.chars().filter(|&c| is_safe_name_char(c)).collect(),
        CleanMode::Collapse => {
            let mut out = String::with_capacity(guarded.len());
            let mut in_run = false;
            for ch in guarded.chars() {
                if is_safe_name_char(ch) {
                    out.push(ch);
                    in_run = false;
                } else if !in_run {
                    out.push('_');
                    in_run = true;
                }
            }
            out
        },
    }
}

/// Percent-encode every byte outside `[A-Za-z0-9_./-]` as uppercase `%XX`.
/// Non-ASCII characters encode per UTF-8 byte. The leading-dash guard runs
/// first, so `-a b.txt` becomes `_a%20b.txt`.
pub fn url_encode(value: &str) -> String {
    let guarded = dash_guard(value);
    let mut out = String::with_capacity(guarded.len());
    for ch in guarded.chars() {
        if is_safe_name_char(ch) {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

/// One collision-avoidance rewrite: bump the first `#<digits>` counter, or
/// insert `#1` before the last `.`, or append `#1`.
pub fn next_unique(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if let Ok(n) = value[start..end].parse::<u64>() {
                return format!("{}{}{}", &value[..start], n + 1, &value[end..]);
            }
        }
        i += 1;
    }
    match value.rfind('.') {
        Some(dot) => format!("{}#1{}", &value[..dot], &value[dot..]),
        None => format!("{value}#1"),
    }
}

/// Rewrite `value` until it names nothing on disk. Re-checks existence after
/// every rewrite, since bumping `#1` to `#2` may still collide. Unbounded by
/// design: there is always a free counter eventually.
pub fn uniquify(mut value: String) -> Result<String, TransformError> {
    while probe_exists(Path::new(&value)).map_err(|source| TransformError::Probe {
        path: value.clone(),
        source,
    })? {
        value = next_unique(&value);
    }
    Ok(value)
}

/// `YYYY-MM-DD/` from the file's modification time in the local timezone.
pub fn date_prefix(path: &Path) -> io::Result<String> {
    let modified = fs::metadata(path)?.modified()?;
    let local: DateTime<Local> = modified.into();
    Ok(local.format("%Y-%m-%d/").to_string())
}

/// Existence check that does not fail open: not-found is `false`, any other
/// error is reported. Uses `symlink_metadata` so a dangling symlink still
/// counts as occupying its name.
pub(crate) fn probe_exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
