//! Relative path validation for manifest and archive entries.
//!
//! Every path coming from a manifest or an update package passes through
//! [`RelPath::parse`] before it is joined onto the install root or the
//! staging directory. This is the only thing standing between a corrupted
//! (or hostile) release and a write outside the installation, so the
//! rules are deliberately blunt:
//!
//! - separators are normalized to `/`, empty and `.` segments collapse
//! - empty paths are rejected
//! - absolute paths (`/x`, `\x`, `\\server\share`) are rejected
//! - any `..` segment is rejected
//! - any segment containing `:` is rejected (drive letters, NTFS streams)

use crate::libs::error::{Result, UpdateError};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Characters Windows refuses in file names, besides separators and `:`.
const WINDOWS_RESERVED: [char; 6] = ['"', '<', '>', '|', '?', '*'];

/// A validated, canonical, posix-style path relative to the install root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath(String);

impl RelPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let reject = |reason: &'static str| UpdateError::PathSafety {
            path: raw.to_string(),
            reason,
        };

        let unified = raw.trim().replace('\\', "/");
        if unified.is_empty() {
            return Err(reject("empty path"));
        }
        if unified.starts_with('/') {
            return Err(reject("absolute path"));
        }

        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(reject("parent directory traversal")),
                s if s.contains(':') => return Err(reject("drive or stream prefix")),
                s if s.chars().any(|c| c.is_control() || WINDOWS_RESERVED.contains(&c)) => {
                    return Err(reject("character not allowed in file names"))
                }
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            return Err(reject("empty path"));
        }

        Ok(RelPath(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Parent directory in posix form, `None` for top-level entries.
    pub fn parent(&self) -> Option<&str> {
        self.0.rfind('/').map(|idx| &self.0[..idx])
    }

    /// Case-insensitive check whether this path is `dir` itself or sits
    /// inside it (`dir` is relative to the root, e.g. `_internal`).
    pub fn is_within(&self, dir: &str) -> bool {
        let dir = dir.trim_matches(|c| c == '/' || c == '\\').replace('\\', "/").to_lowercase();
        if dir.is_empty() {
            return false;
        }
        let lower = self.0.to_lowercase();
        lower == dir || lower.strip_prefix(&dir).is_some_and(|rest| rest.starts_with('/'))
    }

    /// Joins the path onto `base` using native separators.
    pub fn to_native(&self, base: &Path) -> PathBuf {
        self.0.split('/').fold(base.to_path_buf(), |acc, segment| acc.join(segment))
    }

    /// Backslash form used inside Windows batch scripts.
    pub fn to_windows(&self) -> String {
        self.0.replace('/', "\\")
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for RelPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::error::ErrorKind;

    #[test]
    fn accepts_plain_relative_paths() {
        assert_eq!(RelPath::parse("a/b/c.txt").unwrap().as_str(), "a/b/c.txt");
        assert_eq!(RelPath::parse("lists\\hosts.txt").unwrap().as_str(), "lists/hosts.txt");
        assert_eq!(RelPath::parse("./bin//winws.exe").unwrap().as_str(), "bin/winws.exe");
    }

    #[test]
    fn rejects_escapes() {
        for bad in ["", "   ", "../x", "a/../../x", "/x", "\\x", "\\\\server\\share\\x", "C:\\x", "c:x", "a/b:stream", ".", "./", "a/\"q\".txt", "a<b", "x>y", "p|q", "what?", "*.dll", "tab\there"] {
            let err = RelPath::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathSafety, "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn components() {
        let path = RelPath::parse("_internal/lib/x.dll").unwrap();
        assert_eq!(path.file_name(), "x.dll");
        assert_eq!(path.parent(), Some("_internal/lib"));
        assert!(path.is_within("_internal"));
        assert!(path.is_within("_INTERNAL/"));
        assert!(path.is_within("_internal/lib/x.dll"));
        assert!(!path.is_within("_intern"));
        assert!(!path.is_within(""));

        let dir = RelPath::parse("_Internal").unwrap();
        assert!(dir.is_within("_internal"));
        assert!(!dir.is_within("_internal/lib"));

        let top = RelPath::parse("MVZ.exe").unwrap();
        assert_eq!(top.parent(), None);
        assert_eq!(top.file_name(), "MVZ.exe");
    }

    #[test]
    fn native_join_stays_under_base() {
        let base = Path::new("root");
        let joined = RelPath::parse("a/b.txt").unwrap().to_native(base);
        assert_eq!(joined, Path::new("root").join("a").join("b.txt"));
        assert!(joined.starts_with(base));
    }
}
