//! Lenient release tag comparison.
//!
//! Tags like `v1.4`, `1.3.9`, `v2.0.0-beta` or `v1.10+build.7` are reduced
//! to a `(major, minor, patch)` tuple: leading `v` stripped, anything after
//! the first `-` or `+` dropped, non-numeric components read as 0, missing
//! components padded with 0. Tuples compare numerically per component.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(pub u64, pub u64, pub u64);

impl Version {
    pub fn parse(tag: &str) -> Self {
        let token = tag.split_whitespace().next().unwrap_or("");
        let token = token.strip_prefix(['v', 'V']).unwrap_or(token);
        let core = token.split(['-', '+']).next().unwrap_or("");

        let mut parts = [0u64; 3];
        for (slot, component) in parts.iter_mut().zip(core.split('.')) {
            *slot = component.trim().parse().unwrap_or(0);
        }

        Version(parts[0], parts[1], parts[2])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Orders two tags with [`Version::parse`] semantics.
pub fn compare(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

/// True only when `remote` is strictly newer than `current`.
pub fn is_newer(remote: &str, current: &str) -> bool {
    compare(remote, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lenient_tags() {
        assert_eq!(Version::parse("v1.4"), Version(1, 4, 0));
        assert_eq!(Version::parse("1.3.9"), Version(1, 3, 9));
        assert_eq!(Version::parse("v2.0.0-beta"), Version(2, 0, 0));
        assert_eq!(Version::parse("v1.10+build.7"), Version(1, 10, 0));
        assert_eq!(Version::parse("V3.x.2"), Version(3, 0, 2));
        assert_eq!(Version::parse("1.2.3.4"), Version(1, 2, 3));
        assert_eq!(Version::parse(""), Version(0, 0, 0));
        assert_eq!(Version::parse("  v1.5 release"), Version(1, 5, 0));
    }

    #[test]
    fn ordering() {
        assert!(is_newer("v1.4", "1.3.9"));
        assert_eq!(compare("v2.0.0-beta", "2.0"), Ordering::Equal);
        assert!(is_newer("v1.10", "v1.9"));
        assert!(!is_newer("v1.4", "1.4"));
        assert!(!is_newer("1.3", "v1.4"));
    }
}
