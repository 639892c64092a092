// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Segment-based paths with a configurable delimiter
//!
//! A [`BlobPath`] is an ordered list of non-empty segments. The same path can be
//! rendered with the caller-facing delimiter ([`CANONICAL_DELIMITER`]) for display
//! and cache keys, or with the backend's delimiter when building object keys.

use std::fmt;

/// Delimiter used for every path shown to callers and for cache keys
pub const CANONICAL_DELIMITER: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPath {
    segments: Vec<String>,
    delimiter: char,
}

impl BlobPath {
    /// The empty path (zero segments)
    pub fn root(delimiter: char) -> Self {
        Self {
            segments: Vec::new(),
            delimiter,
        }
    }

    /// Split `s` on `delimiter`, dropping empty segments from leading,
    /// trailing or repeated delimiters.
    pub fn parse(s: &str, delimiter: char) -> Self {
        Self {
            segments: s
                .split(delimiter)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            delimiter,
        }
    }

    /// Parse with the caller-facing delimiter
    pub fn canonical(s: &str) -> Self {
        Self::parse(s, CANONICAL_DELIMITER)
    }

    /// Build from segments. A segment containing the delimiter contributes
    /// each of its parts.
    pub fn from_segments<I, S>(segments: I, delimiter: char) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::root(delimiter);
        for segment in segments {
            path.push(segment.as_ref());
        }
        path
    }

    fn push(&mut self, segment: &str) {
        self.segments.extend(
            segment
                .split(self.delimiter)
                .filter(|part| !part.is_empty())
                .map(str::to_string),
        );
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment `i`, if present
    pub fn node(&self, i: usize) -> Option<&str> {
        self.segments.get(i).map(String::as_str)
    }

    /// Last segment, or "" at the root
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Drop the last segment. The root is its own parent.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        _ = segments.pop();
        Self {
            segments,
            delimiter: self.delimiter,
        }
    }

    /// Append one segment (or several, if `segment` contains the delimiter)
    pub fn child(&self, segment: &str) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// Append all segments of `other`
    pub fn join(&self, other: &BlobPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self {
            segments,
            delimiter: self.delimiter,
        }
    }

    /// Drop the first `n` segments
    pub fn chroot(&self, n: usize) -> Self {
        Self {
            segments: self.segments.iter().skip(n).cloned().collect(),
            delimiter: self.delimiter,
        }
    }

    /// Segments `from..to`, clamped to the path length
    pub fn sub_path(&self, from: usize, to: usize) -> Self {
        let to = to.min(self.segments.len());
        let from = from.min(to);
        Self {
            segments: self.segments[from..to].to_vec(),
            delimiter: self.delimiter,
        }
    }

    /// The same segments rendered with another delimiter
    pub fn with_delimiter(&self, delimiter: char) -> Self {
        Self {
            segments: self.segments.clone(),
            delimiter,
        }
    }

    /// Serialized form with a trailing delimiter, or "" for the root.
    /// This is the key prefix of everything "inside" this path.
    pub fn as_prefix(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("{self}{}", self.delimiter)
        }
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", self.delimiter)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for (input, normalized) in [
            ("a/b/c", "a/b/c"),
            ("/a/b/c", "a/b/c"),
            ("a/b/c/", "a/b/c"),
            ("//a//b/", "a/b"),
            ("", ""),
            ("/", ""),
        ] {
            let path = BlobPath::canonical(input);
            assert_eq!(path.to_string(), normalized, "input {input:?}");
            assert_eq!(BlobPath::canonical(&path.to_string()), path);
        }
    }

    #[test]
    fn test_parent_of_root_is_root() {
        let root = BlobPath::canonical("");
        assert!(root.parent().is_empty());
        assert_eq!(BlobPath::canonical("a/b").parent().to_string(), "a");
        assert_eq!(root.name(), "");
    }

    #[test]
    fn test_chroot_and_node() {
        let path = BlobPath::canonical("container/folder/file.txt");
        assert_eq!(path.node(0), Some("container"));
        assert_eq!(path.node(3), None);
        assert_eq!(path.chroot(1).to_string(), "folder/file.txt");
        assert!(path.chroot(5).is_empty());
        assert_eq!(path.name(), "file.txt");
        assert_eq!(path.sub_path(1, 2).to_string(), "folder");
        assert_eq!(path.sub_path(2, 9).to_string(), "file.txt");
    }

    #[test]
    fn test_child_splits_on_delimiter() {
        let path = BlobPath::canonical("a");
        assert_eq!(path.child("b/c").len(), 3);
        assert_eq!(path.child("").len(), 1);
        assert_eq!(
            path.join(&BlobPath::canonical("x/y")),
            BlobPath::from_segments(["a", "x", "y"], '/')
        );
    }

    #[test]
    fn test_with_delimiter_and_prefix() {
        let path = BlobPath::canonical("a/b");
        let piped = path.with_delimiter('|');
        assert_eq!(piped.to_string(), "a|b");
        assert_eq!(piped.as_prefix(), "a|b|");
        assert_eq!(BlobPath::root('|').as_prefix(), "");
        assert_ne!(piped, path);
        assert_eq!(BlobPath::parse("a|b", '|'), piped);
    }
}
