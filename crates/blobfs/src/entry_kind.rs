// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

/// Kind of a directory listing entry
///
/// Object storage has no native directories: a directory entry is either a
/// common key prefix or a placeholder object, but callers only see these two kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for kind in [EntryKind::File, EntryKind::Directory] {
            let json = serde_json::to_string(&kind).expect("serializes");
            assert_eq!(json, format!("\"{kind}\""));
        }
        assert!(EntryKind::Directory.is_directory());
    }

    #[test]
    fn test_serde_serialization() {
        let json = serde_json::to_string(&EntryKind::Directory).expect("serializes");
        assert_eq!(json, "\"directory\"");
        let parsed: EntryKind = serde_json::from_str("\"file\"").expect("parses");
        assert_eq!(parsed, EntryKind::File);
    }
}
