//! Logical operations on WIM images, independent of any tool's syntax.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index used when the caller leaves the image index blank.
pub const DEFAULT_INDEX: &str = "1";

/// A logical operation a backend can carry out.
///
/// Paths and indexes are opaque strings. The caller validates them before
/// submission; the core only rejects values that would render a malformed
/// command (blank required paths).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Attach one image of a container as a browsable directory.
    Mount {
        image: String,
        index: String,
        mount_dir: String,
    },
    /// Detach a mounted image, committing or discarding changes.
    Unmount { mount_dir: String, commit: bool },
    /// List every currently mounted image.
    ListMounts,
    /// List the images stored inside a container.
    ListIndexes { image: String },
}

impl Operation {
    /// Mount `image` at `mount_dir`; a blank `index` means [`DEFAULT_INDEX`].
    pub fn mount(
        image: impl Into<String>,
        index: impl Into<String>,
        mount_dir: impl Into<String>,
    ) -> Self {
        Operation::Mount {
            image: image.into(),
            index: index.into(),
            mount_dir: mount_dir.into(),
        }
    }

    pub fn unmount(mount_dir: impl Into<String>, commit: bool) -> Self {
        Operation::Unmount {
            mount_dir: mount_dir.into(),
            commit,
        }
    }

    pub fn list_indexes(image: impl Into<String>) -> Self {
        Operation::ListIndexes {
            image: image.into(),
        }
    }

    /// The operation's tag.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Mount { .. } => OperationKind::Mount,
            Operation::Unmount { .. } => OperationKind::Unmount,
            Operation::ListMounts => OperationKind::ListMounts,
            Operation::ListIndexes { .. } => OperationKind::ListIndexes,
        }
    }

    /// The job slot label for this operation.
    ///
    /// Kind plus target path. Commit and discard of the same directory share
    /// a slot; a mount and an unmount of the same directory do not.
    pub fn label(&self) -> String {
        match self {
            Operation::Mount { mount_dir, .. } => format!("mount {}", mount_dir.trim()),
            Operation::Unmount { mount_dir, .. } => format!("unmount {}", mount_dir.trim()),
            Operation::ListMounts => "list-mounts".to_string(),
            Operation::ListIndexes { image } => format!("list-indexes {}", image.trim()),
        }
    }
}

/// Normalize a caller-supplied image index.
///
/// Blank or whitespace-only input becomes [`DEFAULT_INDEX`]; anything else is
/// trimmed and passed through untouched.
pub fn normalize_index(index: &str) -> &str {
    match index.trim() {
        "" => DEFAULT_INDEX,
        trimmed => trimmed,
    }
}

/// The tag of an [`Operation`], used to ask whether a backend can do it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Mount,
    Unmount,
    ListMounts,
    ListIndexes,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Mount => "mount",
            OperationKind::Unmount => "unmount",
            OperationKind::ListMounts => "list-mounts",
            OperationKind::ListIndexes => "list-indexes",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "1")]
    #[case("   ", "1")]
    #[case("\t\n", "1")]
    #[case("2", "2")]
    #[case(" 3 ", "3")]
    fn index_normalization(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_index(input), expected);
    }

    #[test]
    fn commit_and_discard_share_a_slot() {
        let commit = Operation::unmount("/mnt/wim", true);
        let discard = Operation::unmount("/mnt/wim", false);
        assert_eq!(commit.label(), discard.label());
    }

    #[test]
    fn mount_and_unmount_use_different_slots() {
        let mount = Operation::mount("/img.wim", "1", "/mnt/wim");
        let unmount = Operation::unmount("/mnt/wim", true);
        assert_ne!(mount.label(), unmount.label());
    }

    #[test]
    fn kinds_match_variants() {
        assert_eq!(Operation::ListMounts.kind(), OperationKind::ListMounts);
        assert_eq!(Operation::list_indexes("a.wim").kind(), OperationKind::ListIndexes);
        assert_eq!(OperationKind::ListIndexes.to_string(), "list-indexes");
    }
}
