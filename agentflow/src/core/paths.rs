//! Lexical path helpers and content digests.

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

/// Lexically normalize `path` into a `/`-separated string.
///
/// Drops `.` components and folds `..` into its parent where possible. Does not
/// touch the filesystem, so the result is stable for paths that do not exist yet.
pub fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut prefix = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => prefix = p.as_os_str().to_string_lossy().replace('\\', "/"),
            Component::RootDir => prefix.push('/'),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(parts.last(), Some(last) if last != "..") {
                    parts.pop();
                } else if prefix.is_empty() {
                    parts.push("..".to_string());
                }
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    if prefix.is_empty() && joined.is_empty() {
        return ".".to_string();
    }
    format!("{prefix}{joined}")
}

/// Join a relative path onto `root` without letting it climb above `root`.
///
/// Returns `None` when the relative path escapes via `..`.
pub fn join_within(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                parts.pop()?;
            }
        }
    }
    let mut out = root.to_path_buf();
    for part in parts {
        out.push(part);
    }
    Some(out)
}

/// Hex SHA-256 digest of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_dots_and_parents() {
        assert_eq!(normalize_path(Path::new("a/./b/../c.txt")), "a/c.txt");
        assert_eq!(normalize_path(Path::new("/root/x/../y")), "/root/y");
        assert_eq!(normalize_path(Path::new("../up")), "../up");
        assert_eq!(normalize_path(Path::new("")), ".");
    }

    #[test]
    fn join_within_rejects_escape() {
        let root = Path::new("/base");
        assert_eq!(
            join_within(root, Path::new("src/../lib/a.rs")),
            Some(PathBuf::from("/base/lib/a.rs"))
        );
        assert_eq!(join_within(root, Path::new("../../etc/passwd")), None);
        assert_eq!(
            join_within(root, Path::new("/abs/file.txt")),
            Some(PathBuf::from("/base/abs/file.txt"))
        );
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let hash = content_hash("hello");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("hello"));
        assert_ne!(hash, content_hash("hello "));
    }
}
