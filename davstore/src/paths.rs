//! Path sandbox for remote object paths.
//!
//! Remote paths always use `/`, whatever the host OS. Every path is normalized
//! lexically before the containment check, so `..` cannot be used to step out
//! of the storage root and `/rootfoo` is never treated as being inside `/root`.

use crate::error::ContainmentError;

pub const SEPARATOR: char = '/';

/// Lexically normalize a remote path into absolute form.
///
/// Empty and `.` segments are dropped, `..` pops the previous segment and never
/// climbs above `/`. The result has a leading separator and no trailing one
/// (except for the root itself).
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split(SEPARATOR) {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in &parts {
        out.push(SEPARATOR);
        out.push_str(part);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

/// Join path fragments with the remote separator and normalize the result.
pub fn join(parts: &[&str]) -> String {
    normalize(&parts.join("/"))
}

/// Split a normalized path into its parent directory and final segment.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let idx = path.rfind(SEPARATOR)?;
    let name = &path[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Some((parent, name))
}

/// Containment boundary for everything the adapter sends to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: String,
}

impl Sandbox {
    pub fn new(root: &str) -> Self {
        Self { root: normalize(root) }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Separator-bounded prefix check on an already normalized path.
    pub fn contains(&self, path: &str) -> bool {
        if self.root == "/" {
            return path.starts_with(SEPARATOR);
        }
        match path.strip_prefix(self.root.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// Normalize `path` and require it to stay inside the root.
    pub fn check(&self, path: &str) -> Result<String, ContainmentError> {
        let normalized = normalize(path);
        if self.contains(&normalized) {
            Ok(normalized)
        } else {
            Err(ContainmentError {
                root: self.root.clone(),
                path: normalized,
            })
        }
    }

    /// Join `target` onto `base` and require the result to stay inside the root.
    pub fn resolve(&self, base: &str, target: &str) -> Result<String, ContainmentError> {
        self.check(&format!("{}/{}", base, target))
    }

    /// Join `target` onto the root itself.
    pub fn resolve_under_root(&self, target: &str) -> Result<String, ContainmentError> {
        self.resolve(&self.root, target)
    }

    /// The part of a contained path below the root, without a leading separator.
    /// Returns `None` for paths outside the root.
    pub fn relative<'a>(&self, path: &'a str) -> Option<&'a str> {
        if !self.contains(path) {
            return None;
        }
        let rest = if self.root == "/" {
            path
        } else {
            &path[self.root.len()..]
        };
        Some(rest.trim_start_matches(SEPARATOR))
    }

    /// Ordered directory segments between the root and a contained path.
    pub fn segments<'a>(&self, path: &'a str) -> Result<Vec<&'a str>, ContainmentError> {
        let rel = self.relative(path).ok_or_else(|| ContainmentError {
            root: self.root.clone(),
            path: path.to_string(),
        })?;
        Ok(rel.split(SEPARATOR).filter(|s| !s.is_empty()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("data/"), "/data");
        assert_eq!(normalize("//data//2024/./05/"), "/data/2024/05");
        assert_eq!(normalize("/data/2024/../2025"), "/data/2025");
        assert_eq!(normalize("/../../etc"), "/etc");
    }

    #[test]
    fn test_join_ignores_host_separator_rules() {
        assert_eq!(join(&["/data", "2024/05", "x.jpg"]), "/data/2024/05/x.jpg");
        assert_eq!(join(&["/data/", "/x.jpg"]), "/data/x.jpg");
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("/data/2024/x.jpg"), Some(("/data/2024", "x.jpg")));
        assert_eq!(split_parent("/x.jpg"), Some(("/", "x.jpg")));
        assert_eq!(split_parent("/"), None);
    }

    #[test]
    fn test_contains_is_separator_bounded() {
        let sandbox = Sandbox::new("/root");
        assert!(sandbox.contains("/root"));
        assert!(sandbox.contains("/root/a"));
        assert!(!sandbox.contains("/rootfoo"));
        assert!(!sandbox.contains("/rootfoo/a"));
        assert!(!sandbox.contains("/"));
    }

    #[test]
    fn test_empty_root_contains_everything_absolute() {
        let sandbox = Sandbox::new("");
        assert_eq!(sandbox.root(), "/");
        assert!(sandbox.contains("/anything/at/all"));
        assert_eq!(sandbox.relative("/2024/05/x.jpg"), Some("2024/05/x.jpg"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let sandbox = Sandbox::new("/data");
        assert_eq!(sandbox.resolve("/data", "2024/x.jpg").unwrap(), "/data/2024/x.jpg");
        let err = sandbox.resolve("/data", "../etc/passwd").unwrap_err();
        assert_eq!(err.path, "/etc/passwd");
        assert_eq!(err.root, "/data");
        assert!(sandbox.resolve("/data/2024", "../../datafoo/x").is_err());
    }

    #[test]
    fn test_relative_and_segments() {
        let sandbox = Sandbox::new("/data/");
        assert_eq!(sandbox.relative("/data/2024/05"), Some("2024/05"));
        assert_eq!(sandbox.relative("/data"), Some(""));
        assert_eq!(sandbox.relative("/other"), None);
        assert_eq!(sandbox.segments("/data/2024/05").unwrap(), vec!["2024", "05"]);
        assert!(sandbox.segments("/data").unwrap().is_empty());
        assert!(sandbox.segments("/elsewhere").is_err());
    }
}
