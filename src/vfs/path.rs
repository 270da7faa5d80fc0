//! Normalized virtual paths

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path '{0}' leaves its root with '..'")]
    ParentSegment(String),

    #[error("Path {0:?} is not valid UTF-8")]
    NonUtf8(PathBuf),

    #[error("Path {0:?} is absolute")]
    Absolute(PathBuf),
}

/// A `/`-separated path relative to the virtual root.
///
/// Backslashes count as separators, empty and `.` segments are dropped, and
/// leading or trailing separators are ignored, so `"\\a/./b/"` and `"a/b"`
/// are the same path. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(String);

impl VirtualPath {
    pub fn new(path: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for segment in path.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => return Err(PathError::ParentSegment(path.to_string())),
                other => segments.push(other),
            }
        }
        Ok(Self(segments.join("/")))
    }

    pub fn root() -> Self {
        Self::default()
    }

    /// Build from a relative filesystem path, e.g. one produced by walking
    /// a directory.
    pub fn from_relative(path: &Path) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => segments.push(
                    part.to_str()
                        .ok_or_else(|| PathError::NonUtf8(path.to_path_buf()))?,
                ),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(PathError::ParentSegment(path.display().to_string()))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::Absolute(path.to_path_buf()))
                }
            }
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn join(&self, other: &str) -> Result<Self, PathError> {
        let tail = VirtualPath::new(other)?;
        Ok(self.join_path(&tail))
    }

    pub fn join_path(&self, tail: &VirtualPath) -> Self {
        match (self.is_root(), tail.is_root()) {
            (true, _) => tail.clone(),
            (_, true) => self.clone(),
            _ => Self(format!("{}/{}", self.0, tail.0)),
        }
    }

    /// Segment-wise prefix test; `a/b` starts with `a` but not with `a/bc`.
    pub fn starts_with(&self, prefix: &VirtualPath) -> bool {
        self.strip_prefix(prefix).is_some()
    }

    pub fn strip_prefix(&self, prefix: &VirtualPath) -> Option<VirtualPath> {
        if prefix.is_root() {
            return Some(self.clone());
        }
        if self.0 == prefix.0 {
            return Some(Self::root());
        }
        self.0
            .strip_prefix(prefix.0.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| Self(rest.to_string()))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn parent(&self) -> Option<VirtualPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::root(),
        })
    }

    /// Sibling path with the last segment swapped for `name`.
    pub fn with_file_name(&self, name: &str) -> Result<VirtualPath, PathError> {
        match self.parent() {
            Some(parent) => parent.join(name),
            None => VirtualPath::new(name),
        }
    }

    /// The path as a relative filesystem path, for joining onto a root.
    pub fn to_relative_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VirtualPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for VirtualPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
