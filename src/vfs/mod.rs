//! Layered virtual filesystem
//!
//! Physical directories are mounted under virtual prefixes. Lookups try the
//! mounts in registration order and take the first one that has the file,
//! so earlier mounts shadow later ones. Writes go to the first mount whose
//! prefix matches and fail if that mount is read-only.

mod path;

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

pub use path::{PathError, VirtualPath};

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("'{path}' not found (searched {searched:?})")]
    NotFound {
        path: VirtualPath,
        searched: Vec<PathBuf>,
    },

    #[error("No mount covers '{path}'")]
    NoMount { path: VirtualPath },

    #[error("Cannot write '{path}': mount '{mount}' is read-only")]
    ReadOnly { path: VirtualPath, mount: VirtualPath },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl VfsError {
    fn io(path: &Path, source: io::Error) -> Self {
        VfsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A physical directory exposed under a virtual prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    prefix: VirtualPath,
    root: PathBuf,
    read_only: bool,
}

impl Mount {
    pub fn prefix(&self) -> &VirtualPath {
        &self.prefix
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Physical location of `path` in this mount, if the prefix covers it.
    fn physical(&self, path: &VirtualPath) -> Option<PathBuf> {
        path.strip_prefix(&self.prefix)
            .map(|rest| self.root.join(rest.to_relative_path()))
    }
}

/// A file found while enumerating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsEntry {
    pub virtual_path: VirtualPath,
    pub physical_path: PathBuf,
    /// Prefix of the mount the file was found in
    pub mount: VirtualPath,
}

#[derive(Debug, Clone, Default)]
pub struct Vfs {
    mounts: Vec<Mount>,
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mount. Mounts registered first take priority.
    pub fn mount(
        &mut self,
        prefix: &str,
        root: impl Into<PathBuf>,
        read_only: bool,
    ) -> Result<&mut Self, VfsError> {
        let mount = Mount {
            prefix: VirtualPath::new(prefix)?,
            root: root.into(),
            read_only,
        };
        tracing::debug!(
            prefix = %mount.prefix,
            root = %mount.root.display(),
            read_only,
            "mounted"
        );
        self.mounts.push(mount);
        Ok(self)
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Physical path of the first mount that has `path`.
    pub fn resolve(&self, path: &VirtualPath) -> Result<PathBuf, VfsError> {
        let mut searched = Vec::new();
        for candidate in self.mounts.iter().filter_map(|m| m.physical(path)) {
            if candidate.exists() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }
        if searched.is_empty() {
            return Err(VfsError::NoMount { path: path.clone() });
        }
        Err(VfsError::NotFound {
            path: path.clone(),
            searched,
        })
    }

    /// The mount that writes to `path` go to.
    pub fn owner(&self, path: &VirtualPath) -> Result<&Mount, VfsError> {
        self.mounts
            .iter()
            .find(|m| path.starts_with(&m.prefix))
            .ok_or_else(|| VfsError::NoMount { path: path.clone() })
    }

    pub fn exists(&self, path: &VirtualPath) -> bool {
        self.resolve(path).is_ok()
    }

    pub fn read_to_string(&self, path: &VirtualPath) -> Result<String, VfsError> {
        let physical = self.resolve(path)?;
        fs::read_to_string(&physical).map_err(|e| VfsError::io(&physical, e))
    }

    fn writable(&self, path: &VirtualPath) -> Result<PathBuf, VfsError> {
        let mount = self.owner(path)?;
        if mount.read_only {
            return Err(VfsError::ReadOnly {
                path: path.clone(),
                mount: mount.prefix.clone(),
            });
        }
        mount
            .physical(path)
            .ok_or_else(|| VfsError::NoMount { path: path.clone() })
    }

    /// Write `contents` to `path`, creating parent directories.
    pub fn write(&self, path: &VirtualPath, contents: impl AsRef<[u8]>) -> Result<PathBuf, VfsError> {
        let physical = self.writable(path)?;
        if let Some(parent) = physical.parent() {
            fs::create_dir_all(parent).map_err(|e| VfsError::io(parent, e))?;
        }
        fs::write(&physical, contents).map_err(|e| VfsError::io(&physical, e))?;
        Ok(physical)
    }

    pub fn create_dir(&self, path: &VirtualPath) -> Result<PathBuf, VfsError> {
        let physical = self.writable(path)?;
        fs::create_dir_all(&physical).map_err(|e| VfsError::io(&physical, e))?;
        Ok(physical)
    }

    /// Copy the file resolved at `from` to the writable location of `to`.
    pub fn copy(&self, from: &VirtualPath, to: &VirtualPath) -> Result<PathBuf, VfsError> {
        let source = self.resolve(from)?;
        let target = self.writable(to)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| VfsError::io(parent, e))?;
        }
        fs::copy(&source, &target).map_err(|e| VfsError::io(&source, e))?;
        Ok(target)
    }

    /// Every file at or below `path`, across all mounts.
    ///
    /// Walks lazily, mount by mount in priority order and by file name
    /// within a mount. A virtual path that an earlier mount already
    /// produced is skipped.
    pub fn enumerate(&self, path: &VirtualPath) -> Enumerate<'_> {
        Enumerate {
            query: path.clone(),
            pending: self.mounts.iter().collect(),
            current: None,
            seen: HashSet::new(),
        }
    }
}

/// Iterator returned by [`Vfs::enumerate`].
pub struct Enumerate<'a> {
    query: VirtualPath,
    pending: VecDeque<&'a Mount>,
    current: Option<(&'a Mount, walkdir::IntoIter)>,
    seen: HashSet<VirtualPath>,
}

impl Enumerate<'_> {
    /// Directory to walk in `mount` for the query, if the two overlap.
    fn start_dir(&self, mount: &Mount) -> Option<PathBuf> {
        if let Some(physical) = mount.physical(&self.query) {
            return Some(physical);
        }
        // the whole mount sits below the queried directory
        mount
            .prefix
            .starts_with(&self.query)
            .then(|| mount.root.clone())
    }

    fn entry(&mut self, mount: &Mount, physical: &Path) -> Result<Option<VfsEntry>, VfsError> {
        let relative = physical.strip_prefix(&mount.root).unwrap_or(physical);
        let virtual_path = mount
            .prefix
            .join_path(&VirtualPath::from_relative(relative)?);
        if !self.seen.insert(virtual_path.clone()) {
            return Ok(None);
        }
        Ok(Some(VfsEntry {
            virtual_path,
            physical_path: physical.to_path_buf(),
            mount: mount.prefix.clone(),
        }))
    }
}

impl Iterator for Enumerate<'_> {
    type Item = Result<VfsEntry, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((mount, walker)) = self.current.as_mut() {
                let mount = *mount;
                match walker.next() {
                    Some(Ok(dir_entry)) => {
                        if !dir_entry.file_type().is_file() {
                            continue;
                        }
                        match self.entry(mount, dir_entry.path()) {
                            Ok(Some(entry)) => return Some(Ok(entry)),
                            Ok(None) => continue,
                            Err(err) => return Some(Err(err)),
                        }
                    }
                    Some(Err(err)) => return Some(Err(err.into())),
                    None => self.current = None,
                }
            }

            let mount = self.pending.pop_front()?;
            match self.start_dir(mount) {
                Some(dir) if dir.is_dir() => {
                    let walker = WalkDir::new(dir).sort_by_file_name().into_iter();
                    self.current = Some((mount, walker));
                }
                _ => {}
            }
        }
    }
}
