//! Template sets: a directory tree indexed by virtual path

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::vfs::{PathError, VirtualPath};

/// Errors that can occur while indexing a template set
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Two files map to the same virtual path
    #[error("duplicate template path {path}: {first:?} and {second:?}")]
    Duplicate {
        path: VirtualPath,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to scan template directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// What the generator does with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// Rendered and written to its virtual path
    Output,
    /// Rendered for its side effects; the text is dropped
    Control,
    /// Copied unchanged
    Asset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub virtual_path: VirtualPath,
    pub physical_path: PathBuf,
    pub kind: TemplateKind,
}

/// How file names are classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRules {
    /// Extensions (without the dot) that mark a template
    pub template_suffixes: Vec<String>,
    /// Extensions of files copied as they are
    pub asset_extensions: Vec<String>,
    /// File name prefix that turns a template into a control template
    pub control_prefix: String,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            template_suffixes: vec!["hbs".into(), "handlebars".into()],
            asset_extensions: ["cs", "xml", "yaml", "json", "unity3d"]
                .into_iter()
                .map(String::from)
                .collect(),
            control_prefix: "__".into(),
        }
    }
}

impl ScanRules {
    /// Length of the template suffix (dot included) `file_name` ends with.
    fn template_suffix_len(&self, file_name: &str) -> Option<usize> {
        self.template_suffixes.iter().find_map(|suffix| {
            let stem = file_name.strip_suffix(suffix.as_str())?;
            stem.ends_with('.').then_some(suffix.len() + 1)
        })
    }

    /// Kind of a file, and how many trailing bytes of its name to strip to
    /// get the output name. `None` means the file is ignored.
    pub fn classify(&self, file_name: &str) -> Option<(TemplateKind, usize)> {
        if let Some(len) = self.template_suffix_len(file_name) {
            let kind = if file_name.starts_with(&self.control_prefix) {
                TemplateKind::Control
            } else {
                TemplateKind::Output
            };
            return Some((kind, len));
        }
        let extension = Path::new(file_name).extension()?.to_str()?;
        self.asset_extensions
            .iter()
            .any(|e| e == extension)
            .then_some((TemplateKind::Asset, 0))
    }
}

/// One directory of templates and assets.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    name: Option<String>,
    root: PathBuf,
    files: BTreeMap<VirtualPath, TemplateFile>,
}

impl TemplateSet {
    /// Index every file below `root`. A missing root gives an empty set.
    pub fn scan(
        root: impl Into<PathBuf>,
        name: Option<&str>,
        rules: &ScanRules,
    ) -> Result<Self, TemplateError> {
        let root = root.into();
        let mut files: BTreeMap<VirtualPath, TemplateFile> = BTreeMap::new();

        if root.is_dir() {
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(file_name) = entry.file_name().to_str() else {
                    tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                    continue;
                };
                let Some((kind, strip)) = rules.classify(file_name) else {
                    continue;
                };

                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                let relative = VirtualPath::from_relative(relative)?;
                let relative = relative.as_str();
                let virtual_path = VirtualPath::new(&relative[..relative.len() - strip])?;

                let file = TemplateFile {
                    virtual_path: virtual_path.clone(),
                    physical_path: entry.path().to_path_buf(),
                    kind,
                };
                if let Some(existing) = files.get(&virtual_path) {
                    return Err(TemplateError::Duplicate {
                        path: virtual_path,
                        first: existing.physical_path.clone(),
                        second: file.physical_path,
                    });
                }
                files.insert(virtual_path, file);
            }
        }

        tracing::debug!(
            root = %root.display(),
            name = name.unwrap_or("-"),
            files = files.len(),
            "scanned template set"
        );
        Ok(Self {
            name: name.map(String::from),
            root,
            files,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a file; `path` is normalized first.
    pub fn get(&self, path: &str) -> Option<&TemplateFile> {
        let path = VirtualPath::new(path).ok()?;
        self.files.get(&path)
    }

    /// All files, ordered by virtual path.
    pub fn files(&self) -> impl Iterator<Item = &TemplateFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
