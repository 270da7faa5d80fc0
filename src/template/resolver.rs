//! Template lookup across several sets in priority order

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::registry::{TemplateFile, TemplateSet};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("template set '{name}' not found")]
    UnknownTemplateSet { name: String },

    #[error("template '{name}' not found (searched {searched:?})")]
    TemplateNotFound { name: String, searched: Vec<PathBuf> },

    #[error("failed to read template {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Finds templates by name.
///
/// Plain names are looked up in every set, first match wins. A name of the
/// form `@Set/path` only looks in the set called `Set`.
#[derive(Debug, Clone, Default)]
pub struct TemplateResolver {
    sets: Vec<TemplateSet>,
    named: HashMap<String, usize>,
}

impl TemplateResolver {
    /// `sets` in lookup order.
    pub fn new(sets: Vec<TemplateSet>) -> Self {
        let named = sets
            .iter()
            .enumerate()
            .filter_map(|(index, set)| set.name().map(|name| (name.to_string(), index)))
            .collect();
        Self { sets, named }
    }

    pub fn sets(&self) -> &[TemplateSet] {
        &self.sets
    }

    pub fn set(&self, name: &str) -> Option<&TemplateSet> {
        self.named.get(name).map(|&index| &self.sets[index])
    }

    pub fn resolve(&self, name: &str) -> Result<&TemplateFile, ResolveError> {
        if let Some(qualified) = name.strip_prefix('@') {
            let (set_name, remainder) = qualified.split_once('/').unwrap_or((qualified, ""));
            let set = self
                .set(set_name)
                .ok_or_else(|| ResolveError::UnknownTemplateSet {
                    name: set_name.to_string(),
                })?;
            return set
                .get(remainder)
                .ok_or_else(|| ResolveError::TemplateNotFound {
                    name: name.to_string(),
                    searched: vec![set.root().to_path_buf()],
                });
        }

        self.sets
            .iter()
            .find_map(|set| set.get(name))
            .ok_or_else(|| ResolveError::TemplateNotFound {
                name: name.to_string(),
                searched: self.sets.iter().map(|s| s.root().to_path_buf()).collect(),
            })
    }

    /// Resolve `name` and read the template source.
    pub fn load(&self, name: &str) -> Result<(&TemplateFile, String), ResolveError> {
        let file = self.resolve(name)?;
        tracing::debug!(name, path = %file.physical_path.display(), "loading template");
        let source = fs::read_to_string(&file.physical_path).map_err(|source| ResolveError::Read {
            path: file.physical_path.clone(),
            source,
        })?;
        Ok((file, source))
    }
}
