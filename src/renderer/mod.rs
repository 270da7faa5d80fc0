//! Template rendering
//!
//! A [`TemplateRenderer`] turns template source into text. Templates reach
//! the rest of the generator only through the helpers in [`Capability`]:
//! they read base sources through the virtual filesystem, edit them with the
//! structural patch engine and ask for extra output files. Those requests
//! are buffered in the [`Environment`] and committed by the caller once the
//! render has succeeded.

mod functions;
mod handlebars;
mod nodes;
mod regex;

use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use thiserror::Error;

use crate::diff::PatchError;
use crate::error::ParseError;
use crate::structure::StructureError;
use crate::template::{ResolveError, TemplateResolver};
use crate::vfs::{PathError, Vfs, VfsError, VirtualPath};

pub use self::handlebars::HandlebarsRenderer;
pub use self::regex::{build_regex, replace_capture, CaptureError, GroupReplacements};
pub use functions::{Call, Capability};
pub use nodes::TemplateNode;

/// Default search window for `apply_patch`, in lines.
pub const DEFAULT_MAX_PATCH_OFFSET: usize = crate::diff::DEFAULT_MAX_OFFSET;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template '{name}': {message}")]
    Template { name: String, message: String },

    #[error("{helper}: {message}")]
    Argument {
        helper: &'static str,
        message: String,
    },

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("Could not parse source: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Invalid regex '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: ::regex::Error,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Failed to load data file '{path}': {message}")]
    Data { path: VirtualPath, message: String },
}

/// A file a template asked to write, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRequest {
    pub path: VirtualPath,
    pub contents: String,
}

/// Everything a single render can reach.
#[derive(Debug)]
pub struct Environment<'a> {
    resolver: &'a TemplateResolver,
    vfs: &'a Vfs,
    template_path: VirtualPath,
    variables: Value,
    max_patch_offset: usize,
    writes: Mutex<Vec<OutputRequest>>,
    failure: Mutex<Option<RenderError>>,
}

impl<'a> Environment<'a> {
    pub fn new(resolver: &'a TemplateResolver, vfs: &'a Vfs, template_path: VirtualPath) -> Self {
        Self {
            resolver,
            vfs,
            template_path,
            variables: Value::Object(Default::default()),
            max_patch_offset: DEFAULT_MAX_PATCH_OFFSET,
            writes: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Data the template sees as its context.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_max_patch_offset(mut self, lines: usize) -> Self {
        self.max_patch_offset = lines;
        self
    }

    pub fn resolver(&self) -> &TemplateResolver {
        self.resolver
    }

    pub fn vfs(&self) -> &Vfs {
        self.vfs
    }

    /// Virtual path of the template being rendered.
    pub fn template_path(&self) -> &VirtualPath {
        &self.template_path
    }

    pub fn variables(&self) -> &Value {
        &self.variables
    }

    pub fn max_patch_offset(&self) -> usize {
        self.max_patch_offset
    }

    pub fn request_write(&self, request: OutputRequest) {
        tracing::debug!(template = %self.template_path, path = %request.path, "write requested");
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }

    /// Writes requested so far, in request order.
    pub fn take_writes(&self) -> Vec<OutputRequest> {
        std::mem::take(&mut *self.writes.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Remember a helper failure; only the first one is kept.
    pub(crate) fn record_failure(&self, error: RenderError) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(error);
        }
    }

    pub(crate) fn take_failure(&self) -> Option<RenderError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

pub trait TemplateRenderer {
    /// Render `source`; `name` identifies the template in errors.
    fn render(&self, source: &str, name: &str, env: &Environment<'_>) -> Result<String, RenderError>;
}
