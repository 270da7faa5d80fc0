//! Generation run
//!
//! Every file of the project's `UserCode` template set is processed in
//! path order: assets are copied, output templates are rendered and
//! written, control templates are rendered only for the files they ask to
//! write. Afterwards each generated override file can be diffed against its
//! base, and the output can be copied into the mods directory.
//!
//! The run stops at the first error.

mod output;

use std::fs;
use std::io;
use std::path::PathBuf;

use serde_json::json;
use thiserror::Error;

use crate::config::{ConfigError, GeneratorConfig, CORE_DIR_NAME, USER_CODE_DIR_NAME};
use crate::diff::{diff, PatchDocument};
use crate::renderer::{Environment, HandlebarsRenderer, OutputRequest, RenderError, TemplateRenderer};
use crate::template::{
    ResolveError, TemplateError, TemplateFile, TemplateKind, TemplateResolver, TemplateSet,
};
use crate::vfs::{PathError, Vfs, VfsError, VirtualPath};

pub use output::{override_base, override_path, patch_path, GeneratedFiles, OutputWriter};

/// Base sources (read-only)
pub const BASE_MOUNT: &str = "Base";
/// The project directory (read-only)
pub const PROJECT_MOUNT: &str = "Project";
/// Shared templates (read-only, optional)
pub const SHARED_TEMPLATES_MOUNT: &str = "Shared/Templates";
/// Generated files
pub const OUTPUT_MOUNT: &str = "Output";
/// The mods directory's user code, target of `copy_to_mods`
pub const USER_CODE_OUT_MOUNT: &str = "UserCodeOut";
/// Data files read by `load_data`
pub const DATA_DIR: &str = "Project/Data";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Failed to read template {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to render '{path}': {source}")]
    Render {
        path: VirtualPath,
        #[source]
        source: RenderError,
    },

    #[error("Output '{path}' is produced by both '{first}' and '{second}'")]
    OutputCollision {
        path: VirtualPath,
        first: VirtualPath,
        second: VirtualPath,
    },
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Output paths, in order
    pub generated: Vec<VirtualPath>,
    /// Patch files written for override files
    pub patches: Vec<VirtualPath>,
    /// Control templates executed
    pub controls: usize,
    /// Files copied into the mods directory
    pub copied: usize,
}

pub struct Generator<R = HandlebarsRenderer> {
    config: GeneratorConfig,
    vfs: Vfs,
    resolver: TemplateResolver,
    renderer: R,
}

impl Generator<HandlebarsRenderer> {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerateError> {
        Self::with_renderer(config, HandlebarsRenderer::new())
    }
}

impl<R: TemplateRenderer> Generator<R> {
    /// Mount the configured directories and index the template sets.
    pub fn with_renderer(config: GeneratorConfig, renderer: R) -> Result<Self, GenerateError> {
        let mut vfs = Vfs::new();
        vfs.mount(BASE_MOUNT, config.core_dir(), true)?
            .mount(PROJECT_MOUNT, &config.project_dir, true)?;
        if let Some(shared) = &config.shared_templates_dir {
            vfs.mount(SHARED_TEMPLATES_MOUNT, shared, true)?;
        }
        vfs.mount(OUTPUT_MOUNT, &config.output_dir, false)?
            .mount(USER_CODE_OUT_MOUNT, config.mods_user_code_dir(), false)?;

        let rules = &config.scan_rules;
        let mut sets = vec![
            TemplateSet::scan(config.user_code_dir(), None, rules)?,
            TemplateSet::scan(config.templates_dir(), Some("Project"), rules)?,
        ];
        if let Some(shared) = &config.shared_templates_dir {
            sets.push(TemplateSet::scan(shared, Some("Shared"), rules)?);
        }

        Ok(Self {
            config,
            vfs,
            resolver: TemplateResolver::new(sets),
            renderer,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    /// Generate everything, then write patches and copy to the mods
    /// directory as configured.
    pub fn run(&self) -> Result<GenerationReport, GenerateError> {
        let writer = OutputWriter::new(&self.vfs);
        let mut files = GeneratedFiles::new();
        let mut report = GenerationReport::default();

        if let Some(user_code) = self.resolver.sets().first() {
            for file in user_code.files() {
                if self.generate_file(file, &writer, &mut files)? == TemplateKind::Control {
                    report.controls += 1;
                }
            }
        }
        report.generated = files.iter().cloned().collect();

        if self.config.write_diffs {
            let overrides = files
                .iter()
                .filter_map(|path| Some((path, override_base(path)?, patch_path(path)?)));
            for (path, base, patch) in overrides {
                self.write_patch(&writer, path, &base, &patch)?;
                report.patches.push(patch);
            }
        }

        if self.config.copy_to_mods {
            tracing::info!(dir = %self.config.mods_user_code_dir().display(), "copying to mods");
            let target_root = VirtualPath::new(USER_CODE_OUT_MOUNT)?;
            for path in files.iter() {
                self.vfs
                    .copy(&writer.output_path(path)?, &target_root.join_path(path))?;
                report.copied += 1;
            }
        }

        tracing::info!(
            generated = report.generated.len(),
            patches = report.patches.len(),
            copied = report.copied,
            "done"
        );
        Ok(report)
    }

    fn generate_file(
        &self,
        file: &TemplateFile,
        writer: &OutputWriter<'_>,
        files: &mut GeneratedFiles,
    ) -> Result<TemplateKind, GenerateError> {
        let path = &file.virtual_path;
        match file.kind {
            TemplateKind::Asset => {
                let source = VirtualPath::new(PROJECT_MOUNT)?
                    .join(USER_CODE_DIR_NAME)?
                    .join_path(path);
                writer.copy(files, &source, path)?;
            }
            TemplateKind::Output => {
                let (text, requests) = self.render(file)?;
                writer.write_text(files, path, &text, path)?;
                commit(writer, files, requests, path)?;
            }
            TemplateKind::Control => {
                tracing::info!(template = %path, "executing control template");
                let (_, requests) = self.render(file)?;
                commit(writer, files, requests, path)?;
            }
        }
        Ok(file.kind)
    }

    fn render(&self, file: &TemplateFile) -> Result<(String, Vec<OutputRequest>), GenerateError> {
        let source = fs::read_to_string(&file.physical_path).map_err(|source| GenerateError::Read {
            path: file.physical_path.clone(),
            source,
        })?;
        let path = &file.virtual_path;
        let env = Environment::new(&self.resolver, &self.vfs, path.clone())
            .with_max_patch_offset(self.config.max_patch_offset)
            .with_variables(json!({
                "template": {
                    "path": path.as_str(),
                    "name": path.file_name().unwrap_or_default(),
                }
            }));

        tracing::debug!(template = %path, "rendering");
        let text = self
            .renderer
            .render(&source, path.as_str(), &env)
            .map_err(|source| GenerateError::Render {
                path: path.clone(),
                source,
            })?;
        Ok((text, env.take_writes()))
    }

    /// Diff the generated override at `path` against `base` and write the
    /// result to `patch`.
    fn write_patch(
        &self,
        writer: &OutputWriter<'_>,
        path: &VirtualPath,
        base: &VirtualPath,
        patch: &VirtualPath,
    ) -> Result<(), GenerateError> {
        let base_text = self
            .vfs
            .read_to_string(&VirtualPath::new(BASE_MOUNT)?.join_path(base))?;
        let generated = writer.read(path)?;

        let document = PatchDocument::new(
            format!("{CORE_DIR_NAME}/{base}"),
            format!("{USER_CODE_DIR_NAME}/{path}"),
            diff(&base_text, &generated),
        );
        writer.write_untracked(patch, &document.to_string())?;
        tracing::info!(patch = %patch, hunks = document.hunks.len(), "wrote patch");
        Ok(())
    }
}

/// Write the files a template asked for.
fn commit(
    writer: &OutputWriter<'_>,
    files: &mut GeneratedFiles,
    requests: Vec<OutputRequest>,
    producer: &VirtualPath,
) -> Result<(), GenerateError> {
    for request in requests {
        writer.write_text(files, &request.path, &request.contents, producer)?;
    }
    Ok(())
}
