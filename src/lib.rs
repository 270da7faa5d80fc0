//! overlay-gen - a source overlay generator
//!
//! Renders the templates of a project against a read-only base source tree
//! and writes the result to an output tree. Templates can load base files,
//! edit single declarations in them while keeping the surrounding
//! formatting, and emit override files; each override can be recorded as a
//! unified patch against its base.
//!
//! # Example
//!
//! ```rust
//! use overlay_gen::diff::{apply_strict, diff, ApplyOptions, PatchDocument};
//!
//! let base = "class A\n{\n    int X() { return 1; }\n}\n";
//! let patched = base.replace("return 1;", "return 2;");
//!
//! let patch = PatchDocument::new("__core__/A.cs", "UserCode/A.override.cs", diff(base, &patched));
//! let text = patch.to_string();
//! assert!(text.contains("-    int X() { return 1; }"));
//!
//! let parsed = PatchDocument::parse(&text).unwrap();
//! let applied = apply_strict(base, &parsed.hunks, &ApplyOptions::default()).unwrap();
//! assert_eq!(applied, patched);
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod generator;
pub mod renderer;
pub mod structure;
pub mod syntax;
pub mod template;
pub mod vfs;

use std::path::Path;

pub use config::{ConfigError, GeneratorConfig, GeneratorSettings};
pub use diff::{DiffHunk, DiffLine, PatchDocument, PatchError};
pub use error::ParseError;
pub use generator::{GenerateError, GenerationReport, Generator};
pub use renderer::{HandlebarsRenderer, RenderError, TemplateRenderer};
pub use structure::StructureError;
pub use syntax::{parse, SyntaxNode, SyntaxTree};
pub use vfs::{Vfs, VirtualPath};

/// Load the configuration of the project at `project_dir` and run the
/// generator once.
///
/// `overrides` take precedence over the project's `overlay-gen.toml`.
pub fn generate(
    project_dir: &Path,
    overrides: GeneratorSettings,
) -> Result<GenerationReport, GenerateError> {
    let config = config::load(project_dir, overrides)?;
    Generator::new(config)?.run()
}
