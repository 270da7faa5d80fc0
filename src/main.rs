//! overlay-gen CLI
//!
//! Usage:
//!   overlay-gen build [OPTIONS] [PROJECT_DIR]
//!   overlay-gen diff BASE PATCHED [-o PATCH]
//!   overlay-gen apply BASE PATCH [-o OUTPUT]
//!
//! Options:
//!   -v, --verbose  Debug logging (RUST_LOG takes precedence)
//!   -h, --help     Print help

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use overlay_gen::diff::{apply, diff_with_context, ApplyOptions, PatchDocument, DEFAULT_CONTEXT};
use overlay_gen::renderer::DEFAULT_MAX_PATCH_OFFSET;
use overlay_gen::{generate, GeneratorSettings};

#[derive(Parser)]
#[command(name = "overlay-gen")]
#[command(about = "Generate source overlays from templates and record them as patches")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the project's templates into the output directory
    Build(BuildArgs),

    /// Write a unified patch between two files
    Diff {
        base: PathBuf,
        patched: PathBuf,

        /// Patch file (stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Lines of context around each change
        #[arg(long, default_value_t = DEFAULT_CONTEXT)]
        context: usize,
    },

    /// Apply a unified patch, tolerating shifted lines
    Apply {
        base: PathBuf,
        patch: PathBuf,

        /// Patched file (stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// How far a hunk may move from its recorded position, in lines
        #[arg(long, default_value_t = DEFAULT_MAX_PATCH_OFFSET)]
        max_offset: usize,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Project directory containing UserCode/ (default: current directory)
    #[arg(default_value = ".")]
    project_dir: PathBuf,

    /// Mods directory containing __core__/
    #[arg(long)]
    mods_dir: Option<PathBuf>,

    /// Shared templates directory, relative to the project
    #[arg(long)]
    shared_templates_dir: Option<PathBuf>,

    /// Output directory, relative to the project
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Write a .patch next to every generated override file
    #[arg(long)]
    write_diffs: bool,

    /// Copy generated files into the mods directory's UserCode/
    #[arg(long, visible_alias = "copy")]
    copy_to_mods: bool,
}

impl BuildArgs {
    /// Flags as settings; unset flags leave the file's values alone.
    fn settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            mods_dir: self.mods_dir.clone(),
            output_dir: self.output_dir.clone(),
            shared_templates_dir: self.shared_templates_dir.clone(),
            write_diffs: self.write_diffs.then_some(true),
            copy_to_mods: self.copy_to_mods.then_some(true),
            ..Default::default()
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Build(args) => build(&args),
        Command::Diff {
            base,
            patched,
            output,
            context,
        } => diff_files(&base, &patched, output.as_deref(), context),
        Command::Apply {
            base,
            patch,
            output,
            max_offset,
        } => apply_file(&base, &patch, output.as_deref(), max_offset),
    };

    if let Err(message) = result {
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }
}

fn build(args: &BuildArgs) -> Result<(), String> {
    let report = generate(&args.project_dir, args.settings()).map_err(|e| e.to_string())?;
    for patch in &report.patches {
        tracing::debug!(patch = %patch, "patch written");
    }
    Ok(())
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Error reading file '{}': {}", path.display(), e))
}

fn emit(output: Option<&Path>, text: &str) -> Result<(), String> {
    match output {
        Some(path) => fs::write(path, text)
            .map_err(|e| format!("Error writing file '{}': {}", path.display(), e)),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

fn diff_files(base: &Path, patched: &Path, output: Option<&Path>, context: usize) -> Result<(), String> {
    let hunks = diff_with_context(&read(base)?, &read(patched)?, context);
    let document = PatchDocument::new(
        base.display().to_string(),
        patched.display().to_string(),
        hunks,
    );
    emit(output, &document.to_string())
}

fn apply_file(base: &Path, patch: &Path, output: Option<&Path>, max_offset: usize) -> Result<(), String> {
    let document = PatchDocument::parse(&read(patch)?).map_err(|e| e.to_string())?;
    let outcome = apply(&read(base)?, &document.hunks, &ApplyOptions { max_offset });
    for result in &outcome.results {
        if result.success {
            tracing::info!("{}", result.summary());
        } else {
            tracing::warn!("{}", result.summary());
        }
    }
    if !outcome.is_success() {
        return Err(format!("patch failed: {}", outcome.summaries().join("\n")));
    }
    emit(output, &outcome.text())
}
