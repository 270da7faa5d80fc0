//! Generator configuration
//!
//! Settings come from an optional `overlay-gen.toml` in the project
//! directory, overridden by command line flags, and are then validated
//! against the filesystem.
//!
//! ```toml
//! [generator]
//! mods_dir = "../Server/Mods"
//! output_dir = "build"
//! shared_templates_dir = "../shared"
//! write_diffs = true
//! copy_to_mods = false
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::renderer::DEFAULT_MAX_PATCH_OFFSET;
use crate::template::ScanRules;

/// Name of the configuration file looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "overlay-gen.toml";

/// Directory under the mods directory holding the base sources
pub const CORE_DIR_NAME: &str = "__core__";

/// Directory holding user code, both in the project and in the mods directory
pub const USER_CODE_DIR_NAME: &str = "UserCode";

/// Project directory holding included templates
pub const TEMPLATES_DIR_NAME: &str = "Templates";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse configuration TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    #[error("Expected {what} at {path:?}")]
    MissingDirectory { what: &'static str, path: PathBuf },

    #[error("Failed to create output directory {path:?}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Unvalidated settings; every field is optional so file values and flags
/// can be layered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorSettings {
    pub mods_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub shared_templates_dir: Option<PathBuf>,
    pub write_diffs: Option<bool>,
    pub copy_to_mods: Option<bool>,
    pub template_suffixes: Option<Vec<String>>,
    pub asset_extensions: Option<Vec<String>>,
    pub max_patch_offset: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    generator: GeneratorSettings,
}

impl GeneratorSettings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.generator)
    }

    /// Layer `overrides` on top of `self`; set values in `overrides` win.
    pub fn merge(self, overrides: GeneratorSettings) -> Self {
        Self {
            mods_dir: overrides.mods_dir.or(self.mods_dir),
            output_dir: overrides.output_dir.or(self.output_dir),
            shared_templates_dir: overrides.shared_templates_dir.or(self.shared_templates_dir),
            write_diffs: overrides.write_diffs.or(self.write_diffs),
            copy_to_mods: overrides.copy_to_mods.or(self.copy_to_mods),
            template_suffixes: overrides.template_suffixes.or(self.template_suffixes),
            asset_extensions: overrides.asset_extensions.or(self.asset_extensions),
            max_patch_offset: overrides.max_patch_offset.or(self.max_patch_offset),
        }
    }
}

/// Validated configuration of one generator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub project_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub output_dir: PathBuf,
    pub shared_templates_dir: Option<PathBuf>,
    pub write_diffs: bool,
    pub copy_to_mods: bool,
    pub scan_rules: ScanRules,
    pub max_patch_offset: usize,
}

impl GeneratorConfig {
    /// Check `settings` and resolve every path.
    ///
    /// The project directory is made absolute; the output and shared
    /// template directories are taken relative to it. A missing output
    /// directory is created when its parent exists.
    pub fn validate(project_dir: &Path, settings: GeneratorSettings) -> Result<Self, ConfigError> {
        let project_dir = absolute(project_dir)?;
        let mods_dir = settings.mods_dir.ok_or(ConfigError::Missing("mods_dir"))?;
        let output_dir = project_dir.join(settings.output_dir.ok_or(ConfigError::Missing("output_dir"))?);
        let shared_templates_dir = settings.shared_templates_dir.map(|dir| project_dir.join(dir));

        let defaults = ScanRules::default();
        let config = Self {
            mods_dir,
            output_dir,
            shared_templates_dir,
            write_diffs: settings.write_diffs.unwrap_or(false),
            copy_to_mods: settings.copy_to_mods.unwrap_or(false),
            scan_rules: ScanRules {
                template_suffixes: settings.template_suffixes.unwrap_or(defaults.template_suffixes),
                asset_extensions: settings.asset_extensions.unwrap_or(defaults.asset_extensions),
                control_prefix: defaults.control_prefix,
            },
            max_patch_offset: settings.max_patch_offset.unwrap_or(DEFAULT_MAX_PATCH_OFFSET),
            project_dir,
        };

        require_dir("the mods directory to contain __core__", &config.core_dir())?;
        require_dir("the project to contain UserCode", &config.user_code_dir())?;
        config.ensure_output_dir()?;
        Ok(config)
    }

    /// Base sources, mounted read-only
    pub fn core_dir(&self) -> PathBuf {
        self.mods_dir.join(CORE_DIR_NAME)
    }

    /// Project user code: the templates that are generated
    pub fn user_code_dir(&self) -> PathBuf {
        self.project_dir.join(USER_CODE_DIR_NAME)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.project_dir.join(TEMPLATES_DIR_NAME)
    }

    /// Where generated files are copied when `copy_to_mods` is set
    pub fn mods_user_code_dir(&self) -> PathBuf {
        self.mods_dir.join(USER_CODE_DIR_NAME)
    }

    fn ensure_output_dir(&self) -> Result<(), ConfigError> {
        if self.output_dir.is_dir() {
            return Ok(());
        }
        match self.output_dir.parent() {
            Some(parent) if parent.is_dir() => {
                tracing::info!(path = %self.output_dir.display(), "creating output directory");
                fs::create_dir(&self.output_dir).map_err(|source| ConfigError::CreateOutput {
                    path: self.output_dir.clone(),
                    source,
                })
            }
            _ => {
                tracing::warn!(
                    path = %self.output_dir.display(),
                    "output directory has no parent; refusing to create it"
                );
                Ok(())
            }
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Read {
        path: PathBuf::from("."),
        source,
    })?;
    Ok(cwd.join(path))
}

fn require_dir(what: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingDirectory {
            what,
            path: path.to_path_buf(),
        })
    }
}

/// Read `overlay-gen.toml` from the project if present, apply `overrides`
/// and validate.
pub fn load(project_dir: &Path, overrides: GeneratorSettings) -> Result<GeneratorConfig, ConfigError> {
    let file = project_dir.join(CONFIG_FILE_NAME);
    let settings = if file.is_file() {
        tracing::debug!(path = %file.display(), "reading configuration");
        GeneratorSettings::from_file(&file)?
    } else {
        GeneratorSettings::default()
    };
    GeneratorConfig::validate(project_dir, settings.merge(overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout() -> (TempDir, PathBuf, PathBuf) {
        let root = TempDir::new().unwrap();
        let mods = root.path().join("Mods");
        let project = root.path().join("Project");
        fs::create_dir_all(mods.join(CORE_DIR_NAME)).unwrap();
        fs::create_dir_all(project.join(USER_CODE_DIR_NAME)).unwrap();
        (root, mods, project)
    }

    #[test]
    fn test_parse_settings() {
        let settings = GeneratorSettings::from_str(
            r#"
            [generator]
            mods_dir = "/srv/Mods"
            output_dir = "out"
            write_diffs = true
            template_suffixes = ["tpl"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.mods_dir, Some(PathBuf::from("/srv/Mods")));
        assert_eq!(settings.write_diffs, Some(true));
        assert_eq!(settings.copy_to_mods, None);
        assert_eq!(settings.template_suffixes, Some(vec!["tpl".to_string()]));

        assert_eq!(GeneratorSettings::from_str("").unwrap(), GeneratorSettings::default());
        assert!(matches!(
            GeneratorSettings::from_str("[generator]\nunknown = 1\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_flags_override_file() {
        let file = GeneratorSettings {
            output_dir: Some("from-file".into()),
            write_diffs: Some(true),
            ..Default::default()
        };
        let flags = GeneratorSettings {
            output_dir: Some("from-flag".into()),
            ..Default::default()
        };
        let merged = file.merge(flags);
        assert_eq!(merged.output_dir, Some(PathBuf::from("from-flag")));
        assert_eq!(merged.write_diffs, Some(true));
    }

    #[test]
    fn test_validate_resolves_paths() {
        let (_root, mods, project) = layout();
        let config = GeneratorConfig::validate(
            &project,
            GeneratorSettings {
                mods_dir: Some(mods.clone()),
                output_dir: Some("out".into()),
                shared_templates_dir: Some("../Shared".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.output_dir, project.join("out"));
        assert!(config.output_dir.is_dir());
        assert_eq!(config.shared_templates_dir, Some(project.join("../Shared")));
        assert_eq!(config.core_dir(), mods.join(CORE_DIR_NAME));
        assert_eq!(config.max_patch_offset, DEFAULT_MAX_PATCH_OFFSET);
        assert!(!config.write_diffs);
    }

    #[test]
    fn test_validate_errors() {
        let (_root, mods, project) = layout();
        assert!(matches!(
            GeneratorConfig::validate(&project, GeneratorSettings::default()),
            Err(ConfigError::Missing("mods_dir"))
        ));
        assert!(matches!(
            GeneratorConfig::validate(
                &project,
                GeneratorSettings {
                    mods_dir: Some(mods.clone()),
                    ..Default::default()
                }
            ),
            Err(ConfigError::Missing("output_dir"))
        ));

        fs::remove_dir(mods.join(CORE_DIR_NAME)).unwrap();
        assert!(matches!(
            GeneratorConfig::validate(
                &project,
                GeneratorSettings {
                    mods_dir: Some(mods),
                    output_dir: Some("out".into()),
                    ..Default::default()
                }
            ),
            Err(ConfigError::MissingDirectory { .. })
        ));
    }

    #[test]
    fn test_load_reads_project_file() {
        let (_root, mods, project) = layout();
        fs::write(
            project.join(CONFIG_FILE_NAME),
            format!(
                "[generator]\nmods_dir = {:?}\noutput_dir = \"build\"\ncopy_to_mods = true\n",
                mods.display().to_string()
            ),
        )
        .unwrap();
        let config = load(
            &project,
            GeneratorSettings {
                write_diffs: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.output_dir, project.join("build"));
        assert!(config.copy_to_mods);
        assert!(config.write_diffs);
    }
}
