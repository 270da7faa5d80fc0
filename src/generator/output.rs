//! Output tree bookkeeping

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{GenerateError, OUTPUT_MOUNT};
use crate::vfs::{PathError, Vfs, VirtualPath};

const OVERRIDE_MARKER: &str = ".override";

/// Override file for a base file: `Items/Foo.cs` gives
/// `Items/Foo.override.cs`.
pub fn override_path(base: &VirtualPath) -> Result<VirtualPath, PathError> {
    let name = base.file_name().unwrap_or_default();
    let overridden = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}{OVERRIDE_MARKER}.{extension}"),
        _ => format!("{name}{OVERRIDE_MARKER}"),
    };
    base.with_file_name(&overridden)
}

/// Base file an override file replaces, or `None` if `path` is not an
/// override file.
pub fn override_base(path: &VirtualPath) -> Option<VirtualPath> {
    let name = path.file_name()?;
    let (stem, extension) = name.rsplit_once('.')?;
    let stem = stem.strip_suffix(OVERRIDE_MARKER).filter(|s| !s.is_empty())?;
    path.with_file_name(&format!("{stem}.{extension}")).ok()
}

/// Patch file written next to an override: `Foo.override.cs` gives
/// `Foo.cs.patch`.
pub fn patch_path(override_file: &VirtualPath) -> Option<VirtualPath> {
    let base = override_base(override_file)?;
    let name = format!("{}.patch", base.file_name()?);
    override_file.with_file_name(&name).ok()
}

/// Files produced by one run, keyed by output path. Each path may be
/// produced once.
#[derive(Debug, Clone, Default)]
pub struct GeneratedFiles {
    files: BTreeMap<VirtualPath, VirtualPath>,
}

impl GeneratedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as produced by the template at `producer`.
    pub fn insert(&mut self, path: VirtualPath, producer: &VirtualPath) -> Result<(), GenerateError> {
        if let Some(first) = self.files.get(&path) {
            return Err(GenerateError::OutputCollision {
                path,
                first: first.clone(),
                second: producer.clone(),
            });
        }
        self.files.insert(path, producer.clone());
        Ok(())
    }

    pub fn contains(&self, path: &VirtualPath) -> bool {
        self.files.contains_key(path)
    }

    /// Template that produced `path`.
    pub fn producer(&self, path: &VirtualPath) -> Option<&VirtualPath> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Output paths in order.
    pub fn iter(&self) -> impl Iterator<Item = &VirtualPath> {
        self.files.keys()
    }
}

/// Writes into the output mount and records what it wrote.
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter<'a> {
    vfs: &'a Vfs,
}

impl<'a> OutputWriter<'a> {
    pub fn new(vfs: &'a Vfs) -> Self {
        Self { vfs }
    }

    /// Virtual location of an output-relative path.
    pub fn output_path(&self, path: &VirtualPath) -> Result<VirtualPath, PathError> {
        Ok(VirtualPath::new(OUTPUT_MOUNT)?.join_path(path))
    }

    pub fn write_text(
        &self,
        files: &mut GeneratedFiles,
        path: &VirtualPath,
        text: &str,
        producer: &VirtualPath,
    ) -> Result<PathBuf, GenerateError> {
        files.insert(path.clone(), producer)?;
        let written = self.vfs.write(&self.output_path(path)?, text)?;
        tracing::info!(path = %path, from = %producer, "generated");
        Ok(written)
    }

    /// Copy the file at virtual path `from` to output path `path`.
    pub fn copy(
        &self,
        files: &mut GeneratedFiles,
        from: &VirtualPath,
        path: &VirtualPath,
    ) -> Result<PathBuf, GenerateError> {
        files.insert(path.clone(), from)?;
        let written = self.vfs.copy(from, &self.output_path(path)?)?;
        tracing::info!(path = %path, from = %from, "copied");
        Ok(written)
    }

    /// Write a file that is not itself generated output, such as a patch.
    pub fn write_untracked(&self, path: &VirtualPath, text: &str) -> Result<PathBuf, GenerateError> {
        Ok(self.vfs.write(&self.output_path(path)?, text)?)
    }

    pub fn read(&self, path: &VirtualPath) -> Result<String, GenerateError> {
        Ok(self.vfs.read_to_string(&self.output_path(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vp(s: &str) -> VirtualPath {
        VirtualPath::new(s).unwrap()
    }

    #[test]
    fn test_override_naming() {
        assert_eq!(override_path(&vp("Items/Foo.cs")).unwrap(), vp("Items/Foo.override.cs"));
        assert_eq!(override_path(&vp("Makefile")).unwrap(), vp("Makefile.override"));
        assert_eq!(override_base(&vp("Items/Foo.override.cs")), Some(vp("Items/Foo.cs")));
        assert_eq!(override_base(&vp("Items/Foo.cs")), None);
        assert_eq!(override_base(&vp(".override.cs")), None);
        assert_eq!(patch_path(&vp("Items/Foo.override.cs")), Some(vp("Items/Foo.cs.patch")));
        assert_eq!(patch_path(&vp("Items/Foo.cs")), None);
    }

    #[test]
    fn test_collision() {
        let mut files = GeneratedFiles::new();
        files.insert(vp("A.cs"), &vp("A.cs")).unwrap();
        match files.insert(vp("A.cs"), &vp("__setup")) {
            Err(GenerateError::OutputCollision { first, second, .. }) => {
                assert_eq!(first, vp("A.cs"));
                assert_eq!(second, vp("__setup"));
            }
            other => panic!("Expected OutputCollision, got {other:?}"),
        }
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_writer_records_outputs() {
        let dir = TempDir::new().unwrap();
        let mut vfs = Vfs::new();
        vfs.mount(OUTPUT_MOUNT, dir.path(), false).unwrap();
        let writer = OutputWriter::new(&vfs);
        let mut files = GeneratedFiles::new();

        let written = writer
            .write_text(&mut files, &vp("Items/A.cs"), "class A { }", &vp("Items/A.cs"))
            .unwrap();
        assert_eq!(written, dir.path().join("Items").join("A.cs"));
        writer.write_untracked(&vp("Items/A.cs.patch"), "").unwrap();

        assert!(files.contains(&vp("Items/A.cs")));
        assert!(!files.contains(&vp("Items/A.cs.patch")));
        assert_eq!(writer.read(&vp("Items/A.cs")).unwrap(), "class A { }");
    }
}
