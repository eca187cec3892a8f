//! Staleness checks against previously compiled shader binaries
//!
//! A compiled `.vcs` file stores the build identifier of the source it was
//! compiled from as a little-endian `u32` at a fixed offset. A shader is up
//! to date when that stored value equals the identifier of the current source.
//! Every failure along the way means "stale"; nothing here aborts a batch.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{PrepError, Result};
use crate::source;

/// Default offset of the build identifier inside a compiled artifact
pub const BUILD_ID_OFFSET: u64 = 24;

/// File name of the external helper, looked up next to this executable
pub const HELPER_NAME: &str = "ShaderCrc";

/// Computes the content-derived build identifier of a shader source
pub trait BuildIdSource {
    fn compute_build_id(&self, source: &Path) -> Result<u32>;
}

/// Runs an external helper as `<helper> <source>` and reads the identifier
/// it prints to stdout.
#[derive(Debug, Clone)]
pub struct HelperProcess {
    exe: PathBuf,
}

impl HelperProcess {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    /// Helper located in the same directory as the running executable
    pub fn beside_current_exe() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::new(dir.join(format!(
            "{}{}",
            HELPER_NAME,
            std::env::consts::EXE_SUFFIX
        ))))
    }
}

impl BuildIdSource for HelperProcess {
    fn compute_build_id(&self, source: &Path) -> Result<u32> {
        // The helper's exit code is the identifier itself, so only stdout is trusted
        let output = Command::new(&self.exe)
            .arg(source)
            .output()
            .map_err(|e| PrepError::Helper(format!("{}: {}", self.exe.display(), e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<u32>().map_err(|_| {
            PrepError::Helper(format!(
                "{} printed {:?} for {}",
                self.exe.display(),
                stdout.trim(),
                source.display()
            ))
        })
    }
}

/// In-process identifier: xxh32 of the include-flattened source text
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessHash;

impl BuildIdSource for InProcessHash {
    fn compute_build_id(&self, path: &Path) -> Result<u32> {
        let assembled = source::assemble(path)?;
        Ok(xxhash_rust::xxh32::xxh32(assembled.text().as_bytes(), 0))
    }
}

/// Read the `u32` stored at `offset` in a compiled artifact
pub fn read_embedded_build_id(artifact: &Path, offset: u64) -> std::io::Result<u32> {
    let mut file = File::open(artifact)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = [0u8; 4];
    file.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Decides whether a shader needs its header and compile work regenerated
pub struct StalenessOracle<'a> {
    ids: &'a dyn BuildIdSource,
    compiled_dir: PathBuf,
    extension: String,
    offset: u64,
}

impl<'a> StalenessOracle<'a> {
    pub fn new(ids: &'a dyn BuildIdSource) -> Self {
        Self {
            ids,
            compiled_dir: PathBuf::from("shaders/fxc"),
            extension: "vcs".to_string(),
            offset: BUILD_ID_OFFSET,
        }
    }

    /// Directory of compiled artifacts, relative to each source's directory
    pub fn with_compiled_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.compiled_dir = dir.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// `<source dir>/<compiled dir>/<name>.<ext>`
    pub fn artifact_path(&self, source: &Path, name: &str) -> PathBuf {
        source
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.compiled_dir)
            .join(format!("{}.{}", name, self.extension))
    }

    /// True when the compiled artifact matches the current source
    pub fn is_current(&self, source: &Path, name: &str) -> bool {
        let artifact = self.artifact_path(source, name);

        let stored = match read_embedded_build_id(&artifact, self.offset) {
            Ok(id) => id,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} has no compiled artifact", name);
                return false;
            }
            Err(e) => {
                tracing::warn!("Treating {} as stale: cannot read {}: {}", name, artifact.display(), e);
                return false;
            }
        };

        match self.ids.compute_build_id(source) {
            Ok(current) => current == stored,
            Err(e) => {
                tracing::warn!("Treating {} as stale: {}", name, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct FixedId(u32);

    impl BuildIdSource for FixedId {
        fn compute_build_id(&self, _source: &Path) -> Result<u32> {
            Ok(self.0)
        }
    }

    struct FailingId;

    impl BuildIdSource for FailingId {
        fn compute_build_id(&self, _source: &Path) -> Result<u32> {
            Err(PrepError::Helper("boom".to_string()))
        }
    }

    fn write_artifact(path: &Path, id: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut bytes = vec![0xAAu8; 24];
        bytes.extend_from_slice(&id.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_read_embedded_build_id() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("a.vcs");
        write_artifact(&artifact, 0xDEADBEEF);
        assert_eq!(read_embedded_build_id(&artifact, 24).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_matching_id_is_current() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("water_ps2x.fxc");
        fs::write(&src, "").unwrap();
        write_artifact(&dir.path().join("shaders/fxc/water_ps30.vcs"), 1234);

        let ids = FixedId(1234);
        let oracle = StalenessOracle::new(&ids);
        assert!(oracle.is_current(&src, "water_ps30"));

        let other = FixedId(99);
        assert!(!StalenessOracle::new(&other).is_current(&src, "water_ps30"));
    }

    #[test]
    fn test_missing_artifact_is_stale() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("water_ps2x.fxc");
        fs::write(&src, "").unwrap();

        let ids = FixedId(0);
        assert!(!StalenessOracle::new(&ids).is_current(&src, "water_ps30"));
    }

    #[test]
    fn test_truncated_artifact_is_stale() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("water_ps2x.fxc");
        fs::write(&src, "").unwrap();
        let artifact = dir.path().join("shaders/fxc/water_ps30.vcs");
        fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        fs::write(&artifact, [0u8; 10]).unwrap();

        let ids = FixedId(0);
        assert!(!StalenessOracle::new(&ids).is_current(&src, "water_ps30"));
    }

    #[test]
    fn test_helper_failure_is_stale() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("water_ps2x.fxc");
        fs::write(&src, "").unwrap();
        write_artifact(&dir.path().join("shaders/fxc/water_ps30.vcs"), 0);

        assert!(!StalenessOracle::new(&FailingId).is_current(&src, "water_ps30"));
    }

    #[test]
    fn test_missing_helper_binary_errors() {
        let helper = HelperProcess::new("/definitely/not/here/ShaderCrc");
        let err = helper.compute_build_id(Path::new("x.fxc")).unwrap_err();
        assert!(matches!(err, PrepError::Helper(_)));
    }

    #[test]
    fn test_custom_layout() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a_vs20.fxc");
        let ids = FixedId(0);
        let oracle = StalenessOracle::new(&ids)
            .with_compiled_dir("out")
            .with_extension("bin")
            .with_offset(0);
        assert_eq!(oracle.artifact_path(&src, "a_vs20"), dir.path().join("out/a_vs20.bin"));
    }

    #[test]
    fn test_in_process_hash_tracks_includes() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a_ps30.fxc");
        fs::write(dir.path().join("common.h"), "one\n").unwrap();
        fs::write(&src, "#include \"common.h\"\n").unwrap();

        let before = InProcessHash.compute_build_id(&src).unwrap();
        assert_eq!(before, InProcessHash.compute_build_id(&src).unwrap());

        fs::write(dir.path().join("common.h"), "two\n").unwrap();
        assert_ne!(before, InProcessHash.compute_build_id(&src).unwrap());
    }
}
