//! Optional `shader-prep.toml` configuration
//!
//! ```toml
//! helper = "tools/ShaderCrc"
//! compiled_dir = "shaders/fxc"
//! compiled_extension = "vcs"
//! build_id_offset = 24
//! include_dir = "include"
//! ```
//!
//! Every field is optional. Command-line flags override file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::staleness::BUILD_ID_OFFSET;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepConfig {
    /// Build identifier helper; `None` means `ShaderCrc` beside this executable
    pub helper: Option<PathBuf>,

    /// Compiled artifact directory, relative to each shader's directory
    pub compiled_dir: PathBuf,

    pub compiled_extension: String,

    /// Byte offset of the build identifier inside compiled artifacts
    pub build_id_offset: u64,

    /// Header output directory, relative to each shader's directory
    pub include_dir: PathBuf,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            helper: None,
            compiled_dir: PathBuf::from("shaders/fxc"),
            compiled_extension: "vcs".to_string(),
            build_id_offset: BUILD_ID_OFFSET,
            include_dir: PathBuf::from("include"),
        }
    }
}

impl PrepConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parse config from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse shader-prep config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(PrepConfig::parse("").unwrap(), PrepConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = PrepConfig::parse(
            r#"
            helper = "bin/ShaderCrc"
            build_id_offset = 32
            "#,
        )
        .unwrap();
        assert_eq!(config.helper, Some(PathBuf::from("bin/ShaderCrc")));
        assert_eq!(config.build_id_offset, 32);
        assert_eq!(config.compiled_extension, "vcs");
        assert_eq!(config.include_dir, PathBuf::from("include"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(PrepConfig::parse("compiled_dri = \"x\"").is_err());
    }
}
