//! Shader file naming: stage detection and derived output names

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{PrepError, Result};
use crate::model::ShaderStage;

static STAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_([vp]s)\d+\w?$").expect("stage suffix pattern"));

/// Lowercase file stem of a shader path
pub fn shader_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Stage encoded by the `_vsNN` / `_psNN` suffix of a file stem
pub fn detect_stage(path: &Path) -> Result<ShaderStage> {
    let stem = shader_stem(path);
    let caps = STAGE_SUFFIX
        .captures(&stem)
        .ok_or_else(|| PrepError::UnknownStage {
            file: path.to_path_buf(),
        })?;

    Ok(match &caps[1] {
        "vs" => ShaderStage::Vertex,
        _ => ShaderStage::Pixel,
    })
}

/// Lowercase stem with its stage suffix rewritten to carry `version`.
///
/// `water_ps2x` built for `30` becomes `water_ps30`.
pub fn derive_output_name(path: &Path, version: &str) -> String {
    let stem = shader_stem(path);
    STAGE_SUFFIX
        .replace(&stem, |caps: &regex::Captures| format!("_{}{}", &caps[1], version))
        .into_owned()
}
