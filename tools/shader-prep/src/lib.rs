//! Shader combo preparation library
//!
//! Reads a list of shader sources, flattens their includes, parses the combo
//! directives in their comments and, for every shader whose compiled binary
//! is out of date, writes a combo index header (`include/<name>.inc`) and
//! records compile work in `<list>_work.json`.

pub mod config;
pub mod error;
pub mod generators;
pub mod layout;
pub mod manifest;
pub mod model;
pub mod naming;
pub mod parser;
pub mod source;
pub mod staleness;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use config::PrepConfig;
pub use error::PrepError;
pub use manifest::WorkManifest;
pub use model::{Combo, ComboInit, ShaderModel, ShaderStage, ShaderUnit};
pub use staleness::{BuildIdSource, HelperProcess, InProcessHash, StalenessOracle};

/// Inputs of one batch
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub file_list: PathBuf,
    pub model: ShaderModel,
    /// Regenerate headers only; no compile work is recorded
    pub headers_only: bool,
    pub config: PrepConfig,
}

/// What a batch did
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Shaders named by the file list
    pub processed: usize,
    /// Shaders whose compiled binary was already current
    pub up_to_date: usize,
    pub headers_written: Vec<PathBuf>,
    /// Work manifest path, when one was written
    pub manifest: Option<PathBuf>,
}

/// Shader paths named by a file list, resolved against the list's directory.
///
/// Blank lines and `//` comment lines are skipped.
pub fn read_file_list(path: &Path) -> Result<Vec<PathBuf>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file list {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let shaders: Vec<PathBuf> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .map(|line| base.join(line))
        .collect();

    if shaders.is_empty() {
        return Err(PrepError::EmptyFileList {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(shaders)
}

/// Parse one shader and write its header into `<shader dir>/<include_dir>`
pub fn prepare_shader(
    path: &Path,
    model: ShaderModel,
    include_dir: &Path,
) -> Result<(ShaderUnit, PathBuf)> {
    let stage = naming::detect_stage(path)?;
    let name = naming::derive_output_name(path, model.token_for(stage));

    let unit = parser::parse_shader(path, &name, stage, model)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let dir = path.parent().unwrap_or_else(|| Path::new("")).join(include_dir);
    let header = generators::header::write_include_header(&unit, &dir)?;
    Ok((unit, header))
}

/// Process every shader of a file list
pub fn run(options: &RunOptions, ids: &dyn BuildIdSource) -> Result<RunSummary> {
    let file_list = std::path::absolute(&options.file_list)
        .with_context(|| format!("Invalid file list path {}", options.file_list.display()))?;
    let shaders = read_file_list(&file_list)?;

    let config = &options.config;
    let oracle = StalenessOracle::new(ids)
        .with_compiled_dir(&config.compiled_dir)
        .with_extension(&config.compiled_extension)
        .with_offset(config.build_id_offset);

    let mut summary = RunSummary::default();
    let mut work = WorkManifest::new();

    for shader in &shaders {
        summary.processed += 1;

        let stage = naming::detect_stage(shader)?;
        let name = naming::derive_output_name(shader, options.model.token_for(stage));

        if oracle.is_current(shader, &name) {
            tracing::debug!("{} is up to date", name);
            summary.up_to_date += 1;
            continue;
        }

        let (unit, header) = prepare_shader(shader, options.model, &config.include_dir)?;
        tracing::info!(
            "{}: {} static, {} dynamic combos -> {}",
            unit.name,
            unit.static_combos.len(),
            unit.dynamic_combos.len(),
            header.display()
        );
        summary.headers_written.push(header);

        if !options.headers_only {
            work.insert(&unit);
        }
    }

    if !work.is_empty() {
        let path = manifest::manifest_path(&file_list);
        work.write_json(&path)?;
        tracing::info!("Wrote {} work entries to {}", work.len(), path.display());
        summary.manifest = Some(path);
    }

    Ok(summary)
}
