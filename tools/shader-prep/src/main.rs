//! shader-prep - combo index header and compile work list generator
//!
//! ```bash
//! shader-prep -v 30 stdshader_dx9_30.txt
//! shader-prep -v 20b -d stdshader_dx9_20b.txt   # headers only
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use shader_prep::{BuildIdSource, HelperProcess, InProcessHash, PrepConfig, RunOptions, ShaderModel};

#[derive(Parser)]
#[command(name = "shader-prep")]
#[command(about = "Generate shader combo index headers and compile work lists")]
#[command(version)]
struct Cli {
    /// Shader model tier to build for
    #[arg(short = 'v', long = "ver", value_name = "VERSION", value_enum)]
    model: Version,

    /// Only regenerate headers; do not record compile work
    #[arg(short = 'd', long)]
    headers_only: bool,

    /// Optional shader-prep.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Build identifier helper (default: ShaderCrc next to this executable)
    #[arg(long)]
    helper: Option<PathBuf>,

    /// Hash sources in-process instead of running the helper
    #[arg(long, conflicts_with = "helper")]
    in_process_hash: bool,

    /// Text file listing one shader source per line
    file_list: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum Version {
    /// vs_2_0 / ps_2_b
    #[value(name = "20b")]
    V20b,
    /// vs_3_0 / ps_3_0
    #[value(name = "30")]
    V30,
}

impl From<Version> for ShaderModel {
    fn from(v: Version) -> Self {
        match v {
            Version::V20b => ShaderModel::Sm20b,
            Version::V30 => ShaderModel::Sm30,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PrepConfig::load(path)?,
        None => PrepConfig::default(),
    };
    if cli.helper.is_some() {
        config.helper = cli.helper.clone();
    }

    let ids: Box<dyn BuildIdSource> = if cli.in_process_hash {
        Box::new(InProcessHash)
    } else {
        match &config.helper {
            Some(path) => Box::new(HelperProcess::new(path)),
            None => Box::new(
                HelperProcess::beside_current_exe().context("Failed to locate ShaderCrc helper")?,
            ),
        }
    };

    let options = RunOptions {
        file_list: cli.file_list,
        model: cli.model.into(),
        headers_only: cli.headers_only,
        config,
    };

    tracing::info!(
        "Preparing shaders from {} for shader model {}",
        options.file_list.display(),
        options.model.token()
    );

    let summary = shader_prep::run(&options, ids.as_ref())?;

    tracing::info!(
        "{} shaders: {} up to date, {} headers written",
        summary.processed,
        summary.up_to_date,
        summary.headers_written.len()
    );
    if summary.manifest.is_none() && !options.headers_only {
        tracing::info!("Nothing to compile");
    }

    Ok(())
}
