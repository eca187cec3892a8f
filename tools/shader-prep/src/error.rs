//! Typed errors raised while assembling and parsing shader sources

use std::path::PathBuf;

/// Fatal errors in shader sources or the batch configuration.
///
/// Staleness failures never show up here; the oracle downgrades them to
/// "stale" and logs a warning instead.
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    /// An `#include` points at a file that does not exist
    #[error("included file {path} does not exist (included from {included_from})")]
    MissingInclude {
        path: PathBuf,
        included_from: PathBuf,
    },

    /// Reading a shader source failed for a reason other than absence
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file includes itself, directly or through other files
    #[error("file {path} is recursively included")]
    RecursiveInclude { path: PathBuf },

    /// A STATIC/DYNAMIC/CENTROID annotation that does not follow its grammar
    #[error("malformed {kind} directive: {line}")]
    MalformedDirective { kind: &'static str, line: String },

    /// CENTROID slot that does not fit in the 32-bit mask
    #[error("centroid slot TEXCOORD{slot} is out of range (must be 0-31)")]
    CentroidSlotOutOfRange { slot: u32 },

    /// Source file name carries neither a `_vsNN` nor a `_psNN` suffix
    #[error("cannot determine shader stage of {file} (expected a _vsNN or _psNN suffix)")]
    UnknownStage { file: PathBuf },

    /// A combo whose range is reversed (`max < min`)
    #[error("combo {name} has an empty range {min_val}..{max_val}")]
    InvalidComboRange {
        name: String,
        min_val: i32,
        max_val: i32,
    },

    /// The combo space no longer fits a 64-bit index once `name` is added
    #[error("combo space overflows a 64-bit index at combo {name}")]
    ComboSpaceOverflow { name: String },

    /// The file list names no shaders
    #[error("file list {path} does not name any shader")]
    EmptyFileList { path: PathBuf },

    /// The external build identifier helper failed or printed garbage
    #[error("build identifier helper failed: {0}")]
    Helper(String),
}

pub type Result<T> = std::result::Result<T, PrepError>;
