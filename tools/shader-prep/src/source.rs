//! Include flattening for shader sources
//!
//! Only the `#include "relative/path"` form is understood. There is no macro
//! expansion and no include guards: a file included twice is flattened twice.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{PrepError, Result};

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*#\s*include\s*"([^"]+)"\s*(//.*)?$"#).expect("include pattern is valid")
});

/// Flattened source of one shader file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledSource {
    /// Raw lines with every include directive replaced by the included lines
    pub lines: Vec<String>,
    /// Contributing file names; root first, then includes in encounter order
    pub files: Vec<String>,
}

impl AssembledSource {
    /// Lines joined back into a single `\n`-separated text
    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Flatten `path` and everything it includes
pub fn assemble(path: impl AsRef<Path>) -> Result<AssembledSource> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| PrepError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut out = AssembledSource::default();
    let mut stack = Vec::new();
    flatten(path, &content, &mut stack, &mut out)?;
    Ok(out)
}

fn flatten(
    path: &Path,
    content: &str,
    stack: &mut Vec<PathBuf>,
    out: &mut AssembledSource,
) -> Result<()> {
    let identity = identity_of(path);
    if stack.contains(&identity) {
        return Err(PrepError::RecursiveInclude {
            path: path.to_path_buf(),
        });
    }
    stack.push(identity);
    out.files.push(file_name(path));

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for line in content.lines() {
        let Some(caps) = INCLUDE.captures(line) else {
            out.lines.push(line.to_string());
            continue;
        };

        let child = base.join(&caps[1]);
        tracing::debug!("{} includes {}", path.display(), child.display());
        let child_content = std::fs::read_to_string(&child).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PrepError::MissingInclude {
                    path: child.clone(),
                    included_from: path.to_path_buf(),
                }
            } else {
                PrepError::Io {
                    path: child.clone(),
                    source,
                }
            }
        })?;
        flatten(&child, &child_content, stack, out)?;
    }

    stack.pop();
    Ok(())
}

/// Canonical path when it can be resolved, so `a/../b.h` and `b.h` compare equal
fn identity_of(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
