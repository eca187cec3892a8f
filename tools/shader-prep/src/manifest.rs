//! Compile work manifest (`<list>_work.json`)
//!
//! One entry per stale shader, keyed by its derived name. The downstream
//! compiler only needs combo ranges, so init values are dropped here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::{Combo, ShaderUnit, SkipRule, TargetProfile};

/// Combo range as the compiler sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCombo {
    pub name: String,
    #[serde(rename = "minVal")]
    pub min_val: i32,
    #[serde(rename = "maxVal")]
    pub max_val: i32,
}

impl From<&Combo> for ManifestCombo {
    fn from(combo: &Combo) -> Self {
        Self {
            name: combo.name.clone(),
            min_val: combo.min_val,
            max_val: combo.max_val,
        }
    }
}

/// Compile work for one shader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkEntry {
    #[serde(rename = "static")]
    pub static_combos: Vec<ManifestCombo>,
    #[serde(rename = "dynamic")]
    pub dynamic_combos: Vec<ManifestCombo>,
    pub files: Vec<String>,
    pub centroid: u32,
    pub version: TargetProfile,
    pub skip: String,
}

impl From<&ShaderUnit> for WorkEntry {
    fn from(unit: &ShaderUnit) -> Self {
        Self {
            static_combos: unit.static_combos.iter().map(ManifestCombo::from).collect(),
            dynamic_combos: unit.dynamic_combos.iter().map(ManifestCombo::from).collect(),
            files: unit.files.clone(),
            centroid: unit.centroid.0,
            version: unit.target(),
            skip: combined_skip(&unit.skip_rules),
        }
    }
}

/// OR of all skip rules: `(a)||(b)`; an empty list gives `()`
pub fn combined_skip(rules: &[SkipRule]) -> String {
    format!("({})", rules.join(")||("))
}

/// `<dir>/<stem>_work.json` next to the file list
pub fn manifest_path(file_list: &Path) -> PathBuf {
    let stem = file_list
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    file_list
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{}_work.json", stem))
}

/// Accumulated compile work for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkManifest {
    entries: BTreeMap<String, WorkEntry>,
}

impl WorkManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the entry for a stale shader
    pub fn insert(&mut self, unit: &ShaderUnit) {
        self.entries.insert(unit.name.clone(), WorkEntry::from(unit));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize work manifest")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write work manifest to {}", path.display()))
    }
}
