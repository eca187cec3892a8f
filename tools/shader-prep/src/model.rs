//! Intermediate representation for shader combo declarations

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a combo gets its value before the renderer touches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComboInit {
    /// `[=expr]` was given; the field starts at `expr` and needs no explicit set
    FixedDefault(String),
    /// No default; the renderer must call the setter before `GetIndex`
    RequiresExplicitSet,
}

/// A named, integer-valued configuration axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combo {
    pub name: String,
    pub min_val: i32,
    pub max_val: i32,
    pub init: ComboInit,
}

impl Combo {
    pub fn new(name: impl Into<String>, min_val: i32, max_val: i32) -> Self {
        Self {
            name: name.into(),
            min_val,
            max_val,
            init: ComboInit::RequiresExplicitSet,
        }
    }

    pub fn with_init(mut self, expr: impl Into<String>) -> Self {
        self.init = ComboInit::FixedDefault(expr.into());
        self
    }

    /// Number of representable values, `max - min + 1`; `None` for a reversed range
    pub fn cardinality(&self) -> Option<u64> {
        u64::try_from(i64::from(self.max_val) - i64::from(self.min_val) + 1)
            .ok()
            .filter(|&n| n > 0)
    }

    pub fn requires_explicit_set(&self) -> bool {
        matches!(self.init, ComboInit::RequiresExplicitSet)
    }

    /// Init expression, or the literal `0` for combos without one
    pub fn initial_expr(&self) -> &str {
        match &self.init {
            ComboInit::FixedDefault(expr) => expr,
            ComboInit::RequiresExplicitSet => "0",
        }
    }
}

/// Ordered combos of one kind; order fixes accessor order and packing order
pub type CombinationSet = Vec<Combo>;

/// Verbatim SKIP predicate text
pub type SkipRule = String;

/// Bitmask of texcoord slots that request centroid sampling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CentroidMask(pub u32);

impl CentroidMask {
    pub fn set_slot(&mut self, slot: u32) {
        self.0 |= 1 << slot;
    }
}

/// Which of the two combo sets a combo belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboKind {
    Static,
    Dynamic,
}

impl ComboKind {
    /// Suffix used in generated type names (`<name>_Static_Index`)
    pub fn type_suffix(self) -> &'static str {
        match self {
            ComboKind::Static => "Static",
            ComboKind::Dynamic => "Dynamic",
        }
    }
}

/// Programmable pipeline stage a source file targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    /// Two-letter bracket prefix (`vs` / `ps`)
    pub fn prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ShaderStage::Vertex => ShaderStage::Pixel,
            ShaderStage::Pixel => ShaderStage::Vertex,
        }
    }

    /// Symbol prefix for the "forgot to set" macro (`vsh_` / `psh_`)
    pub fn forgot_prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vsh_",
            ShaderStage::Pixel => "psh_",
        }
    }
}

/// Build profile tier selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderModel {
    /// 2.0 vertex / 2.0b pixel
    Sm20b,
    /// 3.0 vertex and pixel
    Sm30,
}

impl ShaderModel {
    /// Version token as it appears in file names and brackets
    pub fn token(self) -> &'static str {
        match self {
            ShaderModel::Sm20b => "20b",
            ShaderModel::Sm30 => "30",
        }
    }

    /// Token used by `stage` under this tier.
    ///
    /// The 2.0b pixel profile pairs with plain 2.0 vertex shaders, so vertex
    /// files built for the `20b` tier look for `[vs20]` brackets.
    pub fn token_for(self, stage: ShaderStage) -> &'static str {
        match (self, stage) {
            (ShaderModel::Sm20b, ShaderStage::Vertex) => "20",
            _ => self.token(),
        }
    }
}

/// Downstream compiler target, one per (stage, tier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetProfile {
    #[serde(rename = "vs_2_0")]
    Vs20,
    #[serde(rename = "vs_3_0")]
    Vs30,
    #[serde(rename = "ps_2_b")]
    Ps2b,
    #[serde(rename = "ps_3_0")]
    Ps30,
}

impl TargetProfile {
    pub fn select(stage: ShaderStage, model: ShaderModel) -> Self {
        match (stage, model) {
            (ShaderStage::Vertex, ShaderModel::Sm20b) => TargetProfile::Vs20,
            (ShaderStage::Vertex, ShaderModel::Sm30) => TargetProfile::Vs30,
            (ShaderStage::Pixel, ShaderModel::Sm20b) => TargetProfile::Ps2b,
            (ShaderStage::Pixel, ShaderModel::Sm30) => TargetProfile::Ps30,
        }
    }

    /// Profile name as the compiler spells it; matches the serialized form
    pub fn as_str(self) -> &'static str {
        match self {
            TargetProfile::Vs20 => "vs_2_0",
            TargetProfile::Vs30 => "vs_3_0",
            TargetProfile::Ps2b => "ps_2_b",
            TargetProfile::Ps30 => "ps_3_0",
        }
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One shader source file after include flattening and directive parsing
#[derive(Debug, Clone)]
pub struct ShaderUnit {
    /// Derived output name (`foo_ps30`)
    pub name: String,
    pub stage: ShaderStage,
    pub model: ShaderModel,
    /// Resolved version token used for bracket filtering (`20`, `20b`, `30`)
    pub version: String,
    pub static_combos: CombinationSet,
    pub dynamic_combos: CombinationSet,
    pub skip_rules: Vec<SkipRule>,
    pub centroid: CentroidMask,
    /// Root file first, then includes in encounter order
    pub files: Vec<String>,
}

impl ShaderUnit {
    pub fn target(&self) -> TargetProfile {
        TargetProfile::select(self.stage, self.model)
    }
}
