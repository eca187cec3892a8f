//! Combo directive parser
//!
//! Scans flattened shader lines for annotation comments:
//!
//! ```text
//! // STATIC: "NAME" "min..max" [PC] [=init]
//! // DYNAMIC: "NAME" "min..max" [ps30]
//! // CENTROID: TEXCOORD2
//! // SKIP: $A && !$B [vs20]
//! ```
//!
//! Every annotation passes through a [`DirectiveFilter`] built for one stage
//! and version before it is accepted.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{PrepError, Result};
use crate::model::{
    CentroidMask, CombinationSet, Combo, ShaderModel, ShaderStage, ShaderUnit, SkipRule,
};
use crate::source;

static START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*//\s*(STATIC|DYNAMIC|SKIP|CENTROID)\s*:\s*(.*)$").expect("start pattern")
});
static XBOX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[XBOX\]").expect("xbox pattern"));
static PC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\[PC\]\s*").expect("pc pattern"));
static INIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*=\s*([^\]]+)\]").expect("init pattern"));
static STATIC_COMBO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*//\s*STATIC\s*:\s*"([^"]+)"\s+"(\d+)\.\.(\d+)""#).expect("static pattern")
});
static DYNAMIC_COMBO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*//\s*DYNAMIC\s*:\s*"([^"]+)"\s+"(\d+)\.\.(\d+)""#).expect("dynamic pattern")
});
static CENTROID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*//\s*CENTROID\s*:\s*TEXCOORD(\d+)\s*$").expect("centroid pattern")
});

/// Per-invocation stage/version filter applied to every annotation line
#[derive(Debug, Clone)]
pub struct DirectiveFilter {
    stage: ShaderStage,
    version: String,
    same_stage: Regex,
    other_stage: Regex,
}

impl DirectiveFilter {
    /// Build a filter for `stage` at `version`.
    ///
    /// A vertex filter asked for `20b` compares against `20` instead.
    pub fn new(stage: ShaderStage, version: &str) -> Self {
        let version = if stage == ShaderStage::Vertex && version.eq_ignore_ascii_case("20b") {
            "20".to_string()
        } else {
            version.to_ascii_lowercase()
        };

        let same_stage = Regex::new(&format!(r"(?i)\[{}(\d+\w?)\]", stage.prefix()))
            .expect("stage bracket pattern");
        let other_stage = Regex::new(&format!(r"(?i)\[{}\d+\w?\]", stage.opposite().prefix()))
            .expect("stage bracket pattern");

        Self {
            stage,
            version,
            same_stage,
            other_stage,
        }
    }

    pub fn for_model(stage: ShaderStage, model: ShaderModel) -> Self {
        Self::new(stage, model.token_for(stage))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether an annotation line survives platform and stage filtering
    pub fn accepts(&self, line: &str) -> bool {
        if XBOX.is_match(line) || self.other_stage.is_match(line) {
            return false;
        }

        let mut brackets = self
            .same_stage
            .captures_iter(line)
            .map(|c| c.get(1).map_or("", |m| m.as_str()))
            .peekable();

        brackets.peek().is_none() || brackets.any(|v| v.eq_ignore_ascii_case(&self.version))
    }

    fn strip_stage_brackets(&self, text: &str) -> String {
        self.same_stage.replace_all(text, "").into_owned()
    }

    /// SKIP text is everything before the first same-stage bracket
    fn skip_text<'a>(&self, text: &'a str) -> &'a str {
        match self.same_stage.find(text) {
            Some(m) => &text[..m.start()],
            None => text,
        }
    }
}

/// Everything the directives of one shader declare
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDirectives {
    pub static_combos: CombinationSet,
    pub dynamic_combos: CombinationSet,
    pub skip_rules: Vec<SkipRule>,
    pub centroid: CentroidMask,
}

/// Parse directives out of a flattened line stream
pub fn parse_directives<S: AsRef<str>>(
    lines: &[S],
    filter: &DirectiveFilter,
) -> Result<ParsedDirectives> {
    let mut out = ParsedDirectives::default();

    for line in lines {
        let line = line.as_ref();
        let Some(caps) = START.captures(line) else {
            continue;
        };

        if !filter.accepts(line) {
            tracing::debug!("Filtered out for {}{}: {}", filter.stage.prefix(), filter.version, line);
            continue;
        }

        let kind = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());

        match kind {
            "STATIC" => out.static_combos.push(parse_combo(&STATIC_COMBO, "STATIC", line)?),
            "DYNAMIC" => out.dynamic_combos.push(parse_combo(&DYNAMIC_COMBO, "DYNAMIC", line)?),
            "CENTROID" => {
                let slot = parse_centroid(line, filter)?;
                out.centroid.set_slot(slot);
            }
            _ => {
                let rule = PC.replace_all(filter.skip_text(body), "");
                out.skip_rules.push(rule.trim().to_string());
            }
        }
    }

    Ok(out)
}

fn parse_combo(regex: &Regex, kind: &'static str, line: &str) -> Result<Combo> {
    let malformed = || PrepError::MalformedDirective {
        kind,
        line: line.trim().to_string(),
    };

    let init = INIT.captures(line).and_then(|c| c.get(1)).map(|m| clean_init(m.as_str()));

    let cleaned = PC.replace_all(line, " ");
    let caps = regex.captures(&cleaned).ok_or_else(malformed)?;
    let min_val = caps[2].parse::<i32>().map_err(|_| malformed())?;
    let max_val = caps[3].parse::<i32>().map_err(|_| malformed())?;

    let combo = Combo::new(&caps[1], min_val, max_val);
    Ok(match init {
        Some(expr) => combo.with_init(expr),
        None => combo,
    })
}

/// Init expressions may carry a trailing `;`; drop it
fn clean_init(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = match trimmed.rfind(';') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };
    trimmed.trim().to_string()
}

fn parse_centroid(line: &str, filter: &DirectiveFilter) -> Result<u32> {
    let cleaned = filter.strip_stage_brackets(&PC.replace_all(line, " "));
    let slot = CENTROID
        .captures(&cleaned)
        .and_then(|c| c[1].parse::<u32>().ok())
        .ok_or_else(|| PrepError::MalformedDirective {
            kind: "CENTROID",
            line: line.trim().to_string(),
        })?;

    if slot >= 32 {
        return Err(PrepError::CentroidSlotOutOfRange { slot });
    }
    Ok(slot)
}

/// Assemble and parse one shader file into a [`ShaderUnit`]
pub fn parse_shader(
    path: impl AsRef<Path>,
    name: &str,
    stage: ShaderStage,
    model: ShaderModel,
) -> Result<ShaderUnit> {
    let assembled = source::assemble(path)?;
    let filter = DirectiveFilter::for_model(stage, model);
    let parsed = parse_directives(&assembled.lines, &filter)?;

    Ok(ShaderUnit {
        name: name.to_string(),
        stage,
        model,
        version: filter.version().to_string(),
        static_combos: parsed.static_combos,
        dynamic_combos: parsed.dynamic_combos,
        skip_rules: parsed.skip_rules,
        centroid: parsed.centroid,
        files: assembled.files,
    })
}
