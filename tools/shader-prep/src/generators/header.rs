//! Combo index header generator
//!
//! Emits `<name>.inc` with a `<name>_Static_Index` and a `<name>_Dynamic_Index`
//! class. Each class packs its combos into one integer via `GetIndex`, checks
//! setter arguments with `Assert`, and in `_DEBUG` builds tracks which combos
//! were set. The accompanying `shader<Kind>Test_<name>` macro names one
//! unresolved symbol per combo without an init value, so renderer code that
//! references it fails to link until every such combo is set.

use anyhow::{Context, Result};
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::ComboLayout;
use crate::model::{Combo, ComboKind, ShaderStage, ShaderUnit};

/// Constructor parameters of the static index type
pub const STATIC_CTOR: &str = "IShaderShadow* pShaderShadow, IMaterialVar** params";
/// Constructor parameters of the dynamic index type
pub const DYNAMIC_CTOR: &str = "IShaderDynamicAPI* pShaderAPI";

const API_INCLUDES: [&str; 3] = [
    "shaderapi/ishaderapi.h",
    "shaderapi/ishadershadow.h",
    "materialsystem/imaterialvar.h",
];

/// Naming and constructor inputs of one index type
#[derive(Debug, Clone, Copy)]
pub struct IndexTypeSpec<'a> {
    pub base_name: &'a str,
    pub kind: ComboKind,
    pub stage: ShaderStage,
    pub ctor_signature: &'a str,
}

impl IndexTypeSpec<'_> {
    pub fn class_name(&self) -> String {
        format!("{}_{}_Index", self.base_name, self.kind.type_suffix())
    }

    pub fn test_macro_name(&self) -> String {
        format!("shader{}Test_{}", self.kind.type_suffix(), self.base_name)
    }

    fn forgot_symbol(&self, combo: &Combo) -> String {
        format!(
            "{}forgot_to_set_{}_{}",
            self.stage.forgot_prefix(),
            self.kind.type_suffix().to_lowercase(),
            combo.name
        )
    }
}

/// Render one packed index class plus its usage-forcing macro
pub fn render_index_type(
    combos: &[Combo],
    spec: &IndexTypeSpec<'_>,
    seed_scale: u64,
) -> Result<String> {
    let layout = ComboLayout::new(combos, seed_scale)
        .with_context(|| format!("Failed to lay out {}", spec.class_name()))?;
    let class_name = spec.class_name();
    let tracked: Vec<&Combo> = combos.iter().filter(|c| c.requires_explicit_set()).collect();
    let debug_block = !tracked.is_empty();

    let mut output = String::new();

    writeln!(output, "class {}", class_name)?;
    writeln!(output, "{{")?;

    // Fields
    for field in layout.fields() {
        writeln!(output, "\tunsigned int m_n{} : {};", field.name, field.bits)?;
    }
    if debug_block {
        writeln!(output, "#ifdef _DEBUG")?;
        for combo in &tracked {
            writeln!(output, "\tbool m_b{} : 1;", combo.name)?;
        }
        writeln!(output, "#endif\t// _DEBUG")?;
    }
    writeln!(output, "public:")?;

    // Setters
    for combo in combos {
        writeln!(output, "\tvoid Set{}( int i )", combo.name)?;
        writeln!(output, "\t{{")?;
        writeln!(
            output,
            "\t\tAssert( i >= {} && i <= {} );",
            combo.min_val, combo.max_val
        )?;
        writeln!(output, "\t\tm_n{} = i;", combo.name)?;
        if combo.requires_explicit_set() {
            writeln!(output, "#ifdef _DEBUG")?;
            writeln!(output, "\t\tm_b{} = true;", combo.name)?;
            writeln!(output, "#endif\t// _DEBUG")?;
        }
        writeln!(output, "\t}}")?;
        writeln!(output)?;
    }

    // Constructor
    writeln!(output, "\t{}( {} )", class_name, spec.ctor_signature)?;
    writeln!(output, "\t{{")?;
    for combo in combos {
        writeln!(output, "\t\tm_n{} = {};", combo.name, combo.initial_expr())?;
    }
    if debug_block {
        writeln!(output, "#ifdef _DEBUG")?;
        for combo in &tracked {
            writeln!(output, "\t\tm_b{} = false;", combo.name)?;
        }
        writeln!(output, "#endif\t// _DEBUG")?;
    }
    writeln!(output, "\t}}")?;
    writeln!(output)?;

    // Index
    writeln!(output, "\tint GetIndex()")?;
    writeln!(output, "\t{{")?;
    if combos.is_empty() {
        writeln!(output, "\t\treturn 0;")?;
    } else {
        if debug_block {
            let flags: Vec<String> = tracked.iter().map(|c| format!("m_b{}", c.name)).collect();
            writeln!(output, "\t\tAssert( {} );", flags.join(" && "))?;
        }
        write!(output, "\t\treturn ")?;
        for field in layout.fields() {
            write!(output, "( {} * m_n{} ) + ", field.scale, field.name)?;
        }
        writeln!(output, "0;")?;
    }
    writeln!(output, "\t}}")?;
    writeln!(output, "}};")?;
    writeln!(output)?;

    // Usage-forcing macro
    write!(output, "#define {} ", spec.test_macro_name())?;
    if debug_block {
        let symbols: Vec<String> = tracked.iter().map(|c| spec.forgot_symbol(c)).collect();
        writeln!(output, "{}", symbols.join(" + "))?;
    } else {
        writeln!(output, "1")?;
    }
    writeln!(output)?;

    Ok(output)
}

/// Generate the complete `.inc` header for a shader
pub fn generate_include_header(unit: &ShaderUnit) -> Result<String> {
    let mut output = String::new();
    let guard = format!("{}_H", unit.name.to_uppercase());

    if !unit.skip_rules.is_empty() {
        writeln!(output, "// ALL SKIP STATEMENTS THAT AFFECT THIS SHADER!!!")?;
        for rule in &unit.skip_rules {
            writeln!(output, "// {}", rule)?;
        }
        writeln!(output)?;
    }

    writeln!(output, "#ifndef {}", guard)?;
    writeln!(output, "#define {}", guard)?;
    writeln!(output)?;

    for include in API_INCLUDES {
        writeln!(output, "#include \"{}\"", include)?;
    }
    writeln!(output)?;

    let dynamic_cardinality = ComboLayout::new(&unit.dynamic_combos, 1)
        .with_context(|| format!("Failed to lay out dynamic combos of {}", unit.name))?
        .cardinality();

    let static_spec = IndexTypeSpec {
        base_name: &unit.name,
        kind: ComboKind::Static,
        stage: unit.stage,
        ctor_signature: STATIC_CTOR,
    };
    output.push_str(&render_index_type(
        &unit.static_combos,
        &static_spec,
        dynamic_cardinality,
    )?);
    writeln!(output)?;

    let dynamic_spec = IndexTypeSpec {
        base_name: &unit.name,
        kind: ComboKind::Dynamic,
        stage: unit.stage,
        ctor_signature: DYNAMIC_CTOR,
    };
    output.push_str(&render_index_type(&unit.dynamic_combos, &dynamic_spec, 1)?);

    writeln!(output)?;
    writeln!(output, "#endif\t// {}", guard)?;

    Ok(output)
}

/// Write `<include_dir>/<name>.inc`, leaving it read-only afterwards
pub fn write_include_header(unit: &ShaderUnit, include_dir: &Path) -> Result<PathBuf> {
    let header = generate_include_header(unit)
        .with_context(|| format!("Failed to generate header for {}", unit.name))?;

    fs::create_dir_all(include_dir)
        .with_context(|| format!("Failed to create {}", include_dir.display()))?;

    let path = include_dir.join(format!("{}.inc", unit.name));
    if path.exists() {
        set_read_only(&path, false)?;
    }

    fs::write(&path, header)
        .with_context(|| format!("Failed to write header to {}", path.display()))?;
    set_read_only(&path, true)?;

    Ok(path)
}

fn set_read_only(path: &Path, read_only: bool) -> Result<()> {
    let mut perms = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(if read_only { 0o444 } else { 0o644 });
    }
    #[cfg(not(unix))]
    perms.set_readonly(read_only);

    fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to change permissions of {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrepError;
    use crate::model::{CentroidMask, ShaderModel};

    fn unit(static_combos: Vec<Combo>, dynamic_combos: Vec<Combo>) -> ShaderUnit {
        ShaderUnit {
            name: "water_ps30".to_string(),
            stage: ShaderStage::Pixel,
            model: ShaderModel::Sm30,
            version: "30".to_string(),
            static_combos,
            dynamic_combos,
            skip_rules: vec![],
            centroid: CentroidMask::default(),
            files: vec!["water_ps2x.fxc".to_string()],
        }
    }

    fn dynamic_spec() -> IndexTypeSpec<'static> {
        IndexTypeSpec {
            base_name: "water_ps30",
            kind: ComboKind::Dynamic,
            stage: ShaderStage::Pixel,
            ctor_signature: DYNAMIC_CTOR,
        }
    }

    #[test]
    fn test_render_dynamic_index() {
        let combos = vec![Combo::new("FOG", 0, 1), Combo::new("LIGHTS", 0, 3)];
        let text = render_index_type(&combos, &dynamic_spec(), 1).unwrap();

        assert!(text.starts_with("class water_ps30_Dynamic_Index\n{\n"));
        assert!(text.contains("\tunsigned int m_nFOG : 1;\n"));
        assert!(text.contains("\tunsigned int m_nLIGHTS : 2;\n"));
        assert!(text.contains("\tbool m_bLIGHTS : 1;\n"));
        assert!(text.contains("\t\tAssert( i >= 0 && i <= 3 );\n"));
        assert!(text.contains("\twater_ps30_Dynamic_Index( IShaderDynamicAPI* pShaderAPI )\n"));
        assert!(text.contains("\t\tAssert( m_bFOG && m_bLIGHTS );\n"));
        assert!(text.contains("\t\treturn ( 1 * m_nFOG ) + ( 2 * m_nLIGHTS ) + 0;\n"));
        assert!(text.contains(
            "#define shaderDynamicTest_water_ps30 psh_forgot_to_set_dynamic_FOG + psh_forgot_to_set_dynamic_LIGHTS\n"
        ));
    }

    #[test]
    fn test_init_value_is_exempt_from_tracking() {
        let combos = vec![Combo::new("DOLIGHTING", 0, 2).with_init("0")];
        let spec = IndexTypeSpec {
            kind: ComboKind::Static,
            ctor_signature: STATIC_CTOR,
            ..dynamic_spec()
        };
        let text = render_index_type(&combos, &spec, 4).unwrap();

        assert!(text.contains("\tunsigned int m_nDOLIGHTING : 2;\n"));
        assert!(!text.contains("m_bDOLIGHTING"));
        assert!(!text.contains("#ifdef _DEBUG"));
        assert!(text.contains("\t\tm_nDOLIGHTING = 0;\n"));
        assert!(text.contains("\t\treturn ( 4 * m_nDOLIGHTING ) + 0;\n"));
        assert!(text.contains("#define shaderStaticTest_water_ps30 1\n"));
    }

    #[test]
    fn test_empty_set_returns_zero() {
        let text = render_index_type(&[], &dynamic_spec(), 1).unwrap();
        assert!(text.contains("\t\treturn 0;\n"));
        assert!(!text.contains("Assert"));
        assert!(text.contains("#define shaderDynamicTest_water_ps30 1\n"));
    }

    #[test]
    fn test_static_index_zero_without_static_combos() {
        let header = generate_include_header(&unit(
            vec![],
            vec![Combo::new("A", 0, 1), Combo::new("B", 0, 3)],
        ))
        .unwrap();

        let static_part = header
            .split("class water_ps30_Dynamic_Index")
            .next()
            .unwrap();
        assert!(static_part.contains("class water_ps30_Static_Index"));
        assert!(static_part.contains("\t\treturn 0;\n"));
    }

    #[test]
    fn test_static_scale_seeded_by_dynamic() {
        let header = generate_include_header(&unit(
            vec![Combo::new("S", 0, 1)],
            vec![Combo::new("A", 0, 1), Combo::new("B", 0, 3)],
        ))
        .unwrap();
        assert!(header.contains("\t\treturn ( 8 * m_nS ) + 0;\n"));
    }

    #[test]
    fn test_header_layout() {
        let mut u = unit(vec![], vec![]);
        u.skip_rules = vec!["$A && $B".to_string()];
        let header = generate_include_header(&u).unwrap();

        assert!(header.starts_with("// ALL SKIP STATEMENTS THAT AFFECT THIS SHADER!!!\n// $A && $B\n\n"));
        assert!(header.contains("#ifndef WATER_PS30_H\n#define WATER_PS30_H\n"));
        assert!(header.contains("#include \"shaderapi/ishaderapi.h\"\n"));
        assert!(header.contains("#include \"shaderapi/ishadershadow.h\"\n"));
        assert!(header.contains("#include \"materialsystem/imaterialvar.h\"\n"));
        assert!(header.trim_end().ends_with("#endif\t// WATER_PS30_H"));
        let static_at = header.find("_Static_Index").unwrap();
        let dynamic_at = header.find("_Dynamic_Index").unwrap();
        assert!(static_at < dynamic_at);
    }

    #[test]
    fn test_vertex_forgot_prefix() {
        let spec = IndexTypeSpec {
            stage: ShaderStage::Vertex,
            base_name: "skin_vs20",
            ..dynamic_spec()
        };
        let text = render_index_type(&[Combo::new("SKINNING", 0, 1)], &spec, 1).unwrap();
        assert!(text.contains("#define shaderDynamicTest_skin_vs20 vsh_forgot_to_set_dynamic_SKINNING\n"));
    }

    #[test]
    fn test_static_overflow_after_dynamic_seed() {
        // Each set fits on its own; seeding the static set by the dynamic one does not
        let wide = |name: &str| Combo::new(name, 0, i32::MAX);
        let u = unit(vec![wide("S0"), wide("S1")], vec![wide("D0")]);

        let err = generate_include_header(&u).unwrap_err();
        let root = err.downcast_ref::<PrepError>().unwrap();
        assert!(matches!(root, PrepError::ComboSpaceOverflow { name } if name == "S1"));
        assert!(format!("{err:#}").contains("water_ps30_Static_Index"));
    }

    #[test]
    fn test_reversed_range_fails_header() {
        let u = unit(vec![], vec![Combo::new("FOG", 3, 1)]);
        let err = generate_include_header(&u).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PrepError>(),
            Some(PrepError::InvalidComboRange { min_val: 3, max_val: 1, .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(write_include_header(&u, dir.path()).is_err());
        assert!(!dir.path().join("water_ps30.inc").exists());
    }

    #[test]
    fn test_write_header_overwrites_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let include_dir = dir.path().join("include");
        let u = unit(vec![], vec![]);

        let path = write_include_header(&u, &include_dir).unwrap();
        assert!(fs::metadata(&path).unwrap().permissions().readonly());

        // Second run must be able to replace the read-only file
        write_include_header(&u, &include_dir).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("#ifndef WATER_PS30_H"));
    }
}
