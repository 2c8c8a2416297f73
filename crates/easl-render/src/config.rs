//! Run configuration: entry points and draw parameters for one pipeline.

use easl_core::{EaslError, EaslResult, RunSettings};
use easl_lang::{CompiledShader, ConstValue, EntrySelection, ProgramInfo, SelectedEntries, Type};

/// Name of the shader constant read as the default triangle count.
pub const TRIANGLES_CONSTANT: &str = "triangles";

/// Caller-supplied run parameters, as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub vertex: Option<String>,
    pub fragment: Option<String>,
    pub triangles: Option<u32>,
}

/// Fully resolved parameters a pipeline is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Entry points as named in the EASL source.
    pub entries: SelectedEntries,
    /// The same entry points as named in the generated WGSL.
    pub wgsl_entries: SelectedEntries,
    pub triangles: u32,
}

impl RunConfig {
    pub fn vertex_count(&self) -> u32 {
        self.triangles.saturating_mul(3)
    }
}

impl RunOptions {
    pub fn selection(&self) -> EntrySelection {
        EntrySelection {
            vertex: self.vertex.clone(),
            fragment: self.fragment.clone(),
        }
    }

    /// Resolve entries and triangle count for a compiled shader.
    pub fn resolve(&self, shader: &CompiledShader, settings: &RunSettings) -> EaslResult<RunConfig> {
        let entries = match &shader.entries {
            Some(entries) => entries.clone(),
            None => shader.info.select_entries(&self.selection()).map_err(|diags| {
                let messages: Vec<String> = diags.into_iter().map(|d| d.message).collect();
                EaslError::config(messages.join("; "))
            })?,
        };
        let wgsl_entries = SelectedEntries {
            vertex: shader.wgsl_entry(&entries.vertex).to_string(),
            fragment: shader.wgsl_entry(&entries.fragment).to_string(),
        };
        let triangles = resolve_triangles(self.triangles, &shader.info, settings.default_triangles)?;
        Ok(RunConfig {
            entries,
            wgsl_entries,
            triangles,
        })
    }
}

/// Triangle count precedence: explicit value, then the shader's `triangles`
/// constant, then the configured default.
///
/// The shader constant is only consulted when no explicit value is given. It
/// must be declared `u32` with a literal initializer; zero from any source is
/// rejected.
pub fn resolve_triangles(explicit: Option<u32>, info: &ProgramInfo, default: u32) -> EaslResult<u32> {
    let (count, source) = match explicit {
        Some(count) => (count, "--triangles"),
        None => match info.constant(TRIANGLES_CONSTANT) {
            Some(constant) => (shader_triangles(&constant.ty, constant.value.as_ref())?, "shader constant 'triangles'"),
            None => (default, "default_triangles"),
        },
    };
    if count == 0 {
        return Err(EaslError::config(format!("{} must be at least 1, got 0", source)));
    }
    Ok(count)
}

fn shader_triangles(ty: &Type, value: Option<&ConstValue>) -> EaslResult<u32> {
    if *ty != Type::U32 {
        return Err(EaslError::config(format!(
            "shader constant 'triangles' must be declared u32, found {}",
            ty
        )));
    }
    match value {
        Some(ConstValue::Int(v)) => u32::try_from(*v)
            .map_err(|_| EaslError::config(format!("shader constant 'triangles' is out of range: {}", v))),
        _ => Err(EaslError::config(
            "shader constant 'triangles' must be an integer literal",
        )),
    }
}
