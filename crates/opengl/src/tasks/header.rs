use super::{TaskSpecs, clear_indents};
use glshade_core::{BuildContext, EmitError, ParamList, ShaderTask};
use std::{fs, io, path::Path};

/// Global-scope GLSL, such as function definitions, emitted once before `main`.
pub struct ShaderHeader {
    specs: TaskSpecs,
    snippet: String,
    friendly_name: String,
}

impl ShaderHeader {
    pub fn from_string(snippet: &str, specs: TaskSpecs, friendly_name: impl Into<String>) -> Self {
        Self {
            specs,
            snippet: clear_indents(snippet),
            friendly_name: friendly_name.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>, specs: TaskSpecs, friendly_name: impl Into<String>) -> io::Result<Self> {
        let snippet = fs::read_to_string(path)?;
        Ok(Self::from_string(&snippet, specs, friendly_name))
    }
}

impl ShaderTask for ShaderHeader {
    fn input_specs(&self) -> &ParamList {
        &self.specs.inputs
    }

    fn output_specs(&self) -> &ParamList {
        &self.specs.outputs
    }

    fn filter_specs(&self) -> &ParamList {
        &self.specs.filters
    }

    fn consuming_specs(&self) -> &ParamList {
        &self.specs.consuming
    }

    fn emit_declaration(&self, ctx: &mut BuildContext<'_>) -> Result<(), EmitError> {
        self.specs.write_defines(ctx)?;
        ctx.output.push_str(&self.snippet);
        self.specs.write_undefs(ctx)
    }

    fn emit_usage(&self, _ctx: &mut BuildContext<'_>) -> Result<(), EmitError> {
        Ok(())
    }

    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }
}
