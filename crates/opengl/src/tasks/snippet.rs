use super::{TaskSpecs, clear_indents};
use glshade_core::{BuildContext, EmitError, ParamList, ShaderTask};

/// A block of GLSL statements run inside `main`.
///
/// The snippet refers to properties by their plain names; renamed ones are
/// `#define`d around the block.
pub struct ShaderSnippet {
    specs: TaskSpecs,
    snippet: String,
    friendly_name: String,
}

impl ShaderSnippet {
    pub fn new(snippet: &str, specs: TaskSpecs) -> Self {
        let outputs: Vec<&str> = specs.outputs.names().map(|n| n.as_str()).collect();
        let friendly_name = format!("Produce:\n{}", outputs.join(",\n"));

        Self {
            specs,
            snippet: clear_indents(snippet),
            friendly_name,
        }
    }
}

impl ShaderTask for ShaderSnippet {
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

    fn emit_usage(&self, ctx: &mut BuildContext<'_>) -> Result<(), EmitError> {
        self.specs.write_defines(ctx)?;
        ctx.output.push_str("{\n");
        ctx.output.push_str(&self.snippet);
        ctx.output.push_str("}\n");
        self.specs.write_undefs(ctx)
    }

    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }
}
