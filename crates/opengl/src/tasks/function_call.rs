use super::TaskSpecs;
use glshade_core::{BuildContext, EmitError, ParamList, ShaderTask};
use std::fmt::Write;

/// Calls a GLSL function declared elsewhere, typically by a [`ShaderHeader`](super::ShaderHeader).
///
/// Arguments are passed in consuming, input, filter, output order. Properties whose type has
/// no GLSL name (void tokens) are left out.
pub struct ShaderFunctionCall {
    specs: TaskSpecs,
    function_name: String,
}

impl ShaderFunctionCall {
    pub fn new(function_name: impl Into<String>, specs: TaskSpecs) -> Self {
        Self {
            specs,
            function_name: function_name.into(),
        }
    }
}

impl ShaderTask for ShaderFunctionCall {
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
        let specs = &self.specs;
        let arguments: Vec<&str> = [&specs.consuming, &specs.inputs, &specs.filters, &specs.outputs]
            .into_iter()
            .flatten()
            .filter(|spec| ctx.type_name(spec).is_some())
            .map(|spec| ctx.variable(spec.name))
            .collect();

        write!(ctx.output, "{}({});", self.function_name, arguments.join(", "))?;
        Ok(())
    }

    fn friendly_name(&self) -> &str {
        &self.function_name
    }
}
