mod constant;
mod function_call;
mod header;
mod snippet;

pub use constant::*;
pub use function_call::*;
pub use header::*;
pub use snippet::*;

use glshade_core::{BuildContext, EmitError, ParamList, ParamSpec};
use std::fmt::Write;

/// The four property lists every task reports.
#[derive(Clone, Debug, Default)]
pub struct TaskSpecs {
    pub inputs: ParamList,
    pub outputs: ParamList,
    pub filters: ParamList,
    pub consuming: ParamList,
}

impl TaskSpecs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs(mut self, specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.inputs.extend(specs);
        self
    }

    pub fn outputs(mut self, specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.outputs.extend(specs);
        self
    }

    pub fn filters(mut self, specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.filters.extend(specs);
        self
    }

    pub fn consuming(mut self, specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.consuming.extend(specs);
        self
    }

    fn all(&self) -> impl Iterator<Item = &ParamSpec> {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .chain(&self.filters)
            .chain(&self.consuming)
    }

    /// Maps every renamed property with the preprocessor so hand-written GLSL can use plain names.
    fn write_defines(&self, ctx: &mut BuildContext<'_>) -> Result<(), EmitError> {
        for spec in self.all() {
            let variable = ctx.variable(spec.name);
            if spec.name != variable {
                writeln!(ctx.output, "#define {} {variable}", spec.name)?;
            }
        }
        Ok(())
    }

    fn write_undefs(&self, ctx: &mut BuildContext<'_>) -> Result<(), EmitError> {
        for spec in self.all() {
            if spec.name != ctx.variable(spec.name) {
                writeln!(ctx.output, "#undef {}", spec.name)?;
            }
        }
        Ok(())
    }
}

/// Strips the indentation shared by every non-blank line and surrounding blank lines.
pub fn clear_indents(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let first = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
    let last = lines.iter().rposition(|l| !l.trim().is_empty()).map_or(first, |i| i + 1);

    let mut out = String::new();
    for line in &lines[first..last] {
        out.push_str(line.get(indent..).unwrap_or("").trim_end());
        out.push('\n');
    }
    out
}
