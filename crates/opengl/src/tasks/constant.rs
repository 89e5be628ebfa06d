use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};
use glshade_core::{BuildContext, EmitError, HostType, ParamList, ParamSpec, ShaderTask, StringId};
use std::fmt::Write;

/// A host value that can be spelled as a GLSL constant expression.
pub trait GlslLiteral {
    fn glsl_literal(&self) -> String;
}

fn float(value: f32) -> String {
    let text = format!("{value:?}");
    if text.contains(['.', 'e', 'N', 'i']) {
        text
    } else {
        format!("{text}.0")
    }
}

fn constructor(name: &str, parts: impl IntoIterator<Item = String>) -> String {
    let parts: Vec<String> = parts.into_iter().collect();
    format!("{name}({})", parts.join(", "))
}

impl GlslLiteral for f32 {
    fn glsl_literal(&self) -> String {
        float(*self)
    }
}

impl GlslLiteral for i32 {
    fn glsl_literal(&self) -> String {
        self.to_string()
    }
}

impl GlslLiteral for u32 {
    fn glsl_literal(&self) -> String {
        format!("{self}u")
    }
}

impl GlslLiteral for bool {
    fn glsl_literal(&self) -> String {
        self.to_string()
    }
}

macro_rules! vector_literal {
    ($($ty:ty => $name:literal, $scalar:ident;)*) => {
        $(impl GlslLiteral for $ty {
            fn glsl_literal(&self) -> String {
                constructor($name, self.to_array().iter().map(|c| $scalar(*c)))
            }
        })*
    };
}

fn int(value: i32) -> String {
    value.glsl_literal()
}

fn uint(value: u32) -> String {
    value.glsl_literal()
}

vector_literal! {
    Vec2 => "vec2", float;
    Vec3 => "vec3", float;
    Vec4 => "vec4", float;
    IVec2 => "ivec2", int;
    IVec3 => "ivec3", int;
    IVec4 => "ivec4", int;
    UVec2 => "uvec2", uint;
    UVec3 => "uvec3", uint;
    UVec4 => "uvec4", uint;
}

impl GlslLiteral for Mat2 {
    fn glsl_literal(&self) -> String {
        constructor("mat2", self.to_cols_array().map(float))
    }
}

impl GlslLiteral for Mat3 {
    fn glsl_literal(&self) -> String {
        constructor("mat3", self.to_cols_array().map(float))
    }
}

impl GlslLiteral for Mat4 {
    fn glsl_literal(&self) -> String {
        constructor("mat4", self.to_cols_array().map(float))
    }
}

/// Produces one property from a fixed value.
pub struct ShaderConstant {
    spec: ParamSpec,
    inputs: ParamList,
    outputs: ParamList,
    literal: String,
    friendly_name: String,
}

impl ShaderConstant {
    pub fn new<T: HostType + GlslLiteral>(name: impl Into<StringId>, value: T) -> Self {
        let spec = ParamSpec::new::<T>(name);
        let literal = value.glsl_literal();

        Self {
            spec,
            inputs: ParamList::new(),
            outputs: [spec].into_iter().collect(),
            friendly_name: format!("{} = {literal}", spec.name),
            literal,
        }
    }

    pub fn output(&self) -> &ParamSpec {
        &self.spec
    }
}

impl ShaderTask for ShaderConstant {
    fn input_specs(&self) -> &ParamList {
        &self.inputs
    }

    fn output_specs(&self) -> &ParamList {
        &self.outputs
    }

    fn emit_usage(&self, ctx: &mut BuildContext<'_>) -> Result<(), EmitError> {
        let variable = ctx.variable(self.spec.name);
        write!(ctx.output, "{variable} = {};", self.literal)?;
        Ok(())
    }

    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }
}
