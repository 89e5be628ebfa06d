mod backend;
mod cache;
mod compiler;
mod debug;
mod error;
mod program;
mod registry;
mod tasks;
mod vertex;

pub mod opengl;

pub use backend::{CompileOutcome, OpenGlNativeRenderer, OpenGlRenderer};
pub use cache::ShaderCache;
pub use compiler::{
    CompilationSpec, CompileContext, CompilerOptions, ComputeShaderParams, ComputeSpec, InvocationCount, ShaderKey,
    ShaderParams, StorageClass, SurfaceShaderParams, Usage, compile, PREFIX_BINDING, PREFIX_COMPUTE_OUT, PREFIX_ELEMENT,
    PREFIX_FRAGMENT_OUT, PREFIX_LOCAL, PREFIX_SSBO, PREFIX_SSBO_BLOCK, PREFIX_UBO, PREFIX_UBO_BLOCK, PREFIX_UNIFORM,
    PREFIX_VERTEX_OUT, VERTEX_POSITION_BUILTIN,
};
pub use opengl::{
    BufferTarget, DeviceCall, GlDevice, GlInfo, GlowDevice, HeadlessDevice, ProgramName, ShaderName, UniformLocation,
    UniformValue,
};
pub use error::{BindError, Diagnostics, OpenGlError, SetterError, ShaderError, SpecificationError};
pub use program::{BindingSpec, CompiledProgram, LocationSpec};
pub use registry::{
    BindingSetter, ConversionKey, ConversionSpec, FlexibleMemberSpec, GlLayoutSpec, GlScalarSpec, GlTypeKey, GlTypeSpec,
    Texture, TypeRegistry, UniformSetter, convert_to_glsl_type_name,
};
pub use tasks::{
    GlslLiteral, ShaderConstant, ShaderFunctionCall, ShaderHeader, ShaderSnippet, TaskSpecs, clear_indents,
};
pub use vertex::VertexLayoutTable;
