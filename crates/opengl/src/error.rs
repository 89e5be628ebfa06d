use crate::opengl::GlInfo;
use glshade_core::{EmitError, ResolveError, StageKind, StringId};
use std::fmt::{self, Display};
use thiserror::Error;

/// The pipeline or its types cannot be expressed on the GPU.
#[derive(Debug, Error)]
pub enum SpecificationError {
    #[error("conversion to GPU not supported for {type_name}")]
    Unsupported { type_name: String },

    #[error("GPU layout of {type_name} does not match its host layout: {detail}")]
    LayoutMismatch { type_name: String, detail: String },

    #[error("type {type_name} contains itself")]
    RecursiveType { type_name: String },

    #[error("property `{property}` of type {type_name} cannot be bound to any storage class")]
    Unconvertible { property: StringId, type_name: String },

    #[error("filter property `{property}` cannot be copied into a variable")]
    NotReassignable { property: StringId },

    #[error("property `{property}` cannot be used as a stage output")]
    InvalidOutput { property: StringId },

    #[error("property `{property}` cannot be used as a local variable")]
    InvalidLocal { property: StringId },

    #[error("property `{property}` is both {first} and {second} in the {stage} stage")]
    ConflictingClasses {
        property: StringId,
        stage: StageKind,
        first: &'static str,
        second: &'static str,
    },

    #[error("unable to declare {what} `{property}`: type {type_name} has no GLSL name")]
    UnnamedType {
        what: &'static str,
        property: StringId,
        type_name: String,
    },

    #[error("fragment output `{property}` is not among the desired outputs")]
    UnplacedOutput { property: StringId },

    #[error("invocation count `{property}` is produced inside the compute stage it bounds")]
    ProducedInvocationCount { property: StringId },

    #[error("{what} of {value} exceeds the device limit of {limit}")]
    LimitExceeded { what: &'static str, value: u32, limit: u32 },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Compiler or linker output of a failed build.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// `None` for link failures.
    pub stage: Option<StageKind>,
    pub log: String,
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{stage} shader failed to compile:\n{}", self.log),
            None => write!(f, "program failed to link:\n{}", self.log),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error(transparent)]
    Specification(#[from] SpecificationError),

    #[error("{0}")]
    Compile(Diagnostics),

    #[error("{0}")]
    Link(Diagnostics),

    #[error("unable to create {what}: {message}")]
    Device { what: &'static str, message: String },
}

/// Failure of a single conversion setter.
#[derive(Debug, Error)]
pub enum SetterError {
    #[error("buffer has pending host writes")]
    Unsynchronized,

    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("cannot bind `{property}`")]
    Property {
        property: StringId,
        #[source]
        source: SetterError,
    },

    #[error("no {class} setter registered for `{property}`")]
    MissingSetter { property: StringId, class: &'static str },
}

#[derive(Debug, Clone, Error)]
pub enum OpenGlError {
    #[error("OpenGL {}.{} lacks compute shaders or storage buffers", .info.version.0, .info.version.1)]
    UnsupportedVersion { info: GlInfo },

    #[error("unable to register built-in vertex buffer `{name}`: {message}")]
    VertexBuffer { name: &'static str, message: String },
}
