mod buffer;
mod error;
mod name;
mod params;
pub mod pipeline;
pub mod standard;
mod task;
mod types;
mod value;

pub use buffer::{BufferMeta, BufferPtr, SharedBufferHandle};
pub use error::{EmitError, ResolveError};
pub use name::StringId;
pub use params::{ParamAliases, ParamList, ParamSpec};
pub use pipeline::{MethodCollection, Pipeline, PipelineResolver, StageFlags, StageKind};
pub use task::{BuildContext, ShaderTask, TaskKey, TypeNames};
pub use types::{HostType, StructField, StructLayout, TypeInfo, TypeMeta, TypeSet};
pub use value::{PropertyMap, PropertySource, Value};
