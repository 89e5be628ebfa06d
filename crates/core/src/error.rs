use crate::{StringId, TaskKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("task `{task}` depends on itself through `{property}`")]
    Cycle { task: String, property: StringId },

    #[error("task {0:?} is not registered")]
    UnknownTask(TaskKey),
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("no GLSL type name for property `{property}` of type {type_name}")]
    MissingTypeName { property: StringId, type_name: String },

    #[error("formatting shader source failed")]
    Format(#[from] std::fmt::Error),
}
