mod export;
mod method;

pub use export::*;
pub use method::*;

use crate::{ParamAliases, ParamList, ResolveError, ShaderTask, TaskKey};
use bitflags::bitflags;
use std::fmt::{self, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
    Compute,
}

impl StageKind {
    pub fn flag(self) -> StageFlags {
        match self {
            StageKind::Vertex => StageFlags::VERTEX,
            StageKind::Fragment => StageFlags::FRAGMENT,
            StageKind::Compute => StageFlags::COMPUTE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::Compute => "compute",
        }
    }
}

impl Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// The stages a task may run in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StageFlags: u8 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

/// Tasks and property classes of one resolved stage.
///
/// Spec names are already alias-resolved. The six lists are disjoint.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    pub items: Vec<TaskKey>,
    pub input_specs: ParamList,
    pub output_specs: ParamList,
    pub filter_specs: ParamList,
    pub consuming_specs: ParamList,
    pub pipethrough_specs: ParamList,
    pub local_specs: ParamList,
}

impl Pipeline {
    /// Every class with a short label, in a fixed order.
    pub fn classes(&self) -> [(&'static str, &ParamList); 6] {
        [
            ("input", &self.input_specs),
            ("consuming", &self.consuming_specs),
            ("filter", &self.filter_specs),
            ("pipethrough", &self.pipethrough_specs),
            ("output", &self.output_specs),
            ("local", &self.local_specs),
        ]
    }
}

/// Turns desired outputs into an ordered task pipeline for one stage.
pub trait PipelineResolver {
    fn resolve(&self, stage: StageKind, desired: &ParamList, aliases: &ParamAliases) -> Result<Pipeline, ResolveError>;

    fn task(&self, key: TaskKey) -> Option<&dyn ShaderTask>;
}
