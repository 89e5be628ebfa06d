use crate::{EmitError, ParamAliases, ParamList, ParamSpec, StringId, TypeInfo, TypeSet};
use std::sync::LazyLock;

slotmap::new_key_type! {
    /// Handle of a task inside a task arena.
    pub struct TaskKey;
}

static EMPTY: LazyLock<ParamList> = LazyLock::new(ParamList::new);

/// GLSL names of registered GPU types, looked up by host type.
pub trait TypeNames {
    fn value_type_name(&self, ty: &TypeInfo) -> Option<&str>;
    fn opaque_type_name(&self, ty: &TypeInfo) -> Option<&str>;
}

/// Everything a task needs to write its GLSL.
pub struct BuildContext<'a> {
    pub output: &'a mut String,
    pub types: &'a dyn TypeNames,
    /// Maps task-level property names to the variables that hold them in this stage.
    pub aliases: &'a ParamAliases,
}

impl<'a> BuildContext<'a> {
    pub fn variable(&self, name: StringId) -> &'static str {
        self.aliases.choice_for(name).as_str()
    }

    /// Value type name, falling back to the opaque type name.
    pub fn type_name(&self, spec: &ParamSpec) -> Option<&str> {
        self.types
            .value_type_name(&spec.type_info)
            .filter(|n| !n.is_empty())
            .or_else(|| self.types.opaque_type_name(&spec.type_info))
            .filter(|n| !n.is_empty())
    }

    pub fn require_type_name(&self, spec: &ParamSpec) -> Result<&str, EmitError> {
        self.type_name(spec).ok_or_else(|| EmitError::MissingTypeName {
            property: spec.name,
            type_name: spec.type_info.short_name(),
        })
    }
}

/// A unit of shader work over named properties.
///
/// Specs are reported with task-level names; the pipeline resolver applies alias choice.
pub trait ShaderTask: Send + Sync {
    fn input_specs(&self) -> &ParamList;

    fn output_specs(&self) -> &ParamList;

    /// Properties read and modified in place.
    fn filter_specs(&self) -> &ParamList {
        &EMPTY
    }

    /// Properties read and used up; nothing downstream may read them afterwards.
    fn consuming_specs(&self) -> &ParamList {
        &EMPTY
    }

    fn extract_used_types(&self, types: &mut TypeSet) {
        for list in [self.consuming_specs(), self.input_specs(), self.filter_specs(), self.output_specs()] {
            for spec in list {
                types.insert(spec.type_info);
            }
        }
    }

    /// Global-scope code emitted once per stage, before `main`.
    fn emit_declaration(&self, _ctx: &mut BuildContext<'_>) -> Result<(), EmitError> {
        Ok(())
    }

    /// Code emitted inside `main`.
    fn emit_usage(&self, ctx: &mut BuildContext<'_>) -> Result<(), EmitError>;

    fn friendly_name(&self) -> &str;
}
