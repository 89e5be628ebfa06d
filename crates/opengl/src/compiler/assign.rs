use super::{PREFIX_BINDING, PREFIX_ELEMENT, PREFIX_LOCAL, PREFIX_SSBO, PREFIX_UBO, PREFIX_UNIFORM, StagePlan};
use crate::{
    SpecificationError,
    registry::{GlTypeKey, TypeRegistry},
    vertex::VertexLayoutTable,
};
use bitflags::bitflags;
use glshade_core::{ParamAliases, ParamList, ParamSpec, StageKind, StringId, TypeSet};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Usage: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

/// Read/write usage of every property over all tasks of all stages.
pub fn collect_usage(plans: &[StagePlan<'_>]) -> FxHashMap<StringId, Usage> {
    let mut usage: FxHashMap<StringId, Usage> = FxHashMap::default();

    for plan in plans {
        let aliases = &plan.spec.aliases;
        let mut mark = |specs: &ParamList, flags: Usage| {
            for spec in specs {
                *usage.entry(aliases.choice_for(spec.name)).or_default() |= flags;
            }
        };

        for task in &plan.tasks {
            mark(task.input_specs(), Usage::READ);
            mark(task.consuming_specs(), Usage::READ);
            mark(task.output_specs(), Usage::WRITE);
            mark(task.filter_specs(), Usage::READ | Usage::WRITE);
        }
    }

    usage
}

/// Rejects a stage that lists one property under several classes.
pub fn check_disjoint(plan: &StagePlan<'_>) -> Result<(), SpecificationError> {
    let mut seen: FxHashMap<StringId, &'static str> = FxHashMap::default();

    for (label, list) in plan.pipeline.classes() {
        for spec in list {
            if let Some(first) = seen.insert(spec.name, label) {
                return Err(SpecificationError::ConflictingClasses {
                    property: spec.name,
                    stage: plan.spec.stage,
                    first,
                    second: label,
                });
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    Uniform,
    Opaque,
    Ubo,
    Ssbo,
}

/// Storage decisions shared by every stage of one program.
#[derive(Default)]
pub struct ProgramStorage {
    pub classes: FxHashMap<StringId, StorageClass>,
    pub uniforms: ParamList,
    pub opaque: ParamList,
    pub ubos: ParamList,
    pub ssbos: ParamList,
    pub vertex_components: ParamList,
    bindings: FxHashMap<StringId, u32>,
}

impl ProgramStorage {
    /// Binding point of `name`, allocated on first request.
    pub fn binding_index(&mut self, name: StringId) -> u32 {
        let next = self.bindings.len() as u32;
        *self.bindings.entry(name).or_insert(next)
    }

    pub fn binding(&self, name: StringId) -> Option<u32> {
        self.bindings.get(&name).copied()
    }

    fn classify(&mut self, registry: &mut TypeRegistry, spec: &ParamSpec) -> Result<StorageClass, SpecificationError> {
        if let Some(class) = self.classes.get(&spec.name) {
            return Ok(*class);
        }

        let unconvertible = || SpecificationError::Unconvertible {
            property: spec.name,
            type_name: spec.type_info.short_name(),
        };

        let key = registry.get_conversion(&spec.type_info).map_err(|e| match e {
            SpecificationError::Unsupported { .. } => unconvertible(),
            other => other,
        })?;

        let conversion = registry.conversion(key);
        let (class, list) = if conversion.set_uniform.is_some() {
            (StorageClass::Uniform, &mut self.uniforms)
        } else if conversion.set_opaque_binding.is_some() {
            (StorageClass::Opaque, &mut self.opaque)
        } else if conversion.set_ubo_binding.is_some() {
            (StorageClass::Ubo, &mut self.ubos)
        } else if conversion.set_ssbo_binding.is_some() {
            (StorageClass::Ssbo, &mut self.ssbos)
        } else {
            return Err(unconvertible());
        };

        log::debug!("`{}` is stored as {:?}", spec.name, class);
        list.insert_back(*spec);
        self.classes.insert(spec.name, class);
        Ok(class)
    }
}

/// Where every property of one stage lives and what GLSL variable holds it.
pub struct StageStorage {
    pub input_prefix: String,
    pub inputs: ParamList,
    pub uniforms: ParamList,
    pub opaque: ParamList,
    pub ubos: ParamList,
    pub ssbos: ParamList,
    pub outputs: ParamList,
    /// Task results that stay inside `main`.
    pub locals: ParamList,
    /// Filter copies nothing downstream reads; declared inside `main` under the output prefix.
    pub copy_locals: ParamList,
    /// `(target, source)` assignments run before the first task.
    pub copies: Vec<(String, String)>,
    pub aliases: ParamAliases,
    pub types: Vec<GlTypeKey>,
}

pub struct StageAssignor<'a> {
    pub registry: &'a mut TypeRegistry,
    pub program: &'a mut ProgramStorage,
    pub vertex_layout: &'a VertexLayoutTable,
}

impl<'a> StageAssignor<'a> {
    /// Assigns storage for one stage. `previous` is the prefix and output list of the stage before,
    /// `last` marks the stage whose outputs are the program outputs.
    pub fn assign(
        &mut self,
        plan: &StagePlan<'_>,
        previous: Option<(&str, &ParamList)>,
        last: bool,
    ) -> Result<StageStorage, SpecificationError> {
        let stage = plan.spec.stage;
        let out_prefix = plan.spec.out_var_prefix.as_str();
        let input_prefix = match (stage, previous) {
            (StageKind::Vertex, _) | (_, None) => PREFIX_ELEMENT,
            (_, Some((prefix, _))) => prefix,
        };

        let mut storage = StageStorage {
            input_prefix: input_prefix.to_string(),
            inputs: ParamList::new(),
            uniforms: ParamList::new(),
            opaque: ParamList::new(),
            ubos: ParamList::new(),
            ssbos: ParamList::new(),
            outputs: ParamList::new(),
            locals: ParamList::new(),
            copy_locals: ParamList::new(),
            copies: Vec::new(),
            aliases: ParamAliases::new(),
            types: Vec::new(),
        };
        let mut renames: FxHashMap<StringId, String> = FxHashMap::default();

        let pipeline = &plan.pipeline;
        for list in [
            &pipeline.input_specs,
            &pipeline.consuming_specs,
            &pipeline.filter_specs,
            &pipeline.pipethrough_specs,
        ] {
            for spec in list.iter().filter(|s| !s.type_info.is_void()) {
                let from_previous = previous.is_some_and(|(_, outputs)| outputs.contains(spec.name));
                if stage == StageKind::Vertex && self.vertex_layout.contains(spec.name) {
                    self.program.vertex_components.insert_back(*spec);
                    storage.inputs.insert_back(*spec);
                    renames.insert(spec.name, format!("{PREFIX_ELEMENT}{}", spec.name));
                } else if stage != StageKind::Vertex && from_previous {
                    storage.inputs.insert_back(*spec);
                    renames.insert(spec.name, format!("{input_prefix}{}", spec.name));
                } else {
                    let (list, prefix) = match self.program.classify(self.registry, spec)? {
                        StorageClass::Uniform => (&mut storage.uniforms, PREFIX_UNIFORM),
                        StorageClass::Opaque => (&mut storage.opaque, PREFIX_BINDING),
                        StorageClass::Ubo => (&mut storage.ubos, PREFIX_UBO),
                        StorageClass::Ssbo => (&mut storage.ssbos, PREFIX_SSBO),
                    };
                    list.insert_back(*spec);
                    renames.insert(spec.name, format!("{prefix}{}", spec.name));
                }
            }
        }

        let desired: FxHashSet<StringId> = plan.desired.names().map(|n| plan.spec.aliases.choice_for(n)).collect();

        for spec in pipeline.filter_specs.iter().filter(|s| !s.type_info.is_void()) {
            if storage.opaque.contains(spec.name) || storage.ssbos.contains(spec.name) {
                continue;
            }

            if !self.has_value_name(spec)? {
                return Err(SpecificationError::NotReassignable { property: spec.name });
            }

            let target = format!("{out_prefix}{}", spec.name);
            let source = renames.get(&spec.name).cloned().unwrap_or_else(|| spec.name.to_string());
            storage.copies.push((target.clone(), source));
            renames.insert(spec.name, target);

            if desired.contains(&spec.name) {
                storage.outputs.insert_back(*spec);
            } else {
                storage.copy_locals.insert_back(*spec);
            }
        }

        for spec in pipeline.pipethrough_specs.iter().filter(|s| !s.type_info.is_void()) {
            let program_output = last && desired.contains(&spec.name);
            if !storage.inputs.contains(spec.name) && !program_output {
                continue;
            }

            if !self.has_value_name(spec)? {
                return Err(SpecificationError::NotReassignable { property: spec.name });
            }

            let source = renames.get(&spec.name).cloned().unwrap_or_else(|| spec.name.to_string());
            storage.copies.push((format!("{out_prefix}{}", spec.name), source));
            storage.outputs.insert_back(*spec);
        }

        for spec in pipeline.output_specs.iter().filter(|s| !s.type_info.is_void()) {
            if !self.is_storable(spec)? {
                return Err(SpecificationError::InvalidOutput { property: spec.name });
            }

            renames.insert(spec.name, format!("{out_prefix}{}", spec.name));
            storage.outputs.insert_back(*spec);
        }

        for spec in pipeline.local_specs.iter().filter(|s| !s.type_info.is_void()) {
            if !self.is_storable(spec)? {
                return Err(SpecificationError::InvalidLocal { property: spec.name });
            }

            renames.insert(spec.name, format!("{PREFIX_LOCAL}{}", spec.name));
            storage.locals.insert_back(*spec);
        }

        if stage != StageKind::Compute {
            for spec in &storage.outputs {
                if !self.is_varying(spec) {
                    return Err(SpecificationError::InvalidOutput { property: spec.name });
                }
            }
        }

        storage.aliases = ParamAliases::layered(vec![Arc::clone(&plan.spec.aliases)], renames);
        storage.types = self.declaration_order(plan, &storage)?;

        Ok(storage)
    }

    fn has_value_name(&mut self, spec: &ParamSpec) -> Result<bool, SpecificationError> {
        let key = self.registry.get_conversion(&spec.type_info)?;
        let gl_type = self.registry.gl_type(self.registry.conversion(key).gl_type);
        Ok(!gl_type.value_type_name.is_empty())
    }

    /// Stage interface variables must be built from interpolatable or flat numeric scalars.
    fn is_varying(&self, spec: &ParamSpec) -> bool {
        self.registry.lookup(&spec.type_info).is_some_and(|c| c.scalar.is_some())
    }

    fn is_storable(&mut self, spec: &ParamSpec) -> Result<bool, SpecificationError> {
        let key = self.registry.get_conversion(&spec.type_info)?;
        let gl_type = self.registry.gl_type(self.registry.conversion(key).gl_type);
        Ok(!gl_type.value_type_name.is_empty()
            || (!gl_type.struct_body.is_empty() && gl_type.flexible_member.is_none()))
    }

    /// Every GPU type the stage mentions, dependencies first.
    fn declaration_order(
        &mut self,
        plan: &StagePlan<'_>,
        storage: &StageStorage,
    ) -> Result<Vec<GlTypeKey>, SpecificationError> {
        let mut used = TypeSet::new();
        for task in &plan.tasks {
            task.extract_used_types(&mut used);
        }

        for list in [
            &plan.pipeline.pipethrough_specs,
            &storage.uniforms,
            &storage.opaque,
            &storage.ubos,
            &storage.ssbos,
            &storage.inputs,
            &storage.outputs,
            &storage.locals,
        ] {
            for spec in list {
                used.insert(spec.type_info);
            }
        }

        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        for ty in used.iter().filter(|t| !t.is_void()) {
            let key = self.registry.get_conversion(ty)?;
            let gl_type = self.registry.conversion(key).gl_type;
            self.visit(gl_type, &mut visited, &mut order);
        }

        Ok(order)
    }

    fn visit(&self, key: GlTypeKey, visited: &mut FxHashSet<GlTypeKey>, order: &mut Vec<GlTypeKey>) {
        if !visited.insert(key) {
            return;
        }

        for dependency in &self.registry.gl_type(key).member_dependencies {
            self.visit(*dependency, visited, order);
        }

        order.push(key);
    }
}
