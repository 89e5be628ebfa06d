use crate::{
    BindError,
    compiler::{
        PREFIX_BINDING, PREFIX_SSBO_BLOCK, PREFIX_UBO_BLOCK, PREFIX_UNIFORM, SourceLists,
        assign::ProgramStorage,
    },
    opengl::{GlDevice, ProgramName, UniformLocation},
    registry::{BindingSetter, ConversionSpec, TypeRegistry},
};
use glshade_core::{ParamList, ParamSpec, PropertySource, StringId, Value};
use rustc_hash::FxHashSet;

/// A plain uniform and where the linker put it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocationSpec {
    pub spec: ParamSpec,
    pub location: UniformLocation,
}

/// A property bound through a binding point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingSpec {
    pub spec: ParamSpec,
    /// Uniform location of an opaque binding, or the block index of a buffer.
    pub location: u32,
    pub binding: u32,
}

type IndexQuery = fn(&dyn GlDevice, ProgramName, &str) -> Option<u32>;

/// Binding metadata read back from a linked program.
#[derive(Clone, Debug, Default)]
pub(crate) struct LinkedStorage {
    uniforms: Vec<LocationSpec>,
    opaque: Vec<BindingSpec>,
    ubos: Vec<BindingSpec>,
    ssbos: Vec<BindingSpec>,
    eliminated: FxHashSet<StringId>,
}

impl LinkedStorage {
    pub fn query(device: &dyn GlDevice, program: ProgramName, storage: &ProgramStorage) -> Self {
        let mut linked = LinkedStorage::default();

        for spec in &storage.uniforms {
            match device.uniform_location(program, &format!("{PREFIX_UNIFORM}{}", spec.name)) {
                Some(location) => linked.uniforms.push(LocationSpec { spec: *spec, location }),
                None => linked.eliminate(spec),
            }
        }

        let classes: [(&ParamList, &str, &mut Vec<BindingSpec>, IndexQuery); 3] = [
            (&storage.opaque, PREFIX_BINDING, &mut linked.opaque, |d, p, n| {
                d.uniform_location(p, n).map(|l| l.0)
            }),
            (&storage.ubos, PREFIX_UBO_BLOCK, &mut linked.ubos, |d, p, n| d.uniform_block_index(p, n)),
            (&storage.ssbos, PREFIX_SSBO_BLOCK, &mut linked.ssbos, |d, p, n| d.storage_block_index(p, n)),
        ];

        let mut eliminated = Vec::new();
        for (specs, prefix, records, query) in classes {
            for spec in specs {
                let location = query(device, program, &format!("{prefix}{}", spec.name));
                match (location, storage.binding(spec.name)) {
                    (Some(location), Some(binding)) => records.push(BindingSpec {
                        spec: *spec,
                        location,
                        binding,
                    }),
                    _ => eliminated.push(*spec),
                }
            }
        }

        for spec in &eliminated {
            linked.eliminate(spec);
        }

        linked
    }

    fn eliminate(&mut self, spec: &ParamSpec) {
        log::warn!("`{}` was optimized out of the program", spec.name);
        self.eliminated.insert(spec.name);
    }

    pub fn is_eliminated(&self, name: StringId) -> bool {
        self.eliminated.contains(&name)
    }
}

/// A linked program and what it needs bound before a draw or dispatch.
#[derive(Debug)]
pub struct CompiledProgram {
    program: ProgramName,

    input_specs: ParamList,
    output_specs: ParamList,
    filter_specs: ParamList,
    consuming_specs: ParamList,
    vertex_component_specs: ParamList,

    storage: LinkedStorage,
}

impl CompiledProgram {
    pub(crate) fn new(
        program: ProgramName,
        lists: SourceLists,
        output_specs: ParamList,
        vertex_component_specs: ParamList,
        storage: LinkedStorage,
    ) -> Self {
        Self {
            program,
            input_specs: lists.input_specs,
            output_specs,
            filter_specs: lists.filter_specs,
            consuming_specs: lists.consuming_specs,
            vertex_component_specs,
            storage,
        }
    }

    pub fn program(&self) -> ProgramName {
        self.program
    }

    pub fn input_specs(&self) -> &ParamList {
        &self.input_specs
    }

    pub fn output_specs(&self) -> &ParamList {
        &self.output_specs
    }

    pub fn filter_specs(&self) -> &ParamList {
        &self.filter_specs
    }

    pub fn consuming_specs(&self) -> &ParamList {
        &self.consuming_specs
    }

    /// Mesh vertex components read by the vertex stage, bound by layout index.
    pub fn vertex_component_specs(&self) -> &ParamList {
        &self.vertex_component_specs
    }

    pub fn uniforms(&self) -> &[LocationSpec] {
        &self.storage.uniforms
    }

    pub fn opaque_bindings(&self) -> &[BindingSpec] {
        &self.storage.opaque
    }

    pub fn ubo_bindings(&self) -> &[BindingSpec] {
        &self.storage.ubos
    }

    pub fn ssbo_bindings(&self) -> &[BindingSpec] {
        &self.storage.ssbos
    }

    pub fn activate(&self, device: &mut dyn GlDevice) {
        device.use_program(Some(self.program));
    }

    /// Activates the program and binds every property, preferring material values.
    pub fn bind_properties(
        &self,
        device: &mut dyn GlDevice,
        registry: &TypeRegistry,
        source: &dyn PropertySource,
        material: Option<&dyn PropertySource>,
    ) -> Result<(), BindError> {
        self.activate(device);
        self.bind_with(device, registry, |name| {
            material.and_then(|m| m.property(name)).or_else(|| source.property(name))
        })
    }

    /// Binds only the values `material` supplies. The program must be active.
    pub fn bind_material_properties(
        &self,
        device: &mut dyn GlDevice,
        registry: &TypeRegistry,
        material: &dyn PropertySource,
    ) -> Result<(), BindError> {
        self.bind_with(device, registry, |name| material.property(name))
    }

    /// Binds values from `source` for properties `material` does not supply. The program must be active.
    pub fn bind_non_material_properties(
        &self,
        device: &mut dyn GlDevice,
        registry: &TypeRegistry,
        source: &dyn PropertySource,
        material: &dyn PropertySource,
    ) -> Result<(), BindError> {
        self.bind_with(device, registry, |name| match material.property(name) {
            Some(_) => None,
            None => source.property(name),
        })
    }

    fn bind_with<'v>(
        &self,
        device: &mut dyn GlDevice,
        registry: &TypeRegistry,
        lookup: impl Fn(StringId) -> Option<&'v Value>,
    ) -> Result<(), BindError> {
        for record in &self.storage.uniforms {
            let Some(value) = lookup(record.spec.name) else {
                continue;
            };

            let setter = conversion(registry, &record.spec)
                .and_then(|c| c.set_uniform.as_ref())
                .ok_or(BindError::MissingSetter {
                    property: record.spec.name,
                    class: "uniform",
                })?;

            setter(&mut *device, record.location, value).map_err(|source| BindError::Property {
                property: record.spec.name,
                source,
            })?;
        }

        let classes: [(&[BindingSpec], &'static str, fn(&ConversionSpec) -> Option<&BindingSetter>); 3] = [
            (&self.storage.opaque, "opaque binding", |c| c.set_opaque_binding.as_ref()),
            (&self.storage.ubos, "uniform buffer", |c| c.set_ubo_binding.as_ref()),
            (&self.storage.ssbos, "storage buffer", |c| c.set_ssbo_binding.as_ref()),
        ];

        for (records, class, select) in classes {
            for record in records {
                let Some(value) = lookup(record.spec.name) else {
                    continue;
                };

                let setter = conversion(registry, &record.spec)
                    .and_then(select)
                    .ok_or(BindError::MissingSetter {
                        property: record.spec.name,
                        class,
                    })?;

                setter(&mut *device, record.binding, value).map_err(|source| BindError::Property {
                    property: record.spec.name,
                    source,
                })?;
            }
        }

        Ok(())
    }
}

fn conversion<'r>(registry: &'r TypeRegistry, spec: &ParamSpec) -> Option<&'r ConversionSpec> {
    registry.lookup(&spec.type_info)
}
