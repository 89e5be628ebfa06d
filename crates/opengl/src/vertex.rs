use crate::{SpecificationError, registry::TypeRegistry};
use glshade_core::{ParamSpec, StringId};
use rustc_hash::FxHashMap;

/// Assigns vertex attribute locations to mesh vertex components.
#[derive(Clone, Debug, Default)]
pub struct VertexLayoutTable {
    indices: FxHashMap<StringId, u32>,
    specs: Vec<ParamSpec>,
    free_index: u32,
}

impl VertexLayoutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a vertex component. Its type decides how many attribute slots it takes.
    /// Registering a name twice keeps the first location.
    pub fn specify_vertex_buffer(&mut self, registry: &mut TypeRegistry, spec: ParamSpec) -> Result<u32, SpecificationError> {
        let conversion = registry.get_conversion(&spec.type_info)?;
        if let Some(index) = self.indices.get(&spec.name) {
            return Ok(*index);
        }

        let index = self.free_index;
        let gl_type = registry.gl_type(registry.conversion(conversion).gl_type);
        self.free_index += gl_type.layout.index_size;
        self.indices.insert(spec.name, index);
        self.specs.push(spec);

        Ok(index)
    }

    pub fn layout_index(&self, name: StringId) -> Option<u32> {
        self.indices.get(&name).copied()
    }

    pub fn contains(&self, name: StringId) -> bool {
        self.indices.contains_key(&name)
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
