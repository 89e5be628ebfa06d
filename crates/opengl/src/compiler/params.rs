use super::{CompilationSpec, ComputeSpec, InvocationCount, VERTEX_POSITION_BUILTIN};
use glshade_core::{ParamAliases, ParamList, StringId, standard};
use rustc_hash::FxHasher;
use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Everything that shapes a vertex + fragment program.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceShaderParams {
    pub aliases: Arc<ParamAliases>,
    /// Property the vertex stage writes to `gl_Position`.
    pub vertex_position_output: StringId,
    pub fragment_outputs: ParamList,
}

impl SurfaceShaderParams {
    pub fn new(aliases: Arc<ParamAliases>, fragment_outputs: ParamList) -> Self {
        Self {
            aliases,
            vertex_position_output: StringId::new(standard::POSITION_VIEW),
            fragment_outputs,
        }
    }

    pub fn with_vertex_position(mut self, name: impl Into<StringId>) -> Self {
        self.vertex_position_output = name.into();
        self
    }

    pub(crate) fn stages(&self) -> Vec<CompilationSpec> {
        let vertex_aliases = ParamAliases::layered(
            vec![Arc::clone(&self.aliases)],
            [(StringId::new(VERTEX_POSITION_BUILTIN), self.vertex_position_output)],
        );

        vec![
            CompilationSpec::vertex(Arc::new(vertex_aliases)),
            CompilationSpec::fragment(Arc::clone(&self.aliases)),
        ]
    }
}

/// Everything that shapes a compute program.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComputeShaderParams {
    pub aliases: Arc<ParamAliases>,
    pub outputs: ParamList,
    pub compute: ComputeSpec,
}

impl ComputeShaderParams {
    pub fn new(aliases: Arc<ParamAliases>, outputs: ParamList, invocation_count: [InvocationCount; 3]) -> Self {
        Self {
            aliases,
            outputs,
            compute: ComputeSpec {
                invocation_count,
                group_size: [1, 1, 1],
                allow_out_of_bounds: false,
            },
        }
    }

    pub fn with_group_size(mut self, group_size: [u32; 3]) -> Self {
        self.compute.group_size = group_size;
        self
    }

    pub fn allow_out_of_bounds(mut self, allow: bool) -> Self {
        self.compute.allow_out_of_bounds = allow;
        self
    }

    pub(crate) fn stages(&self) -> Vec<CompilationSpec> {
        vec![CompilationSpec::compute(Arc::clone(&self.aliases), self.compute.clone())]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderParams {
    Surface(SurfaceShaderParams),
    Compute(ComputeShaderParams),
}

impl ShaderParams {
    pub(crate) fn stages(&self) -> Vec<CompilationSpec> {
        match self {
            ShaderParams::Surface(params) => params.stages(),
            ShaderParams::Compute(params) => params.stages(),
        }
    }

    pub fn desired(&self) -> &ParamList {
        match self {
            ShaderParams::Surface(params) => &params.fragment_outputs,
            ShaderParams::Compute(params) => &params.outputs,
        }
    }
}

/// Cache key of one program.
///
/// The combined hash is computed once; equality still compares every component.
#[derive(Clone, Debug)]
pub struct ShaderKey {
    params: ShaderParams,
    hash: u64,
}

impl ShaderKey {
    pub fn new(params: ShaderParams) -> Self {
        let mut hasher = FxHasher::default();
        params.hash(&mut hasher);

        Self {
            hash: hasher.finish(),
            params,
        }
    }

    pub fn surface(params: SurfaceShaderParams) -> Self {
        Self::new(ShaderParams::Surface(params))
    }

    pub fn compute(params: ComputeShaderParams) -> Self {
        Self::new(ShaderParams::Compute(params))
    }

    pub fn params(&self) -> &ShaderParams {
        &self.params
    }

    pub fn hash_code(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for ShaderKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.params == other.params
    }
}

impl Eq for ShaderKey {}

impl Hash for ShaderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
