pub(crate) mod assign;
mod codegen;
mod params;

pub use assign::{StorageClass, Usage};
pub use params::{ComputeShaderParams, ShaderKey, ShaderParams, SurfaceShaderParams};

use crate::{
    CompiledProgram, Diagnostics, ShaderError, SpecificationError, debug,
    opengl::{GlDevice, GlInfo, ProgramName, ShaderName},
    program::LinkedStorage,
    registry::TypeRegistry,
    vertex::VertexLayoutTable,
};
use assign::{ProgramStorage, StageAssignor, StageStorage};
use glam::Vec4;
use glshade_core::{
    ParamAliases, ParamList, ParamSpec, Pipeline, PipelineResolver, ResolveError, ShaderTask, StageKind, StringId,
    pipeline::{export_dot, pipeline_id},
};
use rustc_hash::FxHashSet;
use std::{path::PathBuf, sync::Arc};

pub const PREFIX_UNIFORM: &str = "uniform_";
pub const PREFIX_BINDING: &str = "bind_";
pub const PREFIX_UBO_BLOCK: &str = "ubo_block_";
pub const PREFIX_UBO: &str = "ubo_";
pub const PREFIX_SSBO_BLOCK: &str = "buffer_block_";
pub const PREFIX_SSBO: &str = "buffer_";
pub const PREFIX_LOCAL: &str = "tmp_";
pub const PREFIX_ELEMENT: &str = "elem_";

pub const PREFIX_VERTEX_OUT: &str = "vert_";
pub const PREFIX_FRAGMENT_OUT: &str = "frag_";
pub const PREFIX_COMPUTE_OUT: &str = "comp_";

/// Built-in the vertex stage always writes; alias it to pick the source property.
pub const VERTEX_POSITION_BUILTIN: &str = "gl_Position";

/// Number of compute invocations along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvocationCount {
    Fixed(u32),
    /// Read at dispatch time from a property.
    Property(ParamSpec),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComputeSpec {
    pub invocation_count: [InvocationCount; 3],
    pub group_size: [u32; 3],
    /// When false, invocations past the requested count return early.
    pub allow_out_of_bounds: bool,
}

/// One stage of a program to compile.
#[derive(Clone, Debug)]
pub struct CompilationSpec {
    pub stage: StageKind,
    pub aliases: Arc<ParamAliases>,
    pub out_var_prefix: String,
    pub compute: Option<ComputeSpec>,
}

impl CompilationSpec {
    pub fn vertex(aliases: Arc<ParamAliases>) -> Self {
        Self {
            stage: StageKind::Vertex,
            aliases,
            out_var_prefix: PREFIX_VERTEX_OUT.to_string(),
            compute: None,
        }
    }

    pub fn fragment(aliases: Arc<ParamAliases>) -> Self {
        Self {
            stage: StageKind::Fragment,
            aliases,
            out_var_prefix: PREFIX_FRAGMENT_OUT.to_string(),
            compute: None,
        }
    }

    pub fn compute(aliases: Arc<ParamAliases>, compute: ComputeSpec) -> Self {
        Self {
            stage: StageKind::Compute,
            aliases,
            out_var_prefix: PREFIX_COMPUTE_OUT.to_string(),
            compute: Some(compute),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompilerOptions {
    pub glsl_version: u32,
    pub gles: bool,
    /// Where generated sources and task graphs are dumped, if anywhere.
    pub debug_dir: Option<PathBuf>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            glsl_version: 460,
            gles: false,
            debug_dir: None,
        }
    }
}

impl CompilerOptions {
    pub fn for_info(info: &GlInfo) -> Self {
        Self {
            glsl_version: info.glsl_version(),
            gles: info.is_gles,
            debug_dir: None,
        }
    }
}

/// Everything one compile borrows from the renderer.
pub struct CompileContext<'a> {
    pub device: &'a mut dyn GlDevice,
    pub registry: &'a mut TypeRegistry,
    pub vertex_layout: &'a VertexLayoutTable,
    pub resolver: &'a dyn PipelineResolver,
    pub options: &'a CompilerOptions,
}

/// A resolved stage waiting for storage assignment.
pub struct StagePlan<'a> {
    pub spec: &'a CompilationSpec,
    pub pipeline: Pipeline,
    /// What the stage was asked to produce, alias choice not applied.
    pub desired: ParamList,
    pub tasks: Vec<&'a dyn ShaderTask>,
}

/// Resolves, generates, compiles and links `stages` into one program producing `desired`.
pub fn compile(
    ctx: &mut CompileContext<'_>,
    stages: &[CompilationSpec],
    desired: &ParamList,
) -> Result<CompiledProgram, ShaderError> {
    let plans = resolve_stages(ctx.resolver, stages, desired)?;
    for plan in &plans {
        assign::check_disjoint(plan)?;
    }

    let usage = assign::collect_usage(&plans);
    let mut program = ProgramStorage::default();
    let mut storages: Vec<StageStorage> = Vec::with_capacity(plans.len());

    for (index, plan) in plans.iter().enumerate() {
        let previous = index
            .checked_sub(1)
            .map(|p| (plans[p].spec.out_var_prefix.as_str(), &storages[p].outputs));

        let storage = StageAssignor {
            registry: &mut *ctx.registry,
            program: &mut program,
            vertex_layout: ctx.vertex_layout,
        }
        .assign(plan, previous, index + 1 == plans.len())?;

        storages.push(storage);
    }

    let mut sources = Vec::with_capacity(plans.len());
    for (plan, storage) in plans.iter().zip(&storages) {
        let source = codegen::generate_stage(
            &codegen::Environment {
                options: ctx.options,
                registry: &*ctx.registry,
                vertex_layout: ctx.vertex_layout,
                usage: &usage,
            },
            &mut program,
            plan,
            storage,
        )?;

        if let Some(dir) = &ctx.options.debug_dir {
            let id = pipeline_id(&plan.pipeline, ctx.resolver, &plan.spec.aliases);
            let dot = export_dot(&plan.pipeline, ctx.resolver, &plan.spec.aliases);
            debug::dump_stage(dir, &plan.spec.out_var_prefix, &id, &source, &dot);
        }

        sources.push(source);
    }

    check_limits(ctx.device.info(), &plans, &program, &*ctx.registry)?;

    let name = build_program(&mut *ctx.device, &plans, &sources)?;
    let linked = LinkedStorage::query(&*ctx.device, name, &program);
    let lists = collect_lists(&plans, &program, &linked);

    Ok(CompiledProgram::new(
        name,
        lists,
        desired.clone(),
        program.vertex_components.clone(),
        linked,
    ))
}

fn resolve_stages<'a>(
    resolver: &'a dyn PipelineResolver,
    stages: &'a [CompilationSpec],
    desired: &ParamList,
) -> Result<Vec<StagePlan<'a>>, SpecificationError> {
    let mut plans = Vec::with_capacity(stages.len());
    let mut wanted = desired.clone();

    for spec in stages.iter().rev() {
        let mut stage_desired = wanted;

        if spec.stage == StageKind::Vertex {
            let position = spec.aliases.choice_for(StringId::new(VERTEX_POSITION_BUILTIN));
            stage_desired.insert_back(ParamSpec::new::<Vec4>(position));
        }

        let mut pipeline = resolver.resolve(spec.stage, &stage_desired, &spec.aliases)?;
        if let Some(compute) = spec.compute.as_ref().filter(|c| !c.allow_out_of_bounds) {
            add_invocation_counts(&mut pipeline, compute, &spec.aliases)?;
        }

        let tasks = pipeline
            .items
            .iter()
            .map(|key| resolver.task(*key).ok_or(ResolveError::UnknownTask(*key)))
            .collect::<Result<Vec<_>, _>>()?;

        wanted = ParamList::new();
        for list in [
            &pipeline.input_specs,
            &pipeline.filter_specs,
            &pipeline.consuming_specs,
            &pipeline.pipethrough_specs,
        ] {
            wanted.merge(list);
        }

        plans.push(StagePlan {
            spec,
            pipeline,
            desired: stage_desired,
            tasks,
        });
    }

    plans.reverse();
    Ok(plans)
}

/// Bounds guards run before any task, so property counts must come from outside the stage.
fn add_invocation_counts(
    pipeline: &mut Pipeline,
    compute: &ComputeSpec,
    aliases: &ParamAliases,
) -> Result<(), SpecificationError> {
    for count in &compute.invocation_count {
        let InvocationCount::Property(property) = count else {
            continue;
        };

        let spec = property.renamed(aliases.choice_for(property.name));
        if pipeline.output_specs.contains(spec.name) || pipeline.local_specs.contains(spec.name) {
            return Err(SpecificationError::ProducedInvocationCount { property: spec.name });
        }

        let known = pipeline.classes().iter().any(|(_, list)| list.contains(spec.name));
        if !known {
            pipeline.input_specs.insert_back(spec);
        }
    }

    Ok(())
}

/// Rejects programs the device cannot run. Binding points are shared between classes.
fn check_limits(
    info: &GlInfo,
    plans: &[StagePlan<'_>],
    program: &ProgramStorage,
    registry: &TypeRegistry,
) -> Result<(), SpecificationError> {
    let exceeds = |what, value: u32, limit: u32| {
        if value > limit {
            Err(SpecificationError::LimitExceeded { what, value, limit })
        } else {
            Ok(())
        }
    };

    for spec in &program.opaque {
        if let Some(binding) = program.binding(spec.name) {
            exceeds("texture unit count", binding + 1, info.max_texture_units)?;
        }
    }

    for spec in &program.ssbos {
        if let Some(binding) = program.binding(spec.name) {
            exceeds("storage buffer binding count", binding + 1, info.max_storage_buffer_bindings)?;
        }
    }

    for spec in &program.ubos {
        if let Some(ty) = registry.gl_type_of(&spec.type_info) {
            let size = u32::try_from(ty.layout.std140_size).unwrap_or(u32::MAX);
            exceeds("uniform block size", size, info.max_uniform_block_size_bytes)?;
        }
    }

    for compute in plans.iter().filter_map(|p| p.spec.compute.as_ref()) {
        let invocations = compute.group_size.iter().fold(1u32, |acc, n| acc.saturating_mul(*n));
        exceeds("work group invocation count", invocations, info.max_compute_invocations)?;
    }

    Ok(())
}

fn build_program(
    device: &mut dyn GlDevice,
    plans: &[StagePlan<'_>],
    sources: &[String],
) -> Result<ProgramName, ShaderError> {
    let mut shaders: Vec<ShaderName> = Vec::with_capacity(sources.len());

    for (plan, source) in plans.iter().zip(sources) {
        let stage = plan.spec.stage;
        let shader = match device.create_shader(stage) {
            Ok(shader) => shader,
            Err(message) => {
                release(device, &shaders);
                return Err(ShaderError::Device { what: "shader", message });
            }
        };
        shaders.push(shader);

        if !device.compile_shader(shader, source) {
            let log = device.shader_info_log(shader);
            log::error!("{stage} shader failed to compile:\n{log}\n{source}");
            release(device, &shaders);
            return Err(ShaderError::Compile(Diagnostics {
                stage: Some(stage),
                log,
            }));
        }

        log::info!("compiled {stage} shader");
    }

    let program = match device.create_program() {
        Ok(program) => program,
        Err(message) => {
            release(device, &shaders);
            return Err(ShaderError::Device { what: "program", message });
        }
    };

    for shader in &shaders {
        device.attach_shader(program, *shader);
    }

    let linked = device.link_program(program);
    for shader in &shaders {
        device.detach_shader(program, *shader);
    }
    release(device, &shaders);

    if !linked {
        let log = device.program_info_log(program);
        log::error!("program failed to link:\n{log}");
        device.delete_program(program);
        return Err(ShaderError::Link(Diagnostics { stage: None, log }));
    }

    log::info!("linked program of {} stages", shaders.len());
    Ok(program)
}

fn release(device: &mut dyn GlDevice, shaders: &[ShaderName]) {
    for shader in shaders {
        device.delete_shader(*shader);
    }
}

/// Source property lists of the finished program.
#[derive(Clone, Debug, Default)]
pub(crate) struct SourceLists {
    pub input_specs: ParamList,
    pub filter_specs: ParamList,
    pub consuming_specs: ParamList,
}

fn collect_lists(plans: &[StagePlan<'_>], program: &ProgramStorage, linked: &LinkedStorage) -> SourceLists {
    let mut consumed = FxHashSet::default();
    let mut modified = FxHashSet::default();
    for plan in plans {
        consumed.extend(plan.pipeline.consuming_specs.names());
        modified.extend(plan.pipeline.filter_specs.names());
        // a source some stage writes is changed for the stages after it
        modified.extend(plan.pipeline.output_specs.names());
    }

    let mut lists = SourceLists::default();
    for plan in plans {
        let pipeline = &plan.pipeline;
        for list in [
            &pipeline.input_specs,
            &pipeline.consuming_specs,
            &pipeline.filter_specs,
            &pipeline.pipethrough_specs,
        ] {
            for spec in list {
                let bound = program.classes.contains_key(&spec.name) && !linked.is_eliminated(spec.name);
                if !spec.type_info.is_void() && !bound {
                    continue;
                }

                let target = if consumed.contains(&spec.name) {
                    &mut lists.consuming_specs
                } else if modified.contains(&spec.name) {
                    &mut lists.filter_specs
                } else {
                    &mut lists.input_specs
                };
                target.insert_back(*spec);
            }
        }
    }

    lists
}
