use crate::{
    BindError, CompiledProgram, Diagnostics, OpenGlError, ShaderError, SpecificationError,
    cache::ShaderCache,
    compiler::{CompileContext, CompilerOptions, ComputeShaderParams, ShaderKey, SurfaceShaderParams},
    opengl::{GlDevice, GlInfo, GlowDevice},
    registry::{Texture, TypeRegistry},
    tasks::{ShaderSnippet, TaskSpecs},
    vertex::VertexLayoutTable,
};
use glam::{Vec3, Vec4};
use glshade_core::{
    MethodCollection, ParamList, ParamSpec, PipelineResolver, PropertySource, StageFlags, StringId, standard,
};
use rustc_hash::FxHashSet;
use std::{ffi::CStr, rc::Rc};

pub type OpenGlNativeRenderer = OpenGlRenderer<GlowDevice>;

/// Result of compiling against a caller's declared property set.
#[derive(Debug)]
pub enum CompileOutcome {
    Compiled(Rc<CompiledProgram>),
    /// The program needs properties the caller did not declare. Holds the full new set.
    RequirementsChanged(ParamList),
    Failed(Diagnostics),
}

/// Shader compiler state for one OpenGL context.
pub struct OpenGlRenderer<D: GlDevice> {
    device: D,
    registry: TypeRegistry,
    vertex_layout: VertexLayoutTable,
    cache: ShaderCache,
    options: CompilerOptions,
    sampler_colors: FxHashSet<StringId>,
}

impl OpenGlRenderer<GlowDevice> {
    /// Creates a renderer from a given loader function
    /// (a function that takes a GL function name and returns a pointer to that function).
    ///
    /// #### Requirements
    /// OpenGL 4.3 (or `ARB_compute_shader`) or OpenGL ES 3.1.
    ///
    /// #### Safety
    /// This function should be called only if the OpenGL context is currently active for the current thread.
    pub unsafe fn from_loader<F>(loader: F) -> Result<Self, OpenGlError>
    where
        F: FnMut(&CStr) -> *const std::os::raw::c_void,
    {
        let device = unsafe { GlowDevice::new(loader) };
        let options = CompilerOptions::for_info(device.info());
        Self::new(device, options)
    }
}

impl<D: GlDevice> OpenGlRenderer<D> {
    /// #### Error Conditions
    /// - If the context lacks compute shaders or storage buffers [`OpenGlError::UnsupportedVersion`] is returned.
    pub fn new(device: D, options: CompilerOptions) -> Result<Self, OpenGlError> {
        if !device.info().is_baseline_supported() {
            return Err(OpenGlError::UnsupportedVersion {
                info: device.info().clone(),
            });
        }

        let mut registry = TypeRegistry::new();
        let mut vertex_layout = VertexLayoutTable::new();
        for name in [standard::POSITION, standard::NORMAL, standard::COORD_BASE] {
            vertex_layout
                .specify_vertex_buffer(&mut registry, ParamSpec::new::<Vec3>(name))
                .map_err(|err| OpenGlError::VertexBuffer {
                    name,
                    message: err.to_string(),
                })?;
        }

        log::info!(
            "OpenGL {}.{} ({}), generating GLSL {}",
            device.info().version.0,
            device.info().version.1,
            device.info().vendor,
            options.glsl_version
        );

        Ok(Self {
            device,
            registry,
            vertex_layout,
            cache: ShaderCache::new(),
            options,
            sampler_colors: FxHashSet::default(),
        })
    }

    pub fn info(&self) -> &GlInfo {
        self.device.info()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn vertex_layout(&self) -> &VertexLayoutTable {
        &self.vertex_layout
    }

    pub fn cache(&self) -> &ShaderCache {
        &self.cache
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Makes `spec` a mesh vertex component. Returns its attribute location.
    pub fn specify_vertex_buffer(&mut self, spec: ParamSpec) -> Result<u32, SpecificationError> {
        self.vertex_layout.specify_vertex_buffer(&mut self.registry, spec)
    }

    /// Registers a task producing `sample_<color>` by sampling `tex_<color>` at `coord_<color>.xy`.
    /// Returns false if the color already has one.
    pub fn specify_texture_sampler(&mut self, methods: &mut MethodCollection, color: &str) -> bool {
        if !self.sampler_colors.insert(StringId::new(color)) {
            return false;
        }

        let snippet = format!("sample_{color} = texture(tex_{color}, coord_{color}.xy);");
        let specs = TaskSpecs::new()
            .inputs([
                ParamSpec::new::<Texture>(format!("tex_{color}")),
                ParamSpec::new::<Vec3>(format!("coord_{color}")),
            ])
            .outputs([ParamSpec::new::<Vec4>(format!("sample_{color}"))]);

        methods.register(ShaderSnippet::new(&snippet, specs), StageFlags::FRAGMENT | StageFlags::COMPUTE);
        true
    }

    fn retrieve(&mut self, key: &ShaderKey, resolver: &dyn PipelineResolver) -> Result<Rc<CompiledProgram>, ShaderError> {
        let mut ctx = CompileContext {
            device: &mut self.device,
            registry: &mut self.registry,
            vertex_layout: &self.vertex_layout,
            resolver,
            options: &self.options,
        };

        self.cache.retrieve(key, &mut ctx)
    }

    pub fn surface_program(
        &mut self,
        params: SurfaceShaderParams,
        resolver: &dyn PipelineResolver,
    ) -> Result<Rc<CompiledProgram>, ShaderError> {
        self.retrieve(&ShaderKey::surface(params), resolver)
    }

    pub fn compute_program(
        &mut self,
        params: ComputeShaderParams,
        resolver: &dyn PipelineResolver,
    ) -> Result<Rc<CompiledProgram>, ShaderError> {
        self.retrieve(&ShaderKey::compute(params), resolver)
    }

    /// Compiles a surface program and checks it needs nothing beyond `declared`.
    pub fn negotiate_surface(
        &mut self,
        params: SurfaceShaderParams,
        resolver: &dyn PipelineResolver,
        declared: &ParamList,
    ) -> Result<CompileOutcome, SpecificationError> {
        negotiate(self.surface_program(params, resolver), declared)
    }

    /// Compiles a compute program and checks it needs nothing beyond `declared`.
    pub fn negotiate_compute(
        &mut self,
        params: ComputeShaderParams,
        resolver: &dyn PipelineResolver,
        declared: &ParamList,
    ) -> Result<CompileOutcome, SpecificationError> {
        negotiate(self.compute_program(params, resolver), declared)
    }

    pub fn bind_properties(
        &mut self,
        program: &CompiledProgram,
        source: &dyn PropertySource,
        material: Option<&dyn PropertySource>,
    ) -> Result<(), BindError> {
        program.bind_properties(&mut self.device, &self.registry, source, material)
    }

    /// Releases every cached program.
    pub fn delete(mut self) {
        self.cache.clear(&mut self.device);
    }
}

fn negotiate(result: Result<Rc<CompiledProgram>, ShaderError>, declared: &ParamList) -> Result<CompileOutcome, SpecificationError> {
    let program = match result {
        Ok(program) => program,
        Err(ShaderError::Specification(err)) => return Err(err),
        Err(ShaderError::Compile(diagnostics) | ShaderError::Link(diagnostics)) => {
            return Ok(CompileOutcome::Failed(diagnostics));
        }
        Err(ShaderError::Device { what, message }) => {
            return Ok(CompileOutcome::Failed(Diagnostics {
                stage: None,
                log: format!("unable to create {what}: {message}"),
            }));
        }
    };

    let required = [program.input_specs(), program.filter_specs(), program.consuming_specs()];
    let missing = required.iter().flat_map(|l| l.iter()).any(|s| !declared.contains(s.name));
    if !missing {
        return Ok(CompileOutcome::Compiled(program));
    }

    let mut requirements = declared.clone();
    for list in required {
        requirements.merge(list);
    }

    log::debug!("program requires {} properties, {} were declared", requirements.len(), declared.len());
    Ok(CompileOutcome::RequirementsChanged(requirements))
}
