use glam::{Vec3, Vec4};
use glshade::{
    BufferPtr, GlslStruct, MethodCollection, ParamAliases, ParamList, ParamSpec, Pipeline, PipelineResolver, PropertyMap,
    PropertySource, ResolveError, ShaderTask, SharedBufferHandle, StageFlags, StageKind, StringId, TaskKey, TypeInfo,
    opengl::{
        BindError, BufferTarget, CompilationSpec, CompileContext, CompileOutcome, CompiledProgram, CompilerOptions,
        ComputeShaderParams, ConversionSpec, DeviceCall, GlInfo, HeadlessDevice, InvocationCount, OpenGlRenderer,
        ShaderConstant, ShaderError, ShaderSnippet, SpecificationError, SurfaceShaderParams, TaskSpecs, Texture,
        TypeRegistry, UniformValue, VertexLayoutTable, compile,
    },
};
use std::{num::NonZeroU32, rc::Rc, sync::Arc};

type Renderer = OpenGlRenderer<HeadlessDevice>;

fn renderer() -> Renderer {
    let _ = env_logger::builder().is_test(true).try_init();
    OpenGlRenderer::new(HeadlessDevice::new(), CompilerOptions::default()).unwrap()
}

fn list(specs: &[ParamSpec]) -> ParamList {
    specs.iter().copied().collect()
}

fn no_aliases() -> Arc<ParamAliases> {
    Arc::new(ParamAliases::new())
}

/// vertex stage task writing `position_view` from the mesh position
fn vertex_methods() -> MethodCollection {
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "position_view = vec4(position, 1.0);",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Vec3>("position")])
                .outputs([ParamSpec::new::<Vec4>("position_view")]),
        ),
        StageFlags::VERTEX,
    );
    methods
}

/// compiles a single fragment stage outside of any cache
fn compile_fragment(
    device: &mut HeadlessDevice,
    registry: &mut TypeRegistry,
    resolver: &dyn PipelineResolver,
    desired: &ParamList,
) -> Result<CompiledProgram, ShaderError> {
    let layout = VertexLayoutTable::new();
    let options = CompilerOptions::default();
    let mut ctx = CompileContext {
        device,
        registry,
        vertex_layout: &layout,
        resolver,
        options: &options,
    };

    compile(&mut ctx, &[CompilationSpec::fragment(no_aliases())], desired)
}

fn handle(synchronized: bool) -> SharedBufferHandle {
    SharedBufferHandle {
        gpu_buffer: NonZeroU32::MIN,
        synchronized,
    }
}

#[allow(dead_code)]
#[derive(GlslStruct)]
struct Light {
    color: Vec4,
    direction: Vec4,
}

#[allow(dead_code)]
#[derive(GlslStruct)]
struct Weights {
    weight: f32,
    scale: f32,
}

/// a fragment only program with one constant output
/// - exactly one output is declared, at location 0
/// - nothing becomes a uniform
#[test]
fn single_fragment_output() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    let mut methods = MethodCollection::new();
    methods.register(ShaderConstant::new("color", Vec4::ONE), StageFlags::FRAGMENT);

    let program = compile_fragment(
        &mut device,
        &mut registry,
        &methods,
        &list(&[ParamSpec::new::<Vec4>("color")]),
    )
    .unwrap();

    let source = device.last_source(StageKind::Fragment).unwrap();
    let outputs: Vec<&str> = source.lines().filter(|l| l.contains(" out ")).collect();
    assert_eq!(outputs, vec!["layout(location=0) out vec4 frag_color;"]);
    assert!(!source.contains("uniform "));
    assert!(source.contains("\tfrag_color = vec4(1.0, 1.0, 1.0, 1.0);\n"));

    assert!(program.input_specs().is_empty());
    assert_eq!(program.output_specs().names().collect::<Vec<_>>(), vec![StringId::new("color")]);
}

/// a property that is both filtered and a program output
/// - gets exactly one output variable
/// - the copy from the uniform runs before the filtering task
#[test]
fn filtered_output_is_copied_once() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "color *= 0.5;",
            TaskSpecs::new()
                .filters([ParamSpec::new::<Vec4>("color")])
                .outputs([ParamSpec::token("shaded")]),
        ),
        StageFlags::FRAGMENT,
    );

    let program = compile_fragment(
        &mut device,
        &mut registry,
        &methods,
        &list(&[ParamSpec::new::<Vec4>("color"), ParamSpec::token("shaded")]),
    )
    .unwrap();

    let source = device.last_source(StageKind::Fragment).unwrap();
    assert_eq!(source.matches("out vec4 frag_color;").count(), 1);
    assert!(source.contains("uniform vec4 uniform_color;"));

    let copy = source.find("\tfrag_color = uniform_color;").unwrap();
    let usage = source.find("#define color frag_color").unwrap();
    assert!(copy < usage);

    assert!(program.filter_specs().contains(StringId::new("color")));
    assert!(program.input_specs().is_empty());
}

/// uniforms, samplers and storage buffers of one fragment stage
/// - every kept property has a location and a binding
/// - properties the driver dropped are left out of the requirements
/// - binding a property source hits the right device entry points
#[test]
fn storage_classes_and_binding() {
    let mut device = HeadlessDevice::new();
    device.eliminate("uniform_unused");

    let mut registry = TypeRegistry::new();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "color = tint * unused * texture(albedo, vec2(0.5)) * particles[0];",
            TaskSpecs::new()
                .inputs([
                    ParamSpec::new::<Vec4>("tint"),
                    ParamSpec::new::<f32>("unused"),
                    ParamSpec::new::<Texture>("albedo"),
                    ParamSpec::new::<BufferPtr<(), Vec4>>("particles"),
                ])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );

    let program = compile_fragment(
        &mut device,
        &mut registry,
        &methods,
        &list(&[ParamSpec::new::<Vec4>("color")]),
    )
    .unwrap();

    let source = device.last_source(StageKind::Fragment).unwrap();
    assert!(source.contains("uniform sampler2D bind_albedo;"));
    assert!(source.contains("readonly buffer buffer_block_particles { vec4 buffer_particles[]; };"));

    let inputs: Vec<StringId> = program.input_specs().names().collect();
    assert!(inputs.contains(&StringId::new("tint")));
    assert!(inputs.contains(&StringId::new("albedo")));
    assert!(inputs.contains(&StringId::new("particles")));
    assert!(!inputs.contains(&StringId::new("unused")));

    assert_eq!(program.uniforms().len(), 1);
    assert_eq!(program.opaque_bindings().len(), 1);
    assert_eq!(program.ssbo_bindings().len(), 1);
    assert_ne!(program.opaque_bindings()[0].binding, program.ssbo_bindings()[0].binding);

    let texture = Texture {
        name: NonZeroU32::new(7).unwrap(),
    };
    let mut properties = PropertyMap::new();
    properties
        .insert("tint", Vec4::new(1.0, 0.5, 0.25, 1.0))
        .insert("unused", 2.0f32)
        .insert("albedo", texture)
        .insert("particles", BufferPtr::<(), Vec4>::new(handle(true)));

    device.clear_calls();
    program
        .bind_properties(&mut device, &registry, &properties, None)
        .unwrap();

    let calls = device.calls();
    assert_eq!(calls[0], DeviceCall::UseProgram(Some(program.program())));
    assert!(calls.contains(&DeviceCall::SetUniform(
        program.uniforms()[0].location,
        UniformValue::Vec4([1.0, 0.5, 0.25, 1.0])
    )));
    assert!(calls.contains(&DeviceCall::BindTexture {
        unit: program.opaque_bindings()[0].binding,
        texture: texture.name,
    }));
    assert!(calls.contains(&DeviceCall::BindBuffer {
        target: BufferTarget::ShaderStorage,
        index: program.ssbo_bindings()[0].binding,
        buffer: NonZeroU32::MIN,
    }));
    assert_eq!(calls.len(), 4);

    let mut material = PropertyMap::new();
    material.insert("tint", Vec4::ZERO);
    device.clear_calls();
    program
        .bind_properties(&mut device, &registry, &properties, Some(&material as &dyn PropertySource))
        .unwrap();
    assert!(device.calls().contains(&DeviceCall::SetUniform(
        program.uniforms()[0].location,
        UniformValue::Vec4([0.0; 4])
    )));

    properties.insert("particles", BufferPtr::<(), Vec4>::new(handle(false)));
    let error = program
        .bind_properties(&mut device, &registry, &properties, None)
        .unwrap_err();
    assert!(matches!(error, BindError::Property { property, .. } if property == "particles"));
}

/// a struct whose std140 size differs from its host size
/// - fails with an error naming the type
/// - never reaches the driver
#[test]
fn struct_size_mismatch() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "color = vec4(weights.weight);",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Weights>("weights")])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );

    let error = compile_fragment(
        &mut device,
        &mut registry,
        &methods,
        &list(&[ParamSpec::new::<Vec4>("color")]),
    )
    .unwrap_err();

    assert!(matches!(
        error,
        ShaderError::Specification(SpecificationError::LayoutMismatch { .. })
    ));
    assert!(error.to_string().contains("Weights"));
    assert_eq!(device.compile_count(), 0);
    assert_eq!(device.link_count(), 0);
}

#[test]
fn derived_struct_layout() {
    let mut registry = TypeRegistry::new();
    let first = registry.get_conversion(&TypeInfo::of::<Light>()).unwrap();
    let second = registry.get_conversion(&TypeInfo::of::<Light>()).unwrap();
    assert_eq!(first, second);

    let spec = registry.gl_type(registry.conversion(first).gl_type);
    assert_eq!(spec.value_type_name, "Light");
    assert_eq!(spec.struct_body, "\tvec4 color;\n\tvec4 direction;\n");
    assert_eq!(spec.layout.std140_size, 32);
}

#[test]
fn buffer_element_offset_mismatch() {
    let mut registry = TypeRegistry::new();
    let error = registry
        .get_conversion(&TypeInfo::of::<BufferPtr<u32, Vec3>>())
        .unwrap_err();

    assert!(matches!(error, SpecificationError::LayoutMismatch { .. }));
    assert!(error.to_string().contains("BufferPtr"));
}

/// identical surface requests
/// - compile and link once and share the program
/// - a different output name is a different program
#[test]
fn surface_programs_are_cached() {
    let mut renderer = renderer();
    let mut methods = vertex_methods();
    methods.register(ShaderConstant::new("color", Vec4::ONE), StageFlags::FRAGMENT);
    methods.register(ShaderConstant::new("glow", Vec4::ZERO), StageFlags::FRAGMENT);

    let params = || SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("color")]));
    let first = renderer.surface_program(params(), &methods).unwrap();
    let second = renderer.surface_program(params(), &methods).unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(renderer.cache().compile_count(), 1);
    assert_eq!(renderer.device().link_count(), 1);

    let vertex = renderer.device().last_source(StageKind::Vertex).unwrap();
    assert!(vertex.contains("in vec3 elem_position;"));
    assert!(vertex.contains("out vec4 vert_position_view;"));
    assert!(vertex.contains("\tgl_Position = vert_position_view;\n"));
    assert!(
        first
            .vertex_component_specs()
            .contains(StringId::new("position"))
    );

    let other = SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("glow")]));
    let third = renderer.surface_program(other, &methods).unwrap();
    assert!(!Rc::ptr_eq(&first, &third));
    assert_eq!(renderer.cache().compile_count(), 2);
    assert_eq!(renderer.cache().len(), 2);
}

/// vertex components requested by the fragment stage travel through a varying
#[test]
fn texture_sampler_reads_vertex_coordinates() {
    let mut renderer = renderer();
    let mut methods = vertex_methods();
    assert!(renderer.specify_texture_sampler(&mut methods, "base"));
    assert!(!renderer.specify_texture_sampler(&mut methods, "base"));

    let params = SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("sample_base")]));
    let program = renderer.surface_program(params, &methods).unwrap();

    let vertex = renderer.device().last_source(StageKind::Vertex).unwrap();
    assert!(vertex.contains("out vec3 vert_coord_base;"));
    assert!(vertex.contains("\tvert_coord_base = elem_coord_base;\n"));

    let fragment = renderer.device().last_source(StageKind::Fragment).unwrap();
    assert!(fragment.contains("in vec3 vert_coord_base;"));
    assert!(fragment.contains("uniform sampler2D bind_tex_base;"));
    assert!(fragment.contains("layout(location=0) out vec4 frag_sample_base;"));

    assert!(program.input_specs().contains(StringId::new("tex_base")));
    assert!(!program.input_specs().contains(StringId::new("coord_base")));
}

/// a compute dispatch that does not fill whole work groups returns early
#[test]
fn compute_bounds_guard() {
    let mut renderer = renderer();
    let mut methods = MethodCollection::new();
    methods.register(ShaderConstant::new("value", 1.0f32), StageFlags::COMPUTE);

    let outputs = list(&[ParamSpec::new::<f32>("value")]);
    let counts = |x| [InvocationCount::Fixed(x), InvocationCount::Fixed(1), InvocationCount::Fixed(1)];

    let partial = ComputeShaderParams::new(no_aliases(), outputs.clone(), counts(100)).with_group_size([64, 1, 1]);
    renderer.compute_program(partial, &methods).unwrap();
    let source = renderer.device().last_source(StageKind::Compute).unwrap();
    assert!(source.contains("layout (local_size_x = 64, local_size_y = 1, local_size_z = 1) in;"));
    assert!(source.contains("\tif (gl_GlobalInvocationID.x >= 100u) return;\n"));
    assert!(!source.contains("gl_GlobalInvocationID.y"));

    let exact = ComputeShaderParams::new(no_aliases(), outputs.clone(), counts(64)).with_group_size([64, 1, 1]);
    renderer.compute_program(exact, &methods).unwrap();
    let source = renderer.device().last_source(StageKind::Compute).unwrap();
    assert!(!source.contains("gl_GlobalInvocationID"));

    let unchecked = ComputeShaderParams::new(no_aliases(), outputs, counts(100))
        .with_group_size([64, 1, 1])
        .allow_out_of_bounds(true);
    renderer.compute_program(unchecked, &methods).unwrap();
    let source = renderer.device().last_source(StageKind::Compute).unwrap();
    assert!(!source.contains("gl_GlobalInvocationID"));
}

/// invocation counts read from a property become uniforms of the program
#[test]
fn compute_property_count() {
    let mut renderer = renderer();
    let mut methods = MethodCollection::new();
    methods.register(ShaderConstant::new("value", 1.0f32), StageFlags::COMPUTE);

    let count = ParamSpec::new::<u32>("particle_count");
    let params = ComputeShaderParams::new(
        no_aliases(),
        list(&[ParamSpec::new::<f32>("value")]),
        [InvocationCount::Property(count), InvocationCount::Fixed(1), InvocationCount::Fixed(1)],
    )
    .with_group_size([32, 1, 1]);

    let program = renderer.compute_program(params, &methods).unwrap();
    let source = renderer.device().last_source(StageKind::Compute).unwrap();
    assert!(source.contains("uniform uint uniform_particle_count;"));
    assert!(source.contains("\tif (gl_GlobalInvocationID.x >= uint(uniform_particle_count)) return;\n"));
    assert!(program.input_specs().contains(count.name));
}

/// negotiation reports properties the caller did not declare
#[test]
fn negotiate_requirements() {
    let mut renderer = renderer();
    let mut methods = vertex_methods();
    methods.register(
        ShaderSnippet::new(
            "color = tint;",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Vec4>("tint")])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );

    let params = || SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("color")]));

    let declared = ParamList::new();
    let requirements = match renderer.negotiate_surface(params(), &methods, &declared).unwrap() {
        CompileOutcome::RequirementsChanged(requirements) => requirements,
        other => panic!("expected new requirements, got {other:?}"),
    };
    assert!(requirements.contains(StringId::new("tint")));

    let outcome = renderer.negotiate_surface(params(), &methods, &requirements).unwrap();
    assert!(matches!(outcome, CompileOutcome::Compiled(_)));
    assert_eq!(renderer.device().link_count(), 1);
}

/// driver failures come back as diagnostics and are not cached
#[test]
fn compile_failures_are_reported() {
    let mut renderer = renderer();
    renderer.device_mut().fail_compile_on("frag_color");

    let mut methods = vertex_methods();
    methods.register(ShaderConstant::new("color", Vec4::ONE), StageFlags::FRAGMENT);

    let params = || SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("color")]));
    let outcome = renderer.negotiate_surface(params(), &methods, &ParamList::new()).unwrap();
    match outcome {
        CompileOutcome::Failed(diagnostics) => {
            assert_eq!(diagnostics.stage, Some(StageKind::Fragment));
            assert!(diagnostics.log.contains("frag_color"));
        }
        other => panic!("expected a failure, got {other:?}"),
    }

    assert!(renderer.cache().is_empty());
    assert_eq!(renderer.device().live_shaders(), 0);

    renderer.surface_program(params(), &methods).unwrap_err();
    assert_eq!(renderer.cache().compile_count(), 2);
}

/// unwraps the specification error of a failed compile
fn specification(error: ShaderError) -> SpecificationError {
    match error {
        ShaderError::Specification(error) => error,
        other => panic!("expected a specification error, got {other}"),
    }
}

/// a desired output nothing in the stage produces
/// - is declared as a program output
/// - is copied from its uniform before the tasks run
#[test]
fn passed_through_output_is_written() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    let methods = MethodCollection::new();

    let program = compile_fragment(
        &mut device,
        &mut registry,
        &methods,
        &list(&[ParamSpec::new::<Vec4>("tint")]),
    )
    .unwrap();

    let source = device.last_source(StageKind::Fragment).unwrap();
    assert!(source.contains("uniform vec4 uniform_tint;"));
    assert!(source.contains("layout(location=0) out vec4 frag_tint;"));
    assert!(source.contains("\tfrag_tint = uniform_tint;\n"));
    assert!(program.input_specs().contains(StringId::new("tint")));
}

/// an invocation count some task of the compute stage writes
/// - is rejected before anything reaches the driver
#[test]
fn produced_invocation_count() {
    let mut renderer = renderer();
    let mut methods = MethodCollection::new();
    methods.register(ShaderConstant::new("n", 7u32), StageFlags::COMPUTE);
    methods.register(
        ShaderSnippet::new(
            "value = float(n);",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<u32>("n")])
                .outputs([ParamSpec::new::<f32>("value")]),
        ),
        StageFlags::COMPUTE,
    );

    let params = ComputeShaderParams::new(
        no_aliases(),
        list(&[ParamSpec::new::<f32>("value")]),
        [
            InvocationCount::Property(ParamSpec::new::<u32>("n")),
            InvocationCount::Fixed(1),
            InvocationCount::Fixed(1),
        ],
    )
    .with_group_size([32, 1, 1]);

    let error = specification(renderer.compute_program(params, &methods).unwrap_err());
    assert!(matches!(error, SpecificationError::ProducedInvocationCount { property } if property == "n"));
    assert!(error.to_string().contains("`n`"));
    assert_eq!(renderer.device().compile_count(), 0);
}

/// a filtered invocation count
/// - guards with the value the stage received
/// - stays a source of the program
#[test]
fn filtered_invocation_count() {
    let mut renderer = renderer();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "value = float(particle_count); particle_count /= 2u;",
            TaskSpecs::new()
                .filters([ParamSpec::new::<u32>("particle_count")])
                .outputs([ParamSpec::new::<f32>("value")]),
        ),
        StageFlags::COMPUTE,
    );

    let count = ParamSpec::new::<u32>("particle_count");
    let params = ComputeShaderParams::new(
        no_aliases(),
        list(&[ParamSpec::new::<f32>("value")]),
        [InvocationCount::Property(count), InvocationCount::Fixed(1), InvocationCount::Fixed(1)],
    )
    .with_group_size([32, 1, 1]);

    let program = renderer.compute_program(params, &methods).unwrap();
    let source = renderer.device().last_source(StageKind::Compute).unwrap();
    let guard = source
        .find("\tif (gl_GlobalInvocationID.x >= uint(uniform_particle_count)) return;\n")
        .unwrap();
    let copy = source.find("\tcomp_particle_count = uniform_particle_count;\n").unwrap();
    assert!(guard < copy);
    assert!(program.filter_specs().contains(count.name));
}

/// a struct input without any registered storage class
#[test]
fn unconvertible_property() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "color = light.color;",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Light>("light")])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );

    let error = compile_fragment(&mut device, &mut registry, &methods, &list(&[ParamSpec::new::<Vec4>("color")]));
    let error = specification(error.unwrap_err());
    assert!(matches!(error, SpecificationError::Unconvertible { property, .. } if property == "light"));
    assert!(error.to_string().contains("`light`"));
    assert!(error.to_string().contains("Light"));
}

/// a filtered uniform whose type has no value type to copy into
#[test]
fn filter_without_value_type() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();

    let sampler = registry.lookup(&TypeInfo::of::<Texture>()).unwrap().gl_type;
    let mut conversion = ConversionSpec::new(sampler);
    conversion.set_uniform = Some(Arc::new(|_, _, _| Ok(())));
    registry.register_conversion(&TypeInfo::of::<Texture>(), conversion);

    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "color = texture(albedo, vec2(0.5));",
            TaskSpecs::new()
                .filters([ParamSpec::new::<Texture>("albedo")])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );

    let error = compile_fragment(&mut device, &mut registry, &methods, &list(&[ParamSpec::new::<Vec4>("color")]));
    let error = specification(error.unwrap_err());
    assert!(matches!(error, SpecificationError::NotReassignable { property } if property == "albedo"));
    assert!(error.to_string().contains("`albedo`"));
}

/// opaque values cannot be task results
/// - as a program output
/// - as a value passed between two tasks
#[test]
fn opaque_task_results() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "albedo = bind_default;",
            TaskSpecs::new().outputs([ParamSpec::new::<Texture>("albedo")]),
        ),
        StageFlags::FRAGMENT,
    );
    methods.register(
        ShaderSnippet::new(
            "color = texture(albedo, vec2(0.5));",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Texture>("albedo")])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );

    let error = compile_fragment(&mut device, &mut registry, &methods, &list(&[ParamSpec::new::<Texture>("albedo")]));
    let error = specification(error.unwrap_err());
    assert!(matches!(error, SpecificationError::InvalidOutput { property } if property == "albedo"));
    assert!(error.to_string().contains("`albedo`"));

    let error = compile_fragment(&mut device, &mut registry, &methods, &list(&[ParamSpec::new::<Vec4>("color")]));
    let error = specification(error.unwrap_err());
    assert!(matches!(error, SpecificationError::InvalidLocal { property } if property == "albedo"));
    assert!(error.to_string().contains("`albedo`"));

    assert_eq!(device.compile_count(), 0);
}

/// resolver that also lists every desired property as a stage input
struct Overlapping(MethodCollection);

impl PipelineResolver for Overlapping {
    fn resolve(&self, stage: StageKind, desired: &ParamList, aliases: &ParamAliases) -> Result<Pipeline, ResolveError> {
        let mut pipeline = self.0.resolve(stage, desired, aliases)?;
        for spec in desired {
            pipeline.input_specs.insert_back(*spec);
        }
        Ok(pipeline)
    }

    fn task(&self, key: TaskKey) -> Option<&dyn ShaderTask> {
        self.0.task(key)
    }
}

/// a pipeline listing one property under two classes is rejected
#[test]
fn conflicting_classes() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    let mut methods = MethodCollection::new();
    methods.register(ShaderConstant::new("color", Vec4::ONE), StageFlags::FRAGMENT);
    let resolver = Overlapping(methods);

    let error = compile_fragment(&mut device, &mut registry, &resolver, &list(&[ParamSpec::new::<Vec4>("color")]));
    let error = specification(error.unwrap_err());
    assert!(matches!(
        error,
        SpecificationError::ConflictingClasses {
            property,
            stage: StageKind::Fragment,
            first: "input",
            second: "output",
        } if property == "color"
    ));
    assert!(error.to_string().contains("`color`"));
}

/// registers `Light` as a uniform buffer bound from one fixed buffer
fn light_as_uniform_buffer(registry: &mut TypeRegistry) {
    let key = registry.get_conversion(&TypeInfo::of::<Light>()).unwrap();
    let mut conversion = ConversionSpec::new(registry.conversion(key).gl_type);
    conversion.set_ubo_binding = Some(Arc::new(|device, index, _| {
        device.bind_buffer_base(BufferTarget::Uniform, index, NonZeroU32::MIN);
        Ok(())
    }));
    registry.register_conversion(&TypeInfo::of::<Light>(), conversion);
}

/// a struct with a uniform buffer setter
/// - is declared as a std140 block holding the struct
/// - shares binding points with samplers and storage buffers
/// - is bound through the uniform buffer target
#[test]
fn uniform_buffer_binding() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    light_as_uniform_buffer(&mut registry);

    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "color = light.color;",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Light>("light")])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );
    methods.register(
        ShaderSnippet::new(
            "glow = light.color * texture(albedo, vec2(0.5)) * particles[0];",
            TaskSpecs::new()
                .inputs([
                    ParamSpec::new::<Texture>("albedo"),
                    ParamSpec::new::<Light>("light"),
                    ParamSpec::new::<BufferPtr<(), Vec4>>("particles"),
                ])
                .outputs([ParamSpec::new::<Vec4>("glow")]),
        ),
        StageFlags::FRAGMENT,
    );

    let program = compile_fragment(&mut device, &mut registry, &methods, &list(&[ParamSpec::new::<Vec4>("color")])).unwrap();
    let source = device.last_source(StageKind::Fragment).unwrap();
    assert!(source.contains("struct Light {\n\tvec4 color;\n\tvec4 direction;\n};"));
    assert!(source.contains("layout(std140, binding=0) uniform ubo_block_light { Light ubo_light; };"));
    assert!(!source.contains("uniform_light"));

    assert!(program.input_specs().contains(StringId::new("light")));
    assert_eq!(program.ubo_bindings().len(), 1);
    assert_eq!(program.ubo_bindings()[0].binding, 0);

    let mixed = compile_fragment(&mut device, &mut registry, &methods, &list(&[ParamSpec::new::<Vec4>("glow")])).unwrap();
    let mut bindings = vec![
        mixed.opaque_bindings()[0].binding,
        mixed.ubo_bindings()[0].binding,
        mixed.ssbo_bindings()[0].binding,
    ];
    bindings.sort_unstable();
    assert_eq!(bindings, vec![0, 1, 2]);

    let ubo = mixed.ubo_bindings()[0].binding;
    let source = device.last_source(StageKind::Fragment).unwrap();
    assert!(source.contains(&format!(
        "layout(std140, binding={ubo}) uniform ubo_block_light {{ Light ubo_light; }};"
    )));

    let mut properties = PropertyMap::new();
    properties.insert(
        "light",
        Light {
            color: Vec4::ONE,
            direction: Vec4::NEG_Z,
        },
    );

    device.clear_calls();
    program.bind_properties(&mut device, &registry, &properties, None).unwrap();
    assert_eq!(
        device.calls(),
        &[
            DeviceCall::UseProgram(Some(program.program())),
            DeviceCall::BindBuffer {
                target: BufferTarget::Uniform,
                index: 0,
                buffer: NonZeroU32::MIN,
            },
        ]
    );
}

/// a filter in the vertex stage of a surface program
/// - copies the uniform exactly once, in the vertex stage
/// - hands the filtered value to the fragment stage through a varying
#[test]
fn vertex_filter_feeds_fragment() {
    let mut renderer = renderer();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "position_view = vec4(position, 1.0); tint *= position_view.z;",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Vec3>("position")])
                .filters([ParamSpec::new::<Vec4>("tint")])
                .outputs([ParamSpec::new::<Vec4>("position_view")]),
        ),
        StageFlags::VERTEX,
    );
    methods.register(
        ShaderSnippet::new(
            "color = tint;",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Vec4>("tint")])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );

    let params = SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("color")]));
    let program = renderer.surface_program(params, &methods).unwrap();

    let vertex = renderer.device().last_source(StageKind::Vertex).unwrap();
    assert!(vertex.contains("uniform vec4 uniform_tint;"));
    assert!(vertex.contains("out vec4 vert_tint;"));
    assert_eq!(vertex.matches("vert_tint = uniform_tint;").count(), 1);

    let fragment = renderer.device().last_source(StageKind::Fragment).unwrap();
    assert!(fragment.contains("in vec4 vert_tint;"));
    assert!(!fragment.contains("uniform_tint"));
    assert!(!fragment.contains("frag_tint"));

    assert!(program.filter_specs().contains(StringId::new("tint")));
    assert!(!program.input_specs().contains(StringId::new("tint")));
}

/// filtered samplers and storage buffers are used in place
/// - no copy and no output variable is generated for them
/// - the storage block is both read and written
#[test]
fn bound_filters_are_not_copied() {
    let mut device = HeadlessDevice::new();
    let mut registry = TypeRegistry::new();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "particles[0] *= texture(albedo, vec2(0.5)); color = particles[0];",
            TaskSpecs::new()
                .filters([
                    ParamSpec::new::<Texture>("albedo"),
                    ParamSpec::new::<BufferPtr<(), Vec4>>("particles"),
                ])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );

    let program = compile_fragment(&mut device, &mut registry, &methods, &list(&[ParamSpec::new::<Vec4>("color")])).unwrap();
    let source = device.last_source(StageKind::Fragment).unwrap();
    assert!(source.contains("layout(binding=0) uniform sampler2D bind_albedo;"));
    assert!(source.contains("layout(std430, binding=1) buffer buffer_block_particles { vec4 buffer_particles[]; };"));
    assert!(!source.contains("frag_albedo"));
    assert!(!source.contains("frag_particles"));
    assert!(!source.contains(" = bind_albedo;"));

    assert!(program.filter_specs().contains(StringId::new("albedo")));
    assert!(program.filter_specs().contains(StringId::new("particles")));
}

/// a uniform of one stage that a later stage writes is reported as modified
#[test]
fn later_output_marks_source_modified() {
    let mut renderer = renderer();
    let mut methods = MethodCollection::new();
    methods.register(
        ShaderSnippet::new(
            "position_view = vec4(position, 1.0) * tint;",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Vec3>("position"), ParamSpec::new::<Vec4>("tint")])
                .outputs([ParamSpec::new::<Vec4>("position_view")]),
        ),
        StageFlags::VERTEX,
    );
    methods.register(ShaderConstant::new("tint", Vec4::ONE), StageFlags::FRAGMENT);

    let params = SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("tint")]));
    let program = renderer.surface_program(params, &methods).unwrap();

    let vertex = renderer.device().last_source(StageKind::Vertex).unwrap();
    assert!(vertex.contains("uniform vec4 uniform_tint;"));
    let fragment = renderer.device().last_source(StageKind::Fragment).unwrap();
    assert!(fragment.contains("layout(location=0) out vec4 frag_tint;"));

    assert!(program.filter_specs().contains(StringId::new("tint")));
    assert!(!program.input_specs().contains(StringId::new("tint")));
}

/// boolean values cannot cross between stages
/// - a bool varying is rejected
/// - an unsigned varying is declared flat
#[test]
fn varying_types() {
    let mut renderer = renderer();
    let fragment = |input: ParamSpec, code: &str| {
        let mut methods = MethodCollection::new();
        methods.register(
            ShaderSnippet::new(
                "position_view = vec4(position, 1.0); visible = position.z > 0.0; cell = uint(position.x);",
                TaskSpecs::new()
                    .inputs([ParamSpec::new::<Vec3>("position")])
                    .outputs([
                        ParamSpec::new::<Vec4>("position_view"),
                        ParamSpec::new::<bool>("visible"),
                        ParamSpec::new::<u32>("cell"),
                    ]),
            ),
            StageFlags::VERTEX,
        );
        methods.register(
            ShaderSnippet::new(
                code,
                TaskSpecs::new()
                    .inputs([input])
                    .outputs([ParamSpec::new::<Vec4>("color")]),
            ),
            StageFlags::FRAGMENT,
        );
        methods
    };

    let params = || SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("color")]));

    let error = renderer
        .surface_program(params(), &fragment(ParamSpec::new::<bool>("visible"), "color = vec4(float(visible));"))
        .unwrap_err();
    let error = specification(error);
    assert!(matches!(error, SpecificationError::InvalidOutput { property } if property == "visible"));
    assert_eq!(renderer.device().compile_count(), 0);

    renderer
        .surface_program(params(), &fragment(ParamSpec::new::<u32>("cell"), "color = vec4(float(cell));"))
        .unwrap();
    let vertex = renderer.device().last_source(StageKind::Vertex).unwrap();
    assert!(vertex.contains("flat out uint vert_cell;"));
    let source = renderer.device().last_source(StageKind::Fragment).unwrap();
    assert!(source.contains("flat in uint vert_cell;"));
}

/// programs beyond what the device supports fail before reaching the driver
/// - more samplers than texture units
/// - work groups larger than the invocation limit
#[test]
fn device_limits() {
    let mut info = GlInfo::headless();
    info.max_texture_units = 1;
    let mut renderer = OpenGlRenderer::new(HeadlessDevice::with_info(info), CompilerOptions::default()).unwrap();

    let mut methods = vertex_methods();
    methods.register(
        ShaderSnippet::new(
            "color = texture(albedo, vec2(0.5)) * texture(detail, vec2(0.5));",
            TaskSpecs::new()
                .inputs([ParamSpec::new::<Texture>("albedo"), ParamSpec::new::<Texture>("detail")])
                .outputs([ParamSpec::new::<Vec4>("color")]),
        ),
        StageFlags::FRAGMENT,
    );
    methods.register(ShaderConstant::new("value", 1.0f32), StageFlags::COMPUTE);

    let params = SurfaceShaderParams::new(no_aliases(), list(&[ParamSpec::new::<Vec4>("color")]));
    let error = specification(renderer.surface_program(params, &methods).unwrap_err());
    assert!(matches!(
        error,
        SpecificationError::LimitExceeded {
            what: "texture unit count",
            value: 2,
            limit: 1,
        }
    ));

    let counts = [InvocationCount::Fixed(4096), InvocationCount::Fixed(1), InvocationCount::Fixed(1)];
    let params = ComputeShaderParams::new(no_aliases(), list(&[ParamSpec::new::<f32>("value")]), counts)
        .with_group_size([64, 32, 1]);
    let error = specification(renderer.compute_program(params, &methods).unwrap_err());
    assert!(matches!(
        error,
        SpecificationError::LimitExceeded {
            what: "work group invocation count",
            value: 2048,
            limit: 1024,
        }
    ));

    assert_eq!(renderer.device().compile_count(), 0);
}
