use super::{
    CompilerOptions, InvocationCount, PREFIX_BINDING, PREFIX_ELEMENT, PREFIX_SSBO, PREFIX_SSBO_BLOCK, PREFIX_UBO,
    PREFIX_UBO_BLOCK, PREFIX_UNIFORM, StagePlan, VERTEX_POSITION_BUILTIN,
    assign::{ProgramStorage, StageStorage, Usage},
};
use crate::{
    SpecificationError,
    registry::{GlTypeSpec, TypeRegistry},
    vertex::VertexLayoutTable,
};
use glow::FLOAT;
use glshade_core::{BuildContext, EmitError, ParamSpec, StageKind, StringId};
use rustc_hash::FxHashMap;
use std::fmt::Write;

const AXES: [char; 3] = ['x', 'y', 'z'];

pub struct Environment<'a> {
    pub options: &'a CompilerOptions,
    pub registry: &'a TypeRegistry,
    pub vertex_layout: &'a VertexLayoutTable,
    pub usage: &'a FxHashMap<StringId, Usage>,
}

impl<'a> Environment<'a> {
    fn gl_type(&self, spec: &ParamSpec) -> Result<&'a GlTypeSpec, SpecificationError> {
        self.registry
            .gl_type_of(&spec.type_info)
            .ok_or_else(|| SpecificationError::Unsupported {
                type_name: spec.type_info.short_name(),
            })
    }

    fn value_name(&self, spec: &ParamSpec, what: &'static str) -> Result<&'a str, SpecificationError> {
        let name = &self.gl_type(spec)?.value_type_name;
        if name.is_empty() {
            return Err(unnamed(what, spec));
        }
        Ok(name)
    }

    /// Integer varyings cannot be interpolated.
    fn is_flat(&self, spec: &ParamSpec) -> bool {
        self.registry
            .lookup(&spec.type_info)
            .and_then(|c| c.scalar)
            .is_some_and(|s| s.gl_type != FLOAT)
    }
}

fn unnamed(what: &'static str, spec: &ParamSpec) -> SpecificationError {
    SpecificationError::UnnamedType {
        what,
        property: spec.name,
        type_name: spec.type_info.short_name(),
    }
}

/// Writes the complete GLSL source of one stage.
pub fn generate_stage(
    env: &Environment<'_>,
    program: &mut ProgramStorage,
    plan: &StagePlan<'_>,
    storage: &StageStorage,
) -> Result<String, SpecificationError> {
    let mut out = String::new();
    write_source(&mut out, env, program, plan, storage).map_err(|e| match e {
        GenerateError::Specification(e) => e,
        GenerateError::Format(e) => SpecificationError::Emit(EmitError::Format(e)),
    })?;
    Ok(out)
}

enum GenerateError {
    Specification(SpecificationError),
    Format(std::fmt::Error),
}

impl From<SpecificationError> for GenerateError {
    fn from(value: SpecificationError) -> Self {
        GenerateError::Specification(value)
    }
}

impl From<std::fmt::Error> for GenerateError {
    fn from(value: std::fmt::Error) -> Self {
        GenerateError::Format(value)
    }
}

impl From<EmitError> for GenerateError {
    fn from(value: EmitError) -> Self {
        GenerateError::Specification(value.into())
    }
}

fn write_source(
    out: &mut String,
    env: &Environment<'_>,
    program: &mut ProgramStorage,
    plan: &StagePlan<'_>,
    storage: &StageStorage,
) -> Result<(), GenerateError> {
    let stage = plan.spec.stage;
    let registry = env.registry;

    if env.options.gles {
        writeln!(out, "#version {} es", env.options.glsl_version)?;
        writeln!(out, "precision highp float;")?;
        writeln!(out, "precision highp int;")?;
    } else {
        writeln!(out, "#version {} core", env.options.glsl_version)?;
    }

    if let Some(compute) = &plan.spec.compute {
        let [x, y, z] = compute.group_size;
        writeln!(out, "layout (local_size_x = {x}, local_size_y = {y}, local_size_z = {z}) in;")?;
    }
    writeln!(out)?;

    for key in &storage.types {
        let ty = registry.gl_type(*key);
        if !ty.value_type_name.is_empty() && !ty.struct_body.is_empty() {
            writeln!(out, "struct {} {{\n{}\n}};", ty.value_type_name, ty.struct_body.trim_end())?;
        }
    }

    for spec in &storage.uniforms {
        let ty = env.value_name(spec, "uniform")?;
        writeln!(out, "uniform {ty} {PREFIX_UNIFORM}{};", spec.name)?;
    }

    for spec in &storage.opaque {
        let ty = &env.gl_type(spec)?.opaque_type_name;
        if ty.is_empty() {
            return Err(unnamed("opaque binding", spec).into());
        }

        let binding = program.binding_index(spec.name);
        writeln!(out, "layout(binding={binding}) uniform {ty} {PREFIX_BINDING}{};", spec.name)?;
    }

    for spec in &storage.ubos {
        let ty = env.gl_type(spec)?;
        let binding = program.binding_index(spec.name);
        let name = spec.name;

        if !ty.value_type_name.is_empty() {
            writeln!(
                out,
                "layout(std140, binding={binding}) uniform {PREFIX_UBO_BLOCK}{name} {{ {} {PREFIX_UBO}{name}; }};",
                ty.value_type_name
            )?;
        } else {
            writeln!(
                out,
                "layout(std140, binding={binding}) uniform {PREFIX_UBO_BLOCK}{name} {{\n{}\n}} {PREFIX_UBO}{name};",
                ty.struct_body.trim_end()
            )?;
        }
    }

    for spec in &storage.ssbos {
        write_storage_block(out, env, program, spec)?;
    }

    for spec in &storage.inputs {
        let ty = env.value_name(spec, "stage input")?;
        if stage == StageKind::Vertex {
            let location = env.vertex_layout.layout_index(spec.name).unwrap_or_default();
            writeln!(out, "layout(location={location}) in {ty} {PREFIX_ELEMENT}{};", spec.name)?;
        } else {
            let flat = if env.is_flat(spec) { "flat " } else { "" };
            writeln!(out, "{flat}in {ty} {}{};", storage.input_prefix, spec.name)?;
        }
    }

    let prefix = &plan.spec.out_var_prefix;
    for spec in &storage.outputs {
        let ty = env.value_name(spec, "stage output")?;
        match stage {
            StageKind::Vertex => {
                let flat = if env.is_flat(spec) { "flat " } else { "" };
                writeln!(out, "{flat}out {ty} {prefix}{};", spec.name)?;
            }
            StageKind::Fragment => {
                let location = plan
                    .desired
                    .names()
                    .position(|n| plan.spec.aliases.choice_for(n) == spec.name)
                    .ok_or(SpecificationError::UnplacedOutput { property: spec.name })?;
                writeln!(out, "layout(location={location}) out {ty} {prefix}{};", spec.name)?;
            }
            StageKind::Compute => writeln!(out, "{ty} {prefix}{};", spec.name)?,
        }
    }
    writeln!(out)?;

    for task in &plan.tasks {
        task.emit_declaration(&mut BuildContext {
            output: out,
            types: registry,
            aliases: &storage.aliases,
        })?;
    }

    writeln!(out, "void main() {{")?;

    for spec in &storage.locals {
        let ty = env.value_name(spec, "local")?;
        writeln!(out, "\t{ty} {};", storage.aliases.choice_for(spec.name))?;
    }

    for spec in &storage.copy_locals {
        let ty = env.value_name(spec, "local")?;
        writeln!(out, "\t{ty} {prefix}{};", spec.name)?;
    }

    if let Some(compute) = plan.spec.compute.as_ref().filter(|c| !c.allow_out_of_bounds) {
        for (axis, (count, group)) in compute.invocation_count.iter().zip(compute.group_size).enumerate() {
            let axis = AXES[axis];
            match count {
                InvocationCount::Fixed(count) if group > 0 && count % group != 0 => {
                    writeln!(out, "\tif (gl_GlobalInvocationID.{axis} >= {count}u) return;")?;
                }
                InvocationCount::Property(property) if group > 1 => {
                    // a filtered count is guarded by the value it had on entry
                    let alias = storage.aliases.choice_for(property.name).to_string();
                    let variable = storage
                        .copies
                        .iter()
                        .find(|(target, _)| *target == alias)
                        .map_or(alias.as_str(), |(_, source)| source.as_str());
                    writeln!(out, "\tif (gl_GlobalInvocationID.{axis} >= uint({variable})) return;")?;
                }
                _ => {}
            }
        }
    }

    for (target, source) in &storage.copies {
        writeln!(out, "\t{target} = {source};")?;
    }

    for task in &plan.tasks {
        out.push('\t');
        task.emit_usage(&mut BuildContext {
            output: out,
            types: registry,
            aliases: &storage.aliases,
        })?;
        out.push('\n');
    }

    if stage == StageKind::Vertex {
        let position = storage.aliases.choice_for(StringId::new(VERTEX_POSITION_BUILTIN));
        writeln!(out, "\t{VERTEX_POSITION_BUILTIN} = {position};")?;
    }

    writeln!(out, "}}")?;
    Ok(())
}

fn write_storage_block(
    out: &mut String,
    env: &Environment<'_>,
    program: &mut ProgramStorage,
    spec: &ParamSpec,
) -> Result<(), GenerateError> {
    let ty = env.gl_type(spec)?;
    let binding = program.binding_index(spec.name);
    let usage = env.usage.get(&spec.name).copied().unwrap_or_default();
    let name = spec.name;

    write!(out, "layout(std430, binding={binding}) ")?;
    if !usage.contains(Usage::WRITE) {
        write!(out, "readonly ")?;
    }
    if !usage.contains(Usage::READ) {
        write!(out, "writeonly ")?;
    }
    write!(out, "buffer {PREFIX_SSBO_BLOCK}{name} {{")?;

    if !ty.value_type_name.is_empty() {
        writeln!(out, " {} {PREFIX_SSBO}{name}; }};", ty.value_type_name)?;
        return Ok(());
    }

    let element = match &ty.flexible_member {
        Some(flexible) => {
            let element = &env.registry.gl_type(flexible.element).value_type_name;
            if element.is_empty() {
                return Err(unnamed("buffer element", spec).into());
            }
            Some((element, flexible.member_name.as_str()))
        }
        None => None,
    };

    match element {
        Some((element, "")) if ty.struct_body.is_empty() => {
            writeln!(out, " {element} {PREFIX_SSBO}{name}[]; }};")?;
        }
        Some((element, member)) => {
            writeln!(out)?;
            write!(out, "{}", ty.struct_body)?;
            writeln!(out, "\t{element} {member}[];")?;
            writeln!(out, "}} {PREFIX_SSBO}{name};")?;
        }
        None => {
            writeln!(out)?;
            write!(out, "{}", ty.struct_body)?;
            writeln!(out, "}} {PREFIX_SSBO}{name};")?;
        }
    }

    Ok(())
}
