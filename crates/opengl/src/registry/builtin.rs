use super::{ConversionSpec, GlScalarSpec, GlTypeSpec, TypeRegistry, type_mismatch};
use crate::opengl::UniformValue;
use glam::{BVec2, BVec3, BVec4, IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};
use glow::{FLOAT, INT, UNSIGNED_INT};
use glshade_core::{HostType, TypeInfo};
use std::{num::NonZeroU32, sync::Arc};

/// A 2D texture sampled through a `sampler2D`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Texture {
    pub name: NonZeroU32,
}

impl HostType for Texture {}

fn scalar(gl_type: u32, components: u32) -> Option<GlScalarSpec> {
    Some(GlScalarSpec {
        gl_type,
        components,
        normalized: false,
    })
}

fn value<T: HostType + Copy>(
    registry: &mut TypeRegistry,
    spec: GlTypeSpec,
    scalar: Option<GlScalarSpec>,
    convert: fn(T) -> UniformValue,
) {
    let gl_type = registry.specify_type(spec);
    let mut conversion = ConversionSpec::new(gl_type);
    conversion.scalar = scalar;
    conversion.set_uniform = Some(Arc::new(move |device, location, value| {
        let value = value.get::<T>().ok_or_else(|| type_mismatch::<T>(value))?;
        device.set_uniform(location, convert(*value));
        Ok(())
    }));

    registry.register_conversion(&TypeInfo::of::<T>(), conversion);
}

fn bools<const N: usize>(values: [bool; N]) -> [i32; N] {
    values.map(i32::from)
}

pub(super) fn register_builtins(registry: &mut TypeRegistry) {
    let void = registry.specify_type(GlTypeSpec::default());
    registry.register_conversion(&TypeInfo::void(), ConversionSpec::new(void));

    let f = GlTypeSpec::value;
    value::<f32>(registry, f("float", 4, 4, 1), scalar(FLOAT, 1), UniformValue::Float);
    value::<Vec2>(registry, f("vec2", 8, 8, 1), scalar(FLOAT, 2), |v| UniformValue::Vec2(v.to_array()));
    value::<Vec3>(registry, f("vec3", 12, 16, 1), scalar(FLOAT, 3), |v| UniformValue::Vec3(v.to_array()));
    value::<Vec4>(registry, f("vec4", 16, 16, 1), scalar(FLOAT, 4), |v| UniformValue::Vec4(v.to_array()));

    value::<i32>(registry, f("int", 4, 4, 1), scalar(INT, 1), UniformValue::Int);
    value::<IVec2>(registry, f("ivec2", 8, 8, 1), scalar(INT, 2), |v| UniformValue::IVec2(v.to_array()));
    value::<IVec3>(registry, f("ivec3", 12, 16, 1), scalar(INT, 3), |v| UniformValue::IVec3(v.to_array()));
    value::<IVec4>(registry, f("ivec4", 16, 16, 1), scalar(INT, 4), |v| UniformValue::IVec4(v.to_array()));

    value::<u32>(registry, f("uint", 4, 4, 1), scalar(UNSIGNED_INT, 1), UniformValue::UInt);
    value::<UVec2>(registry, f("uvec2", 8, 8, 1), scalar(UNSIGNED_INT, 2), |v| UniformValue::UVec2(v.to_array()));
    value::<UVec3>(registry, f("uvec3", 12, 16, 1), scalar(UNSIGNED_INT, 3), |v| UniformValue::UVec3(v.to_array()));
    value::<UVec4>(registry, f("uvec4", 16, 16, 1), scalar(UNSIGNED_INT, 4), |v| UniformValue::UVec4(v.to_array()));

    value::<bool>(registry, f("bool", 4, 4, 1), None, |v| UniformValue::Int(v as i32));
    value::<BVec2>(registry, f("bvec2", 8, 8, 1), None, |v| UniformValue::IVec2(bools([v.x, v.y])));
    value::<BVec3>(registry, f("bvec3", 12, 16, 1), None, |v| UniformValue::IVec3(bools([v.x, v.y, v.z])));
    value::<BVec4>(registry, f("bvec4", 16, 16, 1), None, |v| UniformValue::IVec4(bools([v.x, v.y, v.z, v.w])));

    // std140 pads every matrix column to a vec4
    value::<Mat2>(registry, f("mat2", 32, 16, 2), scalar(FLOAT, 2), |m| UniformValue::Mat2(m.to_cols_array()));
    value::<Mat3>(registry, f("mat3", 48, 16, 3), scalar(FLOAT, 3), |m| UniformValue::Mat3(m.to_cols_array()));
    value::<Mat4>(registry, f("mat4", 64, 16, 4), scalar(FLOAT, 4), |m| UniformValue::Mat4(m.to_cols_array()));

    let sampler = registry.specify_type(GlTypeSpec::opaque("sampler2D"));
    let mut conversion = ConversionSpec::new(sampler);
    conversion.set_opaque_binding = Some(Arc::new(|device, unit, value| {
        let texture = value.get::<Texture>().ok_or_else(|| type_mismatch::<Texture>(value))?;
        device.bind_texture_unit(unit, texture.name);
        Ok(())
    }));
    registry.register_conversion(&TypeInfo::of::<Texture>(), conversion);
}
