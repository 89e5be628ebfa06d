mod builtin;
mod naming;

pub use builtin::Texture;
pub use naming::convert_to_glsl_type_name;

use crate::{
    SetterError, SpecificationError,
    opengl::{BufferTarget, GlDevice, UniformLocation},
};
use glshade_core::{BufferMeta, SharedBufferHandle, StringId, StructField, StructLayout, TypeInfo, TypeMeta, TypeNames, Value};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use std::{
    any::TypeId,
    fmt::{self, Debug, Write},
    sync::Arc,
};

slotmap::new_key_type! {
    pub struct GlTypeKey;
    pub struct ConversionKey;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlLayoutSpec {
    pub std140_size: usize,
    pub std140_alignment: usize,
    /// Number of vertex attribute slots a value of this type occupies.
    pub index_size: u32,
}

impl GlLayoutSpec {
    /// Distance between consecutive array elements.
    pub fn array_stride(&self) -> usize {
        self.std140_size.next_multiple_of(self.std140_alignment.max(1))
    }
}

/// An unsized array that closes a storage block.
#[derive(Clone, Debug)]
pub struct FlexibleMemberSpec {
    pub element: GlTypeKey,
    /// Empty when the whole block is the array.
    pub member_name: String,
    pub max_elements: u32,
}

/// A GPU type as GLSL sees it.
#[derive(Clone, Debug, Default)]
pub struct GlTypeSpec {
    pub value_type_name: String,
    pub opaque_type_name: String,
    pub struct_body: String,
    pub layout: GlLayoutSpec,
    pub flexible_member: Option<FlexibleMemberSpec>,
    pub member_dependencies: Vec<GlTypeKey>,
}

impl GlTypeSpec {
    pub fn value(name: &str, std140_size: usize, std140_alignment: usize, index_size: u32) -> Self {
        Self {
            value_type_name: name.to_string(),
            layout: GlLayoutSpec {
                std140_size,
                std140_alignment,
                index_size,
            },
            ..Default::default()
        }
    }

    pub fn opaque(name: &str) -> Self {
        Self {
            opaque_type_name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Vertex attribute format of a scalar-based type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlScalarSpec {
    pub gl_type: u32,
    pub components: u32,
    pub normalized: bool,
}

pub type UniformSetter = Arc<dyn Fn(&mut dyn GlDevice, UniformLocation, &Value) -> Result<(), SetterError> + Send + Sync>;
pub type BindingSetter = Arc<dyn Fn(&mut dyn GlDevice, u32, &Value) -> Result<(), SetterError> + Send + Sync>;

/// How host values of one type reach the GPU. Each storage class setter is optional.
#[derive(Clone)]
pub struct ConversionSpec {
    pub gl_type: GlTypeKey,
    pub scalar: Option<GlScalarSpec>,
    pub set_uniform: Option<UniformSetter>,
    pub set_opaque_binding: Option<BindingSetter>,
    pub set_ubo_binding: Option<BindingSetter>,
    pub set_ssbo_binding: Option<BindingSetter>,
}

impl ConversionSpec {
    pub fn new(gl_type: GlTypeKey) -> Self {
        Self {
            gl_type,
            scalar: None,
            set_uniform: None,
            set_opaque_binding: None,
            set_ubo_binding: None,
            set_ssbo_binding: None,
        }
    }
}

impl Debug for ConversionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionSpec")
            .field("gl_type", &self.gl_type)
            .field("scalar", &self.scalar)
            .field("uniform", &self.set_uniform.is_some())
            .field("opaque", &self.set_opaque_binding.is_some())
            .field("ubo", &self.set_ubo_binding.is_some())
            .field("ssbo", &self.set_ssbo_binding.is_some())
            .finish()
    }
}

pub(crate) fn type_mismatch<T>(value: &Value) -> SetterError {
    SetterError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        found: value.type_info().short_name(),
    }
}

/// Host to GPU type mapping.
///
/// Records are never removed, so keys stay valid for the registry's lifetime.
pub struct TypeRegistry {
    types: SlotMap<GlTypeKey, GlTypeSpec>,
    conversions: SlotMap<ConversionKey, ConversionSpec>,
    by_host: FxHashMap<TypeId, ConversionKey>,
    in_progress: Vec<TypeInfo>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry with every built-in GLSL type already registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        builtin::register_builtins(&mut registry);
        registry
    }

    pub fn empty() -> Self {
        Self {
            types: SlotMap::with_key(),
            conversions: SlotMap::with_key(),
            by_host: FxHashMap::default(),
            in_progress: Vec::new(),
        }
    }

    pub fn specify_type(&mut self, spec: GlTypeSpec) -> GlTypeKey {
        self.types.insert(spec)
    }

    /// Registers how `host` converts; a later registration for the same host type replaces the lookup.
    pub fn register_conversion(&mut self, host: &TypeInfo, spec: ConversionSpec) -> ConversionKey {
        let key = self.conversions.insert(spec);
        self.by_host.insert(host.id(), key);
        key
    }

    /// The conversion for `host`, registering it automatically on first use.
    pub fn get_conversion(&mut self, host: &TypeInfo) -> Result<ConversionKey, SpecificationError> {
        if let Some(key) = self.by_host.get(&host.id()) {
            return Ok(*key);
        }

        if self.in_progress.contains(host) {
            return Err(SpecificationError::RecursiveType {
                type_name: host.short_name(),
            });
        }

        self.in_progress.push(*host);
        let result = self.register_type_auto(host);
        self.in_progress.pop();

        if let Ok(key) = result {
            log::debug!("registered GPU conversion for {:?}", host);
            self.by_host.insert(host.id(), key);
        }

        result
    }

    pub fn lookup(&self, host: &TypeInfo) -> Option<&ConversionSpec> {
        self.by_host.get(&host.id()).map(|k| &self.conversions[*k])
    }

    pub fn gl_type_of(&self, host: &TypeInfo) -> Option<&GlTypeSpec> {
        self.lookup(host).map(|c| &self.types[c.gl_type])
    }

    pub fn gl_type(&self, key: GlTypeKey) -> &GlTypeSpec {
        &self.types[key]
    }

    pub fn conversion(&self, key: ConversionKey) -> &ConversionSpec {
        &self.conversions[key]
    }

    fn gl_type_key(&mut self, host: &TypeInfo) -> Result<GlTypeKey, SpecificationError> {
        let key = self.get_conversion(host)?;
        Ok(self.conversions[key].gl_type)
    }

    fn register_type_auto(&mut self, host: &TypeInfo) -> Result<ConversionKey, SpecificationError> {
        match host.meta() {
            TypeMeta::Buffer(meta) => self.register_buffer(host, &meta),
            TypeMeta::Struct(fields) => self.register_struct_fields(host, &fields),
            TypeMeta::StructLayout(layout) => self.register_struct_layout(host, &layout),
            TypeMeta::Opaque => Err(SpecificationError::Unsupported {
                type_name: host.short_name(),
            }),
        }
    }

    fn register_buffer(&mut self, host: &TypeInfo, meta: &BufferMeta) -> Result<ConversionKey, SpecificationError> {
        let mismatch = |detail: String| SpecificationError::LayoutMismatch {
            type_name: host.short_name(),
            detail,
        };

        let mut spec = GlTypeSpec::default();
        let mut gpu_header_size = 0;

        if let Some(header) = &meta.header {
            let header_key = self.gl_type_key(header)?;
            let header_spec = &self.types[header_key];

            if !header_spec.struct_body.is_empty() {
                spec.struct_body.push_str(&header_spec.struct_body);
            } else if !header_spec.value_type_name.is_empty() {
                writeln!(spec.struct_body, "\t{} header;", header_spec.value_type_name).ok();
            } else {
                return Err(mismatch(format!("header {:?} has neither a body nor a GLSL name", header)));
            }

            if header_spec.layout.std140_size != header.size() {
                return Err(mismatch(format!(
                    "header is {} bytes on the GPU and {} bytes on the host",
                    header_spec.layout.std140_size,
                    header.size()
                )));
            }

            gpu_header_size = header_spec.layout.std140_size;
            spec.layout.std140_alignment = header_spec.layout.std140_alignment;
            spec.member_dependencies.push(header_key);
        }

        spec.layout.std140_size = gpu_header_size;

        if let Some(element) = &meta.element {
            let element_key = self.gl_type_key(element)?;
            let element_layout = self.types[element_key].layout;
            let element_alignment = element_layout.std140_alignment.max(1);

            spec.flexible_member = Some(FlexibleMemberSpec {
                element: element_key,
                member_name: if meta.header.is_some() {
                    String::from("elements")
                } else {
                    String::new()
                },
                max_elements: u32::MAX,
            });

            spec.layout.std140_alignment = spec.layout.std140_alignment.max(element_alignment);
            spec.layout.std140_size = gpu_header_size.next_multiple_of(element_alignment);

            if spec.layout.std140_size != meta.host_first_element_offset() {
                return Err(mismatch(format!(
                    "elements start at byte {} on the GPU and byte {} on the host",
                    spec.layout.std140_size,
                    meta.host_first_element_offset()
                )));
            }

            if element_layout.array_stride() != element.size() {
                return Err(mismatch(format!(
                    "element stride is {} bytes on the GPU and {} bytes on the host",
                    element_layout.array_stride(),
                    element.size()
                )));
            }

            spec.member_dependencies.push(element_key);
        }

        let gl_type = self.specify_type(spec);
        let handle = meta.handle;

        let mut conversion = ConversionSpec::new(gl_type);
        conversion.set_ssbo_binding = Some(Arc::new(move |device, index, value| {
            let buffer = handle(value).ok_or_else(|| type_mismatch::<SharedBufferHandle>(value))?;
            if !buffer.synchronized {
                return Err(SetterError::Unsynchronized);
            }

            device.bind_buffer_base(BufferTarget::ShaderStorage, index, buffer.gpu_buffer);
            Ok(())
        }));

        Ok(self.conversions.insert(conversion))
    }

    fn register_struct_fields(
        &mut self,
        host: &TypeInfo,
        fields: &[StructField],
    ) -> Result<ConversionKey, SpecificationError> {
        let mut body = String::new();
        let mut dependencies = Vec::new();
        let mut offset: usize = 0;
        let mut alignment = 1;

        for field in fields {
            let key = self.gl_type_key(&field.type_info)?;
            let member = &self.types[key];

            if member.value_type_name.is_empty() || member.flexible_member.is_some() {
                return Err(SpecificationError::UnnamedType {
                    what: "struct member",
                    property: StringId::new(field.name),
                    type_name: field.type_info.short_name(),
                });
            }

            offset = offset.next_multiple_of(member.layout.std140_alignment.max(1));
            offset += member.layout.std140_size;
            alignment = alignment.max(member.layout.std140_alignment);

            writeln!(body, "\t{} {};", member.value_type_name, field.name).ok();
            if !dependencies.contains(&key) {
                dependencies.push(key);
            }
        }

        // std140 rounds struct alignment up to that of a vec4
        let alignment = alignment.next_multiple_of(16);
        let layout = StructLayout {
            body: body.into(),
            std140_size: offset.next_multiple_of(alignment),
            std140_alignment: alignment,
            dependencies: Vec::new(),
        };

        self.register_struct(host, &layout, dependencies)
    }

    fn register_struct_layout(
        &mut self,
        host: &TypeInfo,
        layout: &StructLayout,
    ) -> Result<ConversionKey, SpecificationError> {
        let mut dependencies = Vec::new();
        for dependency in &layout.dependencies {
            let key = self.gl_type_key(dependency)?;
            if !dependencies.contains(&key) {
                dependencies.push(key);
            }
        }

        self.register_struct(host, layout, dependencies)
    }

    fn register_struct(
        &mut self,
        host: &TypeInfo,
        layout: &StructLayout,
        dependencies: Vec<GlTypeKey>,
    ) -> Result<ConversionKey, SpecificationError> {
        if layout.std140_size != host.size() {
            return Err(SpecificationError::LayoutMismatch {
                type_name: host.short_name(),
                detail: format!(
                    "{} bytes in std140 layout, {} bytes on the host",
                    layout.std140_size,
                    host.size()
                ),
            });
        }

        let gl_type = self.specify_type(GlTypeSpec {
            value_type_name: convert_to_glsl_type_name(&host.short_name()),
            opaque_type_name: String::new(),
            struct_body: layout.body.to_string(),
            layout: GlLayoutSpec {
                std140_size: layout.std140_size,
                std140_alignment: layout.std140_alignment,
                index_size: 0,
            },
            flexible_member: None,
            member_dependencies: dependencies,
        });

        Ok(self.conversions.insert(ConversionSpec::new(gl_type)))
    }
}

impl TypeNames for TypeRegistry {
    fn value_type_name(&self, ty: &TypeInfo) -> Option<&str> {
        self.gl_type_of(ty).map(|t| t.value_type_name.as_str())
    }

    fn opaque_type_name(&self, ty: &TypeInfo) -> Option<&str> {
        self.gl_type_of(ty).map(|t| t.opaque_type_name.as_str())
    }
}
