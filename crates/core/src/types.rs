use crate::BufferMeta;
use std::{
    any::{Any, TypeId, type_name},
    borrow::Cow,
    fmt::{self, Debug},
    hash::{Hash, Hasher},
};

/// A type that can be stored in a [`Value`](crate::Value) and handed to the GPU.
///
/// Most types only need an empty implementation. Aggregates and GPU buffers describe
/// their layout through [`HostType::type_meta`]; `#[derive(GlslStruct)]` writes that for you.
pub trait HostType: Any + Send + Sync {
    fn type_meta() -> TypeMeta {
        TypeMeta::Opaque
    }
}

/// Extra layout information a host type reports about itself.
#[derive(Clone, Debug)]
pub enum TypeMeta {
    /// Nothing beyond the type identity; conversions must be registered explicitly.
    Opaque,
    /// An aggregate described field by field. The GLSL body and std140 layout are derived
    /// from the member types.
    Struct(Vec<StructField>),
    /// An aggregate with a hand-written GLSL body and std140 layout.
    StructLayout(StructLayout),
    /// A GPU buffer with an optional header and an optional flexible element array.
    Buffer(BufferMeta),
}

#[derive(Clone, Debug)]
pub struct StructField {
    pub name: &'static str,
    pub type_info: TypeInfo,
}

impl StructField {
    pub fn new<T: HostType>(name: &'static str) -> Self {
        Self {
            name,
            type_info: TypeInfo::of::<T>(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StructLayout {
    pub body: Cow<'static, str>,
    pub std140_size: usize,
    pub std140_alignment: usize,
    pub dependencies: Vec<TypeInfo>,
}

/// Descriptor of a host type: identity, names, host size/alignment and lazily computed [`TypeMeta`].
///
/// Two descriptors are equal iff they describe the same Rust type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    size: usize,
    align: usize,
    meta: fn() -> TypeMeta,
}

impl TypeInfo {
    pub fn of<T: HostType>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            meta: T::type_meta,
        }
    }

    /// The void token type. Properties of this type carry no data and only order tasks.
    pub fn void() -> Self {
        Self::of::<()>()
    }

    pub fn is_void(&self) -> bool {
        self.id == TypeId::of::<()>()
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with every module path stripped, e.g. `BufferPtr<Header, f32>`.
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn meta(&self) -> TypeMeta {
        (self.meta)()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

fn short_type_name(full: &str) -> String {
    fn push_last_segment(out: &mut String, token: &str) {
        out.push_str(token.rsplit("::").next().unwrap_or(token));
    }

    let mut out = String::with_capacity(full.len());
    let mut token = String::new();

    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            token.push(c);
        } else {
            push_last_segment(&mut out, &token);
            token.clear();
            out.push(c);
        }
    }

    push_last_segment(&mut out, &token);
    out
}

macro_rules! impl_host_type {
    ($($t:ty),* $(,)?) => {
        $(impl HostType for $t {})*
    };
}

impl_host_type!(
    (),
    f32,
    i32,
    u32,
    bool,
    glam::Vec2,
    glam::Vec3,
    glam::Vec4,
    glam::IVec2,
    glam::IVec3,
    glam::IVec4,
    glam::UVec2,
    glam::UVec3,
    glam::UVec4,
    glam::BVec2,
    glam::BVec3,
    glam::BVec4,
    glam::Mat2,
    glam::Mat3,
    glam::Mat4,
);

/// A set of type descriptors that remembers insertion order.
#[derive(Clone, Debug, Default)]
pub struct TypeSet {
    order: Vec<TypeInfo>,
}

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ty: TypeInfo) -> bool {
        if self.order.contains(&ty) {
            false
        } else {
            self.order.push(ty);
            true
        }
    }

    pub fn contains(&self, ty: &TypeInfo) -> bool {
        self.order.contains(ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
