use crate::{HostType, StringId, TypeInfo};
use rustc_hash::FxHashMap;
use std::{
    any::Any,
    fmt::{self, Debug},
    sync::Arc,
};

/// A type-erased host value, cheap to clone.
#[derive(Clone)]
pub struct Value {
    data: Arc<dyn Any + Send + Sync>,
    type_info: TypeInfo,
}

impl Value {
    pub fn new<T: HostType>(value: T) -> Self {
        Self {
            data: Arc::new(value),
            type_info: TypeInfo::of::<T>(),
        }
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?})", self.type_info)
    }
}

/// Something that can supply property values by name: the render environment, a material...
pub trait PropertySource {
    fn property(&self, name: StringId) -> Option<&Value>;
}

#[derive(Clone, Debug, Default)]
pub struct PropertyMap {
    values: FxHashMap<StringId, Value>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: HostType>(&mut self, name: impl Into<StringId>, value: T) -> &mut Self {
        self.values.insert(name.into(), Value::new(value));
        self
    }

    pub fn insert_value(&mut self, name: impl Into<StringId>, value: Value) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn remove(&mut self, name: impl Into<StringId>) -> Option<Value> {
        self.values.remove(&name.into())
    }

    pub fn get(&self, name: impl Into<StringId>) -> Option<&Value> {
        self.values.get(&name.into())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PropertySource for PropertyMap {
    fn property(&self, name: StringId) -> Option<&Value> {
        self.values.get(&name)
    }
}
