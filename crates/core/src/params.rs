use crate::{HostType, StringId, TypeInfo};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    sync::Arc,
};

/// A named, typed property.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamSpec {
    pub name: StringId,
    pub type_info: TypeInfo,
}

impl ParamSpec {
    pub fn new<T: HostType>(name: impl Into<StringId>) -> Self {
        Self {
            name: name.into(),
            type_info: TypeInfo::of::<T>(),
        }
    }

    pub fn with_type(name: impl Into<StringId>, type_info: TypeInfo) -> Self {
        Self {
            name: name.into(),
            type_info,
        }
    }

    /// A void token: carries no data, only orders tasks.
    pub fn token(name: impl Into<StringId>) -> Self {
        Self::with_type(name, TypeInfo::void())
    }

    pub fn renamed(&self, name: StringId) -> Self {
        Self {
            name,
            type_info: self.type_info,
        }
    }
}

impl Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.name, self.type_info)
    }
}

/// Ordered list of property specs, unique by name.
///
/// Equality and hashing are order sensitive.
#[derive(Clone, Default)]
pub struct ParamList {
    specs: Vec<ParamSpec>,
    index: FxHashMap<StringId, usize>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `spec` unless a spec with the same name is already present.
    pub fn insert_back(&mut self, spec: ParamSpec) -> bool {
        if self.index.contains_key(&spec.name) {
            return false;
        }

        self.index.insert(spec.name, self.specs.len());
        self.specs.push(spec);
        true
    }

    pub fn merge(&mut self, other: &ParamList) {
        for spec in other.iter() {
            self.insert_back(*spec);
        }
    }

    pub fn remove(&mut self, name: StringId) -> Option<ParamSpec> {
        let position = self.index.remove(&name)?;
        let spec = self.specs.remove(position);
        for index in self.index.values_mut() {
            if *index > position {
                *index -= 1;
            }
        }
        Some(spec)
    }

    pub fn contains(&self, name: StringId) -> bool {
        self.index.contains_key(&name)
    }

    pub fn get(&self, name: StringId) -> Option<&ParamSpec> {
        self.index.get(&name).map(|&i| &self.specs[i])
    }

    pub fn position(&self, name: StringId) -> Option<usize> {
        self.index.get(&name).copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParamSpec> {
        self.specs.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = StringId> + '_ {
        self.specs.iter().map(|s| s.name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl PartialEq for ParamList {
    fn eq(&self, other: &Self) -> bool {
        self.specs == other.specs
    }
}

impl Eq for ParamList {}

impl Hash for ParamList {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.specs.hash(state);
    }
}

impl Debug for ParamList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.specs.iter()).finish()
    }
}

impl FromIterator<ParamSpec> for ParamList {
    fn from_iter<I: IntoIterator<Item = ParamSpec>>(iter: I) -> Self {
        let mut list = ParamList::new();
        list.extend(iter);
        list
    }
}

impl Extend<ParamSpec> for ParamList {
    fn extend<I: IntoIterator<Item = ParamSpec>>(&mut self, iter: I) {
        for spec in iter {
            self.insert_back(spec);
        }
    }
}

impl<'a> IntoIterator for &'a ParamList {
    type Item = &'a ParamSpec;
    type IntoIter = std::slice::Iter<'a, ParamSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

/// Layered property name remapping.
///
/// A name is looked up in the own layer first, then in each parent layer in order.
/// Resolution restarts from the top with the result until a name has no mapping;
/// a cycle stops at the last name not seen before.
#[derive(Clone, Default)]
pub struct ParamAliases {
    parents: Vec<Arc<ParamAliases>>,
    own: FxHashMap<StringId, StringId>,
}

impl ParamAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<StringId>,
        V: Into<StringId>,
    {
        Self::layered(Vec::new(), pairs)
    }

    pub fn layered<I, K, V>(parents: Vec<Arc<ParamAliases>>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<StringId>,
        V: Into<StringId>,
    {
        Self {
            parents,
            own: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn direct_choice(&self, name: StringId) -> Option<StringId> {
        if let Some(choice) = self.own.get(&name) {
            return Some(*choice);
        }

        self.parents.iter().find_map(|p| p.direct_choice(name))
    }

    pub fn choice_for(&self, name: StringId) -> StringId {
        let mut current = name;
        let mut seen = FxHashSet::default();
        seen.insert(current);

        while let Some(next) = self.direct_choice(current) {
            if !seen.insert(next) {
                break;
            }
            current = next;
        }

        current
    }

    pub fn choice_string_for(&self, name: &str) -> &'static str {
        self.choice_for(StringId::new(name)).as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_empty() && self.parents.iter().all(|p| p.is_empty())
    }

    /// A stable hash of the whole layer stack.
    pub fn hash_code(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn sorted_own(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs: Vec<_> = self.own.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        pairs.sort_unstable();
        pairs
    }
}

impl PartialEq for ParamAliases {
    fn eq(&self, other: &Self) -> bool {
        self.own == other.own
            && self.parents.len() == other.parents.len()
            && self
                .parents
                .iter()
                .zip(other.parents.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl Eq for ParamAliases {}

impl Hash for ParamAliases {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parents.len().hash(state);
        for parent in &self.parents {
            parent.hash(state);
        }
        self.sorted_own().hash(state);
    }
}

impl Debug for ParamAliases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamAliases")
            .field("own", &self.sorted_own())
            .field("parents", &self.parents)
            .finish()
    }
}
