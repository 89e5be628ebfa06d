use lasso::{Spur, ThreadedRodeo};
use std::{
    fmt::{self, Debug, Display},
    sync::LazyLock,
};

static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// An interned property or variable name.
///
/// Comparing and hashing a `StringId` never touches the string itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(Spur);

impl StringId {
    pub fn new(name: &str) -> Self {
        Self(INTERNER.get_or_intern(name))
    }

    pub fn as_str(&self) -> &'static str {
        INTERNER.resolve(&self.0)
    }
}

impl From<&str> for StringId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&String> for StringId {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl From<String> for StringId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl PartialEq<str> for StringId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for StringId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Debug for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
