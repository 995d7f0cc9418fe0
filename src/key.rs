use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A copyable token identifying a component type.
///
/// Two keys are equal when they name the same Rust type. The type name is
/// carried along for display and error messages only.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for the type `T`
    pub fn of<T: ?Sized + Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The universal root key that ends every ancestor chain
    pub fn root() -> Self {
        Self::of::<dyn Any>()
    }

    pub fn is_root(&self) -> bool {
        self.id == TypeId::of::<dyn Any>()
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The full path of the type, as reported by `std::any::type_name`
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// The type name with module paths stripped, e.g. `Option<String>`
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
        } else {
            out.push(c);
            if !(c.is_alphanumeric() || c == '_') {
                segment_start = out.len();
            }
        }
    }
    out
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.short_name())
    }
}
