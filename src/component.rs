use crate::key::TypeKey;
use std::any::Any;
use std::fmt::Debug;
use std::rc::Rc;

/// A value that can be attached to a container.
///
/// Implemented automatically for every `'static` type that is `Debug` and
/// `PartialEq`. Equality is used by [`MultiBag::remove`](crate::MultiBag::remove);
/// identity is `Rc::ptr_eq` on the stored [`ComponentRef`].
pub trait Component: Any + Debug {
    fn as_any(&self) -> &dyn Any;

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;

    /// The exact runtime type of this component
    fn type_key(&self) -> TypeKey;

    /// True if `other` has the same concrete type and compares equal
    fn dyn_eq(&self, other: &dyn Component) -> bool;
}

impl<T: Any + Debug + PartialEq> Component for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn dyn_eq(&self, other: &dyn Component) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }
}

/// Shared handle to a stored component
pub type ComponentRef = Rc<dyn Component>;

/// Get a typed handle to a stored component if it is of type `T`
pub fn downcast<T: Any>(component: &ComponentRef) -> Option<Rc<T>> {
    Rc::clone(component).into_any_rc().downcast::<T>().ok()
}
