use crate::component::ComponentRef;
use crate::error::BoxError;
use crate::key::TypeKey;
use crate::unique::UniqueMap;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ObserverResult = Result<(), BoxError>;

type LocalFn = dyn Fn(&UniqueMap, Option<&ComponentRef>, Option<&ComponentRef>) -> ObserverResult;
type GlobalFn =
    dyn Fn(&UniqueMap, TypeKey, Option<&ComponentRef>, Option<&ComponentRef>) -> ObserverResult;

/// A callback attached to one key of a [`UniqueMap`].
///
/// Called as `(map, new_value, old_value)` after the slot has been updated.
/// `new_value` is `None` on delete, `old_value` is `None` on first assignment.
///
/// Only named observers registered with
/// [`Registry::register_observer`](crate::Registry::register_observer) survive
/// persistence.
#[derive(Clone)]
pub struct Observer {
    name: Option<Rc<str>>,
    callback: Rc<LocalFn>,
}

impl Observer {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&UniqueMap, Option<&ComponentRef>, Option<&ComponentRef>) -> ObserverResult + 'static,
    {
        Self {
            name: None,
            callback: Rc::new(callback),
        }
    }

    pub fn named<F>(name: &str, callback: F) -> Self
    where
        F: Fn(&UniqueMap, Option<&ComponentRef>, Option<&ComponentRef>) -> ObserverResult + 'static,
    {
        Self {
            name: Some(Rc::from(name)),
            callback: Rc::new(callback),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True if both handles share the same callback
    pub fn ptr_eq(&self, other: &Observer) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }

    pub(crate) fn call(
        &self,
        map: &UniqueMap,
        new_value: Option<&ComponentRef>,
        old_value: Option<&ComponentRef>,
    ) -> ObserverResult {
        (self.callback)(map, new_value, old_value)
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Observer({})", name),
            None => f.write_str("Observer(<anonymous>)"),
        }
    }
}

/// Per-key local observers. Shared by reference: every map built from the
/// same table sees the same lists.
pub type ObserverTable = Rc<RefCell<IndexMap<TypeKey, Vec<Observer>>>>;

pub fn observer_table() -> ObserverTable {
    Rc::new(RefCell::new(IndexMap::new()))
}

/// A callback invoked for every mutation of every map sharing a registry.
///
/// Called as `(map, key, new_value, old_value)`, before any local observer.
#[derive(Clone)]
pub struct GlobalObserver(Rc<GlobalFn>);

impl GlobalObserver {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&UniqueMap, TypeKey, Option<&ComponentRef>, Option<&ComponentRef>) -> ObserverResult
            + 'static,
    {
        Self(Rc::new(callback))
    }

    pub fn ptr_eq(&self, other: &GlobalObserver) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn call(
        &self,
        map: &UniqueMap,
        key: TypeKey,
        new_value: Option<&ComponentRef>,
        old_value: Option<&ComponentRef>,
    ) -> ObserverResult {
        (self.0)(map, key, new_value, old_value)
    }
}

impl fmt::Debug for GlobalObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GlobalObserver")
    }
}
