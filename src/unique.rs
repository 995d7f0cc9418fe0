use crate::component::{downcast, Component, ComponentRef};
use crate::error::{ComponentError, Result};
use crate::key::TypeKey;
use crate::observer::{observer_table, Observer, ObserverTable};
use crate::registry::Registry;
use crate::repr::debug_container;
use crate::state::{PersistedMap, UniqueMapState};
use indexmap::IndexMap;
use log::trace;
use serde_json::{Map, Value};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Produces a value for a key that is missing from a [`UniqueMap`]
pub type DefaultFactory = Rc<dyn Fn(TypeKey) -> Option<ComponentRef>>;

/// A container holding at most one component per type.
///
/// Each component is stored under its canonical key: its own type, or the
/// nearest abstract ancestor declared on the [`Registry`]. Every assignment
/// and deletion notifies the registry's global observers, then the local
/// observers registered for that key.
///
/// Two maps are never equal by content; compare them by address if needed.
///
/// # Examples
///
/// ```
/// use sovran_ec::{Registry, TypeKey, UniqueMap};
/// use std::rc::Rc;
///
/// #[derive(Debug, PartialEq)]
/// struct Position { x: i32, y: i32 }
/// #[derive(Debug, PartialEq)]
/// struct Name(&'static str);
///
/// let registry = Rc::new(Registry::new());
/// let mut entity = UniqueMap::new(&registry);
/// entity.set(Position { x: 1, y: 2 })?.set(Name("orc"))?;
///
/// assert!(entity.contains(TypeKey::of::<Position>())?);
/// let position = entity.get_as::<Position>()?.unwrap();
/// assert_eq!(position.x, 1);
///
/// entity.set(Position { x: 5, y: 2 })?;
/// assert_eq!(entity.len(), 2);
/// assert_eq!(format!("{:?}", entity), "UniqueMap([Position { x: 5, y: 2 }, Name(\"orc\")])");
/// # Ok::<(), sovran_ec::ComponentError>(())
/// ```
pub struct UniqueMap {
    registry: Rc<Registry>,
    slots: IndexMap<TypeKey, ComponentRef>,
    observers: ObserverTable,
    default_factory: Option<DefaultFactory>,
    attributes: Map<String, Value>,
}

impl UniqueMap {
    /// Creates a new, empty map with its own observer table
    pub fn new(registry: &Rc<Registry>) -> Self {
        Self::with_observers(registry, observer_table())
    }

    /// Creates a new, empty map that shares `observers` with whoever else holds it
    pub fn with_observers(registry: &Rc<Registry>, observers: ObserverTable) -> Self {
        Self {
            registry: Rc::clone(registry),
            slots: IndexMap::new(),
            observers,
            default_factory: None,
            attributes: Map::new(),
        }
    }

    /// Creates a map and assigns `components` in order.
    ///
    /// Later components with the same key replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns any error raised by an observer during assignment.
    pub fn from_components<I>(registry: &Rc<Registry>, components: I) -> Result<Self>
    where
        I: IntoIterator<Item = ComponentRef>,
    {
        let mut map = Self::new(registry);
        map.extend(components)?;
        Ok(map)
    }

    /// Install a factory consulted by [`require`](Self::require) on a miss.
    ///
    /// A value returned by the factory is stored (observers fire) before
    /// being handed back.
    pub fn with_default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(TypeKey) -> Option<ComponentRef> + 'static,
    {
        self.default_factory = Some(Rc::new(factory));
        self
    }

    /// The registry this map resolves keys against
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    /// The local observer table, possibly shared with other maps
    pub fn observers(&self) -> &ObserverTable {
        &self.observers
    }

    /// Append a local observer for `key`
    pub fn observe(&self, key: TypeKey, observer: Observer) {
        self.observers
            .borrow_mut()
            .entry(key)
            .or_default()
            .push(observer);
    }

    /// Extra fields persisted alongside the components
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Mutable access to the extra persisted fields
    pub fn attributes_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.attributes
    }

    /// Returns the component stored under `key`, if any
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::InvalidKey` if `key` names a subtype of an
    /// abstract component and key validation is enabled.
    pub fn get(&self, key: TypeKey) -> Result<Option<&ComponentRef>> {
        self.registry.check_key(key)?;
        Ok(self.slots.get(&key))
    }

    /// Returns a typed handle to the component stored under `T`'s own key.
    ///
    /// Returns `None` if nothing is stored there or the stored value is a
    /// different concrete type (a subtype stored under an abstract `T`).
    pub fn get_as<T: Any>(&self) -> Result<Option<Rc<T>>> {
        Ok(self.get(TypeKey::of::<T>())?.and_then(downcast::<T>))
    }

    /// Returns the component stored under `key`, falling back to the default factory
    ///
    /// # Errors
    ///
    /// - Returns `ComponentError::MissingKey` if nothing is stored and no factory produced a value
    /// - Returns `ComponentError::InvalidKey` for a non-canonical key when validation is enabled
    /// - Returns `ComponentError::KeyMismatch` if the factory produced a value for another key
    pub fn require(&mut self, key: TypeKey) -> Result<ComponentRef> {
        if let Some(value) = self.get(key)? {
            return Ok(Rc::clone(value));
        }
        let produced = match &self.default_factory {
            Some(factory) => (**factory)(key),
            None => None,
        };
        match produced {
            Some(value) => {
                self.insert(key, Rc::clone(&value))?;
                Ok(value)
            }
            None => Err(ComponentError::MissingKey(key)),
        }
    }

    /// Stores `value` under `key`, replacing any previous component.
    ///
    /// Observers run after the slot is updated: the registry's global
    /// observers first, then the local observers for `key`, in registration
    /// order.
    ///
    /// # Errors
    ///
    /// - Returns `ComponentError::KeyMismatch` if `key` is not the canonical key of `value`; the map is unchanged
    /// - Returns `ComponentError::Observer` if an observer fails; the value stays stored
    ///   and later observers are not called
    pub fn insert(&mut self, key: TypeKey, value: ComponentRef) -> Result<()> {
        let expected = self.registry.resolve(&*value);
        if expected != key {
            return Err(ComponentError::KeyMismatch {
                key,
                expected,
                value: format!("{:?}", value),
            });
        }
        let old = self.slots.insert(key, Rc::clone(&value));
        self.notify(key, Some(&value), old.as_ref())
    }

    /// Removes and returns the component stored under `key`
    ///
    /// # Errors
    ///
    /// - Returns `ComponentError::MissingKey` if nothing is stored under `key`
    /// - Returns `ComponentError::Observer` if an observer fails; the slot stays removed
    pub fn remove(&mut self, key: TypeKey) -> Result<ComponentRef> {
        let old = self
            .slots
            .shift_remove(&key)
            .ok_or(ComponentError::MissingKey(key))?;
        self.notify(key, None, Some(&old))?;
        Ok(old)
    }

    pub fn contains(&self, key: TypeKey) -> Result<bool> {
        self.registry.check_key(key)?;
        Ok(self.slots.contains_key(&key))
    }

    /// True if every key has a component. Every key is validated.
    pub fn contains_all<I>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = TypeKey>,
    {
        let mut all = true;
        for key in keys {
            self.registry.check_key(key)?;
            all &= self.slots.contains_key(&key);
        }
        Ok(all)
    }

    /// Assign a component under its canonical key
    pub fn set<T: Component>(&mut self, component: T) -> Result<&mut Self> {
        self.set_ref(Rc::new(component))
    }

    /// Assign a shared component under its canonical key
    pub fn set_ref(&mut self, component: ComponentRef) -> Result<&mut Self> {
        let key = self.registry.resolve(&*component);
        self.insert(key, component)?;
        Ok(self)
    }

    /// Assign each component in order
    pub fn extend<I>(&mut self, components: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = ComponentRef>,
    {
        for component in components {
            self.set_ref(component)?;
        }
        Ok(self)
    }

    /// Remove every component one by one, notifying observers for each
    pub fn clear(&mut self) -> Result<()> {
        while let Some(key) = self.slots.keys().next().copied() {
            self.remove(key)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.slots.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &ComponentRef> {
        self.slots.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeKey, &ComponentRef)> {
        self.slots.iter().map(|(key, value)| (*key, value))
    }

    fn notify(
        &self,
        key: TypeKey,
        new_value: Option<&ComponentRef>,
        old_value: Option<&ComponentRef>,
    ) -> Result<()> {
        let globals = self.registry.global_observers();
        let locals = self
            .observers
            .borrow()
            .get(&key)
            .cloned()
            .unwrap_or_default();
        trace!(
            "notifying {} global and {} local observers of {}",
            globals.len(),
            locals.len(),
            key
        );
        for observer in &globals {
            observer
                .call(self, key, new_value, old_value)
                .map_err(ComponentError::Observer)?;
        }
        for observer in &locals {
            observer
                .call(self, new_value, old_value)
                .map_err(ComponentError::Observer)?;
        }
        Ok(())
    }

    /// Capture the components, named observers and extra fields of this map
    ///
    /// # Errors
    ///
    /// - Returns `ComponentError::UnregisteredType` for a component type without a serde codec
    /// - Returns `ComponentError::UnregisteredType` for an observed key with no persisted name
    /// - Returns `ComponentError::UnnamedObserver` for an observer created with `Observer::new`
    pub fn capture_state(&self) -> Result<UniqueMapState> {
        let components = self
            .slots
            .values()
            .map(|component| self.registry.encode(&**component))
            .collect::<Result<Vec<_>>>()?;

        let mut observers = IndexMap::new();
        for (key, list) in self.observers.borrow().iter() {
            let names = list
                .iter()
                .map(|observer| {
                    observer
                        .name()
                        .map(str::to_string)
                        .ok_or(ComponentError::UnnamedObserver(*key))
                })
                .collect::<Result<Vec<_>>>()?;
            observers.insert(self.registry.persisted_name(*key)?, names);
        }

        Ok(UniqueMapState {
            components,
            observers,
            attributes: self.attributes.clone(),
        })
    }

    /// Rebuild a map from any accepted persisted layout.
    ///
    /// Observers are attached first and the components are then assigned in
    /// order, so restoring notifies observers exactly like a live assignment.
    pub fn restore_state(registry: &Rc<Registry>, state: impl Into<PersistedMap>) -> Result<Self> {
        let state = state.into().normalize();

        let mut table = IndexMap::new();
        for (key_name, names) in &state.observers {
            let key = registry.key_by_name(key_name)?;
            let list = names
                .iter()
                .map(|name| registry.named_observer(name))
                .collect::<Result<Vec<_>>>()?;
            table.insert(key, list);
        }

        let components = state
            .components
            .into_iter()
            .map(|component| registry.decode(component))
            .collect::<Result<Vec<_>>>()?;

        let mut map = Self::with_observers(registry, Rc::new(RefCell::new(table)));
        map.attributes = state.attributes;
        map.extend(components)?;
        Ok(map)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.capture_state()?)?)
    }

    pub fn from_json(registry: &Rc<Registry>, json: &str) -> Result<Self> {
        let state: PersistedMap = serde_json::from_str(json)?;
        Self::restore_state(registry, state)
    }
}

impl fmt::Debug for UniqueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_container(self, f, "UniqueMap", self.slots.values())
    }
}
