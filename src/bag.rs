use crate::component::{downcast, Component, ComponentRef};
use crate::error::{ComponentError, Result};
use crate::key::TypeKey;
use crate::registry::Registry;
use crate::repr::debug_container;
use crate::state::MultiBagState;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A container holding any number of components per type.
///
/// Every component is indexed under each type in its ancestor chain, so a
/// `Circle` declared as extending `AreaOfEffect` is found under `Circle`,
/// `AreaOfEffect` and [`TypeKey::root`]. Each sequence keeps insertion order,
/// and the root sequence holds every component.
///
/// # Examples
///
/// ```
/// use sovran_ec::{MultiBag, Registry, TypeKey};
/// use std::rc::Rc;
///
/// let registry = Rc::new(Registry::new());
/// let mut bag = MultiBag::new(&registry);
/// bag.add(50).add("fire").add("damage");
/// bag.remove(&"damage")?;
/// bag.add("effect");
///
/// assert_eq!(format!("{:?}", bag), r#"MultiBag([50, "fire", "effect"])"#);
/// assert_eq!(bag.get(TypeKey::of::<&'static str>()).len(), 2);
/// # Ok::<(), sovran_ec::ComponentError>(())
/// ```
pub struct MultiBag {
    registry: Rc<Registry>,
    slots: IndexMap<TypeKey, Vec<ComponentRef>>,
    attributes: Map<String, Value>,
}

impl MultiBag {
    /// Creates a new, empty bag
    pub fn new(registry: &Rc<Registry>) -> Self {
        Self {
            registry: Rc::clone(registry),
            slots: IndexMap::new(),
            attributes: Map::new(),
        }
    }

    /// Creates a bag and adds `components` in order
    pub fn from_components<I>(registry: &Rc<Registry>, components: I) -> Self
    where
        I: IntoIterator<Item = ComponentRef>,
    {
        let mut bag = Self::new(registry);
        bag.extend(components);
        bag
    }

    /// The registry supplying ancestor chains
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    /// Extra fields persisted alongside the components
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Mutable access to the extra persisted fields
    pub fn attributes_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.attributes
    }

    pub fn add<T: Component>(&mut self, component: T) -> &mut Self {
        self.add_ref(Rc::new(component))
    }

    /// Append `component` to the sequence of every type in its ancestor chain
    pub fn add_ref(&mut self, component: ComponentRef) -> &mut Self {
        for key in self.registry.mro(component.type_key()) {
            self.slots
                .entry(key)
                .or_default()
                .push(Rc::clone(&component));
        }
        self
    }

    pub fn extend<I>(&mut self, components: I) -> &mut Self
    where
        I: IntoIterator<Item = ComponentRef>,
    {
        for component in components {
            self.add_ref(component);
        }
        self
    }

    /// Remove the first entry equal to `component` from every sequence indexing it.
    ///
    /// The entry is located in the root sequence, then dropped from each key
    /// it was added under. Sequences left empty are dropped along with their key.
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::ValueNotFound` if no equal component is stored.
    /// The bag is unchanged in that case.
    pub fn remove(&mut self, component: &dyn Component) -> Result<()> {
        let stored = self
            .components()
            .iter()
            .find(|entry| entry.dyn_eq(component))
            .cloned()
            .ok_or_else(|| ComponentError::ValueNotFound {
                key: component.type_key(),
                value: format!("{:?}", component),
            })?;

        self.slots.retain(|_, seq| {
            if let Some(index) = seq.iter().position(|entry| Rc::ptr_eq(entry, &stored)) {
                seq.remove(index);
            }
            !seq.is_empty()
        });
        Ok(())
    }

    /// Remove every component
    pub fn clear(&mut self) -> Result<()> {
        for component in self.get(TypeKey::root()).to_vec() {
            self.remove(&*component)?;
        }
        Ok(())
    }

    /// The components indexed under `key`, in insertion order. Empty if none.
    pub fn get(&self, key: TypeKey) -> &[ComponentRef] {
        self.slots.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Typed handles to the components under `T`'s key whose concrete type is `T`
    pub fn get_as<T: Any>(&self) -> Vec<Rc<T>> {
        self.get(TypeKey::of::<T>())
            .iter()
            .filter_map(downcast::<T>)
            .collect()
    }

    /// Remove everything under `key`, then add each of `values`.
    ///
    /// Removal cascades to each removed component's other ancestor keys.
    pub fn replace<I>(&mut self, key: TypeKey, values: I) -> Result<()>
    where
        I: IntoIterator<Item = ComponentRef>,
    {
        self.delete(key)?;
        self.extend(values);
        Ok(())
    }

    /// Remove every component indexed under `key`. Does nothing if `key` is absent.
    pub fn delete(&mut self, key: TypeKey) -> Result<()> {
        for component in self.get(key).to_vec() {
            self.remove(&*component)?;
        }
        Ok(())
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        self.slots.contains_key(&key)
    }

    pub fn contains_all<I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = TypeKey>,
    {
        keys.into_iter().all(|key| self.contains(key))
    }

    /// Every component, in insertion order
    pub fn components(&self) -> &[ComponentRef] {
        self.get(TypeKey::root())
    }

    /// Number of keys with at least one component
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.slots.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeKey, &[ComponentRef])> {
        self.slots.iter().map(|(key, seq)| (*key, seq.as_slice()))
    }

    /// Capture the root sequence and extra fields; ancestor indexes are rebuilt on restore
    pub fn capture_state(&self) -> Result<MultiBagState> {
        let components = self
            .components()
            .iter()
            .map(|component| self.registry.encode(&**component))
            .collect::<Result<Vec<_>>>()?;
        Ok(MultiBagState {
            components,
            attributes: self.attributes.clone(),
        })
    }

    pub fn restore_state(registry: &Rc<Registry>, state: MultiBagState) -> Result<Self> {
        let components = state
            .components
            .into_iter()
            .map(|component| registry.decode(component))
            .collect::<Result<Vec<_>>>()?;
        let mut bag = Self::from_components(registry, components);
        bag.attributes = state.attributes;
        Ok(bag)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.capture_state()?)?)
    }

    pub fn from_json(registry: &Rc<Registry>, json: &str) -> Result<Self> {
        let state: MultiBagState = serde_json::from_str(json)?;
        Self::restore_state(registry, state)
    }
}

impl fmt::Debug for MultiBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_container(self, f, "MultiBag", self.components())
    }
}
