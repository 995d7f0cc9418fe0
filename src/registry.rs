use crate::component::{Component, ComponentRef};
use crate::config::Config;
use crate::error::{ComponentError, Result};
use crate::key::TypeKey;
use crate::observer::{GlobalObserver, Observer, ObserverResult};
use crate::state::PersistedComponent;
use crate::unique::UniqueMap;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

type EncodeFn = fn(&dyn Component) -> Result<Value>;
type DecodeFn = fn(Value) -> Result<ComponentRef>;

#[derive(Clone, Copy)]
struct Codec {
    encode: EncodeFn,
    decode: DecodeFn,
}

struct TypeInfo {
    name: String,
    mro: Vec<TypeKey>,
    codec: Option<Codec>,
}

/// Shared type information for a family of containers.
///
/// A registry knows, for each declared component type:
///
/// - its ancestor chain, used by [`MultiBag`](crate::MultiBag) to index a
///   component under every supertype
/// - whether it is an abstract component, i.e. the storage key for itself and
///   all of its subtypes in a [`UniqueMap`]
/// - how to serialize it, for persistence
///
/// It also owns the global observer list invoked for every mutation of every
/// `UniqueMap` built on it, and the named observers used when restoring
/// persisted maps. Registrations are append-only and take effect for the
/// lifetime of the registry; they never migrate data already stored.
///
/// # Examples
///
/// ```
/// use sovran_ec::{Registry, TypeKey};
///
/// #[derive(Debug, PartialEq)]
/// struct AreaOfEffect;
/// #[derive(Debug, PartialEq)]
/// struct Circle { range: u32 }
///
/// let registry = Registry::new();
/// registry.register_abstract::<AreaOfEffect>();
/// registry.component::<Circle>().extends::<AreaOfEffect>().register()?;
///
/// assert_eq!(
///     registry.mro(TypeKey::of::<Circle>()),
///     vec![TypeKey::of::<Circle>(), TypeKey::of::<AreaOfEffect>(), TypeKey::root()]
/// );
/// assert_eq!(registry.resolve(&Circle { range: 5 }), TypeKey::of::<AreaOfEffect>());
/// # Ok::<(), sovran_ec::ComponentError>(())
/// ```
pub struct Registry {
    config: Config,
    types: RefCell<HashMap<TypeKey, TypeInfo>>,
    by_name: RefCell<HashMap<String, TypeKey>>,
    abstract_keys: RefCell<HashSet<TypeKey>>,
    named_observers: RefCell<HashMap<String, Observer>>,
    global_observers: RefCell<Vec<GlobalObserver>>,
}

impl Registry {
    /// Creates an empty registry with the default [`Config`]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty registry with the given configuration
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            types: RefCell::new(HashMap::new()),
            by_name: RefCell::new(HashMap::new()),
            abstract_keys: RefCell::new(HashSet::new()),
            named_observers: RefCell::new(HashMap::new()),
            global_observers: RefCell::new(Vec::new()),
        }
    }

    /// The configuration this registry was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start declaring the component type `T`
    pub fn component<T: Component>(&self) -> ComponentBuilder<'_, T> {
        ComponentBuilder {
            registry: self,
            name: TypeKey::of::<T>().short_name(),
            parents: Vec::new(),
            is_abstract: false,
            codec: None,
            _marker: PhantomData,
        }
    }

    /// Mark `T` as the storage key for itself and all of its declared subtypes.
    ///
    /// Idempotent. Subtypes may be declared before or after this call. A type
    /// not otherwise declared is persisted under its short type name, provided
    /// no other type already uses that name.
    pub fn register_abstract<T: Any>(&self) -> TypeKey {
        let key = TypeKey::of::<T>();
        if self.abstract_keys.borrow_mut().insert(key) {
            debug!("registered abstract component {}", key);
        }
        if !self.types.borrow().contains_key(&key) {
            let name = key.short_name();
            let mut by_name = self.by_name.borrow_mut();
            match by_name.get(&name) {
                Some(owner) if *owner != key => {
                    debug!(
                        "abstract component {} left unnamed, {:?} belongs to {}",
                        key, name, owner
                    );
                }
                Some(_) => {}
                None => {
                    by_name.insert(name, key);
                }
            }
        }
        key
    }

    /// Whether `key` was marked abstract
    pub fn is_abstract(&self, key: TypeKey) -> bool {
        self.abstract_keys.borrow().contains(&key)
    }

    /// The ancestor chain of `key`, most derived first, ending with the root key.
    pub fn mro(&self, key: TypeKey) -> Vec<TypeKey> {
        if key.is_root() {
            return vec![key];
        }
        match self.types.borrow().get(&key) {
            Some(info) => info.mro.clone(),
            None => vec![key, TypeKey::root()],
        }
    }

    /// The canonical storage key for `key`: the nearest abstract type in its
    /// ancestor chain, or `key` itself.
    pub fn resolve_key(&self, key: TypeKey) -> TypeKey {
        let abstract_keys = self.abstract_keys.borrow();
        if abstract_keys.is_empty() {
            return key;
        }
        self.mro(key)
            .into_iter()
            .find(|ancestor| abstract_keys.contains(ancestor))
            .unwrap_or(key)
    }

    /// The canonical storage key for a component value
    pub fn resolve(&self, component: &dyn Component) -> TypeKey {
        self.resolve_key(component.type_key())
    }

    /// Reject keys that name a subtype of an abstract component.
    ///
    /// Only checks when the configured [`KeyValidation`](crate::KeyValidation)
    /// is enabled for this build.
    pub fn check_key(&self, key: TypeKey) -> Result<()> {
        if !self.config.key_validation.enabled() {
            return Ok(());
        }
        let canonical = self.resolve_key(key);
        if canonical != key {
            return Err(ComponentError::InvalidKey { key, canonical });
        }
        Ok(())
    }

    /// The persisted name of `key`: its registered name, or its short type name
    pub fn name_of(&self, key: TypeKey) -> String {
        match self.types.borrow().get(&key) {
            Some(info) => info.name.clone(),
            None => key.short_name(),
        }
    }

    /// The name `key` is persisted under, if restoring that name leads back to `key`.
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::UnregisteredType` if the name is unknown or
    /// belongs to another type.
    pub fn persisted_name(&self, key: TypeKey) -> Result<String> {
        let name = self.name_of(key);
        match self.by_name.borrow().get(&name) {
            Some(owner) if *owner == key => Ok(name),
            _ => Err(ComponentError::UnregisteredType(name)),
        }
    }

    /// The type registered under the persisted `name`
    pub fn key_by_name(&self, name: &str) -> Result<TypeKey> {
        self.by_name
            .borrow()
            .get(name)
            .copied()
            .ok_or_else(|| ComponentError::UnknownType(name.to_string()))
    }

    pub(crate) fn encode(&self, component: &dyn Component) -> Result<PersistedComponent> {
        let key = component.type_key();
        let (name, codec) = {
            let types = self.types.borrow();
            let info = types
                .get(&key)
                .ok_or_else(|| ComponentError::UnregisteredType(key.short_name()))?;
            let codec = info
                .codec
                .ok_or_else(|| ComponentError::UnregisteredType(info.name.clone()))?;
            (info.name.clone(), codec)
        };
        Ok(PersistedComponent {
            type_name: name,
            value: (codec.encode)(component)?,
        })
    }

    pub(crate) fn decode(&self, persisted: PersistedComponent) -> Result<ComponentRef> {
        let key = self.key_by_name(&persisted.type_name)?;
        let codec = self
            .types
            .borrow()
            .get(&key)
            .and_then(|info| info.codec)
            .ok_or_else(|| ComponentError::UnregisteredType(persisted.type_name.clone()))?;
        (codec.decode)(persisted.value)
    }

    /// Create a named observer and make it available to restored maps.
    ///
    /// Registering the same name again replaces the earlier observer for
    /// future restores.
    pub fn register_observer<F>(&self, name: &str, callback: F) -> Observer
    where
        F: Fn(&UniqueMap, Option<&ComponentRef>, Option<&ComponentRef>) -> ObserverResult + 'static,
    {
        let observer = Observer::named(name, callback);
        self.named_observers
            .borrow_mut()
            .insert(name.to_string(), observer.clone());
        debug!("registered observer {}", name);
        observer
    }

    /// The observer registered under `name`
    pub fn named_observer(&self, name: &str) -> Result<Observer> {
        self.named_observers
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentError::UnknownObserver(name.to_string()))
    }

    /// Append an observer invoked for every mutation of every map on this registry
    pub fn add_global_observer(&self, observer: GlobalObserver) {
        self.global_observers.borrow_mut().push(observer);
    }

    /// Remove the first registration of `observer`. Returns false if it was not registered.
    pub fn remove_global_observer(&self, observer: &GlobalObserver) -> bool {
        let mut observers = self.global_observers.borrow_mut();
        match observers.iter().position(|o| o.ptr_eq(observer)) {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every global observer
    pub fn clear_global_observers(&self) {
        self.global_observers.borrow_mut().clear();
    }

    /// A snapshot of the global observers, in registration order
    pub fn global_observers(&self) -> Vec<GlobalObserver> {
        self.global_observers.borrow().clone()
    }

    fn linearize(&self, key: TypeKey, parents: &[TypeKey]) -> Result<Vec<TypeKey>> {
        let parents = if parents.is_empty() {
            vec![TypeKey::root()]
        } else {
            parents.to_vec()
        };
        let mut sequences: Vec<Vec<TypeKey>> = parents.iter().map(|p| self.mro(*p)).collect();
        sequences.push(parents);

        let mut chain = vec![key];
        loop {
            sequences.retain(|seq| !seq.is_empty());
            if sequences.is_empty() {
                return Ok(chain);
            }
            let head = sequences
                .iter()
                .map(|seq| seq[0])
                .find(|candidate| !sequences.iter().any(|seq| seq[1..].contains(candidate)))
                .ok_or(ComponentError::InconsistentHierarchy(key))?;
            if head == key {
                return Err(ComponentError::InconsistentHierarchy(key));
            }
            chain.push(head);
            for seq in sequences.iter_mut() {
                if seq[0] == head {
                    seq.remove(0);
                }
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Declares a component type on a [`Registry`].
///
/// Direct supertypes are declared with [`extends`](Self::extends); their own
/// chains must be registered first for the full ancestry to be known.
pub struct ComponentBuilder<'r, T> {
    registry: &'r Registry,
    name: String,
    parents: Vec<TypeKey>,
    is_abstract: bool,
    codec: Option<Codec>,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T: Component> ComponentBuilder<'r, T> {
    /// Set the name used in persisted state. Defaults to the short type name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declare `P` as a direct supertype of `T`
    pub fn extends<P: Any>(self) -> Self {
        self.extends_key(TypeKey::of::<P>())
    }

    /// Declare `parent` as a direct supertype of `T`
    pub fn extends_key(mut self, parent: TypeKey) -> Self {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }

    /// Also mark `T` as an abstract component
    pub fn abstract_component(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Record the declaration.
    ///
    /// Registering an already registered type again may rename it or add a
    /// codec, but its ancestor chain is fixed by the first registration.
    ///
    /// # Errors
    ///
    /// - Returns `ComponentError::InconsistentHierarchy` if the declared parents
    ///   cannot be linearized
    /// - Returns `ComponentError::HierarchyChanged` if `T` was registered before
    ///   with a different ancestor chain
    /// - Returns `ComponentError::DuplicateName` if another type already uses
    ///   the persisted name
    pub fn register(self) -> Result<TypeKey> {
        let key = TypeKey::of::<T>();
        let mro = self.registry.linearize(key, &self.parents)?;
        if let Some(info) = self.registry.types.borrow().get(&key) {
            if info.mro != mro {
                return Err(ComponentError::HierarchyChanged(key));
            }
        }
        if let Some(&owner) = self.registry.by_name.borrow().get(&self.name) {
            if owner != key {
                return Err(ComponentError::DuplicateName {
                    name: self.name,
                    owner,
                });
            }
        }
        debug!(
            "registered component {} as {:?} with ancestors {:?}",
            key, self.name, mro
        );
        let previous = self.registry.types.borrow_mut().insert(
            key,
            TypeInfo {
                name: self.name.clone(),
                mro,
                codec: self.codec,
            },
        );
        let mut by_name = self.registry.by_name.borrow_mut();
        if let Some(previous) = previous {
            if previous.name != self.name {
                by_name.remove(&previous.name);
            }
        }
        by_name.insert(self.name, key);
        drop(by_name);
        if self.is_abstract {
            self.registry.register_abstract::<T>();
        }
        Ok(key)
    }
}

impl<'r, T> ComponentBuilder<'r, T>
where
    T: Component + Serialize + DeserializeOwned,
{
    /// Make `T` persistable through serde
    pub fn serde(mut self) -> Self {
        self.codec = Some(Codec {
            encode: |component| {
                let value = component
                    .as_any()
                    .downcast_ref::<T>()
                    .ok_or_else(|| ComponentError::UnregisteredType(component.type_key().short_name()))?;
                Ok(serde_json::to_value(value)?)
            },
            decode: |value| {
                let component: T = serde_json::from_value(value)?;
                Ok(std::rc::Rc::new(component) as ComponentRef)
            },
        });
        self
    }
}
