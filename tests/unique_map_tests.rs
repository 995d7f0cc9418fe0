use sovran_ec::{
    BoxError, ComponentError, ComponentRef, Config, GlobalObserver, KeyValidation, Observer, Registry,
    TypeKey, UniqueMap,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug, PartialEq)]
struct Base;

#[derive(Debug, PartialEq)]
struct Derived;

#[derive(Debug, PartialEq)]
struct Foo;

#[derive(Debug, PartialEq)]
struct Missing;

#[derive(Debug, PartialEq)]
struct Level(u32);

fn registry_with(config: Config) -> Rc<Registry> {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = Registry::with_config(config);
    registry.register_abstract::<Base>();
    registry
        .component::<Derived>()
        .extends::<Base>()
        .register()
        .unwrap();
    Rc::new(registry)
}

fn registry() -> Rc<Registry> {
    registry_with(Config::default())
}

fn key<T: 'static>() -> TypeKey {
    TypeKey::of::<T>()
}

#[test]
fn test_construct_from_components() -> Result<(), ComponentError> {
    let derived: ComponentRef = Rc::new(Derived);
    let foo: ComponentRef = Rc::new(Foo);
    let entity = UniqueMap::from_components(&registry(), [Rc::clone(&derived), Rc::clone(&foo)])?;

    assert!(entity.contains(key::<Base>())?);
    assert!(entity.contains(key::<Foo>())?);
    assert_eq!(entity.keys().collect::<Vec<_>>(), vec![key::<Base>(), key::<Foo>()]);
    assert_eq!(format!("{:?}", entity), "UniqueMap([Derived, Foo])");
    assert!(Rc::ptr_eq(entity.get(key::<Base>())?.unwrap(), &derived));
    assert!(Rc::ptr_eq(entity.get(key::<Foo>())?.unwrap(), &foo));
    assert_eq!(entity.len(), 2);
    Ok(())
}

#[test]
fn test_missing_key() -> Result<(), ComponentError> {
    let mut entity = UniqueMap::new(&registry());
    entity.set(Foo)?;

    // Lookup without a fallback
    assert!(entity.get(key::<Missing>())?.is_none());
    match entity.require(key::<Missing>()) {
        Err(ComponentError::MissingKey(k)) => assert_eq!(k, key::<Missing>()),
        other => panic!("expected a missing key error, got {:?}", other),
    }

    // Deleting an absent key fails too
    assert!(matches!(
        entity.remove(key::<Missing>()),
        Err(ComponentError::MissingKey(_))
    ));
    Ok(())
}

#[test]
fn test_assign_to_derived_key_is_rejected() -> Result<(), ComponentError> {
    let mut entity = UniqueMap::new(&registry());
    let result = entity.insert(key::<Derived>(), Rc::new(Derived));
    assert!(matches!(result, Err(ComponentError::KeyMismatch { .. })));
    assert!(entity.is_empty());
    Ok(())
}

#[test]
fn test_assign_derived_under_base() -> Result<(), ComponentError> {
    let mut entity = UniqueMap::new(&registry());
    assert!(!entity.contains(key::<Base>())?);

    let derived: ComponentRef = Rc::new(Derived);
    entity.insert(key::<Base>(), Rc::clone(&derived))?;
    assert!(entity.contains(key::<Base>())?);
    assert!(Rc::ptr_eq(&entity.require(key::<Base>())?, &derived));

    // A base instance replaces it under the same key
    let base: ComponentRef = Rc::new(Base);
    entity.insert(key::<Base>(), Rc::clone(&base))?;
    assert!(Rc::ptr_eq(&entity.require(key::<Base>())?, &base));
    assert_eq!(entity.len(), 1);
    Ok(())
}

#[test]
fn test_set_and_delete() -> Result<(), ComponentError> {
    let mut entity = UniqueMap::new(&registry());
    let derived: ComponentRef = Rc::new(Derived);
    entity.set_ref(Rc::clone(&derived))?;
    assert!(Rc::ptr_eq(entity.get(key::<Base>())?.unwrap(), &derived));

    entity.set(Base)?;
    assert_eq!(format!("{:?}", entity), "UniqueMap([Base])");

    let removed = entity.remove(key::<Base>())?;
    assert!(removed.dyn_eq(&Base));
    assert!(!entity.contains(key::<Base>())?);
    Ok(())
}

#[test]
fn test_later_duplicates_overwrite() -> Result<(), ComponentError> {
    let entity = UniqueMap::from_components(
        &registry(),
        [Rc::new(Level(1)) as ComponentRef, Rc::new(Level(2)) as ComponentRef],
    )?;
    assert_eq!(entity.len(), 1);
    assert_eq!(entity.get_as::<Level>()?.unwrap().0, 2);
    Ok(())
}

#[test]
fn test_invalid_key_when_validation_enabled() {
    let entity = UniqueMap::new(&registry_with(
        Config::default().with_key_validation(KeyValidation::Always),
    ));
    assert!(matches!(
        entity.get(key::<Derived>()),
        Err(ComponentError::InvalidKey { .. })
    ));
    assert!(matches!(
        entity.contains(key::<Derived>()),
        Err(ComponentError::InvalidKey { .. })
    ));
    assert!(matches!(
        entity.contains_all([key::<Foo>(), key::<Derived>()]),
        Err(ComponentError::InvalidKey { .. })
    ));
}

#[test]
fn test_invalid_key_is_a_miss_when_validation_disabled() -> Result<(), ComponentError> {
    let mut entity = UniqueMap::new(&registry_with(
        Config::default().with_key_validation(KeyValidation::Never),
    ));
    entity.set(Derived)?;
    assert!(entity.get(key::<Derived>())?.is_none());
    assert!(!entity.contains(key::<Derived>())?);
    assert!(entity.contains(key::<Base>())?);
    Ok(())
}

type Event = (&'static str, Option<String>, Option<String>);

fn describe(value: Option<&ComponentRef>) -> Option<String> {
    value.map(|v| format!("{:?}", v))
}

#[test]
fn test_observer_order_and_arguments() -> Result<(), ComponentError> {
    let registry = registry();
    let events: Rc<RefCell<Vec<Event>>> = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&events);
    let global = GlobalObserver::new(move |_, k, new, old| {
        assert_eq!(k, TypeKey::of::<Level>());
        log.borrow_mut().push(("global", describe(new), describe(old)));
        Ok(())
    });
    registry.add_global_observer(global.clone());

    let mut entity = UniqueMap::new(&registry);
    for name in ["first", "second"] {
        let log = Rc::clone(&events);
        entity.observe(
            key::<Level>(),
            Observer::new(move |_, new, old| {
                log.borrow_mut().push((name, describe(new), describe(old)));
                Ok(())
            }),
        );
    }

    entity.set(Level(1))?;
    entity.set(Level(2))?;
    entity.remove(key::<Level>())?;

    let one = Some("Level(1)".to_string());
    let two = Some("Level(2)".to_string());
    assert_eq!(
        *events.borrow(),
        vec![
            ("global", one.clone(), None),
            ("first", one.clone(), None),
            ("second", one.clone(), None),
            ("global", two.clone(), one.clone()),
            ("first", two.clone(), one.clone()),
            ("second", two.clone(), one.clone()),
            ("global", None, two.clone()),
            ("first", None, two.clone()),
            ("second", None, two.clone()),
        ]
    );

    // A removed global observer and other keys' local observers stay silent
    events.borrow_mut().clear();
    registry.remove_global_observer(&global);
    entity.set(Foo)?;
    assert!(events.borrow().is_empty());
    Ok(())
}

#[test]
fn test_global_observers_are_shared_between_maps() -> Result<(), ComponentError> {
    let registry = registry();
    let count = Rc::new(RefCell::new(0));
    let seen = Rc::clone(&count);
    registry.add_global_observer(GlobalObserver::new(move |_, _, _, _| {
        *seen.borrow_mut() += 1;
        Ok(())
    }));

    let mut first = UniqueMap::new(&registry);
    let mut second = UniqueMap::new(&registry);
    first.set(Foo)?;
    second.set(Foo)?.set(Level(3))?;
    assert_eq!(*count.borrow(), 3);

    registry.clear_global_observers();
    first.set(Level(1))?;
    assert_eq!(*count.borrow(), 3);
    Ok(())
}

#[test]
fn test_local_observer_table_is_shared_by_reference() -> Result<(), ComponentError> {
    let registry = registry();
    let table = sovran_ec::observer_table();
    let count = Rc::new(RefCell::new(0));

    let mut first = UniqueMap::with_observers(&registry, Rc::clone(&table));
    let mut second = UniqueMap::with_observers(&registry, Rc::clone(&table));

    let seen = Rc::clone(&count);
    first.observe(
        key::<Foo>(),
        Observer::new(move |_, _, _| {
            *seen.borrow_mut() += 1;
            Ok(())
        }),
    );

    first.set(Foo)?;
    second.set(Foo)?;
    assert_eq!(*count.borrow(), 2);
    Ok(())
}

#[derive(Debug)]
struct Refused;

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("refused")
    }
}

impl std::error::Error for Refused {}

#[test]
fn test_failing_observer_propagates_after_store() {
    let registry = registry();
    let mut entity = UniqueMap::new(&registry);
    let reached = Rc::new(RefCell::new(false));

    entity.observe(key::<Level>(), Observer::new(|_, _, _| Err(Box::new(Refused) as BoxError)));
    let flag = Rc::clone(&reached);
    entity.observe(
        key::<Level>(),
        Observer::new(move |_, _, _| {
            *flag.borrow_mut() = true;
            Ok(())
        }),
    );

    match entity.set(Level(5)) {
        Err(ComponentError::Observer(err)) => assert_eq!(err.to_string(), "refused"),
        other => panic!("expected observer failure, got {:?}", other.map(|_| ())),
    }

    // Storage was updated before dispatch; the second observer never ran
    assert_eq!(entity.get_as::<Level>().unwrap().unwrap().0, 5);
    assert!(!*reached.borrow());
}

#[test]
fn test_observer_can_read_map() -> Result<(), ComponentError> {
    let registry = registry();
    let mut entity = UniqueMap::new(&registry);
    let sizes = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&sizes);
    entity.observe(
        key::<Level>(),
        Observer::new(move |map, _, _| {
            log.borrow_mut().push(map.len());
            Ok(())
        }),
    );
    entity.set(Foo)?.set(Level(1))?;
    entity.remove(key::<Level>())?;
    assert_eq!(*sizes.borrow(), vec![2, 1]);
    Ok(())
}

#[test]
fn test_default_factory_builds_on_first_access() -> Result<(), ComponentError> {
    let mut entity = UniqueMap::new(&registry()).with_default_factory(|k| {
        if k == TypeKey::of::<Level>() {
            Some(Rc::new(Level(0)) as ComponentRef)
        } else {
            None
        }
    });

    let level = entity.require(key::<Level>())?;
    assert!(level.dyn_eq(&Level(0)));
    assert!(entity.contains(key::<Level>())?);
    assert!(entity.require(key::<Foo>()).is_err());
    Ok(())
}

struct Backref {
    owner: Weak<RefCell<UniqueMap>>,
}

impl fmt::Debug for Backref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner.upgrade() {
            Some(owner) => write!(f, "Backref({:?})", owner.borrow()),
            None => f.write_str("Backref(<dropped>)"),
        }
    }
}

impl PartialEq for Backref {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.owner, &other.owner)
    }
}

#[test]
fn test_self_reference_debug_terminates() -> Result<(), ComponentError> {
    let entity = Rc::new(RefCell::new(UniqueMap::new(&registry())));
    entity.borrow_mut().set(Foo)?;
    entity.borrow_mut().set(Backref {
        owner: Rc::downgrade(&entity),
    })?;

    assert_eq!(
        format!("{:?}", entity.borrow()),
        "UniqueMap([Foo, Backref(...)])"
    );
    Ok(())
}
