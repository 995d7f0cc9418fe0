use serde::{Deserialize, Serialize};
use sovran_ec::{ComponentError, GlobalObserver, Registry, TypeKey, UniqueMap};
use std::rc::Rc;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Position {
    x: i32,
    y: i32,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Health {
    current: u32,
    max: u32,
}

// Every AI variant is stored under this key
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Ai;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct HostileAi {
    target: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct WanderingAi;

fn build_registry() -> Result<Rc<Registry>, ComponentError> {
    let registry = Registry::new();
    registry.component::<Position>().serde().register()?;
    registry.component::<Health>().serde().register()?;
    registry.component::<Ai>().abstract_component().serde().register()?;
    registry.component::<HostileAi>().extends::<Ai>().serde().register()?;
    registry.component::<WanderingAi>().extends::<Ai>().serde().register()?;

    registry.register_observer("announce_health", |_, new, old| {
        match (old, new) {
            (None, Some(_)) => println!("  health tracking started"),
            (Some(old), Some(new)) => println!("  health changed: {:?} -> {:?}", old, new),
            (Some(_), None) => println!("  health tracking stopped"),
            (None, None) => {}
        }
        Ok(())
    });
    Ok(Rc::new(registry))
}

fn main() -> Result<(), ComponentError> {
    env_logger::init();
    let registry = build_registry()?;

    // Log every change on every entity
    registry.add_global_observer(GlobalObserver::new(|_, key, new, _| {
        match new {
            Some(value) => println!("[{}] = {:?}", key, value),
            None => println!("[{}] removed", key),
        }
        Ok(())
    }));

    let mut orc = UniqueMap::new(&registry);
    orc.observe(
        TypeKey::of::<Health>(),
        registry.named_observer("announce_health")?,
    );
    orc.set(Position { x: 3, y: 4 })?
        .set(Health { current: 10, max: 10 })?
        .set(WanderingAi)?;

    // Swapping behavior replaces the component under the shared AI key
    orc.set(HostileAi {
        target: Some("player".to_string()),
    })?;
    println!("orc has {} components: {:?}", orc.len(), orc);

    orc.set(Health { current: 6, max: 10 })?;

    let saved = orc.to_json()?;
    println!("saved: {}", saved);

    println!("loading:");
    let loaded = UniqueMap::from_json(&registry, &saved)?;
    println!("loaded: {:?}", loaded);

    if let Some(health) = loaded.get_as::<Health>()? {
        println!("loaded orc is at {}/{} health", health.current, health.max);
    }
    Ok(())
}
