use serde::{Deserialize, Serialize};
use sovran_ec::{ComponentError, MultiBag, Registry, TypeKey};
use std::rc::Rc;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Item;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Weapon;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Sword {
    damage: u32,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Bow {
    range: u32,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Potion {
    heals: u32,
}

fn main() -> Result<(), ComponentError> {
    env_logger::init();

    let registry = Registry::new();
    registry.component::<Weapon>().extends::<Item>().register()?;
    registry.component::<Sword>().extends::<Weapon>().serde().register()?;
    registry.component::<Bow>().extends::<Weapon>().serde().register()?;
    registry.component::<Potion>().extends::<Item>().serde().register()?;
    let registry = Rc::new(registry);

    let mut pack = MultiBag::new(&registry);
    pack.add(Sword { damage: 4 })
        .add(Potion { heals: 5 })
        .add(Bow { range: 8 })
        .add(Potion { heals: 5 });

    println!("items:   {:?}", pack.get(TypeKey::of::<Item>()));
    println!("weapons: {:?}", pack.get(TypeKey::of::<Weapon>()));
    println!("potions: {:?}", pack.get(TypeKey::of::<Potion>()));

    // Drinking one potion removes it from every index
    pack.remove(&Potion { heals: 5 })?;
    println!("after drinking, {} potion(s) left", pack.get_as::<Potion>().len());

    // Drop all weapons at once
    pack.delete(TypeKey::of::<Weapon>())?;
    println!("after dropping weapons: {:?}", pack);

    let saved = pack.to_json()?;
    let restored = MultiBag::from_json(&registry, &saved)?;
    println!("restored from {}: {:?}", saved, restored);
    Ok(())
}
