//! # sovran-ec
//!
//! Entity/component containers for composition over inheritance.
//!
//! `sovran-ec` lets you build an entity's behavior by attaching component
//! values of arbitrary, unrelated types to a container and retrieving them by
//! type. Unlike a full ECS, every container is standalone and models exactly
//! one entity.
//!
//! ## Key Features
//!
//! - **UniqueMap**: at most one component per type, with change observers
//! - **MultiBag**: any number of components per type, indexed by every ancestor type
//! - **Abstract components**: a base type can act as the key for all of its subtypes
//! - **Persistence**: serde round-trips that replay assignments so observers stay in sync
//! - **Explicit registry**: type ancestry, codecs and global observers live in a
//!   [`Registry`] you create and pass around, never in hidden globals
//!
//! ## Usage Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use sovran_ec::{ComponentError, Registry, TypeKey, UniqueMap};
//! use std::rc::Rc;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position { x: i32, y: i32 }
//!
//! #[derive(Debug, PartialEq)]
//! struct Health(u32);
//!
//! fn main() -> Result<(), ComponentError> {
//!     let registry = Rc::new(Registry::new());
//!     let mut entity = UniqueMap::new(&registry);
//!
//!     entity.set(Position { x: 0, y: 0 })?.set(Health(10))?;
//!
//!     let health = entity.get_as::<Health>()?.expect("health was just set");
//!     println!("Health: {}", health.0);
//!
//!     // Handle errors properly
//!     match entity.require(TypeKey::of::<String>()) {
//!         Ok(value) => println!("Name: {:?}", value),
//!         Err(ComponentError::MissingKey(key)) => println!("{} is not attached", key),
//!         Err(e) => println!("Other error: {}", e),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Abstract Components
//!
//! ```rust
//! use sovran_ec::{Registry, TypeKey, UniqueMap};
//! use std::rc::Rc;
//!
//! #[derive(Debug, PartialEq)]
//! struct Ai;
//!
//! #[derive(Debug, PartialEq)]
//! struct HostileAi { aggression: u8 }
//!
//! let registry = Registry::new();
//! registry.register_abstract::<Ai>();
//! registry.component::<HostileAi>().extends::<Ai>().register()?;
//! let registry = Rc::new(registry);
//!
//! let mut orc = UniqueMap::new(&registry);
//! orc.set(HostileAi { aggression: 3 })?;
//!
//! // Stored under the abstract base, not the concrete type
//! assert!(orc.contains(TypeKey::of::<Ai>())?);
//! assert_eq!(orc.keys().collect::<Vec<_>>(), vec![TypeKey::of::<Ai>()]);
//! # Ok::<(), sovran_ec::ComponentError>(())
//! ```
//!
//! ### Observers
//!
//! ```rust
//! use sovran_ec::{Observer, Registry, TypeKey, UniqueMap};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! #[derive(Debug, PartialEq)]
//! struct Health(u32);
//!
//! let registry = Rc::new(Registry::new());
//! let changes = Rc::new(Cell::new(0));
//!
//! let mut entity = UniqueMap::new(&registry);
//! let seen = Rc::clone(&changes);
//! entity.observe(
//!     TypeKey::of::<Health>(),
//!     Observer::new(move |_, _new, _old| {
//!         seen.set(seen.get() + 1);
//!         Ok(())
//!     }),
//! );
//!
//! entity.set(Health(10))?;
//! entity.set(Health(7))?;
//! entity.remove(TypeKey::of::<Health>())?;
//! assert_eq!(changes.get(), 3);
//! # Ok::<(), sovran_ec::ComponentError>(())
//! ```
//!
//! ### Persistence
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use sovran_ec::{Registry, UniqueMap};
//! use std::rc::Rc;
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Health(u32);
//!
//! let registry = Registry::new();
//! registry.component::<Health>().serde().register()?;
//! let registry = Rc::new(registry);
//!
//! let mut entity = UniqueMap::new(&registry);
//! entity.set(Health(4))?;
//!
//! let json = entity.to_json()?;
//! let restored = UniqueMap::from_json(&registry, &json)?;
//! assert_eq!(format!("{:?}", restored), "UniqueMap([Health(4)])");
//! # Ok::<(), sovran_ec::ComponentError>(())
//! ```

mod bag;
mod component;
mod config;
mod error;
mod key;
mod observer;
mod registry;
mod repr;
pub mod state;
mod unique;

pub use bag::MultiBag;
pub use component::{downcast, Component, ComponentRef};
pub use config::{Config, KeyValidation};
pub use error::{BoxError, ComponentError, Result};
pub use key::TypeKey;
pub use observer::{observer_table, GlobalObserver, Observer, ObserverResult, ObserverTable};
pub use registry::{ComponentBuilder, Registry};
pub use state::{MultiBagState, PersistedComponent, PersistedMap, UniqueMapState};
pub use unique::{DefaultFactory, UniqueMap};
