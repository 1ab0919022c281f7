//! Attribute-bearing entities and their per-instance state.
//!
//! | Module | Role |
//! |--------|------|
//! | `schema` | per-type handler table, hooks, validators |
//! | `state` | per-instance current / initial / before-cast maps |
//! | `aggregate` | the entity handle: load, assign, track, commit |
//! | `container` | host record owning the storage column |
//! | `combined` | newline-packed string fields on a host record |

mod aggregate;
mod combined;
mod container;
mod host;
mod schema;
pub(crate) mod state;

pub use aggregate::Aggregate;
pub use combined::{CombinedStringField, CombinedValues};
pub use container::{Container, ContainerBuilder, ContainerType};
pub use host::Host;
pub use schema::{Fixup, Hook, HookPoint, MissingKeyPolicy, Schema, SchemaBuilder, Validator};
pub use state::{AttributeStore, Change, ChangeSet};
