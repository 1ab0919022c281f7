//! # Value Model
//!
//! The dynamic values attributes hold, and the small types they are built from.
//! These types cross every boundary: handler ↔ store ↔ container ↔ user.
//!
//! Design rule: no schema lookups and no dirty tracking here.
//! This module is data plus the rules for comparing and encoding it.

pub mod bitfield;
pub mod errors;
pub mod reference;
pub mod value;

pub use bitfield::{Bitfield, BitfieldConfig};
pub use errors::Errors;
pub use reference::{ForeignKeyReference, PersistedRecord, RecordFinder};
pub use value::{JsonMap, Scalar, Value};
