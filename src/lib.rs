//! # aggregate-rs: Typed Value Graphs in a Single Serialized Field
//!
//! Lets a host record keep a rich, nested, typed value graph inside one JSON
//! text column instead of one column per value.
//!
//! ## Design Principles
//!
//! 1. **Handler-first**: every declared attribute is served by an
//!    [`AttributeHandler`] that knows how to coerce, store, load and validate it
//! 2. **Lazy**: nothing is decoded until an attribute is first touched, and the
//!    load hooks fire exactly once per instance
//! 3. **Three layers of values**: current, initial-at-load and before-cast, so
//!    "dirty since load" and "changed in the last commit" are tracked separately
//! 4. **Composition, not inheritance**: an [`AttributeStore`] is embedded in every
//!    [`Aggregate`]; host records wrap a root aggregate in a [`Container`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aggregate_rs::{Aggregate, Options, Schema, Value};
//!
//! # fn example() -> aggregate_rs::Result<()> {
//! let photo = Schema::builder("PassportPhoto")
//!     .attribute("photo_url", "string", Options::new())
//!     .attribute("color", "boolean", Options::new())
//!     .build()?;
//!
//! let passport = Schema::builder("Passport")
//!     .attribute("city", "string", Options::new().required())
//!     .attribute("weight", "decimal", Options::new().default(100))
//!     .attribute("photo", &photo, Options::new())
//!     .build()?;
//!
//! let record = Aggregate::new(&passport);
//! record.set("city", "Santa Barbara")?;
//! record.build("photo", Value::Null)?;
//! assert!(record.changed());
//! println!("{}", record.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Attribute Types
//!
//! | Type | Declared as | Stored as |
//! |------|-------------|-----------|
//! | string | `"string"` | string, or encrypted JSON envelope |
//! | integer / float | `"integer"` / `"float"` | number |
//! | boolean | `"boolean"` | bool |
//! | enum | `"enum"` | string |
//! | datetime | `"datetime"` | formatted string |
//! | decimal | `"decimal"` | string |
//! | hash | `"hash"` | JSON string or object |
//! | bitfield | `"bitfield"` | positional string |
//! | nested | `&Arc<Schema>` | object |
//! | has-many | `has_many(..)` | array |
//! | belongs-to | `belongs_to(..)` | id |

// ============================================================================
// Modules
// ============================================================================

pub mod attribute;
pub mod config;
pub mod encryption;
pub mod model;
pub mod store;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Bitfield, BitfieldConfig, Errors, ForeignKeyReference, JsonMap, PersistedRecord,
    RecordFinder, Scalar, Value,
};

// ============================================================================
// Re-exports: Attributes
// ============================================================================

pub use attribute::{AttributeHandler, AttributeType, Limit, Options, StorageType};

// ============================================================================
// Re-exports: Store
// ============================================================================

pub use store::{
    Aggregate, AttributeStore, Change, ChangeSet, CombinedStringField, CombinedValues, Container,
    ContainerType, Host, HookPoint, MissingKeyPolicy, Schema, SchemaBuilder,
};

// ============================================================================
// Re-exports: Configuration
// ============================================================================

pub use config::{Configuration, configuration, configure};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ---- configuration ----
    #[error("unknown option '{option}' for {handler} attribute '{attribute}'")]
    UnknownOption {
        attribute: String,
        handler: &'static str,
        option: String,
    },

    #[error("invalid option for attribute '{attribute}': {message}")]
    InvalidOption { attribute: String, message: String },

    #[error("unknown attribute type '{0}'")]
    UnknownType(String),

    #[error("invalid bitfield mapping: {0}")]
    InvalidMapping(String),

    #[error("invalid encryption key list: {0}")]
    InvalidKeyList(String),

    #[error("aggregate storage field is already set to '{existing}'")]
    StorageAlreadyDefined { existing: String },

    #[error("unknown attribute '{name}' for {entity}")]
    UnknownAttribute { entity: String, name: String },

    // ---- assignment ----
    #[error("wrong value type {value} for '{attribute}'")]
    WrongType { attribute: String, value: String },

    #[error("invalid value for '{attribute}': {message}")]
    InvalidValue { attribute: String, message: String },

    #[error("attempted to set unsupported bitfield value {0}")]
    UnsupportedBitfieldValue(String),

    #[error("index out of bounds, index({index}) >= limit({limit})")]
    IndexOutOfBounds { index: usize, limit: usize },

    #[error("unexpected character {character:?} in bitfield {encoded:?}")]
    CorruptBitfield { character: char, encoded: String },

    // ---- cryptography ----
    #[error("must specify a key for {operation}")]
    MissingEncryptionKey { operation: &'static str },

    #[error("could not decrypt {attribute} because the correct decryption key is not found")]
    Decryption { attribute: String },

    #[error("could not encrypt {attribute}")]
    Encryption { attribute: String },

    // ---- host contract ----
    #[error("undefined method 'changed_for_autosave' for {0}")]
    NoAutosaveHost(String),

    #[error("call {method} on containing class")]
    ForbiddenPersistence { method: &'static str },

    #[error("{type_name} with id {id} not found")]
    NotFound { type_name: String, id: i64 },

    #[error("hook failed: {0}")]
    Hook(String),

    // ---- decoding ----
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
