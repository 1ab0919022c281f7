//! Per-type attribute descriptor table.
//!
//! A [`Schema`] is built once per aggregate type and shared read-only by
//! every instance. It holds the ordered attribute handlers plus everything
//! that is decided per type rather than per instance: load hooks, custom
//! validators, the schema version and the missing-key policy.
//!
//! ```rust,no_run
//! use aggregate_rs::{Options, Schema, Scalar};
//!
//! # fn example() -> aggregate_rs::Result<()> {
//! let passport = Schema::builder("Passport")
//!     .attribute("city", "string", Options::new().required())
//!     .attribute("gender", "enum", Options::new().limit(vec![Scalar::symbol("male"), Scalar::symbol("female")]))
//!     .has_many("stamps", "string", Options::new())
//!     .schema_version("2", |passport, stored| {
//!         if stored.is_none() {
//!             passport.set("city", "unknown")?;
//!         }
//!         Ok(())
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::attribute::schema_version::{SCHEMA_VERSION_ATTRIBUTE, SchemaVersionHandler};
use crate::attribute::{
    AttributeHandler, IntoAttributeType, Options, StorageType, belongs_to_factory, factory,
    has_many_factory,
};
use crate::model::{Errors, RecordFinder};
use crate::store::Aggregate;
use crate::{Error, Result};

/// Callback run against an instance at a hook point.
pub type Hook = Arc<dyn Fn(&Aggregate) -> Result<()> + Send + Sync>;

/// Custom validation run after the per-attribute checks.
pub type Validator = Arc<dyn Fn(&Aggregate, &mut Errors) -> Result<()> + Send + Sync>;

/// Receives the stored schema version (`None` when absent) on mismatch.
pub type Fixup = Arc<dyn Fn(&Aggregate, Option<&str>) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Runs first on the first attribute access; the schema version check lives here.
    CheckSchema,
    /// Runs after `CheckSchema` on the first attribute access.
    Loaded,
}

/// What a key absent from a present backing map loads as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingKeyPolicy {
    /// The attribute's default.
    #[default]
    UseDefault,
    /// `from_store(null)`.
    TreatAsNull,
}

pub struct Schema {
    name: String,
    ancestors: Vec<String>,
    handlers: Vec<Arc<dyn AttributeHandler>>,
    index: HashMap<String, usize>,
    schema_version: Option<(String, Fixup)>,
    check_schema_hooks: Vec<Hook>,
    loaded_hooks: Vec<Hook>,
    validators: Vec<Validator>,
    missing_keys: MissingKeyPolicy,
    storage_type: Option<StorageType>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str { &self.name }

    /// Handlers in declaration order. Each appears once, aliases excluded.
    pub fn handlers(&self) -> &[Arc<dyn AttributeHandler>] { &self.handlers }

    /// Look up by storage key or alias (`passport` for `passport_id`).
    pub fn handler(&self, name: &str) -> Option<&Arc<dyn AttributeHandler>> {
        self.index.get(name).map(|&i| &self.handlers[i])
    }

    pub fn require_handler(&self, name: &str) -> Result<Arc<dyn AttributeHandler>> {
        self.handler(name).cloned().ok_or_else(|| Error::UnknownAttribute {
            entity: self.name.clone(),
            name: name.to_owned(),
        })
    }

    pub fn has_schema_version(&self) -> bool { self.schema_version.is_some() }

    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_ref().map(|(v, _)| v.as_str())
    }

    pub fn missing_key_policy(&self) -> MissingKeyPolicy { self.missing_keys }
    pub fn storage_type(&self) -> Option<StorageType> { self.storage_type }
    pub fn validators(&self) -> &[Validator] { &self.validators }

    pub fn hooks(&self, point: HookPoint) -> &[Hook] {
        match point {
            HookPoint::CheckSchema => &self.check_schema_hooks,
            HookPoint::Loaded => &self.loaded_hooks,
        }
    }

    /// Same schema, or one built with `inherit` from it.
    pub fn is_a(&self, other: &Schema) -> bool {
        std::ptr::eq(self, other) || self.name == other.name || self.ancestors.contains(&other.name)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("attributes", &names)
            .field("schema_version", &self.schema_version())
            .field("missing_keys", &self.missing_keys)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

enum Declaration {
    Attribute { name: String, ty: Result<crate::attribute::AttributeType>, options: Options },
    HasMany { name: String, ty: Result<crate::attribute::AttributeType>, options: Options },
    BelongsTo { name: String, finder: Arc<dyn RecordFinder>, options: Options },
    Handler { handler: Arc<dyn AttributeHandler>, alias: Option<String> },
}

/// Collects declarations; handlers are built in [`SchemaBuilder::build`], so
/// schema-wide settings apply regardless of call order.
pub struct SchemaBuilder {
    name: String,
    ancestors: Vec<String>,
    declarations: Vec<Declaration>,
    schema_version: Option<(String, Fixup)>,
    check_schema_hooks: Vec<Hook>,
    loaded_hooks: Vec<Hook>,
    validators: Vec<Validator>,
    missing_keys: MissingKeyPolicy,
    storage_type: Option<StorageType>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
            declarations: Vec::new(),
            schema_version: None,
            check_schema_hooks: Vec::new(),
            loaded_hooks: Vec::new(),
            validators: Vec::new(),
            missing_keys: MissingKeyPolicy::default(),
            storage_type: None,
        }
    }

    /// Start from everything `parent` declares. Later declarations with the
    /// same name replace the inherited ones in place.
    pub fn inherit(mut self, parent: &Schema) -> Self {
        self.ancestors.push(parent.name.clone());
        self.ancestors.extend(parent.ancestors.iter().cloned());
        for (position, handler) in parent.handlers.iter().enumerate() {
            let alias = parent
                .index
                .iter()
                .find(|entry| *entry.1 == position && entry.0.as_str() != handler.name())
                .map(|(key, _)| key.clone());
            if handler.is_schema_version() {
                continue;
            }
            self.declarations.push(Declaration::Handler { handler: handler.clone(), alias });
        }
        self.schema_version = parent.schema_version.clone();
        // The version check hook is rebuilt at `build`, skip the inherited copy.
        let inherited_checks = if parent.schema_version.is_some() {
            parent.check_schema_hooks.iter().skip(1).cloned().collect()
        } else {
            parent.check_schema_hooks.clone()
        };
        self.check_schema_hooks = inherited_checks;
        self.loaded_hooks = parent.loaded_hooks.clone();
        self.validators = parent.validators.clone();
        self.missing_keys = parent.missing_keys;
        self.storage_type = parent.storage_type;
        self
    }

    pub fn attribute(mut self, name: &str, ty: impl IntoAttributeType, options: Options) -> Self {
        self.declarations.push(Declaration::Attribute {
            name: name.to_owned(),
            ty: ty.into_attribute_type(),
            options,
        });
        self
    }

    pub fn has_many(mut self, name: &str, ty: impl IntoAttributeType, options: Options) -> Self {
        self.declarations.push(Declaration::HasMany {
            name: name.to_owned(),
            ty: ty.into_attribute_type(),
            options,
        });
        self
    }

    /// Stored under `<name>_id`, reachable by both names.
    pub fn belongs_to(mut self, name: &str, finder: Arc<dyn RecordFinder>, options: Options) -> Self {
        self.declarations.push(Declaration::BelongsTo { name: name.to_owned(), finder, options });
        self
    }

    /// Register a handler built outside the factory.
    pub fn handler(mut self, handler: Arc<dyn AttributeHandler>) -> Self {
        self.declarations.push(Declaration::Handler { handler, alias: None });
        self
    }

    /// Declare the `data_schema_version` attribute. When the stored version
    /// differs from `version` on first access, `fixup` runs once with the
    /// stored version.
    pub fn schema_version(
        mut self,
        version: impl Into<String>,
        fixup: impl Fn(&Aggregate, Option<&str>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.schema_version = Some((version.into(), Arc::new(fixup)));
        self
    }

    pub fn hook(
        mut self,
        point: HookPoint,
        hook: impl Fn(&Aggregate) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        match point {
            HookPoint::CheckSchema => self.check_schema_hooks.push(Arc::new(hook)),
            HookPoint::Loaded => self.loaded_hooks.push(Arc::new(hook)),
        }
        self
    }

    pub fn on_load(self, hook: impl Fn(&Aggregate) -> Result<()> + Send + Sync + 'static) -> Self {
        self.hook(HookPoint::Loaded, hook)
    }

    pub fn validate_with(
        mut self,
        validator: impl Fn(&Aggregate, &mut Errors) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn missing_keys(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_keys = policy;
        self
    }

    /// Passed to every handler as the `storage_type` option.
    pub fn storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = Some(storage_type);
        self
    }

    pub fn build(self) -> Result<Arc<Schema>> {
        let storage_type = self.storage_type;
        let with_storage = |options: Options| match storage_type {
            Some(t) if !options.has("storage_type") => options.storage_type(t),
            _ => options,
        };

        let mut handlers: Vec<Arc<dyn AttributeHandler>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut register = |handler: Arc<dyn AttributeHandler>, alias: Option<String>| {
            let position = match index.get(handler.name()) {
                Some(&existing) => {
                    handlers[existing] = handler.clone();
                    existing
                }
                None => {
                    handlers.push(handler.clone());
                    handlers.len() - 1
                }
            };
            index.insert(handler.name().to_owned(), position);
            if let Some(alias) = alias {
                index.insert(alias, position);
            }
        };

        for declaration in self.declarations {
            match declaration {
                Declaration::Attribute { name, ty, options } => {
                    register(factory(&name, ty?, with_storage(options))?, None);
                }
                Declaration::HasMany { name, ty, options } => {
                    register(has_many_factory(&name, ty?, with_storage(options))?, None);
                }
                Declaration::BelongsTo { name, finder, options } => {
                    register(belongs_to_factory(&name, finder, with_storage(options))?, Some(name));
                }
                Declaration::Handler { handler, alias } => register(handler, alias),
            }
        }

        let mut check_schema_hooks = self.check_schema_hooks;
        if let Some((version, fixup)) = &self.schema_version {
            register(Arc::new(SchemaVersionHandler::new(version.clone())), None);
            check_schema_hooks.insert(0, version_check(&self.name, version.clone(), fixup.clone()));
        }

        tracing::debug!(schema = %self.name, attributes = handlers.len(), "schema built");

        Ok(Arc::new(Schema {
            name: self.name,
            ancestors: self.ancestors,
            handlers,
            index,
            schema_version: self.schema_version,
            check_schema_hooks,
            loaded_hooks: self.loaded_hooks,
            validators: self.validators,
            missing_keys: self.missing_keys,
            storage_type,
        }))
    }
}

fn version_check(schema: &str, version: String, fixup: Fixup) -> Hook {
    let schema = schema.to_owned();
    Arc::new(move |aggregate: &Aggregate| {
        let stored = aggregate.get(SCHEMA_VERSION_ATTRIBUTE)?;
        let stored = stored.as_str();
        if stored != Some(version.as_str()) {
            tracing::debug!(
                schema = %schema,
                stored = stored.unwrap_or("<none>"),
                code = %version,
                "schema version mismatch, running fixup"
            );
            fixup(aggregate, stored)?;
        }
        Ok(())
    })
}
