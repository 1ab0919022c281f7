//! Host-record adapter.
//!
//! A [`Container`] stands in for the persisted record that owns the storage
//! text column. It decodes that column into a root [`Aggregate`] on first use,
//! writes it back on [`save`](Container::save) and drives the commit protocol.
//!
//! | Step | Root aggregate | Host flags |
//! |------|----------------|------------|
//! | `save` | `start_save`, encoded into storage | |
//! | `commit` | `finalize_commit`, `reset_changes`, `end_save` | changed → saved |
//! | `reload` | dropped, decoded again on next use | cleared |

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use super::aggregate::decode;
use crate::model::{Errors, Value};
use crate::store::{Aggregate, Host, Schema};
use crate::{Error, Result};

const DEFAULT_STORAGE_FIELD: &str = "aggregate_store";

/// Per-type container settings: the root schema and where it is stored.
#[derive(Debug)]
pub struct ContainerType {
    schema: Arc<Schema>,
    storage_field: String,
    migrate_from: Option<String>,
}

impl ContainerType {
    pub fn builder(schema: &Arc<Schema>) -> ContainerBuilder {
        ContainerBuilder { schema: schema.clone(), storage: None }
    }

    pub fn schema(&self) -> &Arc<Schema> { &self.schema }
    pub fn storage_field(&self) -> &str { &self.storage_field }
    pub fn migrate_from(&self) -> Option<&str> { self.migrate_from.as_deref() }

    /// A record that has never been persisted.
    pub fn new_record(self: &Arc<Self>) -> Container {
        Container::new(self.clone(), String::new(), None, false)
    }

    /// A persisted record with its storage column and, when declared, the
    /// legacy column being migrated from.
    pub fn load(self: &Arc<Self>, storage: impl Into<String>, legacy: Option<String>) -> Container {
        Container::new(self.clone(), storage.into(), legacy, true)
    }
}

#[derive(Debug)]
pub struct ContainerBuilder {
    schema: Arc<Schema>,
    storage: Option<(String, Option<String>)>,
}

impl ContainerBuilder {
    /// Store the root aggregate in `field`, falling back to reading
    /// `migrate_from` while `field` is still blank. May be declared once.
    pub fn store_aggregates_using(mut self, field: &str, migrate_from: Option<&str>) -> Result<Self> {
        if let Some((existing, _)) = &self.storage {
            return Err(Error::StorageAlreadyDefined { existing: existing.clone() });
        }
        self.storage = Some((field.to_owned(), migrate_from.map(str::to_owned)));
        Ok(self)
    }

    pub fn build(self) -> Arc<ContainerType> {
        let (storage_field, migrate_from) =
            self.storage.unwrap_or_else(|| (DEFAULT_STORAGE_FIELD.to_owned(), None));
        Arc::new(ContainerType { schema: self.schema, storage_field, migrate_from })
    }
}

/// Column-level flags of the host record.
#[derive(Debug, Default)]
struct HostFlags {
    changed: Cell<bool>,
    saved: Cell<bool>,
}

impl Host for HostFlags {
    fn changed(&self) -> bool { self.changed.get() }
    fn saved_changes(&self) -> bool { self.saved.get() }
}

pub struct Container {
    kind: Arc<ContainerType>,
    storage: String,
    legacy: Option<String>,
    persisted: bool,
    root: OnceCell<Aggregate>,
    flags: Rc<HostFlags>,
}

impl Container {
    fn new(kind: Arc<ContainerType>, storage: String, legacy: Option<String>, persisted: bool) -> Self {
        Self { kind, storage, legacy, persisted, root: OnceCell::new(), flags: Rc::default() }
    }

    pub fn kind(&self) -> &Arc<ContainerType> { &self.kind }
    pub fn is_new_record(&self) -> bool { !self.persisted }

    /// Current text of the storage column.
    pub fn storage(&self) -> &str { &self.storage }
    pub fn legacy(&self) -> Option<&str> { self.legacy.as_deref() }

    /// The root aggregate, decoded from storage on first use.
    pub fn root(&self) -> Result<Aggregate> {
        self.root
            .get_or_try_init(|| {
                let text = [Some(self.storage.as_str()), self.legacy.as_deref()]
                    .into_iter()
                    .flatten()
                    .find(|text| !text.trim().is_empty())
                    .unwrap_or("");
                let decoded = decode(text)?;
                tracing::debug!(
                    schema = %self.kind.schema.name(),
                    field = %self.kind.storage_field,
                    present = decoded.is_some(),
                    "decoded aggregate store"
                );
                let root = Aggregate::from_decoded(&self.kind.schema, decoded, self.persisted);
                root.attach_host(self.flags.clone());
                Ok(root)
            })
            .cloned()
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.root()?.get(name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<Value> {
        self.root()?.set(name, value)
    }

    pub fn validate(&self) -> Result<bool> {
        self.root()?.validate()
    }

    pub fn errors(&self) -> Errors {
        self.root.get().map(Aggregate::errors).unwrap_or_default()
    }

    /// A change to one of the host's own columns.
    pub fn mark_host_changed(&self) {
        self.flags.changed.set(true);
    }

    pub fn changed(&self) -> bool {
        match self.root.get() {
            Some(root) => root.changed(),
            None => self.flags.changed.get(),
        }
    }

    pub fn changed_for_autosave(&self) -> Result<bool> {
        match self.root.get() {
            Some(root) => root.changed_for_autosave(),
            None => Ok(self.flags.changed.get()),
        }
    }

    pub fn saved_changes(&self) -> Result<bool> {
        match self.root.get() {
            Some(root) => root.saved_changes(),
            None => Ok(self.flags.saved.get()),
        }
    }

    /// Encode the root into the storage column. An untouched root leaves the
    /// column alone; an all-default, unversioned root writes an empty string.
    pub fn write_aggregates(&mut self) -> Result<()> {
        let Some(root) = self.root.get() else {
            tracing::debug!(field = %self.kind.storage_field, "aggregate store never decoded, not writing");
            return Ok(());
        };
        let encoded = if self.kind.schema.has_schema_version() || root.any_non_default_values()? {
            root.to_json()?
        } else {
            String::new()
        };
        tracing::debug!(field = %self.kind.storage_field, bytes = encoded.len(), "writing aggregate store");
        self.storage = encoded;
        Ok(())
    }

    /// Save the host record: start the root's save and write the column.
    pub fn save(&mut self) -> Result<()> {
        if let Some(root) = self.root.get() {
            root.start_save();
        }
        self.write_aggregates()?;
        self.persisted = true;
        Ok(())
    }

    /// After the host transaction commits.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(root) = self.root.get() {
            root.finalize_commit()?;
            root.reset_changes();
            root.end_save();
        }
        self.flags.saved.set(self.flags.changed.replace(false));
        Ok(())
    }

    /// Replace the column contents and forget everything decoded from them.
    pub fn reload(&mut self, storage: impl Into<String>, legacy: Option<String>) {
        self.storage = storage.into();
        self.legacy = legacy;
        self.persisted = true;
        self.root.take();
        self.flags = Rc::default();
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("schema", &self.kind.schema.name())
            .field("storage", &self.storage)
            .field("persisted", &self.persisted)
            .field("decoded", &self.root.get().is_some())
            .finish()
    }
}
