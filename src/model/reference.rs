//! Lazy references to externally persisted entities.
//!
//! A belongs-to attribute stores only an id. The referenced entity is fetched
//! through a [`RecordFinder`] the first time [`ForeignKeyReference::value`] is
//! called and cached for the life of the reference (and its clones).

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use crate::Result;

/// An entity owned by the host persistence layer.
pub trait PersistedRecord: fmt::Debug {
    fn id(&self) -> i64;
    fn type_name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

/// Looks up persisted entities of one type by id.
pub trait RecordFinder: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;
    fn find(&self, id: i64) -> Result<Rc<dyn PersistedRecord>>;
}

#[derive(Clone)]
pub struct ForeignKeyReference {
    finder: Arc<dyn RecordFinder>,
    id: i64,
    value: Rc<OnceCell<Rc<dyn PersistedRecord>>>,
}

impl ForeignKeyReference {
    pub fn new(finder: Arc<dyn RecordFinder>, id: i64) -> Self {
        Self { finder, id, value: Rc::new(OnceCell::new()) }
    }

    /// A reference that is already resolved.
    pub fn resolved(finder: Arc<dyn RecordFinder>, record: Rc<dyn PersistedRecord>) -> Self {
        let id = record.id();
        Self { finder, id, value: Rc::new(OnceCell::with_value(record)) }
    }

    pub fn id(&self) -> i64 { self.id }
    pub fn target_type(&self) -> &str { self.finder.type_name() }
    pub fn is_loaded(&self) -> bool { self.value.get().is_some() }

    pub fn value(&self) -> Result<Rc<dyn PersistedRecord>> {
        self.value.get_or_try_init(|| self.finder.find(self.id)).cloned()
    }

    /// Resolve and downcast to the concrete record type.
    pub fn value_as<T: PersistedRecord + 'static>(&self) -> Result<Option<Rc<dyn PersistedRecord>>> {
        let record = self.value()?;
        Ok(record.as_any().is::<T>().then_some(record))
    }
}

impl PartialEq for ForeignKeyReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.target_type() == other.target_type()
    }
}

impl fmt::Debug for ForeignKeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignKeyReference")
            .field("type", &self.target_type())
            .field("id", &self.id)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Passport {
        id: i64,
    }

    impl PersistedRecord for Passport {
        fn id(&self) -> i64 { self.id }
        fn type_name(&self) -> &str { "Passport" }
        fn as_any(&self) -> &dyn Any { self }
    }

    #[derive(Debug, Default)]
    struct CountingFinder {
        lookups: std::sync::atomic::AtomicUsize,
    }

    impl RecordFinder for CountingFinder {
        fn type_name(&self) -> &str { "Passport" }
        fn find(&self, id: i64) -> Result<Rc<dyn PersistedRecord>> {
            self.lookups.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if id == 404 {
                return Err(crate::Error::NotFound { type_name: "Passport".into(), id });
            }
            Ok(Rc::new(Passport { id }))
        }
    }

    #[test]
    fn test_value_is_fetched_once() {
        let finder = Arc::new(CountingFinder::default());
        let reference = ForeignKeyReference::new(finder.clone(), 7);
        let copy = reference.clone();
        assert!(!reference.is_loaded());
        assert_eq!(reference.value().unwrap().id(), 7);
        assert_eq!(copy.value().unwrap().id(), 7);
        assert_eq!(finder.lookups.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolved_reference_skips_lookup() {
        let finder = Arc::new(CountingFinder::default());
        let reference = ForeignKeyReference::resolved(finder.clone(), Rc::new(Passport { id: 3 }));
        assert_eq!(reference.id(), 3);
        assert!(reference.value_as::<Passport>().unwrap().is_some());
        assert_eq!(finder.lookups.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_record() {
        let reference = ForeignKeyReference::new(Arc::new(CountingFinder::default()), 404);
        assert!(matches!(reference.value(), Err(crate::Error::NotFound { id: 404, .. })));
    }
}
