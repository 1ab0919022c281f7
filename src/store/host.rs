//! Host-record boundary.

/// Column-level dirty state of the record an aggregate is stored in.
///
/// Attached to a root [`Aggregate`](super::Aggregate) so that its
/// `changed`, `changed_for_autosave` and `saved_changes` queries also report
/// changes the host made to its own fields.
pub trait Host {
    fn changed(&self) -> bool;
    fn saved_changes(&self) -> bool;
}
