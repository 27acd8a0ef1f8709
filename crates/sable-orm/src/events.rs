//! Model lifecycle events.
//!
//! An [`EventSink`] is optional; when the [`Orm`](crate::Orm) holds none,
//! every hook is a no-op and nothing is cancelable.

use crate::model::Model;

/// Lifecycle moments fired around persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Saving,
    Creating,
    Created,
    Updating,
    Updated,
    Saved,
    Deleting,
    Deleted,
}

impl ModelEvent {
    /// Returns the event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Saving => "saving",
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Updating => "updating",
            Self::Updated => "updated",
            Self::Saved => "saved",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
        }
    }
}

/// Receives lifecycle events. Default implementations make every hook a
/// no-op so sinks override only what they observe.
pub trait EventSink: Send + Sync {
    /// Cancelable hook; returning `false` aborts the operation.
    fn until(&self, event: ModelEvent, model: &Model) -> bool {
        let _ = (event, model);
        true
    }

    /// Announcement hook fired after an operation succeeds.
    fn dispatch(&self, event: ModelEvent, model: &Model) {
        let _ = (event, model);
    }
}
