use super::{ResourceKey, ResourceSnapshot};

/// Lifecycle notification for one resource.
///
/// Delivery is at-least-once and may be reordered; consumers must tolerate
/// replayed `Created`/`Deleted` and missing intermediate `Updated`.
#[derive(Clone, Debug)]
pub enum ResourceEvent {
    /// Resource appeared (or was first observed).
    Created(ResourceSnapshot),
    /// Resource changed from `old` to `new`.
    Updated {
        old: ResourceSnapshot,
        new: ResourceSnapshot,
    },
    /// Resource disappeared.
    Deleted(ResourceKey),
}

impl ResourceEvent {
    /// Key the event refers to.
    pub fn key(&self) -> &ResourceKey {
        match self {
            ResourceEvent::Created(snap) => snap.key(),
            ResourceEvent::Updated { new, .. } => new.key(),
            ResourceEvent::Deleted(key) => key,
        }
    }

    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResourceEvent::Created(_) => "created",
            ResourceEvent::Updated { .. } => "updated",
            ResourceEvent::Deleted(_) => "deleted",
        }
    }
}
