use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Unique identifier of a watched resource: its name within a namespace.
///
/// Cheap to clone (both parts are `Arc<str>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    namespace: Arc<str>,
    name: Arc<str>,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Immutable view of a resource.
///
/// Holds the string `data` map (the reconciled payload lives in one of its
/// fields, `config` by default) plus other attributes. Two snapshots are
/// compared for reconciliation only through [`ResourceSnapshot::relevant_eq`];
/// there is deliberately no `PartialEq`.
#[derive(Clone, Debug)]
pub struct ResourceSnapshot {
    key: ResourceKey,
    labels: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
    created_at: SystemTime,
    revision: u64,
}

impl ResourceSnapshot {
    /// Creates a snapshot with no labels and no data.
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            labels: BTreeMap::new(),
            data: BTreeMap::new(),
            created_at: SystemTime::now(),
            revision: 0,
        }
    }

    /// Adds (or replaces) one label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds (or replaces) one data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    #[must_use]
    pub(crate) fn with_created_at(mut self, at: SystemTime) -> Self {
        self.created_at = at;
        self
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Value of one data field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data.get(name).map(String::as_str)
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Store revision this snapshot was taken at (0 when unknown).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Exact equality on the designated relevant field only.
    ///
    /// A field missing on both sides is equal; missing on one side only is a change.
    pub fn relevant_eq(&self, other: &ResourceSnapshot, field: &str) -> bool {
        self.field(field) == other.field(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(config: &str) -> ResourceSnapshot {
        ResourceSnapshot::new(ResourceKey::new("default", "test-config"))
            .with_label("component", "my-config")
            .with_data("config", config)
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            ResourceKey::new("default", "test-config").to_string(),
            "default/test-config"
        );
    }

    #[test]
    fn test_irrelevant_changes_compare_equal() {
        let old = cm("v1").with_data("other", "a").with_revision(1);
        let new = cm("v1")
            .with_data("other", "b")
            .with_label("team", "x")
            .with_revision(2);
        assert!(old.relevant_eq(&new, "config"));
        assert!(!old.relevant_eq(&new, "other"));
    }

    #[test]
    fn test_missing_field_on_one_side_is_a_change() {
        let with = cm("v1");
        let without = ResourceSnapshot::new(ResourceKey::new("default", "test-config"));
        assert!(!with.relevant_eq(&without, "config"));
        assert!(without.relevant_eq(&without.clone(), "config"));
    }
}
