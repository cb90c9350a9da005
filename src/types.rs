//! Convenience types shared by the controller and the provider surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if unsetting).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata: the resource types it manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
}

/// Where a resource instance stands after a reconciliation cycle.
///
/// ```text
/// Unbound --create--> Bound --read--> Synced <--read--> Drifted
///                                        \                /
///                                         '-> Removed <--'
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// No local identifier; the remote object does not exist (yet).
    ///
    /// Names the state before create. No operation returns it.
    Unbound,
    /// An identifier is stored but the remote object has not been read back.
    Bound,
    /// The remote object matches what the caller last knew about.
    Synced,
    /// The remote object differs from what the caller last knew about.
    Drifted,
    /// The identifier was cleared: deleted by us or gone out-of-band.
    Removed,
}

impl Lifecycle {
    /// Whether the instance still tracks a remote object.
    pub fn is_bound(self) -> bool {
        matches!(self, Self::Bound | Self::Synced | Self::Drifted)
    }
}

/// The outcome of a create, read, or update cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// The new local state, `Value::Null` once removed.
    pub state: Value,
    /// The lifecycle stage the instance ended in.
    pub lifecycle: Lifecycle,
}

impl Reconciliation {
    /// A cycle that left the instance tracking a remote object.
    pub fn bound(state: Value, lifecycle: Lifecycle) -> Self {
        Self { state, lifecycle }
    }

    /// A cycle that dropped the instance from state.
    pub fn removed() -> Self {
        Self {
            state: Value::Null,
            lifecycle: Lifecycle::Removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("test"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("test")));

        let removed = AttributeChange::removed("ttl", json!(120));
        assert_eq!(removed.before, Some(json!(120)));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("ttl", json!(120), json!(300));
        assert_eq!(modified.before, Some(json!(120)));
        assert_eq!(modified.after, Some(json!(300)));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "glb:zone:cis"}));
        assert!(no_change.changes.is_empty());
        assert!(!no_change.requires_replace);

        let with_changes = PlanResult::with_changes(
            json!({"id": "glb:zone:cis", "name": "new"}),
            vec![AttributeChange::modified("name", json!("old"), json!("new"))],
            false,
        );
        assert_eq!(with_changes.changes.len(), 1);
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("cloudnet_vpn_gateway", json!({"id": "gw:subnet"}));
        assert_eq!(imported.resource_type, "cloudnet_vpn_gateway");
        assert_eq!(imported.state["id"], "gw:subnet");
    }

    #[test]
    fn test_lifecycle() {
        assert!(Lifecycle::Synced.is_bound());
        assert!(Lifecycle::Drifted.is_bound());
        assert!(!Lifecycle::Unbound.is_bound());
        assert!(!Lifecycle::Removed.is_bound());

        let removed = Reconciliation::removed();
        assert_eq!(removed.state, Value::Null);
        assert_eq!(removed.lifecycle, Lifecycle::Removed);

        assert_eq!(
            serde_json::to_value(Lifecycle::Drifted).unwrap(),
            json!("drifted")
        );
    }
}
