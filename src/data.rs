//! The declarative field store.
//!
//! [`ResourceData`] wraps the JSON states handed over by the engine for one
//! reconciliation cycle. It exposes typed getters over the desired
//! configuration (with schema defaults substituted), collects the values the
//! controller writes back, and answers "did this attribute change since the
//! last sync" for update no-op detection.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::{AttributeType, Schema};

/// The attribute the local identifier is stored under.
pub const ID_ATTRIBUTE: &str = "id";

/// Field access for a single resource instance during one cycle.
#[derive(Debug, Clone)]
pub struct ResourceData<'s> {
    schema: &'s Schema,
    prior: Map<String, Value>,
    config: Map<String, Value>,
    written: Map<String, Value>,
    id: Option<String>,
}

impl<'s> ResourceData<'s> {
    /// Data for a create: no prior state, no identifier yet.
    pub fn for_create(schema: &'s Schema, planned: &Value) -> Self {
        Self {
            schema,
            prior: Map::new(),
            config: object_of(planned),
            written: Map::new(),
            id: None,
        }
    }

    /// Data for a read, delete or import: the stored state is both the
    /// last-synced snapshot and the caller's view of the resource.
    pub fn from_state(schema: &'s Schema, current: &Value) -> Self {
        let state = object_of(current);
        let id = string_of(state.get(ID_ATTRIBUTE));
        Self {
            schema,
            prior: state.clone(),
            config: state,
            written: Map::new(),
            id,
        }
    }

    /// Data for an update from the last-synced `prior` state to `planned`.
    pub fn for_update(schema: &'s Schema, prior: &Value, planned: &Value) -> Self {
        let prior = object_of(prior);
        let config = object_of(planned);
        let id = string_of(config.get(ID_ATTRIBUTE)).or_else(|| string_of(prior.get(ID_ATTRIBUTE)));
        Self {
            schema,
            prior,
            config,
            written: Map::new(),
            id,
        }
    }

    /// The schema this data is read against.
    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    // =========================================================================
    // Identifier
    // =========================================================================

    /// The local identifier, if bound.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The local identifier, or a malformed-identifier error if unbound.
    pub fn require_id(&self, arity: usize) -> Result<&str, ProviderError> {
        self.id().ok_or_else(|| ProviderError::MalformedIdentifier {
            id: String::new(),
            expected: arity,
            found: 0,
        })
    }

    /// Bind this instance to a remote object.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Drop the binding; [`ResourceData::into_state`] then yields null.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// The value explicitly present for `name`, if any.
    ///
    /// Values written during this cycle take precedence over configuration.
    pub fn get_ok(&self, name: &str) -> Option<&Value> {
        self.written
            .get(name)
            .or_else(|| self.config.get(name))
            .filter(|v| !v.is_null())
    }

    /// Whether `name` was explicitly set.
    pub fn is_set(&self, name: &str) -> bool {
        self.get_ok(name).is_some()
    }

    /// The value for `name`, falling back to the schema default.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_ok(name).cloned().or_else(|| {
            self.schema
                .attribute(name)
                .and_then(|attr| attr.default.clone())
        })
    }

    /// A string attribute, with default substitution.
    pub fn get_str(&self, name: &str) -> Result<Option<String>, ProviderError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(type_mismatch(name, "string", &other)),
        }
    }

    /// A required string attribute.
    pub fn require_str(&self, name: &str) -> Result<String, ProviderError> {
        self.get_str(name)?.ok_or_else(|| {
            ProviderError::Validation(format!("Missing required attribute '{}'", name))
        })
    }

    /// An integer attribute, with default substitution.
    pub fn get_i64(&self, name: &str) -> Result<Option<i64>, ProviderError> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| type_mismatch(name, "int64", &v)),
        }
    }

    /// A boolean attribute, with default substitution.
    pub fn get_bool(&self, name: &str) -> Result<Option<bool>, ProviderError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(type_mismatch(name, "bool", &other)),
        }
    }

    /// A set or list of strings; empty when unset.
    pub fn get_str_set(&self, name: &str) -> Result<Vec<String>, ProviderError> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(type_mismatch(name, "string element", &other)),
                })
                .collect(),
            Some(other) => Err(type_mismatch(name, "set", &other)),
        }
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Write a value back into state.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.written.insert(name.into(), value.into());
    }

    /// Write every field of a serializable struct back into state.
    pub fn set_all<T: Serialize>(&mut self, fields: &T) -> Result<(), ProviderError> {
        match serde_json::to_value(fields)? {
            Value::Object(map) => {
                self.written.extend(map);
                Ok(())
            },
            other => Err(ProviderError::Sdk(format!(
                "expected observed state to serialize as an object, got {}",
                other
            ))),
        }
    }

    // =========================================================================
    // Change tracking
    // =========================================================================

    /// Whether a configurable attribute differs between the last-synced
    /// snapshot and the desired configuration.
    ///
    /// Unset values compare as their schema default or zero value, and sets
    /// compare without regard to order.
    ///
    /// An unset attribute the provider computes never counts as changed.
    pub fn has_change(&self, name: &str) -> bool {
        if self.defers_to_remote(name) {
            return false;
        }
        self.normalized(name, self.prior.get(name)) != self.normalized(name, self.config.get(name))
    }

    /// Configurable attributes that changed since the last sync.
    pub fn changed_attributes(&self) -> Vec<&'s str> {
        self.schema
            .configurable_attributes()
            .filter(|name| self.has_change(name))
            .collect()
    }

    /// Whether any configurable attribute changed since the last sync.
    pub fn has_any_change(&self) -> bool {
        self.schema
            .configurable_attributes()
            .any(|name| self.has_change(name))
    }

    /// Configurable attributes whose written-back value disagrees with the
    /// caller's view. Used to tell `Synced` from `Drifted` after a read.
    pub fn drifted_attributes(&self) -> Vec<&'s str> {
        self.schema
            .configurable_attributes()
            .filter(|name| match self.written.get(*name) {
                Some(_) if self.defers_to_remote(name) => false,
                Some(observed) => {
                    self.normalized(name, Some(observed))
                        != self.normalized(name, self.config.get(*name))
                },
                None => false,
            })
            .collect()
    }

    fn defers_to_remote(&self, name: &str) -> bool {
        let unset = self.config.get(name).map_or(true, Value::is_null);
        unset
            && self
                .schema
                .attribute(name)
                .is_some_and(|attr| attr.flags.computed)
    }

    fn normalized(&self, name: &str, value: Option<&Value>) -> Value {
        let attr = self.schema.attribute(name);
        let value = match value {
            Some(v) if !v.is_null() => v.clone(),
            _ => attr.map(|a| a.fallback_value()).unwrap_or(Value::Null),
        };

        match (attr.map(|a| &a.attr_type), value) {
            (Some(AttributeType::Set(_)), Value::Array(mut items)) => {
                items.sort_by_key(|item| item.to_string());
                items.dedup();
                Value::Array(items)
            },
            (_, value) => value,
        }
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// The state to persist: configuration overlaid with written values and
    /// the identifier, or `Value::Null` when unbound.
    pub fn into_state(self) -> Value {
        let Some(id) = self.id else {
            return Value::Null;
        };

        let mut state = self.config;
        state.extend(self.written);
        state.insert(ID_ATTRIBUTE.to_string(), Value::String(id));
        Value::Object(state)
    }
}

fn object_of(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

fn string_of(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn type_mismatch(name: &str, expected: &str, got: &Value) -> ProviderError {
    ProviderError::Validation(format!(
        "attribute '{}' must be a {}, got {}",
        name, expected, got
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("ttl", Attribute::optional_int64())
            .with_attribute("proxied", Attribute::optional_bool())
            .with_attribute(
                "session_affinity",
                Attribute::optional_string().with_default(json!("none")),
            )
            .with_attribute("pools", Attribute::required_string_set())
            .with_attribute("created_on", Attribute::computed_string())
    }

    #[test]
    fn test_getters_and_defaults() {
        let schema = schema();
        let data = ResourceData::for_create(&schema, &json!({"name": "glb", "ttl": 120}));

        assert_eq!(data.get_str("name").unwrap(), Some("glb".to_string()));
        assert_eq!(data.get_i64("ttl").unwrap(), Some(120));
        assert_eq!(data.get_bool("proxied").unwrap(), None);
        assert!(!data.is_set("proxied"));
        assert_eq!(
            data.get_str("session_affinity").unwrap(),
            Some("none".to_string())
        );
        assert!(!data.is_set("session_affinity"));
        assert!(data.get_str_set("pools").unwrap().is_empty());
        assert!(data.id().is_none());
    }

    #[test]
    fn test_type_mismatch() {
        let schema = schema();
        let data = ResourceData::for_create(&schema, &json!({"name": 5, "ttl": "x"}));

        assert!(matches!(
            data.get_str("name"),
            Err(ProviderError::Validation(_))
        ));
        assert!(data.get_i64("ttl").is_err());
        assert!(data.require_str("missing").is_err());
    }

    #[test]
    fn test_null_is_unset() {
        let schema = schema();
        let data = ResourceData::for_create(&schema, &json!({"name": "glb", "ttl": null}));
        assert!(!data.is_set("ttl"));
        assert_eq!(data.get_i64("ttl").unwrap(), None);
    }

    #[test]
    fn test_has_change_normalizes_defaults_and_zero_values() {
        let schema = schema();
        let prior = json!({
            "id": "a:b",
            "name": "glb",
            "ttl": 0,
            "proxied": false,
            "session_affinity": "none",
            "pools": ["p2:cis", "p1:cis"],
            "created_on": "2024-01-01"
        });
        let planned = json!({"id": "a:b", "name": "glb", "pools": ["p1:cis", "p2:cis"]});

        let data = ResourceData::for_update(&schema, &prior, &planned);
        assert!(!data.has_any_change());
        assert!(data.changed_attributes().is_empty());

        let planned = json!({"id": "a:b", "name": "glb", "ttl": 300, "pools": ["p1:cis"]});
        let data = ResourceData::for_update(&schema, &prior, &planned);
        assert!(data.has_change("ttl"));
        assert!(data.has_change("pools"));
        assert!(!data.has_change("name"));
        assert_eq!(data.changed_attributes(), vec!["pools", "ttl"]);
    }

    #[test]
    fn test_unset_computed_attribute_defers_to_remote() {
        let schema = schema().with_attribute(
            "group",
            Attribute::optional_string().with_computed(),
        );
        let prior = json!({"id": "a:b", "name": "glb", "group": "rg-1"});

        let data = ResourceData::for_update(&schema, &prior, &json!({"name": "glb"}));
        assert!(!data.has_change("group"));

        let data = ResourceData::for_update(&schema, &prior, &json!({"name": "glb", "group": "rg-2"}));
        assert!(data.has_change("group"));

        let mut data = ResourceData::for_create(&schema, &json!({"name": "glb"}));
        data.set("group", "rg-1");
        assert!(data.drifted_attributes().is_empty());
    }

    #[test]
    fn test_empty_id_is_unbound() {
        let schema = schema();
        let data = ResourceData::from_state(&schema, &json!({"id": "", "name": "x"}));
        assert_eq!(data.id(), None);
        assert!(matches!(
            data.require_id(1),
            Err(ProviderError::MalformedIdentifier { found: 0, .. })
        ));
    }

    #[test]
    fn test_update_id_falls_back_to_prior() {
        let schema = schema();
        let data = ResourceData::for_update(&schema, &json!({"id": "a:b"}), &json!({"name": "x"}));
        assert_eq!(data.id(), Some("a:b"));
    }

    #[test]
    fn test_into_state_overlays_written_values() {
        let schema = schema();
        let mut data = ResourceData::for_create(&schema, &json!({"name": "glb"}));
        data.set("created_on", "2024-01-01T00:00:00Z");
        data.set("name", "glb-renamed");
        data.set_id("glb:zone:cis");

        let state = data.into_state();
        assert_eq!(state["id"], "glb:zone:cis");
        assert_eq!(state["name"], "glb-renamed");
        assert_eq!(state["created_on"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_cleared_id_yields_null_state() {
        let schema = schema();
        let mut data = ResourceData::from_state(&schema, &json!({"id": "a:b", "name": "x"}));
        assert_eq!(data.id(), Some("a:b"));
        data.clear_id();
        assert_eq!(data.into_state(), Value::Null);
    }

    #[test]
    fn test_drifted_attributes() {
        let schema = schema();
        let mut data =
            ResourceData::from_state(&schema, &json!({"id": "a:b", "name": "glb", "ttl": 120}));
        data.set("name", "glb");
        data.set("ttl", 120);
        data.set("created_on", "later");
        assert!(data.drifted_attributes().is_empty());

        data.set("ttl", 60);
        assert_eq!(data.drifted_attributes(), vec!["ttl"]);
    }

    #[test]
    fn test_set_all() {
        #[derive(Serialize)]
        struct Observed {
            name: String,
            ttl: i64,
        }

        let schema = schema();
        let mut data = ResourceData::for_create(&schema, &json!({}));
        data.set_all(&Observed {
            name: "glb".to_string(),
            ttl: 30,
        })
        .unwrap();
        assert_eq!(data.get_i64("ttl").unwrap(), Some(30));
        assert!(data.set_all(&"not an object").is_err());
    }
}
