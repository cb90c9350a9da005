//! CIS global load balancers.
//!
//! A load balancer lives in a DNS zone (domain) which lives in a CIS
//! instance, so its local identifier is `glb:zone:cis`. Pool and domain
//! references are stored in the same composite form, `object:cis`.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ProviderConfig;
use crate::controller::ResourceModel;
use crate::data::ResourceData;
use crate::drift::DriftPolicy;
use crate::error::ProviderError;
use crate::identifier::ResourceHandle;
use crate::resources::{cis_object_id, cis_reference};
use crate::schema::{Attribute, Schema};

/// Accepted `session_affinity` values.
pub const SESSION_AFFINITY_VALUES: [&str; 2] = ["none", "cookie"];

/// Request body for creating or updating a load balancer.
///
/// Unset optional fields are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlbBody {
    /// DNS name the load balancer answers for.
    pub name: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pool used when every default pool is unhealthy.
    pub fallback_pool: String,
    /// Pools served in order of preference.
    pub default_pools: Vec<String>,
    /// DNS TTL in seconds; only meaningful when not proxied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    /// Whether traffic goes through the CIS proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
    /// `none` or `cookie`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_affinity: Option<String>,
    /// Whether the load balancer is serving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// A load balancer as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Glb {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub fallback_pool: String,
    pub default_pools: Vec<String>,
    pub ttl: Option<i64>,
    pub proxied: Option<bool>,
    pub session_affinity: Option<String>,
    pub enabled: Option<bool>,
    pub created_on: Option<String>,
    pub modified_on: Option<String>,
}

/// What the caller wants the load balancer to look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlbDesired {
    /// CIS instance the zone belongs to.
    pub cis_id: String,
    /// Zone (domain) id, without the instance suffix.
    pub zone_id: String,
    /// DNS name.
    pub name: String,
    /// Fallback pool id, without the instance suffix.
    pub fallback_pool: String,
    /// Default pool ids, without the instance suffix.
    pub default_pools: Vec<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// DNS TTL in seconds.
    pub ttl: Option<i64>,
    /// Whether traffic goes through the proxy.
    pub proxied: Option<bool>,
    /// Session affinity mode.
    pub session_affinity: Option<String>,
    /// Whether the load balancer is serving.
    pub enabled: Option<bool>,
}

impl GlbDesired {
    /// Reject combinations the API would refuse or silently rewrite.
    ///
    /// A TTL only applies to DNS-only load balancers, so `ttl` and `proxied`
    /// are mutually exclusive.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.ttl.is_some() && self.proxied.is_some() {
            return Err(ProviderError::ConflictingFields {
                first: "ttl",
                second: "proxied",
            });
        }

        if let Some(affinity) = &self.session_affinity {
            if !SESSION_AFFINITY_VALUES.contains(&affinity.as_str()) {
                return Err(ProviderError::Validation(format!(
                    "session_affinity must be one of {:?}, got {:?}",
                    SESSION_AFFINITY_VALUES, affinity
                )));
            }
        }

        if self.default_pools.is_empty() {
            return Err(ProviderError::Validation(
                "default_pool_ids must name at least one pool".to_string(),
            ));
        }

        Ok(())
    }
}

/// The load balancer state written back after a read.
///
/// Fields mirror the resource schema; absent remote values become zero values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct GlbObserved {
    pub cis_id: String,
    pub domain_id: String,
    pub name: String,
    pub description: String,
    pub fallback_pool_id: String,
    pub default_pool_ids: Vec<String>,
    pub ttl: i64,
    pub proxied: bool,
    pub session_affinity: String,
    pub enabled: bool,
    pub created_on: String,
    pub modified_on: String,
}

/// Projections for `cloudnet_global_load_balancer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlbModel;

impl ResourceModel for GlbModel {
    type Desired = GlbDesired;
    type Payload = GlbBody;
    type Object = Glb;
    type Observed = GlbObserved;

    const RESOURCE_TYPE: &'static str = "cloudnet_global_load_balancer";
    const ARITY: usize = 3;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A CIS global load balancer")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "cis_id",
                Attribute::required_string()
                    .with_description("CIS instance id")
                    .with_force_new(),
            )
            .with_attribute(
                "domain_id",
                Attribute::required_string()
                    .with_description("Associated CIS domain, as zone:cis")
                    .with_force_new(),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("DNS name of the load balancer"),
            )
            .with_attribute(
                "fallback_pool_id",
                Attribute::required_string().with_description("Fallback pool, as pool:cis"),
            )
            .with_attribute(
                "default_pool_ids",
                Attribute::required_string_set().with_description("Default pools, as pool:cis"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description of the load balancer"),
            )
            .with_attribute(
                "ttl",
                Attribute::optional_int64()
                    .with_description("DNS TTL; conflicts with proxied"),
            )
            .with_attribute(
                "proxied",
                Attribute::optional_bool()
                    .with_description("Route traffic through the proxy; conflicts with ttl"),
            )
            .with_attribute(
                "session_affinity",
                Attribute::optional_string()
                    .with_default(json!("none"))
                    .with_allowed_values(SESSION_AFFINITY_VALUES)
                    .with_description("Session affinity mode"),
            )
            .with_attribute(
                "enabled",
                Attribute::optional_bool()
                    .with_default(json!(true))
                    .with_description("Whether the load balancer is enabled"),
            )
            .with_attribute(
                "created_on",
                Attribute::computed_string().with_description("Creation timestamp"),
            )
            .with_attribute(
                "modified_on",
                Attribute::computed_string().with_description("Last modification timestamp"),
            )
    }

    fn drift_policy() -> DriftPolicy {
        // CIS answers reads inside a deleted instance with a 400
        DriftPolicy::default().with_message_signal("Invalid zone identifier")
    }

    fn desired_from(
        data: &ResourceData<'_>,
        _config: &ProviderConfig,
    ) -> Result<GlbDesired, ProviderError> {
        let cis_id = data.require_str("cis_id")?;
        let zone_id = cis_object_id("domain_id", &data.require_str("domain_id")?, &cis_id)?;
        let fallback_pool =
            cis_object_id("fallback_pool_id", &data.require_str("fallback_pool_id")?, &cis_id)?;

        let default_pools = data
            .get_str_set("default_pool_ids")?
            .iter()
            .map(|reference| cis_object_id("default_pool_ids", reference, &cis_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GlbDesired {
            cis_id,
            zone_id,
            name: data.require_str("name")?,
            fallback_pool,
            default_pools,
            description: data.get_str("description")?,
            ttl: data.get_i64("ttl")?,
            proxied: data.get_bool("proxied")?,
            session_affinity: data.get_str("session_affinity")?,
            enabled: data.get_bool("enabled")?,
        })
    }

    fn parent_scope(desired: &GlbDesired) -> Result<ResourceHandle, ProviderError> {
        Ok(ResourceHandle::new([
            desired.zone_id.as_str(),
            desired.cis_id.as_str(),
        ]))
    }

    fn to_remote_request(desired: &GlbDesired) -> Result<GlbBody, ProviderError> {
        desired.validate()?;

        Ok(GlbBody {
            name: desired.name.clone(),
            description: desired.description.clone(),
            fallback_pool: desired.fallback_pool.clone(),
            default_pools: desired.default_pools.clone(),
            ttl: desired.ttl,
            proxied: desired.proxied,
            session_affinity: desired.session_affinity.clone(),
            enabled: desired.enabled,
        })
    }

    fn leaf_id(object: &Glb) -> String {
        object.id.clone()
    }

    fn from_remote_response(
        handle: &ResourceHandle,
        object: &Glb,
    ) -> Result<GlbObserved, ProviderError> {
        let zone_id = handle.component(1).unwrap_or_default();
        let cis_id = handle.root();

        let default_pool_ids = object
            .default_pools
            .iter()
            .map(|pool| cis_reference(pool, cis_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GlbObserved {
            cis_id: cis_id.to_string(),
            domain_id: cis_reference(zone_id, cis_id)?,
            name: object.name.clone(),
            description: object.description.clone().unwrap_or_default(),
            fallback_pool_id: cis_reference(&object.fallback_pool, cis_id)?,
            default_pool_ids,
            ttl: object.ttl.unwrap_or_default(),
            proxied: object.proxied.unwrap_or_default(),
            session_affinity: object.session_affinity.clone().unwrap_or_default(),
            enabled: object.enabled.unwrap_or_default(),
            created_on: object.created_on.clone().unwrap_or_default(),
            modified_on: object.modified_on.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation;
    use serde_json::Value;

    fn config() -> Value {
        json!({
            "cis_id": "cis1",
            "domain_id": "zone1:cis1",
            "name": "www.example.com",
            "fallback_pool_id": "pool-fb:cis1",
            "default_pool_ids": ["pool-a:cis1", "pool-b:cis1"],
        })
    }

    fn desired(value: &Value) -> Result<GlbDesired, ProviderError> {
        let schema = GlbModel::schema();
        let data = ResourceData::for_create(&schema, value);
        GlbModel::desired_from(&data, &ProviderConfig::default())
    }

    #[test]
    fn test_schema_accepts_config() {
        assert!(validation::is_valid(&GlbModel::schema(), &config()));
    }

    #[test]
    fn test_desired_decodes_references_and_substitutes_defaults() {
        let desired = desired(&config()).unwrap();

        assert_eq!(desired.zone_id, "zone1");
        assert_eq!(desired.fallback_pool, "pool-fb");
        assert_eq!(desired.default_pools, vec!["pool-a", "pool-b"]);
        assert_eq!(desired.session_affinity.as_deref(), Some("none"));
        assert_eq!(desired.enabled, Some(true));
        assert_eq!(desired.ttl, None);
        assert_eq!(desired.proxied, None);

        let parent = GlbModel::parent_scope(&desired).unwrap();
        assert_eq!(parent, ResourceHandle::new(["zone1", "cis1"]));
    }

    #[test]
    fn test_payload_omits_unset_fields() {
        let mut value = config();
        value["ttl"] = json!(300);

        let body = GlbModel::to_remote_request(&desired(&value).unwrap()).unwrap();
        let wire = serde_json::to_value(&body).unwrap();

        assert_eq!(wire["ttl"], 300);
        assert!(wire.get("proxied").is_none());
        assert!(wire.get("description").is_none());
        assert_eq!(wire["session_affinity"], "none");
        assert_eq!(wire["default_pools"], json!(["pool-a", "pool-b"]));
    }

    #[test]
    fn test_ttl_conflicts_with_proxied() {
        let mut value = config();
        value["ttl"] = json!(120);
        value["proxied"] = json!(true);

        let err = GlbModel::to_remote_request(&desired(&value).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::ConflictingFields {
                first: "ttl",
                second: "proxied"
            }
        ));
    }

    #[test]
    fn test_malformed_reference() {
        let mut value = config();
        value["fallback_pool_id"] = json!("pool-without-instance");

        assert!(matches!(
            desired(&value),
            Err(ProviderError::MalformedIdentifier { expected: 2, .. })
        ));
    }

    #[test]
    fn test_reference_to_another_instance_rejected() {
        let mut value = config();
        value["domain_id"] = json!("zone1:cisX");

        match desired(&value) {
            Err(ProviderError::Validation(msg)) => {
                assert!(msg.contains("domain_id"));
                assert!(msg.contains("cisX"));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let mut value = config();
        value["default_pool_ids"] = json!(["pool-a:cis1", "pool-b:cis2"]);
        assert!(matches!(
            desired(&value),
            Err(ProviderError::Validation(msg)) if msg.contains("default_pool_ids")
        ));
    }

    #[test]
    fn test_invalid_session_affinity() {
        let mut value = config();
        value["session_affinity"] = json!("ip_cookie");

        let err = GlbModel::to_remote_request(&desired(&value).unwrap()).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_observed_zero_values_and_references() {
        let handle = ResourceHandle::new(["glb1", "zone1", "cis1"]);
        let object = Glb {
            id: "glb1".to_string(),
            name: "www.example.com".to_string(),
            fallback_pool: "pool-fb".to_string(),
            default_pools: vec!["pool-a".to_string()],
            created_on: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };

        let observed = GlbModel::from_remote_response(&handle, &object).unwrap();
        assert_eq!(observed.cis_id, "cis1");
        assert_eq!(observed.domain_id, "zone1:cis1");
        assert_eq!(observed.fallback_pool_id, "pool-fb:cis1");
        assert_eq!(observed.default_pool_ids, vec!["pool-a:cis1"]);
        assert_eq!(observed.ttl, 0);
        assert!(!observed.proxied);
        assert_eq!(observed.description, "");
        assert_eq!(observed.modified_on, "");
    }

    #[test]
    fn test_glb_deserializes_sparse_response() {
        let glb: Glb = serde_json::from_value(json!({
            "id": "glb1",
            "name": "www.example.com",
            "proxied": true,
            "unknown_field": 1
        }))
        .unwrap();

        assert_eq!(glb.proxied, Some(true));
        assert!(glb.default_pools.is_empty());
        assert_eq!(glb.ttl, None);
    }
}
