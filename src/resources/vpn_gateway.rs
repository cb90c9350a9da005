//! VPC VPN gateways.
//!
//! Gateways are created inside a subnet, so the local identifier is
//! `gateway:subnet`. Only the name can change in place.

use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::controller::ResourceModel;
use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::identifier::ResourceHandle;
use crate::schema::{Attribute, Schema};

/// A reference to another VPC object by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdRef {
    /// The referenced object's id.
    pub id: String,
}

impl IdRef {
    fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The gateway's public address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicIp {
    /// IPv4 address.
    pub address: String,
}

/// Request body for creating or renaming a gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnGatewayPrototype {
    /// Gateway name.
    pub name: String,
    /// Subnet to place the gateway in.
    pub subnet: IdRef,
    /// Resource group; the account default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdRef>,
}

/// A gateway as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct VpnGateway {
    pub id: String,
    pub name: String,
    pub crn: String,
    pub href: String,
    pub created_at: String,
    pub status: String,
    pub public_ip: PublicIp,
    pub subnet: IdRef,
    pub resource_group: Option<IdRef>,
    pub connections: Vec<IdRef>,
}

/// What the caller wants the gateway to look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpnGatewayDesired {
    /// Gateway name.
    pub name: String,
    /// Subnet id.
    pub subnet: String,
    /// Resource group id, after falling back to the provider's.
    pub resource_group: Option<String>,
}

impl VpnGatewayDesired {
    /// Reject a blank name before any remote call.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.name.trim().is_empty() {
            return Err(ProviderError::Validation(
                "name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// The gateway state written back after a read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct VpnGatewayObserved {
    pub name: String,
    pub subnet: String,
    pub resource_group: String,
    pub status: String,
    pub public_ip_address: String,
    pub created_at: String,
    pub crn: String,
    pub href: String,
}

/// Projections for `cloudnet_vpn_gateway`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VpnGatewayModel;

impl ResourceModel for VpnGatewayModel {
    type Desired = VpnGatewayDesired;
    type Payload = VpnGatewayPrototype;
    type Object = VpnGateway;
    type Observed = VpnGatewayObserved;

    const RESOURCE_TYPE: &'static str = "cloudnet_vpn_gateway";
    const ARITY: usize = 2;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A VPC VPN gateway")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Gateway name"),
            )
            .with_attribute(
                "subnet",
                Attribute::required_string()
                    .with_description("Subnet the gateway is placed in")
                    .with_force_new(),
            )
            .with_attribute(
                "resource_group",
                Attribute::optional_string()
                    .with_description("Resource group; defaults to the provider's")
                    .with_computed()
                    .with_force_new(),
            )
            .with_attribute("status", Attribute::computed_string())
            .with_attribute(
                "public_ip_address",
                Attribute::computed_string().with_description("Public address of the gateway"),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("crn", Attribute::computed_string())
            .with_attribute("href", Attribute::computed_string())
    }

    fn desired_from(
        data: &ResourceData<'_>,
        config: &ProviderConfig,
    ) -> Result<VpnGatewayDesired, ProviderError> {
        Ok(VpnGatewayDesired {
            name: data.require_str("name")?,
            subnet: data.require_str("subnet")?,
            resource_group: data
                .get_str("resource_group")?
                .or_else(|| config.resource_group.clone()),
        })
    }

    fn parent_scope(desired: &VpnGatewayDesired) -> Result<ResourceHandle, ProviderError> {
        Ok(ResourceHandle::new([desired.subnet.as_str()]))
    }

    fn to_remote_request(desired: &VpnGatewayDesired) -> Result<VpnGatewayPrototype, ProviderError> {
        desired.validate()?;

        Ok(VpnGatewayPrototype {
            name: desired.name.clone(),
            subnet: IdRef::new(&desired.subnet),
            resource_group: desired.resource_group.as_deref().map(IdRef::new),
        })
    }

    fn leaf_id(object: &VpnGateway) -> String {
        object.id.clone()
    }

    fn from_remote_response(
        handle: &ResourceHandle,
        object: &VpnGateway,
    ) -> Result<VpnGatewayObserved, ProviderError> {
        let subnet = if object.subnet.id.is_empty() {
            handle.root().to_string()
        } else {
            object.subnet.id.clone()
        };

        Ok(VpnGatewayObserved {
            name: object.name.clone(),
            subnet,
            resource_group: object
                .resource_group
                .as_ref()
                .map(|group| group.id.clone())
                .unwrap_or_default(),
            status: object.status.clone(),
            public_ip_address: object.public_ip.address.clone(),
            created_at: object.created_at.clone(),
            crn: object.crn.clone(),
            href: object.href.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_group_falls_back_to_provider() {
        let schema = VpnGatewayModel::schema();
        let planned = json!({"name": "gw1", "subnet": "subnet-7"});
        let data = ResourceData::for_create(&schema, &planned);

        let config = ProviderConfig {
            resource_group: Some("rg-default".to_string()),
            region: None,
        };
        let desired = VpnGatewayModel::desired_from(&data, &config).unwrap();
        assert_eq!(desired.resource_group.as_deref(), Some("rg-default"));

        let body = VpnGatewayModel::to_remote_request(&desired).unwrap();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "name": "gw1",
                "subnet": {"id": "subnet-7"},
                "resource_group": {"id": "rg-default"}
            })
        );
        assert_eq!(
            VpnGatewayModel::parent_scope(&desired).unwrap(),
            ResourceHandle::new(["subnet-7"])
        );
    }

    #[test]
    fn test_blank_name_rejected() {
        let desired = VpnGatewayDesired {
            name: "  ".to_string(),
            subnet: "subnet-7".to_string(),
            resource_group: None,
        };
        assert!(matches!(
            VpnGatewayModel::to_remote_request(&desired),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn test_observed_from_response() {
        let object: VpnGateway = serde_json::from_value(json!({
            "id": "gw-1",
            "name": "gw1",
            "status": "pending",
            "public_ip": {"address": "169.61.1.1"},
            "resource_group": {"id": "rg-1"}
        }))
        .unwrap();

        let handle = ResourceHandle::new(["gw-1", "subnet-7"]);
        let observed = VpnGatewayModel::from_remote_response(&handle, &object).unwrap();

        assert_eq!(observed.subnet, "subnet-7");
        assert_eq!(observed.resource_group, "rg-1");
        assert_eq!(observed.status, "pending");
        assert_eq!(observed.public_ip_address, "169.61.1.1");
        assert_eq!(observed.crn, "");
    }
}
