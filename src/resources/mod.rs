//! Resource types managed by this provider.
//!
//! Each submodule holds the wire types for one API object, the typed desired
//! and observed states, and the [`ResourceModel`](crate::controller::ResourceModel)
//! that projects between them.

pub mod glb;
pub mod vpn_gateway;

pub use glb::{Glb, GlbBody, GlbDesired, GlbModel, GlbObserved};
pub use vpn_gateway::{
    VpnGateway, VpnGatewayDesired, VpnGatewayModel, VpnGatewayObserved, VpnGatewayPrototype,
};

use crate::error::ProviderError;
use crate::identifier::{self, ResourceHandle};

/// Arity of references to objects inside a CIS instance (`object:cis`).
pub(crate) const CIS_REFERENCE_ARITY: usize = 2;

/// Split a `object:cis` reference attribute into its remote object id.
///
/// The instance suffix must name `cis_id`; `attribute` is reported otherwise.
pub(crate) fn cis_object_id(
    attribute: &str,
    reference: &str,
    cis_id: &str,
) -> Result<String, ProviderError> {
    let handle = identifier::decode(reference, CIS_REFERENCE_ARITY)?;
    if handle.root() != cis_id {
        return Err(ProviderError::Validation(format!(
            "attribute '{}' references instance '{}', expected '{}'",
            attribute,
            handle.root(),
            cis_id
        )));
    }
    Ok(handle.leaf().to_string())
}

/// Encode a remote object id inside a CIS instance as `object:cis`.
pub(crate) fn cis_reference(object_id: &str, cis_id: &str) -> Result<String, ProviderError> {
    identifier::encode(&ResourceHandle::new([object_id, cis_id]))
}
