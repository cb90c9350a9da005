//! The cloud networking provider.
//!
//! [`CloudNetProvider`] routes each engine call to the controller registered
//! for the resource type and translates controller outcomes into the plain
//! JSON states the engine stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config::ProviderConfig;
use crate::controller::{RemoteApi, ResourceController, ResourceLifecycle};
use crate::drift::ExistenceCheck;
use crate::error::ProviderError;
use crate::resources::{GlbModel, VpnGatewayModel};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Provider for global load balancers and VPN gateways.
///
/// The API clients are injected per resource type, so the same provider runs
/// against live endpoints or the in-memory fakes in [`crate::testing`].
pub struct CloudNetProvider {
    resources: BTreeMap<&'static str, Box<dyn ResourceLifecycle>>,
    config: RwLock<ProviderConfig>,
}

impl Default for CloudNetProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudNetProvider {
    /// A provider with no resource types registered.
    pub fn new() -> Self {
        Self {
            resources: BTreeMap::new(),
            config: RwLock::new(ProviderConfig::default()),
        }
    }

    /// Register a resource type.
    pub fn with_resource(mut self, lifecycle: impl ResourceLifecycle + 'static) -> Self {
        self.resources
            .insert(lifecycle.resource_type(), Box::new(lifecycle));
        self
    }

    /// Manage global load balancers through `api`.
    pub fn with_global_load_balancers<A>(self, api: Arc<A>) -> Self
    where
        A: RemoteApi<
                Payload = <GlbModel as crate::controller::ResourceModel>::Payload,
                Object = <GlbModel as crate::controller::ResourceModel>::Object,
            > + ExistenceCheck,
    {
        let existence: Arc<dyn ExistenceCheck> = api.clone();
        self.with_resource(ResourceController::<GlbModel, A>::new(api, existence))
    }

    /// Manage VPN gateways through `api`.
    pub fn with_vpn_gateways<A>(self, api: Arc<A>) -> Self
    where
        A: RemoteApi<
                Payload = <VpnGatewayModel as crate::controller::ResourceModel>::Payload,
                Object = <VpnGatewayModel as crate::controller::ResourceModel>::Object,
            > + ExistenceCheck,
    {
        let existence: Arc<dyn ExistenceCheck> = api.clone();
        self.with_resource(ResourceController::<VpnGatewayModel, A>::new(api, existence))
    }

    /// The configuration applied by the last `configure` call.
    pub async fn config(&self) -> ProviderConfig {
        self.config.read().await.clone()
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn ResourceLifecycle, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|lifecycle| lifecycle.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for CloudNetProvider {
    fn schema(&self) -> ProviderSchema {
        self.resources.values().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, lifecycle| {
                schema.with_resource(lifecycle.resource_type(), lifecycle.schema().clone())
            },
        )
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(ProviderConfig::validate(&config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let parsed = ProviderConfig::from_value(config)?;
        info!(
            resource_group = parsed.resource_group.as_deref().unwrap_or("<unset>"),
            region = parsed.region.as_deref().unwrap_or("<unset>"),
            "provider configured"
        );
        *self.config.write().await = parsed;
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("provider stopping");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let provider = self.config.read().await;
        Ok(self.resource(resource_type)?.validate(&config, &provider))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let current = self.resource(resource_type)?.schema().version;
        if version > current {
            return Err(ProviderError::InvalidRequest(format!(
                "state for {} has schema version {}, newer than {}",
                resource_type, version, current
            )));
        }
        Ok(state)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.resource(resource_type)?
            .plan(prior_state.as_ref(), &proposed_state)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let provider = self.config().await;
        Ok(resource.create(&planned_state, &provider).await?.state)
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let reconciled = self.resource(resource_type)?.read(&current_state).await?;
        Ok(reconciled.state)
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let provider = self.config().await;
        Ok(resource
            .update(&prior_state, &planned_state, &provider)
            .await?
            .state)
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.resource(resource_type)?.delete(&current_state).await?;
        Ok(())
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let imported = self.resource(resource_type)?.import(id).await?;
        Ok(vec![imported])
    }
}
