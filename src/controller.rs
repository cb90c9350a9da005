//! The drift-reconciling CRUD lifecycle.
//!
//! A resource type plugs in two things:
//!
//! - a [`ResourceModel`]: its schema, identifier arity, and the pure field
//!   projections between local state and the wire payloads, and
//! - a [`RemoteApi`]: the four remote calls for that type.
//!
//! [`ResourceController`] runs the state machine over them once for every
//! resource type:
//!
//! - **create** projects the desired state, calls the API, binds the
//!   composite identifier and reads the object straight back.
//! - **read** refreshes state, or clears it when the object (or one of its
//!   ancestors) was deleted out-of-band.
//! - **update** skips the remote call when nothing configurable changed, and
//!   always finishes with a read.
//! - **delete** confirms the object still exists first; deleting something
//!   already gone succeeds.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ProviderConfig;
use crate::data::{ResourceData, ID_ATTRIBUTE};
use crate::drift::{DriftClass, DriftDetector, DriftPolicy, ExistenceCheck};
use crate::error::{ApiError, ProviderError};
use crate::identifier::{self, ResourceHandle};
use crate::schema::{Diagnostic, Schema};
use crate::types::{AttributeChange, ImportedResource, Lifecycle, PlanResult, Reconciliation};
use crate::validation;

/// The four remote operations of one resource type.
#[async_trait::async_trait]
pub trait RemoteApi: Send + Sync + 'static {
    /// Create/update request body.
    type Payload: Send + Sync;
    /// Object returned by the API.
    type Object: Send + Sync;

    /// Create an object inside `parent`.
    async fn create(
        &self,
        parent: &ResourceHandle,
        payload: &Self::Payload,
    ) -> Result<Self::Object, ApiError>;

    /// Fetch the object addressed by `handle`.
    async fn get(&self, handle: &ResourceHandle) -> Result<Self::Object, ApiError>;

    /// Replace the object addressed by `handle`.
    async fn update(
        &self,
        handle: &ResourceHandle,
        payload: &Self::Payload,
    ) -> Result<Self::Object, ApiError>;

    /// Delete the object addressed by `handle`.
    async fn delete(&self, handle: &ResourceHandle) -> Result<(), ApiError>;
}

/// Schema and field projections for one resource type.
///
/// Every function here is pure; none of them touch the network.
pub trait ResourceModel: Send + Sync + 'static {
    /// The caller's desired state as a typed value.
    type Desired: Send + Sync;
    /// Create/update request body.
    type Payload: Send + Sync;
    /// Object returned by the API.
    type Object: Send + Sync;
    /// The state written back after a read.
    type Observed: Serialize;

    /// Resource type name as exposed in the provider schema.
    const RESOURCE_TYPE: &'static str;
    /// Number of components in the local identifier.
    const ARITY: usize;

    /// The resource schema.
    fn schema() -> Schema;

    /// Error signals that mean the object is gone.
    fn drift_policy() -> DriftPolicy {
        DriftPolicy::default()
    }

    /// Read the desired state out of the field store.
    fn desired_from(
        data: &ResourceData<'_>,
        config: &ProviderConfig,
    ) -> Result<Self::Desired, ProviderError>;

    /// The scope a new object is created in; `ARITY - 1` components.
    fn parent_scope(desired: &Self::Desired) -> Result<ResourceHandle, ProviderError>;

    /// Build the request body, rejecting invalid combinations of fields.
    fn to_remote_request(desired: &Self::Desired) -> Result<Self::Payload, ProviderError>;

    /// The id the API assigned to a created object.
    fn leaf_id(object: &Self::Object) -> String;

    /// Map an API object into observed state.
    fn from_remote_response(
        handle: &ResourceHandle,
        object: &Self::Object,
    ) -> Result<Self::Observed, ProviderError>;
}

/// A resource type as the provider sees it, independent of its model.
#[async_trait::async_trait]
pub trait ResourceLifecycle: Send + Sync {
    /// Resource type name.
    fn resource_type(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> &Schema;

    /// Validate a resource configuration before planning.
    fn validate(&self, config: &Value, provider: &ProviderConfig) -> Vec<Diagnostic>;

    /// Diff the prior state against the proposed one.
    fn plan(&self, prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError>;

    /// Create the remote object and read it back.
    async fn create(
        &self,
        planned: &Value,
        provider: &ProviderConfig,
    ) -> Result<Reconciliation, ProviderError>;

    /// Refresh state from the remote object.
    async fn read(&self, current: &Value) -> Result<Reconciliation, ProviderError>;

    /// Apply changed fields, then refresh.
    async fn update(
        &self,
        prior: &Value,
        planned: &Value,
        provider: &ProviderConfig,
    ) -> Result<Reconciliation, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, current: &Value) -> Result<Lifecycle, ProviderError>;

    /// Bring an existing remote object under management.
    async fn import(&self, id: &str) -> Result<ImportedResource, ProviderError>;
}

/// Runs the CRUD lifecycle for model `M` against API `A`.
pub struct ResourceController<M, A> {
    api: Arc<A>,
    detector: DriftDetector,
    schema: Schema,
    _model: PhantomData<fn() -> M>,
}

impl<M, A> ResourceController<M, A>
where
    M: ResourceModel,
    A: RemoteApi<Payload = M::Payload, Object = M::Object>,
{
    /// A controller confirming deletions through `existence`.
    pub fn new(api: Arc<A>, existence: Arc<dyn ExistenceCheck>) -> Self {
        Self::with_detector(api, DriftDetector::new(M::drift_policy(), existence))
    }

    /// A controller with a custom drift detector.
    pub fn with_detector(api: Arc<A>, detector: DriftDetector) -> Self {
        Self {
            api,
            detector,
            schema: M::schema(),
            _model: PhantomData,
        }
    }

    /// The API this controller calls.
    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Get the remote object and project it into `data`, or clear `data`
    /// when the object is gone.
    async fn refresh(
        &self,
        mut data: ResourceData<'_>,
        handle: &ResourceHandle,
    ) -> Result<Reconciliation, ProviderError> {
        debug!(id = %handle, "getting remote object");
        let object = match self.api.get(handle).await {
            Ok(object) => object,
            Err(err) => {
                let class = self.detector.classify_not_found(&err, handle).await;
                if class.is_deletion() {
                    warn!(
                        id = %handle,
                        class = ?class,
                        "removing resource from state, it no longer exists remotely"
                    );
                    data.clear_id();
                    return Ok(Reconciliation::removed());
                }
                error!(id = %handle, error = %err, "reading remote object failed");
                return Err(err.into());
            },
        };

        let observed = M::from_remote_response(handle, &object)?;
        data.set_all(&observed)?;

        let drifted = data.drifted_attributes();
        let lifecycle = if drifted.is_empty() {
            Lifecycle::Synced
        } else {
            info!(id = %handle, attributes = ?drifted, "remote object drifted");
            Lifecycle::Drifted
        };

        Ok(Reconciliation::bound(data.into_state(), lifecycle))
    }

    /// Classify a failed existence probe made before deleting.
    async fn gone(&self, err: ApiError, handle: &ResourceHandle) -> Result<bool, ProviderError> {
        match self.detector.classify_not_found(&err, handle).await {
            DriftClass::Transient => Err(err.into()),
            _ => Ok(true),
        }
    }
}

#[async_trait::async_trait]
impl<M, A> ResourceLifecycle for ResourceController<M, A>
where
    M: ResourceModel,
    A: RemoteApi<Payload = M::Payload, Object = M::Object>,
{
    fn resource_type(&self) -> &'static str {
        M::RESOURCE_TYPE
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, config: &Value, provider: &ProviderConfig) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema, config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return diagnostics;
        }

        let data = ResourceData::for_create(&self.schema, config);
        if let Err(err) = M::desired_from(&data, provider).and_then(|d| M::to_remote_request(&d)) {
            diagnostics.push(err.into());
        }
        diagnostics
    }

    fn plan(&self, prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
        let prior = prior.filter(|p| !p.is_null());

        // Destroy
        if proposed.is_null() {
            let changes = match prior {
                Some(Value::Object(map)) => self
                    .schema
                    .configurable_attributes()
                    .filter_map(|name| {
                        map.get(name)
                            .filter(|v| !v.is_null())
                            .map(|v| AttributeChange::removed(name, v.clone()))
                    })
                    .collect(),
                _ => Vec::new(),
            };
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        }

        let Value::Object(proposed_map) = proposed else {
            return Err(ProviderError::InvalidRequest(format!(
                "proposed state for {} must be an object",
                M::RESOURCE_TYPE
            )));
        };

        let Some(prior) = prior else {
            let changes = self
                .schema
                .configurable_attributes()
                .filter_map(|name| {
                    proposed_map
                        .get(name)
                        .filter(|v| !v.is_null())
                        .map(|v| AttributeChange::added(name, v.clone()))
                })
                .collect();
            return Ok(PlanResult::with_changes(proposed.clone(), changes, false));
        };

        let data = ResourceData::for_update(&self.schema, prior, proposed);
        let changed = data.changed_attributes();

        let mut planned: Map<String, Value> = proposed_map.clone();
        for name in self
            .schema
            .computed_attributes()
            .chain(std::iter::once(ID_ATTRIBUTE))
        {
            let unset = planned.get(name).map_or(true, Value::is_null);
            if let Some(value) = prior.get(name).filter(|v| unset && !v.is_null()) {
                planned.insert(name.to_string(), value.clone());
            }
        }

        if changed.is_empty() {
            return Ok(PlanResult::no_change(Value::Object(planned)));
        }

        let requires_replace = changed.iter().any(|name| {
            self.schema
                .attribute(name)
                .map(|attr| attr.force_new)
                .unwrap_or(false)
        });

        let changes = changed
            .iter()
            .map(|name| {
                let fallback = || {
                    self.schema
                        .attribute(name)
                        .map(|attr| attr.fallback_value())
                        .unwrap_or(Value::Null)
                };
                let before = prior
                    .get(*name)
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(fallback);
                let after = proposed_map
                    .get(*name)
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(fallback);
                AttributeChange::modified(*name, before, after)
            })
            .collect();

        Ok(PlanResult::with_changes(
            Value::Object(planned),
            changes,
            requires_replace,
        ))
    }

    #[instrument(skip_all, fields(resource_type = M::RESOURCE_TYPE))]
    async fn create(
        &self,
        planned: &Value,
        provider: &ProviderConfig,
    ) -> Result<Reconciliation, ProviderError> {
        let mut data = ResourceData::for_create(&self.schema, planned);
        let desired = M::desired_from(&data, provider)?;
        let payload = M::to_remote_request(&desired)?;
        let parent = M::parent_scope(&desired)?;

        debug!(parent = %parent, "creating remote object");
        let object = self.api.create(&parent, &payload).await.map_err(|err| {
            error!(parent = %parent, error = %err, "create failed");
            ProviderError::from(err)
        })?;

        let handle = parent.child(M::leaf_id(&object));
        let id = identifier::encode(&handle)?;
        data.set_id(id);
        info!(id = %handle, "created remote object");

        // A failed read-back keeps the id. A not-found read-back is
        // classified like any read and can still drop it.
        match self.refresh(data.clone(), &handle).await {
            Ok(reconciled) => Ok(reconciled),
            Err(err) => {
                warn!(id = %handle, error = %err, "read after create failed, keeping identifier");
                Ok(Reconciliation::bound(data.into_state(), Lifecycle::Bound))
            },
        }
    }

    #[instrument(skip_all, fields(resource_type = M::RESOURCE_TYPE))]
    async fn read(&self, current: &Value) -> Result<Reconciliation, ProviderError> {
        let data = ResourceData::from_state(&self.schema, current);
        let handle = identifier::decode(data.require_id(M::ARITY)?, M::ARITY)?;
        self.refresh(data, &handle).await
    }

    #[instrument(skip_all, fields(resource_type = M::RESOURCE_TYPE))]
    async fn update(
        &self,
        prior: &Value,
        planned: &Value,
        provider: &ProviderConfig,
    ) -> Result<Reconciliation, ProviderError> {
        let data = ResourceData::for_update(&self.schema, prior, planned);
        let handle = identifier::decode(data.require_id(M::ARITY)?, M::ARITY)?;

        let changed = data.changed_attributes();
        if changed.is_empty() {
            debug!(id = %handle, "no configurable attribute changed, skipping update call");
        } else {
            let desired = M::desired_from(&data, provider)?;
            let payload = M::to_remote_request(&desired)?;

            debug!(id = %handle, attributes = ?changed, "updating remote object");
            self.api.update(&handle, &payload).await.map_err(|err| {
                error!(id = %handle, error = %err, "update failed");
                ProviderError::from(err)
            })?;
            info!(id = %handle, "updated remote object");
        }

        self.refresh(data, &handle).await
    }

    #[instrument(skip_all, fields(resource_type = M::RESOURCE_TYPE))]
    async fn delete(&self, current: &Value) -> Result<Lifecycle, ProviderError> {
        let data = ResourceData::from_state(&self.schema, current);
        let handle = identifier::decode(data.require_id(M::ARITY)?, M::ARITY)?;

        if let Err(err) = self.api.get(&handle).await {
            if self.gone(err, &handle).await? {
                warn!(id = %handle, "remote object already gone, nothing to delete");
                return Ok(Lifecycle::Removed);
            }
        }

        self.api.delete(&handle).await.map_err(|err| {
            error!(id = %handle, error = %err, "delete failed, keeping resource in state");
            ProviderError::from(err)
        })?;

        info!(id = %handle, "deleted remote object");
        Ok(Lifecycle::Removed)
    }

    #[instrument(skip_all, fields(resource_type = M::RESOURCE_TYPE, id = %id))]
    async fn import(&self, id: &str) -> Result<ImportedResource, ProviderError> {
        let handle = identifier::decode(id, M::ARITY)?;
        let mut state = Map::new();
        state.insert(ID_ATTRIBUTE.to_string(), Value::String(id.to_string()));
        let state = Value::Object(state);

        let data = ResourceData::from_state(&self.schema, &state);
        let reconciled = self.refresh(data, &handle).await?;
        if reconciled.lifecycle == Lifecycle::Removed {
            return Err(ProviderError::NotFound(format!(
                "{} {} does not exist",
                M::RESOURCE_TYPE,
                id
            )));
        }

        info!("imported remote object");
        Ok(ImportedResource::new(M::RESOURCE_TYPE, reconciled.state))
    }
}
