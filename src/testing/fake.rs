//! In-memory stand-ins for the remote APIs.
//!
//! [`InMemoryApi`] stores objects keyed by their full handle and the scopes
//! they live in. Tests delete or edit objects behind the provider's back,
//! queue the ids the "remote" side assigns, and inject failures for the
//! next call of a given kind.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::controller::RemoteApi;
use crate::drift::ExistenceCheck;
use crate::error::ApiError;
use crate::identifier::ResourceHandle;
use crate::resources::{Glb, GlbBody, VpnGateway, VpnGatewayPrototype};

/// Timestamp stamped on every object the fakes create.
pub const FAKE_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

/// Message returned for missing objects, matching the live APIs.
pub const NOT_FOUND_MESSAGE: &str = "Object not found";

/// A remote call the fake can record or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`RemoteApi::create`]
    Create,
    /// [`RemoteApi::get`]
    Get,
    /// [`RemoteApi::update`]
    Update,
    /// [`RemoteApi::delete`]
    Delete,
    /// [`ExistenceCheck::exists`]
    Exists,
}

/// An object type the fake knows how to build from a request body.
pub trait FakeObject: Clone + Send + Sync + 'static {
    /// The create/update request body.
    type Payload: Serialize + Send + Sync;

    /// Build the stored object. `prior` is set for updates.
    fn materialize(
        id: &str,
        parent: &ResourceHandle,
        payload: &Self::Payload,
        prior: Option<&Self>,
    ) -> Self;
}

impl FakeObject for Glb {
    type Payload = GlbBody;

    fn materialize(id: &str, _parent: &ResourceHandle, body: &GlbBody, prior: Option<&Self>) -> Self {
        Glb {
            id: id.to_string(),
            name: body.name.clone(),
            description: body.description.clone(),
            fallback_pool: body.fallback_pool.clone(),
            default_pools: body.default_pools.clone(),
            ttl: body.ttl,
            proxied: body.proxied,
            session_affinity: body.session_affinity.clone(),
            enabled: body.enabled,
            created_on: prior
                .and_then(|glb| glb.created_on.clone())
                .or_else(|| Some(FAKE_TIMESTAMP.to_string())),
            modified_on: Some(FAKE_TIMESTAMP.to_string()),
        }
    }
}

impl FakeObject for VpnGateway {
    type Payload = VpnGatewayPrototype;

    fn materialize(
        id: &str,
        parent: &ResourceHandle,
        prototype: &VpnGatewayPrototype,
        prior: Option<&Self>,
    ) -> Self {
        let mut gateway = prior.cloned().unwrap_or_else(|| VpnGateway {
            id: id.to_string(),
            crn: format!("crn:v1:fake:public:is::a/fake::vpn:{}", id),
            href: format!("https://fake.invalid/v1/vpn_gateways/{}", id),
            created_at: FAKE_TIMESTAMP.to_string(),
            status: "pending".to_string(),
            subnet: prototype.subnet.clone(),
            resource_group: prototype.resource_group.clone(),
            ..Default::default()
        });
        gateway.name = prototype.name.clone();
        if gateway.subnet.id.is_empty() {
            gateway.subnet.id = parent.leaf().to_string();
        }
        gateway
    }
}

struct FakeState<O> {
    objects: HashMap<ResourceHandle, O>,
    scopes: HashSet<ResourceHandle>,
    next_ids: VecDeque<String>,
    generated: u64,
    failures: HashMap<Operation, VecDeque<ApiError>>,
    calls: HashMap<Operation, usize>,
    payloads: Vec<Value>,
}

/// An in-memory remote API for object type `O`.
pub struct InMemoryApi<O> {
    state: Mutex<FakeState<O>>,
}

impl<O: FakeObject> Default for InMemoryApi<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: FakeObject> InMemoryApi<O> {
    /// An API with no scopes and no objects.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                objects: HashMap::new(),
                scopes: HashSet::new(),
                next_ids: VecDeque::new(),
                generated: 0,
                failures: HashMap::new(),
                calls: HashMap::new(),
                payloads: Vec::new(),
            }),
        }
    }

    /// Register a scope objects can be created in.
    pub fn with_scope(self, scope: ResourceHandle) -> Self {
        self.state().scopes.insert(scope);
        self
    }

    /// The id assigned to the next created object.
    pub fn queue_id(&self, id: impl Into<String>) {
        self.state().next_ids.push_back(id.into());
    }

    /// Fail the next call of kind `op` with `error`.
    pub fn fail_next(&self, op: Operation, error: ApiError) {
        self.state()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Store an object directly, as if created out-of-band.
    pub fn insert(&self, handle: ResourceHandle, object: O) {
        let mut state = self.state();
        if let Some(parent) = handle.parent() {
            state.scopes.insert(parent);
        }
        state.objects.insert(handle, object);
    }

    /// Delete an object out-of-band.
    pub fn remove(&self, handle: &ResourceHandle) -> Option<O> {
        self.state().objects.remove(handle)
    }

    /// Delete a scope out-of-band, along with every object inside it.
    pub fn remove_scope(&self, scope: &ResourceHandle) {
        let mut state = self.state();
        state.scopes.remove(scope);
        state
            .objects
            .retain(|handle, _| handle.parent().as_ref() != Some(scope));
    }

    /// Edit an object out-of-band. Returns false if it does not exist.
    pub fn modify(&self, handle: &ResourceHandle, edit: impl FnOnce(&mut O)) -> bool {
        match self.state().objects.get_mut(handle) {
            Some(object) => {
                edit(object);
                true
            },
            None => false,
        }
    }

    /// A copy of the stored object.
    pub fn object(&self, handle: &ResourceHandle) -> Option<O> {
        self.state().objects.get(handle).cloned()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    /// Whether no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many calls of kind `op` were made, failed ones included.
    pub fn calls(&self, op: Operation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every create/update body sent, as JSON, in call order.
    pub fn payloads(&self) -> Vec<Value> {
        self.state().payloads.clone()
    }

    fn state(&self) -> MutexGuard<'_, FakeState<O>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(state: &mut FakeState<O>, op: Operation) -> Result<(), ApiError> {
        *state.calls.entry(op).or_insert(0) += 1;
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn record(state: &mut FakeState<O>, payload: &O::Payload) {
        let value = serde_json::to_value(payload).unwrap_or(Value::Null);
        state.payloads.push(value);
    }
}

fn not_found() -> ApiError {
    ApiError::not_found(NOT_FOUND_MESSAGE)
}

#[async_trait::async_trait]
impl<O: FakeObject> RemoteApi for InMemoryApi<O> {
    type Payload = O::Payload;
    type Object = O;

    async fn create(&self, parent: &ResourceHandle, payload: &O::Payload) -> Result<O, ApiError> {
        let mut state = self.state();
        Self::begin(&mut state, Operation::Create)?;
        Self::record(&mut state, payload);

        if !state.scopes.contains(parent) {
            return Err(ApiError::not_found(format!("Parent {} not found", parent)));
        }

        let id = match state.next_ids.pop_front() {
            Some(id) => id,
            None => {
                state.generated += 1;
                format!("obj-{}", state.generated)
            },
        };

        let object = O::materialize(&id, parent, payload, None);
        state.objects.insert(parent.child(id), object.clone());
        Ok(object)
    }

    async fn get(&self, handle: &ResourceHandle) -> Result<O, ApiError> {
        let mut state = self.state();
        Self::begin(&mut state, Operation::Get)?;
        state.objects.get(handle).cloned().ok_or_else(not_found)
    }

    async fn update(&self, handle: &ResourceHandle, payload: &O::Payload) -> Result<O, ApiError> {
        let mut state = self.state();
        Self::begin(&mut state, Operation::Update)?;
        Self::record(&mut state, payload);

        let parent = handle.parent().unwrap_or_else(|| handle.clone());
        let prior = state.objects.get(handle).cloned().ok_or_else(not_found)?;
        let object = O::materialize(handle.leaf(), &parent, payload, Some(&prior));
        state.objects.insert(handle.clone(), object.clone());
        Ok(object)
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<(), ApiError> {
        let mut state = self.state();
        Self::begin(&mut state, Operation::Delete)?;
        state.objects.remove(handle).map(|_| ()).ok_or_else(not_found)
    }
}

#[async_trait::async_trait]
impl<O: FakeObject> ExistenceCheck for InMemoryApi<O> {
    async fn exists(&self, scope: &ResourceHandle) -> Result<bool, ApiError> {
        let mut state = self.state();
        Self::begin(&mut state, Operation::Exists)?;
        Ok(state.scopes.contains(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(name: &str) -> GlbBody {
        GlbBody {
            name: name.to_string(),
            fallback_pool: "pool-fb".to_string(),
            default_pools: vec!["pool-a".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_uses_queued_id_and_requires_scope() {
        let scope = ResourceHandle::new(["zone1", "cis1"]);
        let api = InMemoryApi::<Glb>::new().with_scope(scope.clone());
        api.queue_id("glb-1");

        let glb = api.create(&scope, &body("www")).await.unwrap();
        assert_eq!(glb.id, "glb-1");
        assert!(api.object(&scope.child("glb-1")).is_some());

        let err = api
            .create(&ResourceHandle::new(["zone2", "cis1"]), &body("www"))
            .await
            .unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(api.calls(Operation::Create), 2);
        assert_eq!(api.payloads().len(), 2);
    }

    #[tokio::test]
    async fn test_fail_next_is_consumed_once() {
        let scope = ResourceHandle::new(["zone1", "cis1"]);
        let api = InMemoryApi::<Glb>::new().with_scope(scope.clone());
        let handle = scope.child("glb-1");
        api.insert(handle.clone(), Glb::default());

        api.fail_next(Operation::Get, ApiError::new(503, "busy"));
        assert_eq!(api.get(&handle).await.unwrap_err().status, 503);
        assert!(api.get(&handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_scope_takes_children() {
        let scope = ResourceHandle::new(["subnet-7"]);
        let api = InMemoryApi::<VpnGateway>::new().with_scope(scope.clone());
        let prototype = VpnGatewayPrototype {
            name: "gw1".to_string(),
            ..Default::default()
        };
        let gateway = api.create(&scope, &prototype).await.unwrap();
        assert_eq!(gateway.subnet.id, "subnet-7");
        assert_eq!(gateway.status, "pending");

        api.remove_scope(&scope);
        assert!(api.is_empty());
        assert!(!api.exists(&scope).await.unwrap());
    }
}
