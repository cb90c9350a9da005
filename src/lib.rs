//! Hemmer provider for cloud networking resources.
//!
//! This crate implements the drift-reconciling CRUD lifecycle shared by
//! every resource the provider manages, plus two resource types built on
//! it: CIS global load balancers and VPC VPN gateways.
//!
//! # Overview
//!
//! - **Identifiers** ([`identifier`]): a remote object is addressed by the
//!   chain of ids from itself up to its root scope, stored locally as one
//!   `:`-joined string.
//! - **Field store** ([`data`]): typed access to the engine's JSON states,
//!   with schema defaults and change detection.
//! - **Drift detection** ([`drift`]): decides whether a failed read means the
//!   object, or one of its ancestors, was deleted out-of-band.
//! - **Lifecycle controller** ([`controller`]): Create, Read, Update, Delete,
//!   Plan and Import, written once over a [`ResourceModel`] and a
//!   [`RemoteApi`].
//! - **Provider** ([`provider`]): routes engine calls by resource type.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use hemmer_provider_cloudnet::{init_logging, CloudNetProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = CloudNetProvider::new()
//!         .with_global_load_balancers(Arc::new(cis_client))
//!         .with_vpn_gateways(Arc::new(vpc_client));
//!     provider.configure(json!({"resource_group": "rg-1"})).await?;
//!
//!     let state = provider
//!         .create(
//!             "cloudnet_global_load_balancer",
//!             json!({
//!                 "cis_id": "cis1",
//!                 "domain_id": "zone1:cis1",
//!                 "name": "www.example.com",
//!                 "fallback_pool_id": "pool-fb:cis1",
//!                 "default_pool_ids": ["pool-a:cis1"],
//!                 "ttl": 120
//!             }),
//!         )
//!         .await?;
//!     assert_eq!(state["session_affinity"], "none");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod data;
pub mod drift;
pub mod error;
pub mod identifier;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use controller::{RemoteApi, ResourceController, ResourceLifecycle, ResourceModel};
pub use drift::{DriftClass, DriftDetector, DriftPolicy, ExistenceCheck};
pub use error::{ApiError, ProviderError};
pub use identifier::ResourceHandle;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::CloudNetProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{
    AttributeChange, ImportedResource, Lifecycle, PlanResult, ProviderMetadata, Reconciliation,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
