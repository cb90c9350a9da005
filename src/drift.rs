//! Out-of-band deletion detection.
//!
//! The management APIs this provider talks to report "this object is gone",
//! "this object's container is gone" and some plain request failures behind
//! the same few status codes. [`DriftDetector`] decides which of those a
//! failed read means, so the controller can drop local state for the first
//! two and surface the third untouched.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ApiError;
use crate::identifier::ResourceHandle;

/// Answers whether an enclosing scope still exists remotely.
#[async_trait::async_trait]
pub trait ExistenceCheck: Send + Sync {
    /// Whether the object addressed by `scope` exists.
    async fn exists(&self, scope: &ResourceHandle) -> Result<bool, ApiError>;
}

/// How a failed remote read is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftClass {
    /// The object itself was deleted.
    TrueDeletion,
    /// An enclosing scope was deleted, taking the object with it.
    AncestorDeleted,
    /// Not a deletion; the original error must be surfaced.
    Transient,
}

impl DriftClass {
    /// Whether the local identifier should be cleared.
    pub fn is_deletion(self) -> bool {
        matches!(self, Self::TrueDeletion | Self::AncestorDeleted)
    }
}

/// The error signals that count as "not found".
///
/// Message signals are matched case-insensitively as substrings of the API
/// error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftPolicy {
    message_signals: Vec<String>,
    status_signals: Vec<u16>,
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self {
            message_signals: vec!["not found".to_string(), "status code: 404".to_string()],
            status_signals: vec![404],
        }
    }
}

impl DriftPolicy {
    /// The default policy: a `404`, or a message saying "not found" or
    /// "status code: 404".
    pub fn new() -> Self {
        Self::default()
    }

    /// Also treat messages containing `signal` as not-found.
    pub fn with_message_signal(mut self, signal: impl Into<String>) -> Self {
        self.message_signals.push(signal.into().to_lowercase());
        self
    }

    /// Also treat `status` as not-found.
    pub fn with_status_signal(mut self, status: u16) -> Self {
        self.status_signals.push(status);
        self
    }

    /// Whether `error` carries any not-found signal.
    pub fn matches(&self, error: &ApiError) -> bool {
        if self.status_signals.contains(&error.status) {
            return true;
        }
        let message = error.message.to_lowercase();
        self.message_signals
            .iter()
            .any(|signal| message.contains(signal.as_str()))
    }
}

/// Classifies failed reads as deletions or transient errors.
#[derive(Clone)]
pub struct DriftDetector {
    policy: DriftPolicy,
    existence: Option<Arc<dyn ExistenceCheck>>,
}

impl std::fmt::Debug for DriftDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriftDetector")
            .field("policy", &self.policy)
            .field("ancestor_check", &self.existence.is_some())
            .finish()
    }
}

impl DriftDetector {
    /// A detector that confirms deletions against the parent scope.
    pub fn new(policy: DriftPolicy, existence: Arc<dyn ExistenceCheck>) -> Self {
        Self {
            policy,
            existence: Some(existence),
        }
    }

    /// A detector with no ancestor lookup; every not-found is a true deletion.
    pub fn without_ancestor_check(policy: DriftPolicy) -> Self {
        Self {
            policy,
            existence: None,
        }
    }

    /// The signals this detector matches.
    pub fn policy(&self) -> &DriftPolicy {
        &self.policy
    }

    /// Classify a failed read of `handle`.
    ///
    /// A not-found signal is always treated as a deletion, even when the
    /// parent scope still exists (some APIs answer a vanished object with a
    /// 400 "invalid parent" error). The ancestor lookup only decides which
    /// kind of deletion it was.
    pub async fn classify_not_found(&self, error: &ApiError, handle: &ResourceHandle) -> DriftClass {
        if !self.policy.matches(error) {
            debug!(handle = %handle, status = error.status, "error carries no not-found signal");
            return DriftClass::Transient;
        }

        let (Some(existence), Some(parent)) = (&self.existence, handle.parent()) else {
            return DriftClass::TrueDeletion;
        };

        match existence.exists(&parent).await {
            Ok(false) => {
                warn!(handle = %handle, parent = %parent, "parent scope no longer exists");
                DriftClass::AncestorDeleted
            },
            Ok(true) => DriftClass::TrueDeletion,
            Err(err) => {
                warn!(
                    handle = %handle,
                    parent = %parent,
                    error = %err,
                    "could not check parent scope, treating as deleted"
                );
                DriftClass::TrueDeletion
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticExistence {
        result: Result<bool, ApiError>,
        asked: Mutex<Vec<ResourceHandle>>,
    }

    impl StaticExistence {
        fn new(result: Result<bool, ApiError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                asked: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ExistenceCheck for StaticExistence {
        async fn exists(&self, scope: &ResourceHandle) -> Result<bool, ApiError> {
            self.asked.lock().unwrap().push(scope.clone());
            self.result.clone()
        }
    }

    fn glb_handle() -> ResourceHandle {
        ResourceHandle::new(["glb1", "zone1", "cis1"])
    }

    #[test]
    fn test_policy_matches() {
        let policy = DriftPolicy::default();
        assert!(policy.matches(&ApiError::new(404, "gone")));
        assert!(policy.matches(&ApiError::new(500, "Object Not Found")));
        assert!(policy.matches(&ApiError::new(0, "Request failed with status code: 404")));
        assert!(!policy.matches(&ApiError::new(400, "Invalid zone identifier")));

        let policy = policy.with_message_signal("Invalid zone identifier");
        assert!(policy.matches(&ApiError::new(400, "Invalid zone identifier")));

        let policy = DriftPolicy::new().with_status_signal(410);
        assert!(policy.matches(&ApiError::new(410, "")));
    }

    #[tokio::test]
    async fn test_ancestor_deleted() {
        let existence = StaticExistence::new(Ok(false));
        let detector = DriftDetector::new(DriftPolicy::default(), existence.clone());

        let class = detector
            .classify_not_found(&ApiError::new(404, "Object not found"), &glb_handle())
            .await;

        assert_eq!(class, DriftClass::AncestorDeleted);
        assert_eq!(
            existence.asked.lock().unwrap().as_slice(),
            &[ResourceHandle::new(["zone1", "cis1"])]
        );
    }

    #[tokio::test]
    async fn test_true_deletion_when_parent_exists() {
        let detector = DriftDetector::new(DriftPolicy::default(), StaticExistence::new(Ok(true)));
        let class = detector
            .classify_not_found(&ApiError::not_found("Object not found"), &glb_handle())
            .await;
        assert_eq!(class, DriftClass::TrueDeletion);
    }

    #[tokio::test]
    async fn test_invalid_parent_signal_is_deletion_even_if_parent_exists() {
        let policy = DriftPolicy::default().with_message_signal("Invalid zone identifier");
        let detector = DriftDetector::new(policy, StaticExistence::new(Ok(true)));

        let class = detector
            .classify_not_found(&ApiError::new(400, "Invalid zone identifier"), &glb_handle())
            .await;
        assert_eq!(class, DriftClass::TrueDeletion);
        assert!(class.is_deletion());
    }

    #[tokio::test]
    async fn test_transient_skips_existence_check() {
        let existence = StaticExistence::new(Ok(false));
        let detector = DriftDetector::new(DriftPolicy::default(), existence.clone());

        let class = detector
            .classify_not_found(&ApiError::new(503, "try again later"), &glb_handle())
            .await;

        assert_eq!(class, DriftClass::Transient);
        assert!(!class.is_deletion());
        assert!(existence.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existence_check_failure_is_true_deletion() {
        let detector = DriftDetector::new(
            DriftPolicy::default(),
            StaticExistence::new(Err(ApiError::new(500, "boom"))),
        );
        let class = detector
            .classify_not_found(&ApiError::not_found("gone"), &glb_handle())
            .await;
        assert_eq!(class, DriftClass::TrueDeletion);
    }

    #[tokio::test]
    async fn test_no_parent_or_no_checker() {
        let detector = DriftDetector::new(DriftPolicy::default(), StaticExistence::new(Ok(false)));
        let class = detector
            .classify_not_found(&ApiError::not_found("gone"), &ResourceHandle::new(["root"]))
            .await;
        assert_eq!(class, DriftClass::TrueDeletion);

        let detector = DriftDetector::without_ancestor_check(DriftPolicy::default());
        let class = detector
            .classify_not_found(&ApiError::not_found("gone"), &glb_handle())
            .await;
        assert_eq!(class, DriftClass::TrueDeletion);
    }
}
