//! Error types for the cloud networking provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// An error returned by the remote management API.
///
/// The remote side guarantees no structured taxonomy, so only the HTTP
/// status code and the message text are kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Request failed with status code: {status}, {message}")]
pub struct ApiError {
    /// HTTP status code of the failed request.
    pub status: u16,
    /// Message text returned by the API.
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a `404` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A handle component cannot be encoded into a local identifier.
    #[error("Cannot encode identifier component {component:?}: {reason}")]
    Encoding {
        /// The offending component.
        component: String,
        /// Why the component was rejected.
        reason: String,
    },

    /// A local identifier does not split into the expected number of components.
    #[error("Malformed identifier {id:?}: expected {expected} component(s), found {found}")]
    MalformedIdentifier {
        /// The identifier as stored in state.
        id: String,
        /// The arity of the resource type.
        expected: usize,
        /// The number of components actually found.
        found: usize,
    },

    /// Two mutually exclusive fields were both set.
    #[error("Conflicting fields: '{first}' and '{second}' cannot both be set")]
    ConflictingFields {
        /// The first field.
        first: &'static str,
        /// The field it conflicts with.
        second: &'static str,
    },

    /// The remote API rejected the request. Passed through unchanged.
    #[error("Remote API error: {0}")]
    Api(#[from] ApiError),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Sdk(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Encoding { reason, .. } => reason.clone(),
            Self::MalformedIdentifier { .. } | Self::ConflictingFields { .. } => self.to_string(),
            Self::Api(err) => err.message.clone(),
        }
    }

    /// The attribute path this error refers to, if any.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::ConflictingFields { first, .. } => Some(*first),
            Self::MalformedIdentifier { .. } => Some("id"),
            _ => None,
        }
    }

    /// The remote API error wrapped by this error, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        let diagnostic = Diagnostic::error(err.to_string());
        match err.attribute() {
            Some(attribute) => diagnostic.with_attribute(attribute),
            None => diagnostic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("custom_resource".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: custom_resource");
    }

    #[test]
    fn test_lifecycle_error_display() {
        let err = ProviderError::MalformedIdentifier {
            id: "a:b".to_string(),
            expected: 3,
            found: 2,
        };
        assert_eq!(
            format!("{}", err),
            "Malformed identifier \"a:b\": expected 3 component(s), found 2"
        );

        let err = ProviderError::ConflictingFields {
            first: "ttl",
            second: "proxied",
        };
        assert_eq!(
            format!("{}", err),
            "Conflicting fields: 'ttl' and 'proxied' cannot both be set"
        );
    }

    #[test]
    fn test_api_error_passthrough() {
        let api = ApiError::new(503, "backend unavailable");
        let err: ProviderError = api.clone().into();

        assert_eq!(err.api_error(), Some(&api));
        assert_eq!(err.message(), "backend unavailable");
        assert_eq!(
            format!("{}", err),
            "Remote API error: Request failed with status code: 503, backend unavailable"
        );
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(err.message(), "resource-123");

        let err = ProviderError::Encoding {
            component: "a:b".to_string(),
            reason: "contains ':'".to_string(),
        };
        assert_eq!(err.message(), "contains ':'");
    }

    #[test]
    fn test_error_to_diagnostic() {
        let diagnostic: Diagnostic = ProviderError::ConflictingFields {
            first: "ttl",
            second: "proxied",
        }
        .into();
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostic.attribute, Some("ttl".to_string()));

        let diagnostic: Diagnostic = ProviderError::Sdk("boom".to_string()).into();
        assert_eq!(diagnostic.attribute, None);
        assert_eq!(diagnostic.summary, "SDK error: boom");
    }
}
