//! Provider configuration.
//!
//! The configure payload is validated against [`ProviderConfig::schema`] and
//! then deserialized. Credentials and endpoints belong to the API client
//! handed to the provider, not here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation;

/// Settings shared by every resource the provider manages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Resource group used when a resource does not name one.
    #[serde(default)]
    pub resource_group: Option<String>,
    /// Region the API client is bound to.
    ///
    /// Only logged at configure time; the API client is built with its
    /// region already set.
    #[serde(default)]
    pub region: Option<String>,
}

impl ProviderConfig {
    /// The schema of the configure payload.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Cloud networking provider settings")
            .with_attribute(
                "resource_group",
                Attribute::optional_string()
                    .with_description("Default resource group for VPC resources"),
            )
            .with_attribute(
                "region",
                Attribute::optional_string().with_description("Region of the API endpoint"),
            )
    }

    /// Validate a configure payload without applying it.
    pub fn validate(value: &Value) -> Vec<Diagnostic> {
        validation::validate(&Self::schema(), value)
    }

    /// Parse a configure payload. A null payload yields the defaults.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }

        let diagnostics = Self::validate(&value);
        if let Some(first) = diagnostics.into_iter().find(Diagnostic::is_error) {
            return Err(ProviderError::Configuration(first.summary));
        }

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let config =
            ProviderConfig::from_value(json!({"resource_group": "rg-1", "region": "us-south"}))
                .unwrap();
        assert_eq!(config.resource_group.as_deref(), Some("rg-1"));
        assert_eq!(config.region.as_deref(), Some("us-south"));
    }

    #[test]
    fn test_null_is_default() {
        assert_eq!(
            ProviderConfig::from_value(Value::Null).unwrap(),
            ProviderConfig::default()
        );
        assert_eq!(
            ProviderConfig::from_value(json!({})).unwrap(),
            ProviderConfig::default()
        );
    }

    #[test]
    fn test_invalid_config() {
        let err = ProviderConfig::from_value(json!({"resource_group": 7})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = ProviderConfig::from_value(json!({"api_key": "secret"})).unwrap_err();
        assert!(err.message().contains("api_key"));
    }
}
