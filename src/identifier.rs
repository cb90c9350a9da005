//! Composite resource identifiers.
//!
//! Remote objects are addressed by a chain of remote-assigned ids: the
//! object's own id, then its parent's, and so on up to the root scope. A
//! [`ResourceHandle`] holds that chain leaf-first, and [`encode`] / [`decode`]
//! convert it to and from the single string stored as the resource `id`.
//!
//! ```
//! use hemmer_provider_cloudnet::identifier::{decode, encode, ResourceHandle};
//!
//! let handle = ResourceHandle::new(["leaf123", "zone456", "acct789"]);
//! let id = encode(&handle).unwrap();
//! assert_eq!(id, "leaf123:zone456:acct789");
//! assert_eq!(decode(&id, 3).unwrap(), handle);
//! ```

use std::fmt;

use crate::error::ProviderError;

/// The reserved delimiter between identifier components.
pub const DELIMITER: char = ':';

/// An ordered tuple of remote identifiers, leaf first.
///
/// The leaf id is only unique within its parent chain; the full tuple is
/// the global key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    components: Vec<String>,
}

impl ResourceHandle {
    /// Create a handle from components ordered leaf first.
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of components.
    pub fn arity(&self) -> usize {
        self.components.len()
    }

    /// The object's own id.
    pub fn leaf(&self) -> &str {
        self.components.first().map(String::as_str).unwrap_or("")
    }

    /// The outermost scope id.
    pub fn root(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or("")
    }

    /// The component at `index`, counting from the leaf.
    pub fn component(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(String::as_str)
    }

    /// All components, leaf first.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The handle of the enclosing scope, one level up.
    ///
    /// Returns `None` for a single-component handle.
    pub fn parent(&self) -> Option<ResourceHandle> {
        if self.components.len() < 2 {
            return None;
        }
        Some(Self {
            components: self.components[1..].to_vec(),
        })
    }

    /// A handle for an object created inside this scope.
    pub fn child(&self, leaf: impl Into<String>) -> ResourceHandle {
        let mut components = Vec::with_capacity(self.components.len() + 1);
        components.push(leaf.into());
        components.extend(self.components.iter().cloned());
        Self { components }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.components {
            if !first {
                write!(f, "{}", DELIMITER)?;
            }
            first = false;
            f.write_str(component)?;
        }
        Ok(())
    }
}

/// Encode a handle into a local identifier.
///
/// Fails if a component contains [`DELIMITER`].
pub fn encode(handle: &ResourceHandle) -> Result<String, ProviderError> {
    if let Some(component) = handle
        .components()
        .iter()
        .find(|component| component.contains(DELIMITER))
    {
        return Err(ProviderError::Encoding {
            component: component.clone(),
            reason: format!("component contains reserved delimiter '{}'", DELIMITER),
        });
    }
    Ok(handle.to_string())
}

/// Decode a local identifier into a handle of exactly `arity` components.
pub fn decode(id: &str, arity: usize) -> Result<ResourceHandle, ProviderError> {
    let found = id.split(DELIMITER).count();
    if found != arity {
        return Err(ProviderError::MalformedIdentifier {
            id: id.to_string(),
            expected: arity,
            found,
        });
    }

    Ok(ResourceHandle::new(id.split(DELIMITER)))
}
