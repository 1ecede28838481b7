//! Object identity and metadata shared by every resource kind

use crate::error::{TypesError, TypesResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Namespace assigned to objects that do not name one
pub const DEFAULT_NAMESPACE: &str = "default";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Identity of a namespaced object, rendered as `namespace/name`
///
/// Ordering is by namespace, then name; owner resolution relies on it for a
/// reproducible tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = TypesError;

    fn from_str(s: &str) -> TypesResult<Self> {
        let invalid = || TypesError::InvalidKey(s.to_string());
        match s.split_once('/') {
            Some((namespace, name)) => {
                if namespace.is_empty() || name.is_empty() || name.contains('/') {
                    return Err(invalid());
                }
                Ok(Self::new(namespace, name))
            }
            None if !s.is_empty() => Ok(Self::new(DEFAULT_NAMESPACE, s)),
            None => Err(invalid()),
        }
    }
}

/// Reference from a dependent object to the object that controls it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub controller: bool,
}

/// Standard object metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Monotonic version assigned by the store on every write; 0 = never stored
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    /// Metadata for `namespace/name` with everything else empty
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// The owner reference marked as controller, if any
    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }
}

/// Pointer to a concrete object, recorded in workflow status per step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ObjectReference {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Tri-state condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Common behavior for objects held in local stores
pub trait Resource: Clone + Send + Sync + 'static {
    /// Kind name as it appears in references and manifests
    const KIND: &'static str;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        self.meta().key()
    }

    fn object_ref(&self) -> ObjectReference {
        let meta = self.meta();
        ObjectReference {
            kind: Self::KIND.to_string(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            uid: meta.uid.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip() {
        let key: ObjectKey = "batch/mydag".parse().unwrap();
        assert_eq!(key, ObjectKey::new("batch", "mydag"));
        assert_eq!(key.to_string(), "batch/mydag");
    }

    #[test]
    fn test_bare_name_uses_default_namespace() {
        let key: ObjectKey = "mydag".parse().unwrap();
        assert_eq!(key.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_invalid_keys() {
        for bad in ["", "/name", "ns/", "a/b/c"] {
            assert!(bad.parse::<ObjectKey>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_key_ordering_is_namespace_then_name() {
        let mut keys = vec![
            ObjectKey::new("b", "a"),
            ObjectKey::new("a", "z"),
            ObjectKey::new("a", "b"),
        ];
        keys.sort();
        assert_eq!(keys[0], ObjectKey::new("a", "b"));
        assert_eq!(keys[2], ObjectKey::new("b", "a"));
    }

    #[test]
    fn test_meta_defaults_namespace_when_deserialized() {
        let meta: ObjectMeta = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(meta.namespace, DEFAULT_NAMESPACE);
        assert_eq!(meta.resource_version, 0);
    }
}
