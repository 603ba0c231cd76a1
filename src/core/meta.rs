//! Object identity and metadata shared by every resource kind

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// API version every kind in this controller is served under
pub const API_VERSION: &str = "eventing.sequencer.dev/v1alpha1";

/// Namespace + name of an object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for NamespacedName {
    type Err = String;

    /// Parse `namespace/name`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(format!("Invalid key (expected namespace/name): {}", s)),
        }
    }
}

/// Reference to another object by kind and name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ObjectReference::default()
    }
}

/// Back-pointer from a child object to the object that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: Uuid,

    /// Whether the owner is the managing controller
    #[serde(default)]
    pub controller: bool,

    /// Whether the store must keep the owner until this child is gone
    #[serde(default)]
    pub block_owner_deletion: bool,
}

/// Metadata common to all objects
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    /// Assigned by the store on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    /// Optimistic-concurrency token, bumped by the store on every write
    #[serde(default)]
    pub resource_version: u64,

    #[serde(default)]
    pub generation: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Set by the store when deletion was requested but finalizers remain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }

    pub fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, token: &str) -> bool {
        self.finalizers.iter().any(|f| f == token)
    }

    /// Insert a finalizer token; returns whether the list changed
    ///
    /// The list is kept sorted and duplicate-free.
    pub fn add_finalizer(&mut self, token: &str) -> bool {
        self.update_finalizers(|set| {
            set.insert(token.to_string());
        })
    }

    /// Remove a finalizer token; returns whether the list changed
    pub fn remove_finalizer(&mut self, token: &str) -> bool {
        self.update_finalizers(|set| {
            set.remove(token);
        })
    }

    fn update_finalizers(&mut self, apply: impl FnOnce(&mut BTreeSet<String>)) -> bool {
        let mut set: BTreeSet<String> = self.finalizers.iter().cloned().collect();
        apply(&mut set);
        let updated: Vec<String> = set.into_iter().collect();
        let changed = updated != self.finalizers;
        self.finalizers = updated;
        changed
    }

    /// The owner reference marked as controller, if any
    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|o| o.controller)
    }

    pub fn is_owned_by(&self, owner_uid: Uuid) -> bool {
        self.owner_references.iter().any(|o| o.uid == owner_uid)
    }
}
