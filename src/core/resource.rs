//! Resource kinds and the traits that let the store and the convergence
//! logic handle them uniformly

use crate::core::{
    channel::{Channel, Subscription},
    meta::{NamespacedName, ObjectMeta},
    sequence::Sequence,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every kind this controller reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Sequence,
    Channel,
    Subscription,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Sequence => "Sequence",
            ResourceKind::Channel => "Channel",
            ResourceKind::Subscription => "Subscription",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Sequence" => Ok(ResourceKind::Sequence),
            "Channel" => Ok(ResourceKind::Channel),
            "Subscription" => Ok(ResourceKind::Subscription),
            other => Err(format!("Unknown resource kind: {}", other)),
        }
    }
}

/// Store key: kind + namespace + name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of<R: Resource>(key: &NamespacedName) -> Self {
        Self::new(R::KIND, key.namespace.clone(), key.name.clone())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Any stored object, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    Sequence(Sequence),
    Channel(Channel),
    Subscription(Subscription),
}

impl Object {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Object::Sequence(_) => ResourceKind::Sequence,
            Object::Channel(_) => ResourceKind::Channel,
            Object::Subscription(_) => ResourceKind::Subscription,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Object::Sequence(o) => &o.metadata,
            Object::Channel(o) => &o.metadata,
            Object::Subscription(o) => &o.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Object::Sequence(o) => &mut o.metadata,
            Object::Channel(o) => &mut o.metadata,
            Object::Subscription(o) => &mut o.metadata,
        }
    }

    pub fn key(&self) -> ObjectKey {
        let meta = self.metadata();
        ObjectKey::new(self.kind(), meta.namespace.clone(), meta.name.clone())
    }

    /// Prepare a manifest copy to replace `stored`
    ///
    /// A manifest only declares metadata and spec, so the stored resource
    /// version and any published status are taken over.
    pub fn adopt_stored(&mut self, stored: &Object) {
        self.metadata_mut().resource_version = stored.metadata().resource_version;
        match (self, stored) {
            (Object::Sequence(sequence), Object::Sequence(existing)) => {
                sequence.status = existing.status.clone();
            }
            (Object::Channel(channel), Object::Channel(existing)) => {
                channel.status = existing.status.clone();
            }
            _ => {}
        }
    }
}

/// A concrete resource kind
pub trait Resource: Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn into_object(self) -> Object;

    /// Returns `None` if the object is of another kind
    fn from_object(object: Object) -> Option<Self>;
}

/// A kind derived from a Sequence and converged by create-or-update
pub trait ChildResource: Resource {
    type Spec: Clone + PartialEq + fmt::Debug + Send + Sync;

    fn spec(&self) -> &Self::Spec;

    fn spec_mut(&mut self) -> &mut Self::Spec;

    /// Copy the fields other actors own from `observed` into `desired`, so
    /// that only fields this controller manages take part in the diff.
    fn carry_over_external_fields(desired: &mut Self::Spec, observed: &Self::Spec);
}

macro_rules! impl_resource {
    ($ty:ident) => {
        impl Resource for $ty {
            const KIND: ResourceKind = ResourceKind::$ty;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }

            fn into_object(self) -> Object {
                Object::$ty(self)
            }

            fn from_object(object: Object) -> Option<Self> {
                match object {
                    Object::$ty(o) => Some(o),
                    _ => None,
                }
            }
        }
    };
}

impl_resource!(Sequence);
impl_resource!(Channel);
impl_resource!(Subscription);
