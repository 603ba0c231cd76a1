//! Channel and Subscription: the child resources a Sequence is built from

use crate::core::{
    meta::{ObjectMeta, ObjectReference},
    resource::ChildResource,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Externally resolvable endpoint of an addressable object
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Addressable {
    /// Empty until the object has been provisioned
    #[serde(default)]
    pub hostname: String,
}

/// A message channel backing one pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: ChannelSpec,

    #[serde(default)]
    pub status: ChannelStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    /// Bumped by the store; not owned by this controller
    #[serde(default)]
    pub generation: i64,

    /// Which provisioner implements the channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<ObjectReference>,

    /// Subscribers registered by the subscription controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribable: Option<Subscribable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subscribable {
    #[serde(default)]
    pub subscribers: Vec<ChannelSubscriber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSubscriber {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subscriber_uri: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reply_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Written by the channel provisioner once the channel is reachable
    #[serde(default)]
    pub address: Addressable,
}

impl Channel {
    pub fn hostname(&self) -> &str {
        &self.status.address.hostname
    }

    /// Reference suitable for a subscription's `channel` field
    pub fn reference(&self) -> ObjectReference {
        ObjectReference::new(crate::core::meta::API_VERSION, "Channel", self.metadata.name.clone())
    }
}

impl ChildResource for Channel {
    type Spec = ChannelSpec;

    fn spec(&self) -> &ChannelSpec {
        &self.spec
    }

    fn spec_mut(&mut self) -> &mut ChannelSpec {
        &mut self.spec
    }

    fn carry_over_external_fields(desired: &mut ChannelSpec, observed: &ChannelSpec) {
        desired.generation = observed.generation;
        desired.subscribable = observed.subscribable.clone();
    }
}

/// Where a step delivers events for processing
///
/// An empty subscriber is valid: the step passes events through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberSpec {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
}

impl SubscriberSpec {
    pub fn is_empty(&self) -> bool {
        self.ref_.as_ref().map_or(true, ObjectReference::is_empty)
            && self.dns_name.as_deref().map_or(true, str::is_empty)
    }
}

/// Where a subscription forwards what its subscriber returns
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplyStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ObjectReference>,
}

impl ReplyStrategy {
    pub fn to_channel(channel: ObjectReference) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel.as_ref().map_or(true, ObjectReference::is_empty)
    }
}

/// Connects one channel to a subscriber and an optional reply channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: SubscriptionSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscriptionSpec {
    #[serde(default)]
    pub generation: i64,

    /// Source channel
    #[serde(default)]
    pub channel: ObjectReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<SubscriberSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyStrategy>,
}

impl Subscription {
    /// Name of the channel this subscription replies to, if any
    pub fn reply_channel_name(&self) -> Option<&str> {
        self.spec
            .reply
            .as_ref()
            .and_then(|r| r.channel.as_ref())
            .map(|c| c.name.as_str())
    }
}

impl ChildResource for Subscription {
    type Spec = SubscriptionSpec;

    fn spec(&self) -> &SubscriptionSpec {
        &self.spec
    }

    fn spec_mut(&mut self) -> &mut SubscriptionSpec {
        &mut self.spec
    }

    fn carry_over_external_fields(desired: &mut SubscriptionSpec, observed: &SubscriptionSpec) {
        desired.generation = observed.generation;
    }
}
