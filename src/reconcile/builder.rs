//! Desired-state builder - computes the children a Sequence implies
//!
//! Everything here is pure: the same Sequence always yields the same
//! children, which is what lets convergence compare instead of rewrite.

use crate::core::{
    step_resource_name, Channel, ChannelSpec, ChannelStatus, ObjectMeta, ObjectReference,
    OwnerReference, ReplyStrategy, Resource, Sequence, StepSpec, Subscription, SubscriptionSpec,
    API_VERSION,
};
use uuid::Uuid;

/// The children backing one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResources {
    pub index: usize,
    pub channel: Channel,
    pub subscription: Subscription,
}

/// Build every step's channel and subscription, in step order
pub fn build_desired(sequence: &Sequence, default_provisioner: &ObjectReference) -> Vec<StepResources> {
    let steps = &sequence.spec.steps;
    let owner = owner_reference(sequence);
    let namespace = &sequence.metadata.namespace;

    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let name = step_resource_name(&sequence.metadata.name, i);
            let provisioner = resolve_provisioner(step, sequence, default_provisioner);
            let channel = make_channel(&name, namespace, provisioner, &owner);

            let reply = if i + 1 == steps.len() {
                sequence.spec.reply.clone().filter(|r| !r.is_empty())
            } else {
                Some(ReplyStrategy::to_channel(ObjectReference::new(
                    API_VERSION,
                    "Channel",
                    step_resource_name(&sequence.metadata.name, i + 1),
                )))
            };
            let subscription = make_subscription(&name, namespace, channel.reference(), step, reply, &owner);

            StepResources {
                index: i,
                channel,
                subscription,
            }
        })
        .collect()
}

/// Step hint, then Sequence hint, then the cluster default
pub fn resolve_provisioner(
    step: &StepSpec,
    sequence: &Sequence,
    default_provisioner: &ObjectReference,
) -> ObjectReference {
    step.provisioner
        .as_ref()
        .or(sequence.spec.provisioner.as_ref())
        .unwrap_or(default_provisioner)
        .clone()
}

/// Controller reference pointing back at `sequence`
pub fn owner_reference(sequence: &Sequence) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: Sequence::KIND.to_string(),
        name: sequence.metadata.name.clone(),
        uid: sequence.metadata.uid.unwrap_or_else(Uuid::nil),
        controller: true,
        block_owner_deletion: true,
    }
}

fn child_meta(name: &str, namespace: &str, owner: &OwnerReference) -> ObjectMeta {
    let mut metadata = ObjectMeta::new(namespace, name);
    metadata.owner_references = vec![owner.clone()];
    metadata
}

fn make_channel(name: &str, namespace: &str, provisioner: ObjectReference, owner: &OwnerReference) -> Channel {
    Channel {
        metadata: child_meta(name, namespace, owner),
        spec: ChannelSpec {
            provisioner: Some(provisioner),
            ..Default::default()
        },
        status: ChannelStatus::default(),
    }
}

fn make_subscription(
    name: &str,
    namespace: &str,
    channel: ObjectReference,
    step: &StepSpec,
    reply: Option<ReplyStrategy>,
    owner: &OwnerReference,
) -> Subscription {
    let subscriber = Some(step.subscriber.clone()).filter(|s| !s.is_empty());
    Subscription {
        metadata: child_meta(name, namespace, owner),
        spec: SubscriptionSpec {
            generation: 0,
            channel,
            subscriber,
            reply,
        },
    }
}
