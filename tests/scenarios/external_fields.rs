//! Test: fields owned by other actors never cause child writes

use crate::helpers::*;
use sequencer::core::{
    Channel, ChannelSubscriber, NamespacedName, ObjectReference, ResourceKind, Subscribable,
    Subscription, API_VERSION,
};
use sequencer::persistence::{self, ObjectStore};

fn child_name(index: usize) -> NamespacedName {
    NamespacedName::new(NAMESPACE, format!("{}-step-{}", SEQUENCE, index))
}

#[tokio::test]
async fn test_external_fields_are_left_alone() {
    let (store, reconciler) = setup(sequence(vec![service_step("step-one")], None)).await;
    reconciler.reconcile(&sequence_key()).await.unwrap();

    let mut channel: Channel = persistence::get(store.as_ref(), &child_name(0)).await.unwrap().unwrap();
    channel.spec.generation = 3;
    channel.spec.subscribable = Some(Subscribable {
        subscribers: vec![ChannelSubscriber {
            uid: None,
            subscriber_uri: "step-one.testnamespace.svc.cluster.local".to_string(),
            reply_uri: String::new(),
        }],
    });
    persistence::update(store.as_ref(), channel).await.unwrap();

    let mut subscription: Subscription =
        persistence::get(store.as_ref(), &child_name(0)).await.unwrap().unwrap();
    subscription.spec.generation = 2;
    persistence::update(store.as_ref(), subscription).await.unwrap();

    store.clear_log();
    reconciler.reconcile(&sequence_key()).await.unwrap();
    assert!(store.writes().is_empty(), "unexpected writes: {:?}", store.writes());

    let channel: Channel = persistence::get(store.as_ref(), &child_name(0)).await.unwrap().unwrap();
    assert_eq!(channel.spec.generation, 3);
    assert!(channel.spec.subscribable.is_some());
}

#[tokio::test]
async fn test_drift_in_managed_fields_is_reverted() {
    let (store, reconciler) = setup(sequence(
        vec![service_step("step-one"), service_step("step-two")],
        None,
    ))
    .await;
    reconciler.reconcile(&sequence_key()).await.unwrap();

    let mut channel: Channel = persistence::get(store.as_ref(), &child_name(1)).await.unwrap().unwrap();
    channel.spec.provisioner = Some(ObjectReference::new(API_VERSION, "ClusterChannelProvisioner", "kafka"));
    persistence::update(store.as_ref(), channel).await.unwrap();

    let mut subscription: Subscription =
        persistence::get(store.as_ref(), &child_name(0)).await.unwrap().unwrap();
    subscription.spec.reply = None;
    persistence::update(store.as_ref(), subscription).await.unwrap();

    store.clear_log();
    reconciler.reconcile(&sequence_key()).await.unwrap();

    let writes = store.writes();
    assert_eq!(writes.len(), 2, "unexpected writes: {:?}", writes);
    assert!(writes.contains(&Op {
        kind: OpKind::Update,
        key: child_key(ResourceKind::Channel, 1),
    }));
    assert!(writes.contains(&Op {
        kind: OpKind::Update,
        key: child_key(ResourceKind::Subscription, 0),
    }));

    let channel: Channel = persistence::get(store.as_ref(), &child_name(1)).await.unwrap().unwrap();
    assert_eq!(channel.spec.provisioner.unwrap().name, "in-memory-channel");
    let subscription: Subscription =
        persistence::get(store.as_ref(), &child_name(0)).await.unwrap().unwrap();
    assert_eq!(subscription.reply_channel_name(), Some("sequence-step-1"));
}

#[tokio::test]
async fn test_deleted_child_is_recreated() {
    let (store, reconciler) = setup(sequence(vec![service_step("step-one")], None)).await;
    reconciler.reconcile(&sequence_key()).await.unwrap();

    store.delete(&child_key(ResourceKind::Subscription, 0)).await.unwrap();
    store.clear_log();

    reconciler.reconcile(&sequence_key()).await.unwrap();
    assert_eq!(
        store.writes(),
        vec![Op {
            kind: OpKind::Create,
            key: child_key(ResourceKind::Subscription, 0),
        }]
    );
}
