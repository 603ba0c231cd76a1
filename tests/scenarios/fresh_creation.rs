//! Test: provisioning a fresh Sequence, then reconciling it again

use crate::helpers::*;
use sequencer::core::{Channel, ConditionStatus, ResourceKind, Subscription};
use sequencer::persistence;
use sequencer::reconcile::ReconcileAction;

#[tokio::test]
async fn test_two_steps_are_chained() {
    let (store, reconciler) = setup(sequence(
        vec![service_step("step-one"), service_step("step-two")],
        Some(reply_channel("resultchannel")),
    ))
    .await;

    let result = reconciler.reconcile(&sequence_key()).await.unwrap();
    assert_eq!(result.action, ReconcileAction::Provisioned { steps: 2 });
    assert!(result.status_updated);

    let channels = persistence::list::<Channel>(store.as_ref(), Some(NAMESPACE)).await.unwrap();
    let subscriptions = persistence::list::<Subscription>(store.as_ref(), Some(NAMESPACE)).await.unwrap();
    let names: Vec<_> = channels.iter().map(|c| c.metadata.name.as_str()).collect();
    assert_eq!(names, vec!["sequence-step-0", "sequence-step-1"]);
    assert_eq!(subscriptions.len(), 2);

    let stored = stored_sequence(store.as_ref()).await.unwrap();
    let uid = stored.metadata.uid.unwrap();
    for channel in &channels {
        assert_eq!(channel.metadata.controller_ref().unwrap().uid, uid);
        assert_eq!(channel.spec.provisioner.as_ref().unwrap().name, "in-memory-channel");
    }

    assert_eq!(subscriptions[0].spec.channel.name, "sequence-step-0");
    assert_eq!(subscriptions[0].reply_channel_name(), Some("sequence-step-1"));
    assert_eq!(
        subscriptions[0].spec.subscriber.as_ref().unwrap().ref_.as_ref().unwrap().name,
        "step-one"
    );
    assert_eq!(subscriptions[1].spec.channel.name, "sequence-step-1");
    assert_eq!(subscriptions[1].reply_channel_name(), Some("resultchannel"));

    assert_condition(&stored, "Provisioned", ConditionStatus::True);
    // No provisioner has published an address yet
    assert_condition(&stored, "Addressable", ConditionStatus::False);
    assert_condition(&stored, "Ready", ConditionStatus::False);
    assert!(stored.metadata.has_finalizer(FINALIZER));
}

#[tokio::test]
async fn test_first_pass_round_trips() {
    let (store, reconciler) = setup(sequence(
        vec![service_step("step-one"), service_step("step-two")],
        None,
    ))
    .await;

    reconciler.reconcile(&sequence_key()).await.unwrap();

    // 4 child creates and a single status write
    let writes = store.writes();
    assert_eq!(writes.len(), 5);
    assert_eq!(
        writes.iter().filter(|op| op.kind == OpKind::Create).count(),
        4
    );
    assert_eq!(writes[4].kind, OpKind::Update);
    assert_eq!(writes[4].key.kind, ResourceKind::Sequence);
}

#[tokio::test]
async fn test_second_pass_writes_nothing() {
    let (store, reconciler) = setup(sequence(
        vec![service_step("step-one"), service_step("step-two")],
        Some(reply_channel("resultchannel")),
    ))
    .await;

    reconciler.reconcile(&sequence_key()).await.unwrap();
    let before = stored_sequence(store.as_ref()).await.unwrap();
    store.clear_log();

    let result = reconciler.reconcile(&sequence_key()).await.unwrap();
    assert!(!result.status_updated);
    assert!(store.writes().is_empty(), "unexpected writes: {:?}", store.writes());

    let after = stored_sequence(store.as_ref()).await.unwrap();
    assert_eq!(before.metadata.resource_version, after.metadata.resource_version);
    assert_eq!(before.status, after.status);
}
