//! Test: the Sequence address follows its first channel

use crate::helpers::*;
use sequencer::core::ConditionStatus;

const HOSTNAME: &str = "sequence-step-0.testnamespace.svc.cluster.local";

#[tokio::test]
async fn test_empty_address_is_not_addressable() {
    let (store, reconciler) = setup(sequence(vec![service_step("step-one")], None)).await;
    reconciler.reconcile(&sequence_key()).await.unwrap();

    let stored = stored_sequence(store.as_ref()).await.unwrap();
    let addressable = condition(&stored, "Addressable");
    assert_eq!(addressable.status, ConditionStatus::False);
    assert_eq!(addressable.reason, "emptyHostname");
    assert_eq!(addressable.message, "hostname is the empty string");

    // Ready mirrors the failing dependent
    let ready = condition(&stored, "Ready");
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.reason, "emptyHostname");
}

#[tokio::test]
async fn test_address_published_once_channel_is_provisioned() {
    let (store, reconciler) = setup(sequence(
        vec![service_step("step-one"), service_step("step-two")],
        None,
    ))
    .await;
    reconciler.reconcile(&sequence_key()).await.unwrap();

    set_channel_hostname(store.as_ref(), 0, HOSTNAME).await;
    let result = reconciler.reconcile(&sequence_key()).await.unwrap();
    assert!(result.status_updated);
    assert!(result.status.is_ready());

    let stored = stored_sequence(store.as_ref()).await.unwrap();
    assert_eq!(stored.status.address.hostname, HOSTNAME);
    assert_condition(&stored, "Addressable", ConditionStatus::True);
    assert_condition(&stored, "Ready", ConditionStatus::True);
    assert!(condition(&stored, "Ready").reason.is_empty());
}

#[tokio::test]
async fn test_only_the_first_channel_counts() {
    let (store, reconciler) = setup(sequence(
        vec![service_step("step-one"), service_step("step-two")],
        None,
    ))
    .await;
    reconciler.reconcile(&sequence_key()).await.unwrap();

    set_channel_hostname(store.as_ref(), 1, "sequence-step-1.testnamespace.svc.cluster.local").await;
    reconciler.reconcile(&sequence_key()).await.unwrap();
    let stored = stored_sequence(store.as_ref()).await.unwrap();
    assert_condition(&stored, "Addressable", ConditionStatus::False);
}

#[tokio::test]
async fn test_losing_the_address_flips_conditions() {
    let (store, reconciler) = setup(sequence(vec![service_step("step-one")], None)).await;
    reconciler.reconcile(&sequence_key()).await.unwrap();
    set_channel_hostname(store.as_ref(), 0, HOSTNAME).await;
    reconciler.reconcile(&sequence_key()).await.unwrap();
    let ready_since = condition(&stored_sequence(store.as_ref()).await.unwrap(), "Ready").last_transition_time;

    // Unchanged address: transition times stay put
    reconciler.reconcile(&sequence_key()).await.unwrap();
    let stored = stored_sequence(store.as_ref()).await.unwrap();
    assert_eq!(condition(&stored, "Ready").last_transition_time, ready_since);

    set_channel_hostname(store.as_ref(), 0, "").await;
    reconciler.reconcile(&sequence_key()).await.unwrap();
    let stored = stored_sequence(store.as_ref()).await.unwrap();
    assert!(stored.status.address.hostname.is_empty());
    assert_condition(&stored, "Addressable", ConditionStatus::False);
    assert_condition(&stored, "Ready", ConditionStatus::False);
    assert!(condition(&stored, "Ready").last_transition_time >= ready_since);
}
