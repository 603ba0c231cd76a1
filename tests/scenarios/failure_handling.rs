//! Test: failures while provisioning steps or writing status

use crate::helpers::*;
use sequencer::core::{Channel, ConditionStatus, NamespacedName, ObjectKey, ResourceKind, Sequence};
use sequencer::persistence;
use sequencer::reconcile::{ReconcileAction, ReconcileError};

fn three_steps() -> Sequence {
    sequence(
        vec![service_step("a"), service_step("b"), service_step("c")],
        Some(reply_channel("resultchannel")),
    )
}

#[tokio::test]
async fn test_step_failure_is_reported_on_provisioned() {
    let (store, reconciler) = setup(three_steps()).await;
    store.fail_on(
        OpKind::Create,
        child_key(ResourceKind::Subscription, 1),
        Injected::Backend,
    );

    let err = reconciler.reconcile(&sequence_key()).await.unwrap_err();
    match &err {
        ReconcileError::ChildProvision { step, .. } => assert_eq!(*step, 1),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_retryable());

    let stored = stored_sequence(store.as_ref()).await.unwrap();
    let provisioned = condition(&stored, "Provisioned");
    assert_eq!(provisioned.status, ConditionStatus::False);
    assert_eq!(provisioned.reason, "NotProvisioned");
    assert!(provisioned
        .message
        .starts_with("error while provisioning step 1: "));
    assert_condition(&stored, "Ready", ConditionStatus::False);
    assert!(stored.metadata.finalizers.is_empty());

    // Work already done stays in place; later steps were never attempted
    let channels = persistence::list::<Channel>(store.as_ref(), Some(NAMESPACE)).await.unwrap();
    let names: Vec<_> = channels.iter().map(|c| c.metadata.name.as_str()).collect();
    assert_eq!(names, vec!["sequence-step-0", "sequence-step-1"]);
    assert!(!store
        .ops()
        .iter()
        .any(|op| op.key == child_key(ResourceKind::Channel, 2)));
}

#[tokio::test]
async fn test_next_pass_resumes_after_failure() {
    let (store, reconciler) = setup(three_steps()).await;
    store.fail_on(
        OpKind::Create,
        child_key(ResourceKind::Subscription, 1),
        Injected::Backend,
    );
    reconciler.reconcile(&sequence_key()).await.unwrap_err();

    store.clear_failures();
    store.clear_log();
    let result = reconciler.reconcile(&sequence_key()).await.unwrap();
    assert_eq!(result.action, ReconcileAction::Provisioned { steps: 3 });

    // Only the missing children are created
    let creates = store
        .writes()
        .into_iter()
        .filter(|op| op.kind == OpKind::Create)
        .count();
    assert_eq!(creates, 3);

    let stored = stored_sequence(store.as_ref()).await.unwrap();
    assert_condition(&stored, "Provisioned", ConditionStatus::True);
    assert!(stored.metadata.has_finalizer(FINALIZER));
}

#[tokio::test]
async fn test_status_error_wins() {
    let (store, reconciler) = setup(three_steps()).await;
    store.fail_on(
        OpKind::Create,
        child_key(ResourceKind::Channel, 0),
        Injected::Backend,
    );
    store.fail_on(
        OpKind::Update,
        ObjectKey::of::<Sequence>(&sequence_key()),
        Injected::Conflict,
    );

    let err = reconciler.reconcile(&sequence_key()).await.unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {:?}", err);
    assert_eq!(err.key(), &sequence_key());
}

#[tokio::test]
async fn test_status_write_failure() {
    let (store, reconciler) = setup(three_steps()).await;
    store.fail_on(
        OpKind::Update,
        ObjectKey::of::<Sequence>(&sequence_key()),
        Injected::Backend,
    );

    let err = reconciler.reconcile(&sequence_key()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::StatusWrite { .. }), "unexpected error: {:?}", err);

    // Children were still converged
    store.clear_failures();
    store.clear_log();
    reconciler.reconcile(&sequence_key()).await.unwrap();
    assert!(store
        .writes()
        .iter()
        .all(|op| op.key.kind == ResourceKind::Sequence));
}

#[tokio::test]
async fn test_fetch_failure() {
    let (store, reconciler) = setup(three_steps()).await;
    store.fail_on(
        OpKind::Get,
        ObjectKey::of::<Sequence>(&sequence_key()),
        Injected::Backend,
    );

    let err = reconciler.reconcile(&sequence_key()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Fetch { .. }));
    assert!(store.writes().is_empty());
    assert_eq!(err.key(), &NamespacedName::new(NAMESPACE, SEQUENCE));
}
