//! Test utilities shared by the reconcile scenarios

use async_trait::async_trait;
use sequencer::core::config::ControllerConfig;
use sequencer::core::{
    Channel, Condition, ConditionStatus, ConditionType, NamespacedName, Object, ObjectKey,
    ObjectReference, ReplyStrategy, ResourceKind, Sequence, SequenceSpec, StepSpec,
    SubscriberSpec, API_VERSION,
};
use sequencer::persistence::{self, InMemoryStore, ObjectStore, StoreError};
use sequencer::reconcile::Reconciler;
use std::sync::{Arc, Mutex};

/// Store operation kinds, as seen by [`RecordingStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Get,
    Create,
    Update,
    Delete,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    pub kind: OpKind,
    pub key: ObjectKey,
}

impl Op {
    pub fn is_write(&self) -> bool {
        matches!(self.kind, OpKind::Create | OpKind::Update | OpKind::Delete)
    }
}

/// Failure to inject on a matching operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injected {
    Backend,
    Conflict,
}

/// In-memory store that records every call and can be told to fail some
pub struct RecordingStore {
    inner: InMemoryStore,
    ops: Mutex<Vec<Op>>,
    failures: Mutex<Vec<(OpKind, ObjectKey, Injected)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            ops: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Fail every `op` on `key` until [`RecordingStore::clear_failures`]
    pub fn fail_on(&self, op: OpKind, key: ObjectKey, failure: Injected) {
        self.failures.lock().unwrap().push((op, key, failure));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<Op> {
        self.ops().into_iter().filter(Op::is_write).collect()
    }

    pub fn reads(&self) -> usize {
        self.ops().iter().filter(|op| op.kind == OpKind::Get).count()
    }

    pub fn clear_log(&self) {
        self.ops.lock().unwrap().clear();
    }

    fn record(&self, kind: OpKind, key: &ObjectKey) -> Result<(), StoreError> {
        self.ops.lock().unwrap().push(Op {
            kind,
            key: key.clone(),
        });
        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(op, k, _)| *op == kind && k == key) {
            Some((_, _, Injected::Backend)) => {
                Err(StoreError::Backend(format!("injected failure on {}", key)))
            }
            Some((_, _, Injected::Conflict)) => Err(StoreError::Conflict {
                key: key.clone(),
                expected: 0,
                actual: 0,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Object>, StoreError> {
        self.record(OpKind::Get, key)?;
        self.inner.get(key).await
    }

    async fn create(&self, object: Object) -> Result<Object, StoreError> {
        self.record(OpKind::Create, &object.key())?;
        self.inner.create(object).await
    }

    async fn update(&self, object: Object) -> Result<Object, StoreError> {
        self.record(OpKind::Update, &object.key())?;
        self.inner.update(object).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.record(OpKind::Delete, key)?;
        self.inner.delete(key).await
    }

    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<Object>, StoreError> {
        self.record(OpKind::List, &ObjectKey::new(kind, namespace.unwrap_or_default(), ""))?;
        self.inner.list(kind, namespace).await
    }
}

pub const NAMESPACE: &str = "testnamespace";
pub const SEQUENCE: &str = "sequence";
pub const FINALIZER: &str = "sequence-controller";

pub fn sequence_key() -> NamespacedName {
    NamespacedName::new(NAMESPACE, SEQUENCE)
}

pub fn child_key(kind: ResourceKind, index: usize) -> ObjectKey {
    ObjectKey::new(kind, NAMESPACE, format!("{}-step-{}", SEQUENCE, index))
}

/// Step delivering to a Service
pub fn service_step(service: &str) -> StepSpec {
    StepSpec {
        subscriber: SubscriberSpec {
            ref_: Some(ObjectReference::new("v1", "Service", service)),
            dns_name: None,
        },
        provisioner: None,
    }
}

pub fn reply_channel(name: &str) -> ReplyStrategy {
    ReplyStrategy::to_channel(ObjectReference::new(API_VERSION, "Channel", name))
}

pub fn sequence(steps: Vec<StepSpec>, reply: Option<ReplyStrategy>) -> Sequence {
    Sequence::new(
        NAMESPACE,
        SEQUENCE,
        SequenceSpec {
            steps,
            reply,
            ..Default::default()
        },
    )
}

/// Store `sequence` and return a reconciler over the store
pub async fn setup(sequence: Sequence) -> (Arc<RecordingStore>, Reconciler) {
    let store = Arc::new(RecordingStore::new());
    persistence::create(store.as_ref(), sequence).await.unwrap();
    store.clear_log();
    let reconciler = Reconciler::new(store.clone(), ControllerConfig::default());
    (store, reconciler)
}

pub async fn stored_sequence(store: &dyn ObjectStore) -> Option<Sequence> {
    persistence::get(store, &sequence_key()).await.unwrap()
}

/// Act as the channel provisioner for step `index`
pub async fn set_channel_hostname(store: &dyn ObjectStore, index: usize, hostname: &str) {
    let key = NamespacedName::new(NAMESPACE, format!("{}-step-{}", SEQUENCE, index));
    let mut channel: Channel = persistence::get(store, &key).await.unwrap().unwrap();
    channel.status.address.hostname = hostname.to_string();
    persistence::update(store, channel).await.unwrap();
}

pub fn condition<'a>(sequence: &'a Sequence, type_: &str) -> &'a Condition {
    sequence
        .status
        .get_condition(&ConditionType::new(type_))
        .unwrap_or_else(|| panic!("condition {} not set", type_))
}

pub fn assert_condition(sequence: &Sequence, type_: &str, status: ConditionStatus) {
    assert_eq!(
        condition(sequence, type_).status,
        status,
        "condition {} of {:?}",
        type_,
        sequence.status.conditions
    );
}
