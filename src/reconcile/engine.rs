//! Reconciler - drives one Sequence toward its desired children

use crate::{
    core::{
        config::ControllerConfig, ConditionStatus, NamespacedName, Sequence, SequenceStatus,
        CONDITION_READY,
    },
    persistence::{self, ObjectStore, StoreError},
    reconcile::{
        builder::{self, StepResources},
        converge::{self, Convergence},
        status,
    },
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Reason recorded on Provisioned when a step could not be converged
pub const REASON_NOT_PROVISIONED: &str = "NotProvisioned";

/// Error types for a reconcile pass
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to get Sequence {key}: {source}")]
    Fetch { key: NamespacedName, source: StoreError },

    #[error("error while provisioning step {step}: {source}")]
    ChildProvision {
        key: NamespacedName,
        step: usize,
        source: StoreError,
    },

    #[error("Sequence {key} was modified concurrently: {source}")]
    Conflict { key: NamespacedName, source: StoreError },

    #[error("failed to update status of Sequence {key}: {source}")]
    StatusWrite { key: NamespacedName, source: StoreError },
}

impl ReconcileError {
    /// Every failure is transient from the reconciler's point of view
    pub fn is_retryable(&self) -> bool {
        true
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Conflict { .. })
    }

    /// The Sequence the failed pass was for
    pub fn key(&self) -> &NamespacedName {
        match self {
            ReconcileError::Fetch { key, .. }
            | ReconcileError::ChildProvision { key, .. }
            | ReconcileError::Conflict { key, .. }
            | ReconcileError::StatusWrite { key, .. } => key,
        }
    }
}

/// What a successful pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// The Sequence no longer exists
    NotFound,
    /// The Sequence is being deleted; the finalizer was released
    Finalized,
    /// Every step's children were converged
    Provisioned { steps: usize },
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub key: NamespacedName,
    pub action: ReconcileAction,
    pub status: SequenceStatus,
    pub status_updated: bool,
}

/// Events that can occur during a reconcile pass
#[derive(Debug, Clone)]
pub enum ReconcileEvent {
    Started {
        key: NamespacedName,
    },
    ChildConverged {
        key: NamespacedName,
        step: usize,
        kind: &'static str,
        name: String,
        outcome: Convergence,
    },
    StepFailed {
        key: NamespacedName,
        step: usize,
        error: String,
    },
    FinalizerReleased {
        key: NamespacedName,
    },
    StatusPublished {
        key: NamespacedName,
        ready: ConditionStatus,
    },
    Finished {
        key: NamespacedName,
        action: ReconcileAction,
    },
    Failed {
        key: NamespacedName,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ReconcileEvent) + Send + Sync>;

/// Sequence reconciler
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    config: ControllerConfig,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ObjectStore>, config: ControllerConfig) -> Self {
        Self {
            store,
            config,
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ReconcileEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ReconcileEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Run one reconcile pass for the Sequence at `key`
    ///
    /// Status is published whether or not convergence succeeded. If both
    /// fail, the status error is the one returned.
    pub async fn reconcile(&self, key: &NamespacedName) -> Result<Reconciled, ReconcileError> {
        info!("Reconciling Sequence {}", key);
        self.emit_event(ReconcileEvent::Started { key: key.clone() }).await;

        let mut sequence = match persistence::get::<Sequence>(self.store.as_ref(), key).await {
            Ok(Some(sequence)) => sequence,
            Ok(None) => {
                info!("Sequence {} not found, nothing to do", key);
                return Ok(self.finish(key, ReconcileAction::NotFound, SequenceStatus::default(), false).await);
            }
            Err(source) => {
                error!("Failed to get Sequence {}: {}", key, source);
                return Err(self.fail(ReconcileError::Fetch { key: key.clone(), source }).await);
            }
        };

        let converged = self.converge(key, &mut sequence).await;

        let status_updated = match status::publish(self.store.as_ref(), &mut sequence).await {
            Ok(updated) => updated,
            Err(source) => {
                warn!("Failed to update status of Sequence {}: {}", key, source);
                let err = if source.is_conflict() {
                    ReconcileError::Conflict { key: key.clone(), source }
                } else {
                    ReconcileError::StatusWrite { key: key.clone(), source }
                };
                return Err(self.fail(err).await);
            }
        };
        if status_updated {
            let ready = sequence
                .status
                .get_condition(&CONDITION_READY)
                .map(|c| c.status)
                .unwrap_or_default();
            self.emit_event(ReconcileEvent::StatusPublished { key: key.clone(), ready }).await;
        }

        match converged {
            Ok(action) => Ok(self.finish(key, action, sequence.status, status_updated).await),
            Err(err) => Err(self.fail(err).await),
        }
    }

    /// Reconcile every Sequence, optionally within one namespace
    ///
    /// One failing Sequence does not stop the others.
    pub async fn reconcile_all(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<(NamespacedName, Result<Reconciled, ReconcileError>)>, StoreError> {
        let sequences = persistence::list::<Sequence>(self.store.as_ref(), namespace).await?;
        let mut results = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            let key = sequence.metadata.key();
            let result = self.reconcile(&key).await;
            results.push((key, result));
        }
        Ok(results)
    }

    async fn converge(
        &self,
        key: &NamespacedName,
        sequence: &mut Sequence,
    ) -> Result<ReconcileAction, ReconcileError> {
        if sequence.metadata.is_being_deleted() {
            debug!("Sequence {} is being deleted", key);
            if sequence.metadata.remove_finalizer(&self.config.finalizer_name) {
                self.emit_event(ReconcileEvent::FinalizerReleased { key: key.clone() }).await;
            }
            return Ok(ReconcileAction::Finalized);
        }

        sequence.status.initialize_conditions();

        let desired = builder::build_desired(sequence, &self.config.default_provisioner);
        for step in &desired {
            if let Err(source) = self.converge_step(key, step).await {
                error!("Failed to reconcile step {} of Sequence {}: {}", step.index, key, source);
                sequence.status.mark_not_provisioned(
                    REASON_NOT_PROVISIONED,
                    format!("error while provisioning step {}: {}", step.index, source),
                );
                self.emit_event(ReconcileEvent::StepFailed {
                    key: key.clone(),
                    step: step.index,
                    error: source.to_string(),
                })
                .await;
                return Err(ReconcileError::ChildProvision {
                    key: key.clone(),
                    step: step.index,
                    source,
                });
            }
        }

        sequence.status.mark_provisioned();
        sequence.metadata.add_finalizer(&self.config.finalizer_name);
        Ok(ReconcileAction::Provisioned { steps: desired.len() })
    }

    async fn converge_step(&self, key: &NamespacedName, step: &StepResources) -> Result<(), StoreError> {
        let outcome = converge::create_or_update(self.store.as_ref(), &step.channel).await?;
        self.emit_event(ReconcileEvent::ChildConverged {
            key: key.clone(),
            step: step.index,
            kind: "Channel",
            name: step.channel.metadata.name.clone(),
            outcome,
        })
        .await;

        let outcome = converge::create_or_update(self.store.as_ref(), &step.subscription).await?;
        self.emit_event(ReconcileEvent::ChildConverged {
            key: key.clone(),
            step: step.index,
            kind: "Subscription",
            name: step.subscription.metadata.name.clone(),
            outcome,
        })
        .await;
        Ok(())
    }

    async fn finish(
        &self,
        key: &NamespacedName,
        action: ReconcileAction,
        status: SequenceStatus,
        status_updated: bool,
    ) -> Reconciled {
        self.emit_event(ReconcileEvent::Finished {
            key: key.clone(),
            action: action.clone(),
        })
        .await;
        Reconciled {
            key: key.clone(),
            action,
            status,
            status_updated,
        }
    }

    async fn fail(&self, err: ReconcileError) -> ReconcileError {
        self.emit_event(ReconcileEvent::Failed {
            key: err.key().clone(),
            error: err.to_string(),
        })
        .await;
        err
    }
}
