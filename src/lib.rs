//! sequencer - A reconciliation controller for Sequence pipelines

pub mod cli;
pub mod core;
pub mod persistence;
pub mod reconcile;

// Re-export commonly used types
pub use crate::core::config::ControllerConfig;
pub use crate::core::{Channel, NamespacedName, Object, Sequence, Subscription};
pub use persistence::{InMemoryStore, ObjectStore, StoreError};
pub use reconcile::{ReconcileAction, ReconcileError, ReconcileEvent, Reconciled, Reconciler};
