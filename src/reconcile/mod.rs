//! Sequence reconciliation

pub mod builder;
pub mod converge;
pub mod engine;
pub mod status;

pub use builder::{build_desired, StepResources};
pub use converge::{create_or_update, Convergence};
pub use engine::{
    EventHandler, ReconcileAction, ReconcileError, ReconcileEvent, Reconciled, Reconciler,
    REASON_NOT_PROVISIONED,
};
