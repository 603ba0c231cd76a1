//! CLI command definitions

use crate::core::NamespacedName;
use clap::Args;

/// Create or update objects from a manifest
#[derive(Debug, Args, Clone)]
pub struct ApplyCommand {
    /// Path to a (multi-document) YAML manifest
    #[arg(short, long)]
    pub file: String,

    /// Reconcile every applied Sequence right away
    #[arg(long)]
    pub reconcile: bool,
}

/// Run a reconcile pass
#[derive(Debug, Args, Clone)]
pub struct ReconcileCommand {
    /// Sequence to reconcile (namespace/name)
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub sequence: Option<NamespacedName>,

    /// Reconcile every Sequence
    #[arg(long)]
    pub all: bool,

    /// With --all, only Sequences in this namespace
    #[arg(short, long, requires = "all")]
    pub namespace: Option<String>,
}

/// Show the status of a Sequence
#[derive(Debug, Args, Clone)]
pub struct StatusCommand {
    /// Sequence (namespace/name)
    pub sequence: NamespacedName,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Request deletion of a Sequence
#[derive(Debug, Args, Clone)]
pub struct DeleteCommand {
    /// Sequence (namespace/name)
    pub sequence: NamespacedName,
}

/// List the children of a Sequence
#[derive(Debug, Args, Clone)]
pub struct ChildrenCommand {
    /// Sequence (namespace/name)
    pub sequence: NamespacedName,
}

/// Set the address of a channel
#[derive(Debug, Args, Clone)]
pub struct SetAddressCommand {
    /// Channel (namespace/name)
    pub channel: NamespacedName,

    /// Hostname to publish; empty clears the address
    pub hostname: String,
}
