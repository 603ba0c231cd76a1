//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    ApplyCommand, ChildrenCommand, DeleteCommand, ReconcileCommand, SetAddressCommand,
    StatusCommand,
};
use std::ffi::OsString;

/// Sequence controller
#[derive(Debug, Parser, Clone)]
#[command(name = "sequencer")]
#[command(author = "Sequencer Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Converges Sequence pipelines into channels and subscriptions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to controller configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to the object database
    #[arg(long, global = true, conflicts_with = "in_memory")]
    pub store: Option<String>,

    /// Keep objects in memory only; nothing survives the process
    #[arg(long, global = true)]
    pub in_memory: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create or update objects from a manifest
    Apply(ApplyCommand),

    /// Run a reconcile pass
    Reconcile(ReconcileCommand),

    /// Show the status of a Sequence
    Status(StatusCommand),

    /// Request deletion of a Sequence
    Delete(DeleteCommand),

    /// List the channels and subscriptions of a Sequence
    Children(ChildrenCommand),

    /// Set the address of a channel, as its provisioner would
    SetAddress(SetAddressCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
