//! Core domain models for the Sequence controller
//!
//! This module defines the resources the controller reads and writes,
//! their metadata, and the status condition model.

pub mod channel;
pub mod condition;
pub mod config;
pub mod meta;
pub mod resource;
pub mod sequence;

pub use channel::*;
pub use condition::*;
pub use meta::*;
pub use resource::*;
pub use sequence::*;
