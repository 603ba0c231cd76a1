//! Reconcile scenarios against a recording in-memory store

mod helpers;

mod addressable;
mod external_fields;
mod failure_handling;
mod fresh_creation;
