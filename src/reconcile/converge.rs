//! Create-or-update of a single child resource

use crate::core::{ChildResource, NamespacedName};
use crate::persistence::{self, ObjectStore, StoreError};
use tracing::{debug, info, warn};

/// What converging one child did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    Created,
    Updated,
    Unchanged,
}

impl Convergence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Convergence::Created => "created",
            Convergence::Updated => "updated",
            Convergence::Unchanged => "unchanged",
        }
    }
}

/// Make the stored copy of `desired` match it
///
/// Absent objects are created. Present objects are rewritten only when a
/// field this controller manages differs; fields maintained by other actors
/// are taken from the stored copy first, so their drift never causes a write.
/// A child controlled by another owner is never touched.
pub async fn create_or_update<R: ChildResource>(
    store: &dyn ObjectStore,
    desired: &R,
) -> Result<Convergence, StoreError> {
    let meta = desired.metadata();
    let key = NamespacedName::new(meta.namespace.clone(), meta.name.clone());

    let Some(mut observed) = persistence::get::<R>(store, &key).await? else {
        info!("Creating {} {}", R::KIND, key);
        persistence::create(store, desired.clone()).await?;
        return Ok(Convergence::Created);
    };

    let desired_owner = meta.controller_ref();
    if let (Some(want), Some(have)) = (desired_owner, observed.metadata().controller_ref()) {
        if want.uid != have.uid {
            // Two Sequences deriving the same child name; the first owner keeps it
            warn!(
                "{} {} is controlled by {} {} ({}), not {}; leaving it as-is",
                R::KIND,
                key,
                have.kind,
                have.name,
                have.uid,
                want.uid
            );
            return Ok(Convergence::Unchanged);
        }
    }

    let mut spec = desired.spec().clone();
    R::carry_over_external_fields(&mut spec, observed.spec());

    let spec_changed = spec != *observed.spec();
    let owner_missing = observed.metadata().controller_ref().is_none() && desired_owner.is_some();
    if !spec_changed && !owner_missing {
        debug!("{} {} is up to date", R::KIND, key);
        return Ok(Convergence::Unchanged);
    }

    *observed.spec_mut() = spec;
    if owner_missing {
        observed.metadata_mut().owner_references = meta.owner_references.clone();
    }
    info!("Updating {} {}", R::KIND, key);
    persistence::update(store, observed).await?;
    Ok(Convergence::Updated)
}
