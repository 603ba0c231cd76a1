//! Publishing a reconciled Sequence's status and finalizers

use crate::core::{step_resource_name, Channel, NamespacedName, Sequence};
use crate::persistence::{self, ObjectStore, StoreError};
use tracing::debug;

/// Hostname of the channel backing the first step, or empty
pub async fn first_step_hostname(
    store: &dyn ObjectStore,
    sequence: &Sequence,
) -> Result<String, StoreError> {
    if sequence.spec.steps.is_empty() {
        return Ok(String::new());
    }
    let key = NamespacedName::new(
        sequence.metadata.namespace.clone(),
        step_resource_name(&sequence.metadata.name, 0),
    );
    Ok(persistence::get::<Channel>(store, &key)
        .await?
        .map(|channel| channel.status.address.hostname)
        .unwrap_or_default())
}

/// Write back the status and finalizers of `sequence`
///
/// The stored Sequence is re-read first; if it is gone there is nothing to
/// write. Before comparing, the address is refreshed from the first step's
/// channel. Returns whether a write happened. At most one write is made,
/// against the re-read resource version, so a concurrent change surfaces as
/// a conflict.
pub async fn publish(store: &dyn ObjectStore, sequence: &mut Sequence) -> Result<bool, StoreError> {
    let key = sequence.metadata.key();
    let Some(fresh) = persistence::get::<Sequence>(store, &key).await? else {
        debug!("Sequence {} is gone, skipping status update", key);
        return Ok(false);
    };

    let hostname = first_step_hostname(store, sequence).await?;
    sequence.status.set_address(hostname);

    let mut updated = fresh.clone();
    let mut changed = false;
    if fresh.metadata.finalizers != sequence.metadata.finalizers {
        updated.metadata.finalizers = sequence.metadata.finalizers.clone();
        changed = true;
    }
    if fresh.status != sequence.status {
        updated.status = sequence.status.clone();
        changed = true;
    }
    if !changed {
        debug!("Sequence {} status unchanged", key);
        return Ok(false);
    }

    let written = persistence::update(store, updated).await?;
    sequence.metadata.resource_version = written.metadata.resource_version;
    debug!("Published status of Sequence {}", key);
    Ok(true)
}
