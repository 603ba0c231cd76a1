use anyhow::{Context, Result};
use sequencer::cli::commands::{
    ApplyCommand, ChildrenCommand, DeleteCommand, ReconcileCommand, SetAddressCommand,
    StatusCommand,
};
use sequencer::cli::output::*;
use sequencer::cli::{Cli, Command};
use sequencer::core::config::{load_manifest_file, ControllerConfig};
use sequencer::core::{Channel, NamespacedName, Object, ObjectKey, Sequence, Subscription};
use sequencer::persistence::{self, InMemoryStore, ObjectStore};
use sequencer::reconcile::{ReconcileError, Reconciled, Reconciler};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = match &cli.config {
        Some(path) => ControllerConfig::from_file(path).context("Failed to load controller config")?,
        None => ControllerConfig::default(),
    };
    let store = open_store(&cli).await?;

    match &cli.command {
        Command::Apply(cmd) => apply(cmd, store, config).await?,
        Command::Reconcile(cmd) => reconcile(cmd, store, config).await?,
        Command::Status(cmd) => show_status(cmd, store.as_ref()).await?,
        Command::Delete(cmd) => delete(cmd, store.as_ref()).await?,
        Command::Children(cmd) => show_children(cmd, store.as_ref()).await?,
        Command::SetAddress(cmd) => set_address(cmd, store.as_ref()).await?,
    }

    Ok(())
}

async fn open_store(cli: &Cli) -> Result<Arc<dyn ObjectStore>> {
    if cli.in_memory {
        return Ok(Arc::new(InMemoryStore::new()));
    }
    open_persistent_store(cli.store.as_deref()).await
}

#[cfg(feature = "sqlite")]
async fn open_persistent_store(path: Option<&str>) -> Result<Arc<dyn ObjectStore>> {
    use sequencer::persistence::SqliteObjectStore;
    let store = match path {
        Some(path) => SqliteObjectStore::new(path).await?,
        None => SqliteObjectStore::with_default_path().await?,
    };
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_persistent_store(_path: Option<&str>) -> Result<Arc<dyn ObjectStore>> {
    warn!("Built without the sqlite feature; objects are kept in memory");
    Ok(Arc::new(InMemoryStore::new()))
}

async fn attach_output(reconciler: &Reconciler) {
    reconciler
        .add_event_handler(|event| println!("{}", format_reconcile_event(&event)))
        .await;
}

async fn apply(cmd: &ApplyCommand, store: Arc<dyn ObjectStore>, config: ControllerConfig) -> Result<()> {
    let objects = load_manifest_file(&cmd.file)?;
    println!("{} Loaded {} objects from {}", INFO, objects.len(), style(&cmd.file).bold());

    let mut sequences = Vec::new();
    for object in objects {
        let key = object.key();
        if let Object::Sequence(sequence) = &object {
            sequences.push(sequence.metadata.key());
        }

        let existing = store.get(&key).await?;
        match (object, existing) {
            (object, None) => {
                store.create(object).await?;
                println!("{} {} created", CHECK, style(&key).bold());
            }
            (Object::Sequence(sequence), Some(Object::Sequence(existing))) => {
                if let Err(err) = sequence.check_immutable_fields(&existing) {
                    println!("{} {}: {}", CROSS, style(&key).red(), err);
                    if let Some(details) = &err.details {
                        for line in details.lines() {
                            println!("    {}", style(line).dim());
                        }
                    }
                    std::process::exit(1);
                }
                println!("{} {} unchanged", INFO, style(&key).bold());
            }
            (mut object, Some(existing)) => {
                object.adopt_stored(&existing);
                store.update(object).await?;
                println!("{} {} configured", CHECK, style(&key).bold());
            }
        }
    }

    if cmd.reconcile && !sequences.is_empty() {
        println!();
        let reconciler = Reconciler::new(store, config);
        attach_output(&reconciler).await;
        let mut failed = false;
        for key in &sequences {
            failed |= report(key, reconciler.reconcile(key).await);
        }
        if failed {
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn reconcile(cmd: &ReconcileCommand, store: Arc<dyn ObjectStore>, config: ControllerConfig) -> Result<()> {
    let reconciler = Reconciler::new(store, config);
    attach_output(&reconciler).await;

    let failed = match &cmd.sequence {
        Some(key) => report(key, reconciler.reconcile(key).await),
        None => {
            let results = reconciler.reconcile_all(cmd.namespace.as_deref()).await?;
            if results.is_empty() {
                println!("{} No Sequences found", INFO);
            }
            let mut failed = false;
            for (key, result) in results {
                failed |= report(&key, result);
            }
            failed
        }
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Log a failed pass; returns whether it failed
fn report(key: &NamespacedName, result: Result<Reconciled, ReconcileError>) -> bool {
    match result {
        Ok(_) => false,
        Err(err) => {
            if err.is_conflict() {
                warn!("{} changed while reconciling, run again: {}", key, err);
            } else {
                error!("Reconcile of {} failed: {}", key, err);
            }
            true
        }
    }
}

async fn show_status(cmd: &StatusCommand, store: &dyn ObjectStore) -> Result<()> {
    let Some(sequence) = persistence::get::<Sequence>(store, &cmd.sequence).await? else {
        println!("{} Sequence {} not found", WARN, cmd.sequence);
        std::process::exit(1);
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&sequence)?);
    } else {
        println!("{}", format_sequence(&sequence));
    }
    Ok(())
}

async fn delete(cmd: &DeleteCommand, store: &dyn ObjectStore) -> Result<()> {
    let key = ObjectKey::of::<Sequence>(&cmd.sequence);
    if let Err(err) = store.delete(&key).await {
        if err.is_not_found() {
            println!("{} Sequence {} not found", WARN, cmd.sequence);
            std::process::exit(1);
        }
        return Err(err.into());
    }

    if store.get(&key).await?.is_some() {
        println!(
            "{} Sequence {} marked for deletion; reconcile to release it",
            INFO,
            style(&cmd.sequence).bold()
        );
    } else {
        println!("{} Sequence {} deleted", CHECK, style(&cmd.sequence).bold());
    }
    Ok(())
}

async fn show_children(cmd: &ChildrenCommand, store: &dyn ObjectStore) -> Result<()> {
    let Some(sequence) = persistence::get::<Sequence>(store, &cmd.sequence).await? else {
        println!("{} Sequence {} not found", WARN, cmd.sequence);
        std::process::exit(1);
    };
    let uid = sequence
        .metadata
        .uid
        .context("Stored Sequence has no uid")?;
    let namespace = Some(cmd.sequence.namespace.as_str());

    let channels: Vec<Channel> = persistence::list::<Channel>(store, namespace)
        .await?
        .into_iter()
        .filter(|c| c.metadata.controller_ref().is_some_and(|o| o.uid == uid))
        .collect();
    let subscriptions: Vec<Subscription> = persistence::list::<Subscription>(store, namespace)
        .await?
        .into_iter()
        .filter(|s| s.metadata.controller_ref().is_some_and(|o| o.uid == uid))
        .collect();

    if channels.is_empty() && subscriptions.is_empty() {
        println!("{} {} has no children", INFO, style(&cmd.sequence).bold());
        return Ok(());
    }

    println!("{} Children of {}:", INFO, style(&cmd.sequence).bold());
    for channel in &channels {
        println!("{}", format_channel(channel));
    }
    for subscription in &subscriptions {
        println!("{}", format_subscription(subscription));
    }
    Ok(())
}

async fn set_address(cmd: &SetAddressCommand, store: &dyn ObjectStore) -> Result<()> {
    let mut channel = persistence::get::<Channel>(store, &cmd.channel)
        .await?
        .with_context(|| format!("Channel {} not found", cmd.channel))?;
    channel.status.address.hostname = cmd.hostname.clone();
    persistence::update(store, channel).await?;

    println!(
        "{} Channel {} address set to {}",
        CHECK,
        style(&cmd.channel).bold(),
        style(if cmd.hostname.is_empty() { "<none>" } else { cmd.hostname.as_str() }).cyan()
    );
    Ok(())
}
