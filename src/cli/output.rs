//! CLI output formatting

use crate::{
    core::{Channel, Condition, ConditionStatus, Sequence, Subscription},
    reconcile::{Convergence, ReconcileAction, ReconcileEvent},
};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a condition status for display
pub fn format_condition_status(status: ConditionStatus) -> String {
    match status {
        ConditionStatus::True => style("True").green().to_string(),
        ConditionStatus::False => style("False").red().to_string(),
        ConditionStatus::Unknown => style("Unknown").yellow().to_string(),
    }
}

/// One line per condition: type, status, and reason/message when set
pub fn format_condition(condition: &Condition) -> String {
    let mut line = format!(
        "{:<12} {}",
        style(condition.type_.as_str()).bold(),
        format_condition_status(condition.status)
    );
    if !condition.reason.is_empty() {
        line.push_str(&format!(" ({})", style(&condition.reason).cyan()));
    }
    if !condition.message.is_empty() {
        line.push_str(&format!(" {}", style(&condition.message).dim()));
    }
    if let Some(at) = condition.last_transition_time {
        line.push_str(&format!(" {}", style(at.to_rfc3339()).dim()));
    }
    line
}

/// Headline plus conditions of a Sequence
pub fn format_sequence(sequence: &Sequence) -> String {
    let icon = if sequence.status.is_ready() { CHECK } else { WARN };
    let mut out = format!(
        "{} {} ({} steps)",
        icon,
        style(sequence.metadata.key()).bold(),
        style(sequence.spec.steps.len()).cyan()
    );
    let hostname = &sequence.status.address.hostname;
    out.push_str(&format!(
        "\n  Address: {}",
        if hostname.is_empty() {
            style("<none>".to_string()).dim()
        } else {
            style(hostname.clone()).cyan()
        }
    ));
    if sequence.metadata.is_being_deleted() {
        out.push_str(&format!("\n  {}", style("Being deleted").yellow()));
    }
    if !sequence.metadata.finalizers.is_empty() {
        out.push_str(&format!(
            "\n  Finalizers: {}",
            style(sequence.metadata.finalizers.join(", ")).dim()
        ));
    }
    for condition in &sequence.status.conditions {
        out.push_str(&format!("\n  {}", format_condition(condition)));
    }
    out
}

/// Channel line for `children`
pub fn format_channel(channel: &Channel) -> String {
    let provisioner = channel
        .spec
        .provisioner
        .as_ref()
        .map(|p| p.name.as_str())
        .unwrap_or("-");
    let hostname = if channel.hostname().is_empty() {
        style("<no address>".to_string()).dim()
    } else {
        style(channel.hostname().to_string()).green()
    };
    format!(
        "  Channel      {} [{}] {}",
        style(&channel.metadata.name).bold(),
        style(provisioner).dim(),
        hostname
    )
}

/// Subscription line for `children`
pub fn format_subscription(subscription: &Subscription) -> String {
    let subscriber = subscription
        .spec
        .subscriber
        .as_ref()
        .and_then(|s| {
            s.dns_name
                .clone()
                .filter(|d| !d.is_empty())
                .or_else(|| s.ref_.as_ref().map(|r| format!("{}/{}", r.kind, r.name)))
        })
        .unwrap_or_else(|| "pass-through".to_string());
    let reply = subscription.reply_channel_name().unwrap_or("-");
    format!(
        "  Subscription {} {} → {} → {}",
        style(&subscription.metadata.name).bold(),
        style(&subscription.spec.channel.name).dim(),
        style(subscriber).cyan(),
        style(reply).dim()
    )
}

/// Format a reconcile event for display
pub fn format_reconcile_event(event: &ReconcileEvent) -> String {
    match event {
        ReconcileEvent::Started { key } => {
            format!("{} Reconciling {}", ROCKET, style(key).bold())
        }
        ReconcileEvent::ChildConverged {
            step,
            kind,
            name,
            outcome,
            ..
        } => {
            let outcome_str = match outcome {
                Convergence::Created => style(outcome.as_str()).green(),
                Convergence::Updated => style(outcome.as_str()).yellow(),
                Convergence::Unchanged => style(outcome.as_str()).dim(),
            };
            format!(
                "{} step {} {} {} {}",
                SPINNER,
                step,
                kind,
                style(name).cyan(),
                outcome_str
            )
        }
        ReconcileEvent::StepFailed { step, error, .. } => {
            format!("{} step {}: {}", CROSS, step, style(error).red())
        }
        ReconcileEvent::FinalizerReleased { key } => {
            format!("{} Released finalizer of {}", INFO, style(key).bold())
        }
        ReconcileEvent::StatusPublished { key, ready } => format!(
            "{} Status of {} published (Ready: {})",
            INFO,
            style(key).bold(),
            format_condition_status(*ready)
        ),
        ReconcileEvent::Finished { key, action } => {
            let action_str = match action {
                ReconcileAction::NotFound => style("not found".to_string()).dim(),
                ReconcileAction::Finalized => style("finalized".to_string()).yellow(),
                ReconcileAction::Provisioned { steps } => {
                    style(format!("provisioned {} steps", steps)).green()
                }
            };
            format!("{} {} {}", CHECK, style(key).bold(), action_str)
        }
        ReconcileEvent::Failed { key, error } => {
            format!("{} {}: {}", CROSS, style(key).red(), style(error).dim())
        }
    }
}
