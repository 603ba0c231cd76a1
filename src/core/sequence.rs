//! Sequence: the composite resource describing an ordered pipeline of steps

use crate::core::{
    channel::{Addressable, ReplyStrategy, SubscriberSpec},
    condition::{Condition, ConditionSet, ConditionType},
    meta::{ObjectMeta, ObjectReference},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

/// Has status True once every channel and subscription has been converged
pub const CONDITION_PROVISIONED: ConditionType = ConditionType::from_static("Provisioned");

/// Has status True once the Sequence exposes a non-empty hostname
pub const CONDITION_ADDRESSABLE: ConditionType = ConditionType::from_static("Addressable");

/// Derived from the two conditions above
pub const CONDITION_READY: ConditionType = ConditionType::READY;

static SEQUENCE_CONDITIONS: LazyLock<ConditionSet> =
    LazyLock::new(|| ConditionSet::living([CONDITION_PROVISIONED, CONDITION_ADDRESSABLE]));

/// Longest object name the store accepts
const MAX_NAME_LENGTH: usize = 253;

/// Name of the channel and subscription backing step `index`
pub fn step_resource_name(sequence_name: &str, index: usize) -> String {
    format!("{}-step-{}", sequence_name, index)
}

/// A pipeline of steps connected by channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub metadata: ObjectMeta,

    pub spec: SequenceSpec,

    #[serde(default)]
    pub status: SequenceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SequenceSpec {
    #[serde(default)]
    pub generation: i64,

    /// Provisioner for every step that does not name its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<ObjectReference>,

    /// Steps in the order events flow through them
    #[serde(default)]
    pub steps: Vec<StepSpec>,

    /// Where the output of the last step goes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyStrategy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(flatten)]
    pub subscriber: SubscriberSpec,

    /// Provisioner for this step's channel only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<ObjectReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SequenceStatus {
    /// Address of the first step's channel
    #[serde(default)]
    pub address: Addressable,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl SequenceStatus {
    /// Conditions a Sequence tracks
    pub fn condition_set() -> &'static ConditionSet {
        &SEQUENCE_CONDITIONS
    }

    pub fn get_condition(&self, type_: &ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == *type_)
    }

    pub fn is_ready(&self) -> bool {
        self.get_condition(&CONDITION_READY)
            .map_or(false, Condition::is_true)
    }

    /// Set every missing condition to Unknown
    pub fn initialize_conditions(&mut self) {
        Self::condition_set().manage(&mut self.conditions).initialize_conditions();
    }

    pub fn mark_provisioned(&mut self) {
        Self::condition_set()
            .manage(&mut self.conditions)
            .mark_true(CONDITION_PROVISIONED);
    }

    pub fn mark_not_provisioned(&mut self, reason: impl Into<String>, message: impl Into<String>) {
        Self::condition_set()
            .manage(&mut self.conditions)
            .mark_false(CONDITION_PROVISIONED, reason, message);
    }

    /// Expose `hostname` and update Addressable accordingly
    ///
    /// An empty hostname means "not yet addressable", not an error.
    pub fn set_address(&mut self, hostname: impl Into<String>) {
        self.address.hostname = hostname.into();
        let mut manager = Self::condition_set().manage(&mut self.conditions);
        if self.address.hostname.is_empty() {
            manager.mark_false(CONDITION_ADDRESSABLE, "emptyHostname", "hostname is the empty string");
        } else {
            manager.mark_true(CONDITION_ADDRESSABLE);
        }
    }
}

/// Validation failure for an object field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}: {}", .paths.join(", "))]
pub struct FieldError {
    pub message: String,
    pub paths: Vec<String>,
    pub details: Option<String>,
}

impl FieldError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            paths: vec![path.into()],
            details: None,
        }
    }

    fn merge(errors: Vec<FieldError>) -> Option<FieldError> {
        let mut iter = errors.into_iter();
        let mut merged = iter.next()?;
        for err in iter {
            merged.message = format!("{}; {}", merged.message, err.message);
            merged.paths.extend(err.paths);
        }
        Some(merged)
    }
}

impl Sequence {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: SequenceSpec) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: SequenceStatus::default(),
        }
    }

    /// Check the object before it is accepted by the store
    pub fn validate(&self) -> Result<(), FieldError> {
        let mut errors = Vec::new();

        if self.metadata.name.is_empty() {
            errors.push(FieldError::new("missing field", "metadata.name"));
        }
        if self.metadata.namespace.is_empty() {
            errors.push(FieldError::new("missing field", "metadata.namespace"));
        }

        let last = self.spec.steps.len().saturating_sub(1);
        if step_resource_name(&self.metadata.name, last).len() > MAX_NAME_LENGTH {
            errors.push(FieldError::new(
                format!("name too long: child names must fit in {} characters", MAX_NAME_LENGTH),
                "metadata.name",
            ));
        }

        for (i, step) in self.spec.steps.iter().enumerate() {
            if let Some(provisioner) = &step.provisioner {
                if provisioner.name.is_empty() {
                    errors.push(FieldError::new(
                        "missing field",
                        format!("spec.steps[{}].provisioner.name", i),
                    ));
                }
            }
        }

        if let Some(provisioner) = &self.spec.provisioner {
            if provisioner.name.is_empty() {
                errors.push(FieldError::new("missing field", "spec.provisioner.name"));
            }
        }

        if let Some(channel) = self.spec.reply.as_ref().and_then(|r| r.channel.as_ref()) {
            if !channel.is_empty() && channel.name.is_empty() {
                errors.push(FieldError::new("missing field", "spec.reply.channel.name"));
            }
        }

        match FieldError::merge(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Reject any change to `spec` of an existing Sequence
    pub fn check_immutable_fields(&self, original: &Sequence) -> Result<(), FieldError> {
        if self.spec == original.spec {
            return Ok(());
        }

        let old = serde_yaml::to_string(&original.spec).unwrap_or_default();
        let new = serde_yaml::to_string(&self.spec).unwrap_or_default();

        Err(FieldError {
            message: "Immutable fields changed (-old +new)".to_string(),
            paths: vec!["spec".to_string()],
            details: Some(line_diff(&old, &new)),
        })
    }
}

/// Ordered line diff: `-` for lines only in `old`, `+` for lines only in `new`
fn line_diff(old: &str, new: &str) -> String {
    let old: Vec<&str> = old.lines().collect();
    let new: Vec<&str> = new.lines().collect();

    // common[i][j]: longest common subsequence of old[i..] and new[j..]
    let mut common = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            common[i][j] = if old[i] == new[j] {
                common[i + 1][j + 1] + 1
            } else {
                common[i + 1][j].max(common[i][j + 1])
            };
        }
    }

    let mut diff = String::new();
    let (mut i, mut j) = (0, 0);
    while i < old.len() || j < new.len() {
        if i < old.len() && j < new.len() && old[i] == new[j] {
            i += 1;
            j += 1;
        } else if j == new.len() || (i < old.len() && common[i + 1][j] >= common[i][j + 1]) {
            diff.push_str(&format!("-{}\n", old[i]));
            i += 1;
        } else {
            diff.push_str(&format!("+{}\n", new[j]));
            j += 1;
        }
    }
    diff
}
