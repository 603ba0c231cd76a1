//! Status condition model
//!
//! A resource's status carries a list of named tri-state conditions. One of
//! them, the "happy" condition (`Ready`), is never set directly: it is derived
//! from the others every time the list changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Tri-state value of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Name of a condition
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionType(Cow<'static, str>);

impl ConditionType {
    /// The synthesized aggregate condition
    pub const READY: ConditionType = ConditionType::from_static("Ready");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single observed fact about a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition name
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Current value
    pub status: ConditionStatus,

    /// Machine-readable reason for the last status
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human-readable detail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// When `status` last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(type_: ConditionType, status: ConditionStatus) -> Self {
        Self {
            type_,
            status,
            reason: String::new(),
            message: String::new(),
            last_transition_time: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>, message: impl Into<String>) -> Self {
        self.reason = reason.into();
        self.message = message.into();
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }
}

/// Declaration of the conditions a resource kind tracks
///
/// Each resource kind builds its own set; the set is immutable once built and
/// is handed to a [`ConditionManager`] together with the condition list it
/// should operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSet {
    happy: ConditionType,
    dependents: Vec<ConditionType>,
}

impl ConditionSet {
    /// A set whose happy condition is `Ready`, derived from `dependents`
    pub fn living<I>(dependents: I) -> Self
    where
        I: IntoIterator<Item = ConditionType>,
    {
        let dependents = dependents
            .into_iter()
            .filter(|t| *t != ConditionType::READY)
            .collect();
        Self {
            happy: ConditionType::READY,
            dependents,
        }
    }

    /// Bind this set to a condition list
    pub fn manage<'a>(&'a self, conditions: &'a mut Vec<Condition>) -> ConditionManager<'a> {
        ConditionManager {
            set: self,
            conditions,
        }
    }
}

/// Mutation and query operations over one condition list
pub struct ConditionManager<'a> {
    set: &'a ConditionSet,
    conditions: &'a mut Vec<Condition>,
}

impl<'a> ConditionManager<'a> {
    /// Add every declared condition that is not yet present as Unknown
    ///
    /// Existing entries keep their values. The happy condition is re-derived
    /// afterwards so a stale stored value can never survive.
    pub fn initialize_conditions(&mut self) {
        let now = Utc::now();
        let set = self.set;
        for type_ in set.dependents.iter().chain(std::iter::once(&set.happy)) {
            if self.find(type_).is_none() {
                let mut condition = Condition::new(type_.clone(), ConditionStatus::Unknown);
                condition.last_transition_time = Some(now);
                self.conditions.push(condition);
            }
        }
        self.recompute_happy();
    }

    pub fn get_condition(&self, type_: &ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == *type_)
    }

    pub fn mark_true(&mut self, type_: ConditionType) {
        self.set_condition(Condition::new(type_, ConditionStatus::True));
    }

    pub fn mark_false(
        &mut self,
        type_: ConditionType,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.set_condition(Condition::new(type_, ConditionStatus::False).with_reason(reason, message));
    }

    pub fn mark_unknown(
        &mut self,
        type_: ConditionType,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.set_condition(Condition::new(type_, ConditionStatus::Unknown).with_reason(reason, message));
    }

    /// True iff every non-happy condition (declared or present) is True
    pub fn is_happy(&self) -> bool {
        self.derive_happy().0 == ConditionStatus::True
    }

    /// Upsert a dependent condition and re-derive the happy condition
    ///
    /// Setting the happy condition directly is ignored; it only ever follows
    /// its dependents.
    pub fn set_condition(&mut self, condition: Condition) {
        if condition.type_ == self.set.happy {
            self.recompute_happy();
            return;
        }
        self.upsert(condition);
        self.recompute_happy();
    }

    fn find(&self, type_: &ConditionType) -> Option<usize> {
        self.conditions.iter().position(|c| c.type_ == *type_)
    }

    fn upsert(&mut self, mut condition: Condition) {
        match self.find(&condition.type_) {
            Some(idx) => {
                let existing = &mut self.conditions[idx];
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                } else {
                    condition.last_transition_time = Some(Utc::now());
                }
                *existing = condition;
            }
            None => {
                condition.last_transition_time = Some(Utc::now());
                self.conditions.push(condition);
            }
        }
    }

    /// Derive the happy status with the reason and message to report
    fn derive_happy(&self) -> (ConditionStatus, String, String) {
        let mut first_unknown: Option<(String, String)> = None;

        let declared = self.set.dependents.iter().map(|t| (t, self.get_condition(t)));
        let extra = self
            .conditions
            .iter()
            .filter(|c| c.type_ != self.set.happy && !self.set.dependents.contains(&c.type_))
            .map(|c| (&c.type_, Some(c)));

        for (_, condition) in declared.chain(extra) {
            match condition {
                Some(c) if c.is_true() => {}
                Some(c) if c.is_false() => {
                    return (ConditionStatus::False, c.reason.clone(), c.message.clone());
                }
                Some(c) => {
                    if first_unknown.is_none() {
                        first_unknown = Some((c.reason.clone(), c.message.clone()));
                    }
                }
                None => {
                    if first_unknown.is_none() {
                        first_unknown = Some((String::new(), String::new()));
                    }
                }
            }
        }

        match first_unknown {
            Some((reason, message)) => (ConditionStatus::Unknown, reason, message),
            None => (ConditionStatus::True, String::new(), String::new()),
        }
    }

    fn recompute_happy(&mut self) {
        let (status, reason, message) = self.derive_happy();
        let happy = Condition::new(self.set.happy.clone(), status).with_reason(reason, message);
        self.upsert(happy);
    }
}
