//! Named rule-set snapshots.
//!
//! The active rule list can be saved under a name and reloaded later,
//! typically from inside a handler to switch sub-grammars (header vs body,
//! quoted vs bare fields). Saves are deep snapshots: mutating the active
//! list never changes a saved set, and loading hands out a fresh copy.
//! Handler closures are shared between snapshots by reference; only the
//! list structure is independent.

use std::collections::HashMap;

use crate::error::ConfigurationError;
use crate::rule::{EmptyHandler, Handler, Rule};

/// An ordered rule list plus its associated empty-buffer handler.
#[derive(Clone, Default)]
pub(crate) struct RuleList {
    pub(crate) rules: Vec<Rule>,
    pub(crate) empty_handler: Option<EmptyHandler>,
}

impl RuleList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Index of the first rule carrying `tag`. Duplicate tags resolve to
    /// the first match.
    pub(crate) fn position_of_tag(&self, tag: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.matches_id(tag))
    }

    /// Index of the first rule owned by `handler`.
    pub(crate) fn position_of_handler(&self, handler: &Handler) -> Option<usize> {
        self.rules.iter().position(|r| r.matches_handler(handler))
    }

    /// Independent deep copy of the list structure.
    pub(crate) fn snapshot(&self) -> Self {
        self.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }
}

/// Registry of saved rule sets, keyed by name.
#[derive(Default)]
pub(crate) struct Registry {
    sets: HashMap<String, RuleList>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot under `name`, replacing any previous one.
    pub(crate) fn save(&mut self, name: &str, list: RuleList) {
        self.sets.insert(name.to_string(), list);
    }

    /// Fresh copy of the set saved under `name`.
    pub(crate) fn load(&self, name: &str) -> Result<RuleList, ConfigurationError> {
        self.sets
            .get(name)
            .map(RuleList::snapshot)
            .ok_or_else(|| ConfigurationError::UnknownRuleSet(name.to_string()))
    }

    /// Remove the set saved under `name`.
    pub(crate) fn delete(&mut self, name: &str) -> Result<(), ConfigurationError> {
        self.sets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ConfigurationError::UnknownRuleSet(name.to_string()))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Drop every saved set.
    pub(crate) fn clear(&mut self) {
        self.sets.clear();
    }

    /// Names of all saved sets, unordered.
    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }
}
