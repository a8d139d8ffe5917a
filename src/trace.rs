//! Structured scan tracing.
//!
//! When debug is enabled the scan loop emits one structured event per
//! iteration on the `log` facade at trace level, serialized as JSON so
//! host log collectors can filter on fields rather than parse prose.

use log::{log_enabled, trace, Level};
use serde::Serialize;

/// What happened at one point of the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStep {
    /// A rule matched at the current offset.
    RuleMatch,
    /// A rule did not match.
    RuleFail,
    /// The first matcher of a rule needs more data; pass stopped.
    RulePending,
    /// The active rule set was switched.
    SetSwitch,
    /// The pass stopped on a break rule.
    Break,
    /// The loop honored a pause between iterations.
    Pause,
    /// The buffer transitioned to empty.
    EmptyBuffer,
    /// A scan pass started.
    PassStart,
    /// A scan pass ended with bytes retained for the next write.
    PassRetained,
}

/// One scan-loop trace event.
#[derive(Debug, Clone, Serialize)]
pub struct ScanTrace<'a> {
    /// Event kind.
    pub step: TraceStep,
    /// Index of the rule involved, when one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<usize>,
    /// Type tag of the rule involved, when it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<&'a str>,
    /// Scan offset at the time of the event.
    pub offset: usize,
    /// Buffered length at the time of the event.
    pub buffered: usize,
    /// Bytes consumed by a match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed: Option<usize>,
    /// Active rule-set name, when named.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<&'a str>,
}

impl<'a> ScanTrace<'a> {
    /// Minimal event with only positional fields set.
    pub fn at(step: TraceStep, offset: usize, buffered: usize) -> Self {
        Self {
            step,
            rule: None,
            tag: None,
            offset,
            buffered,
            consumed: None,
            rule_set: None,
        }
    }

    /// Attach the rule index.
    pub fn rule(mut self, index: usize) -> Self {
        self.rule = Some(index);
        self
    }

    /// Attach the rule tag.
    pub fn tag(mut self, tag: Option<&'a str>) -> Self {
        self.tag = tag;
        self
    }

    /// Attach the consumed length.
    pub fn consumed(mut self, consumed: usize) -> Self {
        self.consumed = Some(consumed);
        self
    }

    /// Attach the rule-set name.
    pub fn rule_set(mut self, name: Option<&'a str>) -> Self {
        self.rule_set = name;
        self
    }

    /// Emit this event at trace level if anyone is listening.
    pub fn emit(&self) {
        if !log_enabled!(Level::Trace) {
            return;
        }
        match serde_json::to_string(self) {
            Ok(json) => trace!("{json}"),
            Err(e) => trace!("trace serialization failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_sparse_fields() {
        let event = ScanTrace::at(TraceStep::RuleMatch, 4, 32)
            .rule(1)
            .tag(Some("field"))
            .consumed(7);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""step":"rule_match""#));
        assert!(json.contains(r#""rule":1"#));
        assert!(json.contains(r#""consumed":7"#));
        // unset optionals stay out of the payload
        assert!(!json.contains("rule_set"));
    }

    #[test]
    fn test_pass_events_minimal() {
        let event = ScanTrace::at(TraceStep::PassStart, 0, 0);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""step":"pass_start""#));
        assert!(!json.contains("consumed"));
    }
}
