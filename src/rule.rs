//! Rules: ordered matcher chains with trim/escape/jump policy.
//!
//! A rule tests the buffer at the scan offset by running its matchers in
//! order, each narrowing the working window by what the previous one
//! consumed. The emitted token is the matched span minus the trimmed
//! first/last pattern text, unless one of the matchers produces the token
//! itself (numeric lengths, a trailing first-of), in which case trimming
//! does not apply and any remaining matchers validate against the token
//! bytes rather than the buffer.
//!
//! Flags are snapshotted into the rule at construction. Mutating the
//! engine's current flags afterwards never affects existing rules.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::ConfigurationError;
use crate::pattern::{MatchOutcome, Matcher, Pat};
use crate::scanner::Scanner;

/// Token delivered to handlers on a successful rule match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Token content. Empty when the rule is quiet.
    pub value: Vec<u8>,
    /// Content length before any quiet suppression.
    pub length: usize,
    /// Alternation/candidate index of the match (0 when not applicable).
    pub index: usize,
    /// Type tag of the matching rule, if it has one.
    pub tag: Option<String>,
}

impl Token {
    /// Token content as UTF-8 text, if valid.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Per-rule token handler. Runs synchronously inside the scan loop with
/// full mutable access to the engine: handlers may add or remove rules,
/// switch rule sets, pause or seek.
pub type Handler = Rc<RefCell<dyn FnMut(&mut Scanner, &Token)>>;

/// Handler fired when the buffer transitions to empty. The flag tells
/// whether `end()` drove the drain.
pub type EmptyHandler = Rc<RefCell<dyn FnMut(&mut Scanner, bool)>>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: FnMut(&mut Scanner, &Token) + 'static,
{
    Rc::new(RefCell::new(f))
}

/// Wrap a closure as an [`EmptyHandler`].
pub fn empty_handler<F>(f: F) -> EmptyHandler
where
    F: FnMut(&mut Scanner, bool) + 'static,
{
    Rc::new(RefCell::new(f))
}

/// Policy snapshot applied to a rule at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleFlags {
    /// Suppress the first pattern's text from the token.
    pub trim_left: bool,
    /// Suppress the last pattern's text from the token. Forced off for
    /// single-pattern rules.
    pub trim_right: bool,
    /// Deliver an empty token value (length still reported).
    pub quiet: bool,
    /// Skip handler delivery entirely; the match still advances the scan.
    pub ignore: bool,
    /// Escape byte: terminator literals skip occurrences preceded by an
    /// odd run of this byte.
    pub escape: Option<u8>,
    /// Relative jump (in group units) applied after a match. `None`
    /// restarts the pass from rule 0, except for zero-length matches.
    pub continue_on_match: Option<isize>,
    /// Relative jump applied when the rule does not match. `None` falls
    /// through to the next rule.
    pub continue_on_fail: Option<isize>,
    /// Rule set to switch to after a match; always resets the cursor.
    pub next_set: Option<String>,
    /// End the scan pass after a match.
    pub break_on_match: bool,
}

impl Default for RuleFlags {
    fn default() -> Self {
        Self {
            trim_left: true,
            trim_right: true,
            quiet: false,
            ignore: false,
            escape: None,
            continue_on_match: None,
            continue_on_fail: None,
            next_set: None,
            break_on_match: false,
        }
    }
}

/// What a rule does when tested. Specialized bodies avoid chain overhead
/// for the degenerate shapes; debug tracing lives in the scan loop, not in
/// swapped-out method variants.
#[derive(Clone)]
pub(crate) enum RuleBody {
    /// Zero-length match, control flow only.
    Noop,
    /// The rest of the buffer becomes the token.
    ConsumeAll,
    /// Advance to the end of the buffer without extracting content.
    ConsumeAllNoToken,
    /// Ordered matcher chain.
    Chain(Vec<Matcher>),
}

impl RuleBody {
    fn kind_name(&self) -> &'static str {
        match self {
            RuleBody::Noop => "noop",
            RuleBody::ConsumeAll => "consume-all",
            RuleBody::ConsumeAllNoToken => "consume-all-no-token",
            RuleBody::Chain(_) => "chain",
        }
    }
}

/// Result of testing a rule at the scan offset.
#[derive(Clone, Debug)]
pub(crate) enum RuleOutcome {
    /// Matched: consumed length plus the extracted token.
    Match(RuleMatch),
    /// Does not match here; the scan moves on.
    NoMatch,
    /// The first matcher needs more data; the pass stops.
    Pending,
}

/// Successful match payload.
#[derive(Clone, Debug)]
pub(crate) struct RuleMatch {
    pub consumed: usize,
    pub value: Vec<u8>,
    pub length: usize,
    pub index: usize,
}

/// A tokenizing rule: matcher chain plus policy, identified by a type tag
/// or its handler.
#[derive(Clone)]
pub struct Rule {
    pub(crate) body: RuleBody,
    pub(crate) flags: RuleFlags,
    pub(crate) tag: Option<String>,
    pub(crate) handler: Option<Handler>,
    pub(crate) group: Option<usize>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("body", &self.body.kind_name())
            .field("tag", &self.tag)
            .field("has_handler", &self.handler.is_some())
            .field("group", &self.group)
            .finish()
    }
}

impl Rule {
    /// Build a chained rule from pattern specs.
    pub(crate) fn chain(
        pats: Vec<Pat>,
        mut flags: RuleFlags,
        tag: Option<String>,
        handler: Option<Handler>,
        group: Option<usize>,
    ) -> Result<Self, ConfigurationError> {
        if pats.is_empty() {
            return Err(ConfigurationError::EmptyChain);
        }

        let escape = flags.escape;
        let count = pats.len();
        let mut matchers = Vec::with_capacity(count);
        for (idx, pat) in pats.into_iter().enumerate() {
            matchers.push(Matcher::compile(pat, idx == 0, escape)?);
        }

        if count == 1 {
            flags.trim_right = false;
        }

        let rule = Self {
            body: RuleBody::Chain(matchers),
            flags,
            tag,
            handler,
            group,
        };
        rule.check_progress()?;
        Ok(rule)
    }

    /// Build a rule with a non-chain body.
    pub(crate) fn with_body(
        body: RuleBody,
        flags: RuleFlags,
        tag: Option<String>,
        handler: Option<Handler>,
        group: Option<usize>,
    ) -> Result<Self, ConfigurationError> {
        let rule = Self {
            body,
            flags,
            tag,
            handler,
            group,
        };
        rule.check_progress()?;
        Ok(rule)
    }

    /// Reject configurations that can never make progress: a failed test
    /// consumes nothing, so a self-pointing fail-jump always loops; a
    /// self-pointing match-jump loops when the rule cannot consume bytes
    /// and does not switch rule sets.
    fn check_progress(&self) -> Result<(), ConfigurationError> {
        if self.flags.continue_on_fail == Some(-1) {
            return Err(ConfigurationError::ZeroProgress);
        }
        if self.flags.continue_on_match == Some(-1)
            && self.flags.next_set.is_none()
            && self.max_len_is_zero()
        {
            return Err(ConfigurationError::ZeroProgress);
        }
        Ok(())
    }

    /// True when no match of this rule can ever consume a byte.
    fn max_len_is_zero(&self) -> bool {
        match &self.body {
            RuleBody::Noop => true,
            RuleBody::ConsumeAll | RuleBody::ConsumeAllNoToken => false,
            RuleBody::Chain(ms) => !ms.iter().any(Matcher::can_consume),
        }
    }

    /// Type tag of this rule, if it carries one.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Whether `id` identifies this rule (tag match, first wins upstream).
    pub(crate) fn matches_id(&self, id: &str) -> bool {
        self.tag.as_deref() == Some(id)
    }

    /// Whether this rule's handler is the given one.
    pub(crate) fn matches_handler(&self, h: &Handler) -> bool {
        self.handler
            .as_ref()
            .is_some_and(|own| Rc::ptr_eq(own, h))
    }

    /// Test this rule against the buffer at `offset`.
    pub(crate) fn test(&mut self, buf: &[u8], offset: usize) -> RuleOutcome {
        let win = &buf[offset..];

        match &mut self.body {
            RuleBody::Noop => RuleOutcome::Match(RuleMatch {
                consumed: 0,
                value: Vec::new(),
                length: 0,
                index: 0,
            }),
            RuleBody::ConsumeAll => {
                let value = if self.flags.quiet {
                    Vec::new()
                } else {
                    win.to_vec()
                };
                RuleOutcome::Match(RuleMatch {
                    consumed: win.len(),
                    value,
                    length: win.len(),
                    index: 0,
                })
            }
            RuleBody::ConsumeAllNoToken => RuleOutcome::Match(RuleMatch {
                consumed: win.len(),
                value: Vec::new(),
                length: 0,
                index: 0,
            }),
            RuleBody::Chain(matchers) => {
                Self::test_chain(matchers, &self.flags, win)
            }
        }
    }

    fn test_chain(matchers: &mut [Matcher], flags: &RuleFlags, win: &[u8]) -> RuleOutcome {
        let count = matchers.len();
        let mut consumed = 0usize;
        let mut index = 0usize;
        // set once a matcher produces the token itself: (start, len) in win
        let mut own_token: Option<(usize, usize)> = None;
        let mut token_progress = 0usize;

        for (pos, m) in matchers.iter_mut().enumerate() {
            let is_first = pos == 0;
            let is_last = pos + 1 == count;

            if let Some((tstart, tlen)) = own_token {
                // token fixed: remaining matchers validate inside it
                let twin = &win[tstart + token_progress..tstart + tlen];
                match m.exec(twin) {
                    MatchOutcome::Match(n) => token_progress += n,
                    MatchOutcome::NoMatch | MatchOutcome::Pending => {
                        return RuleOutcome::NoMatch
                    }
                }
                if let Some(ix) = m.last_index() {
                    index = ix;
                }
                continue;
            }

            match m.exec(&win[consumed..]) {
                MatchOutcome::Match(n) => {
                    if m.produces_token(is_last) {
                        own_token = Some((consumed, m.token_len(n)));
                    }
                    consumed += n;
                    if let Some(ix) = m.last_index() {
                        index = ix;
                    }
                }
                MatchOutcome::NoMatch => return RuleOutcome::NoMatch,
                MatchOutcome::Pending => {
                    debug_assert!(is_first);
                    return RuleOutcome::Pending;
                }
            }
        }

        let (start, length) = match own_token {
            Some(span) => span,
            None => {
                let trim_left = if flags.trim_left {
                    matchers[0].last_size()
                } else {
                    0
                };
                let trim_right = if flags.trim_right && count > 1 {
                    matchers[count - 1].last_size()
                } else {
                    0
                };
                let end = consumed.saturating_sub(trim_right);
                let start = trim_left.min(end);
                (start, end - start)
            }
        };

        let value = if flags.quiet {
            Vec::new()
        } else {
            win[start..start + length].to_vec()
        };

        RuleOutcome::Match(RuleMatch {
            consumed,
            value,
            length,
            index,
        })
    }
}
