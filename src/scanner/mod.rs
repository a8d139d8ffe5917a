//! The incremental scan engine.
//!
//! A [`Scanner`] owns a growable byte buffer, an ordered list of rules and
//! a registry of saved rule sets. Each `write` appends a chunk (holding
//! back a split multi-byte sequence in text mode) and runs the scan loop:
//! rules are tested in order at the current offset; a match extracts a
//! token, fires the rule's handler and advances the offset; a miss moves
//! on to the next rule or takes the rule's fail-jump. Whatever the pass
//! cannot consume stays buffered for the next write.
//!
//! Handlers run synchronously inside the loop with full mutable access to
//! the engine. The loop re-reads the active rule list and engine state
//! after every handler call, so handlers may add or remove rules, switch
//! rule sets, pause, seek or write more data.

pub(crate) mod rule_set;
mod utf8;

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

use crate::config::{Encoding, ScannerConfig};
use crate::error::{ConfigurationError, Result, UsageError};
use crate::pattern::Pat;
use crate::rule::{
    empty_handler as wrap_empty, handler as wrap_handler, EmptyHandler, Handler, Rule, RuleBody,
    RuleFlags, RuleOutcome, Token,
};
use crate::trace::{ScanTrace, TraceStep};

use self::rule_set::{Registry, RuleList};
use self::utf8::Utf8Guard;

/// Offset callback fired on every rule match.
type MatchCallback = Rc<RefCell<dyn FnMut(usize)>>;

/// Streaming rule-based scan engine.
pub struct Scanner {
    encoding: Encoding,
    buffer: Vec<u8>,
    offset: usize,
    bytes_consumed: u64,
    token_count: u64,
    /// Rule index to resume from after a pause.
    cursor: Option<usize>,
    scanning: bool,
    paused: bool,
    ended: bool,
    need_drain: bool,
    debug: bool,
    /// Flags snapshotted into subsequently constructed rules.
    current: RuleFlags,
    /// Construction-time flag defaults, restored by [`Self::reset_flags`].
    initial_flags: RuleFlags,
    current_group: Option<usize>,
    group_seq: usize,
    active: RuleList,
    active_name: Option<String>,
    /// Bumped on every active-list replacement so the loop can tell a
    /// handler switched sets under it.
    set_epoch: u64,
    registry: Registry,
    utf8: Utf8Guard,
    default_handler: Option<Handler>,
    token_sink: Option<Handler>,
    match_cb: Option<MatchCallback>,
    empty_cb: Option<EmptyHandler>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    /// Engine with default configuration (UTF-8, trimming on).
    pub fn new() -> Self {
        Self::with_config(ScannerConfig::default())
    }

    /// Engine with the given configuration.
    pub fn with_config(config: ScannerConfig) -> Self {
        let current = RuleFlags {
            trim_left: config.trim_left,
            trim_right: config.trim_right,
            ..RuleFlags::default()
        };
        Self {
            encoding: config.encoding,
            buffer: Vec::with_capacity(config.buffer_capacity),
            offset: 0,
            bytes_consumed: 0,
            token_count: 0,
            cursor: None,
            scanning: false,
            paused: false,
            ended: false,
            need_drain: false,
            debug: config.debug,
            current: current.clone(),
            initial_flags: current,
            current_group: None,
            group_seq: 0,
            active: RuleList::new(),
            active_name: None,
            set_epoch: 0,
            registry: Registry::new(),
            utf8: Utf8Guard::new(),
            default_handler: None,
            token_sink: None,
            match_cb: None,
            empty_cb: None,
        }
    }

    // ---- global flags (applied to subsequently constructed rules) ----

    /// Suppress the first pattern's text from subsequent rules' tokens.
    pub fn trim_left(&mut self, on: bool) -> &mut Self {
        self.current.trim_left = on;
        self
    }

    /// Suppress the last pattern's text from subsequent rules' tokens.
    pub fn trim_right(&mut self, on: bool) -> &mut Self {
        self.current.trim_right = on;
        self
    }

    /// Set both trim flags at once.
    pub fn trim(&mut self, on: bool) -> &mut Self {
        self.current.trim_left = on;
        self.current.trim_right = on;
        self
    }

    /// Subsequent rules deliver empty token values (length still set).
    pub fn quiet(&mut self, on: bool) -> &mut Self {
        self.current.quiet = on;
        self
    }

    /// Subsequent rules skip handler delivery entirely.
    pub fn ignore(&mut self, on: bool) -> &mut Self {
        self.current.ignore = on;
        self
    }

    /// Enable backslash escaping of terminators in subsequent rules.
    pub fn escaped(&mut self, on: bool) -> &mut Self {
        self.current.escape = on.then_some(b'\\');
        self
    }

    /// Enable escaping with a custom escape byte.
    pub fn escaped_with(&mut self, escape: u8) -> &mut Self {
        self.current.escape = Some(escape);
        self
    }

    /// Relative jump (in group units) subsequent rules take on a match.
    pub fn continue_on(&mut self, match_jump: isize) -> &mut Self {
        self.current.continue_on_match = Some(match_jump);
        self
    }

    /// Relative jump subsequent rules take when they do not match.
    pub fn continue_on_fail(&mut self, fail_jump: isize) -> &mut Self {
        self.current.continue_on_fail = Some(fail_jump);
        self
    }

    /// Drop both jump settings: matches restart the pass, misses fall
    /// through to the next rule.
    pub fn continue_clear(&mut self) -> &mut Self {
        self.current.continue_on_match = None;
        self.current.continue_on_fail = None;
        self
    }

    /// Rule set subsequent rules switch to after a match.
    pub fn next(&mut self, rule_set: &str) -> &mut Self {
        self.current.next_set = Some(rule_set.to_string());
        self
    }

    /// Drop the rule-set switch setting.
    pub fn next_clear(&mut self) -> &mut Self {
        self.current.next_set = None;
        self
    }

    /// Subsequent rules end the scan pass after a match.
    pub fn break_on(&mut self, on: bool) -> &mut Self {
        self.current.break_on_match = on;
        self
    }

    /// Open a rule group: until [`Self::group_end`], added rules count as
    /// one unit for jump arithmetic.
    pub fn group_start(&mut self) -> &mut Self {
        self.group_seq += 1;
        self.current_group = Some(self.group_seq);
        self
    }

    /// Close the open rule group.
    pub fn group_end(&mut self) -> &mut Self {
        self.current_group = None;
        self
    }

    /// Restore the construction-time flag defaults.
    pub fn reset_flags(&mut self) -> &mut Self {
        self.current = self.initial_flags.clone();
        self.current_group = None;
        self
    }

    /// Current flag snapshot that the next rule would receive.
    pub fn current_flags(&self) -> &RuleFlags {
        &self.current
    }

    // ---- rule management ----

    /// Terminal engines reject every mutating call, not just writes.
    fn check_open(&self) -> Result<()> {
        if self.ended {
            warn!("call on an ended engine");
            return Err(UsageError::Ended.into());
        }
        Ok(())
    }

    fn build_chain(
        &self,
        pats: Vec<Pat>,
        tag: Option<String>,
        handler: Option<Handler>,
    ) -> Result<Rule> {
        self.check_open()?;
        Ok(Rule::chain(
            pats,
            self.current.clone(),
            tag,
            handler,
            self.current_group,
        )?)
    }

    /// Append a rule identified by a type tag.
    pub fn add_rule(&mut self, pats: Vec<Pat>, tag: &str) -> Result<()> {
        let rule = self.build_chain(pats, Some(tag.to_string()), None)?;
        self.active.rules.push(rule);
        Ok(())
    }

    /// Append a rule with its own handler.
    pub fn add_rule_with<F>(&mut self, pats: Vec<Pat>, f: F) -> Result<()>
    where
        F: FnMut(&mut Scanner, &Token) + 'static,
    {
        let rule = self.build_chain(pats, None, Some(wrap_handler(f)))?;
        self.active.rules.push(rule);
        Ok(())
    }

    /// Insert a rule at the head of the list.
    pub fn add_rule_first(&mut self, pats: Vec<Pat>, tag: &str) -> Result<()> {
        let rule = self.build_chain(pats, Some(tag.to_string()), None)?;
        self.active.rules.insert(0, rule);
        Ok(())
    }

    /// Insert a rule before the first rule tagged `anchor`.
    pub fn add_rule_before(&mut self, anchor: &str, pats: Vec<Pat>, tag: &str) -> Result<()> {
        let at = self
            .active
            .position_of_tag(anchor)
            .ok_or_else(|| ConfigurationError::UnknownAnchor(anchor.to_string()))?;
        let rule = self.build_chain(pats, Some(tag.to_string()), None)?;
        self.active.rules.insert(at, rule);
        Ok(())
    }

    /// Insert a rule after the first rule tagged `anchor`.
    pub fn add_rule_after(&mut self, anchor: &str, pats: Vec<Pat>, tag: &str) -> Result<()> {
        let at = self
            .active
            .position_of_tag(anchor)
            .ok_or_else(|| ConfigurationError::UnknownAnchor(anchor.to_string()))?;
        let rule = self.build_chain(pats, Some(tag.to_string()), None)?;
        self.active.rules.insert(at + 1, rule);
        Ok(())
    }

    /// Append a rule that consumes the rest of the buffer as one token.
    /// Under the quiet flag the content is not extracted at all.
    pub fn add_consume_all(&mut self, tag: &str) -> Result<()> {
        self.check_open()?;
        let body = if self.current.quiet {
            RuleBody::ConsumeAllNoToken
        } else {
            RuleBody::ConsumeAll
        };
        let rule = Rule::with_body(
            body,
            self.current.clone(),
            Some(tag.to_string()),
            None,
            self.current_group,
        )?;
        self.active.rules.push(rule);
        Ok(())
    }

    /// Append a consume-all rule with its own handler.
    pub fn add_consume_all_with<F>(&mut self, f: F) -> Result<()>
    where
        F: FnMut(&mut Scanner, &Token) + 'static,
    {
        self.check_open()?;
        let body = if self.current.quiet {
            RuleBody::ConsumeAllNoToken
        } else {
            RuleBody::ConsumeAll
        };
        let rule = Rule::with_body(
            body,
            self.current.clone(),
            None,
            Some(wrap_handler(f)),
            self.current_group,
        )?;
        self.active.rules.push(rule);
        Ok(())
    }

    /// Append a zero-length control-flow rule (set switch, break, jump
    /// anchor) that consumes nothing.
    pub fn add_marker_rule(&mut self, tag: &str) -> Result<()> {
        self.check_open()?;
        let rule = Rule::with_body(
            RuleBody::Noop,
            self.current.clone(),
            Some(tag.to_string()),
            None,
            self.current_group,
        )?;
        self.active.rules.push(rule);
        Ok(())
    }

    /// Remove the first rule tagged `id`.
    pub fn remove_rule(&mut self, id: &str) -> Result<()> {
        self.check_open()?;
        let at = self
            .active
            .position_of_tag(id)
            .ok_or_else(|| ConfigurationError::UnknownAnchor(id.to_string()))?;
        self.active.rules.remove(at);
        Ok(())
    }

    /// Remove the first rule owned by `handler` (rules added without a
    /// tag are identified by their handler).
    pub fn remove_rule_with(&mut self, handler: &Handler) -> Result<()> {
        self.check_open()?;
        let at = self
            .active
            .position_of_handler(handler)
            .ok_or_else(|| ConfigurationError::UnknownAnchor("<handler>".to_string()))?;
        self.active.rules.remove(at);
        Ok(())
    }

    /// Remove every rule and the empty-buffer handler of the active list.
    pub fn clear_rules(&mut self) {
        self.active = RuleList::new();
        self.set_epoch += 1;
        self.cursor = None;
    }

    /// Number of rules in the active list.
    pub fn rule_count(&self) -> usize {
        self.active.len()
    }

    // ---- rule sets ----

    /// Snapshot the active list (and its empty-buffer handler) under
    /// `name`. Later mutation of the active list leaves the snapshot
    /// untouched.
    pub fn save_rule_set(&mut self, name: &str) {
        self.registry.save(name, self.active.snapshot());
    }

    /// Replace the active list with a fresh copy of the saved set and
    /// reset the scan cursor.
    pub fn load_rule_set(&mut self, name: &str) -> Result<()> {
        self.check_open()?;
        let list = self.registry.load(name)?;
        debug!("rule set '{name}' loaded ({} rules)", list.len());
        self.active = list;
        self.active_name = Some(name.to_string());
        self.set_epoch += 1;
        self.cursor = None;
        Ok(())
    }

    /// Like [`Self::load_rule_set`], resuming the scan at `index`.
    pub fn load_rule_set_at(&mut self, name: &str, index: usize) -> Result<()> {
        self.check_open()?;
        let list = self.registry.load(name)?;
        if index > list.len() {
            return Err(ConfigurationError::CursorOutOfRange {
                name: name.to_string(),
                index,
                len: list.len(),
            }
            .into());
        }
        self.active = list;
        self.active_name = Some(name.to_string());
        self.set_epoch += 1;
        self.cursor = Some(index);
        Ok(())
    }

    /// Delete the saved set `name`.
    pub fn delete_rule_set(&mut self, name: &str) -> Result<()> {
        self.check_open()?;
        Ok(self.registry.delete(name)?)
    }

    /// Whether a set was saved under `name`.
    pub fn has_rule_set(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Names of all saved rule sets, unordered.
    pub fn rule_set_names(&self) -> Vec<String> {
        self.registry.names().map(str::to_string).collect()
    }

    /// Name of the active set, if it was loaded from the registry.
    pub fn active_set_name(&self) -> Option<&str> {
        self.active_name.as_deref()
    }

    // ---- event wiring ----

    /// Handler for tokens of rules that have none of their own.
    pub fn set_default_handler<F>(&mut self, f: F)
    where
        F: FnMut(&mut Scanner, &Token) + 'static,
    {
        self.default_handler = Some(wrap_handler(f));
    }

    /// Generic token sink, fired when neither the rule nor the engine has
    /// a handler.
    pub fn on_token<F>(&mut self, f: F)
    where
        F: FnMut(&mut Scanner, &Token) + 'static,
    {
        self.token_sink = Some(wrap_handler(f));
    }

    /// Offset callback fired on every rule match.
    pub fn on_match<F>(&mut self, f: F)
    where
        F: FnMut(usize) + 'static,
    {
        self.match_cb = Some(Rc::new(RefCell::new(f)));
    }

    /// Callback fired when the buffer transitions to empty. The flag
    /// tells whether `end()` drove the drain.
    pub fn on_empty<F>(&mut self, f: F)
    where
        F: FnMut(&mut Scanner, bool) + 'static,
    {
        self.empty_cb = Some(wrap_empty(f));
    }

    /// Empty-buffer handler associated with the active rule list; saved
    /// and loaded together with it.
    pub fn set_empty_handler<F>(&mut self, f: F)
    where
        F: FnMut(&mut Scanner, bool) + 'static,
    {
        self.active.empty_handler = Some(wrap_empty(f));
    }

    // ---- stream operations ----

    /// Append a chunk and run the scan loop. Returns `false` when the
    /// engine is paused and the caller should wait for drain.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> Result<bool> {
        if self.ended {
            warn!("write after end");
            return Err(UsageError::WriteAfterEnd.into());
        }
        self.append(data.as_ref());
        if self.scanning {
            // handler-driven write: the running loop picks the bytes up
            return Ok(true);
        }
        if self.paused {
            self.need_drain = true;
            return Ok(false);
        }
        self.scan(false)
    }

    /// Final write: flush held-back bytes, run a last pass, then drop the
    /// buffer and all rule lists. The engine becomes terminal.
    pub fn end(&mut self) -> Result<()> {
        self.finish(None)
    }

    /// [`Self::end`] with a final chunk.
    pub fn end_with(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        self.finish(Some(data.as_ref()))
    }

    fn finish(&mut self, data: Option<&[u8]>) -> Result<()> {
        if self.ended {
            warn!("end after end");
            return Err(UsageError::WriteAfterEnd.into());
        }
        if let Some(data) = data {
            self.append(data);
        }
        // a held partial sequence can no longer be completed
        self.utf8.flush(&mut self.buffer);
        if !self.paused && !self.scanning {
            self.scan(true)?;
        }
        if !self.buffer.is_empty() {
            // an unmatched tail has no further chance to complete
            warn!(
                "end of stream discards {} unmatched bytes",
                self.buffer.len() - self.offset
            );
            self.buffer.clear();
            self.offset = 0;
            self.fire_empty(true);
        }
        self.ended = true;
        self.buffer.clear();
        self.offset = 0;
        self.cursor = None;
        self.active = RuleList::new();
        self.registry.clear();
        Ok(())
    }

    /// Terminal teardown without a final pass.
    pub fn destroy(&mut self) {
        self.ended = true;
        self.buffer.clear();
        self.offset = 0;
        self.cursor = None;
        self.active = RuleList::new();
        self.registry.clear();
        self.utf8.reset();
    }

    /// Stop consuming between rule-match iterations. The in-flight rule
    /// test always completes first. A no-op on a terminal engine.
    pub fn pause(&mut self) {
        if self.ended {
            return;
        }
        self.paused = true;
    }

    /// Resume the scan loop from the persisted cursor.
    pub fn resume(&mut self) -> Result<bool> {
        self.check_open()?;
        self.paused = false;
        self.need_drain = false;
        if self.scanning {
            return Ok(true);
        }
        self.scan(false)
    }

    /// Move the scan offset by `delta` within the buffered window.
    pub fn seek(&mut self, delta: i64) -> Result<()> {
        self.check_open()?;
        let target = self.offset as i64 + delta;
        if target < 0 || target > self.buffer.len() as i64 {
            warn!("seek to {target} outside buffered window");
            return Err(UsageError::SeekOutOfBounds {
                target,
                len: self.buffer.len(),
            }
            .into());
        }
        self.offset = target as usize;
        Ok(())
    }

    /// Run a pass, then discard and return the unconsumed tail, firing
    /// the empty notification.
    pub fn flush(&mut self) -> Result<Vec<u8>> {
        if self.scanning {
            // handler context: discard under the running loop's feet;
            // it re-reads the buffer next iteration
            let tail = self.buffer.split_off(self.offset);
            self.buffer.clear();
            self.offset = 0;
            self.utf8.reset();
            return Ok(tail);
        }
        if !self.ended && !self.paused {
            self.scan(false)?;
        }
        // a paused pass leaves its consumed prefix in the buffer; only
        // the bytes past the offset are unconsumed
        let had_bytes = !self.buffer.is_empty();
        let tail = self.buffer.split_off(self.offset);
        self.buffer.clear();
        self.offset = 0;
        self.cursor = None;
        self.utf8.reset();
        if had_bytes {
            self.fire_empty(false);
        }
        Ok(tail)
    }

    /// Switch chunk handling between text and raw modes. Leaving text
    /// mode releases any held-back partial sequence into the buffer.
    pub fn set_encoding(&mut self, name: &str) -> Result<()> {
        let encoding: Encoding = name.parse().map_err(crate::error::Error::from)?;
        if encoding == Encoding::Binary {
            self.utf8.flush(&mut self.buffer);
        }
        self.encoding = encoding;
        Ok(())
    }

    /// Discard the buffer and scan state. Unless `keep_rules`, also drop
    /// the active list, every saved set and reset the current flags.
    pub fn clear(&mut self, keep_rules: bool) {
        self.buffer.clear();
        self.offset = 0;
        self.cursor = None;
        self.utf8.reset();
        self.paused = false;
        self.need_drain = false;
        if !keep_rules {
            self.active = RuleList::new();
            self.active_name = None;
            self.set_epoch += 1;
            self.registry.clear();
            self.current = RuleFlags::default();
            self.current_group = None;
        }
    }

    /// Toggle structured per-iteration trace events.
    pub fn debug(&mut self, on: bool) {
        self.debug = on;
    }

    // ---- read-only state ----

    /// Current scan offset within the buffered window.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes currently buffered (held-back partial sequences excluded).
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of an incomplete multi-byte sequence held back from the
    /// buffer, waiting for the next write.
    pub fn held_back(&self) -> usize {
        self.utf8.held().len()
    }

    /// Total bytes consumed by matches over the engine's lifetime.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Tokens delivered over the engine's lifetime.
    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    /// Whether the engine is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the stream ended (terminal).
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Whether a blocked write is waiting for a resume.
    pub fn needs_drain(&self) -> bool {
        self.need_drain
    }

    // ---- scan loop ----

    fn append(&mut self, data: &[u8]) {
        match self.encoding {
            Encoding::Utf8 => self.utf8.push(data, &mut self.buffer),
            Encoding::Binary => self.buffer.extend_from_slice(data),
        }
    }

    fn scan(&mut self, ending: bool) -> Result<bool> {
        if self.scanning {
            return Ok(true);
        }
        self.scanning = true;
        let result = self.scan_inner(ending);
        self.scanning = false;
        if result.is_err() {
            // malformed configuration discovered mid-scan is fatal
            self.ended = true;
        }
        result
    }

    fn scan_inner(&mut self, ending: bool) -> Result<bool> {
        let mut i = self.cursor.take().unwrap_or(0);
        self.trace(ScanTrace::at(TraceStep::PassStart, self.offset, self.buffer.len()));

        loop {
            // inner pass; breaking out of it runs buffer housekeeping
            loop {
                if self.paused {
                    self.cursor = Some(i);
                    self.need_drain = true;
                    self.trace(ScanTrace::at(TraceStep::Pause, self.offset, self.buffer.len()).rule(i));
                    return Ok(false);
                }
                if self.offset >= self.buffer.len() || i >= self.active.rules.len() {
                    break;
                }

                let outcome = {
                    let offset = self.offset;
                    let Scanner { active, buffer, .. } = self;
                    active.rules[i].test(buffer, offset)
                };

                match outcome {
                    RuleOutcome::Pending => {
                        self.trace(
                            ScanTrace::at(TraceStep::RulePending, self.offset, self.buffer.len())
                                .rule(i),
                        );
                        break;
                    }
                    RuleOutcome::NoMatch => {
                        if self.debug {
                            ScanTrace::at(TraceStep::RuleFail, self.offset, self.buffer.len())
                                .rule(i)
                                .emit();
                        }
                        match self.active.rules[i].flags.continue_on_fail {
                            None => i += 1,
                            Some(jump) => i = self.jump_from(i, jump)?,
                        }
                    }
                    RuleOutcome::Match(m) => {
                        let rule = &self.active.rules[i];
                        let flags = rule.flags.clone();
                        let tag = rule.tag.clone();
                        let rule_handler = rule.handler.clone();
                        self.trace(
                            ScanTrace::at(TraceStep::RuleMatch, self.offset, self.buffer.len())
                                .rule(i)
                                .tag(tag.as_deref())
                                .consumed(m.consumed),
                        );

                        self.offset += m.consumed;
                        self.bytes_consumed += m.consumed as u64;

                        if let Some(cb) = self.match_cb.clone() {
                            (&mut *cb.borrow_mut())(self.offset);
                        }

                        let epoch = self.set_epoch;
                        if !flags.ignore {
                            self.token_count += 1;
                            let token = Token {
                                value: m.value,
                                length: m.length,
                                index: m.index,
                                tag,
                            };
                            self.deliver(rule_handler, &token);
                        }

                        let next = if let Some(name) = &flags.next_set {
                            self.switch_set(name)?;
                            0
                        } else if self.set_epoch != epoch {
                            // a handler replaced the active list: the old
                            // index is meaningless, honor the new cursor
                            self.cursor.take().unwrap_or(0)
                        } else {
                            match flags.continue_on_match {
                                Some(jump) => self.jump_from(i, jump)?,
                                None if m.consumed == 0 => i + 1,
                                None => 0,
                            }
                        };

                        if flags.break_on_match {
                            self.trace(
                                ScanTrace::at(TraceStep::Break, self.offset, self.buffer.len())
                                    .rule(i),
                            );
                            break;
                        }
                        if self.paused {
                            self.cursor = Some(next);
                            self.need_drain = true;
                            self.trace(
                                ScanTrace::at(TraceStep::Pause, self.offset, self.buffer.len())
                                    .rule(next),
                            );
                            return Ok(false);
                        }
                        i = next;
                    }
                }
            }

            // pass housekeeping
            if self.offset >= self.buffer.len() {
                let transitioned = !self.buffer.is_empty();
                self.buffer.clear();
                self.offset = 0;
                self.cursor = None;
                if transitioned {
                    self.trace(ScanTrace::at(TraceStep::EmptyBuffer, 0, 0));
                    self.fire_empty(ending);
                    // empty handlers may have produced fresh input
                    if !self.buffer.is_empty() && !self.paused && !self.ended {
                        i = 0;
                        continue;
                    }
                }
            } else {
                self.buffer.drain(..self.offset);
                self.offset = 0;
                self.cursor = None;
                self.trace(ScanTrace::at(TraceStep::PassRetained, 0, self.buffer.len()));
            }
            return Ok(true);
        }
    }

    /// Resolve a relative jump from rule `from`, counting group units: a
    /// contiguous run of rules sharing a group id moves as one.
    fn jump_from(&self, from: usize, jump: isize) -> Result<usize> {
        let rules = &self.active.rules;
        let mut units: Vec<usize> = Vec::new();
        let mut idx = 0;
        while idx < rules.len() {
            units.push(idx);
            match rules[idx].group {
                Some(g) => {
                    idx += 1;
                    while idx < rules.len() && rules[idx].group == Some(g) {
                        idx += 1;
                    }
                }
                None => idx += 1,
            }
        }

        let unit = units
            .iter()
            .rposition(|&start| start <= from)
            .unwrap_or(0);
        let target = unit as isize + 1 + jump;
        if target == units.len() as isize {
            // landing just past the list ends the pass
            return Ok(rules.len());
        }
        if target < 0 || target > units.len() as isize {
            return Err(ConfigurationError::JumpOutOfBounds {
                from,
                jump,
                len: rules.len(),
            }
            .into());
        }
        Ok(units[target as usize])
    }

    fn switch_set(&mut self, name: &str) -> Result<()> {
        self.trace(
            ScanTrace::at(TraceStep::SetSwitch, self.offset, self.buffer.len())
                .rule_set(Some(name)),
        );
        self.load_rule_set(name)?;
        self.cursor = None;
        Ok(())
    }

    fn deliver(&mut self, rule_handler: Option<Handler>, token: &Token) {
        let handler = rule_handler
            .or_else(|| self.default_handler.clone())
            .or_else(|| self.token_sink.clone());
        if let Some(h) = handler {
            (&mut *h.borrow_mut())(self, token);
        }
    }

    fn fire_empty(&mut self, ending: bool) {
        if let Some(cb) = self.empty_cb.clone() {
            (&mut *cb.borrow_mut())(self, ending);
        }
        if let Some(h) = self.active.empty_handler.clone() {
            (&mut *h.borrow_mut())(self, ending);
        }
    }

    fn trace(&self, event: ScanTrace<'_>) {
        if self.debug {
            event.emit();
        }
    }
}
