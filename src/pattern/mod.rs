//! Pattern matchers: the smallest matching units a rule is chained from.
//!
//! A matcher tests the working window and reports how many bytes it
//! consumed, that it cannot match, or — for the first matcher of a rule
//! only — that there is not enough data yet to decide ([`MatchOutcome::Pending`]).
//!
//! Matchers are position-aware. The first matcher of a rule is anchored at
//! the scan offset; later matchers act as terminators and sweep forward for
//! their next occurrence, so their consumed length covers the skipped bytes
//! plus the pattern text itself. The pattern-text length is recorded
//! separately (`last_size`) because trimming removes only the pattern text,
//! never the bytes it swept over.

pub(crate) mod scan;

use std::fmt;
use std::rc::Rc;

use crate::error::ConfigurationError;

/// Caller-supplied matcher: receives the working window, returns the
/// consumed length or `None` for no match.
pub type MatchFn = Rc<dyn Fn(&[u8]) -> Option<usize>>;

/// Declarative pattern specification passed to rule construction.
#[derive(Clone)]
pub enum Pat {
    /// Exact byte literal. Empty = no-constraint wildcard.
    Lit(Vec<u8>),
    /// Inclusive byte ranges, tried in order.
    Ranges(Vec<(u8, u8)>),
    /// Same-type candidates tried in declared order; first match wins.
    Any(Vec<Pat>),
    /// Consume exactly `n` bytes and yield them as the token.
    Len(usize),
    /// Candidate lengths; the largest feasible one wins.
    LenSet(Vec<usize>),
    /// Terminator candidates; the earliest-occurring one wins.
    FirstOf(Vec<Vec<u8>>),
    /// Caller-supplied function, length unknown ahead of time.
    Func(MatchFn),
}

impl Pat {
    /// Literal pattern from anything byte-like.
    pub fn lit(bytes: impl AsRef<[u8]>) -> Self {
        Pat::Lit(bytes.as_ref().to_vec())
    }

    /// Single inclusive byte range.
    pub fn range(lo: u8, hi: u8) -> Self {
        Pat::Ranges(vec![(lo, hi)])
    }

    /// Multiple inclusive byte ranges.
    pub fn ranges(ranges: impl Into<Vec<(u8, u8)>>) -> Self {
        Pat::Ranges(ranges.into())
    }

    /// Alternation over candidate patterns.
    pub fn any(candidates: impl Into<Vec<Pat>>) -> Self {
        Pat::Any(candidates.into())
    }

    /// Numeric-length pattern.
    pub fn len(n: usize) -> Self {
        Pat::Len(n)
    }

    /// Numeric-length set.
    pub fn len_set(lengths: impl Into<Vec<usize>>) -> Self {
        Pat::LenSet(lengths.into())
    }

    /// Earliest-occurring terminator over several candidates.
    pub fn first_of<I, B>(candidates: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Pat::FirstOf(
            candidates
                .into_iter()
                .map(|c| c.as_ref().to_vec())
                .collect(),
        )
    }

    /// Caller-supplied matcher function.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> Option<usize> + 'static,
    {
        Pat::Func(Rc::new(f))
    }

    fn discriminant(&self) -> &'static str {
        match self {
            Pat::Lit(_) => "literal",
            Pat::Ranges(_) => "ranges",
            Pat::Any(_) => "alternation",
            Pat::Len(_) => "length",
            Pat::LenSet(_) => "length-set",
            Pat::FirstOf(_) => "first-of",
            Pat::Func(_) => "function",
        }
    }
}

impl fmt::Debug for Pat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pat::Lit(b) => write!(f, "Lit({:?})", String::from_utf8_lossy(b)),
            Pat::Ranges(r) => write!(f, "Ranges({r:?})"),
            Pat::Any(c) => write!(f, "Any({c:?})"),
            Pat::Len(n) => write!(f, "Len({n})"),
            Pat::LenSet(ns) => write!(f, "LenSet({ns:?})"),
            Pat::FirstOf(c) => f
                .debug_list()
                .entries(c.iter().map(|b| String::from_utf8_lossy(b)))
                .finish(),
            Pat::Func(_) => write!(f, "Func(..)"),
        }
    }
}

/// Outcome of testing one matcher against the working window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Matched, consuming this many bytes of the window (for terminators,
    /// swept bytes included).
    Match(usize),
    /// Cannot match here regardless of future data.
    NoMatch,
    /// Not enough data to decide. Only the first matcher of a rule may
    /// report this; the scan pass stops and waits for more input.
    Pending,
}

/// Compiled matcher inside a rule chain.
#[derive(Clone)]
pub(crate) struct Matcher {
    kind: MatcherKind,
    /// Anchored at the scan offset (first in the chain) vs terminator.
    first: bool,
    /// Pattern-text length of the last match (excludes swept bytes).
    last_size: usize,
    /// Candidate/range index of the last match, where meaningful.
    last_index: Option<usize>,
}

#[derive(Clone)]
enum MatcherKind {
    Literal(Vec<u8>),
    CharRange(Vec<(u8, u8)>),
    Alternation(Vec<Matcher>),
    NumericLength(usize),
    /// Sorted descending at construction: largest feasible length wins.
    NumericLengthSet(Vec<usize>),
    EscapedLiteral { literal: Vec<u8>, escape: u8 },
    FirstOf(Vec<Vec<u8>>),
    Custom(MatchFn),
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            MatcherKind::Literal(b) => format!("Literal({:?})", String::from_utf8_lossy(b)),
            MatcherKind::CharRange(r) => format!("CharRange({r:?})"),
            MatcherKind::Alternation(c) => format!("Alternation({} candidates)", c.len()),
            MatcherKind::NumericLength(n) => format!("NumericLength({n})"),
            MatcherKind::NumericLengthSet(ns) => format!("NumericLengthSet({ns:?})"),
            MatcherKind::EscapedLiteral { literal, escape } => format!(
                "EscapedLiteral({:?}, escape={:?})",
                String::from_utf8_lossy(literal),
                *escape as char
            ),
            MatcherKind::FirstOf(c) => format!("FirstOf({} candidates)", c.len()),
            MatcherKind::Custom(_) => "Custom".to_string(),
        };
        write!(f, "{name}{}", if self.first { " [anchored]" } else { "" })
    }
}

impl Matcher {
    /// Compile a pattern spec into a matcher for the given chain position.
    ///
    /// `escape` converts non-first literals into escaped-literal scans so
    /// escaped terminator occurrences inside the token are skipped.
    pub(crate) fn compile(
        pat: Pat,
        first: bool,
        escape: Option<u8>,
    ) -> Result<Self, ConfigurationError> {
        let kind = match pat {
            Pat::Lit(bytes) => match escape {
                Some(esc) if !first && !bytes.is_empty() => MatcherKind::EscapedLiteral {
                    literal: bytes,
                    escape: esc,
                },
                _ => MatcherKind::Literal(bytes),
            },
            Pat::Ranges(ranges) => {
                if ranges.is_empty() {
                    return Err(ConfigurationError::EmptyRangeList);
                }
                for &(lo, hi) in &ranges {
                    if lo > hi {
                        return Err(ConfigurationError::InvalidRange { lo, hi });
                    }
                }
                MatcherKind::CharRange(ranges)
            }
            Pat::Any(candidates) => {
                if candidates.is_empty() {
                    return Err(ConfigurationError::EmptyAlternation);
                }
                let tag = candidates[0].discriminant();
                let mut compiled = Vec::with_capacity(candidates.len());
                for cand in candidates {
                    if matches!(cand, Pat::Any(_)) {
                        return Err(ConfigurationError::NestedAlternation);
                    }
                    if cand.discriminant() != tag {
                        return Err(ConfigurationError::MixedAlternation);
                    }
                    compiled.push(Matcher::compile(cand, first, escape)?);
                }
                MatcherKind::Alternation(compiled)
            }
            Pat::Len(n) => {
                if n == 0 {
                    return Err(ConfigurationError::ZeroNumericLength);
                }
                MatcherKind::NumericLength(n)
            }
            Pat::LenSet(mut lengths) => {
                if lengths.is_empty() || lengths.contains(&0) {
                    return Err(ConfigurationError::ZeroNumericLength);
                }
                lengths.sort_unstable_by(|a, b| b.cmp(a));
                lengths.dedup();
                MatcherKind::NumericLengthSet(lengths)
            }
            Pat::FirstOf(candidates) => {
                if candidates.is_empty() {
                    return Err(ConfigurationError::EmptyAlternation);
                }
                if candidates.iter().any(|c| c.is_empty()) {
                    return Err(ConfigurationError::EmptyTerminator);
                }
                MatcherKind::FirstOf(candidates)
            }
            Pat::Func(f) => MatcherKind::Custom(f),
        };

        Ok(Self {
            kind,
            first,
            last_size: 0,
            last_index: None,
        })
    }

    /// Test the working window at its start.
    pub(crate) fn exec(&mut self, win: &[u8]) -> MatchOutcome {
        let anchored = self.first;
        self.exec_mode(win, anchored)
    }

    fn exec_mode(&mut self, win: &[u8], anchored: bool) -> MatchOutcome {
        use MatchOutcome::*;

        match &self.kind {
            MatcherKind::Literal(lit) => {
                if lit.is_empty() {
                    self.last_size = 0;
                    return Match(0);
                }
                if anchored {
                    if win.len() >= lit.len() {
                        if &win[..lit.len()] == lit.as_slice() {
                            self.last_size = lit.len();
                            Match(lit.len())
                        } else {
                            NoMatch
                        }
                    } else if lit.starts_with(win) {
                        Pending
                    } else {
                        NoMatch
                    }
                } else {
                    match scan::find(win, lit) {
                        Some(pos) => {
                            self.last_size = lit.len();
                            Match(pos + lit.len())
                        }
                        None => NoMatch,
                    }
                }
            }
            MatcherKind::CharRange(ranges) => {
                if anchored {
                    match win.first() {
                        None => Pending,
                        Some(&b) => match scan::range_index(b, ranges) {
                            Some(idx) => {
                                self.last_size = 1;
                                self.last_index = Some(idx);
                                Match(1)
                            }
                            None => NoMatch,
                        },
                    }
                } else {
                    match scan::find_in_ranges(win, ranges) {
                        Some((pos, idx)) => {
                            self.last_size = 1;
                            self.last_index = Some(idx);
                            Match(pos + 1)
                        }
                        None => NoMatch,
                    }
                }
            }
            MatcherKind::Alternation(_) => self.exec_alternation(win, anchored),
            MatcherKind::NumericLength(n) => {
                let n = *n;
                if win.len() >= n {
                    self.last_size = n;
                    Match(n)
                } else if anchored {
                    Pending
                } else {
                    NoMatch
                }
            }
            MatcherKind::NumericLengthSet(lengths) => {
                // sorted descending: first feasible entry is the largest
                match lengths.iter().find(|&&n| n <= win.len()) {
                    Some(&n) => {
                        self.last_size = n;
                        self.last_index = lengths.iter().position(|&l| l == n);
                        Match(n)
                    }
                    None if anchored => Pending,
                    None => NoMatch,
                }
            }
            MatcherKind::EscapedLiteral { literal, escape } => {
                match scan::find_escaped(win, literal, *escape) {
                    Some(pos) => {
                        self.last_size = literal.len();
                        Match(pos + literal.len())
                    }
                    None if anchored => Pending,
                    None => NoMatch,
                }
            }
            MatcherKind::FirstOf(candidates) => match scan::first_of(win, candidates) {
                Some((pos, idx)) => {
                    self.last_size = candidates[idx].len();
                    self.last_index = Some(idx);
                    Match(pos + candidates[idx].len())
                }
                None if anchored => Pending,
                None => NoMatch,
            },
            MatcherKind::Custom(f) => match f(win) {
                Some(n) => {
                    let n = n.min(win.len());
                    self.last_size = n;
                    Match(n)
                }
                None => NoMatch,
            },
        }
    }

    fn exec_alternation(&mut self, win: &[u8], anchored: bool) -> MatchOutcome {
        // borrow dance: candidates need &mut while we update self afterwards
        let mut candidates = match &mut self.kind {
            MatcherKind::Alternation(c) => std::mem::take(c),
            _ => unreachable!(),
        };

        let mut outcome = MatchOutcome::NoMatch;
        let mut matched: Option<(usize, usize)> = None; // (candidate idx, consumed)
        let mut any_pending = false;

        for (idx, cand) in candidates.iter_mut().enumerate() {
            match cand.exec_mode(win, anchored) {
                MatchOutcome::Match(n) => {
                    matched = Some((idx, n));
                    self.last_size = cand.last_size;
                    break; // declared order wins
                }
                MatchOutcome::Pending => any_pending = true,
                MatchOutcome::NoMatch => {}
            }
        }

        if let Some((idx, n)) = matched {
            self.last_index = Some(idx);
            outcome = MatchOutcome::Match(n);
        } else if any_pending && anchored {
            outcome = MatchOutcome::Pending;
        }

        match &mut self.kind {
            MatcherKind::Alternation(c) => *c = candidates,
            _ => unreachable!(),
        }
        outcome
    }

    /// Pattern-text length of the last match (swept bytes excluded).
    pub(crate) fn last_size(&self) -> usize {
        self.last_size
    }

    /// Candidate/range index of the last match, where meaningful.
    pub(crate) fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Whether this matcher yields the token itself rather than marking a
    /// span of the buffer.
    pub(crate) fn produces_token(&self, is_last: bool) -> bool {
        match self.kind {
            MatcherKind::NumericLength(_) | MatcherKind::NumericLengthSet(_) => true,
            MatcherKind::FirstOf(_) => is_last,
            _ => false,
        }
    }

    /// Length of the self-produced token within the `consumed` span.
    /// Numeric matchers yield everything they consumed; a trailing
    /// first-of yields the prefix it swept before the terminator.
    pub(crate) fn token_len(&self, consumed: usize) -> usize {
        match self.kind {
            MatcherKind::FirstOf(_) => consumed - self.last_size,
            _ => consumed,
        }
    }

    /// Whether a match can ever consume bytes. Length-unknown matchers
    /// report `true` and are exempt from static loop analysis.
    pub(crate) fn can_consume(&self) -> bool {
        match &self.kind {
            MatcherKind::Literal(lit) => !lit.is_empty(),
            MatcherKind::Alternation(c) => c.iter().any(Matcher::can_consume),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(pat: Pat) -> Matcher {
        Matcher::compile(pat, true, None).unwrap()
    }

    fn rest(pat: Pat) -> Matcher {
        Matcher::compile(pat, false, None).unwrap()
    }

    #[test]
    fn test_literal_anchored() {
        let mut m = first(Pat::lit("abc"));
        assert_eq!(m.exec(b"abcdef"), MatchOutcome::Match(3));
        assert_eq!(m.last_size(), 3);
        assert_eq!(m.exec(b"xabc"), MatchOutcome::NoMatch);
        // prefix of the literal: needs more data
        assert_eq!(m.exec(b"ab"), MatchOutcome::Pending);
        assert_eq!(m.exec(b"ax"), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_literal_wildcard() {
        let mut m = first(Pat::lit(""));
        assert_eq!(m.exec(b"anything"), MatchOutcome::Match(0));
        assert_eq!(m.exec(b""), MatchOutcome::Match(0));
        assert_eq!(m.last_size(), 0);
    }

    #[test]
    fn test_literal_terminator_sweeps() {
        let mut m = rest(Pat::lit("\n"));
        assert_eq!(m.exec(b"hello\nworld"), MatchOutcome::Match(6));
        assert_eq!(m.last_size(), 1);
        // terminators are strict: absence is a plain no-match
        assert_eq!(m.exec(b"hello"), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_char_range() {
        let mut m = first(Pat::range(b'0', b'9'));
        assert_eq!(m.exec(b"42"), MatchOutcome::Match(1));
        assert_eq!(m.exec(b"x"), MatchOutcome::NoMatch);
        assert_eq!(m.exec(b""), MatchOutcome::Pending);

        let mut m = first(Pat::ranges(vec![(b'a', b'f'), (b'0', b'9')]));
        assert_eq!(m.exec(b"7"), MatchOutcome::Match(1));
        assert_eq!(m.last_index(), Some(1));
    }

    #[test]
    fn test_range_validation() {
        assert!(matches!(
            Matcher::compile(Pat::range(b'z', b'a'), true, None),
            Err(ConfigurationError::InvalidRange { .. })
        ));
        assert!(matches!(
            Matcher::compile(Pat::Ranges(vec![]), true, None),
            Err(ConfigurationError::EmptyRangeList)
        ));
    }

    #[test]
    fn test_alternation_declared_order() {
        let mut m = first(Pat::any(vec![Pat::lit("ab"), Pat::lit("a")]));
        // both match: the first declared wins
        assert_eq!(m.exec(b"abc"), MatchOutcome::Match(2));
        assert_eq!(m.last_index(), Some(0));

        assert_eq!(m.exec(b"axc"), MatchOutcome::Match(1));
        assert_eq!(m.last_index(), Some(1));
    }

    #[test]
    fn test_alternation_pending_only_anchored() {
        let mut m = first(Pat::any(vec![Pat::lit("abc"), Pat::lit("xyz")]));
        assert_eq!(m.exec(b"ab"), MatchOutcome::Pending);

        let mut m = rest(Pat::any(vec![Pat::lit("abc"), Pat::lit("xyz")]));
        assert_eq!(m.exec(b"ab"), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_alternation_validation() {
        assert!(matches!(
            Matcher::compile(Pat::any(vec![]), true, None),
            Err(ConfigurationError::EmptyAlternation)
        ));
        assert!(matches!(
            Matcher::compile(Pat::any(vec![Pat::lit("a"), Pat::len(2)]), true, None),
            Err(ConfigurationError::MixedAlternation)
        ));
        assert!(matches!(
            Matcher::compile(
                Pat::any(vec![Pat::any(vec![Pat::lit("a")])]),
                true,
                None
            ),
            Err(ConfigurationError::NestedAlternation)
        ));
    }

    #[test]
    fn test_numeric_length() {
        let mut m = first(Pat::len(4));
        assert_eq!(m.exec(b"abcdef"), MatchOutcome::Match(4));
        assert_eq!(m.exec(b"abc"), MatchOutcome::Pending);
        assert!(m.produces_token(false));
    }

    #[test]
    fn test_numeric_length_set_largest_feasible() {
        let mut m = first(Pat::len_set(vec![2, 10]));
        // 10 is infeasible on a 3-byte window, 2 wins
        assert_eq!(m.exec(b"abc"), MatchOutcome::Match(2));
        // both feasible: largest wins
        assert_eq!(m.exec(b"abcdefghijkl"), MatchOutcome::Match(10));
        assert_eq!(m.exec(b"a"), MatchOutcome::Pending);
    }

    #[test]
    fn test_numeric_validation() {
        assert!(Matcher::compile(Pat::len(0), true, None).is_err());
        assert!(Matcher::compile(Pat::len_set(vec![]), true, None).is_err());
        assert!(Matcher::compile(Pat::len_set(vec![3, 0]), true, None).is_err());
    }

    #[test]
    fn test_escaped_literal() {
        let mut m = Matcher::compile(Pat::lit("\""), false, Some(b'\\')).unwrap();
        // first quote is escaped, match lands on the closing one
        assert_eq!(m.exec(br#"a\"bc""#), MatchOutcome::Match(6));
        assert_eq!(m.last_size(), 1);
        assert_eq!(m.exec(br#"a\"bc"#), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_escape_applies_to_terminators_only() {
        // anchored literals never turn into escaped scans
        let mut m = Matcher::compile(Pat::lit("\""), true, Some(b'\\')).unwrap();
        assert_eq!(m.exec(b"\"rest"), MatchOutcome::Match(1));
    }

    #[test]
    fn test_first_of() {
        let mut m = first(Pat::first_of([" ", ","]));
        assert_eq!(m.exec(b"ab,"), MatchOutcome::Match(3));
        assert_eq!(m.last_index(), Some(1));
        assert_eq!(m.last_size(), 1);
        assert_eq!(m.exec(b"ab"), MatchOutcome::Pending);
        assert!(m.produces_token(true));
        assert!(!m.produces_token(false));
    }

    #[test]
    fn test_first_of_validation() {
        assert!(matches!(
            Matcher::compile(Pat::FirstOf(vec![]), true, None),
            Err(ConfigurationError::EmptyAlternation)
        ));
        assert!(matches!(
            Matcher::compile(Pat::first_of(["a", ""]), true, None),
            Err(ConfigurationError::EmptyTerminator)
        ));
    }

    #[test]
    fn test_custom() {
        let mut m = first(Pat::func(|win| {
            win.iter().position(|&b| !b.is_ascii_digit())
        }));
        assert_eq!(m.exec(b"123x"), MatchOutcome::Match(3));
        // consumed length is clamped to the window
        let mut m = first(Pat::func(|_| Some(usize::MAX)));
        assert_eq!(m.exec(b"ab"), MatchOutcome::Match(2));
    }

    #[test]
    fn test_can_consume() {
        assert!(!first(Pat::lit("")).can_consume());
        assert!(first(Pat::lit("a")).can_consume());
        assert!(first(Pat::any(vec![Pat::lit(""), Pat::lit("x")])).can_consume());
        assert!(!first(Pat::any(vec![Pat::lit(""), Pat::lit("")])).can_consume());
        assert!(first(Pat::func(|_| None)).can_consume());
    }
}
