//! Streaming rule-based tokenizer.
//!
//! A [`Scanner`] matches declaratively-defined pattern rules against
//! incrementally-delivered byte or text data and emits tokens without
//! requiring the full input in memory. Parsers for line protocols, CSV,
//! JSON fragments or binary framings are composed from small pattern
//! rules instead of hand-written state machines.
//!
//! ```
//! use ruletok::{Pat, Scanner};
//!
//! let mut scanner = Scanner::new();
//! scanner.on_token(|_, token| {
//!     println!("line: {}", token.text().unwrap_or("<binary>"));
//! });
//! scanner
//!     .add_rule(vec![Pat::lit(""), Pat::lit("\n")], "line")
//!     .unwrap();
//!
//! scanner.write("alpha\nbe").unwrap();
//! scanner.write("ta\n").unwrap(); // "beta" completes across the chunks
//! scanner.end().unwrap();
//! ```
//!
//! Matching never backtracks across consumed bytes: advance is committed
//! and append-only, and a rule whose terminator has not arrived yet simply
//! waits for the next write. Handlers run synchronously inside the scan
//! loop with full mutable access to the engine, so grammars can rewrite
//! themselves mid-stream (rule-set switching, pause/resume, seeking).
//!
//! [`stream::Tokenizer`] wraps the engine with stream plumbing: drain and
//! end callbacks plus a `std::io::Write` implementation.

pub mod config;
pub mod error;
pub mod pattern;
pub mod rule;
pub mod scanner;
pub mod stream;
pub mod trace;

pub use config::{Encoding, ScannerConfig};
pub use error::{ConfigurationError, Error, Result, UsageError};
pub use pattern::{MatchFn, Pat};
pub use rule::{EmptyHandler, Handler, RuleFlags, Token};
pub use scanner::Scanner;
pub use stream::Tokenizer;
