//! Cross-module behavioral tests exercising the engine through its public
//! surface only.

use std::cell::RefCell;
use std::rc::Rc;

use ruletok::{ConfigurationError, Error, Pat, Scanner, Tokenizer, UsageError};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

type Sink = Rc<RefCell<Vec<Vec<u8>>>>;

/// Scanner whose tokens accumulate into the returned sink.
fn collecting_scanner() -> (Scanner, Sink) {
    init_logs();
    let mut scanner = Scanner::new();
    let seen: Sink = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    scanner.on_token(move |_, token| sink.borrow_mut().push(token.value.clone()));
    (scanner, seen)
}

fn texts(seen: &Sink) -> Vec<String> {
    seen.borrow()
        .iter()
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .collect()
}

#[test]
fn single_matcher_rules_ignore_trim_right() {
    // trim_right has nothing to remove when the only pattern is also the
    // first: both settings must produce identical tokens
    let run = |trim_right: bool| -> Vec<Vec<u8>> {
        let (mut scanner, seen) = collecting_scanner();
        scanner.trim_left(false);
        scanner.trim_right(trim_right);
        scanner.add_rule(vec![Pat::lit("\n")], "newline").unwrap();
        scanner.add_rule(vec![Pat::len(1)], "byte").unwrap();
        scanner.write("a\nb\n").unwrap();
        let out = seen.borrow().clone();
        out
    };

    assert_eq!(run(true), run(false));
}

#[test]
fn save_then_load_reproduces_behavior() {
    let build = |scanner: &mut Scanner| {
        scanner.ignore(true);
        scanner.add_rule(vec![Pat::lit(" ")], "space").unwrap();
        scanner.ignore(false);
        scanner
            .add_rule(vec![Pat::lit(""), Pat::first_of([" ", "\n"])], "word")
            .unwrap();
    };

    let (mut plain, plain_seen) = collecting_scanner();
    build(&mut plain);
    plain.write("alpha beta\n").unwrap();

    let (mut round_tripped, rt_seen) = collecting_scanner();
    build(&mut round_tripped);
    round_tripped.save_rule_set("main");
    round_tripped.load_rule_set("main").unwrap();
    round_tripped.write("alpha beta\n").unwrap();

    assert_eq!(*plain_seen.borrow(), *rt_seen.borrow());
}

#[test]
fn chunk_boundaries_do_not_change_tokens() {
    let run = |chunks: &[&str]| -> Vec<String> {
        let (mut scanner, seen) = collecting_scanner();
        scanner
            .add_rule(vec![Pat::lit(""), Pat::lit("\n")], "line")
            .unwrap();
        for chunk in chunks {
            scanner.write(chunk).unwrap();
        }
        texts(&seen)
    };

    let whole = run(&["ab\ncd\n"]);
    let split = run(&["a", "b\nc", "d\n", ""]);
    assert_eq!(whole, vec!["ab", "cd"]);
    assert_eq!(whole, split);
}

#[test]
fn escaped_delimiters_stay_inside_the_token() {
    let (mut scanner, seen) = collecting_scanner();
    scanner.escaped(true);
    scanner
        .add_rule(vec![Pat::lit("\""), Pat::lit("\"")], "string")
        .unwrap();

    scanner.write(br#""a\"bc""#.as_slice()).unwrap();
    assert_eq!(texts(&seen), vec![r#"a\"bc"#]);
}

#[test]
fn escape_parity_decides_liveness() {
    // an even run of escapes leaves the terminator live
    let (mut scanner, seen) = collecting_scanner();
    scanner.escaped(true);
    scanner
        .add_rule(vec![Pat::lit("\""), Pat::lit("\"")], "string")
        .unwrap();

    scanner.write(br#""a\\""#.as_slice()).unwrap();
    assert_eq!(texts(&seen), vec![r"a\\"]);
}

#[test]
fn first_of_picks_earliest_occurrence() {
    init_logs();
    let mut scanner = Scanner::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    scanner.on_token(move |_, token| {
        sink.borrow_mut().push((token.value.clone(), token.index));
    });
    scanner
        .add_rule(vec![Pat::first_of([" ", ","])], "field")
        .unwrap();

    scanner.write("ab,").unwrap();
    assert_eq!(*seen.borrow(), vec![(b"ab".to_vec(), 1)]);
}

#[test]
fn length_set_takes_largest_feasible() {
    let (mut scanner, seen) = collecting_scanner();
    scanner
        .add_rule(vec![Pat::len_set(vec![10, 2])], "chunk")
        .unwrap();

    scanner.write("abc").unwrap();
    // 10 does not fit a 3-byte window; 2 does. "c" waits for more data.
    assert_eq!(texts(&seen), vec!["ab"]);
}

#[test]
fn empty_notification_is_transition_based() {
    init_logs();
    let mut scanner = Scanner::new();
    let events: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    scanner.on_empty(move |_, ending| sink.borrow_mut().push(ending));
    scanner.add_rule(vec![Pat::len(1)], "byte").unwrap();

    scanner.write("ab").unwrap(); // drains: one event
    scanner.write("").unwrap(); // already empty: no event
    scanner.end_with("c").unwrap(); // drains during end: ending event

    assert_eq!(*events.borrow(), vec![false, true]);
}

#[test]
fn zero_progress_configurations_are_rejected() {
    init_logs();
    let mut scanner = Scanner::new();

    // a failed test consumes nothing, so a self-pointing fail-jump loops
    scanner.continue_on_fail(-1);
    assert!(matches!(
        scanner.add_rule(vec![Pat::lit("a")], "self-fail"),
        Err(Error::Configuration(ConfigurationError::ZeroProgress))
    ));
    scanner.continue_clear();

    // a zero-length pattern looping onto itself can never advance
    scanner.continue_on(-1);
    assert!(matches!(
        scanner.add_rule(vec![Pat::lit("")], "self-match"),
        Err(Error::Configuration(ConfigurationError::ZeroProgress))
    ));
    // switching rule sets counts as progress
    scanner.next("elsewhere");
    assert!(scanner.add_rule(vec![Pat::lit("")], "switcher").is_ok());
}

#[test]
fn match_jump_skips_whole_group() {
    init_logs();
    let mut scanner = Scanner::new();
    let tags: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = tags.clone();
    scanner.on_token(move |_, token| {
        sink.borrow_mut().push(token.tag.clone().unwrap_or_default());
    });

    scanner.continue_on(1);
    scanner.add_rule(vec![Pat::lit(">")], "prompt").unwrap();
    scanner.continue_clear();

    scanner.group_start();
    scanner.add_rule(vec![Pat::lit("a")], "in-group-1").unwrap();
    scanner.add_rule(vec![Pat::lit("b")], "in-group-2").unwrap();
    scanner.add_rule(vec![Pat::lit("c")], "in-group-3").unwrap();
    scanner.group_end();

    scanner.add_rule(vec![Pat::lit("a")], "past-group").unwrap();

    scanner.write(">a").unwrap();
    // the +1 jump lands past all three grouped rules at once
    assert_eq!(*tags.borrow(), vec!["prompt", "past-group"]);
}

#[test]
fn pause_inside_handler_resumes_from_cursor() {
    init_logs();
    let mut scanner = Scanner::new();
    let tags: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = tags.clone();
    scanner
        .add_rule_with(vec![Pat::lit("stop")], move |s, _| {
            sink.borrow_mut().push("stop");
            s.pause();
        })
        .unwrap();
    let sink = tags.clone();
    scanner
        .add_rule_with(vec![Pat::lit("go")], move |_, _| {
            sink.borrow_mut().push("go");
        })
        .unwrap();

    assert!(!scanner.write("stopgo").unwrap());
    assert_eq!(*tags.borrow(), vec!["stop"]);
    assert!(scanner.is_paused());

    assert!(scanner.resume().unwrap());
    assert_eq!(*tags.borrow(), vec!["stop", "go"]);
}

#[test]
fn rule_set_switch_restarts_from_first_rule() {
    let (mut scanner, seen) = collecting_scanner();

    // body grammar: semicolon-terminated statements
    scanner
        .add_rule(vec![Pat::lit(""), Pat::lit(";")], "stmt")
        .unwrap();
    scanner.save_rule_set("body");
    scanner.clear_rules();

    // header grammar: a colon-terminated preamble, then switch
    scanner.next("body");
    scanner
        .add_rule(vec![Pat::lit(""), Pat::lit(":")], "header")
        .unwrap();
    scanner.next_clear();

    scanner.write("prelude:one;two;").unwrap();
    assert_eq!(texts(&seen), vec!["prelude", "one", "two"]);
    assert_eq!(scanner.active_set_name(), Some("body"));
}

#[test]
fn handler_rewrites_grammar_mid_stream() {
    let (mut scanner, seen) = collecting_scanner();

    scanner
        .add_rule_with(vec![Pat::lit("#mode=csv\n")], |s, _| {
            s.clear_rules();
            s.add_rule(vec![Pat::lit(""), Pat::first_of([",", "\n"])], "cell")
                .unwrap();
        })
        .unwrap();

    scanner.write("#mode=csv\nx,y\n").unwrap();
    assert_eq!(texts(&seen), vec!["x", "y"]);
}

#[test]
fn writes_after_end_are_usage_errors() {
    init_logs();
    let mut scanner = Scanner::new();
    scanner.end().unwrap();

    assert!(matches!(
        scanner.write("late"),
        Err(Error::Usage(UsageError::WriteAfterEnd))
    ));
    assert!(matches!(
        scanner.end(),
        Err(Error::Usage(UsageError::WriteAfterEnd))
    ));
}

#[test]
fn utf8_sequences_survive_arbitrary_chunking() {
    let (mut scanner, seen) = collecting_scanner();
    scanner
        .add_rule(vec![Pat::lit(""), Pat::lit("\n")], "line")
        .unwrap();

    let input = "żółw 🐢\n".as_bytes();
    for byte in input {
        scanner.write(std::slice::from_ref(byte)).unwrap();
    }
    assert_eq!(texts(&seen), vec!["żółw 🐢"]);
}

#[test]
fn tokenizer_adapter_signals_backpressure() {
    init_logs();
    let mut tok = Tokenizer::new();
    let drained = Rc::new(RefCell::new(false));
    let flag = drained.clone();
    tok.on_drain(move || *flag.borrow_mut() = true);
    tok.add_rule(vec![Pat::len(1)], "byte").unwrap();

    tok.pause();
    assert!(!tok.write("x").unwrap());
    assert!(tok.resume().unwrap());
    assert!(*drained.borrow());
    assert_eq!(tok.token_count(), 1);
}

#[test]
fn config_json_applies_partial_overrides() {
    use ruletok::{Encoding, ScannerConfig};

    init_logs();
    let config = ScannerConfig::from_bytes(br#"{"encoding":"binary","trim_left":false}"#)
        .unwrap();
    assert_eq!(config.encoding, Encoding::Binary);
    assert!(!config.trim_left);
    // unspecified fields keep their defaults
    assert!(config.trim_right);

    let mut scanner = Scanner::with_config(config);
    scanner.write(&[0xFF, 0xC3][..]).unwrap();
    // binary mode buffers raw bytes with no holdback
    assert_eq!(scanner.buffered(), 2);
}
