//! Grammar violations surface as parse errors with positions, and
//! mid-statement end of input is flagged as incomplete for REPL hosts.

use rill::{Engine, ErrorKind};

fn parse_err(source: &str) -> rill::Error {
    Engine::new()
        .evaluate(source)
        .expect_err("source should not parse")
}

#[test]
fn missing_semicolon() {
    let err = parse_err("let a = 1");
    assert_eq!(err.kind(), ErrorKind::ParseError);
    // End of input could still be completed by more input.
    assert!(err.is_incomplete());

    let err = parse_err("let a = 1 let b = 2;");
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert!(!err.is_incomplete());
}

#[test]
fn unbalanced_parens() {
    let err = parse_err("if (1 { println(1); }");
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn def_requires_top_level() {
    for source in [
        "def outer() { def inner() { } }",
        "if (1) { def f() { } }",
        "while (1) { def f() { } }",
        "for (let i = 0; i < 1; i = i + 1) { def f() { } }",
    ] {
        let err = parse_err(source);
        assert_eq!(err.kind(), ErrorKind::ParseError, "source: {source}");
        assert!(err.message().contains("cannot define a function here"), "source: {source}");
    }
}

#[test]
fn fractional_literals_are_not_tokens() {
    // `1.5` lexes as number, accessor dot, number; the grammar rejects it.
    let err = parse_err("let a = 1.5;");
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn unary_minus_is_not_supported() {
    let err = parse_err("let a = -1;");
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn missing_expression() {
    let err = parse_err("let a = ;");
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert!(!err.is_incomplete());
}

#[test]
fn missing_comma_in_call() {
    let err = parse_err("println(1 2);");
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn unterminated_string_is_a_lex_error() {
    let err = parse_err("let s = \"oops;");
    assert_eq!(err.kind(), ErrorKind::LexError);
    assert!(err.pos().is_some());
}

#[test]
fn invalid_character_is_a_lex_error() {
    let err = parse_err("let a = $;");
    assert_eq!(err.kind(), ErrorKind::LexError);
}

#[test]
fn incomplete_constructs_are_flagged_for_continuation() {
    for source in [
        "def foo() {",
        "if (1) {",
        "while (1) { println(1);",
        "object point { x = 1;",
        "new { a = 1",
    ] {
        let err = parse_err(source);
        assert!(err.is_incomplete(), "source: {source:?} -> {err}");
    }
}

#[test]
fn genuine_errors_are_not_flagged_incomplete() {
    for source in ["let a = ;", "if 1) { }", "def 5() { }"] {
        let err = parse_err(source);
        assert!(!err.is_incomplete(), "source: {source:?} -> {err}");
    }
}

#[test]
fn keywords_do_not_appear_in_expressions() {
    let err = parse_err("let a = 1 + while;");
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn unknown_directive() {
    let err = parse_err("@frobnicate x");
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert!(err.message().contains("unknown directive"));
}

#[test]
fn assignment_needs_an_identifier_target() {
    let err = parse_err("1 = 2;");
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn subscript_takes_identifier_or_number() {
    let err = parse_err("let xs = new [1]; println(xs[1 + 1]);");
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn parse_errors_carry_positions() {
    let err = parse_err("let a = 1;\nlet b = ;");
    let pos = err.pos().expect("parse errors carry a position");
    assert_eq!(pos.line, 2);
}
