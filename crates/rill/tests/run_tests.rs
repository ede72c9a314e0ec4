//! End-to-end language behavior, driven through the public engine surface
//! with captured print output.

use pretty_assertions::assert_eq;
use rill::{CollectStringPrint, Engine, ErrorKind};

/// Evaluates a program on a fresh engine and returns everything it printed.
fn run(source: &str) -> String {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    engine
        .evaluate_with_print(source, &mut print)
        .unwrap_or_else(|e| panic!("program failed: {e}\nsource: {source}"));
    print.into_output()
}

/// Evaluates a program expected to fail and returns the error kind.
fn run_err(source: &str) -> ErrorKind {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    engine
        .evaluate_with_print(source, &mut print)
        .expect_err("program should have failed")
        .kind()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run("let a = 1 + 2 * 3; println(a);"), "7\n");
    assert_eq!(run("println(10 - 2 - 3);"), "5\n");
    assert_eq!(run("println(7 % 4);"), "3\n");
    assert_eq!(run("println(2 ^ 10);"), "1024\n");
    assert_eq!(run("println(1 + 2 ^ 3 * 2);"), "17\n");
}

#[test]
fn function_definition_and_call() {
    assert_eq!(run("def add(x, y) { return x + y; } println(add(2, 40));"), "42\n");
}

#[test]
fn array_natives() {
    let source = "
        let xs = new [10, 20, 30];
        push(xs, 40);
        println(size(xs));
    ";
    assert_eq!(run(source), "4\n");
}

#[test]
fn inheritance_dispatch_and_member_override() {
    let source = "
        object vehicle { wheels = 4; }
        object bike inherits vehicle { wheels = 2; }
        def describe(v is vehicle) { println(v.wheels); }
        let b = new bike {};
        describe(b);
    ";
    assert_eq!(run(source), "2\n");
}

#[test]
fn postfix_increment_yields_original() {
    let source = "
        let i = 0;
        let v = i++;
        println(v);
        println(i);
    ";
    assert_eq!(run(source), "0\n1\n");
}

#[test]
fn prefix_increment_yields_updated() {
    let source = "
        let i = 0;
        let v = ++i;
        println(v);
        println(i);
    ";
    assert_eq!(run(source), "1\n1\n");
}

#[test]
fn decrement_forms() {
    assert_eq!(run("let i = 5; println(i--); println(i);"), "5\n4\n");
    assert_eq!(run("let i = 5; println(--i); println(i);"), "4\n4\n");
}

#[test]
fn expand_at_call_site() {
    let source = "
        let args = new [\"hello\", 5];
        def greet(msg is string, n is number) {
          let i = 0;
          while (i < n) { print(msg); i = i + 1; }
        }
        greet(args...);
    ";
    assert_eq!(run(source), "hellohellohellohellohello");
}

#[test]
fn expand_non_array_fails() {
    assert_eq!(run_err("println(5...);"), ErrorKind::InvalidExpansion);
}

#[test]
fn while_loop() {
    let source = "
        let n = 3;
        while (n > 0) { println(n); n = n - 1; }
    ";
    assert_eq!(run(source), "3\n2\n1\n");
}

#[test]
fn for_loop() {
    assert_eq!(run("for (let i = 0; i < 3; i = i + 1) { println(i); }"), "0\n1\n2\n");
}

#[test]
fn for_loop_scopes_induction_variable() {
    let source = "
        let i = 99;
        for (let i = 0; i < 2; i = i + 1) { }
        println(i);
    ";
    assert_eq!(run(source), "99\n");
}

#[test]
fn if_else_chain() {
    let source = "
        def pick(n is number) {
          if (n < 10) { return \"small\"; }
          else if (n < 100) { return \"medium\"; }
          else { return \"large\"; }
        }
        println(pick(5));
        println(pick(50));
        println(pick(500));
    ";
    assert_eq!(run(source), "small\nmedium\nlarge\n");
}

#[test]
fn block_scope_shadowing() {
    let source = "
        let x = 1;
        if (1) { let x = 2; println(x); }
        println(x);
    ";
    assert_eq!(run(source), "2\n1\n");
}

#[test]
fn string_concat_coerces_right_operand() {
    assert_eq!(run("println(\"n=\" + 42);"), "n=42\n");
    assert_eq!(run("let x; println(\"v=\" + x);"), "v=undefined\n");
}

#[test]
fn number_plus_text_parses_leniently() {
    assert_eq!(run("println(1 + \"2\");"), "3\n");
    // Unparseable text coerces to -1.
    assert_eq!(run("println(1 + \"abc\");"), "0\n");
}

#[test]
fn comparisons_and_bool_rendering() {
    assert_eq!(run("println(1 < 2);"), "true\n");
    assert_eq!(run("println(2 <= 1);"), "false\n");
    assert_eq!(run("println(\"abc\" < \"abd\");"), "true\n");
    assert_eq!(run("println(3 == \"3\");"), "true\n");
    assert_eq!(run("println(3 != 4);"), "true\n");
}

#[test]
fn logical_operators_keep_deciding_value() {
    // Short-circuit leaves the deciding operand, not a bool.
    assert_eq!(run("let x = 0 && 5; println(x);"), "0\n");
    assert_eq!(run("let x = 2 && 5; println(x);"), "5\n");
    assert_eq!(run("let x = 0 || 7; println(x);"), "7\n");
    assert_eq!(run("let x = 2 || 7; println(x);"), "2\n");
    // Strict `&` always yields a bool.
    assert_eq!(run("println(2 & 5);"), "true\n");
    assert_eq!(run("println(0 & 5);"), "false\n");
}

#[test]
fn short_circuit_skips_right_operand() {
    // The right operand would raise NoMatchingFunction if evaluated.
    assert_eq!(run("let x = 0 && boom(); println(x);"), "0\n");
    assert_eq!(run("let x = 1 || boom(); println(x);"), "1\n");
}

#[test]
fn blob_literals_and_field_access() {
    let source = "
        let b = new { x = 1, y = 2 };
        println(b.x + b.y);
        b.x = 10;
        println(b.x);
        println(b);
    ";
    assert_eq!(run(source), "3\n10\n{ x : 10, y : 2 }\n");
}

#[test]
fn empty_containers_render_like_the_reference() {
    assert_eq!(run("println(new {});"), "{  }\n");
    assert_eq!(run("println(new []);"), "[  ]\n");
    assert_eq!(run("println(new [1, 2]);"), "[ 1, 2 ]\n");
}

#[test]
fn nested_paths() {
    let source = "
        let b = new { inner = new { x = 1 }, xs = new [10, 20] };
        println(b.inner.x);
        println(b.xs[1]);
        b.inner.x = 5;
        b.xs[0] = 7;
        println(b.inner.x);
        println(b.xs[0]);
    ";
    assert_eq!(run(source), "1\n20\n5\n7\n");
}

#[test]
fn array_index_through_scope_name() {
    let source = "
        let xs = new [10, 20, 30];
        let i = 2;
        println(xs[i]);
        xs[i] = 33;
        println(xs[2]);
    ";
    assert_eq!(run(source), "30\n33\n");
}

#[test]
fn object_defaults_see_earlier_members() {
    let source = "
        object point { x = 1; y = x + 1; }
        let p = new point {};
        println(p.y);
    ";
    assert_eq!(run(source), "2\n");
}

#[test]
fn explicit_initializers_run_last() {
    let source = "
        object point { x = 1; y = 2; }
        let p = new point { y = 9 };
        println(p.x);
        println(p.y);
    ";
    assert_eq!(run(source), "1\n9\n");
}

#[test]
fn redefined_member_without_initializer_fails() {
    let source = "
        object a { m = 1; }
        object b inherits a { m; }
        let v = new b {};
    ";
    assert_eq!(run_err(source), ErrorKind::RedefinedMember);
}

#[test]
fn instance_rendering_is_stable() {
    let source = "
        object point { x = 1; y = 2; }
        println(new point {});
    ";
    assert_eq!(run(source), "point { x : 1, y : 2 }\n");
}

#[test]
fn assignment_is_an_expression() {
    let source = "
        let a = 0;
        let b = a = 5;
        println(a);
        println(b);
    ";
    assert_eq!(run(source), "5\n5\n");
}

#[test]
fn assignment_to_fresh_name_binds_it() {
    assert_eq!(run("fresh = 3; println(fresh);"), "3\n");
}

#[test]
fn function_address_is_a_name_handle() {
    assert_eq!(run("println(&println);"), "println\n");
}

#[test]
fn implicit_return_is_undefined() {
    let source = "
        def noop() { }
        println(noop());
        println(is_empty(noop()));
    ";
    assert_eq!(run(source), "undefined\ntrue\n");
}

#[test]
fn bare_return_yields_undefined() {
    let source = "
        def f(n is number) { if (n > 0) { return; } return 1; }
        println(is_empty(f(5)));
        println(f(0 - 5));
    ";
    assert_eq!(run(source), "true\n1\n");
}

#[test]
fn recursion() {
    let source = "
        def fib(n is number) {
          if (n < 2) { return n; }
          return fib(n - 1) + fib(n - 2);
        }
        println(fib(12));
    ";
    assert_eq!(run(source), "144\n");
}

#[test]
fn string_library() {
    assert_eq!(run("println(length(\"hello\"));"), "5\n");
    assert_eq!(run("println(at(\"hello\", 1));"), "e\n");
    assert_eq!(run("println(substr(\"hello\", 3));"), "lo\n");
    assert_eq!(run("println(substr(\"hello\", 1, 3));"), "ell\n");
}

#[test]
fn loadlib_is_accepted_and_ignored() {
    assert_eq!(run("@loadlib \"some/path\" println(1);"), "1\n");
}

#[test]
fn runtime_errors_carry_kinds() {
    assert_eq!(run_err("println(nope);"), ErrorKind::UndefinedVariable);
    assert_eq!(run_err("boom();"), ErrorKind::NoMatchingFunction);
    assert_eq!(run_err("return 5;"), ErrorKind::BadReturn);
    assert_eq!(run_err("let xs = new [1]; println(xs[3]);"), ErrorKind::OutOfRange);
    assert_eq!(run_err("let b = new { x = 1 }; println(b.y);"), ErrorKind::BadAccess);
    assert_eq!(run_err("let n = 5; println(n.x);"), ErrorKind::BadAccess);
    assert_eq!(run_err("let b = new { x = 1 }; b.y = 2;"), ErrorKind::BadAccess);
    assert_eq!(run_err("let xs = new [1]; println(xs + 1);"), ErrorKind::BadCast);
    assert_eq!(run_err("println(1 + undefined_thing);"), ErrorKind::UndefinedVariable);
}

#[test]
fn container_operands_do_not_compare() {
    assert_eq!(run_err("let a = new [1]; let b = new [1]; println(a == b);"), ErrorKind::BadCast);
}

#[test]
fn engine_stays_usable_after_an_error() {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    let err = engine.evaluate_with_print("let a = 1; boom();", &mut print).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMatchingFunction);
    // State from completed statements persists and new code still runs.
    engine.evaluate_with_print("println(a + 1);", &mut print).unwrap();
    assert_eq!(print.output(), "2\n");
}

#[test]
fn top_level_state_persists_across_evaluations() {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    engine.evaluate_with_print("let total = 1;", &mut print).unwrap();
    engine.evaluate_with_print("total = total + 41;", &mut print).unwrap();
    engine.evaluate_with_print("println(total);", &mut print).unwrap();
    assert_eq!(print.output(), "42\n");
}

#[test]
fn locals_do_not_leak_heap_objects() {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    let source = "
        def f() {
          let xs = new [1, 2, 3];
          let b = new { data = xs };
          return size(xs);
        }
        println(f());
    ";
    engine.evaluate_with_print(source, &mut print).unwrap();
    assert_eq!(print.output(), "3\n");
    assert_eq!(engine.live_heap_objects(), 0);
}

#[test]
fn temporaries_are_released_on_error_unwind() {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    let err = engine
        .evaluate_with_print("def f() { let xs = new [1, 2]; boom(xs); } f();", &mut print)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMatchingFunction);
    assert_eq!(engine.live_heap_objects(), 0);
}

#[test]
fn deep_recursion_overflows_cleanly() {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    let err = engine
        .evaluate_with_print("def f() { return f(); } f();", &mut print)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StackOverflow);
    // Still usable afterwards.
    engine.evaluate_with_print("println(1);", &mut print).unwrap();
    assert_eq!(print.output(), "1\n");
}

#[test]
fn error_rendering_includes_position_for_parse_errors() {
    let mut engine = Engine::new();
    let err = engine.evaluate("let a = ;").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.starts_with("error: "), "got: {rendered}");
    assert!(rendered.contains("(1:"), "got: {rendered}");
}
