//! Overload resolution through the engine: exact signatures, inheritance
//! fallback, ambiguity, and duplicate registration.

use pretty_assertions::assert_eq;
use rill::{CollectStringPrint, Engine, ErrorKind};

fn run(source: &str) -> String {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    engine
        .evaluate_with_print(source, &mut print)
        .unwrap_or_else(|e| panic!("program failed: {e}"));
    print.into_output()
}

fn run_err(source: &str) -> ErrorKind {
    Engine::new()
        .evaluate_with_print(source, &mut CollectStringPrint::new())
        .expect_err("program should have failed")
        .kind()
}

#[test]
fn exact_signature_beats_fallback() {
    let source = "
        def f(x) { return \"any\"; }
        def f(x is number) { return \"number\"; }
        println(f(1));
        println(f(\"s\"));
    ";
    assert_eq!(run(source), "number\nany\n");
}

#[test]
fn overloads_by_arity() {
    let source = "
        def f(x) { return 1; }
        def f(x, y) { return 2; }
        println(f(0));
        println(f(0, 0));
    ";
    assert_eq!(run(source), "1\n2\n");
}

#[test]
fn inheritance_subsumption() {
    // A function declared on the parent resolves for a child argument
    // when no child-specialized overload exists.
    let source = "
        object vehicle { wheels = 4; }
        object bike inherits vehicle { wheels = 2; }
        object tandem inherits bike { seats = 2; }
        def wheels(v is vehicle) { return v.wheels; }
        println(wheels(new tandem {}));
    ";
    assert_eq!(run(source), "2\n");
}

#[test]
fn child_specialization_wins_exactly() {
    let source = "
        object vehicle { }
        object bike inherits vehicle { }
        def kind(v is vehicle) { return \"vehicle\"; }
        def kind(v is bike) { return \"bike\"; }
        println(kind(new bike {}));
        println(kind(new vehicle {}));
    ";
    assert_eq!(run(source), "bike\nvehicle\n");
}

#[test]
fn ambiguous_call_is_an_error() {
    let source = "
        object vehicle { }
        object bike inherits vehicle { }
        def f(v is vehicle) { return 1; }
        def f(v is any) { return 2; }
        f(new bike {});
    ";
    assert_eq!(run_err(source), ErrorKind::AmbiguousCall);
}

#[test]
fn selection_does_not_depend_on_registration_order() {
    for source in [
        "object vehicle { }
         object bike inherits vehicle { }
         def f(v is vehicle) { return \"v\"; }
         def f(v is bike) { return \"b\"; }
         println(f(new bike {}));",
        "object vehicle { }
         object bike inherits vehicle { }
         def f(v is bike) { return \"b\"; }
         def f(v is vehicle) { return \"v\"; }
         println(f(new bike {}));",
    ] {
        assert_eq!(run(source), "b\n");
    }
}

#[test]
fn duplicate_signature_is_an_error() {
    assert_eq!(run_err("def g(x) { } def g(y) { }"), ErrorKind::DuplicateFunction);
}

#[test]
fn unknown_parameter_type_is_an_error() {
    assert_eq!(run_err("def f(x is ghost) { }"), ErrorKind::UnknownType);
}

#[test]
fn unknown_instance_type_is_an_error() {
    assert_eq!(run_err("let v = new ghost {};"), ErrorKind::UnknownType);
}

#[test]
fn no_matching_function_by_arity() {
    assert_eq!(run_err("def f(x) { } f(1, 2);"), ErrorKind::NoMatchingFunction);
}

#[test]
fn no_matching_function_by_type() {
    let source = "
        object vehicle { }
        def f(v is vehicle) { }
        f(5);
    ";
    assert_eq!(run_err(source), ErrorKind::NoMatchingFunction);
}

#[test]
fn builtin_type_names_participate() {
    let source = "
        def show(b is blob) { return \"blob\"; }
        def show(a is array) { return \"array\"; }
        def show(s is string) { return \"string\"; }
        def show(n is number) { return \"number\"; }
        def show(v is bool) { return \"bool\"; }
        def show(e is empty) { return \"empty\"; }
        println(show(new {}));
        println(show(new []));
        println(show(\"x\"));
        println(show(1));
        println(show(1 == 1));
        let nothing;
        println(show(nothing));
    ";
    assert_eq!(run(source), "blob\narray\nstring\nnumber\nbool\nempty\n");
}

#[test]
fn duplicate_type_registration_is_an_error() {
    assert_eq!(run_err("object a { } object a { }"), ErrorKind::TypeExists);
}

#[test]
fn parent_must_exist_before_child() {
    assert_eq!(run_err("object bike inherits vehicle { }"), ErrorKind::UnknownType);
}
