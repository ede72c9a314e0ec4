//! `@import` resolution: registered libraries, `.sl` files from the
//! import directory, idempotent re-import, and cycle detection.

use std::{fs, path::PathBuf};

use pretty_assertions::assert_eq;
use rill::{CollectStringPrint, Engine, ErrorKind};

/// Creates a per-test scratch directory for module files.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rill-import-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

#[test]
fn import_runs_a_module_file_in_the_top_level_context() {
    let dir = scratch("module");
    fs::write(dir.join("helpers.sl"), "def triple(n is number) { return n * 3; } let base = 10;").unwrap();

    let mut engine = Engine::new();
    engine.set_import_dir(&dir);
    let mut print = CollectStringPrint::new();
    engine
        .evaluate_with_print("@import helpers println(triple(base + 4));", &mut print)
        .unwrap();
    assert_eq!(print.output(), "42\n");
}

#[test]
fn reimport_is_a_no_op() {
    let dir = scratch("reimport");
    fs::write(dir.join("once.sl"), "println(\"loaded\");").unwrap();

    let mut engine = Engine::new();
    engine.set_import_dir(&dir);
    let mut print = CollectStringPrint::new();
    engine
        .evaluate_with_print("@import once @import once", &mut print)
        .unwrap();
    engine.evaluate_with_print("@import once", &mut print).unwrap();
    assert_eq!(print.output(), "loaded\n");
}

#[test]
fn missing_module_fails() {
    let dir = scratch("missing");
    let mut engine = Engine::new();
    engine.set_import_dir(&dir);
    let err = engine.evaluate("@import nowhere").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModuleNotFound);
}

#[test]
fn self_import_is_cyclical() {
    let dir = scratch("selfcycle");
    fs::write(dir.join("narcissus.sl"), "@import narcissus").unwrap();

    let mut engine = Engine::new();
    engine.set_import_dir(&dir);
    let err = engine.evaluate("@import narcissus").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicalImport);
}

#[test]
fn mutual_imports_are_cyclical() {
    let dir = scratch("mutualcycle");
    fs::write(dir.join("alpha.sl"), "@import beta").unwrap();
    fs::write(dir.join("beta.sl"), "@import alpha").unwrap();

    let mut engine = Engine::new();
    engine.set_import_dir(&dir);
    let err = engine.evaluate("@import alpha").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicalImport);
}

#[test]
fn core_libraries_are_preloaded_and_reimportable() {
    let mut engine = Engine::new();
    let mut print = CollectStringPrint::new();
    engine
        .evaluate_with_print("@import io @import array println(\"still here\");", &mut print)
        .unwrap();
    assert_eq!(print.output(), "still here\n");
}

#[test]
fn file_library_loads_on_import() {
    let dir = scratch("filelib");
    fs::write(dir.join("data.txt"), "contents here").unwrap();

    let mut engine = Engine::new();
    engine.set_import_dir(&dir);
    let mut print = CollectStringPrint::new();

    // Not available before the import.
    let err = engine
        .evaluate_with_print("let f = open_f(\"x\");", &mut print)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMatchingFunction);

    let path = dir.join("data.txt");
    let source = format!(
        "@import file let f = open_f(\"{}\"); println(read_f(f)); close_f(f);",
        path.display()
    );
    engine.evaluate_with_print(&source, &mut print).unwrap();
    assert_eq!(print.output(), "contents here\n");
}

#[test]
fn module_parse_errors_propagate() {
    let dir = scratch("badmodule");
    fs::write(dir.join("broken.sl"), "let a = ;").unwrap();

    let mut engine = Engine::new();
    engine.set_import_dir(&dir);
    let err = engine.evaluate("@import broken").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);

    // A failed import is not marked loaded; fixing the file lets the
    // same name import afterwards.
    fs::write(dir.join("broken.sl"), "let a = 1;").unwrap();
    engine.evaluate("@import broken").unwrap();
}
