//! rill — an embeddable interpreter for a small dynamically-typed
//! scripting language.
//!
//! A host instantiates an [`Engine`], optionally registers native functions
//! and native types, then feeds it source text. The engine returns control
//! after each evaluation and can be driven repeatedly (REPL style) or once
//! for a whole file.
//!
//! ```
//! use rill::{CollectStringPrint, Engine};
//!
//! let mut engine = Engine::new();
//! let mut print = CollectStringPrint::new();
//! engine
//!     .evaluate_with_print(
//!         "def add(x, y) { return x + y; } println(add(2, 40));",
//!         &mut print,
//!     )
//!     .unwrap();
//! assert_eq!(print.output(), "42\n");
//! ```

mod dispatch;
mod engine;
mod error;
mod eval;
mod expressions;
mod heap;
mod io;
mod lexer;
mod libraries;
mod machine;
mod native;
mod object;
mod parse;
mod types;
mod value;

pub use crate::{
    engine::Engine,
    error::{Error, ErrorKind, RunResult},
    heap::HeapId,
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    lexer::Pos,
    libraries::{Library, Registrar},
    machine::Limits,
    native::{NativeCtx, NativeRef, NativeValue},
    object::Object,
    value::Value,
};
