use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use ahash::AHashSet;

use crate::{
    dispatch::DispatchTable,
    error::{Error, RunResult},
    eval::Evaluator,
    heap::Heap,
    io::{PrintWriter, StdPrint},
    libraries::{ArrayLib, FileLib, IoLib, Library, Registrar, StringLib},
    machine::{Limits, Machine},
    native::NativeCtx,
    object::Object,
    parse::parse,
    types::TypeRegistry,
    value::Value,
};

/// Bookkeeping for `@import`: which modules have loaded, and which imports
/// are currently in progress (for cycle detection).
#[derive(Debug, Default)]
pub(crate) struct ImportState {
    pub loaded: AHashSet<String>,
    pub in_progress: Vec<String>,
}

/// The embeddable interpreter engine.
///
/// An engine owns all interpreter state: the call/scope machine, the heap,
/// the type registry, the dispatch table, and import bookkeeping. It can be
/// fed source repeatedly (REPL style) or once for a whole file; top-level
/// state persists across `evaluate` calls. Engines share nothing: a host
/// may run one engine per thread.
///
/// # Example
/// ```
/// use rill::{CollectStringPrint, Engine};
///
/// let mut engine = Engine::new();
/// let mut print = CollectStringPrint::new();
/// engine.evaluate_with_print("let a = 1 + 2 * 3; println(a);", &mut print).unwrap();
/// assert_eq!(print.output(), "7\n");
/// ```
pub struct Engine {
    machine: Machine,
    heap: Heap,
    types: TypeRegistry,
    dispatch: DispatchTable,
    imports: ImportState,
    libraries: Vec<Rc<dyn Library>>,
    import_dir: PathBuf,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with default machine limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Creates an engine with explicit machine limits.
    #[must_use]
    pub fn with_limits(limits: Limits) -> Self {
        let mut engine = Self {
            machine: Machine::new(limits),
            heap: Heap::new(),
            types: TypeRegistry::new(),
            dispatch: DispatchTable::new(),
            imports: ImportState::default(),
            libraries: Vec::new(),
            import_dir: PathBuf::from("."),
        };
        engine.install_core();
        engine
    }

    /// Registers the engine's own natives and the shipped libraries.
    /// `io`, `array`, and `string` load immediately; `file` waits for
    /// `@import file`.
    fn install_core(&mut self) {
        self.register_function("is_empty", &["any"], |ctx| {
            Ok(Some(Value::Bool(matches!(ctx.arg(0), Value::Empty))))
        })
        .expect("builtin registration cannot collide");

        self.libraries.push(Rc::new(IoLib));
        self.libraries.push(Rc::new(ArrayLib));
        self.libraries.push(Rc::new(StringLib));
        self.libraries.push(Rc::new(FileLib));
        for name in ["io", "array", "string"] {
            self.load_library(name).expect("core library loads on a fresh engine");
        }
    }

    fn load_library(&mut self, name: &str) -> Result<(), Error> {
        let Some(lib) = self.libraries.iter().find(|lib| lib.name() == name).cloned() else {
            return Err(Error::host(format!("no library named '{name}'")));
        };
        let mut registrar = Registrar {
            dispatch: &mut self.dispatch,
            types: &mut self.types,
        };
        lib.load(&mut registrar)?;
        self.imports.loaded.insert(name.to_owned());
        Ok(())
    }

    /// Directory searched for `NAME.sl` files by `@import`. Defaults to
    /// the process working directory.
    pub fn set_import_dir(&mut self, dir: impl Into<PathBuf>) {
        self.import_dir = dir.into();
    }

    /// Makes a library available to `@import NAME`. The library loads on
    /// first import.
    pub fn register_library(&mut self, lib: Rc<dyn Library>) {
        self.libraries.push(lib);
    }

    /// Registers a native function. Parameter types are declared by name
    /// (`any` for untyped); the signature id is built from them and every
    /// named type must already be registered.
    pub fn register_function(
        &mut self,
        name: &str,
        param_types: &[&str],
        f: impl Fn(&mut NativeCtx<'_>) -> RunResult<Option<Value>> + 'static,
    ) -> Result<(), Error> {
        Registrar {
            dispatch: &mut self.dispatch,
            types: &mut self.types,
        }
        .register_function(name, param_types, f)
    }

    /// Associates a host type with a name in the registry and registers a
    /// `make_NAME` constructor wrapping `T::default()`.
    pub fn register_type<T: Default + 'static>(&mut self, name: &str, parent: Option<&str>) -> Result<(), Error> {
        Registrar {
            dispatch: &mut self.dispatch,
            types: &mut self.types,
        }
        .register_type::<T>(name, parent)
    }

    /// Parses and executes a program, printing to stdout.
    pub fn evaluate(&mut self, source: &str) -> Result<(), Error> {
        self.evaluate_with_print(source, &mut StdPrint)
    }

    /// Parses and executes a program with a custom print writer.
    ///
    /// The whole source is parsed before anything runs. On error the
    /// machine is restored to the start of the failing statement, so the
    /// engine stays usable; state from completed statements persists.
    pub fn evaluate_with_print(&mut self, source: &str, print: &mut impl PrintWriter) -> Result<(), Error> {
        let program = parse(source)?;
        for stmt in &program {
            let baseline = self.machine.baseline();
            let result = {
                let Self {
                    machine,
                    heap,
                    types,
                    dispatch,
                    imports,
                    libraries,
                    import_dir,
                } = self;
                let mut evaluator = Evaluator {
                    machine,
                    heap,
                    types,
                    dispatch,
                    imports,
                    libraries: libraries.as_slice(),
                    import_dir: import_dir.as_path(),
                    print: &mut *print,
                };
                evaluator.eval_stmt(stmt)
            };
            if let Err(e) = result {
                self.machine.unwind_to(baseline, &mut self.heap);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Dispatches a named function from host code, using the same calling
    /// convention as in-language call sites. Prints to stdout.
    pub fn invoke(&mut self, name: &str, args: Vec<Object>) -> Result<Object, Error> {
        self.invoke_with_print(name, args, &mut StdPrint)
    }

    /// Like [`Engine::invoke`] with a custom print writer.
    pub fn invoke_with_print(
        &mut self,
        name: &str,
        args: Vec<Object>,
        print: &mut impl PrintWriter,
    ) -> Result<Object, Error> {
        let baseline = self.machine.baseline();
        match self.invoke_inner(name, args, print) {
            Ok(object) => Ok(object),
            Err(e) => {
                self.machine.unwind_to(baseline, &mut self.heap);
                Err(e)
            }
        }
    }

    fn invoke_inner(&mut self, name: &str, args: Vec<Object>, print: &mut impl PrintWriter) -> Result<Object, Error> {
        self.machine.push(Value::Empty, &mut self.heap)?;
        let argc = args.len();
        for object in args {
            let value = object.into_value(&mut self.heap);
            self.machine.push(value, &mut self.heap)?;
        }
        {
            let Self {
                machine,
                heap,
                types,
                dispatch,
                imports,
                libraries,
                import_dir,
            } = self;
            let mut evaluator = Evaluator {
                machine,
                heap,
                types,
                dispatch,
                imports,
                libraries: libraries.as_slice(),
                import_dir: import_dir.as_path(),
                print: &mut *print,
            };
            evaluator.call_function(name, argc)?;
        }
        let value = self.machine.pop()?;
        Ok(Object::from_value(value, &mut self.heap))
    }

    /// The import directory currently in effect.
    #[must_use]
    pub fn import_dir(&self) -> &Path {
        self.import_dir.as_path()
    }

    /// The user-visible name a host type was registered under, resolved
    /// from its native tag.
    pub fn native_type_name<T: 'static>(&self) -> Result<&str, Error> {
        self.types.translate_native_tag(std::any::TypeId::of::<T>())
    }

    /// Number of live heap containers; a diagnostic for leak checks.
    #[must_use]
    pub fn live_heap_objects(&self) -> usize {
        self.heap.live_objects()
    }
}
