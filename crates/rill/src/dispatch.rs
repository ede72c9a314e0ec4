use std::rc::Rc;

use ahash::AHashMap;

use crate::{
    error::{Error, ErrorKind, RunResult},
    expressions::Stmt,
    native::NativeFn,
    types::TypeRegistry,
};

/// A user-defined function body: parameter names plus the statement tree to
/// run, shared so a call can execute it without holding the table borrow.
#[derive(Debug)]
pub(crate) struct ScriptFn {
    pub params: Vec<String>,
    pub body: Rc<Stmt>,
}

/// The invocable body of a registered function.
#[derive(Clone)]
pub(crate) enum Callable {
    Script(Rc<ScriptFn>),
    Native(NativeFn),
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Script(_) => f.write_str("Callable::Script"),
            Self::Native(_) => f.write_str("Callable::Native"),
        }
    }
}

/// A registered function: its signature id (the lookup key), bare name,
/// declared parameter type names, and body.
#[derive(Debug)]
pub(crate) struct FnDef {
    pub id: String,
    pub name: String,
    pub param_types: Vec<String>,
    pub callable: Callable,
}

/// Formats the signature id a function is registered under: the bare name
/// followed by the comma-separated parameter type names in parentheses.
pub(crate) fn signature_id<S: AsRef<str>>(name: &str, param_types: &[S]) -> String {
    let mut id = String::with_capacity(name.len() + 2 + param_types.len() * 8);
    id.push_str(name);
    id.push('(');
    for (i, t) in param_types.iter().enumerate() {
        if i > 0 {
            id.push(',');
        }
        id.push_str(t.as_ref());
    }
    id.push(')');
    id
}

/// Registry of functions keyed by signature id, with overload resolution.
#[derive(Debug, Default)]
pub(crate) struct DispatchTable {
    functions: AHashMap<String, FnDef>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function definition.
    ///
    /// Every declared parameter type must already exist in the registry, and
    /// the signature id must be unused.
    pub fn register(&mut self, types: &TypeRegistry, def: FnDef) -> RunResult<()> {
        for t in &def.param_types {
            if types.lookup(t).is_none() {
                return Err(Error::unknown_type(t));
            }
        }
        if self.functions.contains_key(&def.id) {
            return Err(Error::new(
                ErrorKind::DuplicateFunction,
                format!("function '{}' already defined", def.id),
            ));
        }
        self.functions.insert(def.id.clone(), def);
        Ok(())
    }

    /// Resolves a call from its name and the runtime argument type names.
    ///
    /// An exact signature match dominates, keeping monomorphic dispatch
    /// cheap and deterministic; otherwise every function whose bare name and
    /// arity match and whose declared parameter types each subsume the
    /// argument types is a candidate. Exactly one candidate wins; the scan
    /// is over the whole table, so the outcome does not depend on
    /// registration order.
    pub fn lookup<S: AsRef<str>>(&self, types: &TypeRegistry, name: &str, arg_types: &[S]) -> RunResult<&FnDef> {
        let id = signature_id(name, arg_types);
        if let Some(def) = self.functions.get(&id) {
            return Ok(def);
        }

        let mut candidates = Vec::new();
        for def in self.functions.values() {
            if def.name != name || def.param_types.len() != arg_types.len() {
                continue;
            }
            let mut matches = true;
            for (arg, param) in arg_types.iter().zip(&def.param_types) {
                if !types.is_a(arg.as_ref(), param)? {
                    matches = false;
                    break;
                }
            }
            if matches {
                candidates.push(def);
            }
        }

        match candidates.len() {
            1 => Ok(candidates[0]),
            0 => Err(Error::new(
                ErrorKind::NoMatchingFunction,
                format!("no matching function found: '{id}'"),
            )),
            _ => Err(Error::new(
                ErrorKind::AmbiguousCall,
                format!("ambiguous function call: '{id}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_noop() -> Callable {
        Callable::Native(Rc::new(|_| Ok(None)))
    }

    fn def(name: &str, param_types: &[&str]) -> FnDef {
        FnDef {
            id: signature_id(name, param_types),
            name: name.to_owned(),
            param_types: param_types.iter().map(|s| (*s).to_owned()).collect(),
            callable: native_noop(),
        }
    }

    #[test]
    fn signature_id_format() {
        assert_eq!(signature_id::<&str>("foo", &[]), "foo()");
        assert_eq!(signature_id("add", &["number", "number"]), "add(number,number)");
    }

    #[test]
    fn exact_match_dominates() {
        let types = TypeRegistry::new();
        let mut table = DispatchTable::new();
        table.register(&types, def("f", &["any"])).unwrap();
        table.register(&types, def("f", &["number"])).unwrap();

        let found = table.lookup(&types, "f", &["number"]).unwrap();
        assert_eq!(found.id, "f(number)");
        let found = table.lookup(&types, "f", &["string"]).unwrap();
        assert_eq!(found.id, "f(any)");
    }

    #[test]
    fn duplicate_signature_rejected() {
        let types = TypeRegistry::new();
        let mut table = DispatchTable::new();
        table.register(&types, def("f", &["any"])).unwrap();
        let err = table.register(&types, def("f", &["any"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateFunction);
    }

    #[test]
    fn unknown_parameter_type_rejected() {
        let types = TypeRegistry::new();
        let mut table = DispatchTable::new();
        let err = table.register(&types, def("f", &["ghost"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn inheritance_fallback_and_ambiguity() {
        let mut types = TypeRegistry::new();
        types.register_user("vehicle", None, Vec::new()).unwrap();
        types.register_user("bike", Some("vehicle"), Vec::new()).unwrap();

        let mut table = DispatchTable::new();
        table.register(&types, def("describe", &["vehicle"])).unwrap();
        let found = table.lookup(&types, "describe", &["bike"]).unwrap();
        assert_eq!(found.id, "describe(vehicle)");

        // A second subsuming overload with no exact match is ambiguous.
        table.register(&types, def("describe", &["any"])).unwrap();
        let err = table.lookup(&types, "describe", &["bike"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousCall);

        let err = table.lookup(&types, "describe", &["bike", "bike"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoMatchingFunction);
    }
}
