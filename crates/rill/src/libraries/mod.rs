//! Native libraries shipped with the engine, registered through the same
//! surface hosts use.

use std::{any::TypeId, rc::Rc};

use crate::{
    dispatch::{Callable, DispatchTable, FnDef, signature_id},
    error::{Error, RunResult},
    native::NativeCtx,
    types::TypeRegistry,
    value::Value,
};

mod array;
mod file;
mod io;
mod string;

pub(crate) use array::ArrayLib;
pub(crate) use file::FileLib;
pub(crate) use io::IoLib;
pub(crate) use string::StringLib;

/// A loadable set of native functions and types.
///
/// Libraries resolve `@import NAME`: a registered library loads once, on
/// first import (or at engine construction for the core set).
pub trait Library {
    /// The name the library is imported under.
    fn name(&self) -> &str;

    /// Registers the library's functions and types.
    fn load(&self, reg: &mut Registrar<'_>) -> Result<(), Error>;
}

/// Registration surface handed to libraries and hosts.
///
/// Parameter types are declared explicitly by name; the registrar builds
/// the signature id and validates every named type against the registry.
pub struct Registrar<'a> {
    pub(crate) dispatch: &'a mut DispatchTable,
    pub(crate) types: &'a mut TypeRegistry,
}

impl Registrar<'_> {
    /// Registers a native function under `name` with the given parameter
    /// type names (use `any` for untyped parameters).
    pub fn register_function(
        &mut self,
        name: &str,
        param_types: &[&str],
        f: impl Fn(&mut NativeCtx<'_>) -> RunResult<Option<Value>> + 'static,
    ) -> Result<(), Error> {
        let def = FnDef {
            id: signature_id(name, param_types),
            name: name.to_owned(),
            param_types: param_types.iter().map(|s| (*s).to_owned()).collect(),
            callable: Callable::Native(Rc::new(f)),
        };
        self.dispatch.register(self.types, def)
    }

    /// Registers a host type under `name`, along with a `make_NAME`
    /// constructor wrapping `T::default()`.
    pub fn register_type<T: Default + 'static>(&mut self, name: &str, parent: Option<&str>) -> Result<(), Error> {
        self.types.register_native(name, parent, TypeId::of::<T>())?;
        let type_name = name.to_owned();
        self.register_function(&format!("make_{name}"), &[], move |ctx| {
            Ok(Some(ctx.new_native(&type_name, T::default())))
        })
    }
}
