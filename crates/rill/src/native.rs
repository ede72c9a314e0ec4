use std::{any::Any, fmt, rc::Rc};

use crate::{
    error::{Error, RunResult},
    heap::{Heap, HeapData},
    io::PrintWriter,
    machine::Machine,
    value::Value,
};

/// The native capability: a host-owned object that can live on the heap as a
/// language value.
///
/// A native reports the user-visible name of its registered type, answers
/// convertibility queries against a target type name, and exposes typed
/// access to the underlying datum through `Any`.
pub trait NativeValue: Any {
    /// The registered type name this object dispatches under.
    fn type_name(&self) -> &str;

    /// Whether this object can stand in for the given target type name.
    fn is_convertible(&self, _target: &str) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl fmt::Debug for dyn NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.type_name())
    }
}

/// Adapter wrapping an arbitrary host value as a [`NativeValue`].
///
/// This is the standard carrier for host types registered with
/// [`Engine::register_type`](crate::Engine::register_type): the wrapped value
/// is reached from native functions via
/// [`NativeCtx::native_mut`].
#[derive(Debug)]
pub struct NativeRef<T: 'static> {
    type_name: String,
    value: T,
}

impl<T: 'static> NativeRef<T> {
    pub fn new(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: 'static> NativeValue for NativeRef<T> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The callable type native functions are stored as.
pub(crate) type NativeFn = Rc<dyn Fn(&mut NativeCtx<'_>) -> RunResult<Option<Value>>>;

/// Typed access to a native function's call site.
///
/// Arguments are addressed by declared position (0-based, left to right) and
/// are guaranteed by dispatch to satisfy the parameter types the function was
/// registered with, so the typed accessors only fail when a parameter was
/// declared `any` and the value has a different tag.
pub struct NativeCtx<'a> {
    pub(crate) machine: &'a mut Machine,
    pub(crate) heap: &'a mut Heap,
    pub(crate) print: &'a mut dyn PrintWriter,
    pub(crate) args_base: usize,
    pub(crate) arity: usize,
}

impl NativeCtx<'_> {
    /// Number of arguments at this call site.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.arity
    }

    /// The argument at declared position `i`.
    ///
    /// # Panics
    /// Panics when `i` is out of range; that is a host programming error,
    /// not a script error.
    #[must_use]
    pub fn arg(&self, i: usize) -> &Value {
        assert!(i < self.arity, "native argument index {i} out of range");
        self.machine.slot(self.args_base + i)
    }

    /// The argument at position `i` as a number.
    pub fn number(&self, i: usize) -> RunResult<f64> {
        match self.arg(i) {
            Value::Number(n) => Ok(*n),
            other => Err(Error::bad_cast(format!(
                "expected a number argument, got {}",
                other.type_name(self.heap)
            ))),
        }
    }

    /// The argument at position `i` as a string slice.
    pub fn text(&self, i: usize) -> RunResult<&str> {
        match self.arg(i) {
            Value::Text(s) => Ok(s.as_str()),
            other => Err(Error::bad_cast(format!(
                "expected a string argument, got {}",
                other.type_name(self.heap)
            ))),
        }
    }

    /// The argument at position `i` as a bool.
    pub fn boolean(&self, i: usize) -> RunResult<bool> {
        match self.arg(i) {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::bad_cast(format!(
                "expected a bool argument, got {}",
                other.type_name(self.heap)
            ))),
        }
    }

    /// The argument at position `i`, coerced to bool.
    #[must_use]
    pub fn truthy(&self, i: usize) -> bool {
        self.arg(i).truthy()
    }

    /// The argument at position `i`, coerced to its string rendering.
    #[must_use]
    pub fn display(&self, i: usize) -> String {
        self.arg(i).to_text(self.heap)
    }

    /// Duplicates the argument at position `i`, taking a container
    /// reference where one is held.
    #[must_use]
    pub fn clone_arg(&self, i: usize) -> Value {
        self.arg(i).clone_with_heap(self.heap)
    }

    /// Releases a value the native no longer needs.
    pub fn drop_value(&mut self, value: Value) {
        value.drop_with_heap(self.heap);
    }

    /// The argument at position `i` as an array slice.
    pub fn array(&self, i: usize) -> RunResult<&[Value]> {
        match self.arg(i) {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Array(values) => Ok(values.as_slice()),
                _ => Err(Error::bad_cast("expected an array argument")),
            },
            _ => Err(Error::bad_cast("expected an array argument")),
        }
    }

    /// Mutable access to the array argument at position `i`.
    ///
    /// Values moved into the array must own their container references
    /// (use [`NativeCtx::clone_arg`] rather than moving a borrowed value).
    pub fn array_mut(&mut self, i: usize) -> RunResult<&mut Vec<Value>> {
        let id = match self.arg(i) {
            Value::Ref(id) => *id,
            _ => return Err(Error::bad_cast("expected an array argument")),
        };
        match self.heap.get_mut(id) {
            HeapData::Array(values) => Ok(values),
            _ => Err(Error::bad_cast("expected an array argument")),
        }
    }

    /// Mutable access to the host datum wrapped by the native argument at
    /// position `i`.
    pub fn native_mut<T: 'static>(&mut self, i: usize) -> RunResult<&mut T> {
        let id = match self.arg(i) {
            Value::Ref(id) => *id,
            _ => return Err(Error::bad_cast("expected a native argument")),
        };
        match self.heap.get_mut(id) {
            HeapData::Native(native) => native
                .as_any_mut()
                .downcast_mut::<NativeRef<T>>()
                .map(NativeRef::value_mut)
                .ok_or_else(|| Error::bad_cast("native argument has a different host type")),
            _ => Err(Error::bad_cast("expected a native argument")),
        }
    }

    /// Allocates a new array value owned by the caller.
    pub fn new_array(&mut self, values: Vec<Value>) -> Value {
        Value::Ref(self.heap.alloc_array(values))
    }

    /// Allocates a new blob value owned by the caller.
    pub fn new_blob(&mut self, fields: Vec<(String, Value)>) -> Value {
        let id = self.heap.alloc_blob();
        if let HeapData::Blob(map) = self.heap.get_mut(id) {
            for (name, value) in fields {
                map.insert(name, value);
            }
        }
        Value::Ref(id)
    }

    /// Allocates a new native value wrapping a host datum.
    pub fn new_native<T: 'static>(&mut self, type_name: &str, value: T) -> Value {
        let native = NativeRef::new(type_name, value);
        Value::Ref(self.heap.alloc_native(Box::new(native)))
    }

    /// The print writer for this evaluation.
    pub fn print(&mut self) -> &mut dyn PrintWriter {
        &mut *self.print
    }
}
