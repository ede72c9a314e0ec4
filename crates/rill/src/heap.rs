use std::cell::Cell;

use indexmap::IndexMap;

use crate::{native::NativeValue, value::Value};

/// Unique identifier for a container stored inside the heap arena.
///
/// A `HeapId` is only meaningful together with the heap that issued it.
/// Copying a `HeapId` does not affect reference counts; use
/// [`Value::clone_with_heap`](crate::Value) for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A user-defined object instance: a type tag plus its member values in
/// declaration order.
#[derive(Debug)]
pub(crate) struct Instance {
    pub type_name: String,
    pub members: IndexMap<String, Value>,
}

/// Container data stored in the heap arena.
///
/// These are the reference-semantic values of the language: assignment and
/// argument passing copy the handle, never the data, so mutation through any
/// alias is visible to all aliases.
#[derive(Debug)]
pub(crate) enum HeapData {
    /// Keyed record; field order is insertion order and is observable.
    Blob(IndexMap<String, Value>),
    /// Ordered, indexable sequence.
    Array(Vec<Value>),
    /// User-defined object instance.
    Instance(Instance),
    /// Host-owned object implementing the native capability.
    Native(Box<dyn NativeValue>),
}

/// One arena slot: the container data plus its reference count.
///
/// The count lives in a `Cell` so that taking a new reference
/// (`inc_ref`) only needs shared access to the heap.
#[derive(Debug)]
struct HeapEntry {
    data: HeapData,
    refs: Cell<usize>,
}

/// Arena storage for all reference-semantic values of one engine.
///
/// Instead of handing out shared pointers, containers live in a central
/// arena and values address them by index. Reference counting is explicit:
/// every `Value::Ref` alias owns one count, taken with `inc_ref` and
/// released with `dec_ref` (normally through `Value::clone_with_heap` and
/// `Value::drop_with_heap`). When the count reaches zero the slot is
/// recycled through a free list and the children of the dropped container
/// are released recursively.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    slots: Vec<Option<HeapEntry>>,
    free_list: Vec<HeapId>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` in the arena and returns its id, with a reference
    /// count of one owned by the caller.
    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let entry = HeapEntry {
            data,
            refs: Cell::new(1),
        };
        if let Some(id) = self.free_list.pop() {
            self.slots[id.index()] = Some(entry);
            id
        } else {
            let id = HeapId(self.slots.len());
            self.slots.push(Some(entry));
            id
        }
    }

    pub fn alloc_blob(&mut self) -> HeapId {
        self.allocate(HeapData::Blob(IndexMap::new()))
    }

    pub fn alloc_array(&mut self, values: Vec<Value>) -> HeapId {
        self.allocate(HeapData::Array(values))
    }

    pub fn alloc_instance(&mut self, type_name: String) -> HeapId {
        self.allocate(HeapData::Instance(Instance {
            type_name,
            members: IndexMap::new(),
        }))
    }

    pub fn alloc_native(&mut self, native: Box<dyn NativeValue>) -> HeapId {
        self.allocate(HeapData::Native(native))
    }

    /// Gets the data for a heap id.
    ///
    /// # Panics
    /// Panics if the slot was already freed; that indicates a reference
    /// counting bug, not a user error.
    pub fn get(&self, id: HeapId) -> &HeapData {
        self.slots[id.index()]
            .as_ref()
            .map(|entry| &entry.data)
            .expect("heap slot read after free")
    }

    /// Gets mutable data for a heap id.
    ///
    /// # Panics
    /// Panics if the slot was already freed.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        self.slots[id.index()]
            .as_mut()
            .map(|entry| &mut entry.data)
            .expect("heap slot written after free")
    }

    /// Takes an additional reference to a slot.
    pub fn inc_ref(&self, id: HeapId) {
        let entry = self.slots[id.index()]
            .as_ref()
            .expect("heap slot referenced after free");
        entry.refs.set(entry.refs.get() + 1);
    }

    /// Releases one reference to a slot.
    ///
    /// When the last reference is released the slot is freed, its id is
    /// recycled, and the children of the dropped container are released
    /// recursively.
    pub fn dec_ref(&mut self, id: HeapId) {
        let entry = self.slots[id.index()]
            .as_ref()
            .expect("heap slot released after free");
        let refs = entry.refs.get();
        if refs > 1 {
            entry.refs.set(refs - 1);
            return;
        }
        let entry = self.slots[id.index()].take().expect("heap slot released after free");
        self.free_list.push(id);
        match entry.data {
            HeapData::Blob(map) => {
                for (_, value) in map {
                    value.drop_with_heap(self);
                }
            }
            HeapData::Array(values) => {
                for value in values {
                    value.drop_with_heap(self);
                }
            }
            HeapData::Instance(instance) => {
                for (_, value) in instance.members {
                    value.drop_with_heap(self);
                }
            }
            HeapData::Native(_) => {}
        }
    }

    /// Number of live containers, for diagnostics and leak checks.
    pub fn live_objects(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}
