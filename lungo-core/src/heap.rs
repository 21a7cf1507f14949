// lungo-core - Heap arena and garbage collector
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The object heap: an arena of slots threaded into a heap list, with
//! allocation accounting and a non-moving mark-and-sweep collector.
//!
//! Objects are addressed by index handles and never move. Every live
//! object is a node of a singly linked list in allocation order, rooted at
//! [`Heap::head`]; the sweep phase walks that list, unlinking and freeing
//! unmarked nodes. Freed slots are recycled through a free list.
//!
//! `bytes_allocated` tracks the slot footprint plus the capacity of every
//! internal buffer grown through the heap. Mutating entry points are
//! paired with a growth check on the runtime side: when the accounted
//! bytes reach `next_gc` and collection is enabled, a full cycle runs
//! before the growth is satisfied, and afterwards the threshold is reset
//! to twice the surviving bytes (with a small floor).

use std::mem;

use crate::object::{
    ByteString, Function, FunctionRef, MapRef, NativeFunction, NativeRef, ObjRef, Object,
    StringRef, Table,
};
use crate::value::Value;

/// Lower bound for the collection threshold.
const GC_FLOOR: usize = 128;

/// One arena slot: the object plus its GC header.
#[derive(Debug)]
struct Slot {
    marked: bool,
    next: Option<ObjRef>,
    object: Object,
}

/// The object heap.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free: Vec<u32>,
    head: Option<ObjRef>,
    bytes_allocated: usize,
    next_gc: usize,
    enabled: bool,
}

impl Heap {
    /// Create an empty heap with collection disabled (enabled once the
    /// runtime finishes bootstrapping its root maps).
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            bytes_allocated: 0,
            next_gc: GC_FLOOR,
            enabled: false,
        }
    }

    /// Enable allocation-triggered collection.
    pub fn enable_gc(&mut self) {
        self.enabled = true;
    }

    /// Whether the accounting threshold has been reached and collection
    /// may run.
    pub(crate) fn should_collect(&self) -> bool {
        self.enabled && self.bytes_allocated >= self.next_gc
    }

    /// Total bytes currently accounted to live objects.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    fn alloc(&mut self, object: Object) -> ObjRef {
        let size = mem::size_of::<Slot>() + object.buffer_bytes();
        let slot = Slot {
            marked: false,
            next: self.head,
            object,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                (self.slots.len() - 1) as u32
            }
        };
        self.bytes_allocated += size;
        let reference = ObjRef(index);
        self.head = Some(reference);
        reference
    }

    pub(crate) fn alloc_string(&mut self, string: ByteString) -> StringRef {
        StringRef(self.alloc(Object::String(string)))
    }

    pub(crate) fn alloc_function(&mut self) -> FunctionRef {
        FunctionRef(self.alloc(Object::Function(Function::new())))
    }

    pub(crate) fn alloc_native(&mut self, native: NativeFunction) -> NativeRef {
        NativeRef(self.alloc(Object::Native(native)))
    }

    pub(crate) fn alloc_map(&mut self) -> MapRef {
        MapRef(self.alloc(Object::Map(Table::new())))
    }

    // =========================================================================
    // Typed access
    // =========================================================================

    fn slot(&self, reference: ObjRef) -> &Slot {
        self.slots[reference.0 as usize]
            .as_ref()
            .expect("heap handle refers to a freed slot")
    }

    fn slot_mut(&mut self, reference: ObjRef) -> &mut Slot {
        self.slots[reference.0 as usize]
            .as_mut()
            .expect("heap handle refers to a freed slot")
    }

    pub fn string(&self, reference: StringRef) -> &ByteString {
        match &self.slot(reference.0).object {
            Object::String(s) => s,
            _ => unreachable!("string handle to a non-string object"),
        }
    }

    pub fn function(&self, reference: FunctionRef) -> &Function {
        match &self.slot(reference.0).object {
            Object::Function(f) => f,
            _ => unreachable!("function handle to a non-function object"),
        }
    }

    pub fn native(&self, reference: NativeRef) -> &NativeFunction {
        match &self.slot(reference.0).object {
            Object::Native(n) => n,
            _ => unreachable!("native handle to a non-native object"),
        }
    }

    pub fn map(&self, reference: MapRef) -> &Table {
        match &self.slot(reference.0).object {
            Object::Map(m) => m,
            _ => unreachable!("map handle to a non-map object"),
        }
    }

    pub(crate) fn function_mut(&mut self, reference: FunctionRef) -> &mut Function {
        match &mut self.slot_mut(reference.0).object {
            Object::Function(f) => f,
            _ => unreachable!("function handle to a non-function object"),
        }
    }

    // =========================================================================
    // Accounted mutation
    // =========================================================================

    pub(crate) fn string_push(&mut self, reference: StringRef, byte: u8) {
        let delta = {
            let slot = self.slot_mut(reference.0);
            let Object::String(s) = &mut slot.object else {
                unreachable!("string handle to a non-string object")
            };
            let before = s.buffer_bytes();
            s.push(byte);
            s.buffer_bytes() - before
        };
        self.bytes_allocated += delta;
    }

    pub(crate) fn string_reserve(&mut self, reference: StringRef, additional: usize) {
        let delta = {
            let slot = self.slot_mut(reference.0);
            let Object::String(s) = &mut slot.object else {
                unreachable!("string handle to a non-string object")
            };
            let before = s.buffer_bytes();
            s.reserve(additional);
            s.buffer_bytes() - before
        };
        self.bytes_allocated += delta;
    }

    pub(crate) fn function_push_byte_code(
        &mut self,
        reference: FunctionRef,
        code: crate::bytecode::ByteCode,
    ) {
        let delta = {
            let f = self.function_mut(reference);
            let before = f.buffer_bytes();
            f.push_byte_code(code);
            f.buffer_bytes() - before
        };
        self.bytes_allocated += delta;
    }

    pub(crate) fn function_push_constant(&mut self, reference: FunctionRef, value: Value) {
        let delta = {
            let f = self.function_mut(reference);
            let before = f.buffer_bytes();
            f.push_constant(value);
            f.buffer_bytes() - before
        };
        self.bytes_allocated += delta;
    }

    pub(crate) fn function_reserve(
        &mut self,
        reference: FunctionRef,
        byte_code: usize,
        constants: usize,
    ) {
        let delta = {
            let f = self.function_mut(reference);
            let before = f.buffer_bytes();
            f.reserve_byte_code(byte_code);
            f.reserve_constants(constants);
            f.buffer_bytes() - before
        };
        self.bytes_allocated += delta;
    }

    // =========================================================================
    // Maps
    // =========================================================================

    /// Look up `key` by value equality. Linear scan in insertion order.
    pub fn map_get(&self, reference: MapRef, key: Value) -> Option<Value> {
        self.map_find(reference, key)
            .and_then(|index| self.map(reference).entry(index).map(|(_, v)| v))
    }

    fn map_find(&self, reference: MapRef, key: Value) -> Option<usize> {
        let table = self.map(reference);
        for index in 0..table.len() {
            let (existing, _) = table.entry(index).expect("entry index within bounds");
            if self.values_equal(existing, key) {
                return Some(index);
            }
        }
        None
    }

    /// Insert or replace. Replacement keeps the entry's position, so
    /// iteration order is first-insertion order.
    pub(crate) fn map_put(&mut self, reference: MapRef, key: Value, value: Value) {
        match self.map_find(reference, key) {
            Some(index) => {
                let slot = self.slot_mut(reference.0);
                let Object::Map(m) = &mut slot.object else {
                    unreachable!("map handle to a non-map object")
                };
                m.set_entry(index, key, value);
            }
            None => {
                let delta = {
                    let slot = self.slot_mut(reference.0);
                    let Object::Map(m) = &mut slot.object else {
                        unreachable!("map handle to a non-map object")
                    };
                    let before = m.buffer_bytes();
                    m.push_entry(key, value);
                    m.buffer_bytes() - before
                };
                self.bytes_allocated += delta;
            }
        }
    }

    // =========================================================================
    // Equality
    // =========================================================================

    /// Structural equality for primitives, byte-wise for strings, identity
    /// for functions, natives and maps. Values of different tags are never
    /// equal.
    pub fn values_equal(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Nil, Value::Nil) => true,
            (Value::Integer(x), Value::Integer(y)) => x == y,
            (Value::Double(x), Value::Double(y)) => x == y,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (Value::String(x), Value::String(y)) => {
                x == y || self.string(x).bytes() == self.string(y).bytes()
            }
            (Value::Function(x), Value::Function(y)) => x == y,
            (Value::Native(x), Value::Native(y)) => x == y,
            (Value::Map(x), Value::Map(y)) => x == y,
            _ => false,
        }
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Run one full mark-and-sweep cycle over the given roots.
    pub(crate) fn collect<I>(&mut self, roots: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut work = Vec::new();
        for root in roots {
            self.mark_value(root, &mut work);
        }
        self.trace(&mut work);
        self.sweep();
        self.next_gc = (self.bytes_allocated * 2).max(GC_FLOOR);
    }

    fn mark_value(&mut self, value: Value, work: &mut Vec<ObjRef>) {
        let reference = match value {
            Value::String(r) => r.0,
            Value::Function(r) => r.0,
            Value::Native(r) => r.0,
            Value::Map(r) => r.0,
            _ => return,
        };
        let slot = self.slot_mut(reference);
        if !slot.marked {
            slot.marked = true;
            work.push(reference);
        }
    }

    fn trace(&mut self, work: &mut Vec<ObjRef>) {
        while let Some(reference) = work.pop() {
            let children: Vec<Value> = match &self.slot(reference).object {
                Object::Function(f) => f.constants().to_vec(),
                Object::Map(m) => m.entries().iter().flat_map(|(k, v)| [*k, *v]).collect(),
                Object::String(_) | Object::Native(_) => Vec::new(),
            };
            for child in children {
                self.mark_value(child, work);
            }
        }
    }

    fn sweep(&mut self) {
        let mut previous: Option<ObjRef> = None;
        let mut current = self.head;
        while let Some(reference) = current {
            let index = reference.0 as usize;
            let slot = self.slots[index].as_mut().expect("heap list node is live");
            let next = slot.next;
            if slot.marked {
                slot.marked = false;
                previous = Some(reference);
            } else {
                let dead = self.slots[index].take().expect("heap list node is live");
                self.bytes_allocated -= mem::size_of::<Slot>() + dead.object.buffer_bytes();
                self.free.push(reference.0);
                match previous {
                    Some(p) => {
                        self.slots[p.0 as usize]
                            .as_mut()
                            .expect("heap list predecessor is live")
                            .next = next;
                    }
                    None => self.head = next,
                }
            }
            current = next;
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
