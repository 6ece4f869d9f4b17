//! Closures that stream batches of references from the host to the collector.
//!
//! A producer (a host scanning upcall) pushes items into a [`BufferClosure`]. Whenever the buffer
//! is full, the whole batch is handed to the consumer, which owns it from then on, and the
//! producer continues with an empty buffer. The producer can ask for more capacity when it needs
//! to emit a run of items without an intermediate flush. The last batch is handed over by
//! [`BufferClosure::finish`], or when the closure is dropped.
//!
//! [`RawBufferClosure`] is the same protocol in a C-compatible shape, for hosts that fill raw
//! buffers: `func(buf, len, cap, data)` consumes the buffer and returns a new one.

use std::marker::PhantomData;

use crate::util::{Address, ObjectReference};
use crate::vm::slot::Slot;

/// The default number of items in a batch.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// A growable buffer that hands each full batch to a consumer.
pub struct BufferClosure<'a, T> {
    buffer: Vec<T>,
    capacity: usize,
    consumer: Box<dyn FnMut(Vec<T>) + 'a>,
}

impl<'a, T> BufferClosure<'a, T> {
    pub fn new<F: FnMut(Vec<T>) + 'a>(capacity: usize, consumer: F) -> Self {
        assert!(capacity > 0, "The capacity of a closure buffer must not be zero");
        Self {
            buffer: Vec::new(),
            capacity,
            consumer: Box::new(consumer),
        }
    }

    /// Add an item. The batch is flushed to the consumer as soon as it is full.
    pub fn push(&mut self, item: T) {
        if self.buffer.capacity() == 0 {
            self.buffer.reserve_exact(self.capacity);
        }
        self.buffer.push(item);
        if self.buffer.len() >= self.capacity {
            self.flush();
        }
    }

    /// Make room for `additional` items that will be pushed without an intermediate flush.
    /// The pending batch is flushed first if the items would not fit, and the capacity grows if
    /// `additional` exceeds it.
    pub fn reserve(&mut self, additional: usize) {
        if self.buffer.len() + additional <= self.capacity {
            return;
        }
        self.flush();
        if additional > self.capacity {
            self.capacity = additional.next_power_of_two();
            trace!("Closure buffer grown to {} items", self.capacity);
        }
        self.buffer.reserve_exact(self.capacity);
    }

    /// Number of items in the pending batch.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The size of a batch.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hand the pending batch, if any, to the consumer.
    pub fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let batch = std::mem::take(&mut self.buffer);
            (self.consumer)(batch);
        }
    }

    /// Hand over the last batch. Nothing should be pushed afterwards.
    pub fn finish(&mut self) {
        self.flush();
    }

    /// Hand a batch produced elsewhere to the consumer.
    fn consume(&mut self, batch: Vec<T>) {
        if !batch.is_empty() {
            (self.consumer)(batch);
        }
    }
}

impl<T> Drop for BufferClosure<'_, T> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// The closure handed to `scan_object` and `scan_array`.
pub type SlotsClosure<'a> = BufferClosure<'a, Slot>;

/// The closure handed to the root scanning upcalls. Roots come in two kinds:
///
/// -   slots (precise roots): locations the collector may update if the object moves;
/// -   nodes (conservative roots): object references the collector cannot update. Such objects
///     are pinned for the collection they are reported in.
pub struct RootsClosure<'a> {
    slots: BufferClosure<'a, Slot>,
    nodes: BufferClosure<'a, ObjectReference>,
}

impl<'a> RootsClosure<'a> {
    pub fn new(slots: BufferClosure<'a, Slot>, nodes: BufferClosure<'a, ObjectReference>) -> Self {
        Self { slots, nodes }
    }

    pub fn report_slot(&mut self, slot: Slot) {
        self.slots.push(slot);
    }

    pub fn report_node(&mut self, node: ObjectReference) {
        if !node.is_null() {
            self.nodes.push(node);
        }
    }

    pub fn slots(&mut self) -> &mut BufferClosure<'a, Slot> {
        &mut self.slots
    }

    pub fn nodes(&mut self) -> &mut BufferClosure<'a, ObjectReference> {
        &mut self.nodes
    }

    pub fn finish(&mut self) {
        self.slots.finish();
        self.nodes.finish();
    }
}

/// Item types that can travel through a [`RawBufferClosure`]: plain words with the same layout
/// as [`Address`].
///
/// # Safety
///
/// The type must be `#[repr(transparent)]` over a word, and any word the host writes must be a
/// valid value.
pub unsafe trait WordItem: Copy {}

unsafe impl WordItem for Address {}
unsafe impl WordItem for ObjectReference {}
unsafe impl WordItem for Slot {}

static_assertions::assert_eq_size!(Slot, Address);
static_assertions::assert_eq_size!(ObjectReference, Address);

/// A buffer handed to the host by [`RawBufferClosure::func`].
#[repr(C)]
pub struct NewBuffer {
    pub ptr: *mut Address,
    pub capacity: usize,
}

/// A C-compatible view of a [`BufferClosure`].
///
/// The host calls `func(null, 0, 0, data)` to get the first buffer. Whenever a buffer is full it
/// calls `func(buf, len, cap, data)`, which consumes the buffer and returns a new one. A call with
/// a partially filled buffer (`len < cap`) ends the stream: the buffer is consumed, and a null
/// buffer is returned.
#[repr(C)]
pub struct RawBufferClosure<'c, T: WordItem> {
    pub func: extern "C" fn(
        buf: *mut Address,
        len: usize,
        cap: usize,
        data: *mut libc::c_void,
    ) -> NewBuffer,
    pub data: *mut libc::c_void,
    phantom: PhantomData<&'c mut T>,
}

impl<'c, T: WordItem> RawBufferClosure<'c, T> {
    /// Expose a Rust closure through the C-compatible protocol. The closure must outlive the
    /// returned value.
    pub fn from_buffer_closure<'a: 'c>(closure: &'c mut BufferClosure<'a, T>) -> Self {
        Self {
            func: Self::call_buffer_closure,
            data: closure as *mut BufferClosure<'a, T> as *mut libc::c_void,
            phantom: PhantomData,
        }
    }

    extern "C" fn call_buffer_closure(
        buf: *mut Address,
        len: usize,
        cap: usize,
        data: *mut libc::c_void,
    ) -> NewBuffer {
        let closure: &mut BufferClosure<T> = unsafe { &mut *(data as *mut BufferClosure<T>) };
        if !buf.is_null() {
            let batch = unsafe { Vec::from_raw_parts(buf as *mut T, len, cap) };
            closure.consume(batch);
            if len < cap {
                return NewBuffer {
                    ptr: std::ptr::null_mut(),
                    capacity: 0,
                };
            }
        }
        let mut fresh: Vec<T> = Vec::with_capacity(closure.capacity());
        let ptr = fresh.as_mut_ptr() as *mut Address;
        let capacity = fresh.capacity();
        std::mem::forget(fresh);
        NewBuffer { ptr, capacity }
    }

    /// A writer that fills buffers through `func`, the way a host would.
    pub fn writer(&self) -> RawBufferWriter<'_, 'c, T> {
        RawBufferWriter {
            closure: self,
            buf: std::ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }
}

/// Fills the buffers of a [`RawBufferClosure`].
pub struct RawBufferWriter<'r, 'c, T: WordItem> {
    closure: &'r RawBufferClosure<'c, T>,
    buf: *mut Address,
    len: usize,
    cap: usize,
}

impl<T: WordItem> RawBufferWriter<'_, '_, T> {
    fn call(&mut self) {
        let new_buffer = (self.closure.func)(self.buf, self.len, self.cap, self.closure.data);
        self.buf = new_buffer.ptr;
        self.len = 0;
        self.cap = new_buffer.capacity;
    }

    pub fn push(&mut self, item: T) {
        if self.buf.is_null() {
            self.call();
        }
        unsafe { (self.buf as *mut T).add(self.len).write(item) };
        self.len += 1;
        if self.len == self.cap {
            self.call();
        }
    }

    /// Hand the partially filled buffer back, which ends the stream. Does nothing if no buffer
    /// is held.
    fn end(&mut self) {
        if !self.buf.is_null() {
            self.call();
            debug_assert!(self.buf.is_null());
        }
    }

    /// End the stream. Dropping the writer does the same.
    pub fn finish(mut self) {
        self.end();
    }
}

impl<T: WordItem> Drop for RawBufferWriter<'_, '_, T> {
    fn drop(&mut self) {
        self.end();
    }
}
