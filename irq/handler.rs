//! Interrupt callback registry
//!
//! A line's callback is either a plain function taking the opaque argument
//! given at registration, or a `'static` object implementing
//! [`InterruptHandler`]. The registry is a fixed-capacity table with one
//! slot per line; an empty slot is the "no callback registered" state.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use super::IrqNumber;

/// Opaque argument handed back to a callback
pub type CallbackArg = usize;

/// Plain callback function
pub type CallbackFn = fn(CallbackArg);

/// Object-style interrupt handler
pub trait InterruptHandler: Sync {
    /// Handle one firing of the line
    fn handle(&self, arg: CallbackArg);

    /// Handler name for debugging
    fn name(&self) -> &'static str {
        "anonymous"
    }
}

/// Callback attached to a line
#[derive(Clone, Copy)]
pub enum Callback {
    /// Plain function
    Function(CallbackFn),
    /// Handler object
    Handler(&'static dyn InterruptHandler),
}

/// Registered callback and its argument
#[derive(Clone, Copy)]
pub struct CallbackEntry {
    /// Callback to invoke
    pub callback: Callback,
    /// Argument passed on every invocation
    pub arg: CallbackArg,
}

impl CallbackEntry {
    /// Entry for a plain function
    pub const fn function(func: CallbackFn, arg: CallbackArg) -> Self {
        Self {
            callback: Callback::Function(func),
            arg,
        }
    }

    /// Entry for a handler object
    pub const fn handler(handler: &'static dyn InterruptHandler, arg: CallbackArg) -> Self {
        Self {
            callback: Callback::Handler(handler),
            arg,
        }
    }

    /// Invoke the callback with the registered argument
    #[inline]
    pub fn invoke(&self) {
        match self.callback {
            Callback::Function(func) => func(self.arg),
            Callback::Handler(handler) => handler.handle(self.arg),
        }
    }

    /// Name used in log messages
    pub fn name(&self) -> &'static str {
        match self.callback {
            Callback::Function(_) => "function",
            Callback::Handler(handler) => handler.name(),
        }
    }
}

impl fmt::Debug for CallbackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackEntry")
            .field("callback", &self.name())
            .field("arg", &format_args!("{:#x}", self.arg))
            .finish()
    }
}

/// Fixed-capacity table of callbacks, one slot per line
pub struct CallbackTable<const N: usize> {
    entries: [Option<CallbackEntry>; N],
}

impl<const N: usize> CallbackTable<N> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self { entries: [None; N] }
    }

    /// Install `entry` for `line`, replacing any earlier registration
    pub fn register(&mut self, line: IrqNumber, entry: CallbackEntry) -> crate::Result<()> {
        let slot = self
            .entries
            .get_mut(line as usize)
            .ok_or(crate::Error::InvalidIrq)?;
        *slot = Some(entry);
        Ok(())
    }

    /// Look up the callback for `line`
    pub fn get(&self, line: IrqNumber) -> Option<CallbackEntry> {
        self.entries.get(line as usize).copied().flatten()
    }

    /// Whether `line` has a callback
    pub fn is_registered(&self, line: IrqNumber) -> bool {
        self.get(line).is_some()
    }

    /// Number of lines with a callback
    pub fn registered(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    /// Capacity of the table
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for CallbackTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Function-based handler that counts its invocations
pub struct CountingHandler {
    /// Handler function
    handler_fn: CallbackFn,
    /// Handler name for debugging
    name: &'static str,
    /// Call count
    call_count: AtomicU32,
}

impl CountingHandler {
    /// Create a new counting handler
    pub const fn new(handler_fn: CallbackFn, name: &'static str) -> Self {
        Self {
            handler_fn,
            name,
            call_count: AtomicU32::new(0),
        }
    }

    /// Get the call count
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl InterruptHandler for CountingHandler {
    fn handle(&self, arg: CallbackArg) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        log::trace!("handler '{}' called with arg {:#x}", self.name, arg);

        (self.handler_fn)(arg);
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
