//! Plain register bank
//!
//! A sparse set of 32-bit registers, zero at reset. Registers are ordinary
//! read/write storage unless declared write-one-to-clear with
//! [`RegisterBank::w1c`], which is how the error status registers and
//! similar latched-event registers behave.

use heapless::{FnvIndexMap, Vec};

use super::Emulator;
use crate::drivers::RegisterFile;
use crate::sync::SpinLock;

/// Maximum number of write-one-to-clear registers per bank
pub const MAX_W1C_REGS: usize = 32;

/// Sparse register bank holding up to `N` registers (`N` a power of two)
pub struct RegisterBank<const N: usize> {
    name: &'static str,
    regs: SpinLock<FnvIndexMap<u32, u32, N>>,
    w1c: Vec<u32, MAX_W1C_REGS>,
}

impl<const N: usize> RegisterBank<N> {
    /// Create an empty bank
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            regs: SpinLock::new(FnvIndexMap::new()),
            w1c: Vec::new(),
        }
    }

    /// Declare the register at `offset` write-one-to-clear
    pub fn w1c(mut self, offset: u32) -> Self {
        if self.w1c.push(offset).is_err() {
            log::warn!("{}: too many write-one-to-clear registers", self.name);
        }
        self
    }

    /// Whether the register at `offset` is write-one-to-clear
    pub fn is_w1c(&self, offset: u32) -> bool {
        self.w1c.contains(&offset)
    }

    /// Read a register without side effects
    pub fn peek(&self, offset: u32) -> u32 {
        self.regs.lock().get(&offset).copied().unwrap_or(0)
    }

    /// Store a register value, bypassing write semantics
    ///
    /// This is how tests model hardware setting status bits.
    pub fn poke(&self, offset: u32, value: u32) {
        let stored = {
            let mut regs = self.regs.lock();
            if value == 0 {
                regs.remove(&offset);
                true
            } else {
                regs.insert(offset, value).is_ok()
            }
        };

        // Logged with the bank unlocked
        if !stored {
            log::warn!("{}: register bank full, write to {:#x} dropped", self.name, offset);
        }
    }
}

impl<const N: usize> RegisterFile for RegisterBank<N> {
    fn read(&self, offset: u32) -> u32 {
        self.peek(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        if self.is_w1c(offset) {
            self.poke(offset, self.peek(offset) & !value);
        } else {
            self.poke(offset, value);
        }
    }
}

impl<const N: usize> Emulator for RegisterBank<N> {
    fn name(&self) -> &str {
        self.name
    }

    fn reset(&self) {
        self.regs.lock().clear();
    }
}
