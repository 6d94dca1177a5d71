//! Memory-mapped register files

use core::ptr::NonNull;

use volatile::VolatilePtr;

/// A block of 32-bit hardware registers addressed by byte offset
///
/// Methods take `&self`: a register file is shared hardware, and the
/// read/write semantics of individual registers (write-one-to-clear,
/// set/clear aliases, read-only status) belong to the hardware behind it.
pub trait RegisterFile: Sync {
    /// Read the register at `offset`
    fn read(&self, offset: u32) -> u32;

    /// Write `value` to the register at `offset`
    fn write(&self, offset: u32, value: u32);

    /// Read-modify-write: clear the `clear` bits, then set the `set` bits
    ///
    /// Not atomic with respect to other contexts; callers touching shared
    /// registers do so inside a critical region.
    fn modify(&self, offset: u32, clear: u32, set: u32) {
        let value = self.read(offset);
        self.write(offset, (value & !clear) | set);
    }
}

impl<R: RegisterFile + ?Sized> RegisterFile for &R {
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        (**self).write(offset, value)
    }
}

/// Register file backed by memory-mapped I/O
#[derive(Debug)]
pub struct MmioRegisters {
    base_address: usize,
}

impl MmioRegisters {
    /// Create a register file for the block at `base_address`
    ///
    /// # Safety
    /// `base_address` must be the uncached address of a register block that
    /// is valid for 32-bit volatile accesses at every offset the owning
    /// driver uses, for the lifetime of the returned value.
    pub const unsafe fn new(base_address: usize) -> Self {
        Self { base_address }
    }

    /// Get the base address
    pub const fn base_address(&self) -> usize {
        self.base_address
    }

    fn register(&self, offset: u32) -> VolatilePtr<'_, u32> {
        let address = self.base_address + offset as usize;
        // SAFETY: `new` requires the block to be valid at every driver offset,
        // and block base addresses are never zero.
        unsafe { VolatilePtr::new(NonNull::new_unchecked(address as *mut u32)) }
    }
}

impl RegisterFile for MmioRegisters {
    #[inline]
    fn read(&self, offset: u32) -> u32 {
        self.register(offset).read()
    }

    #[inline]
    fn write(&self, offset: u32, value: u32) {
        self.register(offset).write(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmio_over_local_memory() {
        let mut backing = [0u32; 4];
        let regs = unsafe { MmioRegisters::new(backing.as_mut_ptr() as usize) };

        regs.write(0x4, 0xDEAD_BEEF);
        regs.modify(0x8, 0, 0x0000_00F0);
        regs.modify(0x4, 0xFFFF_0000, 0x0001_0000);

        assert_eq!(regs.read(0x4), 0x0001_BEEF);
        assert_eq!(regs.read(0x8), 0x0000_00F0);
        assert_eq!(regs.read(0x0), 0);
        assert_eq!(backing[1], 0x0001_BEEF);
    }
}
