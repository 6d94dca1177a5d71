//! GIC emulator
//!
//! Models the register behavior the CIC relies on: set/reset mask aliases
//! folding into the mask banks, the edge register latching pending bits by
//! line number, pending status computed from latched edges and asserted
//! level inputs, and the same mask and pending behavior in every per-VPE
//! local section. All other registers are plain storage.

use super::{Emulator, RegisterBank};
use crate::config::CIC_MAX_INTERRUPTS;
use crate::drivers::RegisterFile;
use crate::irq::gic::{gic_regs, wedge_decode};
use crate::irq::{IrqNumber, LocalInt, VpeId, MAX_VPES};
use crate::sync::SpinLock;

const WORDS: usize = CIC_MAX_INTERRUPTS / 32;
const BANK_BYTES: u32 = WORDS as u32 * 4;

/// Line inputs driving the pending registers
struct Inputs {
    /// Edges latched through the edge register
    edges: [u32; WORDS],
    /// Asserted level inputs
    levels: [u32; WORDS],
    /// Asserted local sources per VPE
    local: [u32; MAX_VPES],
    /// NMIs raised per VPE
    nmi_count: [u32; MAX_VPES],
}

impl Inputs {
    const fn new() -> Self {
        Self {
            edges: [0; WORDS],
            levels: [0; WORDS],
            local: [0; MAX_VPES],
            nmi_count: [0; MAX_VPES],
        }
    }
}

/// Register offset classification
enum Target {
    SharedPend(usize),
    SharedSmask(u32),
    SharedRmask(u32),
    Wedge,
    LocalPend(usize),
    LocalSmask(u32),
    LocalRmask(u32),
    LocalNmi(usize),
    Plain,
}

fn classify(offset: u32) -> Target {
    let in_bank = |bank: u32| offset >= bank && offset < bank + BANK_BYTES;

    if in_bank(gic_regs::SH_PEND) {
        return Target::SharedPend(((offset - gic_regs::SH_PEND) / 4) as usize);
    }
    if in_bank(gic_regs::SH_SMASK) {
        return Target::SharedSmask(gic_regs::SH_MASK + offset - gic_regs::SH_SMASK);
    }
    if in_bank(gic_regs::SH_RMASK) {
        return Target::SharedRmask(gic_regs::SH_MASK + offset - gic_regs::SH_RMASK);
    }
    if offset == gic_regs::SH_WEDGE {
        return Target::Wedge;
    }

    let local_end = gic_regs::LOCAL_BASE + MAX_VPES as u32 * gic_regs::LOCAL_STRIDE;
    if offset >= gic_regs::LOCAL_BASE && offset < local_end {
        let vpe = (offset - gic_regs::LOCAL_BASE) / gic_regs::LOCAL_STRIDE;
        let section = gic_regs::LOCAL_BASE + vpe * gic_regs::LOCAL_STRIDE;
        return match offset - section {
            gic_regs::VL_PEND => Target::LocalPend(vpe as usize),
            gic_regs::VL_SMASK => Target::LocalSmask(section + gic_regs::VL_MASK),
            gic_regs::VL_RMASK => Target::LocalRmask(section + gic_regs::VL_MASK),
            gic_regs::VL_NMI => Target::LocalNmi(vpe as usize),
            _ => Target::Plain,
        };
    }

    Target::Plain
}

/// Emulated Explorer GIC
pub struct GicEmulator {
    regs: RegisterBank<1024>,
    inputs: SpinLock<Inputs>,
}

impl GicEmulator {
    /// Create a GIC in its reset state
    pub const fn new() -> Self {
        Self {
            regs: RegisterBank::new("gic"),
            inputs: SpinLock::new(Inputs::new()),
        }
    }

    /// Drive a level input high
    pub fn assert_line(&self, line: IrqNumber) {
        let (word, bit) = Self::word_bit(line);
        if let Some(levels) = self.inputs.lock().levels.get_mut(word) {
            *levels |= bit;
        }
    }

    /// Drive a level input low
    pub fn deassert_line(&self, line: IrqNumber) {
        let (word, bit) = Self::word_bit(line);
        if let Some(levels) = self.inputs.lock().levels.get_mut(word) {
            *levels &= !bit;
        }
    }

    /// Drive a local source of `vpe` high
    pub fn assert_local(&self, vpe: VpeId, int: LocalInt) {
        if let Some(local) = self.inputs.lock().local.get_mut(vpe as usize) {
            *local |= int.bit();
        }
    }

    /// Drive a local source of `vpe` low
    pub fn deassert_local(&self, vpe: VpeId, int: LocalInt) {
        if let Some(local) = self.inputs.lock().local.get_mut(vpe as usize) {
            *local &= !int.bit();
        }
    }

    /// Number of NMIs raised on `vpe` since reset
    pub fn nmi_count(&self, vpe: VpeId) -> u32 {
        self.inputs
            .lock()
            .nmi_count
            .get(vpe as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Read a register without side effects
    pub fn peek(&self, offset: u32) -> u32 {
        self.read(offset)
    }

    fn word_bit(line: IrqNumber) -> (usize, u32) {
        ((line / 32) as usize, 1 << (line % 32))
    }
}

impl Default for GicEmulator {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile for GicEmulator {
    fn read(&self, offset: u32) -> u32 {
        match classify(offset) {
            Target::SharedPend(word) => {
                let inputs = self.inputs.lock();
                inputs.edges[word] | inputs.levels[word]
            }
            Target::LocalPend(vpe) => self.inputs.lock().local[vpe],
            // Set/reset aliases and the edge register read as zero
            Target::SharedSmask(_)
            | Target::SharedRmask(_)
            | Target::LocalSmask(_)
            | Target::LocalRmask(_)
            | Target::Wedge => 0,
            Target::LocalNmi(_) | Target::Plain => self.regs.peek(offset),
        }
    }

    fn write(&self, offset: u32, value: u32) {
        match classify(offset) {
            Target::SharedPend(_) | Target::LocalPend(_) => {}
            Target::SharedSmask(mask) | Target::LocalSmask(mask) => {
                self.regs.modify(mask, 0, value)
            }
            Target::SharedRmask(mask) | Target::LocalRmask(mask) => {
                self.regs.modify(mask, value, 0)
            }
            Target::Wedge => {
                let (line, set) = wedge_decode(value);
                let (word, bit) = Self::word_bit(line);
                let mut inputs = self.inputs.lock();
                if let Some(edges) = inputs.edges.get_mut(word) {
                    if set {
                        *edges |= bit;
                    } else {
                        *edges &= !bit;
                    }
                }
            }
            Target::LocalNmi(vpe) => {
                if value & 1 != 0 {
                    self.inputs.lock().nmi_count[vpe] += 1;
                }
                self.regs.write(offset, value);
            }
            Target::Plain => self.regs.write(offset, value),
        }
    }
}

impl Emulator for GicEmulator {
    fn name(&self) -> &str {
        "gic"
    }

    fn reset(&self) {
        self.regs.reset();
        *self.inputs.lock() = Inputs::new();
    }
}
