//! GIC register layer for the Explorer CIC
//!
//! The controller follows the MIPS Global Interrupt Controller model: a
//! shared section with one bit per line in each of the trigger, polarity,
//! mask and pending banks, write-only set/reset aliases for the mask,
//! an edge register taking a line number, and per-line pin and VPE map
//! registers; followed by one local section per VPE for that VPE's private
//! interrupt sources.
//!
//! [`Gic`] only translates line operations to register accesses. Range
//! checks, locking and sequencing are the CIC's job.

use tock_registers::{register_bitfields, LocalRegisterCopy};

use super::{DestType, IrqNumber, LocalInt, Trigger, VpeId};
use crate::drivers::RegisterFile;

/// GIC register offsets
pub mod gic_regs {
    /// SH_CONFIG - Shared configuration (line count, VPE count)
    pub const SH_CONFIG: u32 = 0x0000;
    /// SH_POL - Polarity, 1 = active high / rising edge
    pub const SH_POL: u32 = 0x0100;
    /// SH_TRIG - Trigger type, 1 = edge
    pub const SH_TRIG: u32 = 0x0180;
    /// SH_DUAL - Dual edge, 1 = both edges
    pub const SH_DUAL: u32 = 0x0200;
    /// SH_WEDGE - Edge set/clear by line number
    pub const SH_WEDGE: u32 = 0x0280;
    /// SH_RMASK - Mask reset (write 1 disables)
    pub const SH_RMASK: u32 = 0x0300;
    /// SH_SMASK - Mask set (write 1 enables)
    pub const SH_SMASK: u32 = 0x0380;
    /// SH_MASK - Current mask, 1 = enabled
    pub const SH_MASK: u32 = 0x0400;
    /// SH_PEND - Pending status
    pub const SH_PEND: u32 = 0x0480;
    /// SH_MAP_PIN - Pin/NMI/YQ map, one register per line
    pub const SH_MAP_PIN: u32 = 0x0500;
    /// SH_MAP_VPE - VPE map, one block per line
    pub const SH_MAP_VPE: u32 = 0x2000;
    /// Stride between VPE map blocks
    pub const SH_MAP_VPE_STRIDE: u32 = 0x20;

    /// Start of the per-VPE local sections
    pub const LOCAL_BASE: u32 = 0x8000;
    /// Size of one local section
    pub const LOCAL_STRIDE: u32 = 0x100;
    /// VL_CTL - Local control
    pub const VL_CTL: u32 = 0x00;
    /// VL_PEND - Local pending status
    pub const VL_PEND: u32 = 0x04;
    /// VL_MASK - Local mask, 1 = enabled
    pub const VL_MASK: u32 = 0x08;
    /// VL_RMASK - Local mask reset
    pub const VL_RMASK: u32 = 0x0C;
    /// VL_SMASK - Local mask set
    pub const VL_SMASK: u32 = 0x10;
    /// VL_WD_MAP - Watchdog map
    pub const VL_WD_MAP: u32 = 0x40;
    /// VL_COMPARE_MAP - Count/compare map
    pub const VL_COMPARE_MAP: u32 = 0x44;
    /// VL_TIMER_MAP - CPU timer map
    pub const VL_TIMER_MAP: u32 = 0x48;
    /// VL_FDC_MAP - Fast debug channel map
    pub const VL_FDC_MAP: u32 = 0x4C;
    /// VL_PERFCTR_MAP - Performance counter map
    pub const VL_PERFCTR_MAP: u32 = 0x50;
    /// VL_SWINT0_MAP - Software interrupt 0 map
    pub const VL_SWINT0_MAP: u32 = 0x54;
    /// VL_SWINT1_MAP - Software interrupt 1 map
    pub const VL_SWINT1_MAP: u32 = 0x58;
    /// VL_NMI - Write 1 to raise an NMI on the VPE
    pub const VL_NMI: u32 = 0x80;
}

register_bitfields![u32,
    MAP_PIN [
        PIN OFFSET(0) NUMBITS(6) [],
        YQ OFFSET(29) NUMBITS(1) [],
        NMI OFFSET(30) NUMBITS(1) [],
        MAP OFFSET(31) NUMBITS(1) []
    ],
    WEDGE [
        INT OFFSET(0) NUMBITS(8) [],
        RW OFFSET(31) NUMBITS(1) [
            Clear = 0,
            Set = 1
        ]
    ]
];

type MapPinVal = LocalRegisterCopy<u32, MAP_PIN::Register>;
type WedgeVal = LocalRegisterCopy<u32, WEDGE::Register>;

/// Offset of the bank word holding `line`, and the line's bit in it
#[inline]
const fn bank_bit(bank: u32, line: IrqNumber) -> (u32, u32) {
    (bank + (line / 32) * 4, 1 << (line % 32))
}

const fn local_offset(vpe: VpeId, reg: u32) -> u32 {
    gic_regs::LOCAL_BASE + vpe * gic_regs::LOCAL_STRIDE + reg
}

const fn local_map_reg(int: LocalInt) -> u32 {
    match int {
        LocalInt::Watchdog => gic_regs::VL_WD_MAP,
        LocalInt::Compare => gic_regs::VL_COMPARE_MAP,
        LocalInt::Timer => gic_regs::VL_TIMER_MAP,
        LocalInt::PerfCount => gic_regs::VL_PERFCTR_MAP,
        LocalInt::SwInt0 => gic_regs::VL_SWINT0_MAP,
        LocalInt::SwInt1 => gic_regs::VL_SWINT1_MAP,
        LocalInt::FastDebug => gic_regs::VL_FDC_MAP,
    }
}

/// Encode a pin map register value
pub fn map_pin_value(dest_type: DestType, priority: u8) -> u32 {
    let mut map = MapPinVal::new(0);
    match dest_type {
        DestType::VpePin => map.modify(MAP_PIN::MAP::SET + MAP_PIN::PIN.val(priority as u32)),
        DestType::VpeNmi => map.modify(MAP_PIN::NMI::SET),
        DestType::CoreYq => map.modify(MAP_PIN::YQ::SET + MAP_PIN::PIN.val(priority as u32)),
    }
    map.get()
}

/// Decode a pin map register value
pub fn map_pin_decode(value: u32) -> Option<(DestType, u8)> {
    let map = MapPinVal::new(value);
    let pin = map.read(MAP_PIN::PIN) as u8;
    if map.is_set(MAP_PIN::NMI) {
        Some((DestType::VpeNmi, 0))
    } else if map.is_set(MAP_PIN::YQ) {
        Some((DestType::CoreYq, pin))
    } else if map.is_set(MAP_PIN::MAP) {
        Some((DestType::VpePin, pin))
    } else {
        None
    }
}

/// Encode an edge register write for `line`
pub fn wedge_value(line: IrqNumber, set: bool) -> u32 {
    let mut wedge = WedgeVal::new(0);
    let rw = if set { WEDGE::RW::Set } else { WEDGE::RW::Clear };
    wedge.modify(rw + WEDGE::INT.val(line));
    wedge.get()
}

/// Decode an edge register write into (line, set)
pub fn wedge_decode(value: u32) -> (IrqNumber, bool) {
    let wedge = WedgeVal::new(value);
    (wedge.read(WEDGE::INT), wedge.is_set(WEDGE::RW))
}

/// GIC register layer
pub struct Gic<R: RegisterFile> {
    regs: R,
}

impl<R: RegisterFile> Gic<R> {
    /// Create a GIC over a register file
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Get the underlying register file
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Disable a line
    pub fn mask(&self, line: IrqNumber) {
        let (offset, bit) = bank_bit(gic_regs::SH_RMASK, line);
        self.regs.write(offset, bit);
    }

    /// Enable a line
    pub fn unmask(&self, line: IrqNumber) {
        let (offset, bit) = bank_bit(gic_regs::SH_SMASK, line);
        self.regs.write(offset, bit);
    }

    /// Whether a line is enabled
    pub fn is_enabled(&self, line: IrqNumber) -> bool {
        let (offset, bit) = bank_bit(gic_regs::SH_MASK, line);
        self.regs.read(offset) & bit != 0
    }

    /// Whether a line is pending
    pub fn is_pending(&self, line: IrqNumber) -> bool {
        let (offset, bit) = bank_bit(gic_regs::SH_PEND, line);
        self.regs.read(offset) & bit != 0
    }

    /// Pending lines that are also enabled, for the 32-line word `word`
    pub fn active_word(&self, word: u32) -> u32 {
        let pend = self.regs.read(gic_regs::SH_PEND + word * 4);
        let mask = self.regs.read(gic_regs::SH_MASK + word * 4);
        pend & mask
    }

    /// Assert an edge on a line
    pub fn set_edge(&self, line: IrqNumber) {
        self.regs.write(gic_regs::SH_WEDGE, wedge_value(line, true));
    }

    /// Clear a latched edge on a line
    pub fn clear_edge(&self, line: IrqNumber) {
        self.regs.write(gic_regs::SH_WEDGE, wedge_value(line, false));
    }

    /// Program the trigger type of a line, single edge, active high
    pub fn set_trigger(&self, line: IrqNumber, trigger: Trigger) {
        let (trig, bit) = bank_bit(gic_regs::SH_TRIG, line);
        let (pol, _) = bank_bit(gic_regs::SH_POL, line);
        let (dual, _) = bank_bit(gic_regs::SH_DUAL, line);

        match trigger {
            Trigger::Edge => self.regs.modify(trig, 0, bit),
            Trigger::Level => self.regs.modify(trig, bit, 0),
        }
        self.regs.modify(pol, 0, bit);
        self.regs.modify(dual, bit, 0);
    }

    /// Read back the trigger type of a line
    pub fn trigger(&self, line: IrqNumber) -> Trigger {
        let (offset, bit) = bank_bit(gic_regs::SH_TRIG, line);
        if self.regs.read(offset) & bit != 0 {
            Trigger::Edge
        } else {
            Trigger::Level
        }
    }

    /// Route a line to a pin, NMI or yield qualifier
    pub fn map_pin(&self, line: IrqNumber, dest_type: DestType, priority: u8) {
        self.regs
            .write(gic_regs::SH_MAP_PIN + line * 4, map_pin_value(dest_type, priority));
    }

    /// Read back the pin routing of a line
    pub fn pin_map(&self, line: IrqNumber) -> Option<(DestType, u8)> {
        map_pin_decode(self.regs.read(gic_regs::SH_MAP_PIN + line * 4))
    }

    /// Route a line to a single VPE
    pub fn map_vpe(&self, line: IrqNumber, vpe: VpeId) {
        self.regs.write(
            gic_regs::SH_MAP_VPE + line * gic_regs::SH_MAP_VPE_STRIDE,
            1 << vpe,
        );
    }

    /// Whether a line is routed to `vpe`
    pub fn routed_to(&self, line: IrqNumber, vpe: VpeId) -> bool {
        let map = self
            .regs
            .read(gic_regs::SH_MAP_VPE + line * gic_regs::SH_MAP_VPE_STRIDE);
        map & (1 << vpe) != 0
    }

    /// Disable a local source of `vpe`
    pub fn local_mask(&self, vpe: VpeId, int: LocalInt) {
        self.regs.write(local_offset(vpe, gic_regs::VL_RMASK), int.bit());
    }

    /// Enable a local source of `vpe`
    pub fn local_unmask(&self, vpe: VpeId, int: LocalInt) {
        self.regs.write(local_offset(vpe, gic_regs::VL_SMASK), int.bit());
    }

    /// Whether a local source of `vpe` is enabled
    pub fn local_is_enabled(&self, vpe: VpeId, int: LocalInt) -> bool {
        self.regs.read(local_offset(vpe, gic_regs::VL_MASK)) & int.bit() != 0
    }

    /// Whether a local source of `vpe` is pending
    pub fn local_is_pending(&self, vpe: VpeId, int: LocalInt) -> bool {
        self.regs.read(local_offset(vpe, gic_regs::VL_PEND)) & int.bit() != 0
    }

    /// Pending and enabled local sources of `vpe`
    pub fn local_active(&self, vpe: VpeId) -> u32 {
        let pend = self.regs.read(local_offset(vpe, gic_regs::VL_PEND));
        let mask = self.regs.read(local_offset(vpe, gic_regs::VL_MASK));
        pend & mask
    }

    /// Route a local source of `vpe`
    pub fn local_map(&self, vpe: VpeId, int: LocalInt, dest_type: DestType, priority: u8) {
        self.regs.write(
            local_offset(vpe, local_map_reg(int)),
            map_pin_value(dest_type, priority),
        );
    }

    /// Raise an NMI on `vpe`
    pub fn raise_nmi(&self, vpe: VpeId) {
        self.regs.write(local_offset(vpe, gic_regs::VL_NMI), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::GicEmulator;
    use test_case::test_case;

    #[test_case(DestType::VpePin, 5, 0x8000_0005)]
    #[test_case(DestType::VpeNmi, 5, 0x4000_0000)]
    #[test_case(DestType::CoreYq, 3, 0x2000_0003)]
    fn test_map_pin_encoding(dest_type: DestType, priority: u8, expected: u32) {
        assert_eq!(map_pin_value(dest_type, priority), expected);
        let (decoded, _) = map_pin_decode(expected).unwrap();
        assert_eq!(decoded, dest_type);
    }

    #[test]
    fn test_wedge_encoding() {
        assert_eq!(wedge_value(37, true), 0x8000_0025);
        assert_eq!(wedge_value(37, false), 0x0000_0025);
        assert_eq!(wedge_decode(0x8000_0009), (9, true));
    }

    #[test_case(0, gic_regs::SH_MASK, 0x1)]
    #[test_case(33, gic_regs::SH_MASK + 4, 0x2)]
    #[test_case(63, gic_regs::SH_PEND + 4, 0x8000_0000)]
    fn test_bank_bit(line: IrqNumber, offset: u32, bit: u32) {
        let bank = offset & !0x7F;
        assert_eq!(bank_bit(bank, line), (offset, bit));
    }

    #[test]
    fn test_mask_unmask() {
        let gic = Gic::new(GicEmulator::new());

        gic.unmask(40);
        assert!(gic.is_enabled(40));
        assert!(!gic.is_enabled(41));

        gic.mask(40);
        assert!(!gic.is_enabled(40));
    }

    #[test]
    fn test_trigger_and_routing() {
        let gic = Gic::new(GicEmulator::new());

        gic.set_trigger(12, Trigger::Edge);
        gic.map_pin(12, DestType::VpePin, 1);
        gic.map_vpe(12, 2);

        assert_eq!(gic.trigger(12), Trigger::Edge);
        assert_eq!(gic.pin_map(12), Some((DestType::VpePin, 1)));
        assert!(gic.routed_to(12, 2));
        assert!(!gic.routed_to(12, 0));

        gic.set_trigger(12, Trigger::Level);
        assert_eq!(gic.trigger(12), Trigger::Level);
    }

    #[test]
    fn test_edge_latches_pending() {
        let gic = Gic::new(GicEmulator::new());

        gic.set_edge(9);
        assert!(gic.is_pending(9));
        assert_eq!(gic.active_word(0), 0);

        gic.unmask(9);
        assert_eq!(gic.active_word(0), 1 << 9);

        gic.clear_edge(9);
        assert!(!gic.is_pending(9));
    }

    #[test]
    fn test_local_sources() {
        let gic = Gic::new(GicEmulator::new());

        gic.local_unmask(3, LocalInt::Timer);
        assert!(gic.local_is_enabled(3, LocalInt::Timer));
        assert!(!gic.local_is_enabled(2, LocalInt::Timer));

        gic.local_map(3, LocalInt::Timer, DestType::VpePin, 4);
        assert_eq!(
            gic.regs().peek(local_offset(3, gic_regs::VL_TIMER_MAP)),
            0x8000_0004
        );

        gic.local_mask(3, LocalInt::Timer);
        assert!(!gic.local_is_enabled(3, LocalInt::Timer));
    }
}
