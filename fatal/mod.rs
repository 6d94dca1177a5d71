//! Fatal and non-fatal hardware error handling
//!
//! Each hardware block that can signal errors is described by an
//! [`ErrorSource`]: the interrupt line it raises, its severity, the
//! doorbell used to notify the host, and the status/mask registers to scan.
//! The source is registered as the line's interrupt handler. When the line
//! fires, the source scans its status registers once, reports the first
//! unmasked condition through the [`Erep`] encoder, and clears what it
//! found. Nothing is retried or recovered at this layer.
//!
//! Watchdog sources skip the scan: the expiry is reported with the
//! dedicated watchdog descriptor and handed to the [`FatalPolicy`].
//!
//! Signal sources have no status registers at all: the line itself is the
//! condition, reported with the line number as sub-category.

pub mod erep;

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::arch::{Cpu, CpuControl};
use crate::drivers::RegisterFile;
use crate::irq::{CallbackArg, Cic, InterruptHandler, IrqNumber};
use crate::sync::CriticalRegion;
use crate::Result;

pub use erep::{Doorbell, ErepType, Erep, ErrorReport};

use erep::REG_OFFSET_DONT_CARE;

/// Severity of an error source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Firmware cannot safely continue for the block
    Fatal,
    /// Reported, firmware continues
    NonFatal,
    /// Watchdog expiry, escalated without decode
    Watchdog,
}

/// Handler state of an error source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandlerState {
    /// Waiting for the line to fire
    Idle = 0,
    /// Reading status registers
    Scanning = 1,
    /// A descriptor was sent to the host
    Reported = 2,
    /// Handed to the fatal policy
    Escalated = 3,
}

impl HandlerState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => HandlerState::Scanning,
            2 => HandlerState::Reported,
            3 => HandlerState::Escalated,
            _ => HandlerState::Idle,
        }
    }
}

/// Result of one scan pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No unmasked condition was found
    Spurious,
    /// A descriptor was sent to the host
    Reported(ErrorReport),
    /// The source was escalated
    Escalated,
}

/// Consecutive status registers with a parallel set of mask registers
///
/// A set mask bit suppresses the matching status bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBank {
    /// Bank name for log messages
    pub name: &'static str,
    /// Offset of the first status register
    pub status_offset: u32,
    /// Offset of the first mask register
    pub mask_offset: u32,
    /// Number of registers
    pub count: u32,
}

impl StatusBank {
    /// Describe a status bank
    pub const fn new(name: &'static str, status_offset: u32, mask_offset: u32, count: u32) -> Self {
        Self {
            name,
            status_offset,
            mask_offset,
            count,
        }
    }
}

/// A hardware block scanned by an error source
pub struct ErrorBlock {
    /// Block name for log messages
    pub name: &'static str,
    /// Block registers
    pub regs: &'static dyn RegisterFile,
    /// Error type reported for conditions found in this block
    pub erep_type: ErepType,
    /// Status banks, in scan order
    pub banks: &'static [StatusBank],
}

/// What happens after a watchdog expiry has been reported
pub trait FatalPolicy: Sync {
    /// Take the platform action for an escalated source
    fn escalate(&self, source: &'static str);
}

/// Escalation by parking the current VPE
pub struct HaltPolicy;

impl FatalPolicy for HaltPolicy {
    fn escalate(&self, source: &'static str) {
        log::error!("{}: escalated, halting VPE {}", source, Cpu::current_vpe());
        Cpu::halt()
    }
}

/// An interrupt-driven error source
pub struct ErrorSource<E: RegisterFile + 'static> {
    name: &'static str,
    line: IrqNumber,
    severity: Severity,
    doorbell: Doorbell,
    blocks: &'static [ErrorBlock],
    erep: &'static Erep<E>,
    policy: &'static dyn FatalPolicy,
    /// Type reported by a signal source
    signal_type: Option<ErepType>,
    state: AtomicU8,
    reports: AtomicU32,
}

impl<E: RegisterFile + 'static> ErrorSource<E> {
    /// Describe an error source
    pub const fn new(
        name: &'static str,
        line: IrqNumber,
        severity: Severity,
        doorbell: Doorbell,
        blocks: &'static [ErrorBlock],
        erep: &'static Erep<E>,
        policy: &'static dyn FatalPolicy,
    ) -> Self {
        Self {
            name,
            line,
            severity,
            doorbell,
            blocks,
            erep,
            policy,
            signal_type: None,
            state: AtomicU8::new(HandlerState::Idle as u8),
            reports: AtomicU32::new(0),
        }
    }

    /// Describe a fatal source with no status registers
    ///
    /// Every firing reports `erep_type` with the line number as
    /// sub-category and no register offset.
    pub const fn signal(
        name: &'static str,
        line: IrqNumber,
        erep_type: ErepType,
        erep: &'static Erep<E>,
        policy: &'static dyn FatalPolicy,
    ) -> Self {
        let mut source = Self::new(name, line, Severity::Fatal, Doorbell::FATAL, &[], erep, policy);
        source.signal_type = Some(erep_type);
        source
    }

    /// Source name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Interrupt line
    pub fn line(&self) -> IrqNumber {
        self.line
    }

    /// Severity
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Doorbell rung for reports
    pub fn doorbell(&self) -> Doorbell {
        self.doorbell
    }

    /// Blocks scanned by this source
    pub fn blocks(&self) -> &'static [ErrorBlock] {
        self.blocks
    }

    /// Type reported by a signal source
    pub fn signal_type(&self) -> Option<ErepType> {
        self.signal_type
    }

    /// Current handler state
    pub fn state(&self) -> HandlerState {
        HandlerState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Number of descriptors sent by this source
    pub fn reports(&self) -> u32 {
        self.reports.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: HandlerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run one scan pass
    ///
    /// Leaves the source in `Reported`, `Escalated` or, when nothing was
    /// found, `Idle`.
    pub fn process(&self) -> Outcome {
        self.set_state(HandlerState::Scanning);

        if self.severity == Severity::Watchdog {
            self.erep.wdt_trigger();
            self.reports.fetch_add(1, Ordering::Relaxed);
            self.set_state(HandlerState::Escalated);
            self.policy.escalate(self.name);
            return Outcome::Escalated;
        }

        let found = match self.signal_type {
            Some(err_type) => {
                log::error!("{}: line {} asserted", self.name, self.line);
                Some(ErrorReport::new(err_type, self.line, REG_OFFSET_DONT_CARE, 0))
            }
            None => CriticalRegion::run(|| self.scan()),
        };

        match found {
            Some(report) => {
                self.erep.report(&report, self.doorbell);
                self.reports.fetch_add(1, Ordering::Relaxed);
                self.set_state(HandlerState::Reported);
                Outcome::Reported(report)
            }
            None => {
                log::warn!("{}: interrupt with no unmasked condition", self.name);
                self.set_state(HandlerState::Idle);
                Outcome::Spurious
            }
        }
    }

    /// Decode and clear every unmasked condition, returning the descriptor
    /// for the first one
    fn scan(&self) -> Option<ErrorReport> {
        let mut first: Option<ErrorReport> = None;
        let mut multiple = false;

        for block in self.blocks {
            let mut reg_index = 0u32;
            for bank in block.banks {
                for n in 0..bank.count {
                    let status_offset = bank.status_offset + n * 4;
                    let status = block.regs.read(status_offset);
                    let mask = block.regs.read(bank.mask_offset + n * 4);
                    let active = status & !mask;
                    let index = reg_index;
                    reg_index += 1;

                    if active == 0 {
                        continue;
                    }

                    self.log_condition(block, bank, status_offset, active);

                    if first.is_none() {
                        let sub_category = index * 32 + active.trailing_zeros();
                        first = Some(ErrorReport::new(
                            block.erep_type,
                            sub_category,
                            status_offset,
                            active,
                        ));
                        multiple |= active.count_ones() > 1;
                    } else {
                        multiple = true;
                    }

                    block.regs.write(status_offset, active);
                }
            }
        }

        first.map(|report| report.with_multiple(multiple))
    }

    fn log_condition(&self, block: &ErrorBlock, bank: &StatusBank, offset: u32, active: u32) {
        match self.severity {
            Severity::NonFatal => log::warn!(
                "{}: {} {} reg {:#x} = {:#010x}",
                self.name,
                block.name,
                bank.name,
                offset,
                active
            ),
            _ => log::error!(
                "{}: {} {} reg {:#x} = {:#010x}",
                self.name,
                block.name,
                bank.name,
                offset,
                active
            ),
        }
    }
}

impl<E: RegisterFile + 'static> InterruptHandler for ErrorSource<E> {
    fn handle(&self, _arg: CallbackArg) {
        if let Outcome::Reported(_) = self.process() {
            self.set_state(HandlerState::Idle);
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Register every source as its line's handler and enable the line
pub fn register_sources<R, E, const N: usize>(
    cic: &Cic<R, N>,
    sources: &'static [ErrorSource<E>],
) -> Result<()>
where
    R: RegisterFile,
    E: RegisterFile + 'static,
{
    for source in sources {
        cic.int_register_handler(source.line, source, source.line as CallbackArg)?;
        cic.int_enable(source.line)?;
        log::debug!("fatal: {} armed on line {}", source.name, source.line);
    }

    log::info!("fatal: {} error sources armed", sources.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::{GicEmulator, RegisterBank};
    use crate::irq::{IntConfig, Trigger};
    use test_case::test_case;

    type Bank = RegisterBank<32>;

    const STATUS: u32 = 0x100;
    const MASK: u32 = 0x200;

    struct CountingPolicy(AtomicU32);

    impl FatalPolicy for CountingPolicy {
        fn escalate(&self, _source: &'static str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    fn status_regs(count: u32) -> &'static Bank {
        let mut bank = Bank::new("status");
        for n in 0..count {
            bank = bank.w1c(STATUS + n * 4);
        }
        leak(bank)
    }

    fn erep() -> &'static Erep<Bank> {
        leak(Erep::new(Bank::new("opsw")))
    }

    fn policy() -> &'static CountingPolicy {
        leak(CountingPolicy(AtomicU32::new(0)))
    }

    fn block(regs: &'static Bank, erep_type: ErepType, count: u32) -> ErrorBlock {
        ErrorBlock {
            name: "blk",
            regs,
            erep_type,
            banks: leak([StatusBank::new("int", STATUS, MASK, count)]),
        }
    }

    fn source(
        severity: Severity,
        doorbell: Doorbell,
        blocks: Vec<ErrorBlock>,
        erep: &'static Erep<Bank>,
        policy: &'static CountingPolicy,
    ) -> &'static ErrorSource<Bank> {
        source_on(12, severity, doorbell, blocks, erep, policy)
    }

    fn source_on(
        line: IrqNumber,
        severity: Severity,
        doorbell: Doorbell,
        blocks: Vec<ErrorBlock>,
        erep: &'static Erep<Bank>,
        policy: &'static CountingPolicy,
    ) -> &'static ErrorSource<Bank> {
        leak(ErrorSource::new(
            "test",
            line,
            severity,
            doorbell,
            Box::leak(blocks.into_boxed_slice()),
            erep,
            policy,
        ))
    }

    #[test]
    fn test_masked_condition_is_not_reported() {
        let regs = status_regs(1);
        regs.poke(STATUS, (1 << 2) | (1 << 5));
        regs.poke(MASK, 1 << 5);
        let erep = erep();
        let src = source(
            Severity::Fatal,
            Doorbell::FATAL,
            vec![block(regs, ErepType::Ddr4Phy, 1)],
            erep,
            policy(),
        );

        let Outcome::Reported(report) = src.process() else {
            panic!("expected a report");
        };

        assert_eq!(report.sub_category, 2);
        assert_eq!(report.reg_offset, STATUS);
        assert_eq!(report.err_data, 1 << 2);
        assert!(!report.multiple_found);
        assert_eq!(erep.read_back(), Some(report));
        assert_eq!(erep.doorbell_status(), Doorbell::FATAL);

        // Only the reported bit was cleared
        assert_eq!(regs.peek(STATUS), 1 << 5);
        assert_eq!(src.state(), HandlerState::Reported);
        assert_eq!(src.reports(), 1);
    }

    #[test]
    fn test_multiple_conditions_in_one_register() {
        let regs = status_regs(1);
        regs.poke(STATUS, (1 << 2) | (1 << 7));
        let erep = erep();
        let src = source(
            Severity::Fatal,
            Doorbell::FATAL,
            vec![block(regs, ErepType::Top, 1)],
            erep,
            policy(),
        );

        let Outcome::Reported(report) = src.process() else {
            panic!("expected a report");
        };

        assert_eq!(report.sub_category, 2);
        assert_eq!(report.err_data, 0x84);
        assert!(report.multiple_found);
        assert_eq!(regs.peek(STATUS), 0);
    }

    #[test_case(0, 0, 0)]
    #[test_case(1, 3, 35)]
    #[test_case(3, 31, 127)]
    fn test_sub_category_from_register_and_bit(index: u32, bit: u32, expected: u32) {
        let regs = status_regs(4);
        regs.poke(STATUS + index * 4, 1 << bit);
        let src = source(
            Severity::Fatal,
            Doorbell::FATAL,
            vec![block(regs, ErepType::GpbcSys, 4)],
            erep(),
            policy(),
        );

        let Outcome::Reported(report) = src.process() else {
            panic!("expected a report");
        };

        assert_eq!(report.sub_category, expected);
        assert_eq!(report.reg_offset, STATUS + index * 4);
    }

    #[test]
    fn test_first_block_wins_across_blocks() {
        let sys = status_regs(1);
        let peri = status_regs(1);
        sys.poke(STATUS, 1 << 4);
        peri.poke(STATUS, 1 << 1);
        let src = source(
            Severity::Fatal,
            Doorbell::FATAL,
            vec![
                block(sys, ErepType::GpbcSys, 1),
                block(peri, ErepType::GpbcPeri, 1),
            ],
            erep(),
            policy(),
        );

        let Outcome::Reported(report) = src.process() else {
            panic!("expected a report");
        };

        assert_eq!(report.err_type, ErepType::GpbcSys);
        assert!(report.multiple_found);
        assert_eq!(peri.peek(STATUS), 0);
    }

    #[test]
    fn test_nothing_active_is_spurious() {
        let regs = status_regs(1);
        regs.poke(STATUS, 1 << 9);
        regs.poke(MASK, 1 << 9);
        let erep = erep();
        let src = source(
            Severity::Fatal,
            Doorbell::FATAL,
            vec![block(regs, ErepType::Foxhound, 1)],
            erep,
            policy(),
        );

        assert_eq!(src.process(), Outcome::Spurious);
        assert_eq!(src.state(), HandlerState::Idle);
        assert_eq!(erep.read_back(), None);
        assert_eq!(erep.doorbell_status(), Doorbell::empty());
        assert_eq!(regs.peek(STATUS), 1 << 9);
    }

    #[test]
    fn test_watchdog_escalates() {
        let erep = erep();
        let policy = policy();
        let src = source(Severity::Watchdog, Doorbell::FATAL, vec![], erep, policy);

        assert_eq!(src.process(), Outcome::Escalated);
        assert_eq!(src.state(), HandlerState::Escalated);
        assert_eq!(policy.0.load(Ordering::SeqCst), 1);
        assert_eq!(erep.read_back().unwrap().err_type, ErepType::HardwareWdt);
        assert_eq!(erep.doorbell_status(), Doorbell::FATAL);
    }

    #[test]
    fn test_non_fatal_rings_its_own_doorbell() {
        let regs = status_regs(1);
        regs.poke(STATUS, 1);
        let erep = erep();
        let src = source(
            Severity::NonFatal,
            Doorbell::CALIBRATION,
            vec![block(regs, ErepType::Ddr4PhyNf, 1)],
            erep,
            policy(),
        );

        assert!(matches!(src.process(), Outcome::Reported(_)));
        assert_eq!(erep.doorbell_status(), Doorbell::CALIBRATION);
    }

    #[test]
    fn test_each_firing_scans_once() {
        let regs = status_regs(1);
        let erep = erep();
        let src = source(
            Severity::Fatal,
            Doorbell::FATAL,
            vec![block(regs, ErepType::Top, 1)],
            erep,
            policy(),
        );

        regs.poke(STATUS, 1 << 3);
        assert!(matches!(src.process(), Outcome::Reported(_)));
        regs.poke(STATUS, 1 << 6);
        let Outcome::Reported(second) = src.process() else {
            panic!("expected a report");
        };

        assert_eq!(second.sub_category, 6);
        assert_eq!(src.reports(), 2);
        assert_eq!(erep.read_back(), Some(second));
    }

    #[test]
    fn test_dispatch_through_cic() {
        let regs = status_regs(1);
        regs.poke(STATUS, 1 << 2);
        let erep = erep();
        let src = source(
            Severity::Fatal,
            Doorbell::FATAL,
            vec![block(regs, ErepType::Ddr4Phy, 1)],
            erep,
            policy(),
        );
        let sources: &'static [ErrorSource<Bank>] = core::slice::from_ref(src);

        let cic = Cic::<GicEmulator, 64>::new(GicEmulator::new());
        cic.init(&[IntConfig::vpe_pin(0, 1, Trigger::Edge); 64], &[])
            .unwrap();
        register_sources(&cic, sources).unwrap();
        assert_eq!(cic.int_enable_status_get(12), Ok(true));

        cic.int_set(12).unwrap();
        assert_eq!(cic.handle_pending(), 1);

        assert_eq!(src.reports(), 1);
        assert_eq!(src.state(), HandlerState::Idle);
        assert_eq!(erep.read_back().unwrap().sub_category, 2);
        assert_eq!(regs.peek(STATUS), 0);
    }

    #[test]
    fn test_signal_source_reports_its_line() {
        let erep = erep();
        let sources: &'static [ErrorSource<Bank>] = leak([ErrorSource::signal(
            "fail_n",
            54,
            ErepType::Top,
            erep,
            policy(),
        )]);

        let cic = Cic::<GicEmulator, 64>::new(GicEmulator::new());
        cic.init(&[IntConfig::vpe_pin(0, 1, Trigger::Edge); 64], &[])
            .unwrap();
        register_sources(&cic, sources).unwrap();

        cic.int_set(54).unwrap();
        assert_eq!(cic.handle_pending(), 1);

        let report = erep.read_back().unwrap();
        assert_eq!(report.err_type, ErepType::Top);
        assert_eq!(report.sub_category, 54);
        assert_eq!(report.reg_offset, erep::REG_OFFSET_DONT_CARE);
        assert_eq!(report.err_data, 0);
        assert!(!report.multiple_found);
        assert_eq!(erep.doorbell_status(), Doorbell::FATAL);
        assert_eq!(sources[0].reports(), 1);
        assert_eq!(sources[0].state(), HandlerState::Idle);
    }

    #[test]
    fn test_signal_source_reports_every_firing() {
        let erep = erep();
        let src = leak(ErrorSource::signal("timer_2", 58, ErepType::IntervalWdt, erep, policy()));

        assert!(matches!(src.process(), Outcome::Reported(_)));
        assert!(matches!(src.process(), Outcome::Reported(_)));
        assert_eq!(src.reports(), 2);
        assert_eq!(src.severity(), Severity::Fatal);
        assert!(src.blocks().is_empty());
    }

    #[test]
    fn test_two_sources_fire_before_read_back() {
        let ddr = status_regs(1);
        let top = status_regs(1);
        let erep = erep();
        let sources: &'static [ErrorSource<Bank>] = leak([
            ErrorSource::new(
                "ddr",
                12,
                Severity::Fatal,
                Doorbell::FATAL,
                leak([block(ddr, ErepType::Ddr4Phy, 1)]),
                erep,
                policy(),
            ),
            ErrorSource::new(
                "top_nf",
                20,
                Severity::NonFatal,
                Doorbell::CALIBRATION,
                leak([block(top, ErepType::TopNf, 1)]),
                erep,
                policy(),
            ),
        ]);

        let cic = Cic::<GicEmulator, 64>::new(GicEmulator::new());
        cic.init(&[IntConfig::vpe_pin(0, 1, Trigger::Edge); 64], &[])
            .unwrap();
        register_sources(&cic, sources).unwrap();

        ddr.poke(STATUS, 1 << 2);
        top.poke(STATUS, 1 << 5);
        cic.int_set(12).unwrap();
        cic.int_set(20).unwrap();
        assert_eq!(cic.handle_pending(), 2);

        // Lines dispatch in ascending order, the later report owns the slot
        assert_eq!(
            erep.read_back(),
            Some(ErrorReport::new(ErepType::TopNf, 5, STATUS, 1 << 5))
        );
        assert_eq!(erep.doorbell_status(), Doorbell::FATAL | Doorbell::CALIBRATION);
        assert_eq!(erep.reports_sent(), 2);
        assert_eq!(sources[0].reports(), 1);
        assert_eq!(sources[1].reports(), 1);
        assert_eq!(ddr.peek(STATUS), 0);
        assert_eq!(top.peek(STATUS), 0);
    }

    #[test]
    fn test_concurrent_sources_never_tear() {
        let ddr = status_regs(1);
        let top = status_regs(1);
        let erep = erep();
        let a = source_on(
            12,
            Severity::Fatal,
            Doorbell::FATAL,
            vec![block(ddr, ErepType::Ddr4Phy, 1)],
            erep,
            policy(),
        );
        let b = source_on(
            20,
            Severity::NonFatal,
            Doorbell::CALIBRATION,
            vec![block(top, ErepType::TopNf, 1)],
            erep,
            policy(),
        );
        let from_a = ErrorReport::new(ErepType::Ddr4Phy, 2, STATUS, 1 << 2);
        let from_b = ErrorReport::new(ErepType::TopNf, 7, STATUS, 1 << 7);

        let writers: Vec<_> = [(a, ddr, 2u32), (b, top, 7u32)]
            .into_iter()
            .map(|(src, regs, bit)| {
                std::thread::spawn(move || {
                    for _ in 0..300 {
                        regs.poke(STATUS, 1 << bit);
                        assert!(matches!(src.process(), Outcome::Reported(_)));
                    }
                })
            })
            .collect();

        let reader = std::thread::spawn(move || {
            for _ in 0..300 {
                if let Some(seen) = erep.read_back() {
                    assert!(seen == from_a || seen == from_b, "torn descriptor: {:?}", seen);
                }
            }
        });

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let last = erep.read_back().unwrap();
        assert!(last == from_a || last == from_b);
        assert_eq!(a.reports() + b.reports(), 600);
        assert_eq!(erep.reports_sent(), 600);
    }
}
