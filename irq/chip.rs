//! Central Interrupt Controller
//!
//! [`Cic`] owns the GIC register layer and the callback registry. It loads
//! the interrupt configuration table at init, provides the per-line and
//! per-VPE local operations used by drivers, and is the trap-entry point
//! that looks up and invokes the callback of a fired line.
//!
//! Callbacks run in interrupt context, outside of any lock or critical
//! region held by the controller, so they are free to call back into it.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::gic::Gic;
use super::handler::{CallbackArg, CallbackEntry, CallbackFn, CallbackTable, InterruptHandler};
use super::{DestType, IntConfig, IrqNumber, LocalInt, LocalIntConfig, VpeId, MAX_VPES};
use crate::config::CIC_MAX_INTERRUPTS;
use crate::drivers::RegisterFile;
use crate::sync::{CriticalRegion, SpinLock};
use crate::{Error, Result};

type LocalTable = [[Option<CallbackEntry>; LocalInt::COUNT]; MAX_VPES];

/// Dispatch statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqStats {
    /// Global line callbacks invoked
    pub dispatched: u64,
    /// Local source callbacks invoked
    pub local_dispatched: u64,
    /// Lines fired without a registered callback
    pub spurious: u64,
    /// NMI callbacks invoked
    pub nmi: u64,
}

/// Central Interrupt Controller with `N` global lines
pub struct Cic<R: RegisterFile, const N: usize> {
    /// Register layer
    gic: Gic<R>,
    /// Global line callbacks
    callbacks: SpinLock<CallbackTable<N>>,
    /// Local source callbacks, per VPE
    local_callbacks: SpinLock<LocalTable>,
    /// NMI callbacks, per VPE
    nmi_callbacks: SpinLock<[Option<CallbackEntry>; MAX_VPES]>,
    /// VPE this controller instance runs on
    core_id: AtomicU32,
    /// Configuration table loaded
    initialized: AtomicBool,
    /// Statistics
    stats: SpinLock<IrqStats>,
}

impl<R: RegisterFile, const N: usize> Cic<R, N> {
    /// Create a controller over a register file
    pub const fn new(regs: R) -> Self {
        Self {
            gic: Gic::new(regs),
            callbacks: SpinLock::new(CallbackTable::new()),
            local_callbacks: SpinLock::new([[None; LocalInt::COUNT]; MAX_VPES]),
            nmi_callbacks: SpinLock::new([None; MAX_VPES]),
            core_id: AtomicU32::new(0),
            initialized: AtomicBool::new(false),
            stats: SpinLock::new(IrqStats {
                dispatched: 0,
                local_dispatched: 0,
                spurious: 0,
                nmi: 0,
            }),
        }
    }

    /// Get the register layer
    pub fn gic(&self) -> &Gic<R> {
        &self.gic
    }

    /// Number of global lines
    pub const fn num_lines(&self) -> usize {
        N
    }

    /// Whether `init` has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Load the interrupt configuration tables into the controller
    ///
    /// Entry `n` of `global_cfg` configures line `n`. Every global line
    /// and every local source is left disabled; lines past the end of the
    /// table are only masked. The tables are checked before any register
    /// is written.
    pub fn init(&self, global_cfg: &[IntConfig], local_cfg: &[LocalIntConfig]) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        if N > CIC_MAX_INTERRUPTS || global_cfg.len() > N {
            log::error!(
                "CIC: table of {} lines does not fit {} lines",
                global_cfg.len(),
                N
            );
            return Err(Error::InvalidConfig);
        }
        for cfg in global_cfg {
            cfg.validate()?;
        }
        for cfg in local_cfg {
            cfg.validate()?;
        }

        {
            let _region = CriticalRegion::enter();

            for line in 0..N as IrqNumber {
                self.gic.mask(line);
            }

            for (line, cfg) in (0..).zip(global_cfg.iter()) {
                self.gic.set_trigger(line, cfg.trigger);
                self.gic.map_pin(line, cfg.dest_type, cfg.priority);
                self.gic.map_vpe(line, cfg.dest_id);
                self.gic.clear_edge(line);
            }

            for vpe in 0..MAX_VPES as VpeId {
                for int in LocalInt::ALL {
                    self.gic.local_mask(vpe, int);
                }
            }

            for cfg in local_cfg {
                self.gic
                    .local_map(cfg.dest_id, cfg.int_id, cfg.dest_type, cfg.priority);
            }
        }

        self.initialized.store(true, Ordering::Release);

        log::info!(
            "CIC initialized: {} global lines, {} configured, {} local sources",
            N,
            global_cfg.len(),
            local_cfg.len()
        );

        Ok(())
    }

    /// Record the VPE this controller instance runs on
    pub fn set_core(&self, core_id: VpeId) -> Result<()> {
        Self::check_vpe(core_id)?;
        self.core_id.store(core_id, Ordering::Relaxed);
        log::debug!("CIC: running on VPE {}", core_id);
        Ok(())
    }

    /// VPE recorded by `set_core`
    pub fn core(&self) -> VpeId {
        self.core_id.load(Ordering::Relaxed)
    }

    /// Install a function callback for a line, without enabling it
    pub fn int_register(&self, line: IrqNumber, callback: CallbackFn, arg: CallbackArg) -> Result<()> {
        self.register_entry(line, CallbackEntry::function(callback, arg))
    }

    /// Install a handler object for a line, without enabling it
    pub fn int_register_handler(
        &self,
        line: IrqNumber,
        handler: &'static dyn InterruptHandler,
        arg: CallbackArg,
    ) -> Result<()> {
        self.register_entry(line, CallbackEntry::handler(handler, arg))
    }

    fn register_entry(&self, line: IrqNumber, entry: CallbackEntry) -> Result<()> {
        self.check_line(line)?;
        self.callbacks.lock_irq_disabled().register(line, entry)?;
        log::debug!("CIC: line {} -> {}", line, entry.name());
        Ok(())
    }

    /// Enable a line
    ///
    /// The line must have a registered callback; otherwise it stays
    /// disabled and `Error::NoHandler` is returned.
    pub fn int_enable(&self, line: IrqNumber) -> Result<()> {
        self.check_line(line)?;

        let _region = CriticalRegion::enter();
        if !self.callbacks.lock_irq_disabled().is_registered(line) {
            log::error!("CIC: line {} enabled without a callback", line);
            return Err(Error::NoHandler);
        }
        self.gic.unmask(line);
        Ok(())
    }

    /// Disable a line
    pub fn int_disable(&self, line: IrqNumber) -> Result<()> {
        self.check_line(line)?;
        self.gic.mask(line);
        Ok(())
    }

    /// Force-assert a line
    pub fn int_set(&self, line: IrqNumber) -> Result<()> {
        self.check_line(line)?;
        self.gic.set_edge(line);
        Ok(())
    }

    /// Acknowledge a latched edge on a line
    pub fn int_clear(&self, line: IrqNumber) -> Result<()> {
        self.check_line(line)?;
        self.gic.clear_edge(line);
        Ok(())
    }

    /// Whether a line is pending
    pub fn int_status_get(&self, line: IrqNumber) -> Result<bool> {
        self.check_line(line)?;
        Ok(self.gic.is_pending(line))
    }

    /// Whether a line is enabled
    pub fn int_enable_status_get(&self, line: IrqNumber) -> Result<bool> {
        self.check_line(line)?;
        Ok(self.gic.is_enabled(line))
    }

    /// Route a line to the interrupt pin of `vpe`, keeping its priority
    pub fn int_vpe_routing_set(&self, line: IrqNumber, vpe: VpeId) -> Result<()> {
        self.reroute(line, vpe, DestType::VpePin)
    }

    /// Route a line to the yield qualifier of `vpe`, keeping its priority
    pub fn int_yq_routing_set(&self, line: IrqNumber, vpe: VpeId) -> Result<()> {
        self.reroute(line, vpe, DestType::CoreYq)
    }

    fn reroute(&self, line: IrqNumber, vpe: VpeId, dest_type: DestType) -> Result<()> {
        self.check_line(line)?;
        Self::check_vpe(vpe)?;

        let _region = CriticalRegion::enter();
        let priority = self.gic.pin_map(line).map_or(0, |(_, priority)| priority);
        self.gic.map_pin(line, dest_type, priority);
        self.gic.map_vpe(line, vpe);
        Ok(())
    }

    /// Install a callback for a local source of `vpe`
    pub fn local_int_register(
        &self,
        vpe: VpeId,
        int: LocalInt,
        callback: CallbackFn,
        arg: CallbackArg,
    ) -> Result<()> {
        self.check_init()?;
        Self::check_vpe(vpe)?;
        self.local_callbacks.lock_irq_disabled()[vpe as usize][int.index()] =
            Some(CallbackEntry::function(callback, arg));
        Ok(())
    }

    /// Enable a local source of `vpe`
    pub fn local_int_enable(&self, vpe: VpeId, int: LocalInt) -> Result<()> {
        self.check_init()?;
        Self::check_vpe(vpe)?;

        let _region = CriticalRegion::enter();
        if self.local_callbacks.lock_irq_disabled()[vpe as usize][int.index()].is_none() {
            log::error!("CIC: local {:?} of VPE {} enabled without a callback", int, vpe);
            return Err(Error::NoHandler);
        }
        self.gic.local_unmask(vpe, int);
        Ok(())
    }

    /// Disable a local source of `vpe`
    pub fn local_int_disable(&self, vpe: VpeId, int: LocalInt) -> Result<()> {
        self.check_init()?;
        Self::check_vpe(vpe)?;
        self.gic.local_mask(vpe, int);
        Ok(())
    }

    /// Whether a local source of `vpe` is pending
    pub fn local_int_status_get(&self, vpe: VpeId, int: LocalInt) -> Result<bool> {
        self.check_init()?;
        Self::check_vpe(vpe)?;
        Ok(self.gic.local_is_pending(vpe, int))
    }

    /// Whether a local source of `vpe` is enabled
    pub fn local_int_enable_status_get(&self, vpe: VpeId, int: LocalInt) -> Result<bool> {
        self.check_init()?;
        Self::check_vpe(vpe)?;
        Ok(self.gic.local_is_enabled(vpe, int))
    }

    /// Install the NMI callback of `vpe`
    pub fn nmi_register(&self, vpe: VpeId, callback: CallbackFn, arg: CallbackArg) -> Result<()> {
        Self::check_vpe(vpe)?;
        self.nmi_callbacks.lock_irq_disabled()[vpe as usize] =
            Some(CallbackEntry::function(callback, arg));
        Ok(())
    }

    /// Raise a non-maskable interrupt on this VPE
    pub fn nmi(&self) {
        let core = self.core();
        log::error!("CIC: raising NMI on VPE {}", core);
        self.gic.raise_nmi(core);
    }

    /// Trap entry for a fired line
    ///
    /// Clears the line's edge latch, then invokes the line's callback once.
    /// The latch holds both hardware edges and `int_set` assertions; a level
    /// input still driven by hardware stays pending. A line without a
    /// callback is spurious: it is disabled so it cannot fire again, and
    /// counted.
    pub fn dispatch(&self, line: IrqNumber) {
        if line as usize >= N {
            log::warn!("CIC: dispatch of out-of-range line {}", line);
            self.stats.lock_irq_disabled().spurious += 1;
            return;
        }

        self.gic.clear_edge(line);

        let entry = self.callbacks.lock_irq_disabled().get(line);
        match entry {
            Some(entry) => {
                self.stats.lock_irq_disabled().dispatched += 1;
                entry.invoke();
            }
            None => {
                self.gic.mask(line);
                self.stats.lock_irq_disabled().spurious += 1;
                log::warn!("CIC: spurious interrupt on line {}, line disabled", line);
            }
        }
    }

    /// Trap entry for the interrupt pin of this VPE
    ///
    /// Dispatches every line that is pending, enabled and routed to this
    /// VPE, once each, in line order. Returns the number of lines
    /// dispatched.
    pub fn handle_pending(&self) -> usize {
        let core = self.core();
        let mut handled = 0;

        for word in 0..N.div_ceil(32) as u32 {
            let mut active = self.gic.active_word(word);
            while active != 0 {
                let bit = active.trailing_zeros();
                active &= active - 1;

                let line = word * 32 + bit;
                if line as usize >= N || !self.gic.routed_to(line, core) {
                    continue;
                }
                self.dispatch(line);
                handled += 1;
            }
        }

        handled
    }

    /// Trap entry for the local sources of `vpe`
    ///
    /// Returns the number of sources dispatched.
    pub fn dispatch_local(&self, vpe: VpeId) -> usize {
        if Self::check_vpe(vpe).is_err() {
            return 0;
        }

        let active = self.gic.local_active(vpe);
        let mut handled = 0;

        for int in LocalInt::ALL {
            if active & int.bit() == 0 {
                continue;
            }
            let entry = self.local_callbacks.lock_irq_disabled()[vpe as usize][int.index()];
            match entry {
                Some(entry) => {
                    self.stats.lock_irq_disabled().local_dispatched += 1;
                    entry.invoke();
                    handled += 1;
                }
                None => {
                    self.gic.local_mask(vpe, int);
                    self.stats.lock_irq_disabled().spurious += 1;
                    log::warn!("CIC: spurious local {:?} on VPE {}, source disabled", int, vpe);
                }
            }
        }

        handled
    }

    /// Trap entry for the NMI vector of `vpe`
    ///
    /// Returns false if no NMI callback is installed.
    pub fn dispatch_nmi(&self, vpe: VpeId) -> bool {
        let entry = self
            .nmi_callbacks
            .lock_irq_disabled()
            .get(vpe as usize)
            .copied()
            .flatten();

        match entry {
            Some(entry) => {
                self.stats.lock_irq_disabled().nmi += 1;
                entry.invoke();
                true
            }
            None => {
                log::error!("CIC: NMI on VPE {} with no callback", vpe);
                false
            }
        }
    }

    /// Get dispatch statistics
    pub fn stats(&self) -> IrqStats {
        *self.stats.lock_irq_disabled()
    }

    fn check_init(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn check_line(&self, line: IrqNumber) -> Result<()> {
        self.check_init()?;
        if line as usize >= N {
            return Err(Error::InvalidIrq);
        }
        Ok(())
    }

    fn check_vpe(vpe: VpeId) -> Result<()> {
        if vpe as usize >= MAX_VPES {
            return Err(Error::InvalidVpe);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::GicEmulator;
    use crate::irq::handler::CountingHandler;
    use crate::irq::Trigger;
    use core::sync::atomic::AtomicUsize;
    use test_case::test_case;

    type TestCic = Cic<GicEmulator, 64>;

    fn table() -> [IntConfig; 64] {
        let mut cfg = [IntConfig::vpe_pin(0, 1, Trigger::Level); 64];
        for line in [8, 9, 11, 12, 33, 34, 37, 38] {
            cfg[line].trigger = Trigger::Edge;
        }
        cfg[20] = IntConfig::vpe_pin(3, 1, Trigger::Edge);
        cfg
    }

    fn cic() -> TestCic {
        let cic = TestCic::new(GicEmulator::new());
        cic.init(&table(), &[]).unwrap();
        cic
    }

    fn ignore(_arg: CallbackArg) {}

    #[test]
    fn test_all_lines_disabled_after_init() {
        let cic = cic();
        // Enable state left over from a previous boot must not survive init
        let dirty = TestCic::new(GicEmulator::new());
        dirty.gic().unmask(5);
        dirty.init(&table(), &[]).unwrap();

        for line in 0..64 {
            assert_eq!(cic.int_enable_status_get(line), Ok(false));
            assert_eq!(dirty.int_enable_status_get(line), Ok(false));
        }
    }

    #[test]
    fn test_init_programs_table() {
        let cic = cic();

        assert_eq!(cic.gic().trigger(9), Trigger::Edge);
        assert_eq!(cic.gic().trigger(10), Trigger::Level);
        assert_eq!(cic.gic().pin_map(10), Some((DestType::VpePin, 1)));
        assert!(cic.gic().routed_to(10, 0));
        assert!(cic.gic().routed_to(20, 3));
    }

    #[test]
    fn test_second_init_rejected() {
        let cic = cic();
        assert_eq!(cic.init(&table(), &[]), Err(Error::AlreadyInitialized));
    }

    #[test]
    fn test_init_rejects_bad_tables() {
        let cic = Cic::<GicEmulator, 32>::new(GicEmulator::new());
        assert_eq!(cic.init(&table(), &[]), Err(Error::InvalidConfig));

        let bad_vpe = [IntConfig::vpe_pin(7, 1, Trigger::Level)];
        assert_eq!(cic.init(&bad_vpe, &[]), Err(Error::InvalidVpe));
        assert!(!cic.is_initialized());

        assert!(cic.init(&table()[..32], &[]).is_ok());
    }

    #[test]
    fn test_operations_before_init() {
        let cic = TestCic::new(GicEmulator::new());
        assert_eq!(cic.int_enable(3), Err(Error::NotInitialized));
        assert_eq!(cic.int_register(3, ignore, 0), Err(Error::NotInitialized));
        assert_eq!(
            cic.local_int_disable(0, LocalInt::Timer),
            Err(Error::NotInitialized)
        );
    }

    #[test_case(64 ; "first line past the table")]
    #[test_case(255 ; "hardware maximum")]
    fn test_out_of_range_line(line: IrqNumber) {
        let cic = cic();
        assert_eq!(cic.int_enable(line), Err(Error::InvalidIrq));
        assert_eq!(cic.int_set(line), Err(Error::InvalidIrq));
        assert_eq!(cic.int_status_get(line), Err(Error::InvalidIrq));
        assert_eq!(cic.int_register(line, ignore, 0), Err(Error::InvalidIrq));
    }

    #[test]
    fn test_enable_without_callback() {
        let cic = cic();
        assert_eq!(cic.int_enable(17), Err(Error::NoHandler));
        assert_eq!(cic.int_enable_status_get(17), Ok(false));
    }

    #[test]
    fn test_fire_invokes_callback_once_with_arg() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        static LAST_ARG: AtomicUsize = AtomicUsize::new(0);

        fn on_fire(arg: CallbackArg) {
            CALLS.fetch_add(1, Ordering::SeqCst);
            LAST_ARG.store(arg, Ordering::SeqCst);
        }

        let cic = cic();
        cic.int_register(12, on_fire, 0xC0FFEE).unwrap();
        cic.int_enable(12).unwrap();

        cic.int_set(12).unwrap();
        assert_eq!(cic.int_status_get(12), Ok(true));

        assert_eq!(cic.handle_pending(), 1);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_ARG.load(Ordering::SeqCst), 0xC0FFEE);

        // The edge was acknowledged, nothing fires again
        assert_eq!(cic.int_status_get(12), Ok(false));
        assert_eq!(cic.handle_pending(), 0);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(cic.stats().dispatched, 1);
    }

    #[test]
    fn test_level_line_set_by_software_fires_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        fn on_fire(_arg: CallbackArg) {
            CALLS.fetch_add(1, Ordering::SeqCst);
        }

        let cic = cic();
        assert_eq!(cic.gic().trigger(10), Trigger::Level);
        cic.int_register(10, on_fire, 10).unwrap();
        cic.int_enable(10).unwrap();
        cic.int_set(10).unwrap();

        assert_eq!(cic.handle_pending(), 1);
        assert_eq!(cic.handle_pending(), 0);
        assert_eq!(cic.handle_pending(), 0);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hardware_level_stays_pending() {
        let cic = cic();
        cic.int_register(13, ignore, 0).unwrap();
        cic.int_enable(13).unwrap();
        cic.gic().regs().assert_line(13);

        assert_eq!(cic.handle_pending(), 1);
        assert_eq!(cic.int_status_get(13), Ok(true));

        cic.gic().regs().deassert_line(13);
        assert_eq!(cic.handle_pending(), 0);
    }

    #[test]
    fn test_register_with_interrupts_disabled() {
        let cic = cic();

        CriticalRegion::run(|| {
            cic.int_register(21, ignore, 0).unwrap();
            cic.int_enable(21).unwrap();
            cic.local_int_register(0, LocalInt::SwInt0, ignore, 0).unwrap();
            cic.nmi_register(0, ignore, 0).unwrap();
            log::info!("registered with interrupts disabled");
            assert_eq!(cic.stats(), IrqStats::default());
        });

        assert_eq!(cic.int_enable_status_get(21), Ok(true));
        cic.int_set(21).unwrap();
        assert_eq!(cic.handle_pending(), 1);
    }

    #[test]
    fn test_full_size_controller() {
        let cic = Cic::<GicEmulator, CIC_MAX_INTERRUPTS>::new(GicEmulator::new());
        let table = [IntConfig::vpe_pin(2, 1, Trigger::Level); CIC_MAX_INTERRUPTS];
        cic.init(&table, &[]).unwrap();

        for line in 0..CIC_MAX_INTERRUPTS as IrqNumber {
            assert!(cic.gic().routed_to(line, 2), "line {} not routed", line);
            assert_eq!(cic.gic().pin_map(line), Some((DestType::VpePin, 1)));
            assert_eq!(cic.int_enable_status_get(line), Ok(false));
        }

        cic.set_core(2).unwrap();
        cic.int_register(255, ignore, 0).unwrap();
        cic.int_enable(255).unwrap();
        cic.int_set(255).unwrap();
        assert_eq!(cic.handle_pending(), 1);
    }

    #[test]
    fn test_handler_object_dispatch() {
        static HANDLER: CountingHandler = CountingHandler::new(ignore, "ddr-phy");

        let cic = cic();
        cic.int_register_handler(11, &HANDLER, 0).unwrap();
        cic.int_enable(11).unwrap();
        cic.int_set(11).unwrap();

        assert_eq!(cic.handle_pending(), 1);
        assert_eq!(HANDLER.call_count(), 1);
    }

    #[test]
    fn test_disable_is_idempotent() {
        let cic = cic();
        cic.int_register(40, ignore, 0).unwrap();
        cic.int_enable(40).unwrap();

        cic.int_disable(40).unwrap();
        cic.int_disable(40).unwrap();
        assert_eq!(cic.int_enable_status_get(40), Ok(false));
    }

    #[test]
    fn test_enable_disable_round_trip() {
        let cic = cic();
        cic.int_register(41, ignore, 0).unwrap();
        let before: Vec<u32> = (0..2).map(|w| cic.gic().regs().peek(0x400 + w * 4)).collect();

        cic.int_enable(41).unwrap();
        assert_eq!(cic.int_enable_status_get(41), Ok(true));
        cic.int_disable(41).unwrap();

        let after: Vec<u32> = (0..2).map(|w| cic.gic().regs().peek(0x400 + w * 4)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_masked_line_not_dispatched() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        fn count(_arg: CallbackArg) {
            CALLS.fetch_add(1, Ordering::SeqCst);
        }

        let cic = cic();
        cic.int_register(8, count, 0).unwrap();
        cic.int_set(8).unwrap();

        assert_eq!(cic.handle_pending(), 0);
        assert_eq!(cic.int_status_get(8), Ok(true));
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_only_lines_routed_here_are_dispatched() {
        let cic = cic();
        cic.int_register(20, ignore, 0).unwrap();
        cic.int_enable(20).unwrap();
        cic.int_set(20).unwrap();

        // Line 20 targets VPE 3
        assert_eq!(cic.handle_pending(), 0);

        cic.set_core(3).unwrap();
        assert_eq!(cic.handle_pending(), 1);
    }

    #[test]
    fn test_spurious_line_is_masked() {
        let cic = cic();
        cic.gic().unmask(50);
        cic.gic().regs().assert_line(50);

        assert_eq!(cic.handle_pending(), 1);
        assert_eq!(cic.int_enable_status_get(50), Ok(false));
        assert_eq!(cic.stats().spurious, 1);
        assert_eq!(cic.stats().dispatched, 0);
    }

    #[test]
    fn test_routing_updates() {
        let cic = cic();

        cic.int_vpe_routing_set(30, 2).unwrap();
        assert!(cic.gic().routed_to(30, 2));
        assert!(!cic.gic().routed_to(30, 0));
        assert_eq!(cic.gic().pin_map(30), Some((DestType::VpePin, 1)));

        cic.int_yq_routing_set(30, 1).unwrap();
        assert!(cic.gic().routed_to(30, 1));
        assert_eq!(cic.gic().pin_map(30), Some((DestType::CoreYq, 1)));

        assert_eq!(cic.int_vpe_routing_set(30, 6), Err(Error::InvalidVpe));
    }

    #[test]
    fn test_local_interrupts() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        fn tick(arg: CallbackArg) {
            CALLS.fetch_add(arg, Ordering::SeqCst);
        }

        let cic = TestCic::new(GicEmulator::new());
        let local = [LocalIntConfig::new(LocalInt::Timer, DestType::VpePin, 1, 2)];
        cic.init(&table(), &local).unwrap();

        assert_eq!(cic.local_int_enable(1, LocalInt::Timer), Err(Error::NoHandler));
        cic.local_int_register(1, LocalInt::Timer, tick, 5).unwrap();
        cic.local_int_enable(1, LocalInt::Timer).unwrap();
        assert_eq!(cic.local_int_enable_status_get(1, LocalInt::Timer), Ok(true));

        cic.gic().regs().assert_local(1, LocalInt::Timer);
        assert_eq!(cic.local_int_status_get(1, LocalInt::Timer), Ok(true));
        assert_eq!(cic.dispatch_local(1), 1);
        assert_eq!(CALLS.load(Ordering::SeqCst), 5);

        cic.local_int_disable(1, LocalInt::Timer).unwrap();
        assert_eq!(cic.dispatch_local(1), 0);
        assert_eq!(cic.local_int_enable(6, LocalInt::Timer), Err(Error::InvalidVpe));
    }

    #[test]
    fn test_nmi() {
        static NMI_ARG: AtomicUsize = AtomicUsize::new(0);

        fn on_nmi(arg: CallbackArg) {
            NMI_ARG.store(arg, Ordering::SeqCst);
        }

        let cic = cic();
        cic.set_core(2).unwrap();
        assert!(!cic.dispatch_nmi(2));

        cic.nmi_register(2, on_nmi, 0x42).unwrap();
        cic.nmi();
        assert_eq!(cic.gic().regs().nmi_count(2), 1);

        assert!(cic.dispatch_nmi(2));
        assert_eq!(NMI_ARG.load(Ordering::SeqCst), 0x42);
        assert_eq!(cic.stats().nmi, 1);
    }

    #[test]
    fn test_callback_may_disable_its_line() {
        static CIC: TestCic = TestCic::new(GicEmulator::new());

        fn one_shot(line: CallbackArg) {
            CIC.int_disable(line as IrqNumber).unwrap();
        }

        CIC.init(&table(), &[]).unwrap();
        CIC.int_register(37, one_shot, 37).unwrap();
        CIC.int_enable(37).unwrap();
        CIC.int_set(37).unwrap();

        assert_eq!(CIC.handle_pending(), 1);
        assert_eq!(CIC.int_enable_status_get(37), Ok(false));
    }
}
