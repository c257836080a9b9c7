//! Interrupt controller
//!
//! Tracks enable/pending masks across 5 sources, dispatches registered handlers in ascending
//! source order, and bridges host signals (SIGUSR1/SIGUSR2 for events, SIGINT/SIGTERM for
//! shutdown) into the pending mask from an async-signal context. Only one controller instance
//! may be installed at a time; the process-wide slot it occupies is a pair of atomics so the
//! signal handler never takes a lock. Like the motor and sensor array, the register file is
//! passed into each call rather than stored, so all three subsystems can be driven from a single
//! owned register file without aliasing.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::low_level::{self, SigId};

use crate::registers::{RegisterFile, REG_IRQ_ENABLE, REG_IRQ_STATUS};

pub const SOURCE_COUNT: usize = 5;

pub const OK: i32 = 0;
pub const ERR: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSource {
    MotorFault = 0,
    MotorStall = 1,
    SensorReady = 2,
    SensorError = 3,
    Timer = 4,
}

impl InterruptSource {
    pub const ALL: [InterruptSource; SOURCE_COUNT] = [
        InterruptSource::MotorFault,
        InterruptSource::MotorStall,
        InterruptSource::SensorReady,
        InterruptSource::SensorError,
        InterruptSource::Timer,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    fn bit(self) -> u32 {
        1 << self.index()
    }
}

type Handler = Box<dyn FnMut(InterruptSource, &mut dyn Any) + Send>;

struct HandlerEntry {
    handler: Handler,
    context: Box<dyn Any + Send>,
}

// Process-wide signal bridge state. Touched only with atomic ops so the signal handler (which
// must be async-signal-safe) never blocks. `BRIDGED_PENDING` accumulates bits set directly by
// the signal handler; `process_pending` folds it into the owning controller's own mask.
static SIGNAL_LATCH: AtomicBool = AtomicBool::new(false);
static BRIDGED_PENDING: AtomicU32 = AtomicU32::new(0);
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Returns true once SIGINT or SIGTERM has been observed.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Acquire)
}

fn bridge_motor_fault() {
    BRIDGED_PENDING.fetch_or(InterruptSource::MotorFault.bit(), Ordering::AcqRel);
    SIGNAL_LATCH.store(true, Ordering::Release);
}

fn bridge_sensor_ready() {
    BRIDGED_PENDING.fetch_or(InterruptSource::SensorReady.bit(), Ordering::AcqRel);
    SIGNAL_LATCH.store(true, Ordering::Release);
}

fn bridge_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Release);
}

/// Interrupt controller: masks, handler table, and the signal bridge installation.
pub struct IrqController {
    handlers: [Option<HandlerEntry>; SOURCE_COUNT],
    enabled_mask: u32,
    pending_mask: u32,
    sig_ids: Vec<SigId>,
}

impl IrqController {
    /// Zero all masks/handlers and zero IRQ_STATUS/IRQ_ENABLE. Does not install the signal
    /// bridge; call [`setup_signal_handler`](Self::setup_signal_handler) separately.
    pub fn new(regs: &mut RegisterFile) -> Self {
        regs.write(REG_IRQ_STATUS, 0);
        regs.write(REG_IRQ_ENABLE, 0);

        Self {
            handlers: [None, None, None, None, None],
            enabled_mask: 0,
            pending_mask: 0,
            sig_ids: Vec::new(),
        }
    }

    pub fn register_handler<F, C>(&mut self, source: InterruptSource, handler: F, context: C) -> i32
    where
        F: FnMut(InterruptSource, &mut dyn Any) + Send + 'static,
        C: Any + Send + 'static,
    {
        self.handlers[source.index()] = Some(HandlerEntry {
            handler: Box::new(handler),
            context: Box::new(context),
        });
        OK
    }

    pub fn unregister_handler(&mut self, source: InterruptSource) -> i32 {
        self.handlers[source.index()] = None;
        OK
    }

    pub fn enable(&mut self, regs: &mut RegisterFile, source: InterruptSource) -> i32 {
        self.enabled_mask |= source.bit();
        regs.write(REG_IRQ_ENABLE, self.enabled_mask);
        OK
    }

    pub fn disable(&mut self, regs: &mut RegisterFile, source: InterruptSource) -> i32 {
        self.enabled_mask &= !source.bit();
        regs.write(REG_IRQ_ENABLE, self.enabled_mask);
        OK
    }

    pub fn enable_all(&mut self, regs: &mut RegisterFile) {
        self.enabled_mask = (1 << SOURCE_COUNT) - 1;
        regs.write(REG_IRQ_ENABLE, self.enabled_mask);
    }

    pub fn disable_all(&mut self, regs: &mut RegisterFile) {
        self.enabled_mask = 0;
        regs.write(REG_IRQ_ENABLE, 0);
    }

    /// Set the pending bit for `source`, but only if it is currently enabled.
    ///
    /// A trigger against a disabled source is a
    /// [`crate::error::DriverError::PreconditionViolated`] condition; it is silently dropped
    /// rather than queued, matching §4.4's gating rule.
    pub fn trigger(&mut self, regs: &mut RegisterFile, source: InterruptSource) -> i32 {
        if self.enabled_mask & source.bit() == 0 {
            return ERR;
        }
        self.pending_mask |= source.bit();
        regs.write(REG_IRQ_STATUS, self.pending_mask);
        OK
    }

    pub fn is_pending(&self, source: InterruptSource) -> bool {
        self.pending_mask & source.bit() != 0
    }

    pub fn get_pending_mask(&self) -> u32 {
        self.pending_mask
    }

    pub fn clear(&mut self, regs: &mut RegisterFile, source: InterruptSource) -> i32 {
        self.pending_mask &= !source.bit();
        regs.write(REG_IRQ_STATUS, self.pending_mask);
        OK
    }

    /// Install the host signal bridge: SIGUSR1 -> motor_fault, SIGUSR2 -> sensor_ready, both also
    /// setting the latch; SIGINT/SIGTERM -> process-wide shutdown flag.
    pub fn setup_signal_handler(&mut self) -> i32 {
        if INSTALLED.swap(true, Ordering::AcqRel) {
            return ERR;
        }

        let result = (|| -> Result<(), std::io::Error> {
            unsafe {
                self.sig_ids
                    .push(low_level::register(SIGUSR1, bridge_motor_fault)?);
                self.sig_ids
                    .push(low_level::register(SIGUSR2, bridge_sensor_ready)?);
                self.sig_ids.push(low_level::register(SIGINT, bridge_shutdown)?);
                self.sig_ids.push(low_level::register(SIGTERM, bridge_shutdown)?);
            }
            Ok(())
        })();

        if result.is_err() {
            INSTALLED.store(false, Ordering::Release);
            return ERR;
        }
        OK
    }

    /// Drain entry point. Folds the signal latch into a timer interrupt, folds any bridged
    /// pending bits in, dispatches handlers in ascending source order, then clears the pending
    /// mask and IRQ_STATUS.
    pub fn process_pending(&mut self, regs: &mut RegisterFile) -> usize {
        if SIGNAL_LATCH.swap(false, Ordering::AcqRel) {
            self.trigger(regs, InterruptSource::Timer);
        }

        let bridged = BRIDGED_PENDING.swap(0, Ordering::AcqRel);
        if bridged != 0 {
            self.pending_mask |= bridged;
            regs.write(REG_IRQ_STATUS, self.pending_mask);
        }

        let mut dispatched = 0;
        for source in InterruptSource::ALL {
            if self.pending_mask & source.bit() == 0 {
                continue;
            }
            if let Some(entry) = self.handlers[source.index()].as_mut() {
                println!("[irq] dispatching source {}", source.index());
                (entry.handler)(source, entry.context.as_mut());
                dispatched += 1;
            }
        }

        self.pending_mask = 0;
        regs.write(REG_IRQ_STATUS, 0);
        dispatched
    }

    /// Disable everything, uninstall the signal bridge, and restore default dispositions.
    pub fn cleanup(&mut self, regs: &mut RegisterFile) {
        self.disable_all(regs);
        for id in self.sig_ids.drain(..) {
            low_level::unregister(id);
        }
        INSTALLED.store(false, Ordering::Release);
        SIGNAL_LATCH.store(false, Ordering::Release);
        BRIDGED_PENDING.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::sync::Arc;

    #[test]
    fn disabled_source_trigger_is_dropped() {
        let mut regs = RegisterFile::new();
        let mut irq = IrqController::new(&mut regs);
        assert_eq!(irq.trigger(&mut regs, InterruptSource::MotorFault), ERR);
        assert_eq!(irq.get_pending_mask(), 0);
    }

    #[test]
    fn enabled_source_trigger_sets_pending_bit_and_register() {
        let mut regs = RegisterFile::new();
        let mut irq = IrqController::new(&mut regs);
        irq.enable(&mut regs, InterruptSource::SensorReady);
        irq.trigger(&mut regs, InterruptSource::SensorReady);

        assert!(irq.is_pending(InterruptSource::SensorReady));
        assert_ne!(regs.read(REG_IRQ_STATUS) & InterruptSource::SensorReady.bit(), 0);
    }

    #[test]
    fn process_pending_dispatches_and_clears_mask() {
        let mut regs = RegisterFile::new();
        let mut irq = IrqController::new(&mut regs);
        let counter = Arc::new(AtomicI32::new(0));
        let counter_handle = counter.clone();

        irq.register_handler(
            InterruptSource::MotorFault,
            move |_src, _ctx| {
                counter_handle.fetch_add(1, Ordering::SeqCst);
            },
            (),
        );
        irq.enable(&mut regs, InterruptSource::MotorFault);

        irq.trigger(&mut regs, InterruptSource::MotorFault);
        let dispatched = irq.process_pending(&mut regs);
        assert_eq!(dispatched, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(irq.get_pending_mask(), 0);
        assert_eq!(regs.read(REG_IRQ_STATUS), 0);

        irq.trigger(&mut regs, InterruptSource::MotorFault);
        irq.process_pending(&mut regs);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_handler_still_clears_pending_bit() {
        let mut regs = RegisterFile::new();
        let mut irq = IrqController::new(&mut regs);
        irq.enable(&mut regs, InterruptSource::Timer);
        irq.trigger(&mut regs, InterruptSource::Timer);

        let dispatched = irq.process_pending(&mut regs);
        assert_eq!(dispatched, 0);
        assert_eq!(irq.get_pending_mask(), 0);
    }

    #[test]
    fn enable_all_sets_full_mask() {
        let mut regs = RegisterFile::new();
        let mut irq = IrqController::new(&mut regs);
        irq.enable_all(&mut regs);
        assert_eq!(regs.read(REG_IRQ_ENABLE), (1 << SOURCE_COUNT) - 1);
    }

    #[test]
    fn clear_removes_only_the_named_bit() {
        let mut regs = RegisterFile::new();
        let mut irq = IrqController::new(&mut regs);
        irq.enable_all(&mut regs);
        irq.trigger(&mut regs, InterruptSource::MotorFault);
        irq.trigger(&mut regs, InterruptSource::SensorReady);

        irq.clear(&mut regs, InterruptSource::MotorFault);
        assert!(!irq.is_pending(InterruptSource::MotorFault));
        assert!(irq.is_pending(InterruptSource::SensorReady));
    }

    #[test]
    fn dispatch_order_is_ascending_by_source_index() {
        let mut regs = RegisterFile::new();
        let mut irq = IrqController::new(&mut regs);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for source in InterruptSource::ALL {
            let order_handle = order.clone();
            irq.register_handler(
                source,
                move |src, _ctx| {
                    order_handle.lock().unwrap().push(src.index());
                },
                (),
            );
            irq.enable(&mut regs, source);
            irq.trigger(&mut regs, source);
        }

        irq.process_pending(&mut regs);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
