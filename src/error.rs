//! Error classification shared across the core.
//!
//! The leaf operations in [`crate::motor`], [`crate::sensors`], and [`crate::interrupts`] keep
//! the original integer contract (zero success, negative failure) rather than returning
//! `Result<_, DriverError>`, because that contract is an external invariant the test suite
//! depends on bit-for-bit. `DriverError` exists alongside it purely to name the four classes of
//! failure the core can produce, so each constant and fallible path can document which class it
//! belongs to instead of leaving the classification implicit in a magic number.

use std::fmt;

/// The four error classes the core distinguishes. See each variant for where it shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// An out-of-range register offset or interrupt source index.
    InvalidArgument,
    /// An operation attempted from a state that forbids it: starting a motor in fault,
    /// triggering a disabled sensor array, triggering a disabled interrupt source.
    PreconditionViolated,
    /// The sensor ring was full; the sample was dropped and `SENSOR_STATUS.overflow` was set.
    CapacityExhausted,
    /// A fault bit observed on `MOTOR_STATUS` (stall, overheat, overcurrent).
    TransientHardware,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DriverError::InvalidArgument => "invalid argument",
            DriverError::PreconditionViolated => "precondition violated",
            DriverError::CapacityExhausted => "capacity exhausted",
            DriverError::TransientHardware => "transient hardware fault",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for DriverError {}
