//! Simulated embedded motor-controller driver.
//!
//! Four core subsystems share a single memory-mapped register file: the motor state machine,
//! the sensor array, and the interrupt controller. The IPC mailbox and the driver loop wire
//! them together into a runnable process that stands in for bare metal.

pub mod driver;
pub mod error;
pub mod interrupts;
pub mod ipc;
pub mod motor;
pub mod registers;
pub mod sensors;
