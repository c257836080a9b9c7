//! Motor state machine
//!
//! Drives a register-backed actuator through an explicit lifecycle: idle, starting, running,
//! stopping, fault, recovery. Speed is ramped 500 units per tick; position is integrated from
//! current speed once per tick. The register file is the authoritative external view; the
//! fields on [`Motor`] are authoritative for state-machine decisions, and every transition that
//! changes externally visible status keeps both in sync. The register file is owned by the
//! driver context, so every operation here takes it as a parameter rather than storing a
//! reference, which lets the motor, sensor, and interrupt subsystems coexist without aliasing.

use crate::registers::{
    RegisterFile, MOTOR_CTRL_BRAKE, MOTOR_CTRL_DIR_CW, MOTOR_CTRL_ENABLE, MOTOR_CTRL_RESET,
    MOTOR_STATUS_FAULT, MOTOR_STATUS_OVERHEAT, MOTOR_STATUS_RUNNING, MOTOR_STATUS_STALL,
    REG_MOTOR_CTRL, REG_MOTOR_POSITION, REG_MOTOR_SPEED, REG_MOTOR_STATUS,
};

/// Maximum commandable speed.
pub const MAX_SPEED: u32 = 10_000;
/// Speed change per `update()` tick.
pub const SPEED_RAMP_RATE: u32 = 500;

/// Success return code for the integer-contract entry points.
pub const OK: i32 = 0;
/// Generic failure return code.
pub const ERR: i32 = -1;
/// Returned by `start`/`set_speed` when the motor is in fault.
///
/// Classified as [`crate::error::DriverError::PreconditionViolated`].
pub const ERR_FAULT: i32 = -2;

/// Motor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Idle,
    Starting,
    Running,
    Stopping,
    Fault,
    Recovery,
}

/// Rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ccw = 0,
    Cw = 1,
}

/// Fault classification, assigned by priority stall > overheat > overcurrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    None,
    Stall,
    Overheat,
    Overcurrent,
}

/// The motor state machine.
pub struct Motor {
    state: MotorState,
    fault_code: FaultCode,
    target_speed: u32,
    current_speed: u32,
    position: i32,
    direction: Direction,
}

impl Motor {
    /// Initialize the motor and clear its registers.
    pub fn new(regs: &mut RegisterFile) -> Self {
        regs.write(REG_MOTOR_CTRL, 0);
        regs.write(REG_MOTOR_STATUS, 0);
        regs.write(REG_MOTOR_SPEED, 0);
        regs.write(REG_MOTOR_POSITION, 0);

        Self {
            state: MotorState::Idle,
            fault_code: FaultCode::None,
            target_speed: 0,
            current_speed: 0,
            position: 0,
            direction: Direction::Cw,
        }
    }

    /// Start ramping toward `speed` (clamped to [`MAX_SPEED`]) in `direction`.
    ///
    /// Fails with [`ERR_FAULT`] if the motor is currently in fault.
    pub fn start(&mut self, regs: &mut RegisterFile, speed: u32, direction: Direction) -> i32 {
        if self.state == MotorState::Fault {
            return ERR_FAULT;
        }
        let speed = speed.min(MAX_SPEED);

        self.target_speed = speed;
        self.direction = direction;
        self.state = MotorState::Starting;

        let mut ctrl = MOTOR_CTRL_ENABLE;
        if direction == Direction::Cw {
            ctrl |= MOTOR_CTRL_DIR_CW;
        }
        regs.write(REG_MOTOR_CTRL, ctrl);

        OK
    }

    /// Begin ramping down to a stop. Idempotent when already idle.
    pub fn stop(&mut self, regs: &mut RegisterFile) -> i32 {
        if self.state == MotorState::Idle {
            return OK;
        }

        self.target_speed = 0;
        self.state = MotorState::Stopping;
        regs.clear_bits(REG_MOTOR_CTRL, MOTOR_CTRL_ENABLE);

        OK
    }

    /// Unconditional emergency stop: zeroes speed immediately, never waits for a ramp.
    pub fn brake(&mut self, regs: &mut RegisterFile) -> i32 {
        self.target_speed = 0;
        self.current_speed = 0;
        self.state = MotorState::Idle;

        regs.set_bits(REG_MOTOR_CTRL, MOTOR_CTRL_BRAKE);
        regs.clear_bits(REG_MOTOR_CTRL, MOTOR_CTRL_ENABLE);
        regs.write(REG_MOTOR_SPEED, 0);
        regs.clear_bits(REG_MOTOR_STATUS, MOTOR_STATUS_RUNNING);

        OK
    }

    /// Update the target speed only; the ramp is applied by `update`.
    ///
    /// Fails with [`ERR_FAULT`] if the motor is currently in fault.
    pub fn set_speed(&mut self, speed: u32) -> i32 {
        if self.state == MotorState::Fault {
            return ERR_FAULT;
        }
        self.target_speed = speed.min(MAX_SPEED);
        OK
    }

    /// Pulse the reset bit, clear all motor registers, and return to idle with no fault.
    pub fn reset(&mut self, regs: &mut RegisterFile) -> i32 {
        regs.write(REG_MOTOR_CTRL, MOTOR_CTRL_RESET);
        regs.write(REG_MOTOR_STATUS, 0);
        regs.write(REG_MOTOR_SPEED, 0);

        self.state = MotorState::Idle;
        self.fault_code = FaultCode::None;
        self.current_speed = 0;
        self.target_speed = 0;

        regs.clear_bits(REG_MOTOR_CTRL, MOTOR_CTRL_RESET);

        OK
    }

    /// Advance the state machine by one tick.
    ///
    /// A fault bit observed on `MOTOR_STATUS` here is a
    /// [`crate::error::DriverError::TransientHardware`] condition; it is not returned from this
    /// call but mutates `state`/`fault_code` and is observable via [`Motor::state`]/
    /// [`Motor::fault`] and the raised `motor_fault`/`motor_stall` interrupt.
    pub fn update(&mut self, regs: &mut RegisterFile) -> i32 {
        let status = regs.read(REG_MOTOR_STATUS);
        if status & (MOTOR_STATUS_FAULT | MOTOR_STATUS_STALL | MOTOR_STATUS_OVERHEAT) != 0 {
            if self.state != MotorState::Fault {
                self.state = MotorState::Fault;
                self.fault_code = if status & MOTOR_STATUS_STALL != 0 {
                    FaultCode::Stall
                } else if status & MOTOR_STATUS_OVERHEAT != 0 {
                    FaultCode::Overheat
                } else {
                    FaultCode::Overcurrent
                };
            }
            return OK;
        }

        match self.state {
            MotorState::Idle => {}

            MotorState::Starting => {
                if self.current_speed < self.target_speed {
                    self.current_speed += SPEED_RAMP_RATE;
                    if self.current_speed >= self.target_speed {
                        self.current_speed = self.target_speed;
                        self.state = MotorState::Running;
                    }
                } else {
                    self.state = MotorState::Running;
                }
                regs.write(REG_MOTOR_SPEED, self.current_speed);
                regs.set_bits(REG_MOTOR_STATUS, MOTOR_STATUS_RUNNING);
            }

            MotorState::Running => {
                if self.current_speed < self.target_speed {
                    self.current_speed += SPEED_RAMP_RATE;
                    if self.current_speed > self.target_speed {
                        self.current_speed = self.target_speed;
                    }
                } else if self.current_speed > self.target_speed {
                    self.current_speed -= SPEED_RAMP_RATE;
                    if self.current_speed < self.target_speed {
                        self.current_speed = self.target_speed;
                    }
                }
                regs.write(REG_MOTOR_SPEED, self.current_speed);

                let delta = (self.current_speed / 100) as i32;
                self.position += match self.direction {
                    Direction::Cw => delta,
                    Direction::Ccw => -delta,
                };
                regs.write(REG_MOTOR_POSITION, self.position as u32);
            }

            MotorState::Stopping => {
                if self.current_speed > SPEED_RAMP_RATE {
                    self.current_speed -= SPEED_RAMP_RATE;
                } else {
                    self.current_speed = 0;
                    self.state = MotorState::Idle;
                    regs.clear_bits(REG_MOTOR_STATUS, MOTOR_STATUS_RUNNING);
                }
                regs.write(REG_MOTOR_SPEED, self.current_speed);
            }

            MotorState::Fault => {}

            MotorState::Recovery => {
                self.state = MotorState::Idle;
            }
        }

        OK
    }

    /// Diagnostic-only: force the motor into fault with the given code.
    pub fn inject_fault(&mut self, regs: &mut RegisterFile, fault: FaultCode) {
        self.fault_code = fault;
        self.state = MotorState::Fault;

        match fault {
            FaultCode::Stall => regs.set_bits(REG_MOTOR_STATUS, MOTOR_STATUS_STALL),
            FaultCode::Overheat => regs.set_bits(REG_MOTOR_STATUS, MOTOR_STATUS_OVERHEAT),
            FaultCode::Overcurrent => regs.set_bits(REG_MOTOR_STATUS, MOTOR_STATUS_FAULT),
            FaultCode::None => {}
        }
    }

    /// Clear a fault, transitioning to recovery for one tick before idle. No-op if not in fault.
    pub fn clear_fault(&mut self, regs: &mut RegisterFile) -> i32 {
        if self.state != MotorState::Fault {
            return OK;
        }

        self.fault_code = FaultCode::None;
        self.state = MotorState::Recovery;
        regs.write(REG_MOTOR_STATUS, 0);

        OK
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn fault(&self) -> FaultCode {
        self.fault_code
    }

    pub fn speed(&self) -> u32 {
        self.current_speed
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, MotorState::Running | MotorState::Starting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::REG_MOTOR_CTRL as CTRL;

    #[test]
    fn init_is_idle_with_no_fault() {
        let mut regs = RegisterFile::new();
        let motor = Motor::new(&mut regs);
        assert_eq!(motor.state(), MotorState::Idle);
        assert_eq!(motor.speed(), 0);
        assert_eq!(motor.fault(), FaultCode::None);
    }

    #[test]
    fn start_sets_starting_and_enable_bit() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);

        assert_eq!(motor.start(&mut regs, 5000, Direction::Cw), OK);
        assert_eq!(motor.state(), MotorState::Starting);
        assert_ne!(regs.read(CTRL) & MOTOR_CTRL_ENABLE, 0);
    }

    #[test]
    fn stop_ramps_down_to_idle() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 5000, Direction::Cw);
        for _ in 0..20 {
            motor.update(&mut regs);
        }
        assert_eq!(motor.state(), MotorState::Running);

        motor.stop(&mut regs);
        assert_eq!(motor.state(), MotorState::Stopping);
        for _ in 0..20 {
            motor.update(&mut regs);
        }
        assert_eq!(motor.state(), MotorState::Idle);
        assert_eq!(motor.speed(), 0);
    }

    #[test]
    fn brake_is_immediate() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 5000, Direction::Cw);
        for _ in 0..20 {
            motor.update(&mut regs);
        }

        motor.brake(&mut regs);
        assert_eq!(motor.state(), MotorState::Idle);
        assert_eq!(motor.speed(), 0);
        assert_ne!(regs.read(CTRL) & MOTOR_CTRL_BRAKE, 0);
    }

    #[test]
    fn speed_ramps_monotonically_to_target() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 5000, Direction::Cw);

        let mut prev = 0;
        for _ in 0..20 {
            motor.update(&mut regs);
            let curr = motor.speed();
            assert!(curr >= prev);
            prev = curr;
        }
        assert_eq!(motor.speed(), 5000);
        assert_eq!(motor.state(), MotorState::Running);
    }

    #[test]
    fn direction_affects_position_sign() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 1000, Direction::Ccw);
        for _ in 0..10 {
            motor.update(&mut regs);
        }
        assert!(motor.position() <= 0);
    }

    #[test]
    fn position_integrates_from_speed_over_100() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 1000, Direction::Cw);
        motor.update(&mut regs); // starting, no position change yet
        let before = motor.position();
        motor.update(&mut regs); // now running
        assert!(motor.position() > before);
    }

    #[test]
    fn stall_fault_is_detected_from_status_register() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 5000, Direction::Cw);
        regs.set_bits(REG_MOTOR_STATUS, MOTOR_STATUS_STALL);

        motor.update(&mut regs);
        assert_eq!(motor.state(), MotorState::Fault);
        assert_eq!(motor.fault(), FaultCode::Stall);
    }

    #[test]
    fn overheat_fault_is_detected_from_status_register() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 5000, Direction::Cw);
        regs.set_bits(REG_MOTOR_STATUS, MOTOR_STATUS_OVERHEAT);

        motor.update(&mut regs);
        assert_eq!(motor.state(), MotorState::Fault);
        assert_eq!(motor.fault(), FaultCode::Overheat);
    }

    #[test]
    fn fault_then_clear_then_recovery_then_idle() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 5000, Direction::Cw);
        motor.inject_fault(&mut regs, FaultCode::Stall);

        assert_eq!(motor.state(), MotorState::Fault);
        assert_eq!(motor.fault(), FaultCode::Stall);
        assert_ne!(regs.read(REG_MOTOR_STATUS) & MOTOR_STATUS_STALL, 0);

        motor.clear_fault(&mut regs);
        assert_eq!(motor.state(), MotorState::Recovery);

        motor.update(&mut regs);
        assert_eq!(motor.state(), MotorState::Idle);
        assert_eq!(motor.fault(), FaultCode::None);
    }

    #[test]
    fn reset_returns_to_idle_with_clean_registers() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 5000, Direction::Cw);
        motor.inject_fault(&mut regs, FaultCode::Overcurrent);

        motor.reset(&mut regs);
        assert_eq!(motor.state(), MotorState::Idle);
        assert_eq!(motor.fault(), FaultCode::None);
        assert_eq!(regs.read(REG_MOTOR_SPEED), 0);
        assert_eq!(regs.read(REG_MOTOR_CTRL) & MOTOR_CTRL_RESET, 0);
    }

    #[test]
    fn start_clamps_to_max_speed() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 999_999, Direction::Cw);
        assert_eq!(motor.target_speed, MAX_SPEED);
    }

    #[test]
    fn start_while_faulted_is_rejected() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.inject_fault(&mut regs, FaultCode::Stall);
        assert_eq!(motor.start(&mut regs, 1000, Direction::Cw), ERR_FAULT);
    }

    #[test]
    fn running_bit_tracks_starting_and_running_states() {
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 5000, Direction::Cw);

        for _ in 0..20 {
            motor.update(&mut regs);
            let running_bit = regs.read(REG_MOTOR_STATUS) & MOTOR_STATUS_RUNNING != 0;
            let should_run = matches!(motor.state(), MotorState::Starting | MotorState::Running);
            assert_eq!(running_bit, should_run);
        }
    }

    #[test]
    fn stopping_takes_one_extra_tick_for_exact_multiples_of_ramp() {
        // Target speed 500 (equal to ramp rate): "> 500" threshold in stopping means
        // one extra tick is required relative to a naive ">= 500" check.
        let mut regs = RegisterFile::new();
        let mut motor = Motor::new(&mut regs);
        motor.start(&mut regs, 500, Direction::Cw);
        motor.update(&mut regs); // starting -> running at 500
        assert_eq!(motor.speed(), 500);

        motor.stop(&mut regs);
        motor.update(&mut regs); // current_speed (500) is not > 500, so goes straight to 0/idle
        assert_eq!(motor.speed(), 0);
        assert_eq!(motor.state(), MotorState::Idle);
    }
}
