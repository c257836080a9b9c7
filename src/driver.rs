//! Driver loop
//!
//! Owns the register file and the three core subsystems, wires the interrupt handlers, installs
//! the signal bridge, and runs the cooperative tick loop: motor update, sensor sampling on a
//! 10-tick cadence, IRQ drain, IPC status publish and command drain, then a ~10ms sleep. Exits
//! on either the signal-driven shutdown flag or the IPC shutdown flag, then drains the motor to
//! a stop before tearing down.

use std::any::Any;
use std::thread;
use std::time::Duration;

use crate::interrupts::{self, InterruptSource, IrqController};
use crate::ipc::{CommandKind, Mailbox, ResponseStatus, StatusSnapshot};
use crate::motor::{Direction, FaultCode, Motor, MotorState};
use crate::registers::RegisterFile;
use crate::sensors::SensorArray;

/// Ticks between sensor trigger cycles.
pub const SENSOR_TRIGGER_CADENCE: u64 = 10;
/// Ticks between printed status lines.
pub const STATUS_PRINT_CADENCE: u64 = 50;
/// Nominal tick period.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

fn motor_state_code(state: MotorState) -> u32 {
    match state {
        MotorState::Idle => 0,
        MotorState::Starting => 1,
        MotorState::Running => 2,
        MotorState::Stopping => 3,
        MotorState::Fault => 4,
        MotorState::Recovery => 5,
    }
}

fn fault_code_value(fault: FaultCode) -> u32 {
    match fault {
        FaultCode::None => 0,
        FaultCode::Stall => 1,
        FaultCode::Overheat => 2,
        FaultCode::Overcurrent => 3,
    }
}

/// Top-level runtime: register file plus the three core subsystems and the IPC mailbox.
pub struct Driver {
    regs: RegisterFile,
    motor: Motor,
    sensors: SensorArray,
    irq: IrqController,
    mailbox: Mailbox,
    tick: u64,
}

impl Driver {
    /// Build a driver with a fresh mailbox. Use [`Driver::mailbox`] to get a clone for an
    /// external controller to talk to before calling [`run`](Self::run).
    pub fn new() -> Self {
        let mut regs = RegisterFile::new();
        let motor = Motor::new(&mut regs);
        let sensors = SensorArray::new(&mut regs);
        let mut irq = IrqController::new(&mut regs);

        irq.register_handler(
            InterruptSource::MotorFault,
            |_src, _ctx: &mut dyn Any| {
                eprintln!("[irq] motor fault interrupt");
            },
            (),
        );
        irq.enable(&mut regs, InterruptSource::MotorFault);
        irq.enable(&mut regs, InterruptSource::MotorStall);
        irq.enable(&mut regs, InterruptSource::SensorReady);
        irq.enable(&mut regs, InterruptSource::SensorError);
        irq.enable(&mut regs, InterruptSource::Timer);

        Self {
            regs,
            motor,
            sensors,
            irq,
            mailbox: Mailbox::new(),
            tick: 0,
        }
    }

    pub fn mailbox(&self) -> Mailbox {
        self.mailbox.clone()
    }

    /// Install the SIGINT/SIGTERM/SIGUSR1/SIGUSR2 bridge. Must only be called once per process.
    pub fn install_signal_bridge(&mut self) -> i32 {
        self.irq.setup_signal_handler()
    }

    fn snapshot(&self) -> StatusSnapshot {
        let mut sensor_values = [0i32; 4];
        self.sensors.read_all(&mut sensor_values);

        StatusSnapshot {
            motor_state: motor_state_code(self.motor.state()),
            motor_speed: self.motor.speed(),
            motor_position: self.motor.position(),
            sensor_values,
            fault_code: fault_code_value(self.motor.fault()),
        }
    }

    fn execute_command(
        &mut self,
        kind: CommandKind,
        param1: u32,
        param2: u32,
    ) -> (ResponseStatus, [i32; 8]) {
        let mut data = [0i32; 8];

        let status = match kind {
            CommandKind::None => ResponseStatus::InvalidCommand,
            CommandKind::MotorStart => {
                let direction = if param2 == 1 {
                    Direction::Cw
                } else {
                    Direction::Ccw
                };
                data[0] = self.motor.position();
                if self.motor.start(&mut self.regs, param1, direction) == 0 {
                    ResponseStatus::Ok
                } else {
                    ResponseStatus::Error
                }
            }
            CommandKind::MotorStop => {
                self.motor.stop(&mut self.regs);
                data[0] = self.motor.position();
                ResponseStatus::Ok
            }
            CommandKind::MotorSetSpeed => {
                data[0] = self.motor.position();
                if self.motor.set_speed(param1) == 0 {
                    ResponseStatus::Ok
                } else {
                    ResponseStatus::Error
                }
            }
            CommandKind::SensorRead => {
                let mut sensor_values = [0i32; 4];
                self.sensors.read_all(&mut sensor_values);
                data[..4].copy_from_slice(&sensor_values);
                ResponseStatus::Ok
            }
            CommandKind::GetStatus => {
                let snapshot = self.snapshot();
                data[0] = snapshot.motor_state as i32;
                data[1] = snapshot.motor_speed as i32;
                data[2] = snapshot.motor_position;
                data[3] = snapshot.fault_code as i32;
                ResponseStatus::Ok
            }
            CommandKind::Reset => {
                self.motor.reset(&mut self.regs);
                self.sensors.clear_buffer(&mut self.regs);
                data[0] = self.motor.position();
                ResponseStatus::Ok
            }
        };

        (status, data)
    }

    /// Run one tick: motor update, sensor trigger/update, IRQ raise + drain, IPC publish/drain.
    pub fn tick_once(&mut self) {
        self.motor.update(&mut self.regs);

        if self.tick % SENSOR_TRIGGER_CADENCE == 0 {
            self.sensors.trigger(&mut self.regs);
        }
        self.sensors.update(&mut self.regs);

        if self.motor.state() == MotorState::Fault {
            self.irq.trigger(&mut self.regs, InterruptSource::MotorFault);
        }
        self.irq.process_pending(&mut self.regs);

        self.mailbox.update_status(self.snapshot());

        if let Some(cmd) = self.mailbox.try_recv_command() {
            let (status, data) = self.execute_command(cmd.kind, cmd.param1, cmd.param2);
            self.mailbox.send_response(status, data);
        }

        if self.tick % STATUS_PRINT_CADENCE == 0 {
            println!(
                "tick={} state={:?} speed={} position={}",
                self.tick,
                self.motor.state(),
                self.motor.speed(),
                self.motor.position()
            );
        }

        self.tick += 1;
    }

    /// Run until shutdown is requested (by signal or IPC), then drain the motor and tear down.
    pub fn run(&mut self) {
        loop {
            if interrupts::shutdown_requested() || self.mailbox.is_shutdown_requested() {
                break;
            }
            self.tick_once();
            thread::sleep(TICK_PERIOD);
        }

        self.motor.stop(&mut self.regs);
        while self.motor.is_running() {
            self.motor.update(&mut self.regs);
        }
        self.sensors.disable(&mut self.regs);
        self.irq.cleanup(&mut self.regs);
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}
