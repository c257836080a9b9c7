//! Standalone, argument-driven test runner.
//!
//! Mirrors the original reference harness: run with no argument (or `all`) to run every test
//! in table order, or with a single test name to run just that one. Prints `PASS`/`FAIL` per
//! test plus a final summary line; exit code is zero iff every requested test passed.

use std::process::ExitCode;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use motor_driver_sim::interrupts::{InterruptSource, IrqController};
use motor_driver_sim::ipc::{CommandKind, Mailbox, ResponseStatus};
use motor_driver_sim::motor::{Direction, FaultCode, Motor, MotorState};
use motor_driver_sim::registers::*;
use motor_driver_sim::sensors::{ChannelState, SensorArray, CHANNEL_COUNT, RING_CAPACITY};

type TestResult = Result<(), String>;

macro_rules! check_eq {
    ($a:expr, $b:expr) => {
        if $a != $b {
            return Err(format!(
                "{}:{} - {} != {} ({:?} != {:?})",
                file!(),
                line!(),
                stringify!($a),
                stringify!($b),
                $a,
                $b
            ));
        }
    };
}

macro_rules! check_true {
    ($cond:expr) => {
        if !($cond) {
            return Err(format!(
                "{}:{} - {} is false",
                file!(),
                line!(),
                stringify!($cond)
            ));
        }
    };
}

/*============================================================================
 * Register tests
 *===========================================================================*/

fn test_reg_init() -> TestResult {
    let rf = RegisterFile::new();
    for offset in (0..REGISTER_FILE_SIZE).step_by(4) {
        check_eq!(rf.read(offset), 0);
    }
    Ok(())
}

fn test_reg_read_write() -> TestResult {
    let mut rf = RegisterFile::new();
    rf.write(REG_MOTOR_CTRL, 0xDEAD_BEEF);
    check_eq!(rf.read(REG_MOTOR_CTRL), 0xDEAD_BEEF);

    rf.write(REG_SENSOR_DATA, 0x1234_5678);
    check_eq!(rf.read(REG_SENSOR_DATA), 0x1234_5678);
    Ok(())
}

fn test_reg_set_clear_bits() -> TestResult {
    let mut rf = RegisterFile::new();
    rf.set_bits(REG_MOTOR_CTRL, MOTOR_CTRL_ENABLE);
    check_eq!(rf.read(REG_MOTOR_CTRL), MOTOR_CTRL_ENABLE);

    rf.set_bits(REG_MOTOR_CTRL, MOTOR_CTRL_DIR_CW);
    check_eq!(rf.read(REG_MOTOR_CTRL), MOTOR_CTRL_ENABLE | MOTOR_CTRL_DIR_CW);

    rf.clear_bits(REG_MOTOR_CTRL, MOTOR_CTRL_ENABLE);
    check_eq!(rf.read(REG_MOTOR_CTRL), MOTOR_CTRL_DIR_CW);
    Ok(())
}

fn test_reg_invalid_offset() -> TestResult {
    let mut rf = RegisterFile::new();
    check_eq!(rf.read(0xFF00), READ_FAULT);
    rf.write(0xFF00, 0x1234_5678);
    for offset in (0..REGISTER_FILE_SIZE).step_by(4) {
        check_eq!(rf.read(offset), 0);
    }
    Ok(())
}

/*============================================================================
 * Motor controller tests
 *===========================================================================*/

fn test_motor_init() -> TestResult {
    let mut rf = RegisterFile::new();
    let motor = Motor::new(&mut rf);
    check_eq!(motor.state(), MotorState::Idle);
    check_eq!(motor.speed(), 0);
    check_eq!(motor.fault(), FaultCode::None);
    Ok(())
}

fn test_motor_start() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);

    check_eq!(motor.start(&mut rf, 5000, Direction::Cw), 0);
    check_eq!(motor.state(), MotorState::Starting);
    check_true!(rf.read(REG_MOTOR_CTRL) & MOTOR_CTRL_ENABLE != 0);
    Ok(())
}

fn test_motor_stop() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);
    motor.start(&mut rf, 5000, Direction::Cw);

    for _ in 0..20 {
        motor.update(&mut rf);
    }
    check_eq!(motor.state(), MotorState::Running);

    motor.stop(&mut rf);
    check_eq!(motor.state(), MotorState::Stopping);

    for _ in 0..20 {
        motor.update(&mut rf);
    }
    check_eq!(motor.state(), MotorState::Idle);
    Ok(())
}

fn test_motor_brake() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);
    motor.start(&mut rf, 5000, Direction::Cw);
    for _ in 0..20 {
        motor.update(&mut rf);
    }

    motor.brake(&mut rf);
    check_eq!(motor.state(), MotorState::Idle);
    check_eq!(motor.speed(), 0);
    check_true!(rf.read(REG_MOTOR_CTRL) & MOTOR_CTRL_BRAKE != 0);
    Ok(())
}

fn test_motor_speed_ramp() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);
    motor.start(&mut rf, 5000, Direction::Cw);

    let mut prev_speed = 0;
    for _ in 0..20 {
        motor.update(&mut rf);
        let curr_speed = motor.speed();
        check_true!(curr_speed >= prev_speed);
        prev_speed = curr_speed;
    }
    check_eq!(motor.speed(), 5000);
    Ok(())
}

fn test_motor_direction() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);

    motor.start(&mut rf, 1000, Direction::Cw);
    check_true!(rf.read(REG_MOTOR_CTRL) & MOTOR_CTRL_DIR_CW != 0);
    motor.stop(&mut rf);
    for _ in 0..10 {
        motor.update(&mut rf);
    }

    motor.start(&mut rf, 1000, Direction::Ccw);
    check_true!(rf.read(REG_MOTOR_CTRL) & MOTOR_CTRL_DIR_CW == 0);
    Ok(())
}

fn test_motor_position_update() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);

    motor.start(&mut rf, 1000, Direction::Cw);
    for _ in 0..20 {
        motor.update(&mut rf);
    }
    let pos_cw = motor.position();
    check_true!(pos_cw > 0);

    motor.reset(&mut rf);
    motor.start(&mut rf, 1000, Direction::Ccw);
    for _ in 0..20 {
        motor.update(&mut rf);
    }
    let pos_ccw = motor.position();
    check_true!(pos_ccw < 0);
    Ok(())
}

fn test_motor_fault_stall() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);
    motor.start(&mut rf, 5000, Direction::Cw);

    motor.inject_fault(&mut rf, FaultCode::Stall);

    check_eq!(motor.state(), MotorState::Fault);
    check_eq!(motor.fault(), FaultCode::Stall);
    check_true!(rf.read(REG_MOTOR_STATUS) & MOTOR_STATUS_STALL != 0);
    Ok(())
}

fn test_motor_fault_overheat() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);

    motor.inject_fault(&mut rf, FaultCode::Overheat);

    check_eq!(motor.state(), MotorState::Fault);
    check_eq!(motor.fault(), FaultCode::Overheat);
    check_true!(rf.read(REG_MOTOR_STATUS) & MOTOR_STATUS_OVERHEAT != 0);
    Ok(())
}

fn test_motor_fault_recovery() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);

    motor.inject_fault(&mut rf, FaultCode::Stall);
    check_eq!(motor.state(), MotorState::Fault);

    motor.clear_fault(&mut rf);
    check_eq!(motor.state(), MotorState::Recovery);
    check_eq!(motor.fault(), FaultCode::None);

    motor.update(&mut rf);
    check_eq!(motor.state(), MotorState::Idle);
    Ok(())
}

fn test_motor_reset() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);

    motor.start(&mut rf, 5000, Direction::Cw);
    for _ in 0..20 {
        motor.update(&mut rf);
    }

    motor.reset(&mut rf);

    check_eq!(motor.state(), MotorState::Idle);
    check_eq!(motor.speed(), 0);
    check_eq!(motor.fault(), FaultCode::None);
    Ok(())
}

fn test_motor_max_speed() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);

    motor.start(&mut rf, 99999, Direction::Cw);
    for _ in 0..50 {
        motor.update(&mut rf);
    }
    check_eq!(motor.speed(), 10000);
    Ok(())
}

/*============================================================================
 * Sensor array tests
 *===========================================================================*/

fn test_sensor_init() -> TestResult {
    let mut rf = RegisterFile::new();
    let sensors = SensorArray::new(&mut rf);
    for i in 0..CHANNEL_COUNT {
        check_eq!(sensors.state_of(i), Some(ChannelState::Disabled));
    }
    Ok(())
}

fn test_sensor_enable_disable() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);

    sensors.enable(&mut rf);
    check_true!(rf.read(REG_SENSOR_STATUS) & SENSOR_STATUS_READY != 0);
    check_true!(rf.read(REG_SENSOR_CTRL) & SENSOR_CTRL_ENABLE != 0);

    sensors.disable(&mut rf);
    check_true!(rf.read(REG_SENSOR_STATUS) & SENSOR_STATUS_READY == 0);
    Ok(())
}

fn test_sensor_trigger() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);
    sensors.enable(&mut rf);

    check_eq!(sensors.trigger(&mut rf), 0);
    check_true!(rf.read(REG_SENSOR_CTRL) & SENSOR_CTRL_TRIGGER != 0);
    Ok(())
}

fn test_sensor_read() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);
    sensors.enable(&mut rf);

    sensors.set_simulated_value(0, 1234);
    sensors.set_simulated_value(1, 5678);

    check_eq!(sensors.read(0), 1234);
    check_eq!(sensors.read(1), 5678);
    Ok(())
}

fn test_sensor_read_all() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);
    sensors.enable(&mut rf);

    sensors.set_simulated_value(0, 100);
    sensors.set_simulated_value(1, 200);
    sensors.set_simulated_value(2, 300);
    sensors.set_simulated_value(3, 400);

    let mut values = [0i32; 4];
    check_eq!(sensors.read_all(&mut values), 4);
    check_eq!(values[0], 100);
    check_eq!(values[1], 200);
    check_eq!(values[2], 300);
    check_eq!(values[3], 400);
    Ok(())
}

fn test_sensor_continuous_mode() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);
    sensors.enable(&mut rf);

    sensors.set_continuous(&mut rf, true);
    check_true!(rf.read(REG_SENSOR_CTRL) & SENSOR_CTRL_CONTINUOUS != 0);

    sensors.set_continuous(&mut rf, false);
    check_true!(rf.read(REG_SENSOR_CTRL) & SENSOR_CTRL_CONTINUOUS == 0);
    Ok(())
}

fn test_sensor_buffer_push_pop() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);

    check_true!(sensors.ring_mut().push(111));
    check_true!(sensors.ring_mut().push(222));
    check_true!(sensors.ring_mut().push(333));

    check_eq!(sensors.ring().count(), 3);

    check_eq!(sensors.ring_mut().pop(), Some(111));
    check_eq!(sensors.ring_mut().pop(), Some(222));
    Ok(())
}

fn test_sensor_buffer_overflow() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);

    for i in 0..(RING_CAPACITY - 1) {
        check_true!(sensors.ring_mut().push(i as i32));
    }
    check_true!(!sensors.ring_mut().push(999));
    Ok(())
}

fn test_sensor_buffer_clear() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);

    sensors.ring_mut().push(100);
    sensors.ring_mut().push(200);
    check_eq!(sensors.ring().count(), 2);

    sensors.ring_mut().clear();
    check_eq!(sensors.ring().count(), 0);
    Ok(())
}

fn test_sensor_value_clamping() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);
    sensors.enable(&mut rf);

    sensors.set_simulated_value(2, 9999);
    sensors.trigger(&mut rf);
    sensors.update(&mut rf);

    check_eq!(sensors.read(2), 125);
    Ok(())
}

/*============================================================================
 * Interrupt controller tests
 *===========================================================================*/

fn test_irq_init() -> TestResult {
    let mut rf = RegisterFile::new();
    let irq = IrqController::new(&mut rf);
    check_eq!(irq.get_pending_mask(), 0);
    Ok(())
}

fn test_irq_enable_disable() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut irq = IrqController::new(&mut rf);

    irq.enable(&mut rf, InterruptSource::MotorFault);
    check_true!(rf.read(REG_IRQ_ENABLE) & (1 << InterruptSource::MotorFault.index()) != 0);

    irq.disable(&mut rf, InterruptSource::MotorFault);
    check_true!(rf.read(REG_IRQ_ENABLE) & (1 << InterruptSource::MotorFault.index()) == 0);
    Ok(())
}

fn test_irq_trigger() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut irq = IrqController::new(&mut rf);

    irq.enable(&mut rf, InterruptSource::SensorReady);
    irq.trigger(&mut rf, InterruptSource::SensorReady);

    check_true!(irq.is_pending(InterruptSource::SensorReady));
    check_true!(rf.read(REG_IRQ_STATUS) & (1 << InterruptSource::SensorReady.index()) != 0);
    Ok(())
}

fn test_irq_handler_callback() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut irq = IrqController::new(&mut rf);
    let counter = Arc::new(AtomicI32::new(0));
    let counter_handle = counter.clone();

    irq.register_handler(
        InterruptSource::MotorFault,
        move |_src, _ctx| {
            counter_handle.fetch_add(1, Ordering::SeqCst);
        },
        (),
    );
    irq.enable(&mut rf, InterruptSource::MotorFault);
    irq.trigger(&mut rf, InterruptSource::MotorFault);

    irq.process_pending(&mut rf);
    check_eq!(counter.load(Ordering::SeqCst), 1);
    Ok(())
}

fn test_irq_pending_mask() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut irq = IrqController::new(&mut rf);

    irq.enable_all(&mut rf);
    irq.trigger(&mut rf, InterruptSource::MotorFault);
    irq.trigger(&mut rf, InterruptSource::SensorReady);

    let mask = irq.get_pending_mask();
    check_true!(mask & (1 << InterruptSource::MotorFault.index()) != 0);
    check_true!(mask & (1 << InterruptSource::SensorReady.index()) != 0);
    Ok(())
}

fn test_irq_clear() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut irq = IrqController::new(&mut rf);

    irq.enable(&mut rf, InterruptSource::MotorStall);
    irq.trigger(&mut rf, InterruptSource::MotorStall);
    check_true!(irq.is_pending(InterruptSource::MotorStall));

    irq.clear(&mut rf, InterruptSource::MotorStall);
    check_true!(!irq.is_pending(InterruptSource::MotorStall));
    Ok(())
}

/*============================================================================
 * Mailbox (IPC) tests
 *===========================================================================*/

fn test_mailbox_create() -> TestResult {
    let _mailbox = Mailbox::new();
    Ok(())
}

fn test_mailbox_status_update() -> TestResult {
    use motor_driver_sim::ipc::StatusSnapshot;

    let mailbox = Mailbox::new();
    mailbox.update_status(StatusSnapshot {
        motor_state: 2,
        motor_speed: 5000,
        motor_position: 1234,
        sensor_values: [100, 200, 300, 400],
        fault_code: 0,
    });

    let snapshot = mailbox.status();
    check_eq!(snapshot.motor_state, 2);
    check_eq!(snapshot.motor_speed, 5000);
    check_eq!(snapshot.motor_position, 1234);
    check_eq!(snapshot.sensor_values[0], 100);
    Ok(())
}

fn test_mailbox_shutdown() -> TestResult {
    let mailbox = Mailbox::new();
    check_true!(!mailbox.is_shutdown_requested());
    mailbox.request_shutdown();
    check_true!(mailbox.is_shutdown_requested());
    Ok(())
}

/*============================================================================
 * Integration tests
 *===========================================================================*/

fn test_integration_motor_sensor() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);
    let mut sensors = SensorArray::new(&mut rf);
    sensors.enable(&mut rf);

    motor.start(&mut rf, 3000, Direction::Cw);

    for _ in 0..20 {
        motor.update(&mut rf);
        sensors.set_simulated_value(1, motor.speed() as i32);
        sensors.trigger(&mut rf);
        sensors.update(&mut rf);
    }

    check_eq!(sensors.read(1), motor.speed() as i32);
    Ok(())
}

fn test_integration_fault_irq() -> TestResult {
    let mut rf = RegisterFile::new();
    let mut motor = Motor::new(&mut rf);
    let mut irq = IrqController::new(&mut rf);
    let counter = Arc::new(AtomicI32::new(0));
    let counter_handle = counter.clone();

    irq.register_handler(
        InterruptSource::MotorFault,
        move |_src, _ctx| {
            counter_handle.fetch_add(1, Ordering::SeqCst);
        },
        (),
    );
    irq.enable(&mut rf, InterruptSource::MotorFault);

    motor.start(&mut rf, 5000, Direction::Cw);
    for _ in 0..10 {
        motor.update(&mut rf);
    }

    motor.inject_fault(&mut rf, FaultCode::Stall);

    irq.trigger(&mut rf, InterruptSource::MotorFault);
    irq.process_pending(&mut rf);

    check_eq!(counter.load(Ordering::SeqCst), 1);
    check_eq!(motor.state(), MotorState::Fault);
    Ok(())
}

/*============================================================================
 * Test runner
 *===========================================================================*/

struct TestCase {
    name: &'static str,
    func: fn() -> TestResult,
}

const ALL_TESTS: &[TestCase] = &[
    TestCase { name: "test_reg_init", func: test_reg_init },
    TestCase { name: "test_reg_read_write", func: test_reg_read_write },
    TestCase { name: "test_reg_set_clear_bits", func: test_reg_set_clear_bits },
    TestCase { name: "test_reg_invalid_offset", func: test_reg_invalid_offset },
    TestCase { name: "test_motor_init", func: test_motor_init },
    TestCase { name: "test_motor_start", func: test_motor_start },
    TestCase { name: "test_motor_stop", func: test_motor_stop },
    TestCase { name: "test_motor_brake", func: test_motor_brake },
    TestCase { name: "test_motor_speed_ramp", func: test_motor_speed_ramp },
    TestCase { name: "test_motor_direction", func: test_motor_direction },
    TestCase { name: "test_motor_position_update", func: test_motor_position_update },
    TestCase { name: "test_motor_fault_stall", func: test_motor_fault_stall },
    TestCase { name: "test_motor_fault_overheat", func: test_motor_fault_overheat },
    TestCase { name: "test_motor_fault_recovery", func: test_motor_fault_recovery },
    TestCase { name: "test_motor_reset", func: test_motor_reset },
    TestCase { name: "test_motor_max_speed", func: test_motor_max_speed },
    TestCase { name: "test_sensor_init", func: test_sensor_init },
    TestCase { name: "test_sensor_enable_disable", func: test_sensor_enable_disable },
    TestCase { name: "test_sensor_trigger", func: test_sensor_trigger },
    TestCase { name: "test_sensor_read", func: test_sensor_read },
    TestCase { name: "test_sensor_read_all", func: test_sensor_read_all },
    TestCase { name: "test_sensor_continuous_mode", func: test_sensor_continuous_mode },
    TestCase { name: "test_sensor_buffer_push_pop", func: test_sensor_buffer_push_pop },
    TestCase { name: "test_sensor_buffer_overflow", func: test_sensor_buffer_overflow },
    TestCase { name: "test_sensor_buffer_clear", func: test_sensor_buffer_clear },
    TestCase { name: "test_sensor_value_clamping", func: test_sensor_value_clamping },
    TestCase { name: "test_irq_init", func: test_irq_init },
    TestCase { name: "test_irq_enable_disable", func: test_irq_enable_disable },
    TestCase { name: "test_irq_trigger", func: test_irq_trigger },
    TestCase { name: "test_irq_handler_callback", func: test_irq_handler_callback },
    TestCase { name: "test_irq_pending_mask", func: test_irq_pending_mask },
    TestCase { name: "test_irq_clear", func: test_irq_clear },
    TestCase { name: "test_mailbox_create", func: test_mailbox_create },
    TestCase { name: "test_mailbox_status_update", func: test_mailbox_status_update },
    TestCase { name: "test_mailbox_shutdown", func: test_mailbox_shutdown },
    TestCase { name: "test_integration_motor_sensor", func: test_integration_motor_sensor },
    TestCase { name: "test_integration_fault_irq", func: test_integration_fault_irq },
];

fn run_one(case: &TestCase) -> bool {
    match (case.func)() {
        Ok(()) => {
            println!("PASS");
            true
        }
        Err(msg) => {
            println!("FAILED");
            println!("  FAIL: {msg}");
            false
        }
    }
}

fn run_all() -> bool {
    println!("Running {} tests...\n", ALL_TESTS.len());

    let mut passed = 0;
    for (i, case) in ALL_TESTS.iter().enumerate() {
        print!("[{:2}/{:2}] {}... ", i + 1, ALL_TESTS.len(), case.name);
        if run_one(case) {
            passed += 1;
        }
    }

    println!("\n================================");
    println!("Results: {}/{} tests passed", passed, ALL_TESTS.len());
    if passed == ALL_TESTS.len() {
        println!("All tests PASSED!");
    } else {
        println!("{} tests FAILED", ALL_TESTS.len() - passed);
    }
    passed == ALL_TESTS.len()
}

fn run_named(name: &str) -> bool {
    match ALL_TESTS.iter().find(|c| c.name == name) {
        Some(case) => {
            println!("Running {name}...");
            run_one(case)
        }
        None => {
            eprintln!("Unknown test: {name}");
            false
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let ok = match args.get(1).map(String::as_str) {
        None | Some("all") => run_all(),
        Some(name) => run_named(name),
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
