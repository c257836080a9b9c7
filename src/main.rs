//! Motor controller driver — process entry point.
//!
//! Builds a [`Driver`], installs the SIGINT/SIGTERM/SIGUSR1/SIGUSR2 signal bridge, runs a short
//! demo sequence against the mailbox, then ticks the loop until shutdown is requested.

use motor_driver_sim::driver::Driver;
use motor_driver_sim::ipc::CommandKind;

fn main() {
    println!("Embedded Motor Controller Driver");
    println!("================================\n");

    let mut driver = Driver::new();
    let mailbox = driver.mailbox();

    if driver.install_signal_bridge() != 0 {
        eprintln!("warning: failed to install signal bridge");
    }

    println!("Driver initialized. PID: {}", std::process::id());
    println!("Send SIGUSR1 for motor fault, SIGUSR2 for sensor interrupt");
    println!("Press Ctrl+C to exit\n");

    println!("Starting motor at 5000 RPM clockwise...");
    mailbox.send_command(CommandKind::MotorStart, 5000, 1);

    driver.run();

    println!("\nDriver stopped.");
}
