//! IPC mailbox
//!
//! A command/response channel between the driver loop and an external controller. The spec this
//! crate implements describes the mailbox as a region a real system would place in POSIX shared
//! memory (mutex + two condvars, process-shared), so a second process could open the same
//! segment and drive the loop. This crate ships as a single binary, so the mailbox is instead an
//! in-process `Arc<Mutex<_>>` + `Condvar` pair — the field layout below is what a `shm_open`-
//! backed version would expose, making that swap mechanical if it's ever needed.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    None,
    MotorStart,
    MotorStop,
    MotorSetSpeed,
    SensorRead,
    GetStatus,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Error,
    Busy,
    InvalidCommand,
}

#[derive(Debug, Clone, Copy)]
pub struct Command {
    pub kind: CommandKind,
    pub param1: u32,
    pub param2: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Response {
    pub status: ResponseStatus,
    pub data: [i32; 8],
}

impl Response {
    fn empty(status: ResponseStatus) -> Self {
        Self {
            status,
            data: [0; 8],
        }
    }
}

/// Status snapshot published by the driver loop once per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusSnapshot {
    pub motor_state: u32,
    pub motor_speed: u32,
    pub motor_position: i32,
    pub sensor_values: [i32; 4],
    pub fault_code: u32,
}

struct MailboxState {
    command: Option<Command>,
    response: Option<Response>,
    status: StatusSnapshot,
    shutdown: bool,
}

/// The shared mailbox. Cloning is cheap (`Arc`); every clone refers to the same mailbox.
#[derive(Clone)]
pub struct Mailbox {
    state: Arc<Mutex<MailboxState>>,
    command_ready: Arc<Condvar>,
    response_ready: Arc<Condvar>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MailboxState {
                command: None,
                response: None,
                status: StatusSnapshot::default(),
                shutdown: false,
            })),
            command_ready: Arc::new(Condvar::new()),
            response_ready: Arc::new(Condvar::new()),
        }
    }

    /// Block until any previously pending command has been consumed, then publish a new one.
    pub fn send_command(&self, kind: CommandKind, param1: u32, param2: u32) {
        let mut state = self.state.lock().unwrap();
        while state.command.is_some() && !state.shutdown {
            state = self.command_ready.wait(state).unwrap();
        }
        if state.shutdown {
            return;
        }
        state.command = Some(Command {
            kind,
            param1,
            param2,
        });
        self.command_ready.notify_all();
    }

    /// Non-blocking poll used by the driver loop once per tick.
    pub fn try_recv_command(&self) -> Option<Command> {
        let mut state = self.state.lock().unwrap();
        if state.shutdown {
            return None;
        }
        let command = state.command.take();
        if command.is_some() {
            self.command_ready.notify_all();
        }
        command
    }

    pub fn send_response(&self, status: ResponseStatus, data: [i32; 8]) {
        let mut state = self.state.lock().unwrap();
        state.response = Some(Response { status, data });
        self.response_ready.notify_all();
    }

    /// Block until a response is published, then consume and return it.
    pub fn wait_response(&self) -> Response {
        let mut state = self.state.lock().unwrap();
        while state.response.is_none() && !state.shutdown {
            state = self.response_ready.wait(state).unwrap();
        }
        state
            .response
            .take()
            .unwrap_or_else(|| Response::empty(ResponseStatus::Error))
    }

    /// Like [`wait_response`](Self::wait_response) but gives up after `timeout`.
    pub fn wait_response_timeout(&self, timeout: Duration) -> Option<Response> {
        let state = self.state.lock().unwrap();
        let (mut state, result) = self
            .response_ready
            .wait_timeout_while(state, timeout, |s| s.response.is_none() && !s.shutdown)
            .unwrap();
        if result.timed_out() {
            return None;
        }
        state.response.take()
    }

    pub fn update_status(&self, snapshot: StatusSnapshot) {
        self.state.lock().unwrap().status = snapshot;
    }

    pub fn status(&self) -> StatusSnapshot {
        self.state.lock().unwrap().status
    }

    pub fn request_shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutdown = true;
        self.command_ready.notify_all();
        self.response_ready.notify_all();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.state.lock().unwrap().shutdown
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn command_round_trips_through_try_recv() {
        let mailbox = Mailbox::new();
        mailbox.send_command(CommandKind::MotorStart, 5000, 1);

        let cmd = mailbox.try_recv_command().expect("command should be queued");
        assert_eq!(cmd.kind, CommandKind::MotorStart);
        assert_eq!(cmd.param1, 5000);
        assert_eq!(cmd.param2, 1);

        assert!(mailbox.try_recv_command().is_none());
    }

    #[test]
    fn response_round_trips_through_wait() {
        let mailbox = Mailbox::new();
        mailbox.send_response(ResponseStatus::Ok, [1, 0, 0, 0, 0, 0, 0, 0]);

        let response = mailbox.wait_response();
        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.data[0], 1);
    }

    #[test]
    fn status_snapshot_is_readable_without_command_round_trip() {
        let mailbox = Mailbox::new();
        mailbox.update_status(StatusSnapshot {
            motor_state: 2,
            motor_speed: 4000,
            motor_position: -10,
            sensor_values: [1, 2, 3, 4],
            fault_code: 0,
        });

        let snapshot = mailbox.status();
        assert_eq!(snapshot.motor_speed, 4000);
        assert_eq!(snapshot.sensor_values, [1, 2, 3, 4]);
    }

    #[test]
    fn cross_thread_command_then_response_round_trip() {
        let mailbox = Mailbox::new();
        let loop_side = mailbox.clone();

        let worker = thread::spawn(move || loop {
            if let Some(cmd) = loop_side.try_recv_command() {
                assert_eq!(cmd.kind, CommandKind::MotorStart);
                loop_side.send_response(ResponseStatus::Ok, [0; 8]);
                break;
            }
            thread::yield_now();
        });

        mailbox.send_command(CommandKind::MotorStart, 5000, 1);
        let response = mailbox.wait_response();
        assert_eq!(response.status, ResponseStatus::Ok);

        worker.join().unwrap();
    }

    #[test]
    fn shutdown_wakes_blocked_waiters() {
        let mailbox = Mailbox::new();
        let waiter_side = mailbox.clone();

        let waiter = thread::spawn(move || {
            let response = waiter_side.wait_response();
            response.status
        });

        thread::sleep(Duration::from_millis(20));
        mailbox.request_shutdown();

        let status = waiter.join().unwrap();
        assert_eq!(status, ResponseStatus::Error);
    }

    #[test]
    fn wait_response_timeout_returns_none_when_nothing_published() {
        let mailbox = Mailbox::new();
        let result = mailbox.wait_response_timeout(Duration::from_millis(20));
        assert!(result.is_none());
    }
}
