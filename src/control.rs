// The cooperative control loop tying clock, PID law, commands and reports together
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use embedded_io::{Read, ReadReady, Write};
use log::{debug, info, trace, warn};
use num_traits::float::FloatCore;

use crate::command::{Command, CommandInterpreter, DEFAULT_LINE_CAPACITY};
use crate::config::LoopConfig;
use crate::io::{ActuatorSink, SampleSource};
use crate::pid::{ControllerConfig, PidContext, PidController};
use crate::report::{StatusReport, StatusReporter};
use crate::time::{Millis, MonotonicClock};

/// Written once when [`ControlLoop::run`] starts.
pub const BANNER: &[u8] = b"\nPID anti-windup controller\n";

/// A failure of the serial transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoopError<E> {
    /// Writing a status line failed.
    #[error("Serial transport error: {0:?}")]
    Serial(E),
}

/// What one call to [`ControlLoop::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iteration<F> {
    /// The clock snapshot the iteration was timed against.
    pub now: Millis,
    /// The command completed by this iteration's byte, if any, after it was applied.
    pub command: Option<Command<F>>,
    /// The output count, if the control interval had elapsed and the PID law ran.
    pub output: Option<u16>,
    /// Whether a status line was written.
    pub reported: bool,
    /// Whether reading the serial port failed. The byte is lost; both timers still ran.
    pub read_failed: bool,
}

/// The top-level driver.
///
/// Each [`poll`](ControlLoop::poll) feeds at most one serial byte to the command interpreter, then
/// runs the PID law and drives the actuator if the control interval has elapsed, then writes a
/// status line if the report interval has elapsed. The two intervals are tracked independently so
/// a slow status line never shifts the control cadence.
///
/// The loop owns every piece of mutable state except the tick counter inside the clock.
pub struct ControlLoop<F, C, S, A, P> {
    clock: C,
    sensor: S,
    actuator: A,
    serial: P,
    controller: PidController<F>,
    config: ControllerConfig<F>,
    interpreter: CommandInterpreter<DEFAULT_LINE_CAPACITY>,
    reporter: StatusReporter,
    control_interval_ms: u32,
    report_interval_ms: u32,
    last_report_time: Millis,
    last_sample: u16,
    last_output: u16,
}

impl<F, C, S, A, P> ControlLoop<F, C, S, A, P>
where
    F: FloatCore,
    C: MonotonicClock,
    S: SampleSource,
    A: ActuatorSink,
    P: Read + ReadReady + Write,
{
    /// Assembles a loop from its peripherals. Both interval timers start at time zero.
    pub fn new(clock: C, sensor: S, actuator: A, serial: P, config: LoopConfig<F>) -> Self {
        Self {
            clock,
            sensor,
            actuator,
            serial,
            controller: PidController::new(*config.limits()),
            config: *config.controller(),
            interpreter: CommandInterpreter::new(),
            reporter: *config.reporter(),
            control_interval_ms: config.control_interval_ms(),
            report_interval_ms: config.report_interval_ms(),
            last_report_time: Millis::ZERO,
            last_sample: 0,
            last_output: 0,
        }
    }

    /// Returns the live setpoint and gains.
    pub fn config(&self) -> &ControllerConfig<F> {
        &self.config
    }

    /// Returns the live setpoint and gains for modification outside the serial protocol.
    pub fn config_mut(&mut self) -> &mut ControllerConfig<F> {
        &mut self.config
    }

    /// Returns the PID accumulator state.
    pub fn context(&self) -> &PidContext<F> {
        self.controller.context()
    }

    /// Returns the sample used by the most recent control step.
    pub fn last_sample(&self) -> u16 {
        self.last_sample
    }

    /// Returns the count sent to the actuator by the most recent control step.
    pub fn last_output(&self) -> u16 {
        self.last_output
    }

    /// Returns the serial transport.
    pub fn serial(&self) -> &P {
        &self.serial
    }

    /// Returns the serial transport for direct access, e.g. to inject or drain bytes in tests.
    pub fn serial_mut(&mut self) -> &mut P {
        &mut self.serial
    }

    /// Runs one iteration.
    ///
    /// Never blocks for longer than one sensor conversion.
    ///
    /// A failed serial read is logged and treated as "no byte", so line noise can never hold
    /// back the control step.
    ///
    /// # Returns
    /// What the iteration did, or the error from writing the status line. The control step and
    /// any completed command have already taken effect when a write fails.
    pub fn poll(&mut self) -> Result<Iteration<F>, LoopError<P::Error>> {
        let (command, read_failed) = match self.interpreter.poll::<F, P>(&mut self.serial) {
            Ok(command) => (command, false),
            Err(e) => {
                warn!("serial read failed: {:?}", e);
                (None, true)
            }
        };
        if let Some(command) = command {
            if command.apply(&mut self.config) {
                let (kp, ki, kd) = self.config.gains();
                debug!(
                    "applied {} command: setpoint={} kp={} ki={} kd={}",
                    command.tag() as char,
                    self.config.setpoint(),
                    as_f64(kp),
                    as_f64(ki),
                    as_f64(kd)
                );
            } else {
                debug!("ignored command with tag {:#04x}", command.tag());
            }
        }

        let now = self.clock.now();

        let mut output = None;
        let last_control_time = self.controller.context().last_time();
        if now.has_elapsed(last_control_time, self.control_interval_ms) {
            let sample = self.sensor.sample();
            let count = self.controller.compute(sample, &self.config, now);
            self.actuator.set_output(count);
            trace!(
                "t={} sample={} output={} integral={}",
                now.as_u32(),
                sample,
                count,
                as_f64(self.controller.context().integral_error())
            );
            self.last_sample = sample;
            self.last_output = count;
            output = Some(count);
        }

        let mut reported = false;
        if now.has_elapsed(self.last_report_time, self.report_interval_ms) {
            self.last_report_time = now;
            let report = StatusReport {
                time: now,
                sample: self.last_sample,
                output: self.last_output,
            };
            self.reporter
                .write(&mut self.serial, &report)
                .map_err(LoopError::Serial)?;
            reported = true;
        }

        Ok(Iteration {
            now,
            command,
            output,
            reported,
            read_failed,
        })
    }

    /// Writes the startup banner, then polls forever. Transport errors are logged and the loop
    /// carries on with the next iteration.
    pub fn run(&mut self) -> ! {
        info!(
            "control loop starting: control every {} ms, report every {} ms",
            self.control_interval_ms, self.report_interval_ms
        );
        if let Err(e) = self.serial.write_all(BANNER) {
            warn!("could not write banner: {:?}", e);
        }
        loop {
            if let Err(e) = self.poll() {
                warn!("{:?}", e);
            }
        }
    }
}

fn as_f64<F: FloatCore>(value: F) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
