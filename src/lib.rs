#![warn(missing_docs)]

//! # Anti-windup PID Control Loop
//!
//! This library provides the core of a bare-metal closed-loop controller: it samples one analog
//! process variable, computes a PWM count with an anti-windup PID law, and lets an operator retune
//! the setpoint and gains over a serial link while the loop keeps running.
//!
//! ## Features
//!
//! - A PID law built for integer peripherals:
//!   - Dead band around the setpoint to stop quantization noise from hunting the integrator.
//!   - Conditional integration: the error is only accumulated when doing so cannot push a
//!     saturated output further past its limit.
//!   - Hard bounds on both the integral and the output.
//!
//! - A cooperative control loop with two independent cadences:
//!   - The PID law runs on a fixed control interval, 10 ms by default.
//!   - A status line `time|volts|count` is written every 100 ms by default, without disturbing
//!     the control cadence.
//!
//! - A minimal line protocol for live tuning: `S300\n` sets the setpoint, `P0.6\n`, `I0.05\n`
//!   and `D0.02\n` set the gains. Bytes are consumed one per loop iteration, so the loop never
//!   stalls waiting for a line to complete.
//!
//! - A tick clock that is safe to share with the timer interrupt.
//!
//! ## Usage
//!
//! ### Functional PID Controller
//!
//! The functional controller holds only the fixed limits; you thread the [`pid::PidContext`]
//! through each call, which makes `compute` pure and easy to test.
//!
//! ```rust
//! use pid_loop::pid::{ControllerConfig, FuncPidController, PidContext, PidLimits};
//! use pid_loop::time::Millis;
//!
//! let pid = FuncPidController::new(PidLimits::<f32>::default());
//! let mut config = ControllerConfig::<f32>::default();
//! config.set_gains(0.6, 0.0, 0.0).expect("Gains are finite");
//! config.set_setpoint(300.0);
//!
//! let (output, context) = pid.compute(PidContext::new(), 200, &config, Millis(10));
//! assert_eq!(output, 60);
//! assert_eq!(context.last_error(), 100);
//! ```
//!
//! ### Control Loop
//!
//! On a target, the clock lives in a `static` ticked from the 1 kHz timer interrupt, the sensor
//! and actuator wrap the ADC and PWM drivers, and the serial port is any `embedded-io` transport.
//!
//! ```rust,no_run
//! use pid_loop::config::LoopConfigBuilder;
//! use pid_loop::control::ControlLoop;
//! use pid_loop::time::TickClock;
//! # struct Uart;
//! # impl embedded_io::ErrorType for Uart { type Error = core::convert::Infallible; }
//! # impl embedded_io::Read for Uart { fn read(&mut self, _: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) } }
//! # impl embedded_io::ReadReady for Uart { fn read_ready(&mut self) -> Result<bool, Self::Error> { Ok(false) } }
//! # impl embedded_io::Write for Uart {
//! #     fn write(&mut self, b: &[u8]) -> Result<usize, Self::Error> { Ok(b.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # fn read_adc() -> u16 { 0 }
//! # fn write_pwm(_: u16) {}
//!
//! static CLOCK: TickClock = TickClock::new();
//!
//! // fn timer_interrupt() { CLOCK.tick(); }
//!
//! let config = LoopConfigBuilder::<f32>::default()
//!     .build()
//!     .expect("Invalid loop config");
//! let mut control = ControlLoop::new(&CLOCK, read_adc, write_pwm, Uart, config);
//! control.run();
//! ```
#![no_std]

#[cfg(feature = "std")]
extern crate std;

/// Validated construction-time configuration.
pub mod config;

/// The serial tuning protocol.
pub mod command;

/// The top-level control loop.
pub mod control;

/// Seams to the sampling and pulse-width peripherals.
pub mod io;

/// The anti-windup PID law.
pub mod pid;

/// Status lines written to the serial link.
pub mod report;

/// Millisecond timestamps and the interrupt-driven tick clock.
pub mod time;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;
