// Host-side plant model and peripheral doubles for closed-loop tests and demos
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

use core::convert::Infallible;
use core::time::Duration;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use nalgebra as na;

use crate::io::{ActuatorSink, SampleSource};

/// A PWM pin smoothed by a two-stage RC ladder and read back by an ADC.
pub struct RcPlant {
    /// R * C of each stage, in seconds.
    pub time_constant: f64,
    /// Voltage of the PWM pin when high.
    pub supply_volts: f64,
    /// ADC reference voltage.
    pub reference_volts: f64,
    /// Number of ADC codes.
    pub adc_full_scale: u16,
    /// PWM count that means 100% duty.
    pub pwm_full_scale: u16,
    state: na::Vector2<f64>,
    duty: f64,
}

impl RcPlant {
    /// A 3.3 V rig with a 10-bit ADC and a 9-bit PWM, starting discharged.
    pub fn new(time_constant: Duration) -> Self {
        Self {
            time_constant: time_constant.as_secs_f64(),
            supply_volts: 3.3,
            reference_volts: 3.3,
            adc_full_scale: 1024,
            pwm_full_scale: 511,
            state: na::Vector2::zeros(),
            duty: 0.0,
        }
    }

    /// Implements the state-space realization of the loaded two-stage RC ladder:
    /// ┌     ┐         ┌         ┐┌    ┐         ┌   ┐
    /// │ v₁' │ = 1/τ · │ -2    1  ││ v₁ │ + 1/τ · │ 1 │ u
    /// │ v₂' │         │  1   -1  ││ v₂ │         │ 0 │
    /// └     ┘         └         ┘└    ┘         └   ┘
    pub fn f(&self, x: na::Vector2<f64>, u: f64) -> na::Vector2<f64> {
        let mat_a = na::Matrix2::new(-2.0, 1.0, 1.0, -1.0) / self.time_constant;
        let mat_b = na::Vector2::new(1.0, 0.0) / self.time_constant;

        mat_a * x + mat_b * u
    }

    /// The ADC sees the second capacitor.
    pub fn h(&self, x: na::Vector2<f64>) -> f64 {
        x[1]
    }

    /// Latches a new PWM count.
    pub fn set_pwm(&mut self, count: u16) {
        self.duty = if self.pwm_full_scale == 0 {
            0.0
        } else {
            f64::from(count.min(self.pwm_full_scale)) / f64::from(self.pwm_full_scale)
        };
    }

    /// Integrates the ladder forward with one Euler step.
    pub fn advance(&mut self, dt: Duration) {
        let u = self.duty * self.supply_volts;
        let dx = self.f(self.state, u);
        self.state += dx * dt.as_secs_f64();
    }

    /// Returns the voltage at the ADC pin.
    pub fn output_volts(&self) -> f64 {
        self.h(self.state)
    }

    /// Returns what the ADC would convert right now.
    pub fn adc_reading(&self) -> u16 {
        let max_code = f64::from(self.adc_full_scale.saturating_sub(1));
        let code = self.output_volts() / self.reference_volts * f64::from(self.adc_full_scale);
        code.round().clamp(0.0, max_code) as u16
    }
}

/// A plant shared between the sensor and actuator doubles.
pub type SharedPlant = Rc<RefCell<RcPlant>>;

/// Samples a [`SharedPlant`].
pub struct PlantSensor(pub SharedPlant);

impl SampleSource for PlantSensor {
    fn sample(&mut self) -> u16 {
        self.0.borrow().adc_reading()
    }
}

/// Drives a [`SharedPlant`].
pub struct PlantActuator(pub SharedPlant);

impl ActuatorSink for PlantActuator {
    fn set_output(&mut self, count: u16) {
        self.0.borrow_mut().set_pwm(count);
    }
}

/// An in-memory serial port: bytes queued with [`ScriptedSerial::send`] become readable one at a
/// time, and everything written is captured.
#[derive(Debug, Default)]
pub struct ScriptedSerial {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl ScriptedSerial {
    /// Queues bytes as if the host had sent them.
    pub fn send(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Returns everything written so far and clears the capture.
    pub fn take_output(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }
}

impl embedded_io::ErrorType for ScriptedSerial {
    type Error = Infallible;
}

impl embedded_io::Read for ScriptedSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for ScriptedSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl embedded_io::Write for ScriptedSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
