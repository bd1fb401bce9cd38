// Seams to the sampling and pulse-width peripherals
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

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

/// Provides the process variable.
///
/// Implementations busy-wait for the conversion to finish; the latency must be bounded, and there
/// is no way to report failure. Closures returning `u16` implement this trait.
pub trait SampleSource {
    /// Returns the current sample, within `[0, sensor_max]`.
    fn sample(&mut self) -> u16;
}

impl<T: FnMut() -> u16> SampleSource for T {
    fn sample(&mut self) -> u16 {
        self()
    }
}

/// Drives the actuator.
///
/// The caller has already clamped the count to the output range; implementations do not check it
/// again. Closures taking a `u16` implement this trait.
pub trait ActuatorSink {
    /// Changes the actuation level immediately.
    fn set_output(&mut self, count: u16);
}

impl<T: FnMut(u16)> ActuatorSink for T {
    fn set_output(&mut self, count: u16) {
        self(count)
    }
}

/// Drives an `embedded-hal` PWM channel, mapping `[0, full_scale]` onto the channel's own duty
/// range.
pub struct PwmActuator<P> {
    pwm: P,
    full_scale: u16,
}

impl<P: SetDutyCycle> PwmActuator<P> {
    /// Wraps `pwm`. `full_scale` is the output count that means 100% duty, normally the
    /// controller's maximum output. A zero full scale is treated as one.
    pub fn new(pwm: P, full_scale: u16) -> Self {
        Self {
            pwm,
            full_scale: full_scale.max(1),
        }
    }

    /// Returns the wrapped channel.
    pub fn release(self) -> P {
        self.pwm
    }
}

impl<P: SetDutyCycle> ActuatorSink for PwmActuator<P> {
    fn set_output(&mut self, count: u16) {
        let count = count.min(self.full_scale);
        if let Err(e) = self.pwm.set_duty_cycle_fraction(count, self.full_scale) {
            warn!("pwm rejected duty {}/{}: {:?}", count, self.full_scale, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct RecordingPwm {
        max: u16,
        duty: u16,
    }

    impl embedded_hal::pwm::ErrorType for RecordingPwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for RecordingPwm {
        fn max_duty_cycle(&self) -> u16 {
            self.max
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duty = duty;
            Ok(())
        }
    }

    #[test]
    fn test_pwm_actuator_scales_to_channel_range() {
        let mut actuator = PwmActuator::new(RecordingPwm { max: 1022, duty: 0 }, 511);
        actuator.set_output(511);
        assert_eq!(actuator.pwm.duty, 1022);
        actuator.set_output(100);
        assert_eq!(actuator.pwm.duty, 200);
        actuator.set_output(0);
        assert_eq!(actuator.release().duty, 0);
    }

    #[test]
    fn test_closure_adapters() {
        let mut level = 0;
        {
            let mut sink = |count: u16| level = count;
            sink.set_output(42);
        }
        assert_eq!(level, 42);

        let mut source = || 7u16;
        assert_eq!(source.sample(), 7);
    }
}
