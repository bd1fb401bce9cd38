// Anti-windup PID law operating on integer ADC samples and PWM counts
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

use num_traits::float::FloatCore;
use num_traits::ToPrimitive;

use crate::config::ConfigError;
use crate::time::Millis;

/// Errors smaller than this many ADC counts are treated as zero.
pub const DEFAULT_DEADBAND: u16 = 2;

/// Bound on the accumulated error. Roughly the full output range divided by the default integral
/// gain; there is no point integrating past the value that alone saturates the output.
pub const DEFAULT_INTEGRAL_LIMIT: f32 = 10200.0;

/// Lowest PWM count the controller emits.
pub const DEFAULT_OUTPUT_MIN: u16 = 0;

/// Highest PWM count the controller emits. Matches a 9-bit PWM timer top.
pub const DEFAULT_OUTPUT_MAX: u16 = 511;

/// Highest value a 10-bit ADC returns, and therefore the highest meaningful setpoint.
pub const DEFAULT_SENSOR_MAX: u16 = 1023;

/// Startup setpoint in ADC counts.
pub const DEFAULT_SETPOINT: u16 = 300;

pub(crate) fn cast<F: FloatCore, T: ToPrimitive>(value: T) -> F {
    <F as num_traits::NumCast>::from(value).unwrap_or_else(F::zero)
}

/// Fixed bounds of the control law. These do not change while the loop runs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidLimits<F> {
    deadband: u16,
    integral_limit: F,
    output_min: u16,
    output_max: u16,
}

impl<F: FloatCore> Default for PidLimits<F> {
    fn default() -> Self {
        PidLimits {
            deadband: DEFAULT_DEADBAND,
            integral_limit: cast(DEFAULT_INTEGRAL_LIMIT),
            output_min: DEFAULT_OUTPUT_MIN,
            output_max: DEFAULT_OUTPUT_MAX,
        }
    }
}

impl<F: FloatCore> PidLimits<F> {
    /// Creates a validated set of bounds.
    ///
    /// # Returns
    /// - `Err(ConfigError::InvalidIntegralLimit)` if the integral limit is negative or not finite.
    /// - `Err(ConfigError::InvalidOutputRange)` if `output_min >= output_max`.
    pub fn new(
        deadband: u16,
        integral_limit: F,
        output_min: u16,
        output_max: u16,
    ) -> Result<Self, ConfigError> {
        if !integral_limit.is_finite() || integral_limit < F::zero() {
            return Err(ConfigError::InvalidIntegralLimit);
        }
        if output_min >= output_max {
            return Err(ConfigError::InvalidOutputRange);
        }
        Ok(PidLimits {
            deadband,
            integral_limit,
            output_min,
            output_max,
        })
    }

    /// Returns the dead-band half width in ADC counts.
    pub fn deadband(&self) -> u16 {
        self.deadband
    }

    /// Returns the symmetric bound on the accumulated error.
    pub fn integral_limit(&self) -> F {
        self.integral_limit
    }

    /// Returns the lowest output count.
    pub fn output_min(&self) -> u16 {
        self.output_min
    }

    /// Returns the highest output count.
    pub fn output_max(&self) -> u16 {
        self.output_max
    }
}

/// The runtime-tunable parameters: setpoint and the three gains.
///
/// This is what the serial command interpreter mutates. Gains may take any finite value, including
/// negative ones, to let an operator experiment freely; the setpoint is always kept within
/// `[0, setpoint_max]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControllerConfig<F> {
    setpoint: u16,
    setpoint_max: u16,
    kp: F,
    ki: F,
    kd: F,
}

impl<F: FloatCore> Default for ControllerConfig<F> {
    fn default() -> Self {
        ControllerConfig {
            setpoint: DEFAULT_SETPOINT,
            setpoint_max: DEFAULT_SENSOR_MAX,
            kp: cast(0.6),
            ki: cast(0.05),
            kd: cast(0.02),
        }
    }
}

impl<F: FloatCore> ControllerConfig<F> {
    /// Creates a configuration with zero gains and zero setpoint.
    ///
    /// # Returns
    /// - `Err(ConfigError::InvalidSensorRange)` if `setpoint_max` is zero.
    pub fn new(setpoint_max: u16) -> Result<Self, ConfigError> {
        if setpoint_max == 0 {
            return Err(ConfigError::InvalidSensorRange);
        }
        Ok(ControllerConfig {
            setpoint: 0,
            setpoint_max,
            kp: F::zero(),
            ki: F::zero(),
            kd: F::zero(),
        })
    }

    /// Returns the setpoint in ADC counts.
    pub fn setpoint(&self) -> u16 {
        self.setpoint
    }

    /// Returns the largest setpoint this configuration accepts.
    pub fn setpoint_max(&self) -> u16 {
        self.setpoint_max
    }

    /// Returns the proportional gain.
    pub fn kp(&self) -> F {
        self.kp
    }

    /// Returns the integral gain.
    pub fn ki(&self) -> F {
        self.ki
    }

    /// Returns the derivative gain.
    pub fn kd(&self) -> F {
        self.kd
    }

    /// Convenience method that returns the proportional, integral, and derivative gains together as a tuple.
    pub fn gains(&self) -> (F, F, F) {
        (self.kp, self.ki, self.kd)
    }

    /// Sets the setpoint from a possibly fractional, possibly out-of-range value.
    ///
    /// The fractional part is discarded and the result clamped to `[0, setpoint_max]`. A NaN
    /// setpoint becomes zero.
    ///
    /// # Returns
    /// The setpoint that was stored.
    pub fn set_setpoint(&mut self, setpoint: F) -> u16 {
        let clamped = num_traits::clamp(setpoint, F::zero(), cast(self.setpoint_max));
        self.setpoint = clamped.to_u16().unwrap_or(0);
        self.setpoint
    }

    /// Sets the proportional gain.
    ///
    /// # Returns
    /// - `Err(ConfigError::NonFiniteGain)` if the gain is NaN or infinite. The old gain is kept.
    pub fn set_kp(&mut self, kp: F) -> Result<(), ConfigError> {
        self.kp = finite_gain(kp)?;
        Ok(())
    }

    /// Sets the integral gain.
    ///
    /// # Returns
    /// - `Err(ConfigError::NonFiniteGain)` if the gain is NaN or infinite. The old gain is kept.
    pub fn set_ki(&mut self, ki: F) -> Result<(), ConfigError> {
        self.ki = finite_gain(ki)?;
        Ok(())
    }

    /// Sets the derivative gain.
    ///
    /// # Returns
    /// - `Err(ConfigError::NonFiniteGain)` if the gain is NaN or infinite. The old gain is kept.
    pub fn set_kd(&mut self, kd: F) -> Result<(), ConfigError> {
        self.kd = finite_gain(kd)?;
        Ok(())
    }

    /// Convenience method to set the proportional, integral, and derivative gains together.
    /// Nothing is changed unless all three are finite.
    pub fn set_gains(&mut self, kp: F, ki: F, kd: F) -> Result<(), ConfigError> {
        let (kp, ki, kd) = (finite_gain(kp)?, finite_gain(ki)?, finite_gain(kd)?);
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        Ok(())
    }
}

fn finite_gain<F: FloatCore>(gain: F) -> Result<F, ConfigError> {
    if gain.is_finite() {
        Ok(gain)
    } else {
        Err(ConfigError::NonFiniteGain)
    }
}

/// Accumulator state carried from one control step to the next.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidContext<F> {
    integral_error: F,
    last_error: i32,
    last_time: Millis,
    last_output: u16,
}

impl<F: FloatCore> Default for PidContext<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FloatCore> PidContext<F> {
    /// Creates a context with zero accumulated error, stamped at time zero.
    pub fn new() -> Self {
        Self {
            integral_error: F::zero(),
            last_error: 0,
            last_time: Millis::ZERO,
            last_output: 0,
        }
    }

    /// Returns the accumulated error, in ADC counts times steps.
    pub fn integral_error(&self) -> F {
        self.integral_error
    }

    /// Returns the (dead-banded) error of the last step.
    pub fn last_error(&self) -> i32 {
        self.last_error
    }

    /// Returns the timestamp of the last step.
    pub fn last_time(&self) -> Millis {
        self.last_time
    }

    /// Returns the clamped output of the last step.
    pub fn output(&self) -> u16 {
        self.last_output
    }
}

/// A functional implementation of the anti-windup PID law.
///
/// The controller holds only the fixed [`PidLimits`]; tunable parameters come in through a
/// [`ControllerConfig`] and accumulator state through a [`PidContext`] that is passed in and
/// returned with each call to `compute`, which keeps `compute` pure.
#[derive(Copy, Clone, Debug)]
pub struct FuncPidController<F> {
    limits: PidLimits<F>,
}

impl<F: FloatCore> FuncPidController<F> {
    /// Creates a controller with the given bounds.
    pub fn new(limits: PidLimits<F>) -> Self {
        FuncPidController { limits }
    }

    /// Returns the bounds of the control law.
    pub fn limits(&self) -> &PidLimits<F> {
        &self.limits
    }

    /// Computes one control step.
    ///
    /// The error is `setpoint - sample`, forced to zero inside the dead band. The derivative is
    /// taken on the error. The error is integrated only if doing so cannot push an output that is
    /// already at a limit further past it, and the integral is then hard-clamped to
    /// `±integral_limit`. The returned count is truncated and always lies within
    /// `[output_min, output_max]`.
    ///
    /// # Arguments
    /// - `ctx`: The state left by the previous step.
    /// - `sample`: The measured process variable in ADC counts.
    /// - `config`: Setpoint and gains to use for this step.
    /// - `timestamp`: When the sample was taken; recorded in the returned context.
    ///
    /// # Returns
    /// The new output count and the updated context.
    pub fn compute(
        &self,
        mut ctx: PidContext<F>,
        sample: u16,
        config: &ControllerConfig<F>,
        timestamp: Millis,
    ) -> (u16, PidContext<F>) {
        let mut error = i32::from(config.setpoint()) - i32::from(sample);

        // Quantization noise around the setpoint would otherwise keep the integrator hunting
        if error.unsigned_abs() < u32::from(self.limits.deadband) {
            error = 0;
        }

        let p_term = config.kp() * cast::<F, _>(error);

        let derivative = error - ctx.last_error;
        let d_term = config.kd() * cast::<F, _>(derivative);
        ctx.last_error = error;

        let output_min: F = cast(self.limits.output_min);
        let output_max: F = cast(self.limits.output_max);

        let tentative = p_term + config.ki() * ctx.integral_error + d_term;
        let integrate = if tentative >= output_max {
            error < 0
        } else if tentative <= output_min {
            error > 0
        } else {
            true
        };
        if integrate {
            ctx.integral_error = ctx.integral_error + cast::<F, _>(error);
        }

        let limit = self.limits.integral_limit;
        ctx.integral_error = num_traits::clamp(ctx.integral_error, -limit, limit);

        let output = p_term + config.ki() * ctx.integral_error + d_term;
        let clamped_output = num_traits::clamp(output, output_min, output_max)
            .to_u16()
            .unwrap_or(self.limits.output_min);

        ctx.last_time = timestamp;
        ctx.last_output = clamped_output;
        (clamped_output, ctx)
    }
}

/// A stateful implementation of the anti-windup PID law.
///
/// This wraps a [`FuncPidController`] and keeps the [`PidContext`] internally, so it can be used
/// without threading the context through every call.
#[derive(Copy, Clone, Debug)]
pub struct PidController<F> {
    ctx: PidContext<F>,
    controller: FuncPidController<F>,
}

impl<F: FloatCore> PidController<F> {
    /// Creates a controller with zeroed state.
    pub fn new(limits: PidLimits<F>) -> Self {
        Self {
            ctx: PidContext::new(),
            controller: FuncPidController::new(limits),
        }
    }

    /// Returns the bounds of the control law.
    pub fn limits(&self) -> &PidLimits<F> {
        self.controller.limits()
    }

    /// Returns the current accumulator state.
    pub fn context(&self) -> &PidContext<F> {
        &self.ctx
    }

    /// Computes one control step and keeps the updated state. See [`FuncPidController::compute`].
    pub fn compute(&mut self, sample: u16, config: &ControllerConfig<F>, timestamp: Millis) -> u16 {
        let (output, ctx) = self.controller.compute(self.ctx, sample, config, timestamp);
        self.ctx = ctx;
        output
    }
}
