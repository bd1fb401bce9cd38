// Validated construction-time configuration of the control loop
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

use crate::pid::{
    cast, ControllerConfig, PidLimits, DEFAULT_DEADBAND, DEFAULT_INTEGRAL_LIMIT,
    DEFAULT_OUTPUT_MAX, DEFAULT_OUTPUT_MIN, DEFAULT_SENSOR_MAX, DEFAULT_SETPOINT,
};
use crate::report::{
    ReportStyle, StatusReporter, DEFAULT_ADC_FULL_SCALE, DEFAULT_DELIMITER, DEFAULT_REFERENCE_MV,
};

/// Period of the PID computation.
pub const DEFAULT_CONTROL_INTERVAL_MS: u32 = 10;

/// Period of the status line. Long enough that serial transmission never crowds out control.
pub const DEFAULT_REPORT_INTERVAL_MS: u32 = 100;

/// Rejected configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A gain is NaN or infinite.
    #[error("Gains must be finite")]
    NonFiniteGain,

    /// The output range is empty.
    #[error("Minimum output must be less than maximum output")]
    InvalidOutputRange,

    /// The integral limit is negative or not finite.
    #[error("Integral limit must be finite and non-negative")]
    InvalidIntegralLimit,

    /// The sensor range is empty.
    #[error("Sensor maximum must be positive")]
    InvalidSensorRange,

    /// A loop interval is zero.
    #[error("Control and report intervals must be at least one millisecond")]
    InvalidInterval,

    /// The reference voltage or ADC full scale is zero.
    #[error("Reference voltage and ADC full scale must be positive")]
    InvalidReference,

    /// The chart style draws too many dashes per volt.
    #[error("Chart scale must not exceed 100 dashes per volt")]
    InvalidChartScale,
}

/// Everything the control loop needs to know before it starts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoopConfig<F> {
    controller: ControllerConfig<F>,
    limits: PidLimits<F>,
    reporter: StatusReporter,
    control_interval_ms: u32,
    report_interval_ms: u32,
}

impl<F: FloatCore> Default for LoopConfig<F> {
    fn default() -> Self {
        LoopConfig {
            controller: ControllerConfig::default(),
            limits: PidLimits::default(),
            reporter: StatusReporter::default(),
            control_interval_ms: DEFAULT_CONTROL_INTERVAL_MS,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
        }
    }
}

impl<F: FloatCore> LoopConfig<F> {
    /// Returns the startup setpoint and gains.
    pub fn controller(&self) -> &ControllerConfig<F> {
        &self.controller
    }

    /// Returns the bounds of the control law.
    pub fn limits(&self) -> &PidLimits<F> {
        &self.limits
    }

    /// Returns the status line formatter.
    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    /// Returns the period of the PID computation in milliseconds.
    pub fn control_interval_ms(&self) -> u32 {
        self.control_interval_ms
    }

    /// Returns the period of the status line in milliseconds.
    pub fn report_interval_ms(&self) -> u32 {
        self.report_interval_ms
    }
}

/// Builds a [`LoopConfig`], validating every field at once in [`LoopConfigBuilder::build`].
///
/// ```
/// use pid_loop::config::LoopConfigBuilder;
///
/// let config = LoopConfigBuilder::<f32>::default()
///     .setpoint(512)
///     .kp(0.8)
///     .ki(0.02)
///     .control_interval_ms(5)
///     .build()
///     .expect("Invalid loop config");
///
/// assert_eq!(config.controller().setpoint(), 512);
/// assert_eq!(config.control_interval_ms(), 5);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct LoopConfigBuilder<F> {
    setpoint: u16,
    kp: F,
    ki: F,
    kd: F,
    sensor_max: u16,
    deadband: u16,
    integral_limit: F,
    output_min: u16,
    output_max: u16,
    control_interval_ms: u32,
    report_interval_ms: u32,
    reference_mv: u32,
    adc_full_scale: u32,
    delimiter: char,
    report_style: ReportStyle,
}

impl<F: FloatCore> Default for LoopConfigBuilder<F> {
    fn default() -> Self {
        let controller = ControllerConfig::<F>::default();
        LoopConfigBuilder {
            setpoint: DEFAULT_SETPOINT,
            kp: controller.kp(),
            ki: controller.ki(),
            kd: controller.kd(),
            sensor_max: DEFAULT_SENSOR_MAX,
            deadband: DEFAULT_DEADBAND,
            integral_limit: cast(DEFAULT_INTEGRAL_LIMIT),
            output_min: DEFAULT_OUTPUT_MIN,
            output_max: DEFAULT_OUTPUT_MAX,
            control_interval_ms: DEFAULT_CONTROL_INTERVAL_MS,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            reference_mv: DEFAULT_REFERENCE_MV,
            adc_full_scale: DEFAULT_ADC_FULL_SCALE,
            delimiter: DEFAULT_DELIMITER,
            report_style: ReportStyle::Compact,
        }
    }
}

impl<F: FloatCore> LoopConfigBuilder<F> {
    /// Startup setpoint in ADC counts. Clamped to the sensor range on build.
    pub fn setpoint(mut self, setpoint: u16) -> Self {
        self.setpoint = setpoint;
        self
    }

    /// Startup proportional gain.
    pub fn kp(mut self, kp: F) -> Self {
        self.kp = kp;
        self
    }

    /// Startup integral gain.
    pub fn ki(mut self, ki: F) -> Self {
        self.ki = ki;
        self
    }

    /// Startup derivative gain.
    pub fn kd(mut self, kd: F) -> Self {
        self.kd = kd;
        self
    }

    /// Highest ADC sample, and highest setpoint.
    pub fn sensor_max(mut self, sensor_max: u16) -> Self {
        self.sensor_max = sensor_max;
        self
    }

    /// Errors strictly smaller than this are treated as zero.
    pub fn deadband(mut self, deadband: u16) -> Self {
        self.deadband = deadband;
        self
    }

    /// Symmetric bound on the accumulated error.
    pub fn integral_limit(mut self, integral_limit: F) -> Self {
        self.integral_limit = integral_limit;
        self
    }

    /// Range of output counts.
    pub fn output_limits(mut self, output_min: u16, output_max: u16) -> Self {
        self.output_min = output_min;
        self.output_max = output_max;
        self
    }

    /// Period of the PID computation.
    pub fn control_interval_ms(mut self, control_interval_ms: u32) -> Self {
        self.control_interval_ms = control_interval_ms;
        self
    }

    /// Period of the status line.
    pub fn report_interval_ms(mut self, report_interval_ms: u32) -> Self {
        self.report_interval_ms = report_interval_ms;
        self
    }

    /// ADC reference voltage and number of ADC codes, used to express samples in volts.
    pub fn adc_reference(mut self, reference_mv: u32, adc_full_scale: u32) -> Self {
        self.reference_mv = reference_mv;
        self.adc_full_scale = adc_full_scale;
        self
    }

    /// Field separator of the status line.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Layout of the status line.
    pub fn report_style(mut self, report_style: ReportStyle) -> Self {
        self.report_style = report_style;
        self
    }

    /// Validates the settings.
    ///
    /// # Returns
    /// The first [`ConfigError`] found, or the finished [`LoopConfig`].
    pub fn build(self) -> Result<LoopConfig<F>, ConfigError> {
        let mut controller = ControllerConfig::new(self.sensor_max)?;
        controller.set_gains(self.kp, self.ki, self.kd)?;
        controller.set_setpoint(cast(self.setpoint));

        let limits = PidLimits::new(
            self.deadband,
            self.integral_limit,
            self.output_min,
            self.output_max,
        )?;

        if self.control_interval_ms == 0 || self.report_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        let reporter = StatusReporter::new(
            self.reference_mv,
            self.adc_full_scale,
            self.delimiter,
            self.report_style,
        )?;

        Ok(LoopConfig {
            controller,
            limits,
            reporter,
            control_interval_ms: self.control_interval_ms,
            report_interval_ms: self.report_interval_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_build_matches_defaults() {
        let built = LoopConfigBuilder::<f32>::default().build();
        assert_eq!(built, Ok(LoopConfig::default()));
    }

    #[test]
    fn test_setpoint_is_clamped_to_sensor_range() {
        let config = LoopConfigBuilder::<f32>::default()
            .sensor_max(255)
            .setpoint(300)
            .build()
            .unwrap();
        assert_eq!(config.controller().setpoint(), 255);
        assert_eq!(config.controller().setpoint_max(), 255);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let rejected = |builder: LoopConfigBuilder<f32>| builder.build().map(|_| ());

        assert_eq!(
            rejected(LoopConfigBuilder::default().sensor_max(0)),
            Err(ConfigError::InvalidSensorRange)
        );
        assert_eq!(
            rejected(LoopConfigBuilder::default().kp(f32::INFINITY)),
            Err(ConfigError::NonFiniteGain)
        );
        assert_eq!(
            rejected(LoopConfigBuilder::default().integral_limit(-1.0)),
            Err(ConfigError::InvalidIntegralLimit)
        );
        assert_eq!(
            rejected(LoopConfigBuilder::default().control_interval_ms(0)),
            Err(ConfigError::InvalidInterval)
        );
        assert_eq!(
            rejected(LoopConfigBuilder::default().report_interval_ms(0)),
            Err(ConfigError::InvalidInterval)
        );
        assert_eq!(
            rejected(LoopConfigBuilder::default().adc_reference(3300, 0)),
            Err(ConfigError::InvalidReference)
        );
        assert_eq!(
            rejected(LoopConfigBuilder::default().report_style(ReportStyle::Chart { scale: 1000 })),
            Err(ConfigError::InvalidChartScale)
        );
    }
}
