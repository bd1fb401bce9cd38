// Periodic status lines written to the serial link
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

use core::fmt::{self, Write as _};

use embedded_io::Write;

use crate::config::ConfigError;
use crate::time::Millis;

/// ADC reference voltage in millivolts.
pub const DEFAULT_REFERENCE_MV: u32 = 3300;

/// Number of distinct ADC codes; a 10-bit converter.
pub const DEFAULT_ADC_FULL_SCALE: u32 = 1024;

/// Field separator of the status line.
pub const DEFAULT_DELIMITER: char = '|';

/// Bar length per volt in [`ReportStyle::Chart`].
pub const DEFAULT_CHART_SCALE: u16 = 50;

/// Largest accepted bar length per volt.
pub const MAX_CHART_SCALE: u16 = 100;

const FRACTION_DIGITS: u64 = 10_000;

/// One sample of loop state to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// When the report was taken.
    pub time: Millis,
    /// Most recent ADC sample.
    pub sample: u16,
    /// Most recent output count.
    pub output: u16,
}

/// Layout of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportStyle {
    /// `time|volts|count`, meant for host-side plotting.
    #[default]
    Compact,
    /// `000100 | V:0.6445 | PWM: 60 | ---*`: zero-padded time, labelled fields and a bar of
    /// `volts * scale` dashes, meant for a human watching a terminal.
    Chart {
        /// Dashes per volt.
        scale: u16,
    },
}

/// A voltage in fixed point with four fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Volts {
    ten_thousandths: u64,
}

impl Volts {
    /// Returns the voltage in units of 0.1 mV.
    pub fn ten_thousandths(&self) -> u64 {
        self.ten_thousandths
    }
}

impl fmt::Display for Volts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:04}",
            self.ten_thousandths / FRACTION_DIGITS,
            self.ten_thousandths % FRACTION_DIGITS
        )
    }
}

/// Formats [`StatusReport`]s and writes them to a serial transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReporter {
    reference_mv: u32,
    adc_full_scale: u32,
    delimiter: char,
    style: ReportStyle,
}

impl Default for StatusReporter {
    fn default() -> Self {
        StatusReporter {
            reference_mv: DEFAULT_REFERENCE_MV,
            adc_full_scale: DEFAULT_ADC_FULL_SCALE,
            delimiter: DEFAULT_DELIMITER,
            style: ReportStyle::Compact,
        }
    }
}

impl StatusReporter {
    /// Creates a reporter.
    ///
    /// # Returns
    /// - `Err(ConfigError::InvalidReference)` if either the reference voltage or the ADC full
    ///   scale is zero.
    /// - `Err(ConfigError::InvalidChartScale)` if a chart style asks for more than
    ///   [`MAX_CHART_SCALE`] dashes per volt.
    pub fn new(
        reference_mv: u32,
        adc_full_scale: u32,
        delimiter: char,
        style: ReportStyle,
    ) -> Result<Self, ConfigError> {
        if reference_mv == 0 || adc_full_scale == 0 {
            return Err(ConfigError::InvalidReference);
        }
        if let ReportStyle::Chart { scale } = style {
            if scale > MAX_CHART_SCALE {
                return Err(ConfigError::InvalidChartScale);
            }
        }
        Ok(StatusReporter {
            reference_mv,
            adc_full_scale,
            delimiter,
            style,
        })
    }

    /// Returns the line layout.
    pub fn style(&self) -> ReportStyle {
        self.style
    }

    /// Returns the field separator.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Converts an ADC sample to the voltage it represents, rounded to the nearest 0.1 mV.
    pub fn measured_value(&self, sample: u16) -> Volts {
        let full_scale = u64::from(self.adc_full_scale);
        let numerator = u64::from(sample) * u64::from(self.reference_mv) * 10;
        Volts {
            ten_thousandths: (numerator + full_scale / 2) / full_scale,
        }
    }

    /// Writes one newline-terminated status line.
    ///
    /// # Returns
    /// The transport's error if any write fails. Part of the line may have been sent already.
    pub fn write<W: Write>(&self, serial: &mut W, report: &StatusReport) -> Result<(), W::Error> {
        let mut sink = FmtSink {
            inner: serial,
            error: None,
        };
        match sink.write_report(self, report) {
            Ok(()) => Ok(()),
            Err(fmt::Error) => match sink.error {
                Some(e) => Err(e),
                // Formatting integers into an unbounded sink does not fail on its own
                None => Ok(()),
            },
        }
    }
}

/// Adapts an `embedded_io::Write` to `core::fmt::Write`, keeping the transport error that
/// `fmt::Error` cannot carry.
struct FmtSink<'a, W: Write> {
    inner: &'a mut W,
    error: Option<W::Error>,
}

impl<W: Write> fmt::Write for FmtSink<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write_all(s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}

impl<W: Write> FmtSink<'_, W> {
    fn write_report(&mut self, reporter: &StatusReporter, report: &StatusReport) -> fmt::Result {
        let volts = reporter.measured_value(report.sample);
        let delim = reporter.delimiter;
        match reporter.style {
            ReportStyle::Compact => {
                writeln!(
                    self,
                    "{}{delim}{volts}{delim}{}",
                    report.time.as_u32(),
                    report.output
                )
            }
            ReportStyle::Chart { scale } => {
                write!(
                    self,
                    "{:06} {delim} V:{volts} {delim} PWM:{:3} {delim} ",
                    report.time.as_u32(),
                    report.output
                )?;
                let bar = volts.ten_thousandths() * u64::from(scale) / FRACTION_DIGITS;
                for _ in 0..bar {
                    self.write_char('-')?;
                }
                self.write_str("*\n")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write as _;

    #[test]
    fn test_measured_value_scaling() {
        let reporter = StatusReporter::default();
        assert_eq!(reporter.measured_value(0), Volts { ten_thousandths: 0 });
        // 512 / 1024 * 3.3 V
        assert_eq!(reporter.measured_value(512).ten_thousandths(), 16_500);
        // 1023 / 1024 * 3.3 V = 3.29677..., rounded
        assert_eq!(reporter.measured_value(1023).ten_thousandths(), 32_968);
    }

    #[test]
    fn test_volts_display_pads_fraction() {
        let volts = Volts {
            ten_thousandths: 10_032,
        };
        let mut text = heapless::String::<16>::new();
        assert!(write!(text, "{volts}").is_ok());
        assert_eq!(text.as_str(), "1.0032");
    }

    #[test]
    fn test_zero_reference_is_rejected() {
        assert_eq!(
            StatusReporter::new(0, 1024, '|', ReportStyle::Compact),
            Err(ConfigError::InvalidReference)
        );
        assert_eq!(
            StatusReporter::new(3300, 0, '|', ReportStyle::Compact),
            Err(ConfigError::InvalidReference)
        );
    }

    #[test]
    fn test_chart_scale_is_bounded() {
        let chart = |scale| StatusReporter::new(3300, 1024, '|', ReportStyle::Chart { scale });

        assert!(chart(MAX_CHART_SCALE).is_ok());
        assert_eq!(
            chart(MAX_CHART_SCALE + 1),
            Err(ConfigError::InvalidChartScale)
        );
        assert_eq!(chart(u16::MAX), Err(ConfigError::InvalidChartScale));
    }
}
