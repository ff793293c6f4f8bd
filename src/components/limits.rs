//! Operating limits and limit warnings.
//!
//! Every component carries a [`Limits`] table with one `[min, max]` range per
//! [`Metric`]. Peak temperature is compared as a signed value; every other
//! metric is compared by magnitude, so a range of `[0, 0.5]` on `ii` flags an
//! input current of -0.6 A as well as 0.6 A.

use std::fmt;

use crate::error::{PowerTreeError, Result};

/// Default upper bound for every metric.
pub const LIMIT_MAX: f64 = 1.0e6;

/// A checked quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    /// Input voltage
    Vi,
    /// Output voltage
    Vo,
    /// Voltage drop
    Vd,
    /// Input current
    Ii,
    /// Output current
    Io,
    /// Input power
    Pi,
    /// Output power
    Po,
    /// Power loss
    Pl,
    /// Temperature rise
    Tr,
    /// Peak temperature
    Tp,
}

impl Metric {
    /// All metrics in report order.
    pub const ALL: [Metric; 10] = [
        Metric::Vi,
        Metric::Vo,
        Metric::Vd,
        Metric::Ii,
        Metric::Io,
        Metric::Pi,
        Metric::Po,
        Metric::Pl,
        Metric::Tr,
        Metric::Tp,
    ];

    /// Short metric name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Vi => "vi",
            Metric::Vo => "vo",
            Metric::Vd => "vd",
            Metric::Ii => "ii",
            Metric::Io => "io",
            Metric::Pi => "pi",
            Metric::Po => "po",
            Metric::Pl => "pl",
            Metric::Tr => "tr",
            Metric::Tp => "tp",
        }
    }

    /// Parse a metric from its short name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inclusive `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// Per-metric operating limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    ranges: [Range; 10],
}

impl Default for Limits {
    fn default() -> Self {
        let mut ranges = [Range {
            min: 0.0,
            max: LIMIT_MAX,
        }; 10];
        ranges[Metric::Tp.index()] = Range {
            min: -LIMIT_MAX,
            max: LIMIT_MAX,
        };
        Self { ranges }
    }
}

impl Limits {
    /// Default limits (no practical restriction).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the range of one metric.
    pub fn with(mut self, metric: Metric, min: f64, max: f64) -> Self {
        self.set(metric, min, max);
        self
    }

    /// Set the range of one metric in place.
    pub fn set(&mut self, metric: Metric, min: f64, max: f64) {
        self.ranges[metric.index()] = Range { min, max };
    }

    /// Range of one metric.
    pub fn get(&self, metric: Metric) -> Range {
        self.ranges[metric.index()]
    }

    /// Check that every range is well formed.
    pub fn validate(&self, component: &str) -> Result<()> {
        for metric in Metric::ALL {
            let r = self.get(metric);
            if !r.min.is_finite() || !r.max.is_finite() {
                return Err(PowerTreeError::InvalidLimits {
                    component: component.to_string(),
                    metric: metric.to_string(),
                    message: "limits must be finite".to_string(),
                });
            }
            let (lo, hi) = match metric {
                Metric::Tp => (r.min, r.max),
                _ => (r.min.abs(), r.max.abs()),
            };
            if lo > hi {
                return Err(PowerTreeError::InvalidLimits {
                    component: component.to_string(),
                    metric: metric.to_string(),
                    message: format!("min {} exceeds max {}", r.min, r.max),
                });
            }
        }
        Ok(())
    }

    /// Whether `value` lies outside the range of `metric`.
    pub fn exceeded(&self, metric: Metric, value: f64) -> bool {
        let r = self.get(metric);
        match metric {
            Metric::Tp => value > r.max || value < r.min,
            _ => value.abs() > r.max.abs() || value.abs() < r.min.abs(),
        }
    }

    /// Evaluate a set of metric values and collect the excursions.
    pub fn check(&self, values: &[(Metric, f64)]) -> Warnings {
        let mut warnings = Warnings::default();
        for &(metric, value) in values {
            if self.exceeded(metric, value) {
                warnings.insert(metric);
            }
        }
        warnings
    }
}

/// Set of metrics that exceeded their limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Warnings {
    bits: u16,
}

impl Warnings {
    /// No warnings.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: Metric) {
        self.bits |= 1 << metric.index();
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.bits & (1 << metric.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Union with another warning set.
    pub fn merge(&mut self, other: Warnings) {
        self.bits |= other.bits;
    }

    /// Exceeded metrics in report order.
    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl fmt::Display for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for metric in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(metric.as_str())?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert!(!limits.exceeded(Metric::Ii, 0.0));
        assert!(!limits.exceeded(Metric::Ii, -5.0));
        assert!(limits.exceeded(Metric::Pi, 2.0e6));
        assert!(!limits.exceeded(Metric::Tp, -40.0));
    }

    #[test]
    fn test_magnitude_comparison() {
        let limits = Limits::new().with(Metric::Ii, 0.1, 0.5);
        assert!(limits.exceeded(Metric::Ii, -0.6));
        assert!(limits.exceeded(Metric::Ii, 0.05));
        assert!(!limits.exceeded(Metric::Ii, -0.3));
    }

    #[test]
    fn test_peak_temperature_is_signed() {
        let limits = Limits::new().with(Metric::Tp, -10.0, 85.0);
        assert!(limits.exceeded(Metric::Tp, -20.0));
        assert!(!limits.exceeded(Metric::Tp, -5.0));
        assert!(limits.exceeded(Metric::Tp, 90.0));
    }

    #[test]
    fn test_warnings_display() {
        let limits = Limits::new()
            .with(Metric::Vi, 0.0, 3.0)
            .with(Metric::Tr, 0.0, 10.0);
        let w = limits.check(&[
            (Metric::Tr, 20.0),
            (Metric::Vi, 5.0),
            (Metric::Ii, 0.1),
        ]);
        assert_eq!(w.to_string(), "vi tr");
        assert!(!w.is_empty());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let limits = Limits::new().with(Metric::Io, 2.0, 1.0);
        assert!(limits.validate("U1").is_err());
        assert!(Limits::new().validate("U1").is_ok());
    }

    #[test]
    fn test_metric_from_name() {
        assert_eq!(Metric::from_name("tp"), Some(Metric::Tp));
        assert_eq!(Metric::from_name("PL"), Some(Metric::Pl));
        assert_eq!(Metric::from_name("xx"), None);
    }
}
