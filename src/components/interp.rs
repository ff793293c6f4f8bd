//! Piecewise-linear parameter lookup.
//!
//! Efficiency, ground current and voltage drop can be given either as a
//! constant or as a table over output current (1-D) or output current and
//! input voltage (2-D). Queries use magnitudes and clamp to the table edges;
//! a lookup never yields NaN.

use crate::error::{PowerTreeError, Result};

/// A characterization table as written in a netlist or built by the caller.
///
/// `data` holds one row per entry of `vi`, each with one value per entry of
/// `io`. A single `vi` row gives a 1-D table over current only.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpTable {
    pub vi: Vec<f64>,
    pub io: Vec<f64>,
    pub data: Vec<Vec<f64>>,
}

impl InterpTable {
    /// Create a new table.
    pub fn new(vi: Vec<f64>, io: Vec<f64>, data: Vec<Vec<f64>>) -> Self {
        Self { vi, io, data }
    }

    /// A table over current only.
    pub fn current_only(io: Vec<f64>, values: Vec<f64>) -> Self {
        Self {
            vi: vec![0.0],
            io,
            data: vec![values],
        }
    }
}

/// What a table holds, which decides the valid value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Efficiency, values in (0, 1]
    Efficiency,
    /// Ground current, values >= 0
    GroundCurrent,
    /// Voltage drop, values >= 0
    VoltageDrop,
}

impl TableKind {
    fn check_value(&self, component: &str, value: f64) -> Result<()> {
        let ok = match self {
            TableKind::Efficiency => value > 0.0 && value <= 1.0,
            TableKind::GroundCurrent | TableKind::VoltageDrop => value >= 0.0,
        };
        if ok && value.is_finite() {
            Ok(())
        } else {
            let what = match self {
                TableKind::Efficiency => "efficiency values must be in (0, 1]",
                TableKind::GroundCurrent => "ground current values must be >= 0",
                TableKind::VoltageDrop => "voltage drop values must be >= 0",
            };
            Err(PowerTreeError::invalid_table(
                component,
                format!("{} (got {})", what, value),
            ))
        }
    }
}

/// Parameter lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpolator {
    /// Same value everywhere.
    Constant(f64),
    /// Linear over output current.
    Linear1d { x: Vec<f64>, fx: Vec<f64> },
    /// Bilinear over output current (`x`) and input voltage (`y`).
    /// `fxy[j][i]` is the value at `(x[i], y[j])`.
    Linear2d {
        x: Vec<f64>,
        y: Vec<f64>,
        fxy: Vec<Vec<f64>>,
    },
}

impl Interpolator {
    /// Validate a constant parameter.
    pub fn constant(component: &str, kind: TableKind, value: f64) -> Result<Self> {
        kind.check_value(component, value).map_err(|_| {
            let message = match kind {
                TableKind::Efficiency => "efficiency must be in (0, 1]",
                TableKind::GroundCurrent => "ground current must be >= 0",
                TableKind::VoltageDrop => "voltage drop must be >= 0",
            };
            PowerTreeError::invalid_param(component, param_name(kind), message)
        })?;
        Ok(Interpolator::Constant(value))
    }

    /// Build an interpolator from a table, validating axes, shape and values.
    pub fn from_table(component: &str, kind: TableKind, table: &InterpTable) -> Result<Self> {
        if table.vi.is_empty() || table.data.len() != table.vi.len() {
            return Err(PowerTreeError::invalid_table(
                component,
                format!(
                    "expected {} data rows (one per vi), got {}",
                    table.vi.len(),
                    table.data.len()
                ),
            ));
        }
        if !strictly_increasing(&table.io) {
            return Err(PowerTreeError::invalid_table(
                component,
                "io values must be strictly increasing",
            ));
        }

        let x: Vec<f64> = table.io.iter().map(|v| v.abs()).collect();
        let ip = if table.vi.len() == 1 {
            Interpolator::Linear1d {
                x,
                fx: table.data[0].clone(),
            }
        } else {
            Interpolator::Linear2d {
                x,
                y: table.vi.iter().map(|v| v.abs()).collect(),
                fxy: table.data.clone(),
            }
        };
        ip.validate(component, kind)?;
        Ok(ip)
    }

    /// Check axes, shape and value range.
    ///
    /// Component constructors accept any interpolator, so this runs whenever
    /// a component is validated, not only for netlist tables.
    pub fn validate(&self, component: &str, kind: TableKind) -> Result<()> {
        match self {
            Interpolator::Constant(v) => Self::constant(component, kind, *v).map(|_| ()),
            Interpolator::Linear1d { x, fx } => {
                check_axis(component, "io", x)?;
                check_row(component, kind, x.len(), fx)
            }
            Interpolator::Linear2d { x, y, fxy } => {
                check_axis(component, "io", x)?;
                check_axis(component, "vi", y)?;
                if fxy.len() != y.len() {
                    return Err(PowerTreeError::invalid_table(
                        component,
                        format!(
                            "expected {} data rows (one per vi), got {}",
                            y.len(),
                            fxy.len()
                        ),
                    ));
                }
                fxy.iter()
                    .try_for_each(|row| check_row(component, kind, x.len(), row))
            }
        }
    }

    /// Look up the value at output current `io` and input voltage `vi`.
    pub fn interp(&self, io: f64, vi: f64) -> f64 {
        match self {
            Interpolator::Constant(v) => *v,
            Interpolator::Linear1d { x, fx } => interp1(x, fx, io.abs()),
            Interpolator::Linear2d { x, y, fxy } => {
                let (j, ty) = locate(y, vi.abs());
                let lo = interp1(x, &fxy[j], io.abs());
                if ty == 0.0 {
                    return lo;
                }
                let hi = interp1(x, &fxy[j + 1], io.abs());
                lo + (hi - lo) * ty
            }
        }
    }
}

fn param_name(kind: TableKind) -> &'static str {
    match kind {
        TableKind::Efficiency => "eff",
        TableKind::GroundCurrent => "ig",
        TableKind::VoltageDrop => "vdrop",
    }
}

fn strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] > w[0])
}

fn check_axis(component: &str, axis: &str, values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(PowerTreeError::invalid_table(
            component,
            format!("{} axis is empty", axis),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) || !strictly_increasing(values) {
        return Err(PowerTreeError::invalid_table(
            component,
            format!("{} values must be strictly increasing", axis),
        ));
    }
    Ok(())
}

fn check_row(component: &str, kind: TableKind, len: usize, row: &[f64]) -> Result<()> {
    if row.len() != len {
        return Err(PowerTreeError::invalid_table(
            component,
            format!("expected {} values per row (one per io), got {}", len, row.len()),
        ));
    }
    row.iter().try_for_each(|&v| kind.check_value(component, v))
}

/// Segment index and fractional position of `q` on axis `a`, clamped.
fn locate(a: &[f64], q: f64) -> (usize, f64) {
    let n = a.len();
    if n == 1 || q <= a[0] {
        return (0, 0.0);
    }
    if q >= a[n - 1] {
        return (n - 2, 1.0);
    }
    // a[k] <= q < a[k + 1]
    let k = a.partition_point(|&v| v <= q) - 1;
    (k, (q - a[k]) / (a[k + 1] - a[k]))
}

fn interp1(x: &[f64], fx: &[f64], q: f64) -> f64 {
    let (k, t) = locate(x, q);
    if t == 0.0 {
        return fx[k];
    }
    fx[k] + (fx[k + 1] - fx[k]) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let ip = Interpolator::constant("U1", TableKind::Efficiency, 0.9).unwrap();
        assert_eq!(ip.interp(3.0, 12.0), 0.9);
        assert!(Interpolator::constant("U1", TableKind::Efficiency, 1.2).is_err());
        assert!(Interpolator::constant("U1", TableKind::Efficiency, 0.0).is_err());
        assert!(Interpolator::constant("U1", TableKind::GroundCurrent, -1e-3).is_err());
    }

    #[test]
    fn test_1d_clamps_at_ends() {
        let table = InterpTable::current_only(vec![0.1, 0.5, 0.9], vec![0.1, 0.2, 0.3]);
        let ip = Interpolator::from_table("U1", TableKind::Efficiency, &table).unwrap();
        assert!((ip.interp(0.05, 0.0) - 0.1).abs() < 1e-12);
        assert!((ip.interp(5.0, 0.0) - 0.3).abs() < 1e-12);
        assert!((ip.interp(0.3, 0.0) - 0.15).abs() < 1e-12);
        assert!((ip.interp(-0.7, 0.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_1d_exact_points() {
        let table = InterpTable::current_only(vec![0.1, 0.5, 0.9], vec![0.1, 0.2, 0.3]);
        let ip = Interpolator::from_table("U1", TableKind::Efficiency, &table).unwrap();
        assert!((ip.interp(0.5, 0.0) - 0.2).abs() < 1e-12);
        assert!((ip.interp(0.9, 0.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_2d_inside_and_clamped() {
        let table = InterpTable::new(
            vec![5.0, 10.0],
            vec![0.1, 1.0],
            vec![vec![0.5, 0.7], vec![0.6, 0.9]],
        );
        let ip = Interpolator::from_table("U1", TableKind::Efficiency, &table).unwrap();
        // corners
        assert!((ip.interp(0.1, 5.0) - 0.5).abs() < 1e-12);
        assert!((ip.interp(1.0, 10.0) - 0.9).abs() < 1e-12);
        // centre
        assert!((ip.interp(0.55, 7.5) - 0.675).abs() < 1e-12);
        // outside the hull in every direction
        assert!((ip.interp(0.0, 0.0) - 0.5).abs() < 1e-12);
        assert!((ip.interp(5.0, 20.0) - 0.9).abs() < 1e-12);
        assert!((ip.interp(0.0, 20.0) - 0.6).abs() < 1e-12);
        assert!((ip.interp(5.0, 7.5) - 0.8).abs() < 1e-12);
        assert!(!ip.interp(-3.0, -30.0).is_nan());
    }

    #[test]
    fn test_rejects_bad_tables() {
        let not_increasing = InterpTable::current_only(vec![0.1, 0.1, 0.9], vec![0.1, 0.2, 0.3]);
        assert!(Interpolator::from_table("U1", TableKind::Efficiency, &not_increasing).is_err());

        let bad_shape = InterpTable::new(vec![5.0, 10.0], vec![0.1, 1.0], vec![vec![0.5, 0.7]]);
        assert!(Interpolator::from_table("U1", TableKind::Efficiency, &bad_shape).is_err());

        let bad_value = InterpTable::current_only(vec![0.1, 1.0], vec![0.5, 1.5]);
        assert!(Interpolator::from_table("U1", TableKind::Efficiency, &bad_value).is_err());

        let negative_ig = InterpTable::current_only(vec![0.1, 1.0], vec![1e-3, -1e-3]);
        assert!(Interpolator::from_table("U1", TableKind::GroundCurrent, &negative_ig).is_err());

        let empty = InterpTable::current_only(vec![], vec![]);
        assert!(Interpolator::from_table("U1", TableKind::Efficiency, &empty).is_err());
    }

    #[test]
    fn test_validate_hand_built_tables() {
        let ok = Interpolator::Linear1d {
            x: vec![0.1, 0.5],
            fx: vec![0.8, 0.9],
        };
        assert!(ok.validate("U1", TableKind::Efficiency).is_ok());

        let decreasing = Interpolator::Linear1d {
            x: vec![0.5, 0.1],
            fx: vec![0.8, 0.9],
        };
        assert!(decreasing.validate("U1", TableKind::Efficiency).is_err());

        let out_of_range = Interpolator::Linear1d {
            x: vec![0.1, 0.5],
            fx: vec![0.0, 2.0],
        };
        assert!(out_of_range.validate("U1", TableKind::Efficiency).is_err());

        let empty = Interpolator::Linear1d { x: vec![], fx: vec![] };
        assert!(empty.validate("U1", TableKind::GroundCurrent).is_err());

        let short_row = Interpolator::Linear2d {
            x: vec![0.1, 1.0],
            y: vec![5.0, 10.0],
            fxy: vec![vec![0.5, 0.7], vec![0.6]],
        };
        assert!(short_row.validate("U1", TableKind::Efficiency).is_err());

        let missing_row = Interpolator::Linear2d {
            x: vec![0.1, 1.0],
            y: vec![5.0, 10.0],
            fxy: vec![vec![0.5, 0.7]],
        };
        assert!(missing_row.validate("U1", TableKind::Efficiency).is_err());
    }
}
