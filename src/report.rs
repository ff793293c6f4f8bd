//! CSV output of solve results and rail reports.
//!
//! Optional columns appear only when some row uses them: `Rail in`/`Rail out`
//! replace `Parent` once any rail is defined, `Domain` appears with several
//! sources, and temperature columns appear once any component heats up.

use std::borrow::Cow;
use std::io::Write;

use crate::error::Result;
use crate::solver::{RailRow, Report, ResultRow, RowKind};

/// Write the result rows of a report as CSV.
pub fn write_results_csv<W: Write>(report: &Report, out: &mut W) -> Result<()> {
    let rows = &report.rows;
    let rails = rows.iter().any(|r| r.rail_out.is_some());
    let domains = report.has_subsystems();
    let groups = rows.iter().any(|r| r.group.is_some());
    let phases = rows.iter().any(|r| r.phase.is_some());
    let thermal = rows.iter().any(|r| r.temp_rise.is_some_and(|t| t > 0.0));

    let mut header: Vec<Cow<str>> = vec!["Component".into(), "Type".into()];
    header.push(if rails { "Rail in" } else { "Parent" }.into());
    if domains {
        header.push("Domain".into());
    }
    if groups {
        header.push("Group".into());
    }
    header.extend(report.tags.iter().map(|(k, _)| Cow::from(k.as_str())));
    if phases {
        header.push("Phase".into());
    }
    header.extend(["Vin (V)", "Vout (V)"].map(Cow::from));
    if rails {
        header.push("Rail out".into());
    }
    header.extend(
        ["Iin (A)", "Iout (A)", "Power (W)", "Loss (W)", "Efficiency (%)"].map(Cow::from),
    );
    if thermal {
        header.extend(["Temp. rise (°C)", "Peak temp. (°C)"].map(Cow::from));
    }
    if report.energy {
        header.push("24h energy (Wh)".into());
    }
    header.push("Warnings".into());
    write_record(out, &header)?;

    for row in rows {
        let mut rec: Vec<Cow<str>> = vec![row.name.as_str().into(), kind_name(row).into()];
        let upstream = if rails { &row.rail_in } else { &row.parent };
        rec.push(text(upstream));
        if domains {
            rec.push(text(&row.domain));
        }
        if groups {
            rec.push(text(&row.group));
        }
        rec.extend(report.tags.iter().map(|(_, v)| Cow::from(v.as_str())));
        if phases {
            rec.push(text(&row.phase));
        }
        rec.push(number(row.vin));
        rec.push(number(row.vout));
        if rails {
            rec.push(text(&row.rail_out));
        }
        rec.push(number(row.iin));
        rec.push(number(row.iout));
        rec.push(row.power.to_string().into());
        rec.push(row.loss.to_string().into());
        rec.push(row.efficiency.to_string().into());
        if thermal {
            rec.push(number(row.temp_rise));
            rec.push(number(row.peak_temp));
        }
        if report.energy {
            rec.push(row.energy.to_string().into());
        }
        rec.push(warning_text(row));
        write_record(out, &rec)?;
    }
    Ok(())
}

/// Write a rail report as CSV.
pub fn write_rails_csv<W: Write>(rails: &[RailRow], out: &mut W) -> Result<()> {
    let phases = rails.iter().any(|r| r.phase.is_some());
    let mut header: Vec<Cow<str>> = Vec::new();
    if phases {
        header.push("Phase".into());
    }
    header.extend(
        [
            "Rail",
            "Voltage (V)",
            "Current (A)",
            "Power (W)",
            "Loss (W)",
            "Efficiency (%)",
            "Warnings",
        ]
        .map(Cow::from),
    );
    write_record(out, &header)?;

    for rail in rails {
        let mut rec: Vec<Cow<str>> = Vec::new();
        if phases {
            rec.push(text(&rail.phase));
        }
        rec.push(rail.rail.as_str().into());
        rec.push(rail.voltage.to_string().into());
        rec.push(rail.current.to_string().into());
        rec.push(rail.power.to_string().into());
        rec.push(rail.loss.to_string().into());
        rec.push(rail.efficiency.to_string().into());
        rec.push(rail.warnings.to_string().into());
        write_record(out, &rec)?;
    }
    Ok(())
}

fn kind_name(row: &ResultRow) -> &'static str {
    match row.kind {
        RowKind::Component(kind) => kind.as_str(),
        _ => "",
    }
}

fn warning_text(row: &ResultRow) -> Cow<'_, str> {
    match row.kind {
        RowKind::Component(_) => row.warnings.to_string().into(),
        _ if row.flagged => "Yes".into(),
        _ => "".into(),
    }
}

fn text(value: &Option<String>) -> Cow<'_, str> {
    value.as_deref().unwrap_or("").into()
}

fn number(value: Option<f64>) -> Cow<'static, str> {
    value.map(|v| v.to_string()).unwrap_or_default().into()
}

fn write_record<W: Write>(out: &mut W, fields: &[Cow<str>]) -> Result<()> {
    let line: Vec<Cow<str>> = fields.iter().map(|f| escape(f)).collect();
    writeln!(out, "{}", line.join(","))?;
    Ok(())
}

/// Quote a field holding a separator, quote or line break.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Load, Source};
    use crate::network::{NodeOptions, PowerNetwork};
    use crate::solver::{Analyzer, SolveConfig};

    fn csv(report: &Report) -> String {
        let mut buf = Vec::new();
        write_results_csv(report, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_results_csv_layout() {
        let mut net = PowerNetwork::new("t", Source::new("BAT", 5.0), NodeOptions::new()).unwrap();
        net.add_component("BAT", Load::power("MCU", 0.5), NodeOptions::new())
            .unwrap();
        let config = SolveConfig::new().with_tag("Board", "rev A").with_energy(true);
        let report = Analyzer::new(&net).with_config(config).solve().unwrap();
        let text = csv(&report);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Component,Type,Parent,Board,Vin (V)"));
        assert!(lines[0].ends_with("24h energy (Wh),Warnings"));
        assert!(lines[2].starts_with("MCU,LOAD,BAT,rev A,5,"));
        assert!(lines[3].starts_with("System total,,,rev A,,,"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_rails_csv() {
        let mut net = PowerNetwork::new(
            "t",
            Source::new("BAT", 5.0),
            NodeOptions::new().with_rail("VBAT"),
        )
        .unwrap();
        net.add_component("VBAT", Load::current("L", 0.2), NodeOptions::new())
            .unwrap();
        let rails = Analyzer::new(&net).rail_report().unwrap();
        let mut buf = Vec::new();
        write_rails_csv(&rails, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("VBAT,5,0.2,1,0,100,")
        );
    }
}
