//! CSV and JSON rendering of read results.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use clap::ValueEnum;
use serde_json::{json, Map, Value};

use hds_cache::ArtifactStatus;
use hds_core::{AttributeTable, AttributeValue, BasinId, Nestedness, SeriesArray, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Csv,
    Json,
}

/// A file when a path is given, stdout otherwise.
pub fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn column(v: &Variable) -> String {
    format!("{}({})", v.name, v.unit)
}

fn number(x: Option<f64>) -> String {
    x.map(|v| v.to_string()).unwrap_or_default()
}

fn attribute_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Number(x) => json!(x),
        AttributeValue::Text(s) => json!(s),
        AttributeValue::Missing => Value::Null,
    }
}

fn finish_json<W: Write>(rows: Vec<Value>, mut out: W) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut out, &rows)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// One row per basin.
pub fn write_attributes<W: Write>(table: &AttributeTable, format: Format, out: W) -> anyhow::Result<()> {
    match format {
        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(out);
            let mut header = vec!["basin".to_string()];
            header.extend(table.variables.iter().map(column));
            wtr.write_record(&header)?;
            for (b, basin) in table.basins.iter().enumerate() {
                let mut record = vec![basin.to_string()];
                for v in 0..table.variables.len() {
                    record.push(match table.cell(b, v) {
                        AttributeValue::Number(x) => x.to_string(),
                        AttributeValue::Text(s) => s.clone(),
                        AttributeValue::Missing => String::new(),
                    });
                }
                wtr.write_record(&record)?;
            }
            wtr.flush()?;
            Ok(())
        }
        Format::Json => {
            let rows = table
                .basins
                .iter()
                .enumerate()
                .map(|(b, basin)| {
                    let mut row = Map::new();
                    row.insert("basin".into(), json!(basin.as_str()));
                    for (v, var) in table.variables.iter().enumerate() {
                        row.insert(var.name.clone(), attribute_json(table.cell(b, v)));
                    }
                    Value::Object(row)
                })
                .collect();
            finish_json(rows, out)
        }
    }
}

/// One row per basin and day.
pub fn write_series<W: Write>(arr: &SeriesArray, format: Format, out: W) -> anyhow::Result<()> {
    let days: Vec<String> = arr
        .time_range
        .days()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    match format {
        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(out);
            let mut header = vec!["basin".to_string(), "date".to_string()];
            header.extend(arr.variables.iter().map(column));
            wtr.write_record(&header)?;
            for (b, basin) in arr.basins.iter().enumerate() {
                for (t, day) in days.iter().enumerate() {
                    let mut record = vec![basin.to_string(), day.clone()];
                    record.extend((0..arr.variables.len()).map(|v| number(arr.get(b, t, v))));
                    wtr.write_record(&record)?;
                }
            }
            wtr.flush()?;
            Ok(())
        }
        Format::Json => {
            let mut rows = Vec::with_capacity(arr.basins.len() * days.len());
            for (b, basin) in arr.basins.iter().enumerate() {
                for (t, day) in days.iter().enumerate() {
                    let mut row = Map::new();
                    row.insert("basin".into(), json!(basin.as_str()));
                    row.insert("date".into(), json!(day));
                    for (v, var) in arr.variables.iter().enumerate() {
                        row.insert(var.name.clone(), json!(arr.get(b, t, v)));
                    }
                    rows.push(Value::Object(row));
                }
            }
            finish_json(rows, out)
        }
    }
}

pub fn write_basins<'a, W, I>(basins: I, format: Format, mut out: W) -> anyhow::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a BasinId>,
{
    match format {
        Format::Csv => {
            writeln!(out, "basin")?;
            for b in basins {
                writeln!(out, "{}", b)?;
            }
            out.flush()?;
            Ok(())
        }
        Format::Json => finish_json(basins.into_iter().map(|b| json!(b.as_str())).collect(), out),
    }
}

pub fn write_variables<W: Write>(vars: &[Variable], format: Format, out: W) -> anyhow::Result<()> {
    match format {
        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(out);
            wtr.write_record(["name", "unit", "kind"])?;
            for v in vars {
                wtr.write_record([v.name.as_str(), v.unit.as_str(), v.kind.as_str()])?;
            }
            wtr.flush()?;
            Ok(())
        }
        Format::Json => finish_json(vars.iter().map(|v| json!(v)).collect(), out),
    }
}

/// One row per gauge; nested gauges are joined with `;` in CSV.
pub fn write_nestedness<W: Write>(records: &[Nestedness], format: Format, out: W) -> anyhow::Result<()> {
    match format {
        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(out);
            wtr.write_record([
                "basin",
                "is_nested",
                "stations_downstream",
                "next_downstream",
                "distance_downstream_km",
                "nested_within",
            ])?;
            for n in records {
                let within: Vec<&str> = n.nested_within.iter().map(BasinId::as_str).collect();
                wtr.write_record([
                    n.basin.to_string(),
                    n.is_nested.to_string(),
                    n.stations_downstream.map(|c| c.to_string()).unwrap_or_default(),
                    n.next_downstream.as_ref().map(BasinId::to_string).unwrap_or_default(),
                    number(n.distance_downstream_km),
                    within.join(";"),
                ])?;
            }
            wtr.flush()?;
            Ok(())
        }
        Format::Json => finish_json(records.iter().map(|n| json!(n)).collect(), out),
    }
}

pub fn write_status<W: Write>(status: &[ArtifactStatus], format: Format, out: W) -> anyhow::Result<()> {
    match format {
        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(out);
            wtr.write_record([
                "kind", "basins", "variables", "start", "end", "built_at", "current", "bytes",
            ])?;
            for s in status {
                let (start, end) = s
                    .time_range
                    .map(|r| (r.start.to_string(), r.end.to_string()))
                    .unwrap_or_default();
                wtr.write_record([
                    s.kind.clone(),
                    s.basins.to_string(),
                    s.variables.join(";"),
                    start,
                    end,
                    s.built_at.clone(),
                    s.current.to_string(),
                    s.bytes.to_string(),
                ])?;
            }
            wtr.flush()?;
            Ok(())
        }
        Format::Json => {
            let rows = status
                .iter()
                .map(|s| {
                    json!({
                        "kind": s.kind,
                        "basins": s.basins,
                        "variables": s.variables,
                        "time_range": s.time_range,
                        "built_at": s.built_at,
                        "current": s.current,
                        "bytes": s.bytes,
                    })
                })
                .collect();
            finish_json(rows, out)
        }
    }
}
