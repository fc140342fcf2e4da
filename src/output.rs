//! Terminal output for query results and dataset statistics

use crate::engine::{Diagnostics, QueryResult};
use crate::index::Indexes;
use crate::record::{CategoricalField, Record};
use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

const NAME_WIDTH: usize = 48;

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Human-readable size in binary units
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// Print the first `limit` results as a table followed by a summary line
pub fn print_results(result: &QueryResult, limit: usize, color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    write_results(&mut out, result, limit)
}

pub fn write_results<W: WriteColor>(
    out: &mut W,
    result: &QueryResult,
    limit: usize,
) -> io::Result<()> {
    if result.is_empty() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(out, "No models match this query")?;
        out.reset()?;
    } else {
        out.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(
            out,
            "{:<width$} {:<10} {:>10} {:>10} {:>8} {:>5} {:>5} {:>4}",
            "MODEL",
            "FORMAT",
            "SIZE",
            "DOWNLOADS",
            "LIKES",
            "RAM",
            "CPU",
            "GPU",
            width = NAME_WIDTH
        )?;
        out.reset()?;

        for record in result.iter().take(limit) {
            write_record(out, record)?;
        }
    }

    for warning in &result.warnings {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(out, "warning: {warning}")?;
        out.reset()?;
    }

    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    write!(
        out,
        "{} of {} models ({} filtered out)",
        result.counts.filtered, result.counts.total, result.counts.removed
    )?;
    out.reset()?;
    writeln!(
        out,
        " in {:.2}ms{}",
        result.elapsed.as_secs_f64() * 1000.0,
        if result.from_cache { " (cached)" } else { "" }
    )?;
    if result.len() > limit {
        writeln!(out, "showing first {limit}")?;
    }
    Ok(())
}

fn write_record<W: WriteColor>(out: &mut W, record: &Record) -> io::Result<()> {
    let dash = || "-".to_string();
    let name: String = if record.model_name.chars().count() > NAME_WIDTH {
        let mut cut: String = record.model_name.chars().take(NAME_WIDTH - 1).collect();
        cut.push('…');
        cut
    } else {
        record.model_name.clone()
    };

    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(out, "{name:<width$}", width = NAME_WIDTH)?;
    out.reset()?;

    out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
    write!(out, " {:<10}", record.quant_format.as_deref().unwrap_or("-"))?;
    out.reset()?;

    let size = record
        .file_size_formatted
        .clone()
        .or_else(|| record.file_size.map(format_file_size))
        .unwrap_or_else(dash);
    let downloads = record.download_count.map_or_else(dash, |n| n.to_string());
    let likes = record.like_count.map_or_else(dash, |n| n.to_string());
    let ram = record.min_ram_gb.map_or_else(dash, |n| format!("{n}G"));
    let cpu = record.min_cpu_cores.map_or_else(dash, |n| n.to_string());
    let gpu = match record.gpu_required {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    };
    writeln!(
        out,
        " {size:>10} {downloads:>10} {likes:>8} {ram:>5} {cpu:>5} {gpu:>4}"
    )
}

/// Print per-field value counts and engine diagnostics
pub fn print_stats(
    loaded: usize,
    skipped: usize,
    indexes: &Indexes,
    diagnostics: &Diagnostics,
    color: bool,
) -> io::Result<()> {
    let mut out = stdout(color);
    write_stats(&mut out, loaded, skipped, indexes, diagnostics)
}

pub fn write_stats<W: WriteColor>(
    out: &mut W,
    loaded: usize,
    skipped: usize,
    indexes: &Indexes,
    diagnostics: &Diagnostics,
) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(out, "Dataset")?;
    out.reset()?;
    writeln!(out, "  records:      {loaded}")?;
    writeln!(out, "  skipped:      {skipped}")?;
    writeln!(out, "  index tokens: {}", diagnostics.index_tokens)?;

    for field in CategoricalField::ALL {
        let mut values: Vec<(&str, u64)> = indexes
            .categorical
            .values(field)
            .into_iter()
            .map(|v| {
                let count = indexes.categorical.lookup(field, v).map_or(0, |b| b.len());
                (v, count)
            })
            .collect();
        values.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        writeln!(out)?;
        out.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(out, "{} ({} values)", field.name(), values.len())?;
        out.reset()?;
        for (value, count) in values.iter().take(10) {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(out, "  {value:<24}")?;
            out.reset()?;
            writeln!(out, " {count}")?;
        }
    }
    Ok(())
}
