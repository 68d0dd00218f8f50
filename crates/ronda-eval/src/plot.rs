//! SVG line charts of cumulative NAV curves.

use ronda_traits::{Date, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One named line of a chart.
pub type NavLine = (String, Vec<(Date, f64)>);

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Write NAV curves as an SVG chart with a shared date axis.
///
/// Lines are drawn against the union of their dates; a line is broken
/// where it has no value.
pub fn write_nav_svg<W: Write>(writer: &mut W, title: &str, lines: &[NavLine]) -> Result<()> {
    let width = 960.0;
    let height = 480.0;
    let padding = 60.0;
    let legend_width = 220.0;
    let chart_width = width - 2.0 * padding - legend_width;
    let chart_height = height - 2.0 * padding;

    let mut dates: Vec<Date> = lines.iter().flat_map(|(_, s)| s.iter().map(|(d, _)| *d)).collect();
    dates.sort_unstable();
    dates.dedup();

    let values = lines.iter().flat_map(|(_, s)| s.iter().map(|(_, v)| *v)).filter(|v| v.is_finite());
    let (min_nav, max_nav) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let (y_min, y_max) = if min_nav.is_finite() && max_nav > min_nav {
        let range = max_nav - min_nav;
        (min_nav - range * 0.05, max_nav + range * 0.05)
    } else if min_nav.is_finite() {
        (min_nav - 0.05, min_nav + 0.05)
    } else {
        (0.95, 1.05)
    };
    let y_range = y_max - y_min;

    let x_of = |date: &Date| -> f64 {
        let i = dates.partition_point(|d| d < date);
        padding + (i as f64 / (dates.len().saturating_sub(1)).max(1) as f64) * chart_width
    };
    let y_of = |v: f64| padding + chart_height - ((v - y_min) / y_range) * chart_height;

    let grid_color = "#e0e0e0";
    let text_color = "#666";

    writeln!(
        writer,
        r##"<svg viewBox="0 0 {width} {height}" xmlns="http://www.w3.org/2000/svg" font-family="sans-serif">"##
    )?;
    writeln!(writer, r##"  <rect width="{width}" height="{height}" fill="white"/>"##)?;
    writeln!(
        writer,
        r##"  <text x="{}" y="{}" font-size="14" fill="#333">{}</text>"##,
        padding,
        padding / 2.0,
        escape(title)
    )?;

    let num_y_ticks = 5;
    for i in 0..=num_y_ticks {
        let y_val = y_min + (i as f64 / num_y_ticks as f64) * y_range;
        let y = y_of(y_val);
        writeln!(
            writer,
            r##"  <line x1="{}" y1="{:.1}" x2="{}" y2="{:.1}" stroke="{}" stroke-dasharray="4,4"/>"##,
            padding,
            y,
            padding + chart_width,
            y,
            grid_color
        )?;
        writeln!(
            writer,
            r##"  <text x="{}" y="{:.1}" font-size="10" fill="{}" text-anchor="end">{:.3}</text>"##,
            padding - 5.0,
            y + 3.0,
            text_color,
            y_val
        )?;
    }

    if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
        writeln!(
            writer,
            r##"  <text x="{}" y="{}" font-size="10" fill="{}" text-anchor="start">{}</text>"##,
            padding,
            height - padding + 15.0,
            text_color,
            first.format("%Y-%m-%d")
        )?;
        writeln!(
            writer,
            r##"  <text x="{}" y="{}" font-size="10" fill="{}" text-anchor="end">{}</text>"##,
            padding + chart_width,
            height - padding + 15.0,
            text_color,
            last.format("%Y-%m-%d")
        )?;
    }

    for (k, (name, series)) in lines.iter().enumerate() {
        let color = PALETTE[k % PALETTE.len()];
        let mut path_d = String::new();
        let mut pen_down = false;
        for (date, v) in series {
            if !v.is_finite() {
                pen_down = false;
                continue;
            }
            let op = if pen_down { 'L' } else { 'M' };
            path_d.push_str(&format!("{op} {:.1} {:.1} ", x_of(date), y_of(*v)));
            pen_down = true;
        }
        writeln!(
            writer,
            r##"  <path d="{}" fill="none" stroke="{}" stroke-width="1.5"/>"##,
            path_d.trim_end(),
            color
        )?;

        let ly = padding + 14.0 * k as f64;
        let lx = width - legend_width - padding / 2.0;
        writeln!(
            writer,
            r##"  <line x1="{}" y1="{:.1}" x2="{}" y2="{:.1}" stroke="{}" stroke-width="2"/>"##,
            lx,
            ly,
            lx + 16.0,
            ly,
            color
        )?;
        writeln!(
            writer,
            r##"  <text x="{}" y="{:.1}" font-size="10" fill="{}">{}</text>"##,
            lx + 20.0,
            ly + 3.0,
            text_color,
            escape(name)
        )?;
    }

    writeln!(writer, "</svg>")?;
    Ok(())
}

/// Writes a chart to `path`, creating parent directories.
pub fn save_nav_svg(path: &Path, title: &str, lines: &[NavLine]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(fs::File::create(path)?);
    write_nav_svg(&mut writer, title, lines)?;
    writer.flush()?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_svg_has_one_path_per_line() {
        let lines = vec![
            ("MTM010-NEU.MA01".to_string(), vec![(d(2), 1.0), (d(3), 1.02), (d(4), 0.99)]),
            ("MTM010-NEU.MA05".to_string(), vec![(d(3), 1.0), (d(4), f64::NAN)]),
        ];
        let mut out = Vec::new();
        write_nav_svg(&mut out, "MTM.Opn001L1RAW", &lines).unwrap();
        let svg = String::from_utf8(out).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("MTM010-NEU.MA05"));
        assert!(svg.contains("2024-01-02"));
    }

    #[test]
    fn test_empty_chart() {
        let mut out = Vec::new();
        write_nav_svg(&mut out, "empty", &[]).unwrap();
        assert!(String::from_utf8(out).unwrap().trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_save_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot-nav").join("g.svg");
        save_nav_svg(&path, "g", &[("a".to_string(), vec![(d(2), 1.0)])]).unwrap();
        assert!(path.exists());
    }
}
