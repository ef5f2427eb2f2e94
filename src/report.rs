// Report module - console rendering of the genre probability table
//
// Output is a header line naming the song followed by a boxed two-column
// table. Cells are centered; when the padding is uneven the extra space goes
// right for odd-length text and left for even-length text. Percentages print
// like Python floats: integral values keep one decimal ("50.0%").

use std::path::Path;

use crate::analysis::classifier::ProbabilityTable;

const HEADERS: [&str; 2] = ["Genre", "Probability"];

/// Shown while features are extracted, terminated by `\r` rather than a newline
pub const PROGRESS_LINE: &str = "Feature counting...";

/// Song name shown in the header: the file name without its last extension
pub fn song_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Render a float the way Python's `str(float)` does for this value range
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{}inf", sign)
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Percentage cell text, e.g. `33.33%`
pub fn format_percentage(value: f64) -> String {
    format!("{}%", format_float(value))
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    let excess = width.saturating_sub(len);
    let (left, right) = if excess % 2 == 0 {
        (excess / 2, excess / 2)
    } else if len % 2 == 1 {
        (excess / 2, excess / 2 + 1)
    } else {
        (excess / 2 + 1, excess / 2)
    };
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

/// Draw the probability table
pub fn render_table(table: &ProbabilityTable) -> String {
    let rows: Vec<[String; 2]> = table
        .rows()
        .iter()
        .map(|row| [row.label.clone(), format_percentage(row.percentage)])
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let line = |cells: [&str; 2]| {
        let inner: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, &w)| format!(" {} ", center(cell, w)))
            .collect();
        format!("|{}|", inner.join("|"))
    };

    let mut out = vec![border.clone(), line(HEADERS), border.clone()];
    out.extend(rows.iter().map(|[label, pct]| line([label.as_str(), pct.as_str()])));
    out.push(border);
    out.join("\n")
}

/// Header line plus table
pub fn render_report(song: &str, table: &ProbabilityTable) -> String {
    format!(
        "Probability of classes for song {}\n{}",
        song,
        render_table(table)
    )
}
