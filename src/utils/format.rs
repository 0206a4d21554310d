//! Formatting and parsing helpers for the command-line surface.

use chrono::NaiveDate;

/// Format a volume figure for display: whole numbers drop the decimals,
/// everything else keeps one place. Thousands get a separator.
pub fn format_volume(volume: f64) -> String {
    let rendered = if volume.fract() == 0.0 {
        format!("{}", volume as i64)
    } else {
        format!("{:.1}", volume)
    };
    group_thousands(&rendered)
}

fn group_thousands(s: &str) -> String {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %e, %Y").to_string()
}

/// Parse a comma-separated rep list, e.g. "10,8,8".
pub fn parse_reps(input: &str) -> Result<Vec<u32>, String> {
    input
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid rep count '{}'", part.trim()))
        })
        .collect()
}

/// Parse a comma-separated weight list, e.g. "100,100,90.5".
pub fn parse_weights(input: &str) -> Result<Vec<f64>, String> {
    input
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid weight '{}'", part.trim()))
        })
        .collect()
}
