//! Loaders for the two CSV inputs.
//!
//! - stats: `viewport width, screen density, page views`
//! - variations: `viewport width; rendered image width` (what a browser measurement run writes)
//!
//! Fields may be separated by `,`, `;` or tabs. A first line containing letters is a header.
//! Blank lines are ignored.
//!
//! Only plain numeric rows are understood: surrounding double quotes are stripped from a field,
//! but there is no quoting or escaping, so a separator inside quotes still splits the field.
//! Analytics exports with thousands separators (`"1,204"`) must be cleaned up first.

use daltons::UsageRecord;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvError {
    /// 1-based.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for CsvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvError {}

fn rows(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
        .peekable();
    if lines
        .peek()
        .is_some_and(|(_, l)| l.chars().any(|c| c.is_ascii_alphabetic()))
    {
        lines.next();
    }
    lines.map(|(n, l)| {
        (
            n,
            l.split([',', ';', '\t'])
                .map(|f| f.trim().trim_matches('"').trim())
                .collect(),
        )
    })
}

fn field<T: std::str::FromStr>(
    line: usize,
    fields: &[&str],
    idx: usize,
    name: &str,
) -> Result<T, CsvError> {
    let raw = fields.get(idx).copied().unwrap_or("");
    raw.parse::<T>().map_err(|_| CsvError {
        line,
        message: format!("invalid {name}: {raw:?}"),
    })
}

fn expect_columns(line: usize, fields: &[&str], count: usize) -> Result<(), CsvError> {
    if fields.len() < count {
        return Err(CsvError {
            line,
            message: format!("expected {count} columns, found {}", fields.len()),
        });
    }
    Ok(())
}

pub fn parse_stats(text: &str) -> Result<Vec<UsageRecord>, CsvError> {
    rows(text)
        .map(|(line, fields)| {
            expect_columns(line, &fields, 3)?;
            let viewport_width: u32 = field(line, &fields, 0, "viewport width")?;
            let density: f64 = field(line, &fields, 1, "screen density")?;
            let views: u64 = field(line, &fields, 2, "page views")?;
            if !(density.is_finite() && density > 0.0) {
                return Err(CsvError {
                    line,
                    message: format!("screen density must be > 0, got {density}"),
                });
            }
            Ok(UsageRecord::new(viewport_width, density, views))
        })
        .collect()
}

pub fn parse_variations(text: &str) -> Result<BTreeMap<u32, f64>, CsvError> {
    rows(text)
        .map(|(line, fields)| {
            expect_columns(line, &fields, 2)?;
            let viewport: u32 = field(line, &fields, 0, "viewport width")?;
            let width: f64 = field(line, &fields, 1, "image width")?;
            if !(width.is_finite() && width >= 0.0) {
                return Err(CsvError {
                    line,
                    message: format!("image width must be >= 0, got {width}"),
                });
            }
            Ok((viewport, width))
        })
        .collect()
}
