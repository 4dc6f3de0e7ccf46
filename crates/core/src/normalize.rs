//! Locale-ambiguous text → typed values.
//!
//! Every function here is total: it returns a value or [`Unparsable`],
//! never panics. Callers recover from `Unparsable` by substituting zero.

use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::YearMonth;
use crate::text;

/// A field's text could not be turned into a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unparsable;

impl fmt::Display for Unparsable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unparsable value")
    }
}

impl std::error::Error for Unparsable {}

/// Month names in free-text dates and day/month order in numeric ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    PtBr,
    EnUs,
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Markers spreadsheets and dataframe exports use for "no value".
fn is_null_token(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "" | "-" | "nan" | "none" | "null" | "n/a"
    )
}

/// Decimal number as digit strings, after separator disambiguation.
#[derive(Debug, PartialEq)]
struct DecimalText {
    negative: bool,
    int_digits: String,
    frac_digits: String,
}

#[derive(Debug, PartialEq)]
enum Cleaned {
    Empty,
    Number(DecimalText),
    Garbage,
}

/// Strip symbols and resolve `.`/`,` into a single decimal point.
///
/// - only `,` present: it is the decimal separator
/// - both present: the last one is decimal, the other is grouping
/// - several `.` left: all but the last are grouping
fn clean_numeric(input: &str) -> Cleaned {
    let trimmed = input.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');
    if is_null_token(trimmed) {
        return Cleaned::Empty;
    }

    let kept: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return Cleaned::Garbage;
    }

    let negative = kept.starts_with('-');
    let mut s: String = kept.chars().filter(|&c| c != '-').collect();

    match (s.rfind('.'), s.rfind(',')) {
        (None, Some(_)) => s = s.replace(',', "."),
        (Some(dot), Some(comma)) if comma > dot => s = s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s = s.replace(',', ""),
        _ => {}
    }

    if s.matches('.').count() > 1 {
        if let Some((head, tail)) = s.rsplit_once('.') {
            s = format!("{}.{}", head.replace('.', ""), tail);
        }
    }

    let (int_digits, frac_digits) = match s.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (s, String::new()),
    };

    Cleaned::Number(DecimalText { negative, int_digits, frac_digits })
}

impl DecimalText {
    /// Integer value scaled by 10^scale, rounded half away from zero.
    fn scaled(&self, scale: usize) -> Option<i64> {
        let mut value: i64 = 0;
        for c in self.int_digits.chars() {
            value = value.checked_mul(10)?.checked_add(c.to_digit(10)? as i64)?;
        }

        let mut frac = self.frac_digits.chars();
        for _ in 0..scale {
            let digit = frac.next().and_then(|c| c.to_digit(10)).unwrap_or(0);
            value = value.checked_mul(10)?.checked_add(digit as i64)?;
        }
        if frac.next().and_then(|c| c.to_digit(10)).is_some_and(|d| d >= 5) {
            value = value.checked_add(1)?;
        }

        Some(if self.negative { -value } else { value })
    }
}

/// Parse a currency amount into integer cents.
///
/// `"1.234,56"` → 123456, `"R$ 10,00"` → 1000, `""`/`"-"`/`"nan"` → 0.
pub fn normalize_amount(text: &str) -> Result<i64, Unparsable> {
    match clean_numeric(text) {
        Cleaned::Empty => Ok(0),
        Cleaned::Number(d) => d.scaled(2).ok_or(Unparsable),
        Cleaned::Garbage => Err(Unparsable),
    }
}

/// Parse a unit count, rounding to the nearest integer.
///
/// Trailing unit text is ignored (`"3 un"` → 3); empty → 0.
pub fn normalize_count(text: &str) -> Result<i64, Unparsable> {
    match clean_numeric(text) {
        Cleaned::Empty => Ok(0),
        Cleaned::Number(d) => d.scaled(0).ok_or(Unparsable),
        Cleaned::Garbage => Err(Unparsable),
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Trim, upper-case, drop quote characters and a trailing `.0` left by
/// integer SKUs that went through a float column.
pub fn normalize_sku(text: &str) -> String {
    let unquoted: String = text.chars().filter(|c| !matches!(c, '\'' | '"')).collect();
    let trimmed = unquoted.trim();
    if is_null_token(trimmed) {
        return String::new();
    }
    let upper = trimmed.to_uppercase();
    match upper.strip_suffix(".0") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => upper,
    }
}

static TRAILING_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-–]\s*\d{1,2}/\d{1,2}/\d{2,4}\s*$").unwrap());

/// Trim, collapse whitespace, drop a trailing `" - DD/MM/YYYY"` suffix.
pub fn normalize_product_name(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if is_null_token(&collapsed) {
        return String::new();
    }
    TRAILING_DATE.replace(&collapsed, "").trim().to_string()
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ].*)?$").unwrap());
static YMD_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})(?:\s.*)?$").unwrap());
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/.-](\d{1,2})[/.-](\d{4}|\d{2})(?:\s.*)?$").unwrap());
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").unwrap());
static MONTH_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{4})$").unwrap());

const PT_MONTHS: [&str; 12] = [
    "janeiro", "fevereiro", "marco", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];
const EN_MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Resolve a date-like text to its calendar month.
///
/// Tries strict patterns first (`DD/MM/YYYY`, or `MM/DD/YYYY` under
/// `EnUs`; ISO with optional time and offset), then a free-text parse using month names of `locale` (falling
/// back to the other supported language). Time of day is discarded.
pub fn normalize_date(text: &str, locale: Locale) -> Option<YearMonth> {
    let trimmed = text.trim();
    if is_null_token(trimmed) {
        return None;
    }
    strict_date(trimmed, locale).or_else(|| free_text_date(trimmed, locale))
}

fn strict_date(s: &str, locale: Locale) -> Option<YearMonth> {
    let num = |m: &regex::Captures<'_>, i: usize| m.get(i)?.as_str().parse::<u32>().ok();

    if let Some(c) = ISO_DATE.captures(s).or_else(|| YMD_SLASH.captures(s)) {
        return calendar(num(&c, 1)? as i32, num(&c, 2)?, num(&c, 3)?);
    }
    if let Some(c) = NUMERIC_DATE.captures(s) {
        let raw_year = c.get(3)?.as_str();
        let mut year = raw_year.parse::<i32>().ok()?;
        if raw_year.len() == 2 {
            year += 2000;
        }
        let (first, second) = (num(&c, 1)?, num(&c, 2)?);
        // locale order first, the other order when that date cannot exist
        return match locale {
            Locale::PtBr => calendar(year, second, first).or_else(|| calendar(year, first, second)),
            Locale::EnUs => calendar(year, first, second).or_else(|| calendar(year, second, first)),
        };
    }
    if let Some(c) = YEAR_MONTH.captures(s) {
        return YearMonth::new(num(&c, 1)? as i32, num(&c, 2)?);
    }
    if let Some(c) = MONTH_YEAR.captures(s) {
        return YearMonth::new(num(&c, 2)? as i32, num(&c, 1)?);
    }
    None
}

/// Validates the full date so that `31/02/2024` is rejected.
fn calendar(year: i32, month: u32, day: u32) -> Option<YearMonth> {
    NaiveDate::from_ymd_opt(year, month, day)?;
    YearMonth::new(year, month)
}

fn free_text_date(s: &str, locale: Locale) -> Option<YearMonth> {
    let tokens = text::tokens(s);

    let year = tokens.iter().find_map(|t| {
        if t.len() == 4 && t.chars().all(|c| c.is_ascii_digit()) {
            t.parse::<i32>()
                .ok()
                .filter(|y| (YearMonth::MIN_YEAR..=YearMonth::MAX_YEAR).contains(y))
        } else {
            None
        }
    })?;

    let month = tokens
        .iter()
        .filter(|t| t.chars().all(|c| c.is_ascii_alphabetic()))
        .find_map(|t| month_from_name(t, locale))?;

    YearMonth::new(year, month)
}

/// Month number for a full or abbreviated (≥ 3 letters) month name.
pub fn month_from_name(token: &str, locale: Locale) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    let tables: [&[&str; 12]; 2] = match locale {
        Locale::PtBr => [&PT_MONTHS, &EN_MONTHS],
        Locale::EnUs => [&EN_MONTHS, &PT_MONTHS],
    };
    tables.iter().find_map(|table| {
        table
            .iter()
            .position(|name| name.starts_with(token))
            .map(|i| i as u32 + 1)
    })
}
