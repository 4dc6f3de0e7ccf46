//! Period sources beyond the row itself: the file name, and deterministic
//! imputation for records that end up with no month at all.

use once_cell::sync::Lazy;
use regex::Regex;
use salesrecon_core::normalize::month_from_name;
use salesrecon_core::text::tokens;
use salesrecon_core::{Locale, YearMonth};

use crate::config::{BucketConfig, ImputationConfig};

static FILE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"20\d{2}").unwrap());

/// Year and Portuguese month name (or abbreviation) embedded in a file
/// name, e.g. `vendas_ml_mar_2024.xlsx` → 2024-03. Both must be present.
pub fn period_from_file_name(name: &str) -> Option<YearMonth> {
    let year = FILE_YEAR.find(name)?.as_str().parse::<i32>().ok()?;
    let month = tokens(name)
        .iter()
        .filter(|t| t.chars().all(|c| c.is_ascii_alphabetic()))
        .find_map(|t| month_from_name(t, Locale::PtBr))?;
    YearMonth::new(year, month)
}

// ---------------------------------------------------------------------------
// Imputation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub year: i32,
    pub months: Vec<u32>,
    pub weight: u32,
}

/// Deterministic month assignment for records with no resolvable period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imputation {
    /// Every record gets the same month.
    Fixed(YearMonth),
    /// Contiguous blocks proportional to bucket weights; months cycle in
    /// listed order inside each block.
    RoundRobin(Vec<Bucket>),
}

impl Imputation {
    /// Build from a validated config block.
    pub fn from_config(config: &ImputationConfig) -> Option<Self> {
        match config {
            ImputationConfig::Fixed { year, month } => YearMonth::new(*year, *month).map(Self::Fixed),
            ImputationConfig::RoundRobin { buckets } => {
                let buckets: Vec<Bucket> = buckets
                    .iter()
                    .filter(|b| b.weight > 0 && !b.months.is_empty())
                    .map(|BucketConfig { year, months, weight }| Bucket {
                        year: *year,
                        months: months.clone(),
                        weight: *weight,
                    })
                    .collect();
                (!buckets.is_empty()).then_some(Self::RoundRobin(buckets))
            }
        }
    }

    /// Months for `n` unresolved records, in their arrival order.
    pub fn assign(&self, n: usize) -> Vec<YearMonth> {
        match self {
            Self::Fixed(period) => vec![*period; n],
            Self::RoundRobin(buckets) => {
                let sizes = block_sizes(n, buckets);
                buckets
                    .iter()
                    .zip(sizes)
                    .flat_map(|(bucket, size)| {
                        bucket
                            .months
                            .iter()
                            .cycle()
                            .take(size)
                            .filter_map(|m| YearMonth::new(bucket.year, *m))
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
        }
    }
}

/// `floor(n * w / Σw)` per bucket; the last bucket takes the remainder.
fn block_sizes(n: usize, buckets: &[Bucket]) -> Vec<usize> {
    let total: u64 = buckets.iter().map(|b| b.weight as u64).sum();
    if total == 0 || buckets.is_empty() {
        return Vec::new();
    }
    let mut sizes: Vec<usize> = buckets
        .iter()
        .map(|b| (n as u64 * b.weight as u64 / total) as usize)
        .collect();
    let assigned: usize = sizes[..sizes.len() - 1].iter().sum();
    if let Some(last) = sizes.last_mut() {
        *last = n - assigned;
    }
    sizes
}
