use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use salesrecon_core::{CanonicalField, Channel, Locale, YearMonth};
use serde::Deserialize;

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    /// Worker pool size. `None` uses one worker per core.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_quarantine_markers")]
    pub quarantine_markers: Vec<String>,
    #[serde(default)]
    pub unresolved_period: UnresolvedPeriod,
    #[serde(default)]
    pub default_locale: Locale,
    #[serde(default = "default_delimiter")]
    pub csv_delimiter: char,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,
    #[serde(default)]
    pub catalog: Option<CatalogConfig>,

    /// Directory relative source patterns resolve against. Set by
    /// [`PipelineConfig::from_file`]; not part of the TOML.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_max_file_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_quarantine_markers() -> Vec<String> {
    vec!["needs review".into(), "revisar".into()]
}

fn default_delimiter() -> char {
    ';'
}

/// What happens to a record whose calendar month cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPeriod {
    #[default]
    Reject,
    Impute,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// File path or glob pattern.
    pub path: String,
    /// Overrides identification from the file name.
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub locale: Option<Locale>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub path: String,
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfig {
    /// Only workbook sheets whose name contains this are read.
    #[serde(default)]
    pub sheet_contains: Option<String>,
    /// Take year/month from the source file name when a row has no date.
    #[serde(default)]
    pub period_from_file_name: bool,
    /// Extra aliases per canonical field, tried before the built-in ones.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Replaces the default required fields (`sku`, `gross_value`).
    #[serde(default)]
    pub required: Option<Vec<String>>,
    #[serde(default)]
    pub imputation: Option<ImputationConfig>,
}

/// Deterministic fill-in for records without a resolvable month.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ImputationConfig {
    Fixed { year: i32, month: u32 },
    RoundRobin { buckets: Vec<BucketConfig> },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketConfig {
    pub year: i32,
    pub months: Vec<u32>,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| PipelineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; relative source patterns resolve against its directory.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let input = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&input)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::ConfigValidation(msg));

        if self.workers == Some(0) {
            return invalid("workers must be at least 1".into());
        }
        if self.max_file_bytes == 0 {
            return invalid("max_file_bytes must be positive".into());
        }
        if !self.csv_delimiter.is_ascii() || self.csv_delimiter.is_ascii_alphanumeric() {
            return invalid(format!("csv_delimiter '{}' is not a usable delimiter", self.csv_delimiter));
        }
        if self.quarantine_markers.iter().any(|m| m.trim().is_empty()) {
            return invalid("quarantine_markers must not contain empty strings".into());
        }

        for (i, source) in self.sources.iter().enumerate() {
            if source.path.trim().is_empty() {
                return invalid(format!("sources[{i}]: empty path"));
            }
            if let Some(name) = &source.channel {
                parse_channel(name).map_err(|e| PipelineError::ConfigValidation(format!("sources[{i}]: {e}")))?;
            }
        }

        for (name, channel) in &self.channels {
            parse_channel(name)
                .map_err(|e| PipelineError::ConfigValidation(format!("[channels.{name}]: {e}")))?;
            for field in channel.aliases.keys() {
                field
                    .parse::<CanonicalField>()
                    .map_err(|e| PipelineError::ConfigValidation(format!("[channels.{name}.aliases]: {e}")))?;
            }
            for field in channel.required.iter().flatten() {
                field
                    .parse::<CanonicalField>()
                    .map_err(|e| PipelineError::ConfigValidation(format!("[channels.{name}] required: {e}")))?;
            }
            if let Some(imputation) = &channel.imputation {
                validate_imputation(imputation)
                    .map_err(|e| PipelineError::ConfigValidation(format!("[channels.{name}.imputation]: {e}")))?;
            }
        }

        if self.unresolved_period == UnresolvedPeriod::Impute
            && self.channels.values().all(|c| c.imputation.is_none())
        {
            return invalid("unresolved_period = \"impute\" but no channel declares an imputation".into());
        }

        Ok(())
    }

    /// Config block for `channel`, if any.
    pub fn channel(&self, channel: Channel) -> Option<&ChannelConfig> {
        self.channels
            .iter()
            .find(|(name, _)| parse_channel(name).ok() == Some(channel))
            .map(|(_, c)| c)
    }

    pub fn delimiter(&self) -> u8 {
        // validate() guarantees ASCII
        self.csv_delimiter as u8
    }
}

/// Parse a channel name, refusing the `unknown` sentinel.
pub fn parse_channel(name: &str) -> Result<Channel, String> {
    match name.parse::<Channel>()? {
        Channel::Unknown => Err("\"unknown\" is not a configurable channel".into()),
        ch => Ok(ch),
    }
}

fn validate_imputation(imputation: &ImputationConfig) -> Result<(), String> {
    match imputation {
        ImputationConfig::Fixed { year, month } => {
            YearMonth::new(*year, *month).ok_or_else(|| format!("{year}-{month} is not a valid month"))?;
        }
        ImputationConfig::RoundRobin { buckets } => {
            if buckets.is_empty() {
                return Err("round_robin needs at least one bucket".into());
            }
            for (i, bucket) in buckets.iter().enumerate() {
                if bucket.weight == 0 {
                    return Err(format!("buckets[{i}]: weight must be positive"));
                }
                if bucket.months.is_empty() {
                    return Err(format!("buckets[{i}]: months must not be empty"));
                }
                for month in &bucket.months {
                    YearMonth::new(bucket.year, *month).ok_or_else(|| {
                        format!("buckets[{i}]: {}-{month} is not a valid month", bucket.year)
                    })?;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Consolidado 2024"
workers = 4
unresolved_period = "impute"
default_locale = "pt_br"
csv_delimiter = ";"

[[sources]]
path = "dados/**/*.xlsx"

[[sources]]
path = "dados/amz.csv"
channel = "amazon"
locale = "en_us"

[channels.mercadolivre]
sheet_contains = "negócio"

[channels.mercadolivre.aliases]
gross_value = ["receita por produtos"]

[channels.amazon]
period_from_file_name = true

[channels.amazon.imputation]
strategy = "round_robin"
buckets = [
    { year = 2023, months = [9, 10, 11, 12], weight = 4 },
    { year = 2024, months = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12], weight = 12 },
    { year = 2025, months = [1, 2, 3, 4, 5, 6, 7, 8, 9], weight = 9 },
]

[catalog]
path = "dados/produtos.csv"
"#;

    #[test]
    fn parse_full() {
        let config = PipelineConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Consolidado 2024");
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.unresolved_period, UnresolvedPeriod::Impute);
        assert_eq!(config.delimiter(), b';');
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].locale, Some(Locale::EnUs));
        assert_eq!(config.catalog.as_ref().unwrap().path, "dados/produtos.csv");

        let ml = config.channel(Channel::MercadoLivre).unwrap();
        assert_eq!(ml.sheet_contains.as_deref(), Some("negócio"));
        assert_eq!(ml.aliases["gross_value"], vec!["receita por produtos"]);

        let amz = config.channel(Channel::Amazon).unwrap();
        assert!(amz.period_from_file_name);
        match amz.imputation.as_ref().unwrap() {
            ImputationConfig::RoundRobin { buckets } => {
                assert_eq!(buckets.len(), 3);
                assert_eq!(buckets[0].weight, 4);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
        assert!(config.channel(Channel::Shopee).is_none());
    }

    #[test]
    fn defaults() {
        let config = PipelineConfig::from_toml("name = \"x\"").unwrap();
        assert_eq!(config.workers, None);
        assert_eq!(config.max_file_bytes, 256 * 1024 * 1024);
        assert_eq!(config.quarantine_markers, vec!["needs review", "revisar"]);
        assert_eq!(config.unresolved_period, UnresolvedPeriod::Reject);
        assert_eq!(config.default_locale, Locale::PtBr);
        assert_eq!(config.delimiter(), b';');
        assert!(config.sources.is_empty());
    }

    #[test]
    fn missing_name_is_parse_error() {
        let err = PipelineConfig::from_toml("workers = 2").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigParse(_)));
    }

    fn validation_error(input: &str) -> String {
        match PipelineConfig::from_toml(input) {
            Err(PipelineError::ConfigValidation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_channel() {
        let msg = validation_error("name = \"x\"\n[channels.ebay]\n");
        assert!(msg.contains("ebay"), "{msg}");
        let msg = validation_error("name = \"x\"\n[[sources]]\npath = \"a.csv\"\nchannel = \"unknown\"\n");
        assert!(msg.contains("sources[0]"), "{msg}");
    }

    #[test]
    fn rejects_unknown_alias_field() {
        let msg = validation_error("name = \"x\"\n[channels.shopee.aliases]\nprice = [\"preco\"]\n");
        assert!(msg.contains("price"), "{msg}");
    }

    #[test]
    fn rejects_bad_buckets() {
        let zero_weight = r#"
name = "x"
[channels.amazon.imputation]
strategy = "round_robin"
buckets = [{ year = 2024, months = [1], weight = 0 }]
"#;
        assert!(validation_error(zero_weight).contains("weight"));

        let empty_months = r#"
name = "x"
[channels.amazon.imputation]
strategy = "round_robin"
buckets = [{ year = 2024, months = [] }]
"#;
        assert!(validation_error(empty_months).contains("months"));

        let bad_month = r#"
name = "x"
[channels.amazon.imputation]
strategy = "fixed"
year = 2024
month = 13
"#;
        assert!(validation_error(bad_month).contains("2024-13"));
    }

    #[test]
    fn impute_requires_a_strategy() {
        let msg = validation_error("name = \"x\"\nunresolved_period = \"impute\"\n");
        assert!(msg.contains("imputation"), "{msg}");
    }

    #[test]
    fn rejects_alphanumeric_delimiter() {
        assert!(validation_error("name = \"x\"\ncsv_delimiter = \"a\"\n").contains("csv_delimiter"));
    }

    #[test]
    fn from_file_sets_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "name = \"x\"").unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.base_dir, dir.path());
    }
}
