use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use salesrecon_core::{Channel, Locale};

use crate::adapter::ChannelRegistry;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::evidence::{DiagnosticKind, SourceDiagnostic};

/// One file to process, with its channel already decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub path: PathBuf,
    pub channel: Channel,
    pub locale: Locale,
}

impl SourceSpec {
    pub fn new(path: impl Into<PathBuf>, channel: Channel) -> Self {
        Self { path: path.into(), channel, locale: Locale::default() }
    }
}

/// Expand every `[[sources]]` pattern. Results are sorted by path; a file
/// matched by several patterns keeps the first pattern's settings.
pub fn discover_sources(
    config: &PipelineConfig,
    registry: &ChannelRegistry,
) -> Result<(Vec<SourceSpec>, Vec<SourceDiagnostic>), PipelineError> {
    let mut found: BTreeMap<PathBuf, SourceSpec> = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for source in &config.sources {
        let pattern = resolve_path(&config.base_dir, &source.path);
        let pattern_str = pattern.to_string_lossy().to_string();
        let entries = glob::glob(&pattern_str).map_err(|e| PipelineError::Pattern {
            pattern: source.path.clone(),
            message: e.to_string(),
        })?;

        let mut matched = 0;
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(pattern = %source.path, error = %e, "unreadable path");
                    diagnostics.push(SourceDiagnostic {
                        source: e.path().display().to_string(),
                        sheet: None,
                        channel: Channel::Unknown,
                        kind: DiagnosticKind::Unreadable,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            matched += 1;
            if found.contains_key(&path) {
                continue;
            }
            let channel = registry.resolve(&path, source.channel.as_deref())?;
            let locale = source.locale.unwrap_or(config.default_locale);
            found.insert(path.clone(), SourceSpec { path, channel, locale });
        }

        if matched == 0 {
            tracing::warn!(pattern = %source.path, "no files matched");
            diagnostics.push(SourceDiagnostic {
                source: source.path.clone(),
                sheet: None,
                channel: match &source.channel {
                    Some(name) => name.parse().unwrap_or(Channel::Unknown),
                    None => Channel::Unknown,
                },
                kind: DiagnosticKind::NoMatch,
                message: format!("no files match '{}'", source.path),
            });
        }
    }

    Ok((found.into_values().collect(), diagnostics))
}

/// Relative paths resolve against `base`.
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn expands_patterns_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dados")).unwrap();
        for name in ["shopee_jan.xlsx", "amz.csv", "notas.csv"] {
            fs::write(dir.path().join("dados").join(name), "x").unwrap();
        }
        let mut config = PipelineConfig::from_toml(
            r#"
name = "x"
[[sources]]
path = "dados/amz.csv"
locale = "en_us"
[[sources]]
path = "dados/*"
[[sources]]
path = "vazio/*.xml"
"#,
        )
        .unwrap();
        config.base_dir = dir.path().to_path_buf();

        let (sources, diagnostics) = discover_sources(&config, &ChannelRegistry::builtin()).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|s| s.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["amz.csv", "notas.csv", "shopee_jan.xlsx"]);
        assert_eq!(sources[0].channel, Channel::Amazon);
        // first pattern's settings win
        assert_eq!(sources[0].locale, Locale::EnUs);
        assert_eq!(sources[1].channel, Channel::Unknown);
        assert_eq!(sources[2].channel, Channel::Shopee);
        assert_eq!(sources[2].locale, Locale::PtBr);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::NoMatch);
    }

    #[test]
    fn invalid_pattern() {
        let config = PipelineConfig::from_toml("name = \"x\"\n[[sources]]\npath = \"a/[.csv\"\n").unwrap();
        let err = discover_sources(&config, &ChannelRegistry::builtin()).unwrap_err();
        assert!(matches!(err, PipelineError::Pattern { .. }));
    }
}
