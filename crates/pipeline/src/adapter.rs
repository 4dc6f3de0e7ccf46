//! Channel adapters: one capability interface, one registered profile per
//! channel. Adding a channel means registering an alias table, not writing
//! a new code path.

use std::collections::BTreeMap;
use std::path::Path;

use salesrecon_core::{AliasTable, CanonicalField, Channel};
use salesrecon_io::{read_source, ReadOptions, SourceError, SourceRead};

use crate::config::{parse_channel, PipelineConfig};
use crate::error::PipelineError;

/// Fields a table must map before any of its rows are considered.
pub const DEFAULT_REQUIRED: [CanonicalField; 2] = [CanonicalField::Sku, CanonicalField::GrossValue];

pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    /// Whether a file or sheet name belongs to this channel.
    fn identify(&self, name: &str) -> bool {
        Channel::identify(name) == self.channel()
    }

    fn field_aliases(&self) -> &AliasTable;

    fn required_fields(&self) -> &[CanonicalField] {
        &DEFAULT_REQUIRED
    }

    fn sheet_filter(&self) -> Option<&str> {
        None
    }

    /// Whether the source file name may supply the period.
    fn period_from_file_name(&self) -> bool {
        false
    }

    /// Read one source into raw tables, applying this channel's sheet filter.
    fn read(&self, path: &Path, options: &ReadOptions) -> Result<SourceRead, SourceError> {
        let options = ReadOptions {
            sheet_filter: self.sheet_filter().map(str::to_string),
            ..options.clone()
        };
        read_source(path, &options)
    }
}

/// Table-driven adapter used for every built-in channel.
#[derive(Debug, Clone)]
pub struct ChannelProfile {
    pub channel: Channel,
    pub aliases: AliasTable,
    pub required: Vec<CanonicalField>,
    pub sheet_filter: Option<String>,
    pub period_from_file_name: bool,
}

impl ChannelProfile {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            aliases: AliasTable::builtin(),
            required: DEFAULT_REQUIRED.to_vec(),
            sheet_filter: None,
            period_from_file_name: false,
        }
    }

    fn alias(mut self, field: CanonicalField, aliases: &[&str]) -> Self {
        self.aliases.prepend(field, aliases.iter().copied());
        self
    }

    /// Built-in profile for `channel`.
    pub fn builtin(channel: Channel) -> Self {
        use CanonicalField::*;

        let profile = Self::new(channel);
        match channel {
            Channel::Amazon => profile
                .alias(UnitsSold, &["units ordered"])
                .alias(GrossValue, &["ordered product sales"]),
            Channel::MercadoLivre => {
                let mut p = profile
                    .alias(Date, &["data da venda"])
                    .alias(ProductName, &["titulo do anuncio"])
                    .alias(UnitsSold, &["unidades"])
                    .alias(GrossValue, &["total brl", "receita por produtos"]);
                p.sheet_filter = Some("negocio".into());
                p
            }
            Channel::Shopee => profile
                .alias(Sku, &["sku principal", "numero de referencia sku"])
                .alias(Date, &["data de criacao do pedido"])
                .alias(UnitsSold, &["quantidade"])
                .alias(GrossValue, &["subtotal do produto"]),
            Channel::BelezaNaWeb => profile
                .alias(ProductName, &["descricao"])
                .alias(GrossValue, &["valor"]),
            Channel::Tiktok | Channel::Tiny => profile
                .alias(Sku, &["cprod"])
                .alias(ProductName, &["xprod"])
                .alias(UnitsSold, &["qcom"])
                .alias(GrossValue, &["vprod"])
                .alias(Date, &["dhemi"]),
            Channel::Unknown => profile,
        }
    }
}

impl ChannelAdapter for ChannelProfile {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn field_aliases(&self) -> &AliasTable {
        &self.aliases
    }

    fn required_fields(&self) -> &[CanonicalField] {
        &self.required
    }

    fn sheet_filter(&self) -> Option<&str> {
        self.sheet_filter.as_deref()
    }

    fn period_from_file_name(&self) -> bool {
        self.period_from_file_name
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// One adapter per known channel.
pub struct ChannelRegistry {
    adapters: BTreeMap<Channel, Box<dyn ChannelAdapter>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ChannelRegistry {
    pub fn empty() -> Self {
        Self { adapters: BTreeMap::new() }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for channel in Channel::KNOWN {
            registry.register(Box::new(ChannelProfile::builtin(channel)));
        }
        registry
    }

    /// Built-in profiles with each `[channels.<name>]` block applied on top.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let mut registry = Self::empty();
        for channel in Channel::KNOWN {
            let mut profile = ChannelProfile::builtin(channel);
            if let Some(overrides) = config.channel(channel) {
                if let Some(filter) = &overrides.sheet_contains {
                    profile.sheet_filter = Some(filter.clone());
                }
                profile.period_from_file_name |= overrides.period_from_file_name;
                for (field, aliases) in &overrides.aliases {
                    let field = field.parse::<CanonicalField>().map_err(PipelineError::ConfigValidation)?;
                    profile.aliases.prepend(field, aliases);
                }
                if let Some(required) = &overrides.required {
                    profile.required = required
                        .iter()
                        .map(|f| f.parse::<CanonicalField>())
                        .collect::<Result<_, _>>()
                        .map_err(PipelineError::ConfigValidation)?;
                }
            }
            registry.register(Box::new(profile));
        }
        Ok(registry)
    }

    /// Replace the adapter for its channel.
    pub fn register(&mut self, adapter: Box<dyn ChannelAdapter>) {
        self.adapters.insert(adapter.channel(), adapter);
    }

    pub fn get(&self, channel: Channel) -> Option<&dyn ChannelAdapter> {
        self.adapters.get(&channel).map(|a| a.as_ref())
    }

    /// First adapter (in channel order) claiming `name`.
    pub fn identify(&self, name: &str) -> Channel {
        self.adapters
            .values()
            .find(|a| a.identify(name))
            .map(|a| a.channel())
            .unwrap_or(Channel::Unknown)
    }

    /// Channel for a source: explicit override, else the file name.
    pub fn resolve(&self, path: &Path, explicit: Option<&str>) -> Result<Channel, PipelineError> {
        if let Some(name) = explicit {
            return parse_channel(name).map_err(PipelineError::ConfigValidation);
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        Ok(self.identify(name))
    }
}
