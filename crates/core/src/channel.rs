use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::text;

/// Retail channel a sales record was exported from.
///
/// `Unknown` is a sentinel: records carrying it never reach aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "amazon")]
    Amazon,
    #[serde(rename = "mercadolivre")]
    MercadoLivre,
    #[serde(rename = "shopee")]
    Shopee,
    #[serde(rename = "tiktok")]
    Tiktok,
    #[serde(rename = "beleza_na_web")]
    BelezaNaWeb,
    #[serde(rename = "tiny")]
    Tiny,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Channel {
    /// Every real channel, in canonical order. Excludes `Unknown`.
    pub const KNOWN: [Channel; 6] = [
        Channel::Amazon,
        Channel::MercadoLivre,
        Channel::Shopee,
        Channel::Tiktok,
        Channel::BelezaNaWeb,
        Channel::Tiny,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::MercadoLivre => "mercadolivre",
            Self::Shopee => "shopee",
            Self::Tiktok => "tiktok",
            Self::BelezaNaWeb => "beleza_na_web",
            Self::Tiny => "tiny",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }

    /// Identify the channel from a file or sheet name.
    ///
    /// Matching is case-insensitive and accent-folded. `ml` must appear as a
    /// whole token so that names like `html` do not match.
    pub fn identify(name: &str) -> Channel {
        let folded = text::normalize_header(name);
        let tokens = text::tokens(name);
        let has_token = |t: &str| tokens.iter().any(|x| x == t);

        if folded.contains("meli") || folded.contains("mercado") || has_token("ml") {
            Self::MercadoLivre
        } else if folded.contains("amazon") || folded.contains("amz") {
            Self::Amazon
        } else if folded.contains("tiktok") {
            Self::Tiktok
        } else if folded.contains("blz") || folded.contains("beleza") {
            Self::BelezaNaWeb
        } else if folded.contains("shopee") {
            Self::Shopee
        } else if folded.contains("tiny") {
            Self::Tiny
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match text::normalize_header(s).replace(' ', "_").as_str() {
            "amazon" => Ok(Self::Amazon),
            "mercadolivre" | "mercado_livre" => Ok(Self::MercadoLivre),
            "shopee" => Ok(Self::Shopee),
            "tiktok" => Ok(Self::Tiktok),
            "beleza_na_web" => Ok(Self::BelezaNaWeb),
            "tiny" => Ok(Self::Tiny),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown channel: \"{other}\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_from_file_names() {
        assert_eq!(Channel::identify("Relatorio_MELI_2024.xlsx"), Channel::MercadoLivre);
        assert_eq!(Channel::identify("vendas-ml-jan-2025.xlsx"), Channel::MercadoLivre);
        assert_eq!(Channel::identify("amz.csv"), Channel::Amazon);
        assert_eq!(Channel::identify("TikTok Shop 2025.csv"), Channel::Tiktok);
        assert_eq!(Channel::identify("blz_padronizado.xlsx"), Channel::BelezaNaWeb);
        assert_eq!(Channel::identify("Shopee_Order.all.20240101.xlsx"), Channel::Shopee);
        assert_eq!(Channel::identify("xml_tiny_2024"), Channel::Tiny);
    }

    #[test]
    fn ml_must_be_a_token() {
        assert_eq!(Channel::identify("export.html"), Channel::Unknown);
        assert_eq!(Channel::identify("campanha_guia.pdf"), Channel::Unknown);
    }

    #[test]
    fn parse_and_display_roundtrip_names() {
        for ch in Channel::KNOWN {
            assert_eq!(ch.as_str().parse::<Channel>().unwrap(), ch);
        }
        assert_eq!("Mercado Livre".parse::<Channel>().unwrap(), Channel::MercadoLivre);
        assert!("ebay".parse::<Channel>().is_err());
    }
}
