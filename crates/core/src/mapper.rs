//! Declarative header → canonical field mapping.
//!
//! Each canonical field owns a priority-ordered list of alias substrings.
//! Fields are resolved in declaration order; for each field the aliases are
//! tried in order and the first unclaimed header containing the alias wins.
//! A header is claimed by at most one field, and a header spelled exactly
//! like one field's alias is reserved for that field: `"Ordered Product
//! Sales"` stays with the gross value even though it contains `"product"`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::text::normalize_header;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Sku,
    ProductName,
    UnitsSold,
    GrossValue,
    Date,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 5] = [
        CanonicalField::Sku,
        CanonicalField::ProductName,
        CanonicalField::UnitsSold,
        CanonicalField::GrossValue,
        CanonicalField::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sku => "sku",
            Self::ProductName => "product_name",
            Self::UnitsSold => "units_sold",
            Self::GrossValue => "gross_value",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    /// Accepts the English field names and the output column names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_header(s).as_str() {
            "sku" => Ok(Self::Sku),
            "product name" | "produto" => Ok(Self::ProductName),
            "units sold" | "vendas" => Ok(Self::UnitsSold),
            "gross value" | "valor total" => Ok(Self::GrossValue),
            "date" | "data" => Ok(Self::Date),
            other => Err(format!("unknown canonical field: \"{other}\"")),
        }
    }
}

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

/// Priority-ordered alias substrings per canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(CanonicalField, Vec<String>)>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AliasTable {
    /// Table with every field declared and no aliases.
    pub fn empty() -> Self {
        Self {
            entries: CanonicalField::ALL.iter().map(|f| (*f, Vec::new())).collect(),
        }
    }

    /// Aliases shared by every channel. Specific phrases come before the
    /// generic words they contain.
    pub fn builtin() -> Self {
        Self::empty()
            .with_aliases(
                CanonicalField::Sku,
                &[
                    "sku principal",
                    "cprod",
                    "seller sku",
                    "sku",
                    "codigo do produto",
                    "cod produto",
                    "codigo",
                    "product id",
                ],
            )
            .with_aliases(
                CanonicalField::ProductName,
                &[
                    "xprod",
                    "nome do produto",
                    "titulo do anuncio",
                    "product name",
                    "descricao",
                    "produto",
                    "product",
                    "nome",
                ],
            )
            .with_aliases(
                CanonicalField::UnitsSold,
                &[
                    "qcom",
                    "qtde vendida",
                    "qtd vendida",
                    "unidades",
                    "quantidade",
                    "units sold",
                    "units",
                    "quantity",
                    "qtde",
                    "qtd",
                    "vendas",
                ],
            )
            .with_aliases(
                CanonicalField::GrossValue,
                &[
                    "vprod",
                    "valor total",
                    "total",
                    "amount",
                    "faturamento",
                    "receita",
                    "valor bruto",
                    "valor",
                ],
            )
            .with_aliases(
                CanonicalField::Date,
                &[
                    "dhemi",
                    "demi",
                    "data de criacao",
                    "data da venda",
                    "order date",
                    "data",
                    "date",
                ],
            )
    }

    /// Append aliases (lowest priority) to `field`.
    pub fn with_aliases(mut self, field: CanonicalField, aliases: &[&str]) -> Self {
        self.entry_mut(field)
            .extend(aliases.iter().map(|a| normalize_header(a)));
        self
    }

    /// Insert aliases ahead of the existing ones for `field`, keeping their order.
    pub fn prepend<I, S>(&mut self, field: CanonicalField, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.entry_mut(field);
        let mut merged: Vec<String> = aliases.into_iter().map(|a| normalize_header(a.as_ref())).collect();
        merged.retain(|a| !a.is_empty());
        merged.extend(entry.drain(..));
        *entry = merged;
    }

    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, a)| a.as_slice())
            .unwrap_or(&[])
    }

    fn entry_mut(&mut self, field: CanonicalField) -> &mut Vec<String> {
        if let Some(pos) = self.entries.iter().position(|(f, _)| *f == field) {
            &mut self.entries[pos].1
        } else {
            self.entries.push((field, Vec::new()));
            let last = self.entries.len() - 1;
            &mut self.entries[last].1
        }
    }

    /// Resolve `headers` against this table.
    pub fn map_headers<S: AsRef<str>>(&self, headers: &[S]) -> ColumnMapping {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
        let mut claimed = vec![false; headers.len()];
        let mut columns = BTreeMap::new();

        let reserved: Vec<Option<CanonicalField>> = normalized
            .iter()
            .map(|h| {
                self.entries
                    .iter()
                    .find(|(_, aliases)| aliases.iter().any(|a| a == h))
                    .map(|(f, _)| *f)
            })
            .collect();

        for (field, aliases) in &self.entries {
            let hit = aliases.iter().filter(|a| !a.is_empty()).find_map(|alias| {
                normalized
                    .iter()
                    .enumerate()
                    .find(|(i, h)| {
                        !claimed[*i]
                            && !h.is_empty()
                            && reserved[*i].map_or(true, |owner| owner == *field)
                            && h.contains(alias.as_str())
                    })
                    .map(|(i, _)| i)
            });
            if let Some(idx) = hit {
                claimed[idx] = true;
                columns.insert(*field, idx);
            }
        }

        ColumnMapping {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            columns,
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Canonical field → source column index for one table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMapping {
    headers: Vec<String>,
    columns: BTreeMap<CanonicalField, usize>,
}

impl ColumnMapping {
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn header(&self, field: CanonicalField) -> Option<&str> {
        self.column(field).and_then(|i| self.headers.get(i)).map(String::as_str)
    }

    pub fn is_mapped(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    /// Required fields this mapping could not resolve.
    pub fn missing(&self, required: &[CanonicalField]) -> Vec<CanonicalField> {
        required.iter().copied().filter(|f| !self.is_mapped(*f)).collect()
    }

    /// `(field, source header)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.columns
            .iter()
            .filter_map(|(f, i)| self.headers.get(*i).map(|h| (*f, h.as_str())))
    }
}
