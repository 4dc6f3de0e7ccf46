//! Header and token folding shared by the column mapper, channel
//! identification and the free-text date parser.

use unicode_normalization::UnicodeNormalization;

/// Fold accented characters to ASCII (`"Criação"` → `"Criacao"`).
///
/// Characters with no ASCII decomposition are dropped, which also removes
/// a stray byte-order mark at the start of a header.
pub fn fold_ascii(input: &str) -> String {
    input.nfkd().filter(|c| c.is_ascii()).collect()
}

/// Normalize a header or alias for comparison: trimmed, lower-cased,
/// accent-folded, every run of whitespace/punctuation collapsed to one space.
pub fn normalize_header(input: &str) -> String {
    let folded = fold_ascii(input).to_ascii_lowercase();
    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Split an accent-folded, lower-cased string into alphanumeric tokens.
pub fn tokens(input: &str) -> Vec<String> {
    normalize_header(input)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_portuguese_accents() {
        assert_eq!(fold_ascii("Data de Criação"), "Data de Criacao");
        assert_eq!(fold_ascii("Título do anúncio"), "Titulo do anuncio");
        assert_eq!(fold_ascii("negócio"), "negocio");
    }

    #[test]
    fn header_collapses_punctuation_and_case() {
        assert_eq!(normalize_header("  Total (BRL) "), "total brl");
        assert_eq!(normalize_header("Qtde.\u{a0}Vendida"), "qtde vendida");
        assert_eq!(normalize_header("\u{feff}SKU"), "sku");
        assert_eq!(normalize_header("valor_total"), "valor total");
        assert_eq!(normalize_header("---"), "");
    }

    #[test]
    fn tokens_split_file_names() {
        assert_eq!(tokens("Vendas_ML-Março_2024.xlsx"), vec!["vendas", "ml", "marco", "2024", "xlsx"]);
    }
}
