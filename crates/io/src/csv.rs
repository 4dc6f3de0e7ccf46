// Delimited text import

use std::path::Path;

use salesrecon_core::{RawRow, RawTable, RowOrigin};

use crate::error::SourceError;

/// Parse delimited text into one raw table.
///
/// `preferred` is tried first. When the header comes out as a single column
/// the other of `;`/`,` is tried, then the sniffed delimiter. The header is
/// the first non-blank record; blank records are skipped everywhere.
pub fn parse_delimited(path: &Path, content: &str, preferred: u8) -> Result<RawTable, SourceError> {
    let mut candidates = vec![preferred, alternate(preferred)];
    if let Some(sniffed) = sniff_fallback(content).filter(|d| !candidates.contains(d)) {
        candidates.push(sniffed);
    }

    let mut first_attempt = None;
    for delimiter in candidates {
        let table = parse_with(path, content, delimiter)?;
        if table.headers.len() > 1 {
            if delimiter != preferred {
                tracing::debug!(
                    source = %path.display(),
                    delimiter = %(delimiter as char),
                    "delimiter fallback"
                );
            }
            return Ok(table);
        }
        first_attempt.get_or_insert(table);
    }

    // Genuinely single-column file: keep what the preferred delimiter gave.
    Ok(first_attempt.unwrap_or_else(|| RawTable {
        source: path.display().to_string(),
        sheet: None,
        headers: Vec::new(),
        rows: Vec::new(),
    }))
}

fn alternate(delimiter: u8) -> u8 {
    if delimiter == b';' {
        b','
    } else {
        b';'
    }
}

fn parse_with(path: &Path, content: &str, delimiter: u8) -> Result<RawTable, SourceError> {
    let source = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut lines = LineCounter::new(content);

    for result in reader.records() {
        let record = result.map_err(|e| SourceError::Delimited {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| lines.line_at(p.byte() as usize)).unwrap_or(0);

        let Some(header) = headers.as_mut() else {
            headers = Some(record.iter().map(|h| h.trim().to_string()).collect());
            continue;
        };

        // Columns past the header get positional names.
        while header.len() < record.len() {
            header.push(format!("column_{}", header.len() + 1));
        }
        let fields = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(RawRow::new(
            RowOrigin { source: source.clone(), sheet: None, line },
            fields,
        ));
    }

    Ok(RawTable {
        source,
        sheet: None,
        headers: headers.unwrap_or_default(),
        rows,
    })
}

/// 1-based physical line of a record from its byte offset.
///
/// The csv reader does not count the blank lines it skips, so lines are
/// counted from the content. Offsets must be non-decreasing.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(content: &'a str) -> Self {
        Self { bytes: content.as_bytes(), offset: 0, line: 1 }
    }

    fn line_at(&mut self, start: usize) -> usize {
        // a record position may sit before the line breaks it skipped
        let mut start = start.min(self.bytes.len());
        while matches!(self.bytes.get(start), Some(b'\n' | b'\r')) {
            start += 1;
        }
        if start > self.offset {
            self.line += self.bytes[self.offset..start].iter().filter(|&&b| b == b'\n').count();
            self.offset = start;
        }
        self.line
    }
}

/// Last resort when neither `;` nor `,` splits the header: the candidate
/// whose header width (>1) repeats on most of the first non-blank lines.
fn sniff_fallback(content: &str) -> Option<u8> {
    let sample: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    [b'\t', b'|']
        .into_iter()
        .filter_map(|delimiter| {
            let widths: Vec<usize> = sample.iter().map(|line| field_count(line, delimiter)).collect();
            let header = *widths.first()?;
            let consistent = widths.iter().filter(|&&w| w == header).count();
            (header > 1).then_some((consistent * header, delimiter))
        })
        .max_by_key(|&(score, _)| score)
        .map(|(_, delimiter)| delimiter)
}

fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |r| r.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str, preferred: u8) -> RawTable {
        parse_delimited(Path::new("vendas.csv"), content, preferred).unwrap()
    }

    #[test]
    fn semicolon_is_default() {
        let t = parse("SKU;Qtd;Valor\nA1;2;10,50\n", b';');
        assert_eq!(t.headers, vec!["SKU", "Qtd", "Valor"]);
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].value(2), "10,50");
        assert_eq!(t.rows[0].origin.line, 2);
    }

    #[test]
    fn falls_back_to_comma_when_single_column() {
        let t = parse("sku,units,amount\nA1,2,\"1,234.50\"\n", b';');
        assert_eq!(t.headers, vec!["sku", "units", "amount"]);
        assert_eq!(t.rows[0].value(2), "1,234.50");
    }

    #[test]
    fn falls_back_to_sniffed_tab() {
        let t = parse("sku\tunits\nA1\t2\n", b';');
        assert_eq!(t.headers, vec!["sku", "units"]);
        assert_eq!(t.rows[0].get("units"), Some("2"));
    }

    #[test]
    fn blank_lines_skipped_and_line_numbers_kept() {
        let t = parse("\n;;\nSKU;Qtd\n\nA1;1\n;\nB2;3\n", b';');
        assert_eq!(t.headers, vec!["SKU", "Qtd"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].origin.line, 5);
        assert_eq!(t.rows[1].origin.line, 7);
    }

    #[test]
    fn ragged_rows_padded_and_extended() {
        let t = parse("SKU;Qtd\nA1\nB2;3;extra\n", b';');
        assert_eq!(t.rows[0].value(1), "");
        assert_eq!(t.rows[0].get("Qtd"), Some(""));
        assert_eq!(t.rows[1].get("column_3"), Some("extra"));
    }

    #[test]
    fn single_column_file_kept() {
        let t = parse("sku\nA1\n", b';');
        assert_eq!(t.headers, vec!["sku"]);
        assert_eq!(t.rows.len(), 1);
    }

    #[test]
    fn empty_content_gives_empty_table() {
        let t = parse("", b';');
        assert!(t.headers.is_empty());
        assert!(t.rows.is_empty());
    }

    #[test]
    fn crlf_blank_lines_counted() {
        let t = parse("SKU;Qtd\r\n\r\nA1;1\r\n\r\n\r\nB2;2\r\n", b';');
        assert_eq!(t.rows[0].origin.line, 3);
        assert_eq!(t.rows[1].origin.line, 6);
    }

    #[test]
    fn sniff_only_for_tab_or_pipe() {
        assert_eq!(sniff_fallback("a|b|c\n1|2|3\n"), Some(b'|'));
        assert_eq!(sniff_fallback("a\tb\n1\t2\n"), Some(b'\t'));
        assert_eq!(sniff_fallback("sku\nA1\n"), None);
        assert_eq!(sniff_fallback(""), None);
    }
}
