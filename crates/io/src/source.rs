//! File-type dispatch and raw byte loading.

use std::io::Read;
use std::path::Path;

use salesrecon_core::RawTable;

use crate::error::SourceError;
use crate::{csv, invoice, xlsx};

/// Physical container of a source file, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Delimited,
    Workbook,
    Invoice,
}

impl ContainerKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" | "tsv" => Some(Self::Delimited),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Workbook),
            "xml" => Some(Self::Invoice),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delimited => "delimited",
            Self::Workbook => "workbook",
            Self::Invoice => "invoice",
        }
    }
}

/// Per-source reading knobs.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Delimiter tried first for delimited text.
    pub delimiter: u8,
    /// Only workbook sheets whose normalized name contains this are read.
    pub sheet_filter: Option<String>,
    /// Files larger than this fail before being opened.
    pub max_bytes: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            sheet_filter: None,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

/// A workbook sheet that could not be read. The rest of the file still is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPart {
    pub name: String,
    pub reason: String,
}

/// Everything one file yielded.
#[derive(Debug, Clone)]
pub struct SourceRead {
    pub kind: ContainerKind,
    pub tables: Vec<RawTable>,
    pub skipped: Vec<SkippedPart>,
}

/// Read one file into raw tables.
pub fn read_source(path: &Path, options: &ReadOptions) -> Result<SourceRead, SourceError> {
    let kind = ContainerKind::from_path(path).ok_or_else(|| SourceError::Unsupported {
        path: path.to_path_buf(),
    })?;
    check_size(path, options.max_bytes)?;

    let read = match kind {
        ContainerKind::Delimited => {
            let content = read_file_as_utf8(path)?;
            let table = csv::parse_delimited(path, &content, options.delimiter)?;
            SourceRead { kind, tables: vec![table], skipped: Vec::new() }
        }
        ContainerKind::Workbook => {
            let book = xlsx::read_workbook(path, options.sheet_filter.as_deref())?;
            SourceRead { kind, tables: book.tables, skipped: book.skipped }
        }
        ContainerKind::Invoice => {
            let content = read_file_as_utf8(path)?;
            let doc = invoice::extract(&content).map_err(|e| SourceError::MalformedDocument {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            let table = doc.into_table(&path.display().to_string());
            SourceRead { kind, tables: vec![table], skipped: Vec::new() }
        }
    };
    Ok(read)
}

pub fn check_size(path: &Path, limit: u64) -> Result<(), SourceError> {
    let meta = std::fs::metadata(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() > limit {
        return Err(SourceError::TooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit,
        });
    }
    Ok(())
}

/// Read file and convert to UTF-8 if needed (Windows-1252 exports are common).
/// A leading byte-order mark is dropped.
pub fn read_file_as_utf8(path: &Path) -> Result<String, SourceError> {
    let read_err = |source| SourceError::Read { path: path.to_path_buf(), source };
    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(read_err)?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn container_kind_by_extension() {
        assert_eq!(ContainerKind::from_path(Path::new("a/vendas.CSV")), Some(ContainerKind::Delimited));
        assert_eq!(ContainerKind::from_path(Path::new("meli.xlsx")), Some(ContainerKind::Workbook));
        assert_eq!(ContainerKind::from_path(Path::new("nfe/123.xml")), Some(ContainerKind::Invoice));
        assert_eq!(ContainerKind::from_path(Path::new("notes.pdf")), None);
        assert_eq!(ContainerKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Descrição" in Windows-1252
        fs::write(&path, b"Descri\xe7\xe3o\n").unwrap();
        assert_eq!(read_file_as_utf8(&path).unwrap(), "Descrição\n");
    }

    #[test]
    fn bom_is_stripped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}SKU;Qtd\n").unwrap();
        assert_eq!(read_file_as_utf8(&path).unwrap(), "SKU;Qtd\n");
    }

    #[test]
    fn oversized_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.csv");
        fs::write(&path, "x".repeat(64)).unwrap();
        let options = ReadOptions { max_bytes: 10, ..Default::default() };
        let err = read_source(&path, &options).unwrap_err();
        assert_eq!(err.kind(), "too_large");
    }

    #[test]
    fn unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        fs::write(&path, "%PDF").unwrap();
        let err = read_source(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, SourceError::Unsupported { .. }));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = read_source(Path::new("/nonexistent/x.csv"), &ReadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "read");
    }
}
