// File I/O: source readers and fact-table sinks

pub mod csv;
pub mod error;
pub mod export;
pub mod invoice;
pub mod source;
pub mod xlsx;

pub use error::SourceError;
pub use export::{write_facts, write_facts_csv, write_facts_xlsx, FACT_COLUMNS};
pub use invoice::{extract, InvoiceDocument, InvoiceError, InvoiceHeader, LineItem};
pub use source::{read_file_as_utf8, read_source, ContainerKind, ReadOptions, SkippedPart, SourceRead};
