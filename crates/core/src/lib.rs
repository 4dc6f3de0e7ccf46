//! `salesrecon-core` — canonical sales model and the pure pieces of the
//! record pipeline: value normalization and column mapping.
//!
//! No IO, no logging. Everything here is a total function of its inputs.

pub mod channel;
pub mod mapper;
pub mod model;
pub mod normalize;
pub mod text;

pub use channel::Channel;
pub use mapper::{AliasTable, CanonicalField, ColumnMapping};
pub use model::{
    format_cents, AggregatedFact, CanonicalSalesRecord, RawRow, RawTable, RowOrigin, YearMonth,
};
pub use normalize::{Locale, Unparsable};
