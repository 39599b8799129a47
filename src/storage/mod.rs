//! Where benchmark records go after a run: an append-only JSONL log that
//! every command writes to, and a flat CSV view of it for spreadsheets.

pub mod csv;
pub mod jsonl;

pub use csv::{CSV_HEADERS, CsvExporter};
pub use jsonl::{RecordFilter, RecordStore, validate};
