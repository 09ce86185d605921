//! Raw data ingestion and cleaning.

pub mod error;
pub mod prepare;
pub mod source;

pub use error::DataError;
pub use prepare::{
    clean, clean_with_report, normalize_name, normalize_text, CleanedRecord, CleaningReport,
    RawRecord, RawValue, TARGET,
};
pub use source::CsvSource;
