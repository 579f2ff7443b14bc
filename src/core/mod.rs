//! Core business logic abstractions

pub mod config;
pub mod currency;
pub mod date;
pub mod error;
pub mod extraction;
pub mod fact;
pub mod gain;
pub mod log;
pub mod monthly;
pub mod price;
pub mod records;
pub mod storage;

/// Identifies the user owning files, records and holdings.
pub type UserId = u64;

// Re-export main types for cleaner imports
pub use currency::ExchangeRateProvider;
pub use date::{NormalizedDate, normalize_date};
pub use error::PipelineError;
pub use extraction::{ExtractionIntent, Extractor, SUPPORTED_MIME_TYPES};
pub use fact::{Currency, ExtractedFact, FactMap};
pub use gain::{GainResult, compute_gain};
pub use monthly::{MonthKey, MonthlyGainSeries, compute_monthly_gain_series};
pub use price::{MarketDataProvider, SeriesPoint};
pub use records::{Holding, PendingInvestment, PendingTransaction, RecordStore};
pub use storage::{FileStorage, RemoteFile};
