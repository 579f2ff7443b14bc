pub mod drive;
pub mod gemini;
pub mod twelvedata;
pub mod util;
pub mod yahoo_finance;

pub use drive::DriveStorage;
pub use gemini::GeminiExtractor;
pub use twelvedata::TwelveDataProvider;
pub use yahoo_finance::YahooRateProvider;
