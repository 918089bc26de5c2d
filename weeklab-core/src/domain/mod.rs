//! Domain types for WeekLab

pub mod history;
pub mod option;
pub mod price;
pub mod ticker;
pub mod week;

pub use history::{History, HistorySummary};
pub use option::{OptionContract, OptionRecord};
pub use price::PricePoint;
pub use ticker::{StockSplit, TickerDetails};
pub use week::{WeekRecord, WeeklyAnchor};
