//! Market data: provider seam, Polygon client, bar cache, history snapshots.

pub mod cache;
pub mod memory;
pub mod polygon;
pub mod provider;
pub mod store;
pub mod throttle;

pub use cache::{BarCache, BarCacheMeta, Coverage};
pub use memory::InMemoryProvider;
pub use polygon::PolygonProvider;
pub use provider::{ContractQuery, DataError, MarketDataProvider};
pub use store::{HistoryStore, SnapshotMeta};
pub use throttle::Throttle;
